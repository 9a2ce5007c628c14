// Sliding-window message-rate counter, process-lifetime only.
//
// Rate limiting is best-effort: state is lost on restart and each key keeps
// only its most recent events. Correctness of spam detection only needs the
// last handful of timestamps, so the cap stays small.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Most recent events kept per key; the oldest is evicted beyond this.
const MAX_EVENTS_PER_KEY: usize = 20;

/// Composite key: one window per sender per scope.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct ScopeSubjectKey {
    scope_id: String,
    subject_id: String,
}

/// Per-key sliding time-window counter.
///
/// DashMap's entry lock makes each read-prune-write sequence atomic for its
/// key, so concurrent scopes never lose increments.
pub struct RateWindow {
    events: DashMap<ScopeSubjectKey, Vec<DateTime<Utc>>>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
        }
    }

    fn key(scope_id: &str, subject_id: &str) -> ScopeSubjectKey {
        ScopeSubjectKey {
            scope_id: scope_id.to_string(),
            subject_id: subject_id.to_string(),
        }
    }

    /// Record one event at `now`, evicting the oldest past the cap.
    pub fn record(&self, scope_id: &str, subject_id: &str, now: DateTime<Utc>) {
        let mut entry = self
            .events
            .entry(Self::key(scope_id, subject_id))
            .or_default();
        entry.push(now);
        if entry.len() > MAX_EVENTS_PER_KEY {
            entry.remove(0);
        }
    }

    /// Count events within `window_secs` of `now`, pruning expired entries
    /// so later calls don't rescan them.
    pub fn count_within(
        &self,
        scope_id: &str,
        subject_id: &str,
        window_secs: u64,
        now: DateTime<Utc>,
    ) -> usize {
        let Some(mut entry) = self.events.get_mut(&Self::key(scope_id, subject_id)) else {
            return 0;
        };
        let cutoff = now - Duration::seconds(window_secs as i64);
        entry.retain(|&t| t >= cutoff && t <= now);
        entry.len()
    }

    /// Drop the window for one sender.
    pub fn clear(&self, scope_id: &str, subject_id: &str) {
        self.events.remove(&Self::key(scope_id, subject_id));
    }

    /// Drop every window belonging to a scope (bot removed from group).
    pub fn clear_scope(&self, scope_id: &str) {
        self.events.retain(|key, _| key.scope_id != scope_id);
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn zero_window_counts_same_instant() {
        let window = RateWindow::new();
        let now = t0();

        window.record("g1", "u1", now);
        assert!(window.count_within("g1", "u1", 0, now) >= 1);
    }

    #[test]
    fn events_expire_once_past_the_window() {
        let window = RateWindow::new();
        let now = t0();

        window.record("g1", "u1", now);
        assert_eq!(window.count_within("g1", "u1", 5, now), 1);

        let later = now + Duration::seconds(6);
        assert_eq!(window.count_within("g1", "u1", 5, later), 0);
        // Expired entries were pruned, not just filtered.
        assert_eq!(window.count_within("g1", "u1", 600, later), 0);
    }

    #[test]
    fn burst_within_window_counts_every_message() {
        let window = RateWindow::new();
        let now = t0();

        for i in 0..6 {
            window.record("g1", "u1", now + Duration::milliseconds(i * 500));
        }
        let at = now + Duration::seconds(3);
        assert_eq!(window.count_within("g1", "u1", 5, at), 6);
    }

    #[test]
    fn capped_at_twenty_events() {
        let window = RateWindow::new();
        let now = t0();

        for i in 0..30 {
            window.record("g1", "u1", now + Duration::seconds(i));
        }
        let at = now + Duration::seconds(29);
        assert_eq!(window.count_within("g1", "u1", 3600, at), 20);
    }

    #[test]
    fn keys_are_independent() {
        let window = RateWindow::new();
        let now = t0();

        window.record("g1", "u1", now);
        window.record("g1", "u2", now);
        window.record("g2", "u1", now);

        assert_eq!(window.count_within("g1", "u1", 10, now), 1);
        assert_eq!(window.count_within("g1", "u2", 10, now), 1);
        assert_eq!(window.count_within("g2", "u1", 10, now), 1);
    }

    #[test]
    fn clear_and_clear_scope() {
        let window = RateWindow::new();
        let now = t0();

        window.record("g1", "u1", now);
        window.record("g1", "u2", now);
        window.record("g2", "u1", now);

        window.clear("g1", "u1");
        assert_eq!(window.count_within("g1", "u1", 10, now), 0);
        assert_eq!(window.count_within("g1", "u2", 10, now), 1);

        window.clear_scope("g1");
        assert_eq!(window.count_within("g1", "u2", 10, now), 0);
        assert_eq!(window.count_within("g2", "u1", 10, now), 1);
    }
}

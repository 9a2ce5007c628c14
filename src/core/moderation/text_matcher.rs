// Trigger-word matching - pure functions, no I/O, no clock.
//
// Strictness levels:
// - `Loose`:  substring containment, catches words hidden inside other words
// - `Strict`: token-boundary occurrences only
// - `Normal`: boundary-ish matching plus single-letter leetspeak variants
//
// Malformed input (empty text, empty word list) is a non-match, never an
// error.

use super::moderation_models::MatchStrictness;

/// Leet substitutions applied when generating `Normal` variants.
const LEET_SUBSTITUTIONS: [(char, char); 8] = [
    ('a', '@'),
    ('a', '4'),
    ('e', '3'),
    ('i', '1'),
    ('i', '!'),
    ('s', '5'),
    ('s', '$'),
    ('o', '0'),
];

/// Check whether `text` matches any of `words` under `strictness`.
///
/// `words` are expected lowercase and trimmed (the word-list store
/// normalizes on insert); `text` may be anything.
pub fn matches<S: AsRef<str>>(text: &str, words: &[S], strictness: MatchStrictness) -> bool {
    if text.is_empty() || words.is_empty() {
        return false;
    }

    let text = text.to_lowercase();
    words.iter().any(|word| {
        let word = word.as_ref();
        if word.is_empty() {
            return false;
        }
        match strictness {
            MatchStrictness::Loose => text.contains(word),
            MatchStrictness::Strict => contains_at_boundary(&text, word),
            MatchStrictness::Normal => {
                space_delimited(&text, word)
                    || leet_variants(word).iter().any(|v| text.contains(v))
            }
        }
    })
}

/// Generate the single-letter leetspeak variants of `word`, deduplicated.
///
/// Each variant replaces every occurrence of one letter with one symbol;
/// substitutions are never combined across different letters, so a word
/// containing both 'a' and 'e' only produces singly-substituted forms.
pub fn leet_variants(word: &str) -> Vec<String> {
    let mut variants = Vec::new();
    for (letter, replacement) in LEET_SUBSTITUTIONS {
        if word.contains(letter) {
            let variant = word.replace(letter, &replacement.to_string());
            if !variants.contains(&variant) {
                variants.push(variant);
            }
        }
    }
    variants
}

/// True when `word` occurs in `text` with no alphanumeric neighbor on
/// either side. Both inputs already lowercase.
fn contains_at_boundary(text: &str, word: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(word) {
        let at = start + pos;
        let end = at + word.len();
        let before_ok = text[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        // Step past this occurrence; word is non-empty so this advances.
        start = at + word.len();
        if start >= text.len() {
            break;
        }
    }
    false
}

/// The `Normal` boundary rule: whole-text equality, or the word delimited
/// by the text edges and spaces.
fn space_delimited(text: &str, word: &str) -> bool {
    text == word
        || text.starts_with(&format!("{} ", word))
        || text.ends_with(&format!(" {}", word))
        || text.contains(&format!(" {} ", word))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: &[&str] = &["plant", "spoiler"];

    #[test]
    fn empty_inputs_never_match() {
        assert!(!matches("", WORDS, MatchStrictness::Loose));
        assert!(!matches::<&str>("plant", &[], MatchStrictness::Loose));
        assert!(!matches("plant", &[""], MatchStrictness::Strict));
    }

    #[test]
    fn loose_matches_inside_words() {
        assert!(matches("transplantation", WORDS, MatchStrictness::Loose));
        assert!(matches("PLANT!", WORDS, MatchStrictness::Loose));
        assert!(!matches("nothing here", WORDS, MatchStrictness::Loose));
    }

    #[test]
    fn strict_requires_token_boundary() {
        assert!(matches("buy a plant today", WORDS, MatchStrictness::Strict));
        assert!(matches("plant", WORDS, MatchStrictness::Strict));
        assert!(matches("a plant.", WORDS, MatchStrictness::Strict));
        assert!(!matches("transplantation", WORDS, MatchStrictness::Strict));
        assert!(!matches("plants", WORDS, MatchStrictness::Strict));
    }

    #[test]
    fn strict_skips_embedded_then_finds_free_standing() {
        // First occurrence is embedded, second stands alone.
        assert!(matches("replant a plant", WORDS, MatchStrictness::Strict));
    }

    #[test]
    fn normal_space_boundary_rules() {
        assert!(matches("plant", WORDS, MatchStrictness::Normal));
        assert!(matches("plant is here", WORDS, MatchStrictness::Normal));
        assert!(matches("here is plant", WORDS, MatchStrictness::Normal));
        assert!(matches("a plant here", WORDS, MatchStrictness::Normal));
        assert!(!matches("transplantation", WORDS, MatchStrictness::Normal));
    }

    #[test]
    fn normal_catches_leet_variants_as_substrings() {
        assert!(matches("pl4ntkiller", WORDS, MatchStrictness::Normal));
        assert!(matches("sp0iler ahead", WORDS, MatchStrictness::Normal));
        assert!(matches("xx$poilerxx", WORDS, MatchStrictness::Normal));
    }

    #[test]
    fn leet_variants_single_substitution_only() {
        let variants = leet_variants("plass");
        // 'a' gives @/4, 's' gives 5/$ - each applied alone.
        assert!(variants.contains(&"pl@ss".to_string()));
        assert!(variants.contains(&"pl4ss".to_string()));
        assert!(variants.contains(&"pla55".to_string()));
        assert!(variants.contains(&"pla$$".to_string()));
        // Combined forms are deliberately not generated.
        assert!(!variants.contains(&"pl455".to_string()));
        assert!(!matches("p1a5s", &["plass"], MatchStrictness::Normal));
    }

    #[test]
    fn leet_variants_deduplicated() {
        let variants = leet_variants("xyz");
        assert!(variants.is_empty());

        let variants = leet_variants("see");
        assert_eq!(variants, vec!["s33".to_string(), "5ee".to_string(), "$ee".to_string()]);
    }
}

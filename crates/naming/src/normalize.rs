use std::borrow::Cow;

/// Fragment used when nothing identifier-safe survives normalization.
pub const FALLBACK_FRAGMENT: &str = "text_variable";

/// Prefix for fragments that would otherwise start with a digit or symbol.
pub const LEADING_MARKER: &str = "Var_";

/// Symbols spelled out before generic sanitization so that patterns such as
/// `A & B` or `50%` stay legible.
const SYMBOL_WORDS: [(char, &str); 7] = [
    ('@', "at"),
    ('#', "hash"),
    ('$', "dollar"),
    ('%', "percent"),
    ('&', "and"),
    ('+', "plus"),
    ('=', "equals"),
];

/// Case handling applied while normalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    /// Lowercase everything (default identifier form)
    #[default]
    Insensitive,
    /// Keep original capitalization
    Preserve,
}

/// Normalize with the default, case-insensitive policy.
pub fn normalize(text: &str) -> String {
    normalize_with(text, CaseMode::Insensitive)
}

/// Turn arbitrary text into an identifier fragment made of `[A-Za-z0-9_-]`.
///
/// Never fails: empty input yields [`FALLBACK_FRAGMENT`]. Leading underscores
/// are kept, trailing ones are stripped. The result is a fixed point:
/// normalizing it again with the same `case` returns it unchanged.
pub fn normalize_with(text: &str, case: CaseMode) -> String {
    let trimmed = text.trim();
    let cased: Cow<'_, str> = match case {
        CaseMode::Insensitive => Cow::Owned(trimmed.to_lowercase()),
        CaseMode::Preserve => Cow::Borrowed(trimmed),
    };

    let mut out = String::with_capacity(cased.len() + 8);
    for ch in cased.chars() {
        if let Some(word) = symbol_word(ch) {
            push_underscore(&mut out);
            out.push_str(word);
            push_underscore(&mut out);
        } else if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else {
            // whitespace, `_` and everything outside the identifier alphabet
            push_underscore(&mut out);
        }
    }

    while out.ends_with('_') {
        out.pop();
    }

    if out.is_empty() {
        return FALLBACK_FRAGMENT.to_string();
    }

    let starts_ok = out
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_ok {
        return out;
    }

    let marker = match case {
        CaseMode::Insensitive => Cow::Owned(LEADING_MARKER.to_lowercase()),
        CaseMode::Preserve => Cow::Borrowed(LEADING_MARKER),
    };
    format!("{marker}{out}")
}

fn symbol_word(ch: char) -> Option<&'static str> {
    SYMBOL_WORDS
        .iter()
        .find(|(symbol, _)| *symbol == ch)
        .map(|(_, word)| *word)
}

fn push_underscore(out: &mut String) {
    if !out.ends_with('_') {
        out.push('_');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn spells_out_symbols_and_collapses_separators() {
        assert_eq!(normalize("A & B @ 5%"), "a_and_b_at_5_percent");
        assert_eq!(normalize("Price = $10 + tax"), "price_equals_dollar_10_plus_tax");
        assert_eq!(normalize("#1   hit"), "_hash_1_hit");
    }

    #[test]
    fn preserve_mode_keeps_capitalization() {
        assert_eq!(normalize_with("Sign Up", CaseMode::Preserve), "Sign_Up");
        assert_eq!(normalize_with("Sign Up", CaseMode::Insensitive), "sign_up");
    }

    #[test]
    fn keeps_leading_underscore_strips_trailing() {
        assert_eq!(normalize("_private thing!!"), "_private_thing");
        assert_eq!(normalize("  __x__  "), "_x");
    }

    #[test]
    fn replaces_unsupported_characters() {
        assert_eq!(normalize("Café — menu"), "caf_menu");
        assert_eq!(normalize("x-y.z/w"), "x-y_z_w");
    }

    #[test]
    fn empty_input_falls_back() {
        assert_eq!(normalize(""), FALLBACK_FRAGMENT);
        assert_eq!(normalize("   \t\n"), FALLBACK_FRAGMENT);
        assert_eq!(normalize("!!!"), FALLBACK_FRAGMENT);
    }

    #[test]
    fn digit_or_symbol_start_gets_marker() {
        assert_eq!(normalize_with("42 items", CaseMode::Preserve), "Var_42_items");
        assert_eq!(normalize("42 items"), "var_42_items");
        assert_eq!(normalize_with("-dash", CaseMode::Preserve), "Var_-dash");
    }

    proptest! {
        #[test]
        fn proptest_normalize_is_idempotent(text in "\\PC{0,40}") {
            for case in [CaseMode::Insensitive, CaseMode::Preserve] {
                let once = normalize_with(&text, case);
                let twice = normalize_with(&once, case);
                prop_assert_eq!(&once, &twice);
            }
        }

        #[test]
        fn proptest_output_alphabet_is_identifier_safe(text in "\\PC{0,40}") {
            let out = normalize_with(&text, CaseMode::Preserve);
            prop_assert!(!out.is_empty());
            prop_assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
            prop_assert!(!out.ends_with('_'));
            prop_assert!(!out.contains("__"));
            let first = out.chars().next().unwrap();
            prop_assert!(first.is_ascii_alphabetic() || first == '_');
        }
    }
}

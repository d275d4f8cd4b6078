//! Text canonicalization for identity fields.
//!
//! The canonical form is used both for storage and for substring search:
//!
//! 1. Unicode NFKD, so precomposed letters shed their marks
//! 2. drop combining marks (harakat, tanween, superscript alef, and any
//!    other combining mark)
//! 3. fold orthographic variants: hamza-carrying alefs to bare alef,
//!    alef maksura to yeh, teh marbuta to heh
//! 4. anything outside the Arabic block, ASCII alphanumerics, `_` and
//!    whitespace becomes a space
//! 5. collapse whitespace, trim
//!
//! `canonicalize(canonicalize(x)) == canonicalize(x)` for every input.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn is_arabic_mark(c: char) -> bool {
    matches!(c, '\u{064B}'..='\u{065F}' | '\u{0670}')
}

fn fold_variant(c: char) -> char {
    match c {
        'إ' | 'أ' | 'آ' | 'ٱ' => 'ا',
        'ى' => 'ي',
        'ة' => 'ه',
        other => other,
    }
}

fn is_permitted(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}') || c.is_ascii_alphanumeric() || c == '_'
}

/// Normalize free text into its comparable form. Never fails.
pub fn canonicalize(text: &str) -> String {
    let mapped: String = text
        .nfkd()
        .filter(|&c| !is_arabic_mark(c) && !is_combining_mark(c))
        .map(fold_variant)
        .map(|c| if is_permitted(c) { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of name parts joined with single spaces; empty parts skipped.
pub fn canonical_full_name<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let joined = parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    canonicalize(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("   \t\n"), "");
    }

    #[test]
    fn strips_harakat() {
        assert_eq!(canonicalize("مُحَمَّد"), "محمد");
        assert_eq!(canonicalize("عَلِيٌّ"), "علي");
    }

    #[test]
    fn folds_letter_variants() {
        assert_eq!(canonicalize("أحمد"), "احمد");
        assert_eq!(canonicalize("إبراهيم"), "ابراهيم");
        assert_eq!(canonicalize("آمنة"), "امنه");
        assert_eq!(canonicalize("مصطفى"), "مصطفي");
    }

    #[test]
    fn punctuation_and_whitespace_collapse() {
        assert_eq!(canonicalize("  علي -- حسن  "), "علي حسن");
        assert_eq!(canonicalize("oil-refining-and-gas"), "oil refining and gas");
        assert_eq!(canonicalize("a\t\tb\nc"), "a b c");
    }

    #[test]
    fn compatibility_forms_are_normalized() {
        // Arabic presentation form of lam-alef decomposes to two letters.
        assert_eq!(canonicalize("\u{FEFB}"), "لا");
        // Fullwidth latin.
        assert_eq!(canonicalize("ＡＢＣ１"), "ABC1");
    }

    #[test]
    fn latin_diacritics_are_dropped() {
        assert_eq!(canonicalize("José"), "Jose");
    }

    #[test]
    fn idempotent_on_tricky_inputs() {
        let samples = [
            "",
            "مُحَمَّد  أَحْمَد",
            "ا\u{0654}",
            "ا\u{064E}\u{0654}",
            "ا\u{0300}\u{0654}",
            "\u{0675}",
            "ﻷحمد, إسراء!",
            "Ａｌｉ_42 — حسين",
            "ةىأإآ",
            "x\u{0670}y",
        ];
        for s in samples {
            let once = canonicalize(s);
            assert_eq!(canonicalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn full_name_joins_parts() {
        assert_eq!(
            canonical_full_name(["أحمد", "", "عليّ", " "]),
            "احمد علي"
        );
    }
}

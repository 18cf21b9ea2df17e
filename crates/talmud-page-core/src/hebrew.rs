//! Hebrew numerals and letter utilities.
//!
//! Page citations written in Hebrew use the alphabetic numeral system: each
//! letter carries a value and a number is the sum of its letters, written
//! from the largest place to the smallest. Only the restricted shape used for
//! page numbers is accepted here: an optional hundreds letter (ק, ר, ש), an
//! optional tens letter (י through צ) and an optional units letter (א through
//! ט). The customary forms טו (15) and טז (16) replace the tens and units
//! letters for those two values.

use once_cell::sync::Lazy;
use regex::Regex;

const LETTER_VALUES: [(char, u32); 22] = [
    ('א', 1),
    ('ב', 2),
    ('ג', 3),
    ('ד', 4),
    ('ה', 5),
    ('ו', 6),
    ('ז', 7),
    ('ח', 8),
    ('ט', 9),
    ('י', 10),
    ('כ', 20),
    ('ל', 30),
    ('מ', 40),
    ('נ', 50),
    ('ס', 60),
    ('ע', 70),
    ('פ', 80),
    ('צ', 90),
    ('ק', 100),
    ('ר', 200),
    ('ש', 300),
    ('ת', 400),
];

static PAGE_NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[קרש]?(?:טו|טז|[יכלמנסעפצ]?[א-ט]?)$").expect("valid regex"));

static NON_LETTERS: Lazy<Regex> = Lazy::new(|| Regex::new("[\u{0591}-\u{05C7}]").expect("valid regex"));

pub const ALEPH: char = 'א';
pub const TAV: char = 'ת';

fn letter_value(letter: char) -> Option<u32> {
    LETTER_VALUES
        .iter()
        .find(|(l, _)| *l == letter)
        .map(|(_, value)| *value)
}

/// Decodes a page numeral (1–399) into its integer value.
///
/// Returns `None` for the empty string and for anything outside the
/// hundreds/tens/units shape described in the module docs.
pub fn decode_numeral(text: &str) -> Option<u32> {
    if text.is_empty() || !PAGE_NUMERAL.is_match(text) {
        return None;
    }
    text.chars().map(letter_value).sum()
}

/// Encodes a positive integer as a Hebrew numeral, using טו/טז for 15 and 16.
pub fn int_to_numeral(mut value: u32) -> String {
    let mut result = String::new();
    while value > 0 {
        if value == 15 {
            result.push_str("טו");
            break;
        }
        if value == 16 {
            result.push_str("טז");
            break;
        }
        let (letter, letter_value) = LETTER_VALUES
            .iter()
            .rev()
            .find(|(_, v)| *v <= value)
            .copied()
            .unwrap_or(('א', 1));
        result.push(letter);
        value -= letter_value;
    }
    result
}

/// Removes cantillation marks, vowels and other non-letter Hebrew code points.
pub fn strip_nonletters(text: &str) -> String {
    NON_LETTERS.replace_all(text, "").into_owned()
}

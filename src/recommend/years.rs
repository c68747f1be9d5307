//! Extracción de rangos de años desde texto libre.
//!
//! Reconoce, en orden de prioridad:
//! 1. rangos explícitos: `1990-1999`, `1990~1999`, `1990 to 1999`
//! 2. décadas de 4 dígitos: `1990s`, `1990년대`
//! 3. décadas de 2 dígitos: `90s`, `'90s`, `90년대` (≤ 29 ⇒ 2000s, si no 1900s)
//!
//! Una década se acota además con "early/mid/late" (o 초반/중반/후반) si aparece
//! en el texto.

use once_cell::sync::Lazy;
use regex::Regex;

use super::preferences::YearRange;

static EXPLICIT_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])(\d{4})\s*(?:-|–|~|to|through|부터)\s*(\d{4})(?:[^0-9]|$)")
        .expect("valid explicit range regex")
});

static FOUR_DIGIT_DECADE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])(\d{3})0(?:'?s(?:[^a-z]|$)|\s*년대)")
        .expect("valid four digit decade regex")
});

static TWO_DIGIT_DECADE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])'?(\d)0(?:'?s(?:[^a-z]|$)|\s*년대)")
        .expect("valid two digit decade regex")
});

static EARLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bearly\b|초반|초기").expect("valid early regex"));
static MID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bmid\b|중반").expect("valid mid regex"));
static LATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\blate\b|후반|년대\s*말").expect("valid late regex"));

/// Expresiones de año que se eliminan de los términos de género antes de normalizarlos
static YEAR_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\d{4}\s*(?:-|–|~|to)\s*\d{4}|(?:'?\d{2}|\d{4})(?:'?s\b|\s*년대(?:\s*(?:초반|중반|후반|말))?)|\b(?:early|mid|late)\b-?",
    )
    .expect("valid year expression regex")
});

/// Parte de la década que selecciona un modificador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecadePart {
    Early,
    Mid,
    Late,
}

/// Extrae un rango de años inclusivo del texto, o `None` si no hay ninguno.
///
/// Función pura: misma entrada, misma salida.
pub fn extract_year_range(text: &str) -> Option<YearRange> {
    let text = text.to_lowercase();

    if let Some(caps) = EXPLICIT_RANGE.captures(&text) {
        let from: i32 = caps[1].parse().ok()?;
        let to: i32 = caps[2].parse().ok()?;
        return Some(YearRange::new(from, to));
    }

    let decade_start = if let Some(caps) = FOUR_DIGIT_DECADE.captures(&text) {
        caps[1].parse::<i32>().ok()? * 10
    } else if let Some(caps) = TWO_DIGIT_DECADE.captures(&text) {
        let two_digits = caps[1].parse::<i32>().ok()? * 10;
        if two_digits <= 29 {
            2000 + two_digits
        } else {
            1900 + two_digits
        }
    } else {
        return None;
    };

    let decade = YearRange::new(decade_start, decade_start + 9);
    Some(match decade_part(&text) {
        Some(DecadePart::Early) => YearRange::new(decade.from, decade.from + 2),
        Some(DecadePart::Mid) => YearRange::new(decade.from + 3, decade.from + 6),
        Some(DecadePart::Late) => YearRange::new(decade.to - 2, decade.to),
        None => decade,
    })
}

fn decade_part(text: &str) -> Option<DecadePart> {
    if EARLY.is_match(text) {
        Some(DecadePart::Early)
    } else if MID.is_match(text) {
        Some(DecadePart::Mid)
    } else if LATE.is_match(text) {
        Some(DecadePart::Late)
    } else {
        None
    }
}

/// Quita del término las expresiones de año ("90년대", "late 80s", "1990-1999")
pub fn strip_year_expressions(text: &str) -> String {
    let lowered = text.to_lowercase();
    YEAR_EXPRESSION
        .replace_all(&lowered, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

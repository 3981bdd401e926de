//! Price text normalization for European-formatted listing prices.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Parses the first number in a rendered price such as `"1 299,50 zł"`.
///
/// Whitespace (including non-breaking spaces) is ignored. When both `,` and
/// `.` appear, whichever comes last is the decimal separator and the other is
/// a thousands separator. A single separator followed by one or two digits is
/// decimal; any other use is treated as grouping.
///
/// Returns `None` when the text contains no digits.
#[must_use]
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    let start = compact.find(|c: char| c.is_ascii_digit())?;
    let run: &str = {
        let tail = &compact[start..];
        let end = tail
            .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
            .unwrap_or(tail.len());
        tail[..end].trim_end_matches([',', '.'])
    };

    let decimal_sep = match (run.rfind(','), run.rfind('.')) {
        (Some(comma), Some(dot)) => Some(if comma > dot { ',' } else { '.' }),
        (Some(_), None) => lone_decimal(run, ','),
        (None, Some(_)) => lone_decimal(run, '.'),
        (None, None) => None,
    };

    let normalized: String = match decimal_sep {
        Some(sep) => {
            let split = run.rfind(sep)?;
            let (int_part, frac_part) = run.split_at(split);
            let digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
            format!("{digits}.{}", &frac_part[1..])
        }
        None => run.chars().filter(char::is_ascii_digit).collect(),
    };

    Decimal::from_str(&normalized).ok()
}

/// `Some(sep)` if `sep` occurs exactly once with one or two digits after it.
fn lone_decimal(run: &str, sep: char) -> Option<char> {
    if run.matches(sep).count() != 1 {
        return None;
    }
    let after = run.rsplit(sep).next().unwrap_or_default();
    matches!(after.len(), 1 | 2).then_some(sep)
}

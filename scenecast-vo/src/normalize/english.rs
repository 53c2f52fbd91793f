//! English spoken-form readings
//!
//! Fallback conventions for scripts outside the Korean locale: cardinal
//! words for counts, ordinal day + month name + "twenty twenty-four" style
//! years for dates, digit-by-digit phone numbers, dollar/cent expansion
//! for currency.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Candidate, NormalizationCategory};

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn small_number(n: u64) -> String {
    if n < 20 {
        ONES[n as usize].to_string()
    } else {
        let tens = TENS[(n / 10) as usize];
        let units = n % 10;
        if units == 0 {
            tens.to_string()
        } else {
            format!("{}-{}", tens, ONES[units as usize])
        }
    }
}

/// Cardinal reading of an integer ("two thousand twenty-four")
pub fn cardinal(n: u64) -> String {
    if n == 0 {
        return "zero".to_string();
    }

    let mut parts = Vec::new();
    let mut remaining = n;
    for (unit, label) in [
        (1_000_000_000, "billion"),
        (1_000_000, "million"),
        (1_000, "thousand"),
    ] {
        if remaining >= unit {
            parts.push(format!("{} {}", cardinal(remaining / unit), label));
            remaining %= unit;
        }
    }
    if remaining >= 100 {
        parts.push(format!("{} hundred", ONES[(remaining / 100) as usize]));
        remaining %= 100;
    }
    if remaining > 0 {
        parts.push(small_number(remaining));
    }
    parts.join(" ")
}

/// Ordinal reading of a day of month ("fifteenth")
fn ordinal(n: u64) -> String {
    match n {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        5 => "fifth".to_string(),
        8 => "eighth".to_string(),
        9 => "ninth".to_string(),
        12 => "twelfth".to_string(),
        20 => "twentieth".to_string(),
        30 => "thirtieth".to_string(),
        31 => "thirty-first".to_string(),
        21..=29 => format!("twenty-{}", ordinal(n - 20)),
        n if n < 20 => format!("{}th", ONES[n as usize]),
        _ => format!("{}", n),
    }
}

/// Spoken year ("twenty twenty-four", "nineteen ninety-nine")
fn year_words(year: u64) -> String {
    if (2000..2010).contains(&year) {
        // The first decade of the 2000s reads as a plain cardinal
        return cardinal(year);
    }
    if (1000..10_000).contains(&year) {
        let century = year / 100;
        let remainder = year % 100;
        if remainder == 0 {
            format!("{} hundred", cardinal(century))
        } else if remainder < 10 {
            format!("{} oh {}", cardinal(century), ONES[remainder as usize])
        } else {
            format!("{} {}", cardinal(century), small_number(remainder))
        }
    } else {
        cardinal(year)
    }
}

fn digit_words(digits: &str) -> String {
    digits
        .chars()
        .filter(|c| c.is_ascii_digit())
        .map(|c| ONES[c.to_digit(10).unwrap() as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}[-. ]\d{3,4}[-. ]\d{4}\b|\b\d{10,11}\b").unwrap());

static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$](\d{1,3}(?:,\d{3})*|\d+)(?:\.(\d{2}))?").unwrap());

static AGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})[- ]years?[- ]old\b|\baged (\d{1,3})\b").unwrap());

static COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,3}(?:,\d{3})*|\d+)\b").unwrap());

fn parse_grouped(digits: &str) -> Option<u64> {
    digits.replace(',', "").parse().ok()
}

/// Collect all English spoken-form candidates in the text
pub fn candidates(text: &str) -> Vec<Candidate> {
    let mut found = Vec::new();

    for caps in ISO_DATE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let (Some(y), Some(m), Some(d)) = (
            parse_grouped(&caps[1]),
            parse_grouped(&caps[2]),
            parse_grouped(&caps[3]),
        ) else {
            continue;
        };
        if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
            continue;
        }
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Date,
            replacement: format!("{} {} {}", MONTHS[(m - 1) as usize], ordinal(d), year_words(y)),
        });
    }
    for caps in SLASH_DATE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let (Some(m), Some(d), Some(y)) = (
            parse_grouped(&caps[1]),
            parse_grouped(&caps[2]),
            parse_grouped(&caps[3]),
        ) else {
            continue;
        };
        if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
            continue;
        }
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Date,
            replacement: format!("{} {} {}", MONTHS[(m - 1) as usize], ordinal(d), year_words(y)),
        });
    }

    for m in PHONE.find_iter(text) {
        found.push(Candidate {
            start: m.start(),
            end: m.end(),
            category: NormalizationCategory::Phone,
            replacement: digit_words(m.as_str()),
        });
    }

    for caps in CURRENCY.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Some(dollars) = parse_grouped(&caps[1]) else {
            continue;
        };
        let mut replacement = format!("{} dollars", cardinal(dollars));
        if dollars == 1 {
            replacement = "one dollar".to_string();
        }
        if let Some(cents) = caps.get(2).and_then(|c| parse_grouped(c.as_str())) {
            if cents > 0 {
                replacement.push_str(&format!(" and {} cents", cardinal(cents)));
            }
        }
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Currency,
            replacement,
        });
    }

    for caps in AGE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Some(age) = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| parse_grouped(m.as_str()))
        else {
            continue;
        };
        let replacement = whole
            .as_str()
            .replacen(&age.to_string(), &cardinal(age), 1);
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Age,
            replacement,
        });
    }

    for m in COUNT.find_iter(text) {
        let Some(n) = parse_grouped(m.as_str()) else {
            continue;
        };
        found.push(Candidate {
            start: m.start(),
            end: m.end(),
            category: NormalizationCategory::Count,
            replacement: cardinal(n),
        });
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinal_readings() {
        assert_eq!(cardinal(0), "zero");
        assert_eq!(cardinal(15), "fifteen");
        assert_eq!(cardinal(42), "forty-two");
        assert_eq!(cardinal(100), "one hundred");
        assert_eq!(cardinal(2024), "two thousand twenty-four");
        assert_eq!(cardinal(1_500_000), "one million five hundred thousand");
    }

    #[test]
    fn year_reading_splits_centuries() {
        assert_eq!(year_words(2024), "twenty twenty-four");
        assert_eq!(year_words(1999), "nineteen ninety-nine");
        assert_eq!(year_words(1900), "nineteen hundred");
        assert_eq!(year_words(2000), "two thousand");
        assert_eq!(year_words(2005), "two thousand five");
        assert_eq!(year_words(1907), "nineteen oh seven");
    }

    #[test]
    fn iso_date_candidate() {
        let found = candidates("Launch on 2024-01-15 at noon");
        let date = found
            .iter()
            .find(|c| c.category == NormalizationCategory::Date)
            .unwrap();
        assert_eq!(date.replacement, "January fifteenth twenty twenty-four");
    }

    #[test]
    fn phone_reads_digit_by_digit() {
        let found = candidates("Call 555-867-5309 today");
        let phone = found
            .iter()
            .find(|c| c.category == NormalizationCategory::Phone)
            .unwrap();
        assert!(phone.replacement.starts_with("five five five eight six seven"));
    }

    #[test]
    fn currency_expands_cents() {
        let found = candidates("It costs $1,250.50 total");
        let currency = found
            .iter()
            .find(|c| c.category == NormalizationCategory::Currency)
            .unwrap();
        assert_eq!(
            currency.replacement,
            "one thousand two hundred fifty dollars and fifty cents"
        );
    }
}

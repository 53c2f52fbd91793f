//! Korean spoken-form readings
//!
//! Korean reads the same digit sequence differently depending on its
//! grammatical role. Dates, currency, and phone numbers use Sino-Korean
//! readings (phone numbers digit-by-digit with 공 for zero); bare object
//! counts and ages before native counters use native-Korean determiner
//! forms. Picking the wrong convention is the single largest source of
//! round-trip verification failures, so the pattern set below is explicit
//! about which reading each category gets.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Candidate, NormalizationCategory};

const SINO_DIGITS: [&str; 10] = ["영", "일", "이", "삼", "사", "오", "육", "칠", "팔", "구"];

/// Native-Korean determiner forms used directly before a counter word
const NATIVE_UNITS: [&str; 10] = ["", "한", "두", "세", "네", "다섯", "여섯", "일곱", "여덟", "아홉"];

const NATIVE_TENS: [&str; 10] = ["", "열", "스물", "서른", "마흔", "쉰", "예순", "일흔", "여든", "아흔"];

/// Sino-Korean reading of an integer (이천이십사 for 2024)
///
/// Leading 일 is dropped before 십/백/천 and before 만, kept before 억,
/// matching ordinary speech.
pub fn sino(n: u64) -> String {
    if n == 0 {
        return SINO_DIGITS[0].to_string();
    }
    if n >= 100_000_000 {
        let high = n / 100_000_000;
        let rest = n % 100_000_000;
        let mut result = format!("{}억", sino(high));
        if rest > 0 {
            result.push_str(&sino(rest));
        }
        return result;
    }
    if n >= 10_000 {
        let high = n / 10_000;
        let rest = n % 10_000;
        let mut result = if high == 1 {
            "만".to_string()
        } else {
            format!("{}만", sino(high))
        };
        if rest > 0 {
            result.push_str(&sino(rest));
        }
        return result;
    }

    let mut result = String::new();
    let mut remaining = n;
    for (unit, label) in [(1_000, "천"), (100, "백"), (10, "십")] {
        if remaining >= unit {
            let count = remaining / unit;
            if count > 1 {
                result.push_str(SINO_DIGITS[count as usize]);
            }
            result.push_str(label);
            remaining %= unit;
        }
    }
    if remaining > 0 {
        result.push_str(SINO_DIGITS[remaining as usize]);
    }
    result
}

/// Digit-by-digit Sino reading with 공 for zero (phone number convention)
pub fn sino_digits(digits: &str) -> String {
    digits
        .chars()
        .filter(|c| c.is_ascii_digit())
        .map(|c| {
            let d = c.to_digit(10).unwrap() as usize;
            if d == 0 {
                "공"
            } else {
                SINO_DIGITS[d]
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Native-Korean determiner reading used before counters (세 for 3)
///
/// Native readings fade out above two digits; larger counts fall back to
/// the Sino reading, which is also how they are spoken.
pub fn native_count(n: u64) -> String {
    if n == 0 || n >= 100 {
        return sino(n);
    }
    let tens = (n / 10) as usize;
    let units = (n % 10) as usize;
    if n == 20 {
        // 스무 only as a bare determiner (스무 개), 스물한 for 21
        return "스무".to_string();
    }
    let mut result = String::new();
    result.push_str(NATIVE_TENS[tens]);
    result.push_str(NATIVE_UNITS[units]);
    result
}

/// Sino reading of a year/month/day date span
fn date_reading(year: Option<u64>, month: Option<u64>, day: Option<u64>) -> String {
    let mut parts = Vec::new();
    if let Some(y) = year {
        parts.push(format!("{}년", sino(y)));
    }
    if let Some(m) = month {
        // 6월 and 10월 keep their irregular readings 유월/시월
        let reading = match m {
            6 => "유".to_string(),
            10 => "시".to_string(),
            other => sino(other),
        };
        parts.push(format!("{}월", reading));
    }
    if let Some(d) = day {
        parts.push(format!("{}일", sino(d)));
    }
    parts.join(" ")
}

static FULL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})년\s*(\d{1,2})월\s*(\d{1,2})일").unwrap());

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})월\s*(\d{1,2})일").unwrap());

static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})년").unwrap());

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2,4}-\d{3,4}-\d{4}|\b0\d{9,10}\b").unwrap());

static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)\s*(원|달러|유로|엔)").unwrap());

static AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(살|세)").unwrap());

static COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(개|명|마리|번|권|잔|대|병|장|켤레|시간)").unwrap());

fn parse_grouped(digits: &str) -> Option<u64> {
    digits.replace(',', "").parse().ok()
}

/// Collect all Korean spoken-form candidates in the text
///
/// Candidates may overlap; the caller resolves overlaps by span and
/// category priority.
pub fn candidates(text: &str) -> Vec<Candidate> {
    let mut found = Vec::new();

    for caps in FULL_DATE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let (Some(y), Some(m), Some(d)) = (
            parse_grouped(&caps[1]),
            parse_grouped(&caps[2]),
            parse_grouped(&caps[3]),
        ) else {
            continue;
        };
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Date,
            replacement: date_reading(Some(y), Some(m), Some(d)),
        });
    }
    for caps in MONTH_DAY.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let (Some(m), Some(d)) = (parse_grouped(&caps[1]), parse_grouped(&caps[2])) else {
            continue;
        };
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Date,
            replacement: date_reading(None, Some(m), Some(d)),
        });
    }
    for caps in YEAR_ONLY.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Some(y) = parse_grouped(&caps[1]) else {
            continue;
        };
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Date,
            replacement: date_reading(Some(y), None, None),
        });
    }

    for m in PHONE.find_iter(text) {
        found.push(Candidate {
            start: m.start(),
            end: m.end(),
            category: NormalizationCategory::Phone,
            replacement: sino_digits(m.as_str()),
        });
    }

    for caps in CURRENCY.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Some(amount) = parse_grouped(&caps[1]) else {
            continue;
        };
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Currency,
            replacement: format!("{} {}", sino(amount), &caps[2]),
        });
    }

    for caps in AGE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Some(age) = parse_grouped(&caps[1]) else {
            continue;
        };
        // 세 is also the first syllable of words like 세트; only treat it
        // as the age counter when nothing Hangul follows it directly
        if &caps[2] == "세" {
            if let Some(next) = text[whole.end()..].chars().next() {
                if ('가'..='힣').contains(&next) {
                    continue;
                }
            }
        }
        // 살 takes the native reading, the formal counter 세 the Sino one
        let reading = if &caps[2] == "살" {
            native_count(age)
        } else {
            sino(age)
        };
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Age,
            replacement: format!("{} {}", reading, &caps[2]),
        });
    }

    for caps in COUNT.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Some(count) = parse_grouped(&caps[1]) else {
            continue;
        };
        found.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            category: NormalizationCategory::Count,
            replacement: format!("{} {}", native_count(count), &caps[2]),
        });
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sino_readings() {
        assert_eq!(sino(0), "영");
        assert_eq!(sino(1), "일");
        assert_eq!(sino(15), "십오");
        assert_eq!(sino(20), "이십");
        assert_eq!(sino(2000), "이천");
        assert_eq!(sino(2024), "이천이십사");
        assert_eq!(sino(10_000), "만");
        assert_eq!(sino(35_000), "삼만오천");
        assert_eq!(sino(100_000_000), "일억");
    }

    #[test]
    fn digit_by_digit_uses_gong_for_zero() {
        assert_eq!(sino_digits("010"), "공 일 공");
        assert_eq!(sino_digits("010-1234-5678"), "공 일 공 일 이 삼 사 오 육 칠 팔");
    }

    #[test]
    fn native_determiner_forms() {
        assert_eq!(native_count(1), "한");
        assert_eq!(native_count(2), "두");
        assert_eq!(native_count(3), "세");
        assert_eq!(native_count(4), "네");
        assert_eq!(native_count(10), "열");
        assert_eq!(native_count(12), "열두");
        assert_eq!(native_count(20), "스무");
        assert_eq!(native_count(21), "스물한");
        assert_eq!(native_count(35), "서른다섯");
        // Large counts revert to the Sino reading
        assert_eq!(native_count(120), "백이십");
    }

    #[test]
    fn irregular_month_readings() {
        assert_eq!(date_reading(None, Some(6), Some(1)), "유월 일일");
        assert_eq!(date_reading(None, Some(10), Some(9)), "시월 구일");
    }

    #[test]
    fn full_date_candidate_spans_whole_date() {
        let text = "2024년 1월 15일";
        let found = candidates(text);
        let date = found
            .iter()
            .find(|c| c.category == NormalizationCategory::Date && c.start == 0)
            .unwrap();
        assert_eq!(&text[date.start..date.end], "2024년 1월 15일");
        assert_eq!(date.replacement, "이천이십사년 일월 십오일");
    }

    #[test]
    fn count_and_currency_candidates() {
        let found = candidates("사과 3개를 2,000원에 샀습니다");

        let count = found
            .iter()
            .find(|c| c.category == NormalizationCategory::Count)
            .unwrap();
        assert_eq!(count.replacement, "세 개");

        let currency = found
            .iter()
            .find(|c| c.category == NormalizationCategory::Currency)
            .unwrap();
        assert_eq!(currency.replacement, "이천 원");
    }
}

//! Relative date resolution for `before:` / `after:` filters.
//!
//! Phrases are resolved against a caller-supplied `now` and always lean
//! towards the past, since mail search looks backwards: `monday` is the most
//! recent Monday, `march` the most recent March.

use chrono::{DateTime, Datelike, Duration, Month, Months, NaiveDate, TimeZone, Utc, Weekday};

/// Resolves a date phrase into a concrete instant.
///
/// Implementations must be pure: the same phrase and `now` give the same
/// answer. `None` means the phrase was not understood.
pub trait DateResolver {
    fn resolve(&self, phrase: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

impl<F> DateResolver for F
where
    F: Fn(&str, DateTime<Utc>) -> Option<DateTime<Utc>>,
{
    fn resolve(&self, phrase: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self(phrase, now)
    }
}

/// Default resolver for absolute dates and common English relative phrases.
///
/// Understood (case-insensitive):
///
/// - `now`, `today`, `yesterday`
/// - `3 days ago`, `a week ago`, `2 months ago` (minute, hour, day, week, month, year)
/// - `last week`, `last month`, `last year`, `last friday`
/// - `this week`, `this month`, `this year`
/// - weekday and month names: `monday`, `mar`, `march 5`, `march 2023`, `march 5, 2023`
/// - `2024-01-31`, `2024/01/31`, `01/31/2024`, `2024-01`, `2024`, RFC 3339
#[derive(Debug, Default, Clone, Copy)]
pub struct PastDateResolver;

impl DateResolver for PastDateResolver {
    fn resolve(&self, phrase: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let phrase = phrase.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(phrase) {
            return Some(at.with_timezone(&Utc));
        }

        let lowered = phrase.to_ascii_lowercase().replace(',', " ");
        let words: Vec<&str> = lowered.split_whitespace().collect();
        match words.as_slice() {
            [] => None,
            [single] => absolute(single).or_else(|| single_word(single, now)),
            ["last", unit] => last(unit, now),
            ["this", unit] => this(unit, now),
            [count, unit, "ago"] => ago(count, unit, now),
            [month, rest @ ..] => month_phrase(month, rest, now),
        }
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn start_of_day(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    midnight(now.date_naive())
}

fn absolute(word: &str) -> Option<DateTime<Utc>> {
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(word, format) {
            return midnight(date);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", word), "%Y-%m-%d") {
        return midnight(date);
    }
    if word.len() == 4 && word.bytes().all(|b| b.is_ascii_digit()) {
        return midnight(NaiveDate::from_ymd_opt(word.parse().ok()?, 1, 1)?);
    }
    None
}

fn single_word(word: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match word {
        "now" => Some(now),
        "today" => start_of_day(now),
        "yesterday" => start_of_day(now)?.checked_sub_signed(Duration::days(1)),
        _ => {
            if let Ok(weekday) = word.parse::<Weekday>() {
                return previous_weekday(weekday, now, false);
            }
            month_phrase(word, &[], now)
        }
    }
}

/// Most recent `weekday` on or before today; strictly before when `strict`.
fn previous_weekday(weekday: Weekday, now: DateTime<Utc>, strict: bool) -> Option<DateTime<Utc>> {
    let today = now.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut back = (today - target).rem_euclid(7);
    if strict && back == 0 {
        back = 7;
    }
    start_of_day(now)?.checked_sub_signed(Duration::days(back))
}

fn unit_name(unit: &str) -> &str {
    unit.strip_suffix('s').unwrap_or(unit)
}

fn ago(count: &str, unit: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let count: u32 = match count {
        "a" | "an" | "one" => 1,
        n => n.parse().ok()?,
    };
    let span = match unit_name(unit) {
        "minute" | "min" => Duration::minutes(count.into()),
        "hour" | "hr" => Duration::hours(count.into()),
        "day" => Duration::days(count.into()),
        "week" | "wk" => Duration::weeks(count.into()),
        "month" => return now.checked_sub_months(Months::new(count)),
        "year" | "yr" => return now.checked_sub_months(Months::new(count.checked_mul(12)?)),
        _ => return None,
    };
    now.checked_sub_signed(span)
}

fn last(unit: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match unit_name(unit) {
        "day" | "night" => start_of_day(now)?.checked_sub_signed(Duration::days(1)),
        "week" => now.checked_sub_signed(Duration::weeks(1)),
        "month" => now.checked_sub_months(Months::new(1)),
        "year" => now.checked_sub_months(Months::new(12)),
        other => previous_weekday(other.parse::<Weekday>().ok()?, now, true),
    }
}

fn this(unit: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = now.date_naive();
    match unit {
        "week" => {
            let back = today.weekday().num_days_from_monday();
            midnight(today.checked_sub_signed(Duration::days(back.into()))?)
        }
        "month" => midnight(today.with_day(1)?),
        "year" => midnight(NaiveDate::from_ymd_opt(today.year(), 1, 1)?),
        _ => None,
    }
}

/// `march`, `march 5`, `march 2023`, `march 5 2023`.
fn month_phrase(month: &str, rest: &[&str], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let month = month.parse::<Month>().ok()?.number_from_month();
    let numbers = rest
        .iter()
        .map(|word| word.parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (day, year) = match numbers.as_slice() {
        [] => (1, None),
        [year] if *year > 31 => (1, Some(*year)),
        [day] => (*day as u32, None),
        [day, year] => (*day as u32, Some(*year)),
        _ => return None,
    };

    let year = match year {
        Some(year) => year,
        None => {
            let candidate = NaiveDate::from_ymd_opt(now.year(), month, day)?;
            if candidate > now.date_naive() {
                now.year() - 1
            } else {
                now.year()
            }
        }
    };
    midnight(NaiveDate::from_ymd_opt(year, month, day)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Friday 2024-03-15 12:30 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn resolve(phrase: &str) -> Option<DateTime<Utc>> {
        PastDateResolver.resolve(phrase, now())
    }

    #[test]
    fn test_absolute_dates() {
        assert_eq!(resolve("2024-01-31"), Some(day(2024, 1, 31)));
        assert_eq!(resolve("2024/01/31"), Some(day(2024, 1, 31)));
        assert_eq!(resolve("01/31/2024"), Some(day(2024, 1, 31)));
        assert_eq!(resolve("2023-07"), Some(day(2023, 7, 1)));
        assert_eq!(resolve("2020"), Some(day(2020, 1, 1)));
        assert_eq!(
            resolve("2024-02-01T08:00:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_day_words() {
        assert_eq!(resolve("now"), Some(now()));
        assert_eq!(resolve("Today"), Some(day(2024, 3, 15)));
        assert_eq!(resolve("yesterday"), Some(day(2024, 3, 14)));
    }

    #[test]
    fn test_ago() {
        assert_eq!(resolve("3 days ago"), Some(day(2024, 3, 12) + Duration::minutes(12 * 60 + 30)));
        assert_eq!(resolve("a week ago"), Some(now() - Duration::weeks(1)));
        assert_eq!(resolve("2 hours ago"), Some(now() - Duration::hours(2)));
        assert_eq!(
            resolve("2 months ago"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap())
        );
        assert_eq!(
            resolve("1 year ago"),
            Some(Utc.with_ymd_and_hms(2023, 3, 15, 12, 30, 0).unwrap())
        );
        assert_eq!(resolve("3 fortnights ago"), None);
    }

    #[test]
    fn test_last_and_this() {
        assert_eq!(resolve("last week"), Some(now() - Duration::weeks(1)));
        assert_eq!(resolve("last friday"), Some(day(2024, 3, 8)));
        assert_eq!(resolve("last monday"), Some(day(2024, 3, 11)));
        assert_eq!(resolve("this week"), Some(day(2024, 3, 11)));
        assert_eq!(resolve("this month"), Some(day(2024, 3, 1)));
        assert_eq!(resolve("this year"), Some(day(2024, 1, 1)));
    }

    #[test]
    fn test_weekdays_lean_past() {
        assert_eq!(resolve("friday"), Some(day(2024, 3, 15)));
        assert_eq!(resolve("monday"), Some(day(2024, 3, 11)));
        assert_eq!(resolve("sat"), Some(day(2024, 3, 9)));
    }

    #[test]
    fn test_months_lean_past() {
        assert_eq!(resolve("march"), Some(day(2024, 3, 1)));
        assert_eq!(resolve("december"), Some(day(2023, 12, 1)));
        assert_eq!(resolve("mar 20"), Some(day(2023, 3, 20)));
        assert_eq!(resolve("jan 2022"), Some(day(2022, 1, 1)));
        assert_eq!(resolve("January 5, 2022"), Some(day(2022, 1, 5)));
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("whenever"), None);
        assert_eq!(resolve("2024-13-45"), None);
        assert_eq!(resolve("march the fifth"), None);
    }

    #[test]
    fn test_closure_resolver() {
        let fixed = |_: &str, _: DateTime<Utc>| Some(day(2000, 1, 1));
        assert_eq!(fixed.resolve("anything", now()), Some(day(2000, 1, 1)));
    }
}

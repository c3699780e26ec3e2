//! Canonical formats for dates, times, phones, emails and URLs.
//!
//! Every transformation is idempotent: running it on its own output returns
//! the output unchanged. Values that cannot be parsed are kept as they are and
//! reported with a `normalization_failed` warning.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::event::{EventFields, FieldName};
use crate::models::result::{Warning, WarningType};

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$").unwrap();
    static ref SLASH_DATE: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})$").unwrap();
    static ref DOT_DATE: Regex = Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4}|\d{2})$").unwrap();

    // "Saturday, March 15th, 2026", "Mar. 15", "March 15 2026"
    static ref MONTH_FIRST: Regex = Regex::new(
        r"(?i)^(?:[a-z]+\.?,?\s+)??([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?$"
    ).unwrap();

    // "Sat 15 March 2026", "15th of March", "15 Mar, 2026"
    static ref DAY_FIRST: Regex = Regex::new(
        r"(?i)^(?:[a-z]+\.?,?\s+)?(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]{3,9})\.?(?:,?\s+(\d{4}))?$"
    ).unwrap();

    static ref CLOCK_TIME: Regex = Regex::new(
        r"(?i)^(\d{1,2})(?:[:.h](\d{2}))?\s*(?:([ap])\.?\s*m\.?)?$"
    ).unwrap();

    static ref TIME_RANGE_SEP: Regex = Regex::new(r"(?i)\s*[-\u{2013}\u{2014}]\s*|\s+(?:to|until|till)\s+").unwrap();
}

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

const WEEKDAYS: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

/// Fields after normalization plus any failures.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub fields: EventFields,
    pub warnings: Vec<Warning>,
}

/// Applies per-field canonicalization.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    /// Anchor for year-less dates; today in the request timezone when unset.
    reference_date: Option<NaiveDate>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve year-less dates against a fixed day.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Normalize every supported field. Confidence and source are untouched.
    ///
    /// `timezone` is an IANA name; year-less dates resolve against today there.
    pub fn normalize(&self, mut fields: EventFields, timezone: &str) -> Normalized {
        let reference = self
            .reference_date
            .unwrap_or_else(|| today_in(timezone, Utc::now()));
        let mut warnings = Vec::new();

        for name in FieldName::ALL {
            let field = fields.get_mut(name);
            let Some(value) = field.value.as_deref() else {
                continue;
            };

            let result = match name {
                FieldName::Date => normalize_date(value, reference).ok_or("unrecognized date"),
                FieldName::Time => normalize_time(value).ok_or("unrecognized time"),
                FieldName::ContactPhone => normalize_phone(value).ok_or("no digits in phone number"),
                FieldName::ContactEmail => Ok(normalize_email(value)),
                FieldName::Website | FieldName::RegistrationLink => Ok(normalize_url(value)),
                _ => continue,
            };

            match result {
                Ok(normalized) => {
                    if normalized != value {
                        debug!(field = %name, from = value, to = %normalized, "Normalized field");
                    }
                    field.value = Some(normalized);
                }
                Err(reason) => {
                    warnings.push(
                        Warning::new(WarningType::NormalizationFailed)
                            .with_fields(&[name])
                            .with_message(format!("{reason}: {value}")),
                    );
                }
            }
        }

        Normalized { fields, warnings }
    }
}

/// The calendar day of `now` in `timezone`. Unknown names fall back to UTC.
pub fn today_in(timezone: &str, now: DateTime<Utc>) -> NaiveDate {
    match timezone.trim().parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).date_naive(),
        Err(_) => {
            warn!(timezone, "Unknown timezone, resolving dates in UTC");
            now.date_naive()
        }
    }
}

/// Mean confidence of non-null fields, 0 when there are none.
pub fn aggregate_confidence(fields: &EventFields) -> f32 {
    fields.mean_confidence().unwrap_or(0.0) as f32
}

/// Parse a date into `YYYY-MM-DD`.
pub fn normalize_date(value: &str, reference: NaiveDate) -> Option<String> {
    let value = value.trim();

    let date = if let Some(c) = ISO_DATE.captures(value) {
        NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
    } else if let Some(c) = SLASH_DATE.captures(value) {
        NaiveDate::from_ymd_opt(full_year(&c[3])?, c[1].parse().ok()?, c[2].parse().ok()?)
    } else if let Some(c) = DOT_DATE.captures(value) {
        NaiveDate::from_ymd_opt(full_year(&c[3])?, c[2].parse().ok()?, c[1].parse().ok()?)
    } else if let Some(c) = MONTH_FIRST.captures(value) {
        let month = month_from_name(&c[1])?;
        let day: u32 = c[2].parse().ok()?;
        named_date(month, day, c.get(3).map(|m| m.as_str()), reference)
    } else if let Some(c) = DAY_FIRST.captures(value) {
        let month = month_from_name(&c[2])?;
        let day: u32 = c[1].parse().ok()?;
        named_date(month, day, c.get(3).map(|m| m.as_str()), reference)
    } else {
        None
    }?;

    if MONTH_FIRST.is_match(value) || DAY_FIRST.is_match(value) {
        check_weekday_prefix(value)?;
    }

    Some(date.format("%Y-%m-%d").to_string())
}

fn full_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + year } else { year })
}

fn month_from_name(word: &str) -> Option<u32> {
    let word = word.trim_end_matches('.').to_lowercase();
    if word == "sept" {
        return Some(9);
    }
    if word.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(word.as_str()))
        .map(|i| i as u32 + 1)
}

/// A leading word before the month/day must be a weekday.
fn check_weekday_prefix(value: &str) -> Option<()> {
    let first = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()?
        .trim_end_matches('.')
        .to_lowercase();
    let is_weekday = first.len() >= 3 && WEEKDAYS.iter().any(|d| d.starts_with(first.as_str()));
    let is_date_part = first.chars().next().is_some_and(|c| c.is_ascii_digit())
        || month_from_name(&first).is_some();
    (is_weekday || is_date_part).then_some(())
}

fn named_date(month: u32, day: u32, year: Option<&str>, reference: NaiveDate) -> Option<NaiveDate> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year.parse().ok()?, month, day);
    }

    // Next occurrence on or after the reference day; Feb 29 may skip years.
    (reference.year()..reference.year() + 8)
        .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
        .find(|d| *d >= reference)
}

/// Parse a time or time range into `HH:MM` or `HH:MM-HH:MM`.
pub fn normalize_time(value: &str) -> Option<String> {
    let value = value.trim();

    let parts: Vec<&str> = TIME_RANGE_SEP.split(value).collect();
    match parts.as_slice() {
        [single] => {
            let t = parse_clock(single)?;
            Some(t.resolve(None)?.to_string())
        }
        [start, end] => {
            let start = parse_clock(start)?;
            let end = parse_clock(end)?;
            let end_time = end.resolve(None)?;
            // "7-10pm": the start borrows the end's meridiem when it fits.
            let inherited = match (start.meridiem, end.meridiem) {
                (None, Some(m)) if start.hour <= end.hour => Some(m),
                _ => None,
            };
            let start_time = start.resolve(inherited)?;
            Some(format!("{}-{}", start_time, end_time))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u32,
    minute: Option<u32>,
    meridiem: Option<Meridiem>,
}

struct HhMm(u32, u32);

impl std::fmt::Display for HhMm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0, self.1)
    }
}

impl Clock {
    fn resolve(&self, fallback: Option<Meridiem>) -> Option<HhMm> {
        let minute = self.minute.unwrap_or(0);
        if minute > 59 {
            return None;
        }
        match self.meridiem.or(fallback) {
            Some(m) => {
                if self.hour == 0 || self.hour > 12 {
                    return None;
                }
                let hour = match (m, self.hour) {
                    (Meridiem::Am, 12) => 0,
                    (Meridiem::Am, h) => h,
                    (Meridiem::Pm, 12) => 12,
                    (Meridiem::Pm, h) => h + 12,
                };
                Some(HhMm(hour, minute))
            }
            // A bare hour without minutes is too ambiguous.
            None if self.minute.is_none() => None,
            None if self.hour > 23 => None,
            None => Some(HhMm(self.hour, minute)),
        }
    }
}

fn parse_clock(raw: &str) -> Option<Clock> {
    let raw = raw.trim().to_lowercase();
    match raw.as_str() {
        "noon" | "12 noon" => {
            return Some(Clock { hour: 12, minute: Some(0), meridiem: Some(Meridiem::Pm) });
        }
        "midnight" | "12 midnight" => {
            return Some(Clock { hour: 12, minute: Some(0), meridiem: Some(Meridiem::Am) });
        }
        _ => {}
    }

    let c = CLOCK_TIME.captures(&raw)?;
    Some(Clock {
        hour: c[1].parse().ok()?,
        minute: c.get(2).and_then(|m| m.as_str().parse().ok()),
        meridiem: c.get(3).map(|m| {
            if m.as_str().eq_ignore_ascii_case("a") {
                Meridiem::Am
            } else {
                Meridiem::Pm
            }
        }),
    })
}

/// `+<digits>` for international or NANP numbers, otherwise bare digits.
pub fn normalize_phone(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let formatted = if value.trim_start().starts_with('+') {
        format!("+{digits}")
    } else if digits.len() == 10 {
        format!("+1{digits}")
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("+{digits}")
    } else {
        digits
    };
    Some(formatted)
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Prepend `https://` to scheme-less, domain-like values.
pub fn normalize_url(value: &str) -> String {
    let url = value.trim();
    let lower = url.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return url.to_string();
    }
    if url.contains('.') && !url.contains(char::is_whitespace) {
        format!("https://{url}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::Field;
    use pretty_assertions::assert_eq;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()
    }

    fn date(value: &str) -> Option<String> {
        normalize_date(value, reference())
    }

    #[test]
    fn test_dates() {
        assert_eq!(date("2026-03-15").as_deref(), Some("2026-03-15"));
        assert_eq!(date("2026/3/5").as_deref(), Some("2026-03-05"));
        assert_eq!(date("3/15/2026").as_deref(), Some("2026-03-15"));
        assert_eq!(date("3/15/26").as_deref(), Some("2026-03-15"));
        assert_eq!(date("15.03.2026").as_deref(), Some("2026-03-15"));
        assert_eq!(date("March 15, 2026").as_deref(), Some("2026-03-15"));
        assert_eq!(date("Saturday, March 15th, 2026").as_deref(), Some("2026-03-15"));
        assert_eq!(date("15 March 2026").as_deref(), Some("2026-03-15"));
        assert_eq!(date("Sat 15th of Mar 2026").as_deref(), Some("2026-03-15"));
        assert_eq!(date("Sept. 4 2026").as_deref(), Some("2026-09-04"));
    }

    #[test]
    fn test_yearless_dates_roll_forward() {
        // Still ahead this year.
        assert_eq!(date("August 1").as_deref(), Some("2026-08-01"));
        // Same day counts as upcoming.
        assert_eq!(date("June 10").as_deref(), Some("2026-06-10"));
        // Already passed, so next year.
        assert_eq!(date("Friday, March 13").as_deref(), Some("2027-03-13"));
        assert_eq!(date("Feb 29").as_deref(), Some("2028-02-29"));
    }

    #[test]
    fn test_unparseable_dates() {
        for value in ["next weekend", "TBA", "13/45/2026", "Holiday 15 March", "2026-02-30"] {
            assert_eq!(date(value), None, "parsed {value:?}");
        }
    }

    #[test]
    fn test_times() {
        assert_eq!(normalize_time("19:00").as_deref(), Some("19:00"));
        assert_eq!(normalize_time("7pm").as_deref(), Some("19:00"));
        assert_eq!(normalize_time("7:30 p.m.").as_deref(), Some("19:30"));
        assert_eq!(normalize_time("12am").as_deref(), Some("00:00"));
        assert_eq!(normalize_time("noon").as_deref(), Some("12:00"));
        assert_eq!(normalize_time("Midnight").as_deref(), Some("00:00"));
        assert_eq!(normalize_time("9am - 5pm").as_deref(), Some("09:00-17:00"));
        assert_eq!(normalize_time("7-10pm").as_deref(), Some("19:00-22:00"));
        assert_eq!(normalize_time("20:00 to 23:30").as_deref(), Some("20:00-23:30"));
        assert_eq!(normalize_time("11am-2pm").as_deref(), Some("11:00-14:00"));
    }

    #[test]
    fn test_unparseable_times() {
        for value in ["evening", "7", "25:00", "13pm", "doors open at 7"] {
            assert_eq!(normalize_time(value), None, "parsed {value:?}");
        }
    }

    #[test]
    fn test_phones() {
        assert_eq!(normalize_phone("(555) 123-4567").as_deref(), Some("+15551234567"));
        assert_eq!(normalize_phone("1-555-123-4567").as_deref(), Some("+15551234567"));
        assert_eq!(normalize_phone("+48 601 234 567").as_deref(), Some("+48601234567"));
        assert_eq!(normalize_phone("123-4567").as_deref(), Some("1234567"));
        assert_eq!(normalize_phone("call us"), None);
    }

    #[test]
    fn test_emails_and_urls() {
        assert_eq!(normalize_email("  Info@Jazz.ORG "), "info@jazz.org");
        assert_eq!(normalize_url("jazz.org/tickets"), "https://jazz.org/tickets");
        assert_eq!(normalize_url("www.jazz.org"), "https://www.jazz.org");
        assert_eq!(normalize_url("HTTP://jazz.org"), "HTTP://jazz.org");
        assert_eq!(normalize_url("see poster"), "see poster");
    }

    #[test]
    fn test_idempotent() {
        let dates = ["March 15", "3/15/26", "15.03.2026", "Sat, Mar 14 2026"];
        for value in dates {
            let once = date(value).unwrap();
            assert_eq!(date(&once).as_deref(), Some(once.as_str()));
        }

        let times = ["7pm", "9am - 5pm", "7-10pm", "noon", "08:15"];
        for value in times {
            let once = normalize_time(value).unwrap();
            assert_eq!(normalize_time(&once).as_deref(), Some(once.as_str()));
        }

        for value in ["(555) 123-4567", "+44 20 7946 0958", "123-4567"] {
            let once = normalize_phone(value).unwrap();
            assert_eq!(normalize_phone(&once).as_deref(), Some(once.as_str()));
        }

        let once = normalize_url(" jazz.org ");
        assert_eq!(normalize_url(&once), once);
    }

    #[test]
    fn test_normalize_fields_and_warnings() {
        let mut fields = EventFields::default();
        fields.set(FieldName::Date, Field::new("March 15, 2026", 0.9, "top"));
        fields.set(FieldName::Time, Field::new("after sunset", 0.4, "middle"));
        fields.set(FieldName::ContactEmail, Field::new("Info@Jazz.org", 0.8, "bottom"));
        fields.set(FieldName::Description, Field::new("  Live music  ", 0.7, "middle"));

        let normalizer = Normalizer::new().with_reference_date(reference());
        let out = normalizer.normalize(fields, "UTC");

        assert_eq!(out.fields.date.value.as_deref(), Some("2026-03-15"));
        assert_eq!(out.fields.date.confidence, 0.9);
        assert_eq!(out.fields.time.value.as_deref(), Some("after sunset"));
        assert_eq!(out.fields.contact_email.value.as_deref(), Some("info@jazz.org"));
        assert_eq!(out.fields.description.value.as_deref(), Some("  Live music  "));

        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind, WarningType::NormalizationFailed);
        assert_eq!(out.warnings[0].fields, Some(vec!["time".to_string()]));

        // A second pass changes nothing and warns the same way.
        let again = normalizer.normalize(out.fields.clone(), "UTC");
        assert_eq!(again.fields, out.fields);
        assert_eq!(again.warnings, out.warnings);
    }

    #[test]
    fn test_aggregate_confidence() {
        let mut fields = EventFields::default();
        assert_eq!(aggregate_confidence(&fields), 0.0);
        fields.set(FieldName::EventName, Field::new("Gala", 0.8, "top"));
        fields.set(FieldName::Website, Field::new("gala.org", 0.6, "bottom"));
        assert!((aggregate_confidence(&fields) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_today_follows_request_timezone() {
        // 2026-12-31 23:30 UTC is already New Year's Day in Tokyo.
        let now = DateTime::parse_from_rfc3339("2026-12-31T23:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(today_in("UTC", now), NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
        assert_eq!(today_in("Asia/Tokyo", now), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
        assert_eq!(
            today_in("America/Los_Angeles", now),
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
        );
        assert_eq!(today_in("Mars/Olympus", now), NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn test_year_less_date_depends_on_timezone_day() {
        // Dec 31 is today in UTC but already past in Tokyo.
        let now = DateTime::parse_from_rfc3339("2026-12-31T23:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            normalize_date("December 31", today_in("UTC", now)).as_deref(),
            Some("2026-12-31")
        );
        assert_eq!(
            normalize_date("December 31", today_in("Asia/Tokyo", now)).as_deref(),
            Some("2027-12-31")
        );
    }

    #[test]
    fn test_aggregate_confidence_at_two_decimal_boundary() {
        let mut fields = EventFields::default();
        fields.set(FieldName::EventName, Field::new("Gala", 0.7, "top"));
        fields.set(FieldName::Date, Field::new("2026-05-01", 0.6, "middle"));
        fields.set(FieldName::VenueName, Field::new("Hall", 0.5, "bottom"));
        assert_eq!(aggregate_confidence(&fields), 0.6);
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(19|20)\d{2}").unwrap());
static QUARTER_ROMAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([ivx]+)\s*кварт").unwrap());
static QUARTER_ARABIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\s*кварт").unwrap());
static MONTHS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*месяц").unwrap());

/// Substrings whose presence means the period is narrower than a year.
const PERIOD_MARKERS: [&str; 3] = ["месяц", "квартал", "полугод"];

fn roman_quarter(roman: &str) -> Option<u32> {
    match roman {
        "i" => Some(1),
        "ii" => Some(2),
        "iii" => Some(3),
        "iv" => Some(4),
        _ => None,
    }
}

/// Convert the portal's free-form reporting period into a compact token.
///
/// `"2025, 9 месяцев"` becomes `2025M9`, `"2025, полугодие"` becomes
/// `2025H1`, `"I квартал 2024 года"` becomes `2024Q1`, a bare `"2024"`
/// stays `2024`. Text without a recognizable year is returned as-is.
pub fn normalize_period(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let year = match YEAR_RE.find(text) {
        Some(m) => m.as_str().to_string(),
        None => return text.to_string(),
    };

    let lowered = text.to_lowercase();

    // Full year if no explicit period markers.
    if !PERIOD_MARKERS.iter().any(|m| lowered.contains(m)) {
        return year;
    }

    // Quarter: roman or arabic.
    if let Some(caps) = QUARTER_ROMAN_RE.captures(&lowered) {
        if let Some(q) = roman_quarter(&caps[1]) {
            return format!("{}Q{}", year, q);
        }
    }
    if let Some(q) = QUARTER_ARABIC_RE
        .captures(&lowered)
        .and_then(|caps| caps[1].parse::<u32>().ok())
    {
        return format!("{}Q{}", year, q);
    }

    // Half-year.
    if lowered.contains("полугод") || lowered.contains("6 месяцев") {
        return format!("{}H1", year);
    }

    // N months.
    if let Some(n) = MONTHS_RE
        .captures(&lowered)
        .and_then(|caps| caps[1].parse::<u32>().ok())
    {
        return format!("{}M{}", year, n);
    }

    year
}

/// Parse the portal's publish-date column, with or without a time part.
pub fn parse_publish_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%d.%m.%Y") {
        return date.and_hms_opt(0, 0, 0);
    }
    for fmt in ["%d.%m.%Y %H:%M", "%d.%m.%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_period() {
        assert_eq!(normalize_period("2025, 9 месяцев"), "2025M9");
        assert_eq!(normalize_period("2025, 3 месяца"), "2025M3");
    }

    #[test]
    fn half_year_period() {
        assert_eq!(normalize_period("2025, полугодие"), "2025H1");
        assert_eq!(normalize_period("2025, 6 месяцев"), "2025H1");
        assert_eq!(normalize_period("1 полугодие 2023 года"), "2023H1");
    }

    #[test]
    fn quarter_period_roman_and_arabic() {
        assert_eq!(normalize_period("I квартал 2024 года"), "2024Q1");
        assert_eq!(normalize_period("III квартал 2024"), "2024Q3");
        assert_eq!(normalize_period("IV квартал 2022 года"), "2022Q4");
        assert_eq!(normalize_period("2 квартал 2021"), "2021Q2");
    }

    #[test]
    fn bare_year() {
        assert_eq!(normalize_period("2024"), "2024");
        assert_eq!(normalize_period("2024 год"), "2024");
        assert_eq!(normalize_period("Годовой отчет за 2019"), "2019");
    }

    #[test]
    fn unrecognized_roman_quarter_falls_back_to_year() {
        assert_eq!(normalize_period("V квартал 2024"), "2024");
    }

    #[test]
    fn no_year_returns_input() {
        assert_eq!(normalize_period("полугодие"), "полугодие");
        assert_eq!(normalize_period(""), "");
        assert_eq!(normalize_period("   "), "");
    }

    #[test]
    fn normalized_tokens_reduce_to_bare_year() {
        // The compact tokens carry no Cyrillic markers, so a second pass
        // strips them down to the year and a bare year is a fixed point.
        assert_eq!(normalize_period("2025M9"), "2025");
        assert_eq!(normalize_period("2024Q1"), "2024");
        assert_eq!(normalize_period("2024"), "2024");
    }

    #[test]
    fn publish_date_formats() {
        let d = parse_publish_date("13.11.2024").unwrap();
        assert_eq!(d.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-11-13 00:00:00");

        let dt = parse_publish_date("13.11.2024 10:35").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "10:35");

        let dts = parse_publish_date("01.02.2023 09:08:07").unwrap();
        assert_eq!(dts.format("%H:%M:%S").to_string(), "09:08:07");

        assert!(parse_publish_date("not a date").is_none());
        assert!(parse_publish_date("13/11/2024").is_none());
    }
}

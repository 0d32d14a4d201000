use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::NoteError;

/// Date and time encoded in a saved note's file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteStamp {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// `NoteBook[<date>][<HH:MM:SS>].txt`
pub fn note_file_name(date: &str, time: NaiveTime) -> String {
    format!("NoteBook[{date}][{}].txt", time.format("%H:%M:%S"))
}

/// The date field's value, or today's date when the field is blank.
pub fn date_or_today(field: &str, now: NaiveDateTime) -> String {
    let field = field.trim();
    if field.is_empty() {
        format_date(now.date())
    } else {
        field.to_string()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses the trailing path segment of a storage key against the save-time
/// file-name pattern.
pub fn parse_note_key(key: &str) -> Result<NoteStamp, NoteError> {
    static RE_NOTE: OnceLock<Regex> = OnceLock::new();
    let re_note = RE_NOTE.get_or_init(|| {
        Regex::new(r"^NoteBook\[(\d{4}-\d{2}-\d{2})\]\[(\d{2}:\d{2}:\d{2})\]\.txt$").unwrap()
    });

    let file_name = key.rsplit('/').next().unwrap_or_default();
    let cap = re_note
        .captures(file_name)
        .ok_or_else(|| NoteError::parse(file_name))?;
    let date = cap
        .get(1)
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        .ok_or_else(|| NoteError::parse(file_name))?;
    let time = cap
        .get(2)
        .and_then(|m| NaiveTime::parse_from_str(m.as_str(), "%H:%M:%S").ok())
        .ok_or_else(|| NoteError::parse(file_name))?;
    Ok(NoteStamp { date, time })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn formats_with_zero_padded_time() {
        assert_eq!(
            note_file_name("2024-01-01", at(9, 5, 30)),
            "NoteBook[2024-01-01][09:05:30].txt"
        );
    }

    #[test]
    fn blank_date_field_uses_today() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_time(at(23, 59, 1));
        assert_eq!(date_or_today("  ", now), "2025-03-07");
        assert_eq!(date_or_today("2020-02-02", now), "2020-02-02");
    }

    #[test]
    fn parses_trailing_segment_of_key() {
        let stamp = parse_note_key("alice/NoteBook[2024-01-01][09:05:30].txt").unwrap();
        assert_eq!(stamp.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(stamp.time, at(9, 5, 30));
    }

    #[test]
    fn rejects_foreign_and_invalid_names() {
        assert!(matches!(
            parse_note_key("alice/todo.txt"),
            Err(NoteError::Parse(_))
        ));
        assert!(parse_note_key("alice/NoteBook[2024-13-40][09:05:30].txt").is_err());
        assert!(parse_note_key("NoteBook[2024-01-01][09:05:30].txt.bak").is_err());
    }
}

//! iCalendar (RFC 5545) export of events.

use crate::model::event::{local, Event};
use crate::text::plaintext;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PRODID: &str = "-//Localhub//Localhub Events//EN";
const MAX_LINE_OCTETS: usize = 75;
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// A timestamp fell outside the representable calendar range.
    InvalidTimestamp(i64),
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimestamp(value) => write!(f, "timestamp out of range: {value}"),
        }
    }
}

impl Error for CalendarError {}

impl Event {
    /// Renders a VCALENDAR holding this event's next occurrence.
    pub fn to_ical(&self, now: i64) -> Result<String, CalendarError> {
        let tz = self.tz();
        let tzid = tz.name();
        let starts = self.next_start(now);
        let start = local(tz, starts).ok_or(CalendarError::InvalidTimestamp(starts))?;
        let stamp = utc(now)?;

        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!("PRODID:{PRODID}"),
            "CALSCALE:GREGORIAN".to_string(),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", self.core.id),
            format!("DTSTAMP:{}", stamp.format(UTC_FORMAT)),
            format!("DTSTART;TZID={tzid}:{}", start.format(LOCAL_FORMAT)),
        ];
        if let Some(ends) = self.next_end(now) {
            let end = local(tz, ends).ok_or(CalendarError::InvalidTimestamp(ends))?;
            lines.push(format!("DTEND;TZID={tzid}:{}", end.format(LOCAL_FORMAT)));
        }
        if let Some(repeats) = self.repeats.filter(|_| self.is_repeating(now)) {
            let mut rule = format!("RRULE:FREQ={}", repeats.frequency());
            if let Some(until) = self.repeats_until {
                rule.push_str(&format!(";UNTIL={}", utc(until)?.format(UTC_FORMAT)));
            }
            lines.push(rule);
        }
        lines.push(format!("SUMMARY:{}", escape_text(&self.core.title)));

        let location = self.full_location();
        if !location.is_empty() {
            lines.push(format!("LOCATION:{}", escape_text(&location)));
        }
        let description = plaintext(&self.core.description);
        if !description.is_empty() {
            lines.push(format!("DESCRIPTION:{}", escape_text(&description)));
        }
        if let Some(url) = self.url.as_deref().filter(|url| !url.is_empty()) {
            lines.push(format!("URL:{url}"));
        }
        if self.is_canceled() {
            lines.push("STATUS:CANCELLED".to_string());
        }
        lines.push("END:VEVENT".to_string());
        lines.push("END:VCALENDAR".to_string());

        let mut out = String::new();
        for line in &lines {
            out.push_str(&fold_line(line));
            out.push_str("\r\n");
        }
        Ok(out)
    }
}

fn utc(ms: i64) -> Result<DateTime<Utc>, CalendarError> {
    DateTime::from_timestamp_millis(ms).ok_or(CalendarError::InvalidTimestamp(ms))
}

/// Escapes a TEXT property value.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

/// Splits a content line into 75-octet chunks joined by CRLF + space,
/// never cutting a UTF-8 sequence.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    let mut limit = MAX_LINE_OCTETS;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > limit {
            out.push_str("\r\n ");
            width = 0;
            // Continuation lines spend one octet on the leading space.
            limit = MAX_LINE_OCTETS - 1;
        }
        out.push(ch);
        width += len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{escape_text, fold_line};

    #[test]
    fn escape_text_handles_special_characters() {
        assert_eq!(escape_text("a\\b;c,d\r\ne"), "a\\\\b\\;c\\,d\\ne");
    }

    #[test]
    fn short_lines_are_not_folded() {
        assert_eq!(fold_line("SUMMARY:hello"), "SUMMARY:hello");
    }

    #[test]
    fn long_lines_fold_at_75_octets() {
        let line = format!("DESCRIPTION:{}", "x".repeat(200));
        let folded = fold_line(&line);
        let parts: Vec<&str> = folded.split("\r\n").collect();
        assert!(parts.len() > 1);
        assert_eq!(parts[0].len(), 75);
        for part in &parts[1..] {
            assert!(part.starts_with(' '));
            assert!(part.len() <= 75);
        }
        let rejoined: String = folded.replace("\r\n ", "");
        assert_eq!(rejoined, line);
    }

    #[test]
    fn folding_keeps_multibyte_characters_whole() {
        let line = format!("SUMMARY:{}", "é".repeat(60));
        let folded = fold_line(&line);
        for part in folded.split("\r\n") {
            assert!(part.len() <= 75);
        }
        assert_eq!(folded.replace("\r\n ", ""), line);
    }
}

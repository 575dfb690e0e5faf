//! Events: scheduling, recurrence and location formatting.
//!
//! # Invariants
//! - `ends`, when set, is not before `starts`.
//! - A repeating event starts and ends on the same local calendar day.
//! - `repeats_until` is only set on repeating events and never precedes `starts`.
//!
//! Recurrence is computed in the event's own timezone so that a weekly
//! event keeps its wall-clock start across DST changes.

use super::activity::{ActivityCore, ActivityKind, ActivityRecord, AnyActivity};
use super::{is_valid_email, require_text, ValidationError};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeats {
    Day,
    Week,
    Month,
    Year,
}

impl Repeats {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    /// RRULE frequency used in calendar exports.
    pub fn frequency(self) -> &'static str {
        match self {
            Self::Day => "DAILY",
            Self::Week => "WEEKLY",
            Self::Month => "MONTHLY",
            Self::Year => "YEARLY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub core: ActivityCore,
    pub url: Option<String>,
    pub starts: i64,
    pub ends: Option<i64>,
    pub repeats: Option<Repeats>,
    pub repeats_until: Option<i64>,
    /// IANA timezone name.
    pub timezone: String,
    pub canceled: Option<i64>,
    pub venue: String,
    pub ticket_price: String,
    pub ticket_vendor: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub street_address: String,
    pub locality: String,
    pub postal_code: String,
    pub region: String,
    /// ISO 3166-1 alpha-2 code.
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Event {
    pub fn new(community_id: Uuid, owner_id: Uuid, title: impl Into<String>, starts: i64) -> Self {
        Self {
            core: ActivityCore::new(community_id, owner_id, title),
            url: None,
            starts,
            ends: None,
            repeats: None,
            repeats_until: None,
            timezone: "UTC".to_string(),
            canceled: None,
            venue: String::new(),
            ticket_price: String::new(),
            ticket_vendor: String::new(),
            contact_name: String::new(),
            contact_phone: String::new(),
            contact_email: String::new(),
            street_address: String::new(),
            locality: String::new(),
            postal_code: String::new(),
            region: String::new(),
            country: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Parsed timezone, falling back to UTC for unknown names.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.is_some()
    }

    pub fn has_started(&self, now: i64) -> bool {
        self.starts <= now
    }

    pub fn is_repeating(&self, now: i64) -> bool {
        self.repeats.is_some() && self.repeats_until.map_or(true, |until| until > now)
    }

    /// Whether members can still sign up.
    pub fn is_attendable(&self, now: i64) -> bool {
        self.core.is_published()
            && !self.core.is_deleted()
            && !self.is_canceled()
            && !(self.has_started(now) && !self.is_repeating(now))
    }

    /// Start of the next occurrence at or after `now`.
    ///
    /// Non-repeating events always return `starts`.
    pub fn next_start(&self, now: i64) -> i64 {
        let Some(repeats) = self.repeats.filter(|_| self.is_repeating(now)) else {
            return self.starts;
        };
        if self.starts >= now {
            return self.starts;
        }

        let tz = self.tz();
        let (Some(start_local), Some(now_local)) = (local(tz, self.starts), local(tz, now)) else {
            return self.starts;
        };
        let time = start_local.time();
        let today = now_local.date_naive();

        let base = match repeats {
            Repeats::Day => Some(today),
            Repeats::Week => {
                let monday = today - Days::new(u64::from(today.weekday().num_days_from_monday()));
                Some(monday + Days::new(u64::from(start_local.weekday().num_days_from_monday())))
            }
            Repeats::Month => today.with_day(1),
            Repeats::Year => anniversary(today.year(), start_local.date_naive()),
        };
        let Some(base) = base else {
            return self.starts;
        };

        let candidate = localize(tz, base, time);
        let next = if candidate >= now {
            Some(candidate)
        } else {
            advance(base, repeats, start_local.date_naive()).map(|date| localize(tz, date, time))
        };
        next.map_or(self.starts, |next| next.max(self.starts))
    }

    /// End of the occurrence returned by [`Event::next_start`].
    pub fn next_end(&self, now: i64) -> Option<i64> {
        self.ends
            .map(|ends| self.next_start(now) + (ends - self.starts))
    }

    /// Whether an occurrence of the event falls on `date` (event-local).
    pub fn matches_date(&self, date: NaiveDate, now: i64) -> bool {
        let tz = self.tz();
        let Some(next) = local(tz, self.next_start(now)).map(|dt| dt.date_naive()) else {
            return false;
        };
        if next == date {
            return true;
        }
        let Some(repeats) = self.repeats.filter(|_| self.is_repeating(now)) else {
            return false;
        };
        if next > date {
            return false;
        }
        if let Some(until) = self.repeats_until.and_then(|until| local(tz, until)) {
            if date > until.date_naive() {
                return false;
            }
        }
        let Some(starts) = local(tz, self.starts).map(|dt| dt.date_naive()) else {
            return false;
        };
        match repeats {
            Repeats::Day => true,
            Repeats::Week => starts.weekday() == date.weekday(),
            Repeats::Month => date.day() == 1,
            Repeats::Year => starts.day() == date.day() && starts.month() == date.month(),
        }
    }

    pub fn has_map(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Postal address formatted after the conventions of `country`.
    pub fn location(&self) -> String {
        let country_name = self
            .country
            .as_deref()
            .map(|code| country_name(code).unwrap_or(code))
            .unwrap_or_default();
        let street = self.street_address.trim();
        let locality = self.locality.trim();
        let postcode = self.postal_code.trim();
        let region = self.region.trim();

        let text = match self.country.as_deref() {
            Some("GB" | "IN" | "PK" | "ZA" | "JP") => {
                format!("{street}, {locality}, {region}, {postcode}, {country_name}")
            }
            Some("US" | "AU" | "NZ") => {
                format!("{street} {locality}, {postcode}, {region}, {country_name}")
            }
            Some("RU") => format!("{street} {locality} {postcode}, {region}, {country_name}"),
            _ => format!("{street}, {postcode} {locality}, {region}, {country_name}"),
        };
        tidy_location(&text)
    }

    /// Venue followed by the formatted address.
    pub fn full_location(&self) -> String {
        let venue = self.venue.trim();
        tidy_location(&format!("{venue}, {}", self.location()))
    }

    fn validate_schedule(&self) -> Result<(), ValidationError> {
        if let Some(ends) = self.ends {
            if ends < self.starts {
                return Err(ValidationError::EventEndsBeforeStart);
            }
            if self.repeats.is_some() {
                let tz = self.tz();
                let same_day = match (local(tz, self.starts), local(tz, ends)) {
                    (Some(starts), Some(ends)) => starts.date_naive() == ends.date_naive(),
                    _ => false,
                };
                if !same_day {
                    return Err(ValidationError::RepeatingEventSpansDays);
                }
            }
        }
        if let Some(until) = self.repeats_until {
            if self.repeats.is_none() {
                return Err(ValidationError::RepeatsUntilWithoutRepeat);
            }
            if until < self.starts {
                return Err(ValidationError::RepeatsUntilBeforeStart);
            }
        }
        Ok(())
    }
}

impl ActivityRecord for Event {
    const KIND: ActivityKind = ActivityKind::Event;

    fn core(&self) -> &ActivityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActivityCore {
        &mut self.core
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.core.validate()?;
        if self.timezone.parse::<Tz>().is_err() {
            return Err(ValidationError::InvalidTimezone(self.timezone.clone()));
        }
        if let Some(code) = self.country.as_deref() {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ValidationError::InvalidCountry(code.to_string()));
            }
        }
        let contact_email = self.contact_email.trim();
        if !contact_email.is_empty() && !is_valid_email(contact_email) {
            return Err(ValidationError::InvalidEmail(contact_email.to_string()));
        }
        require_text("timezone", &self.timezone, 64)?;
        self.validate_schedule()
    }

    fn reshare(&self, owner_id: Uuid) -> Self {
        let mut copy = self.clone();
        copy.core = self.core.reshare_core(owner_id);
        copy.canceled = None;
        copy
    }

    fn sync_from(&mut self, source: &Self) {
        let core = self.core.clone();
        let canceled = self.canceled;
        *self = source.clone();
        self.core = ActivityCore {
            title: source.core.title.clone(),
            description: source.core.description.clone(),
            ..core
        };
        self.canceled = canceled;
    }

    fn into_any(self) -> AnyActivity {
        AnyActivity::Event(self)
    }
}

pub(crate) fn local(tz: Tz, ms: i64) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&tz))
}

/// Local wall-clock time to epoch ms; gaps resolve to the UTC reading.
fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> i64 {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

fn anniversary(year: i32, starts: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, starts.month(), starts.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, starts.month(), 28))
}

fn advance(base: NaiveDate, repeats: Repeats, starts: NaiveDate) -> Option<NaiveDate> {
    match repeats {
        Repeats::Day => base.checked_add_days(Days::new(1)),
        Repeats::Week => base.checked_add_days(Days::new(7)),
        Repeats::Month => base.checked_add_months(Months::new(1)),
        Repeats::Year => anniversary(base.year() + 1, starts),
    }
}

fn tidy_location(text: &str) -> String {
    text.split(',')
        .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// English short name for common country codes.
pub fn country_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "AR" => "Argentina",
        "AT" => "Austria",
        "AU" => "Australia",
        "BE" => "Belgium",
        "BR" => "Brazil",
        "CA" => "Canada",
        "CH" => "Switzerland",
        "CL" => "Chile",
        "CN" => "China",
        "CZ" => "Czechia",
        "DE" => "Germany",
        "DK" => "Denmark",
        "EE" => "Estonia",
        "ES" => "Spain",
        "FI" => "Finland",
        "FR" => "France",
        "GB" => "United Kingdom",
        "GR" => "Greece",
        "HU" => "Hungary",
        "IE" => "Ireland",
        "IN" => "India",
        "IS" => "Iceland",
        "IT" => "Italy",
        "JP" => "Japan",
        "KR" => "South Korea",
        "LT" => "Lithuania",
        "LV" => "Latvia",
        "MX" => "Mexico",
        "NL" => "Netherlands",
        "NO" => "Norway",
        "NZ" => "New Zealand",
        "PK" => "Pakistan",
        "PL" => "Poland",
        "PT" => "Portugal",
        "RU" => "Russia",
        "SE" => "Sweden",
        "TR" => "Turkey",
        "UA" => "Ukraine",
        "US" => "United States of America",
        "ZA" => "South Africa",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::{Event, Repeats};
    use crate::model::activity::ActivityRecord;
    use crate::model::ValidationError;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn ms(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("valid datetime")
            .timestamp_millis()
    }

    fn event(starts: i64) -> Event {
        let mut event = Event::new(Uuid::new_v4(), Uuid::new_v4(), "meetup", starts);
        event.core.published = Some(starts - 1);
        event
    }

    #[test]
    fn non_repeating_next_start_is_starts() {
        let event = event(ms(2024, 1, 10, 18, 0));
        assert_eq!(event.next_start(ms(2024, 3, 1, 0, 0)), ms(2024, 1, 10, 18, 0));
    }

    #[test]
    fn daily_event_moves_to_tomorrow_when_past() {
        let mut event = event(ms(2024, 1, 10, 18, 0));
        event.repeats = Some(Repeats::Day);
        assert_eq!(event.next_start(ms(2024, 3, 1, 12, 0)), ms(2024, 3, 1, 18, 0));
        assert_eq!(event.next_start(ms(2024, 3, 1, 19, 0)), ms(2024, 3, 2, 18, 0));
    }

    #[test]
    fn weekly_event_keeps_weekday() {
        // 2024-01-12 is a Friday; 2024-03-04 is a Monday.
        let mut event = event(ms(2024, 1, 12, 9, 30));
        event.repeats = Some(Repeats::Week);
        assert_eq!(event.next_start(ms(2024, 3, 4, 0, 0)), ms(2024, 3, 8, 9, 30));
        assert_eq!(event.next_start(ms(2024, 3, 8, 10, 0)), ms(2024, 3, 15, 9, 30));
    }

    #[test]
    fn monthly_event_falls_on_first_of_month() {
        let mut event = event(ms(2024, 1, 1, 8, 0));
        event.repeats = Some(Repeats::Month);
        assert_eq!(event.next_start(ms(2024, 3, 15, 0, 0)), ms(2024, 4, 1, 8, 0));
    }

    #[test]
    fn yearly_event_uses_anniversary() {
        let mut event = event(ms(2020, 6, 21, 20, 0));
        event.repeats = Some(Repeats::Year);
        assert_eq!(event.next_start(ms(2024, 3, 1, 0, 0)), ms(2024, 6, 21, 20, 0));
        assert_eq!(event.next_start(ms(2024, 7, 1, 0, 0)), ms(2025, 6, 21, 20, 0));
    }

    #[test]
    fn expired_repetition_is_not_repeating() {
        let mut event = event(ms(2024, 1, 1, 8, 0));
        event.repeats = Some(Repeats::Day);
        event.repeats_until = Some(ms(2024, 2, 1, 0, 0));
        let now = ms(2024, 3, 1, 0, 0);
        assert!(!event.is_repeating(now));
        assert_eq!(event.next_start(now), event.starts);
        assert!(!event.is_attendable(now));
    }

    #[test]
    fn matches_date_for_weekly_event() {
        let mut event = event(ms(2024, 1, 12, 9, 30));
        event.repeats = Some(Repeats::Week);
        let now = ms(2024, 3, 4, 0, 0);
        let friday = NaiveDate::from_ymd_opt(2024, 3, 22).expect("date");
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 23).expect("date");
        assert!(event.matches_date(friday, now));
        assert!(!event.matches_date(saturday, now));
    }

    #[test]
    fn attendable_until_started() {
        let event = event(ms(2024, 1, 10, 18, 0));
        assert!(event.is_attendable(ms(2024, 1, 9, 0, 0)));
        assert!(!event.is_attendable(ms(2024, 1, 11, 0, 0)));
    }

    #[test]
    fn validation_rules() {
        let mut event = event(ms(2024, 1, 10, 18, 0));
        event.ends = Some(ms(2024, 1, 10, 17, 0));
        assert_eq!(event.validate(), Err(ValidationError::EventEndsBeforeStart));

        event.ends = Some(ms(2024, 1, 11, 17, 0));
        event.repeats = Some(Repeats::Week);
        assert_eq!(event.validate(), Err(ValidationError::RepeatingEventSpansDays));

        event.ends = None;
        event.repeats = None;
        event.repeats_until = Some(ms(2024, 2, 1, 0, 0));
        assert_eq!(event.validate(), Err(ValidationError::RepeatsUntilWithoutRepeat));

        event.repeats = Some(Repeats::Day);
        event.repeats_until = Some(ms(2023, 2, 1, 0, 0));
        assert_eq!(event.validate(), Err(ValidationError::RepeatsUntilBeforeStart));

        event.repeats_until = None;
        event.timezone = "Mars/Olympus".to_string();
        assert!(matches!(event.validate(), Err(ValidationError::InvalidTimezone(_))));
    }

    #[test]
    fn location_formats_by_country() {
        let mut event = event(0);
        event.street_address = "1 High St".to_string();
        event.locality = "Bath".to_string();
        event.postal_code = "BA1 1AA".to_string();
        event.country = Some("GB".to_string());
        assert_eq!(event.location(), "1 High St, Bath, BA1 1AA, United Kingdom");

        event.country = Some("US".to_string());
        event.region = "CA".to_string();
        assert_eq!(
            event.location(),
            "1 High St Bath, BA1 1AA, CA, United States of America"
        );

        event.country = Some("FI".to_string());
        assert_eq!(event.location(), "1 High St, BA1 1AA Bath, CA, Finland");

        event.venue = "Town Hall".to_string();
        assert_eq!(
            event.full_location(),
            "Town Hall, 1 High St, BA1 1AA Bath, CA, Finland"
        );
    }

    #[test]
    fn empty_location_is_blank() {
        let event = event(0);
        assert_eq!(event.location(), "");
        assert_eq!(event.full_location(), "");
    }
}

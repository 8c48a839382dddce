//! Clock arithmetic for bookings and the admin day view.
//!
//! All values are naive local clock times: the service runs in a single
//! timezone, so no conversion happens here.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

pub const CLOCK_FORMAT: &str = "%H:%M";

/// First and last hourly slot shown on the day view.
pub const CALENDAR_FIRST_HOUR: u32 = 7;
pub const CALENDAR_LAST_HOUR: u32 = 23;

/// Parse a strict 24-hour `HH:MM` value.
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 2 || b.is_ascii_digit())
    {
        return None;
    }
    NaiveTime::parse_from_str(value, CLOCK_FORMAT).ok()
}

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format(CLOCK_FORMAT).to_string()
}

/// The occupied interval of one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BookingSlot {
    /// `None` when `duration_minutes` is not positive.
    pub fn new(date: NaiveDate, start_time: NaiveTime, duration_minutes: i32) -> Option<Self> {
        if duration_minutes <= 0 {
            return None;
        }
        let start = date.and_time(start_time);
        let end = start.checked_add_signed(Duration::minutes(i64::from(duration_minutes)))?;
        Some(Self { start, end })
    }

    /// The date stored on the booking row.
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn start_time(&self) -> String {
        format_clock(self.start.time())
    }

    /// End clock value, wrapped past midnight.
    pub fn end_time(&self) -> String {
        format_clock(self.end.time())
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end.date() > self.start.date()
    }
}

/// A booking placed on the day view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalendarEntry {
    pub booking_id: Uuid,
    pub code: String,
    pub customer_name: String,
    pub combo_name: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalendarSlot {
    pub time: String,
    pub entries: Vec<CalendarSlotEntry>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalendarSlotEntry {
    #[serde(flatten)]
    pub entry: CalendarEntry,
    /// True only in the slot where the booking begins.
    pub starts_here: bool,
}

/// Bucket the bookings of one day into hourly slots.
///
/// A booking occupies every slot `[h, h + 1h)` its interval overlaps. Bookings
/// that run past midnight are clipped at the end of the day. Entries whose
/// clock values do not parse are skipped.
pub fn day_grid(entries: &[CalendarEntry]) -> Vec<CalendarSlot> {
    let day_end_minutes = 24 * 60;
    let spans: Vec<(u32, u32, &CalendarEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let start = minutes_of_day(parse_clock(&entry.start_time)?);
            let mut end = minutes_of_day(parse_clock(&entry.end_time)?);
            if end <= start {
                end = day_end_minutes;
            }
            Some((start, end, entry))
        })
        .collect();

    (CALENDAR_FIRST_HOUR..=CALENDAR_LAST_HOUR)
        .map(|hour| {
            let slot_start = hour * 60;
            let slot_end = slot_start + 60;
            let entries = spans
                .iter()
                .filter(|(start, end, _)| *start < slot_end && *end > slot_start)
                .map(|(start, _, entry)| CalendarSlotEntry {
                    entry: (*entry).clone(),
                    starts_here: *start >= slot_start
                        || (hour == CALENDAR_FIRST_HOUR && *start < slot_start),
                })
                .collect();
            CalendarSlot {
                time: format!("{hour:02}:00"),
                entries,
            }
        })
        .collect()
}

fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).expect("date")
    }

    fn entry(code: &str, start: &str, end: &str) -> CalendarEntry {
        CalendarEntry {
            booking_id: Uuid::new_v4(),
            code: code.into(),
            customer_name: "Nerd".into(),
            combo_name: "Combo".into(),
            start_time: start.into(),
            end_time: end.into(),
            status: "CONFIRMED".into(),
        }
    }

    #[test]
    fn three_hour_combo_ends_at_noon() {
        let slot = BookingSlot::new(date("2025-06-01"), parse_clock("09:00").unwrap(), 180)
            .expect("slot");
        assert_eq!(slot.start_time(), "09:00");
        assert_eq!(slot.end_time(), "12:00");
        assert_eq!(slot.date(), date("2025-06-01"));
        assert_eq!(slot.end - slot.start, Duration::minutes(180));
        assert!(!slot.crosses_midnight());
    }

    #[test]
    fn late_booking_wraps_end_time_but_keeps_start_date() {
        let slot = BookingSlot::new(date("2025-06-01"), parse_clock("22:30").unwrap(), 180)
            .expect("slot");
        assert_eq!(slot.end_time(), "01:30");
        assert_eq!(slot.date(), date("2025-06-01"));
        assert!(slot.crosses_midnight());
    }

    #[test]
    fn full_day_combo_ends_at_same_clock_next_day() {
        let slot = BookingSlot::new(date("2025-12-31"), parse_clock("08:15").unwrap(), 1440)
            .expect("slot");
        assert_eq!(slot.end_time(), "08:15");
        assert_eq!(slot.end.date(), date("2026-01-01"));
        assert_eq!(slot.date(), date("2025-12-31"));
    }

    #[test]
    fn rejects_non_positive_duration() {
        let start = parse_clock("09:00").unwrap();
        assert!(BookingSlot::new(date("2025-06-01"), start, 0).is_none());
        assert!(BookingSlot::new(date("2025-06-01"), start, -30).is_none());
    }

    #[test]
    fn clock_parsing_is_strict() {
        assert!(parse_clock("09:00").is_some());
        assert!(parse_clock("23:59").is_some());
        assert!(parse_clock("00:00").is_some());
        assert!(parse_clock("9:00").is_none());
        assert!(parse_clock("24:00").is_none());
        assert!(parse_clock("12:60").is_none());
        assert!(parse_clock("12-30").is_none());
        assert!(parse_clock("+1:30").is_none());
        assert!(parse_clock("").is_none());
    }

    #[test]
    fn date_parsing() {
        assert!(parse_date("2025-06-01").is_some());
        assert!(parse_date("2025-02-30").is_none());
        assert!(parse_date("01/06/2025").is_none());
    }

    #[test]
    fn grid_has_hourly_slots_from_seven_to_twenty_three() {
        let grid = day_grid(&[]);
        assert_eq!(grid.len(), 17);
        assert_eq!(grid.first().unwrap().time, "07:00");
        assert_eq!(grid.last().unwrap().time, "23:00");
    }

    #[test]
    fn booking_occupies_every_overlapping_slot() {
        let grid = day_grid(&[entry("A", "09:30", "11:00")]);
        let occupied: Vec<(&str, bool)> = grid
            .iter()
            .filter(|slot| !slot.entries.is_empty())
            .map(|slot| (slot.time.as_str(), slot.entries[0].starts_here))
            .collect();
        assert_eq!(occupied, vec![("09:00", true), ("10:00", false)]);
    }

    #[test]
    fn cross_midnight_booking_is_clipped_to_end_of_day() {
        let grid = day_grid(&[entry("B", "22:00", "01:00")]);
        let occupied: Vec<&str> = grid
            .iter()
            .filter(|slot| !slot.entries.is_empty())
            .map(|slot| slot.time.as_str())
            .collect();
        assert_eq!(occupied, vec!["22:00", "23:00"]);
    }

    #[test]
    fn early_booking_starts_in_first_visible_slot() {
        let grid = day_grid(&[entry("C", "06:00", "08:00")]);
        assert_eq!(grid[0].entries.len(), 1);
        assert!(grid[0].entries[0].starts_here);
        assert!(grid[1].entries.is_empty());
    }
}

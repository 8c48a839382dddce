use chrono::NaiveDate;
use password_hash::rand_core::{OsRng, RngCore};

pub const CODE_PREFIX: &str = "NERD";

/// Attempts made before a booking-code collision is surfaced as a conflict.
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// Source of the three-digit suffix in `NERD-YYYYMMDD-NNN`.
pub trait SuffixSource: Send + Sync {
    /// A value in `0..1000`.
    fn next_suffix(&self) -> u16;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSuffix;

impl SuffixSource for RandomSuffix {
    fn next_suffix(&self) -> u16 {
        (OsRng.next_u32() % 1000) as u16
    }
}

/// Human-readable booking code carrying the start date.
pub fn booking_code(date: NaiveDate, suffix: u16) -> String {
    format!("{CODE_PREFIX}-{}-{:03}", date.format("%Y%m%d"), suffix % 1000)
}

/// Checks the `NERD-YYYYMMDD-NNN` shape.
pub fn is_booking_code(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == CODE_PREFIX
        && date.len() == 8
        && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
        && suffix.len() == 3
        && suffix.bytes().all(|b| b.is_ascii_digit())
}

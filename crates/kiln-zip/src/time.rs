//! MS-DOS date/time stamps used by ZIP headers.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

/// A packed DOS date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    /// The current local wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now().naive_local())
    }

    /// Pack a calendar time. Years outside 1980..=2107 are clamped.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        let year = dt.year().clamp(1980, 2107) as u16;
        let date = dt.day() as u16 | (dt.month() as u16) << 5 | (year - 1980) << 9;
        let time = (dt.second() / 2) as u16 | (dt.minute() as u16) << 5 | (dt.hour() as u16) << 11;
        Self { date, time }
    }

    /// Header form: time in the low half, date in the high half.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.time as u32 | (self.date as u32) << 16
    }
}

use time::{macros::format_description, Date, OffsetDateTime, UtcOffset};

/// Local time at which a new day starts. Entries logged before the cutoff
/// count towards the previous calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCutoff {
    hour: u8,
    minute: u8,
}

impl DayCutoff {
    pub const MIDNIGHT: DayCutoff = DayCutoff { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> anyhow::Result<Self> {
        anyhow::ensure!(hour < 24, "cutoff hour out of range: {hour}");
        anyhow::ensure!(minute < 60, "cutoff minute out of range: {minute}");
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl Default for DayCutoff {
    fn default() -> Self {
        Self::MIDNIGHT
    }
}

/// Calendar date a timestamp belongs to, in the timestamp's own offset.
pub fn day_date(now: OffsetDateTime, cutoff: DayCutoff) -> Date {
    let date = now.date();
    if (now.hour(), now.minute()) < (cutoff.hour, cutoff.minute) {
        date.previous_day().unwrap_or(date)
    } else {
        date
    }
}

/// `YYYY-MM-DD` key of the day `now` falls into.
pub fn day_key(now: OffsetDateTime, cutoff: DayCutoff) -> String {
    format_date(day_date(now, cutoff))
}

pub fn format_date(date: Date) -> String {
    let fmt = format_description!("[year]-[month]-[day]");
    // formatting a Date with a date-only description cannot fail
    date.format(&fmt).unwrap_or_default()
}

pub fn parse_day_key(key: &str) -> anyhow::Result<Date> {
    let fmt = format_description!("[year]-[month]-[day]");
    Ok(Date::parse(key, &fmt)?)
}

/// Source of "now" for day-key computation.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock shifted to a fixed local offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn before_cutoff_belongs_to_previous_day() {
        let cutoff = DayCutoff::new(4, 30).unwrap();
        assert_eq!(day_key(datetime!(2026-10-16 04:29 UTC), cutoff), "2026-10-15");
        assert_eq!(day_key(datetime!(2026-10-16 04:30 UTC), cutoff), "2026-10-16");
        assert_eq!(day_key(datetime!(2026-10-16 23:59 UTC), cutoff), "2026-10-16");
    }

    #[test]
    fn midnight_cutoff_is_calendar_date() {
        assert_eq!(
            day_key(datetime!(2026-01-01 00:00 UTC), DayCutoff::MIDNIGHT),
            "2026-01-01"
        );
    }

    #[test]
    fn cutoff_crosses_month_boundary() {
        let cutoff = DayCutoff::new(3, 0).unwrap();
        assert_eq!(day_key(datetime!(2026-03-01 01:15 UTC), cutoff), "2026-02-28");
    }

    #[test]
    fn uses_the_timestamp_offset() {
        let cutoff = DayCutoff::new(4, 0).unwrap();
        // 05:00 UTC is 02:00 at -03:00, still before the local cutoff
        let now = datetime!(2026-10-16 05:00 UTC).to_offset(time::macros::offset!(-3));
        assert_eq!(day_key(now, cutoff), "2026-10-15");
    }

    #[test]
    fn rejects_out_of_range_cutoff() {
        assert!(DayCutoff::new(24, 0).is_err());
        assert!(DayCutoff::new(5, 60).is_err());
    }

    #[test]
    fn parse_and_format_day_key() {
        let date = parse_day_key("2026-10-16").unwrap();
        assert_eq!(format_date(date), "2026-10-16");
        assert!(parse_day_key("16/10/2026").is_err());
    }
}

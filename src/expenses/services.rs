use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, Month,
    OffsetDateTime, PrimitiveDateTime,
};

use super::repo_types::DateRange;

/// Accepts a full RFC 3339 timestamp, a local `YYYY-MM-DDTHH:MM[:SS[.fff]]`
/// datetime, or a bare `YYYY-MM-DD` date. Values without an offset are UTC.
pub fn parse_datespent(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(at);
    }
    if let Ok(at) = PrimitiveDateTime::parse(
        raw,
        format_description!(
            "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
        ),
    ) {
        return Some(at.assume_utc());
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

/// `[year-month-01, first day of the following month)` in UTC.
pub fn month_range(year: i32, month: u8) -> Option<DateRange> {
    let month = Month::try_from(month).ok()?;
    let start = Date::from_calendar_date(year, month, 1).ok()?;
    let (next_year, next_month) = match month {
        Month::December => (year.checked_add(1)?, Month::January),
        m => (year, m.next()),
    };
    let end = Date::from_calendar_date(next_year, next_month, 1).ok()?;
    Some(DateRange {
        start: start.midnight().assume_utc(),
        end: end.midnight().assume_utc(),
    })
}

#![forbid(unsafe_code)]

//! Second-precision instants.
//!
//! Containment intervals are persisted and compared at whole-second
//! granularity, the same granularity memento labels carry.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const MEMENTO_LABEL: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

pub fn truncate_to_seconds(at: OffsetDateTime) -> OffsetDateTime {
    let at = at.to_offset(UtcOffset::UTC);
    at - Duration::nanoseconds(i64::from(at.nanosecond()))
}

pub fn now() -> OffsetDateTime {
    truncate_to_seconds(OffsetDateTime::now_utc())
}

pub fn to_epoch_seconds(at: OffsetDateTime) -> i64 {
    at.unix_timestamp()
}

pub fn from_epoch_seconds(seconds: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds).ok()
}

/// `yyyyMMddHHmmss` in UTC.
pub fn memento_label(at: OffsetDateTime) -> Option<String> {
    truncate_to_seconds(at).format(MEMENTO_LABEL).ok()
}

pub fn parse_memento_label(label: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(label, MEMENTO_LABEL)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn truncation_drops_subsecond_precision() {
        let at = datetime!(2021-03-04 05:06:07.891 UTC);
        assert_eq!(truncate_to_seconds(at), datetime!(2021-03-04 05:06:07 UTC));
    }

    #[test]
    fn memento_label_round_trips_through_utc() {
        let at = datetime!(2020-01-02 03:04:05 +02:00);
        let label = memento_label(at).unwrap();
        assert_eq!(label, "20200102010405");
        assert_eq!(
            parse_memento_label(&label),
            Some(datetime!(2020-01-02 01:04:05 UTC))
        );
        assert_eq!(parse_memento_label("2020010203040"), None);
    }
}

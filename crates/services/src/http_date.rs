// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! RFC 7231 `IMF-fixdate` rendering (e.g. `Tue, 15 Nov 1994 08:12:31 GMT`),
//! the `http-date` field `get_history` (spec.md §4.8 "Delta") attaches to
//! every record alongside the raw microsecond timestamp already used
//! throughout the schema layer.

use jiff::civil::Weekday;
use jiff::tz::TimeZone;
use jiff::Timestamp;

use stratum_core::util::clock::DateTime;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[must_use]
pub fn imf_fixdate(datetime: DateTime) -> String {
    let timestamp = Timestamp::from(datetime);
    let civil = timestamp.to_zoned(TimeZone::UTC).datetime();
    let weekday = WEEKDAYS[weekday_index(civil.weekday())];
    let month = MONTHS[usize::from(civil.month() as u8) - 1];
    format!(
        "{weekday}, {day:02} {month} {year:04} {hour:02}:{minute:02}:{second:02} GMT",
        day = civil.day(),
        year = civil.year(),
        hour = civil.hour(),
        minute = civil.minute(),
        second = civil.second(),
    )
}

const fn weekday_index(day: Weekday) -> usize {
    match day {
        Weekday::Monday => 0,
        Weekday::Tuesday => 1,
        Weekday::Wednesday => 2,
        Weekday::Thursday => 3,
        Weekday::Friday => 4,
        Weekday::Saturday => 5,
        Weekday::Sunday => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_known_instant() {
        // 2024-01-02T03:04:05Z, a Tuesday.
        let micros = 1_704_164_645_000_000;
        let rendered = imf_fixdate(DateTime::new_timestamp_micros(micros));
        assert!(rendered.ends_with(" GMT"));
        assert!(rendered.starts_with("Tue, "));
    }
}

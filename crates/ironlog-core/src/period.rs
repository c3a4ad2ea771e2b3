// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Symbolic time windows for chart queries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Recency window accepted by the chart endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// Last 365 days.
    Year,
    /// Entire history.
    #[default]
    All,
}

/// Window length in days per period; `None` means unbounded.
const WINDOW_DAYS: [(TimePeriod, Option<i64>); 4] = [
    (TimePeriod::Week, Some(7)),
    (TimePeriod::Month, Some(30)),
    (TimePeriod::Year, Some(365)),
    (TimePeriod::All, None),
];

impl TimePeriod {
    /// All tokens in ascending window length.
    pub const ALL: [TimePeriod; 4] = [Self::Week, Self::Month, Self::Year, Self::All];

    /// Token form used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    /// Window length, or `None` for the unbounded window.
    pub fn window(&self) -> Option<TimeDelta> {
        WINDOW_DAYS
            .iter()
            .find(|(period, _)| period == self)
            .and_then(|(_, days)| *days)
            .map(TimeDelta::days)
    }

    /// Oldest instant (exclusive) whose entries fall inside the window ending at `now`.
    ///
    /// `All` resolves to the earliest representable instant.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a query string names an unknown window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time period '{0}', expected one of week, month, year, all")]
pub struct UnknownTimePeriod(pub String);

impl FromStr for TimePeriod {
    type Err = UnknownTimePeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|period| period.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownTimePeriod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cutoff_per_period() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();

        assert_eq!(
            TimePeriod::Week.cutoff(now),
            Utc.with_ymd_and_hms(2024, 6, 8, 10, 0, 0).unwrap()
        );
        assert_eq!(
            TimePeriod::Month.cutoff(now),
            Utc.with_ymd_and_hms(2024, 5, 16, 10, 0, 0).unwrap()
        );
        assert_eq!(
            TimePeriod::Year.cutoff(now),
            Utc.with_ymd_and_hms(2023, 6, 16, 10, 0, 0).unwrap()
        );
        assert_eq!(TimePeriod::All.cutoff(now), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_parse_tokens() {
        for period in TimePeriod::ALL {
            assert_eq!(period.as_str().parse::<TimePeriod>().unwrap(), period);
        }
        assert_eq!("WEEK".parse::<TimePeriod>().unwrap(), TimePeriod::Week);

        let err = "decade".parse::<TimePeriod>().unwrap_err();
        assert_eq!(err, UnknownTimePeriod("decade".to_string()));
        assert!(err.to_string().contains("decade"));
    }

    #[test]
    fn test_default_is_all() {
        assert_eq!(TimePeriod::default(), TimePeriod::All);
        assert_eq!(TimePeriod::All.window(), None);
    }

    #[test]
    fn test_windows_grow() {
        let windows: Vec<_> = TimePeriod::ALL
            .iter()
            .filter_map(|p| p.window())
            .collect();
        assert!(windows.windows(2).all(|w| w[0] < w[1]));
    }
}

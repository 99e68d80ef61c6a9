//! Monthly period type used as the time index of every panel.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A calendar month (year + month of year).
///
/// Internally an ordinal count of months, so ordering and arithmetic are
/// plain integer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    ordinal: i32,
}

impl Month {
    /// Create a month; `month` is 1-based.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ForecastError::TimestampError(format!(
                "month must be in 1..=12, got {}",
                month
            )));
        }
        Ok(Self {
            ordinal: year * 12 + (month as i32 - 1),
        })
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            ordinal: date.year() * 12 + date.month0() as i32,
        }
    }

    pub fn year(&self) -> i32 {
        self.ordinal.div_euclid(12)
    }

    /// Month of year, 1-based.
    pub fn month(&self) -> u32 {
        self.ordinal.rem_euclid(12) as u32 + 1
    }

    /// First day of the month.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year(), self.month(), 1)
    }

    /// The month `n` months later (or earlier for negative `n`).
    pub fn offset(self, n: i32) -> Self {
        Self {
            ordinal: self.ordinal + n,
        }
    }

    /// The following month.
    pub fn succ(self) -> Self {
        self.offset(1)
    }

    /// Signed number of months from `self` to `later`.
    pub fn months_until(self, later: Month) -> i32 {
        later.ordinal - self.ordinal
    }

    /// Iterate `self..=end`.
    pub fn range_inclusive(self, end: Month) -> impl Iterator<Item = Month> {
        (self.ordinal..=end.ordinal).map(|ordinal| Month { ordinal })
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.year(),
            MONTH_NAMES[self.month() as usize - 1]
        )
    }
}

impl FromStr for Month {
    type Err = ForecastError;

    /// Accepts `2018 Jan` and `2018-01`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || ForecastError::TimestampError(format!("cannot parse month from '{}'", s));

        if let Some((year, month)) = s.split_once(' ') {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let month = MONTH_NAMES
                .iter()
                .position(|name| name.eq_ignore_ascii_case(month.trim()))
                .ok_or_else(invalid)?;
            return Month::new(year, month as u32 + 1);
        }

        if let Some((year, month)) = s.split_once('-') {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let month: u32 = month.parse().map_err(|_| invalid())?;
            return Month::new(year, month);
        }

        Err(invalid())
    }
}

impl TryFrom<String> for Month {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_arithmetic_crosses_year_boundaries() {
        let dec = Month::new(2017, 12).unwrap();
        let jan = dec.succ();
        assert_eq!(jan.year(), 2018);
        assert_eq!(jan.month(), 1);
        assert_eq!(dec.months_until(jan), 1);
        assert_eq!(jan.offset(-13), Month::new(2016, 12).unwrap());
    }

    #[test]
    fn month_parses_both_formats() {
        let a: Month = "2018 Mar".parse().unwrap();
        let b: Month = "2018-03".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "2018 Mar");
        assert!("2018 Foo".parse::<Month>().is_err());
        assert!("2018-13".parse::<Month>().is_err());
        assert!("March".parse::<Month>().is_err());
    }

    #[test]
    fn month_from_date_and_back() {
        let date = NaiveDate::from_ymd_opt(1999, 7, 23).unwrap();
        let month = Month::from_date(date);
        assert_eq!(month.to_string(), "1999 Jul");
        assert_eq!(
            month.first_day(),
            Some(NaiveDate::from_ymd_opt(1999, 7, 1).unwrap())
        );
    }

    #[test]
    fn month_range_is_inclusive() {
        let start = Month::new(2020, 11).unwrap();
        let months: Vec<_> = start.range_inclusive(start.offset(3)).collect();
        assert_eq!(months.len(), 4);
        assert_eq!(months[3].to_string(), "2021 Feb");
    }

    #[test]
    fn month_deserializes_from_string() {
        #[derive(Deserialize)]
        struct Holder {
            cutoff: Month,
        }
        let holder: Holder = toml::from_str("cutoff = \"2015 Dec\"").unwrap();
        assert_eq!(holder.cutoff, Month::new(2015, 12).unwrap());
    }
}

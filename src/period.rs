//! Period strings used by time-series endpoints.
//!
//! A period is a calendar instant truncated to some precision and written as digits:
//! `YYYY`, `YYYYMM`, `YYYYMMDD`, or `YYYYMMDDHH`. Two periods joined by `-` form a range
//! (`201502-201503`). Dates are wall-clock values; convert to the account's local time
//! before formatting.

// crates.io
use time::{
	Date, Month, PrimitiveDateTime, Time,
	format_description::{BorrowedFormatItem, well_known::Rfc3339},
	macros::format_description,
};
// self
use crate::{_prelude::*, error::ConfigError};

/// Time-series resolution understood by [`get_period`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Granularity {
	/// Monthly values.
	Month,
	/// A seven-day window starting at the given date, read at daily resolution.
	Week,
	/// Daily values.
	Day,
	/// Hourly values.
	Hour,
}
impl Granularity {
	/// Path segment used by time-series endpoints.
	pub const fn as_str(self) -> &'static str {
		match self {
			Granularity::Month => "month",
			Granularity::Week => "week",
			Granularity::Day => "day",
			Granularity::Hour => "hour",
		}
	}
}
impl Display for Granularity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Writes a period from its components; `month` is 1-based.
///
/// Components after the first `None` are ignored.
pub fn period_from_components(
	year: i32,
	month: Option<u8>,
	day: Option<u8>,
	hour: Option<u8>,
) -> String {
	let mut period = format!("{year:04}");

	for component in [month, day, hour].into_iter().map_while(|component| component) {
		period.push_str(&format!("{component:02}"));
	}

	period
}

/// `YYYY` for each date, joined with `-`.
pub fn year_period(dates: &[PrimitiveDateTime]) -> String {
	join_periods(dates, |date| period_from_components(date.year(), None, None, None))
}

/// `YYYYMM` for each date, joined with `-`.
pub fn month_period(dates: &[PrimitiveDateTime]) -> String {
	join_periods(dates, |date| {
		period_from_components(date.year(), Some(date.month().into()), None, None)
	})
}

/// `YYYYMMDD` for each date, joined with `-`.
pub fn day_period(dates: &[PrimitiveDateTime]) -> String {
	join_periods(dates, |date| {
		period_from_components(date.year(), Some(date.month().into()), Some(date.day()), None)
	})
}

/// `YYYYMMDDHH` for each date, joined with `-`.
pub fn hour_period(dates: &[PrimitiveDateTime]) -> String {
	join_periods(dates, |date| {
		period_from_components(
			date.year(),
			Some(date.month().into()),
			Some(date.day()),
			Some(date.hour()),
		)
	})
}

/// Period to request for `dates` at `granularity`.
///
/// A single date widens to the enclosing container unless `forced`: monthly values for one
/// date cover its year, daily values its month. Two or more dates always produce a range
/// at the granularity's own precision. [`Granularity::Week`] on a single date yields the
/// day range from that date through six days later. Returns `None` for an empty slice.
pub fn get_period(
	dates: &[PrimitiveDateTime],
	granularity: Granularity,
	forced: bool,
) -> Option<String> {
	let first = *dates.first()?;
	let precise = dates.len() > 1 || forced;
	let period = match granularity {
		Granularity::Month if precise => month_period(dates),
		Granularity::Month => year_period(dates),
		Granularity::Day if precise => day_period(dates),
		Granularity::Day => month_period(dates),
		Granularity::Week if dates.len() == 1 =>
			day_period(&[first, first.saturating_add(Duration::days(6))]),
		Granularity::Week | Granularity::Hour => day_period(dates),
	};

	Some(period)
}

/// Parses a period back into the instant it starts at.
///
/// Accepts a four-digit year followed by up to five two-digit components (month, day,
/// hour, minute, second). Missing month and day read as 1; missing time fields as 0.
pub fn get_date(period: &str) -> Result<PrimitiveDateTime> {
	let invalid = || ConfigError::InvalidPeriod { period: period.to_owned() };

	if period.len() < 4
		|| period.len() > 14
		|| period.len() % 2 != 0
		|| !period.bytes().all(|byte| byte.is_ascii_digit())
	{
		return Err(invalid().into());
	}

	let year = period[..4].parse::<i32>().map_err(|_| invalid())?;
	let mut components = [1_u8, 1, 0, 0, 0];

	for (slot, start) in components.iter_mut().zip((4..period.len()).step_by(2)) {
		*slot = period[start..start + 2].parse().map_err(|_| invalid())?;
	}

	let [month, day, hour, minute, second] = components;
	let month = Month::try_from(month).map_err(|_| invalid())?;
	let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;
	let time = Time::from_hms(hour, minute, second).map_err(|_| invalid())?;

	Ok(PrimitiveDateTime::new(date, time))
}

const ISO_COMPACT_OFFSET: &[BorrowedFormatItem<'_>] = format_description!(
	"[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]][offset_hour sign:mandatory][optional [:]][offset_minute]"
);

/// Parses an ISO 8601 timestamp as the API writes it.
///
/// RFC 3339 is accepted as is. The API also emits offsets without a colon (`+0100`) and
/// times without seconds (`2014-08-23T22:00+0000`); both are accepted too.
pub fn parse_iso(timestamp: &str) -> Result<OffsetDateTime> {
	OffsetDateTime::parse(timestamp, &Rfc3339)
		.or_else(|_| OffsetDateTime::parse(timestamp, ISO_COMPACT_OFFSET))
		.map_err(|_| ConfigError::InvalidTimestamp { timestamp: timestamp.to_owned() }.into())
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: Date) -> u8 {
	time::util::days_in_year_month(date.year(), date.month())
}

fn join_periods<F>(dates: &[PrimitiveDateTime], format: F) -> String
where
	F: Fn(&PrimitiveDateTime) -> String,
{
	dates.iter().map(format).collect::<Vec<_>>().join("-")
}

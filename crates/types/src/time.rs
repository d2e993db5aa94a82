use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Parse a wire `started` value.
///
/// Accepts RFC 3339 (`2023-07-29T00:00:00Z`, `...+02:00`) and offset-less ISO-8601
/// (`2023-07-29T00:00:00`, optionally with fractional seconds), the latter read as UTC.
pub fn parse_started(value: &str) -> Result<DateTime<Utc>> {
	if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
		return Ok(parsed.with_timezone(&Utc));
	}

	NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
		.map(|naive| naive.and_utc())
		.map_err(|e| Error::Timestamp {
			value: value.to_string(),
			reason: e.to_string(),
		})
}

/// Parse an optional wire `started` value; absence maps to `None`.
pub fn parse_optional_started(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
	value.map(parse_started).transpose()
}

/// Render a timestamp for the wire: RFC 3339, `Z` suffix, shortest exact sub-second precision.
pub fn format_started(started: &DateTime<Utc>) -> String {
	started.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Timelike};
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn test_parse_rfc3339() {
		let started = parse_started("2023-07-29T00:00:00Z").unwrap();
		assert_eq!(started, Utc.with_ymd_and_hms(2023, 7, 29, 0, 0, 0).unwrap());
	}

	#[test]
	fn test_parse_offsetless_as_utc() {
		let started = parse_started("2023-07-29T00:00:00").unwrap();
		assert_eq!(started, Utc.with_ymd_and_hms(2023, 7, 29, 0, 0, 0).unwrap());
	}

	#[test]
	fn test_parse_offset_is_normalised() {
		let started = parse_started("2023-07-29T02:00:00+02:00").unwrap();
		assert_eq!(started, Utc.with_ymd_and_hms(2023, 7, 29, 0, 0, 0).unwrap());
	}

	#[test]
	fn test_fractional_seconds_survive() {
		let started = parse_started("2024-08-31T19:36:58.587310Z").unwrap();
		assert_eq!(started.nanosecond(), 587_310_000);
		assert_eq!(format_started(&started), "2024-08-31T19:36:58.587310Z");
	}

	#[test]
	fn test_rejects_garbage() {
		assert!(matches!(
			parse_started("01/22/2023"),
			Err(Error::Timestamp { .. })
		));
	}

	#[test]
	fn test_absent_is_none() {
		assert_eq!(parse_optional_started(None), Ok(None));
	}

	proptest! {
		#[test]
		fn prop_format_then_parse_is_identity(secs in 0i64..4_102_444_800, nanos in 0u32..1_000_000_000) {
			let started = Utc.timestamp_opt(secs, nanos).unwrap();
			let wire = format_started(&started);
			prop_assert_eq!(parse_started(&wire).unwrap(), started);
			prop_assert_eq!(format_started(&parse_started(&wire).unwrap()), wire);
		}
	}
}

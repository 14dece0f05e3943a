/// Shared data types for the climate service.
///
/// Row types (`Measurement`, `Station`) mirror the two tables of the
/// observation dataset. The remaining types are derived per request by the
/// query layer and serialize directly into the JSON bodies of the API.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::MalformedDateError;

/// Wire format for every date accepted or emitted by the API.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Literal used for `end_date` when a summary has no upper bound.
pub const LATEST: &str = "latest";

// ---------------------------------------------------------------------------
// Dataset rows
// ---------------------------------------------------------------------------

/// One station's daily reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub station_id: String,
    pub date: NaiveDate,
    /// Absent when no rainfall was recorded.
    pub precipitation: Option<f64>,
    pub temperature_observed: f64,
}

/// A weather-observation site.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub station_id: String,
    pub name: String,
    // Geographic attributes are carried but not exposed by the API.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

// ---------------------------------------------------------------------------
// Derived records
// ---------------------------------------------------------------------------

/// `{date, prcp}` as returned by `/api/measurements`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecipitationPoint {
    pub date: NaiveDate,
    #[serde(rename = "prcp")]
    pub precipitation: Option<f64>,
}

/// `{station, name}` as returned by `/api/stations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationListing {
    #[serde(rename = "station")]
    pub station_id: String,
    pub name: String,
}

/// `{date, temperature}` as returned by `/api/tobs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureObservation {
    pub date: NaiveDate,
    pub temperature: f64,
}

/// Number of measurement rows recorded by one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationActivity {
    pub station_id: String,
    pub count: i64,
}

/// min/max/avg of observed temperature over a filtered set of rows.
///
/// Follows SQL aggregate semantics: over an empty set every field is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemperatureStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

impl TemperatureStats {
    /// Aggregates a sequence of temperatures in a single pass.
    pub fn from_temperatures<I>(temperatures: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for t in temperatures {
            count += 1;
            sum += t;
            min = min.min(t);
            max = max.max(t);
        }

        if count == 0 {
            return Self::default();
        }

        Self {
            min: Some(min),
            max: Some(max),
            avg: Some(sum / count as f64),
        }
    }
}

/// Upper bound of a temperature summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndDate {
    /// No upper bound was requested; serialized as `"latest"`.
    Latest,
    Date(NaiveDate),
}

impl From<Option<NaiveDate>> for EndDate {
    fn from(end: Option<NaiveDate>) -> Self {
        end.map_or(EndDate::Latest, EndDate::Date)
    }
}

impl std::fmt::Display for EndDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndDate::Latest => f.write_str(LATEST),
            EndDate::Date(date) => write!(f, "{}", format_date(*date)),
        }
    }
}

impl Serialize for EndDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Body of `/api/start_route` and `/api/start_end_route`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSummary {
    pub start_date: NaiveDate,
    pub end_date: EndDate,
    #[serde(rename = "min_temperature")]
    pub min: Option<f64>,
    #[serde(rename = "max_temperature")]
    pub max: Option<f64>,
    #[serde(rename = "avg_temperature")]
    pub avg: Option<f64>,
}

impl TemperatureSummary {
    pub fn new(start_date: NaiveDate, end_date: Option<NaiveDate>, stats: TemperatureStats) -> Self {
        Self {
            start_date,
            end_date: end_date.into(),
            min: stats.min,
            max: stats.max,
            avg: stats.avg,
        }
    }
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

/// Parses a strict `YYYY-MM-DD` date.
///
/// chrono's `%m`/`%d` accept single digits, so the shape is checked first;
/// only exact 10-byte ASCII dates are handed to the calendar check.
pub fn parse_date(input: &str) -> Result<NaiveDate, MalformedDateError> {
    let bytes = input.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if !well_formed {
        return Err(MalformedDateError::BadFormat(input.to_string()));
    }

    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|_| MalformedDateError::InvalidDate(input.to_string()))
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

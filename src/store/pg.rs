/// PostgreSQL backend for `WeatherStore`.
///
/// Expects the tables described in `sql/schema.sql`. Numeric columns are
/// `NUMERIC` and come back as `rust_decimal::Decimal`; they are converted to
/// `f64` at the row boundary so the rest of the crate works with plain
/// floats. Aggregates run server-side.

use chrono::NaiveDate;
use postgres::{Client, Row};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::db::{self, DbConfigError};
use crate::error::QueryError;
use crate::model::{Measurement, Station, StationActivity, TemperatureStats};
use crate::store::WeatherStore;

const MEASUREMENT_COLUMNS: &str = "station, date, prcp, tobs";

/// One database session, owned by one worker.
pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Opens a read-only session with the given statement timeout.
    pub fn connect(db_url: &str, timeout_ms: u64) -> Result<Self, DbConfigError> {
        db::connect_read_only(db_url, timeout_ms).map(Self::new)
    }

    /// True once the underlying connection has been lost; the owner should
    /// drop this session and open a new one.
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    fn query_measurements(
        &mut self,
        sql: &str,
        params: &[&(dyn postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Measurement>, QueryError> {
        let rows = self.client.query(sql, params)?;
        rows.iter().map(measurement_from_row).collect()
    }
}

impl From<DbConfigError> for QueryError {
    fn from(e: DbConfigError) -> Self {
        match e {
            DbConfigError::ConnectionFailed(inner) => QueryError::DataStoreUnavailable(inner.to_string()),
            other => QueryError::DataStoreUnavailable(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn decimal_to_f64(value: Decimal, column: &str) -> Result<f64, QueryError> {
    value
        .to_f64()
        .ok_or_else(|| QueryError::Internal(format!("{} value {} does not fit in f64", column, value)))
}

fn optional_decimal(value: Option<Decimal>, column: &str) -> Result<Option<f64>, QueryError> {
    value.map(|v| decimal_to_f64(v, column)).transpose()
}

fn measurement_from_row(row: &Row) -> Result<Measurement, QueryError> {
    let prcp: Option<Decimal> = row.try_get(2)?;
    let tobs: Decimal = row.try_get(3)?;

    Ok(Measurement {
        station_id: row.try_get(0)?,
        date: row.try_get(1)?,
        precipitation: optional_decimal(prcp, "prcp")?,
        temperature_observed: decimal_to_f64(tobs, "tobs")?,
    })
}

fn station_from_row(row: &Row) -> Result<Station, QueryError> {
    Ok(Station {
        station_id: row.try_get(0)?,
        name: row.try_get(1)?,
        latitude: optional_decimal(row.try_get(2)?, "latitude")?,
        longitude: optional_decimal(row.try_get(3)?, "longitude")?,
        elevation: optional_decimal(row.try_get(4)?, "elevation")?,
    })
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl WeatherStore for PgStore {
    fn measurements(&mut self) -> Result<Vec<Measurement>, QueryError> {
        self.query_measurements(
            &format!("SELECT {} FROM measurement ORDER BY id", MEASUREMENT_COLUMNS),
            &[],
        )
    }

    fn stations(&mut self) -> Result<Vec<Station>, QueryError> {
        let rows = self.client.query(
            "SELECT station, name, latitude, longitude, elevation
             FROM station
             ORDER BY id",
            &[],
        )?;
        rows.iter().map(station_from_row).collect()
    }

    fn measurements_since(&mut self, since: NaiveDate) -> Result<Vec<Measurement>, QueryError> {
        self.query_measurements(
            &format!(
                "SELECT {} FROM measurement
                 WHERE date >= $1
                 ORDER BY date, id",
                MEASUREMENT_COLUMNS
            ),
            &[&since],
        )
    }

    fn station_measurements_since(
        &mut self,
        station_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Measurement>, QueryError> {
        self.query_measurements(
            &format!(
                "SELECT {} FROM measurement
                 WHERE station = $1 AND date >= $2
                 ORDER BY date, id",
                MEASUREMENT_COLUMNS
            ),
            &[&station_id, &since],
        )
    }

    fn station_count(&mut self) -> Result<i64, QueryError> {
        let row = self.client.query_one("SELECT COUNT(*) FROM station", &[])?;
        Ok(row.try_get(0)?)
    }

    fn measurement_count(&mut self) -> Result<i64, QueryError> {
        let row = self.client.query_one("SELECT COUNT(*) FROM measurement", &[])?;
        Ok(row.try_get(0)?)
    }

    fn station_activity(&mut self) -> Result<Vec<StationActivity>, QueryError> {
        let rows = self.client.query(
            "SELECT station, COUNT(*) FROM measurement GROUP BY station",
            &[],
        )?;

        rows.iter()
            .map(|row| {
                Ok(StationActivity {
                    station_id: row.try_get(0)?,
                    count: row.try_get(1)?,
                })
            })
            .collect()
    }

    fn latest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError> {
        let row = self.client.query_one("SELECT MAX(date) FROM measurement", &[])?;
        Ok(row.try_get(0)?)
    }

    fn earliest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError> {
        let row = self.client.query_one("SELECT MIN(date) FROM measurement", &[])?;
        Ok(row.try_get(0)?)
    }

    fn temperature_stats(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<TemperatureStats, QueryError> {
        // A NULL end leaves the range open above.
        let row = self.client.query_one(
            "SELECT MIN(tobs), MAX(tobs), AVG(tobs)
             FROM measurement
             WHERE date >= $1 AND ($2::date IS NULL OR date <= $2)",
            &[&start, &end],
        )?;

        Ok(TemperatureStats {
            min: optional_decimal(row.try_get(0)?, "min(tobs)")?,
            max: optional_decimal(row.try_get(1)?, "max(tobs)")?,
            avg: optional_decimal(row.try_get(2)?, "avg(tobs)")?,
        })
    }
}

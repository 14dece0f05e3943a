/// Read-only access to the observation dataset.
///
/// Submodules:
/// - `pg`: `PgStore`, the production backend over a `postgres::Client`.
/// - `memory`: `MemoryStore`, rows held in process (tests, offline tools).
///
/// The trait exposes row-level reads only; date windows, station selection
/// and response shaping belong to `crate::query`.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use chrono::NaiveDate;

use crate::error::QueryError;
use crate::model::{Measurement, Station, StationActivity, TemperatureStats};

/// A session against the dataset. Methods take `&mut self` because a
/// database session is used by one request at a time.
pub trait WeatherStore {
    /// Every measurement row in natural (insertion) order.
    fn measurements(&mut self) -> Result<Vec<Measurement>, QueryError>;

    /// Every station row in natural order.
    fn stations(&mut self) -> Result<Vec<Station>, QueryError>;

    /// Measurements with `date >= since`, ascending by date. Rows sharing a
    /// date keep natural order. There is no upper bound.
    fn measurements_since(&mut self, since: NaiveDate) -> Result<Vec<Measurement>, QueryError>;

    /// Same as `measurements_since`, restricted to one station.
    fn station_measurements_since(
        &mut self,
        station_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Measurement>, QueryError>;

    /// Number of station rows.
    fn station_count(&mut self) -> Result<i64, QueryError>;

    /// Number of measurement rows.
    fn measurement_count(&mut self) -> Result<i64, QueryError>;

    /// Measurement row count per station, in no particular order.
    fn station_activity(&mut self) -> Result<Vec<StationActivity>, QueryError>;

    /// Maximum measurement date, `None` on an empty dataset.
    fn latest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError>;

    /// Minimum measurement date, `None` on an empty dataset.
    fn earliest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError>;

    /// min/max/avg of observed temperature over `start <= date [<= end]`.
    fn temperature_stats(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<TemperatureStats, QueryError>;
}

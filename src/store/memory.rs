/// In-process `WeatherStore`.
///
/// Holds rows in insertion order, which stands in for the natural row order
/// of the database tables. Filtering and aggregation follow the same rules
/// as the SQL in `store::pg`, so query-layer behavior can be exercised
/// without a running PostgreSQL.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::error::QueryError;
use crate::model::{Measurement, Station, StationActivity, TemperatureStats};
use crate::store::WeatherStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stations: Vec<Station>,
    measurements: Vec<Measurement>,
}

impl MemoryStore {
    pub fn new(stations: Vec<Station>, measurements: Vec<Measurement>) -> Self {
        Self { stations, measurements }
    }

    pub fn push_station(&mut self, station: Station) {
        self.stations.push(station);
    }

    pub fn push_measurement(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    /// Rows with `date >= since` matching `keep`, ascending by date.
    fn filtered_since<F>(&self, since: NaiveDate, keep: F) -> Vec<Measurement>
    where
        F: Fn(&Measurement) -> bool,
    {
        let mut rows: Vec<Measurement> = self
            .measurements
            .iter()
            .filter(|m| m.date >= since && keep(m))
            .cloned()
            .collect();
        // Stable: equal dates keep insertion order, like `ORDER BY date, id`.
        rows.sort_by_key(|m| m.date);
        rows
    }
}

impl WeatherStore for MemoryStore {
    fn measurements(&mut self) -> Result<Vec<Measurement>, QueryError> {
        Ok(self.measurements.clone())
    }

    fn stations(&mut self) -> Result<Vec<Station>, QueryError> {
        Ok(self.stations.clone())
    }

    fn measurements_since(&mut self, since: NaiveDate) -> Result<Vec<Measurement>, QueryError> {
        Ok(self.filtered_since(since, |_| true))
    }

    fn station_measurements_since(
        &mut self,
        station_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Measurement>, QueryError> {
        Ok(self.filtered_since(since, |m| m.station_id == station_id))
    }

    fn station_count(&mut self) -> Result<i64, QueryError> {
        Ok(self.stations.len() as i64)
    }

    fn measurement_count(&mut self) -> Result<i64, QueryError> {
        Ok(self.measurements.len() as i64)
    }

    fn station_activity(&mut self) -> Result<Vec<StationActivity>, QueryError> {
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for m in &self.measurements {
            *counts.entry(m.station_id.as_str()).or_insert(0) += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(station_id, count)| StationActivity {
                station_id: station_id.to_string(),
                count,
            })
            .collect())
    }

    fn latest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError> {
        Ok(self.measurements.iter().map(|m| m.date).max())
    }

    fn earliest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError> {
        Ok(self.measurements.iter().map(|m| m.date).min())
    }

    fn temperature_stats(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<TemperatureStats, QueryError> {
        let in_range = self
            .measurements
            .iter()
            .filter(|m| m.date >= start && end.is_none_or(|end| m.date <= end))
            .map(|m| m.temperature_observed);

        Ok(TemperatureStats::from_temperatures(in_range))
    }
}

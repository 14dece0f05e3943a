/// Query layer: turns each API request into store reads and shapes the
/// rows into response records.
///
/// Owns the date-window rules, the most-active-station selection and the
/// temperature summary contract. Holds no state besides the anchor
/// configuration; the store session is lent in per call.

use chrono::{Days, NaiveDate};

use crate::config::AnchorDate;
use crate::error::QueryError;
use crate::model::{
    PrecipitationPoint, StationActivity, StationListing, TemperatureObservation,
    TemperatureSummary,
};
use crate::store::WeatherStore;

/// Length of the "last year" window, counted back from the anchor.
pub const WINDOW_DAYS: u64 = 365;

/// Inclusive lower bound of the window counted back from `anchor`.
pub fn window_start(anchor: NaiveDate) -> NaiveDate {
    anchor
        .checked_sub_days(Days::new(WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN)
}

/// Picks the station with the most measurement rows.
///
/// Ties go to the lowest station id so the choice does not depend on the
/// order the store returns groups in.
pub fn most_active(activity: &[StationActivity]) -> Option<&StationActivity> {
    activity.iter().max_by(|a, b| {
        a.count
            .cmp(&b.count)
            .then_with(|| b.station_id.cmp(&a.station_id))
    })
}

/// Counts and span of the dataset, for operator tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOverview {
    pub station_count: i64,
    pub measurement_count: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub most_active: Option<StationActivity>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryLayer {
    anchor: AnchorDate,
}

impl QueryLayer {
    pub fn new(anchor: AnchorDate) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> AnchorDate {
        self.anchor
    }

    /// The effective reference date, `None` when anchored to the dataset
    /// and the dataset is empty.
    pub fn resolve_anchor<S: WeatherStore>(&self, store: &mut S) -> Result<Option<NaiveDate>, QueryError> {
        match self.anchor {
            AnchorDate::Fixed(date) => Ok(Some(date)),
            AnchorDate::DatasetLatest => store.latest_measurement_date(),
        }
    }

    /// `(date, prcp)` for every measurement, natural order.
    pub fn list_measurements<S: WeatherStore>(&self, store: &mut S) -> Result<Vec<PrecipitationPoint>, QueryError> {
        Ok(store
            .measurements()?
            .into_iter()
            .map(|m| PrecipitationPoint {
                date: m.date,
                precipitation: m.precipitation,
            })
            .collect())
    }

    /// `(station, name)` for every station, natural order.
    pub fn list_stations<S: WeatherStore>(&self, store: &mut S) -> Result<Vec<StationListing>, QueryError> {
        Ok(store
            .stations()?
            .into_iter()
            .map(|s| StationListing {
                station_id: s.station_id,
                name: s.name,
            })
            .collect())
    }

    /// Precipitation for every date on or after `anchor - 365 days`,
    /// ascending by date. Only the lower bound is applied: rows dated after
    /// a fixed anchor are returned too.
    pub fn precipitation_last_year<S: WeatherStore>(
        &self,
        store: &mut S,
    ) -> Result<Vec<PrecipitationPoint>, QueryError> {
        let Some(anchor) = self.resolve_anchor(store)? else {
            return Ok(Vec::new());
        };

        Ok(store
            .measurements_since(window_start(anchor))?
            .into_iter()
            .map(|m| PrecipitationPoint {
                date: m.date,
                precipitation: m.precipitation,
            })
            .collect())
    }

    /// The station with the most rows, if there are any rows at all.
    pub fn most_active_station<S: WeatherStore>(&self, store: &mut S) -> Result<Option<StationActivity>, QueryError> {
        let activity = store.station_activity()?;
        Ok(most_active(&activity).cloned())
    }

    /// Temperatures of the most active station dated on or after
    /// `window_start(anchor)`.
    pub fn most_active_station_temps<S: WeatherStore>(
        &self,
        store: &mut S,
    ) -> Result<Vec<TemperatureObservation>, QueryError> {
        let Some(station) = self.most_active_station(store)? else {
            return Ok(Vec::new());
        };
        let Some(anchor) = self.resolve_anchor(store)? else {
            return Ok(Vec::new());
        };

        log::debug!(
            "most active station {} ({} rows), window from {}",
            station.station_id,
            station.count,
            window_start(anchor)
        );

        Ok(store
            .station_measurements_since(&station.station_id, window_start(anchor))?
            .into_iter()
            .map(|m| TemperatureObservation {
                date: m.date,
                temperature: m.temperature_observed,
            })
            .collect())
    }

    /// min/max/avg temperature over `start <= date [<= end]`.
    ///
    /// An inverted range is not rejected; it simply matches no rows.
    pub fn temperature_summary<S: WeatherStore>(
        &self,
        store: &mut S,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<TemperatureSummary, QueryError> {
        let stats = store.temperature_stats(start, end)?;
        Ok(TemperatureSummary::new(start, end, stats))
    }

    pub fn dataset_overview<S: WeatherStore>(&self, store: &mut S) -> Result<DatasetOverview, QueryError> {
        Ok(DatasetOverview {
            station_count: store.station_count()?,
            measurement_count: store.measurement_count()?,
            first_date: store.earliest_measurement_date()?,
            last_date: store.latest_measurement_date()?,
            most_active: self.most_active_station(store)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_date;

    fn activity(station: &str, count: i64) -> StationActivity {
        StationActivity { station_id: station.to_string(), count }
    }

    #[test]
    fn test_window_start_is_365_days_back() {
        let anchor = parse_date("2017-08-23").unwrap();
        assert_eq!(window_start(anchor), parse_date("2016-08-23").unwrap());

        // 2016 is a leap year: 365 days before 2016-12-31 is 2016-01-01.
        let anchor = parse_date("2016-12-31").unwrap();
        assert_eq!(window_start(anchor), parse_date("2016-01-01").unwrap());
    }

    #[test]
    fn test_window_start_saturates() {
        assert_eq!(window_start(NaiveDate::MIN), NaiveDate::MIN);
    }

    #[test]
    fn test_most_active_picks_highest_count() {
        let rows = vec![activity("USC00519397", 2724), activity("USC00519281", 2772), activity("USC00513117", 2709)];
        assert_eq!(most_active(&rows).unwrap().station_id, "USC00519281");
    }

    #[test]
    fn test_most_active_tie_goes_to_lowest_station_id() {
        let rows = vec![activity("USC00519523", 10), activity("USC00511918", 10), activity("USC00516128", 10)];
        assert_eq!(most_active(&rows).unwrap().station_id, "USC00511918");

        let reversed: Vec<_> = rows.into_iter().rev().collect();
        assert_eq!(most_active(&reversed).unwrap().station_id, "USC00511918");
    }

    #[test]
    fn test_most_active_of_nothing() {
        assert!(most_active(&[]).is_none());
    }
}

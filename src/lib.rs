/// climate_service: read-only HTTP API over historical Hawaii weather observations.
///
/// # Module structure
///
/// ```text
/// climate_service
/// ├── model     — row types (Measurement, Station), derived records, YYYY-MM-DD parsing
/// ├── error     — QueryError / MalformedDateError and their HTTP status mapping
/// ├── config    — service configuration loader (service.toml)
/// ├── db        — PostgreSQL connection and table validation
/// ├── store
/// │   ├── pg     — WeatherStore over a postgres::Client
/// │   └── memory — WeatherStore over in-process rows
/// ├── query     — date windows, most-active station, temperature summaries
/// └── endpoint  — routes, JSON shaping, worker-thread HTTP server
/// ```

/// Public modules
pub mod config;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod query;
pub mod store;

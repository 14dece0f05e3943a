/// HTTP endpoint for the climate API
///
/// Provides a small read-only REST API over the observation dataset.
///
/// Endpoints:
/// - GET / - Plain-text list of routes
/// - GET /api/measurements - Every `{date, prcp}` row
/// - GET /api/stations - Every `{station, name}` row
/// - GET /api/precipitation - `{date: prcp}` over the last 365 days
/// - GET /api/tobs - Most active station's temperatures over the last 365 days
/// - GET /api/start_route?start=YYYY-MM-DD - Temperature summary from `start`
/// - GET /api/start_end_route?start=YYYY-MM-DD&end=YYYY-MM-DD - Summary over a range
/// - GET /health - Service health check
///
/// Requests are served by a fixed set of worker threads. Each worker owns one
/// data-store session, opened lazily and replaced after the store reports
/// itself unavailable.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use threadpool::ThreadPool;
use tiny_http::{Header, Method, Server, StatusCode};

use crate::error::{MalformedDateError, QueryError};
use crate::model::{self, TemperatureSummary};
use crate::query::QueryLayer;
use crate::store::WeatherStore;

pub const ROUTES: &[&str] = &[
    "/api/measurements",
    "/api/stations",
    "/api/precipitation",
    "/api/tobs",
    "/api/start_route?start=YYYY-MM-DD",
    "/api/start_end_route?start=YYYY-MM-DD&end=YYYY-MM-DD",
    "/health",
];

/// Paths served from the store.
const API_PATHS: &[&str] = &[
    "/api/measurements",
    "/api/stations",
    "/api/precipitation",
    "/api/tobs",
    "/api/start_route",
    "/api/start_end_route",
];

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Failed to start HTTP server on {0}")]
    Bind(String, #[source] Box<dyn std::error::Error + Send + Sync>),
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Json(serde_json::Value),
}

/// A routed response, independent of the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Body,
}

impl ApiResponse {
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self { status, body: Body::Text(text.into()) }
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self { status, body: Body::Json(value) }
    }

    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => Self::json(200, json),
            Err(e) => Self::from_error(&QueryError::Internal(format!("serialization failed: {}", e))),
        }
    }

    pub fn from_error(error: &QueryError) -> Self {
        match error {
            QueryError::MalformedDate(_) => log::debug!("rejected request: {}", error),
            _ => log::error!("request failed: {}", error),
        }

        Self::json(
            error.status_code(),
            serde_json::json!({
                "error": error.client_message(),
                "kind": error.kind(),
            }),
        )
    }

    fn into_http(self) -> tiny_http::Response<Cursor<Vec<u8>>> {
        let (bytes, content_type) = match self.body {
            Body::Text(text) => (text.into_bytes(), &b"text/plain; charset=utf-8"[..]),
            Body::Json(json) => (
                serde_json::to_vec_pretty(&json).unwrap_or_else(|_| b"null".to_vec()),
                &b"application/json"[..],
            ),
        };

        let response = tiny_http::Response::from_data(bytes)
            .with_status_code(StatusCode::from(self.status));

        match Header::from_bytes(&b"Content-Type"[..], content_type) {
            Ok(header) => response.with_header(header),
            Err(()) => response,
        }
    }
}

fn welcome_text() -> String {
    let mut text = String::from("Welcome to the Hawaii climate API!\n\nAvailable routes:\n");
    for route in ROUTES {
        text.push_str("  ");
        text.push_str(route);
        text.push('\n');
    }
    text
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Splits `/path?a=1&b=2` into the path and its decoded parameters. A
/// repeated parameter keeps its first value.
pub fn split_url(url: &str) -> (&str, HashMap<String, String>) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let mut params = HashMap::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.entry(decode(key)).or_insert_with(|| decode(value));
    }

    (path, params)
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Reads a required `YYYY-MM-DD` parameter.
fn date_param(params: &HashMap<String, String>, name: &str) -> Result<NaiveDate, MalformedDateError> {
    let raw = params
        .get(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MalformedDateError::Missing(name.to_string()))?;
    model::parse_date(raw)
}

/// Answers the requests that never touch the store: non-GET methods, `/`,
/// `/health` and unknown paths. `None` means `path` is an API route.
pub fn static_route(method: &Method, path: &str) -> Option<ApiResponse> {
    if *method != Method::Get {
        return Some(ApiResponse::json(
            405,
            serde_json::json!({ "error": "Method not allowed", "allowed": ["GET"] }),
        ));
    }

    match path {
        "/" => Some(ApiResponse::text(200, welcome_text())),
        "/health" => Some(handle_health()),
        p if API_PATHS.contains(&p) => None,
        _ => Some(not_found()),
    }
}

/// Routes one request against a store session.
pub fn handle_route<S: WeatherStore>(
    queries: &QueryLayer,
    store: &mut S,
    method: &Method,
    url: &str,
) -> ApiResponse {
    let (path, params) = split_url(url);

    if let Some(response) = static_route(method, path) {
        return response;
    }

    let result = match path {
        "/api/measurements" => queries.list_measurements(store).map(|rows| ApiResponse::ok(&rows)),
        "/api/stations" => queries.list_stations(store).map(|rows| ApiResponse::ok(&rows)),
        "/api/precipitation" => handle_precipitation(queries, store),
        "/api/tobs" => queries.most_active_station_temps(store).map(|rows| ApiResponse::ok(&rows)),
        "/api/start_route" => handle_summary(queries, store, &params, false),
        "/api/start_end_route" => handle_summary(queries, store, &params, true),
        _ => return not_found(),
    };

    result.unwrap_or_else(|e| ApiResponse::from_error(&e))
}

fn not_found() -> ApiResponse {
    ApiResponse::json(
        404,
        serde_json::json!({
            "error": "Not found",
            "available_endpoints": ROUTES,
        }),
    )
}

/// Handle /health endpoint
fn handle_health() -> ApiResponse {
    ApiResponse::json(
        200,
        serde_json::json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Handle /api/precipitation: maps each date to its prcp. A date reported by several
/// stations keeps the last row's value.
fn handle_precipitation<S: WeatherStore>(queries: &QueryLayer, store: &mut S) -> Result<ApiResponse, QueryError> {
    let by_date: BTreeMap<String, Option<f64>> = queries
        .precipitation_last_year(store)?
        .into_iter()
        .map(|p| (model::format_date(p.date), p.precipitation))
        .collect();

    Ok(ApiResponse::ok(&by_date))
}

/// Handle /api/start_route and /api/start_end_route
fn handle_summary<S: WeatherStore>(
    queries: &QueryLayer,
    store: &mut S,
    params: &HashMap<String, String>,
    with_end: bool,
) -> Result<ApiResponse, QueryError> {
    let start = date_param(params, "start")?;
    let end = if with_end { Some(date_param(params, "end")?) } else { None };

    let summary: TemperatureSummary = queries.temperature_summary(store, start, end)?;
    Ok(ApiResponse::ok(&summary))
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Binds the HTTP listener. Port 0 picks a free port.
pub fn bind(host: &str, port: u16) -> Result<Server, EndpointError> {
    let addr = format!("{}:{}", host, port);
    Server::http(&addr).map_err(|e| EndpointError::Bind(addr, e))
}

/// Serves requests on `workers` threads until the listener shuts down.
///
/// `connect` opens a store session; each worker calls it on its first API
/// request and again after its session reported `DataStoreUnavailable`.
/// `/`, `/health`, 404 and 405 answers never open a session.
pub fn serve<F, S>(server: Arc<Server>, workers: usize, queries: QueryLayer, connect: F)
where
    F: Fn() -> Result<S, QueryError> + Send + Sync + 'static,
    S: WeatherStore + 'static,
{
    let pool = ThreadPool::with_name("http-worker".to_string(), workers.max(1));
    let connect = Arc::new(connect);

    for _ in 0..workers.max(1) {
        let server = Arc::clone(&server);
        let connect = Arc::clone(&connect);

        pool.execute(move || {
            let mut session: Option<S> = None;

            for request in server.incoming_requests() {
                let method = request.method().clone();
                let url = request.url().to_string();

                let response = respond(&queries, &mut session, connect.as_ref(), &method, &url);
                log::debug!("{} {} -> {}", method, url, response.status);

                if let Err(e) = request.respond(response.into_http()) {
                    log::warn!("Failed to send response: {}", e);
                }
            }
        });
    }

    pool.join();
}

/// Routes one request for a worker holding `session`.
fn respond<F, S>(
    queries: &QueryLayer,
    session: &mut Option<S>,
    connect: &F,
    method: &Method,
    url: &str,
) -> ApiResponse
where
    F: Fn() -> Result<S, QueryError>,
    S: WeatherStore,
{
    let (path, _) = split_url(url);
    if let Some(response) = static_route(method, path) {
        return response;
    }

    let response = match session_or_connect(session, connect) {
        Ok(store) => handle_route(queries, store, method, url),
        Err(e) => ApiResponse::from_error(&e),
    };

    if response.status == 503 {
        // Reconnect on the next request.
        *session = None;
    }

    response
}

fn session_or_connect<'a, F, S>(session: &'a mut Option<S>, connect: &F) -> Result<&'a mut S, QueryError>
where
    F: Fn() -> Result<S, QueryError>,
{
    let store = match session.take() {
        Some(store) => store,
        None => connect()?,
    };
    Ok(session.insert(store))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnchorDate;
    use crate::model::{Measurement, Station, StationActivity, TemperatureStats};
    use crate::store::MemoryStore;
    use std::cell::Cell;

    /// Store whose every read fails with `DataStoreUnavailable` while `down`.
    struct FlakyStore {
        down: bool,
        inner: MemoryStore,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), QueryError> {
            if self.down {
                Err(QueryError::DataStoreUnavailable("server closed the connection".into()))
            } else {
                Ok(())
            }
        }
    }

    impl WeatherStore for FlakyStore {
        fn measurements(&mut self) -> Result<Vec<Measurement>, QueryError> {
            self.check()?;
            self.inner.measurements()
        }

        fn stations(&mut self) -> Result<Vec<Station>, QueryError> {
            self.check()?;
            self.inner.stations()
        }

        fn measurements_since(&mut self, since: NaiveDate) -> Result<Vec<Measurement>, QueryError> {
            self.check()?;
            self.inner.measurements_since(since)
        }

        fn station_measurements_since(
            &mut self,
            station_id: &str,
            since: NaiveDate,
        ) -> Result<Vec<Measurement>, QueryError> {
            self.check()?;
            self.inner.station_measurements_since(station_id, since)
        }

        fn station_count(&mut self) -> Result<i64, QueryError> {
            self.check()?;
            self.inner.station_count()
        }

        fn measurement_count(&mut self) -> Result<i64, QueryError> {
            self.check()?;
            self.inner.measurement_count()
        }

        fn station_activity(&mut self) -> Result<Vec<StationActivity>, QueryError> {
            self.check()?;
            self.inner.station_activity()
        }

        fn latest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError> {
            self.check()?;
            self.inner.latest_measurement_date()
        }

        fn earliest_measurement_date(&mut self) -> Result<Option<NaiveDate>, QueryError> {
            self.check()?;
            self.inner.earliest_measurement_date()
        }

        fn temperature_stats(
            &mut self,
            start: NaiveDate,
            end: Option<NaiveDate>,
        ) -> Result<TemperatureStats, QueryError> {
            self.check()?;
            self.inner.temperature_stats(start, end)
        }
    }

    fn queries() -> QueryLayer {
        QueryLayer::new(AnchorDate::default())
    }

    #[test]
    fn test_split_url_decodes_parameters() {
        let (path, params) = split_url("/api/start_end_route?start=2017-01-01&end=2017%2D01%2D07");
        assert_eq!(path, "/api/start_end_route");
        assert_eq!(params["start"], "2017-01-01");
        assert_eq!(params["end"], "2017-01-07");
    }

    #[test]
    fn test_split_url_without_query() {
        let (path, params) = split_url("/api/stations");
        assert_eq!(path, "/api/stations");
        assert!(params.is_empty());
    }

    #[test]
    fn test_split_url_first_value_wins() {
        let (_, params) = split_url("/api/start_route?start=2017-01-01&start=2018-01-01");
        assert_eq!(params["start"], "2017-01-01");
    }

    #[test]
    fn test_date_param_missing_and_empty() {
        let (_, params) = split_url("/api/start_route?start=");
        assert_eq!(
            date_param(&params, "start"),
            Err(MalformedDateError::Missing("start".into()))
        );
        assert_eq!(
            date_param(&params, "end"),
            Err(MalformedDateError::Missing("end".into()))
        );
    }

    #[test]
    fn test_welcome_lists_every_route() {
        let text = welcome_text();
        for route in ROUTES {
            assert!(text.contains(route), "welcome text should list {}", route);
        }
    }

    #[test]
    fn test_session_is_reused() {
        let calls = std::cell::Cell::new(0);
        let connect = || {
            calls.set(calls.get() + 1);
            Ok(crate::store::MemoryStore::default())
        };

        let mut session = None;
        session_or_connect(&mut session, &connect).unwrap();
        session_or_connect(&mut session, &connect).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_connect_leaves_no_session() {
        let connect = || -> Result<crate::store::MemoryStore, QueryError> {
            Err(QueryError::DataStoreUnavailable("refused".into()))
        };

        let mut session = None;
        let err = session_or_connect(&mut session, &connect).unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert!(session.is_none());
    }

    #[test]
    fn test_unavailable_session_is_replaced() {
        let calls = Cell::new(0);
        // The first session dies on its first query; later ones work.
        let connect = || {
            calls.set(calls.get() + 1);
            Ok(FlakyStore { down: calls.get() == 1, inner: MemoryStore::default() })
        };

        let mut session = None;
        let first = respond(&queries(), &mut session, &connect, &Method::Get, "/api/stations");
        assert_eq!(first.status, 503);
        assert!(session.is_none(), "a 503 drops the session");

        let second = respond(&queries(), &mut session, &connect, &Method::Get, "/api/stations");
        assert_eq!(second.status, 200);
        assert_eq!(calls.get(), 2);

        respond(&queries(), &mut session, &connect, &Method::Get, "/api/measurements");
        assert_eq!(calls.get(), 2, "a healthy session is kept");
    }

    #[test]
    fn test_static_routes_never_connect() {
        let calls = Cell::new(0);
        let connect = || -> Result<MemoryStore, QueryError> {
            calls.set(calls.get() + 1);
            Err(QueryError::DataStoreUnavailable("refused".into()))
        };

        let mut session = None;
        for (method, url, status) in [
            (Method::Get, "/", 200),
            (Method::Get, "/health", 200),
            (Method::Get, "/nope", 404),
            (Method::Post, "/api/stations", 405),
        ] {
            let response = respond(&queries(), &mut session, &connect, &method, url);
            assert_eq!(response.status, status, "{} {}", method, url);
        }
        assert_eq!(calls.get(), 0);

        let api = respond(&queries(), &mut session, &connect, &Method::Get, "/api/tobs");
        assert_eq!(api.status, 503);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_static_route_leaves_api_paths_to_the_store() {
        assert!(static_route(&Method::Get, "/api/precipitation").is_none());
        assert!(static_route(&Method::Get, "/api/start_route").is_none());
        assert_eq!(static_route(&Method::Get, "/api").map(|r| r.status), Some(404));
    }
}

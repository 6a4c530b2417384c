//! JSON read surface over `tiny_http`.
//!
//! A fixed pool of worker threads shares one listener. Each worker polls with
//! `recv_timeout` so a raised stop flag is noticed within [`POLL_INTERVAL`].
//! Request handling itself lives in [`route`], which has no socket attached.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use market_common::api::{
    AlertsResponse, ErrorResponse, HealthResponse, HistoryResponse, PricesResponse, TrendsResponse,
};
use market_common::commodity::{self, Category};
use market_common::net::{ALERTS_PATH, HEALTH_PATH, PRICES_PATH, TRENDS_PATH};
use market_common::{MarketError, Provider, Result};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::service::{MarketService, PriceQuery};

/// How long a worker blocks waiting for a request before checking the stop flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const FETCH_FAILED: &str = "Failed to fetch market data";

/// Status code and JSON body of an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// HTTP status code.
    pub status: u16,
    /// Serialized JSON body.
    pub body: String,
}

impl Reply {
    fn json<T: Serialize>(status: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Reply { status, body },
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                Reply {
                    status: 500,
                    body: r#"{"success":false,"error":"Internal error","message":"serialization failed"}"#
                        .to_string(),
                }
            }
        }
    }

    fn error(status: u16, error: &str, message: impl ToString) -> Self {
        Self::json(status, &ErrorResponse::new(error, message))
    }

    fn from_error(err: MarketError) -> Self {
        match err {
            MarketError::InvalidQuery(reason) => Self::error(400, "Invalid query", reason),
            other => {
                warn!("Read request failed: {}", other);
                Self::error(500, FETCH_FAILED, other)
            }
        }
    }
}

/// Answer one request.
///
/// `url` is the request target as received, path plus optional query.
pub fn route(method: &Method, url: &str, service: &MarketService) -> Reply {
    let parsed = match Url::parse(&format!("http://localhost{}", url)) {
        Ok(parsed) => parsed,
        Err(e) => return Reply::error(400, "Invalid query", e),
    };
    if *method != Method::Get {
        return Reply::error(405, "Method not allowed", format!("{} {}", method, parsed.path()));
    }

    let path = parsed.path().trim_end_matches('/');
    let result = match path {
        HEALTH_PATH => Ok(Reply::json(
            200,
            &HealthResponse {
                success: true,
                message: "Market price service is running".to_string(),
            },
        )),
        PRICES_PATH => prices(&parsed, service),
        TRENDS_PATH => trends(&parsed, service),
        ALERTS_PATH => alerts(service),
        _ => match history_commodity(path) {
            Some(commodity) => history(&commodity, &parsed, service),
            None => return Reply::error(404, "Not found", format!("Unknown endpoint: {}", path)),
        },
    };
    result.unwrap_or_else(Reply::from_error)
}

// Commodity segment of a history path, percent-decoded (`Live%20Cattle`).
fn history_commodity(path: &str) -> Option<String> {
    let segment = path
        .strip_prefix(PRICES_PATH)?
        .strip_prefix('/')?
        .strip_suffix("/history")?;
    if segment.is_empty() || segment.contains('/') {
        return None;
    }
    let commodity = percent_decode_str(segment).decode_utf8().ok()?;
    (!commodity.trim().is_empty()).then(|| commodity.into_owned())
}

/// Last non-blank value of query parameter `name`.
fn param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .last()
}

fn prices(url: &Url, service: &MarketService) -> Result<Reply> {
    let source = param(url, "source")
        .map(|raw| {
            raw.parse::<Provider>()
                .map_err(|_| MarketError::InvalidQuery(format!("unknown source `{}`", raw)))
        })
        .transpose()?;
    let commodities = param(url, "commodities")
        .map(|raw| commodity::parse_list(&raw))
        .unwrap_or_default();

    let result = service.prices(&PriceQuery { source, commodities })?;
    Ok(Reply::json(
        200,
        &PricesResponse {
            success: true,
            data: result.value,
            cached: result.cached,
            source,
            timestamp: Utc::now(),
        },
    ))
}

fn history(commodity: &str, url: &Url, service: &MarketService) -> Result<Reply> {
    let days = param(url, "days")
        .map(|raw| {
            raw.parse::<u32>()
                .map_err(|_| MarketError::InvalidQuery(format!("days must be a number, got `{}`", raw)))
        })
        .transpose()?;
    let period_days = crate::service::validate_days(days)?;

    let result = service.history(commodity, Some(period_days))?;
    Ok(Reply::json(
        200,
        &HistoryResponse {
            success: true,
            commodity: commodity.to_string(),
            period_days,
            data: result.value,
            cached: result.cached,
        },
    ))
}

fn trends(url: &Url, service: &MarketService) -> Result<Reply> {
    let category = match param(url, "category") {
        None => None,
        Some(raw) if raw.eq_ignore_ascii_case("all") => None,
        Some(raw) => Some(
            raw.parse::<Category>()
                .map_err(|_| MarketError::InvalidQuery(format!("unknown category `{}`", raw)))?,
        ),
    };

    let result = service.trends(category)?;
    Ok(Reply::json(
        200,
        &TrendsResponse {
            success: true,
            data: result.value,
            cached: result.cached,
        },
    ))
}

fn alerts(service: &MarketService) -> Result<Reply> {
    let data = service.alerts()?;
    Ok(Reply::json(
        200,
        &AlertsResponse {
            success: true,
            count: data.len(),
            data,
        },
    ))
}

fn respond(request: Request, reply: Reply) {
    let mut response = Response::from_data(reply.body.into_bytes()).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        warn!("Failed to send response: {}", e);
    }
}

fn worker_loop(id: usize, server: Arc<Server>, service: Arc<MarketService>, shutdown: Arc<AtomicBool>) {
    debug!("HTTP worker {} started", id);
    while !shutdown.load(Ordering::Relaxed) {
        let request = match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                error!("HTTP worker {} receive error: {}", id, e);
                continue;
            }
        };
        let method = request.method().clone();
        let url = request.url().to_string();
        let reply = route(&method, &url, &service);
        debug!("{} {} -> {}", method, url, reply.status);
        respond(request, reply);
    }
    debug!("HTTP worker {} stopped", id);
}

/// Running HTTP listener and its workers.
pub struct HttpServer {
    server: Arc<Server>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl HttpServer {
    /// Bind `bind` and start `workers` threads answering requests with `service`.
    pub fn start(bind: &str, workers: u16, service: Arc<MarketService>) -> Result<Self> {
        let server = Server::http(bind)
            .map_err(|e| MarketError::Server(format!("Failed to bind {}: {}", bind, e)))?;
        let server = Arc::new(server);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handles = (0..usize::from(workers.max(1)))
            .map(|id| {
                let server = Arc::clone(&server);
                let service = Arc::clone(&service);
                let shutdown = Arc::clone(&shutdown);
                thread::spawn(move || worker_loop(id, server, service, shutdown))
            })
            .collect();

        let this = Self {
            server,
            shutdown,
            workers: handles,
        };
        match this.local_addr() {
            Some(addr) => info!("HTTP server listening on http://{} ({} workers)", addr, workers),
            None => info!("HTTP server listening on {} ({} workers)", bind, workers),
        }
        Ok(this)
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Stop accepting requests and join the workers. Calling it twice is harmless.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("HTTP worker panicked");
            }
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::CountingSource;
    use crate::model::store::MemoryStore;
    use crate::model::store::QuoteStore;
    use crate::model::store::tests::quote;
    use crate::service::tests::service_with;
    use market_common::api::TrendReport;

    fn demo_service() -> (Arc<CountingSource>, Arc<MemoryStore>, MarketService) {
        let demo = Arc::new(CountingSource::new(Provider::Demo));
        let store = Arc::new(MemoryStore::new());
        let service = service_with(demo.clone(), store.clone());
        (demo, store, service)
    }

    fn get(url: &str, service: &MarketService) -> Reply {
        route(&Method::Get, url, service)
    }

    #[test]
    fn health_answers_ok() {
        let (_, _, service) = demo_service();
        let reply = get("/health", &service);
        assert_eq!(reply.status, 200);
        let body: HealthResponse = serde_json::from_str(&reply.body).unwrap();
        assert!(body.success);
    }

    #[test]
    fn prices_with_source_are_cached_on_second_read() {
        let (demo, _, service) = demo_service();
        let url = "/api/market/prices?source=demo&commodities=Wheat,Rice";

        let first: PricesResponse = serde_json::from_str(&get(url, &service).body).unwrap();
        let second: PricesResponse = serde_json::from_str(&get(url, &service).body).unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.source, Some(Provider::Demo));
        let names: Vec<&str> = first.data.iter().map(|q| q.commodity.as_str()).collect();
        assert_eq!(names, ["Wheat", "Rice"]);
        assert_eq!(demo.calls(), 1);
    }

    #[test]
    fn prices_without_source_read_storage() {
        let (demo, store, service) = demo_service();
        store.upsert(&quote("Maize", "Nairobi", 3500.0)).unwrap();

        let reply = get("/api/market/prices", &service);
        let body: PricesResponse = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body.source, None);
        assert_eq!(body.data.len(), 1);
        assert_eq!(demo.calls(), 0);
    }

    #[test]
    fn unknown_source_is_bad_request() {
        let (_, _, service) = demo_service();
        let reply = get("/api/market/prices?source=bloomberg", &service);
        assert_eq!(reply.status, 400);
        let body: ErrorResponse = serde_json::from_str(&reply.body).unwrap();
        assert!(!body.success);
        assert!(body.message.contains("bloomberg"));
    }

    #[test]
    fn provider_failure_is_a_generic_500() {
        let failing = Arc::new(CountingSource::failing(Provider::ApiNinjas));
        let service = service_with(failing, Arc::new(MemoryStore::new()));
        let reply = get("/api/market/prices?source=api-ninjas", &service);
        assert_eq!(reply.status, 500);
        let body: ErrorResponse = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body.error, FETCH_FAILED);
    }

    #[test]
    fn history_route_extracts_commodity_and_window() {
        let (_, store, service) = demo_service();
        store.upsert(&quote("Wheat", "Nairobi", 4200.0)).unwrap();

        let reply = get("/api/market/prices/wheat/history?days=7", &service);
        assert_eq!(reply.status, 200);
        let body: HistoryResponse = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body.commodity, "wheat");
        assert_eq!(body.period_days, 7);
        assert_eq!(body.data.len(), 1);

        assert_eq!(get("/api/market/prices/wheat/history?days=0", &service).status, 400);
        assert_eq!(get("/api/market/prices/wheat/history?days=week", &service).status, 400);
    }

    #[test]
    fn history_segment_is_percent_decoded() {
        let (_, store, service) = demo_service();
        store.upsert(&quote("Live Cattle", "Nairobi", 350.0)).unwrap();

        let reply = get("/api/market/prices/Live%20Cattle/history", &service);
        assert_eq!(reply.status, 200);
        let body: HistoryResponse = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body.commodity, "Live Cattle");
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0].commodity, "Live Cattle");

        assert_eq!(get("/api/market/prices/%20/history", &service).status, 404);
    }

    #[test]
    fn trends_accept_all_and_reject_unknown_category() {
        let (_, _, service) = demo_service();
        let reply = get("/api/market/trends?category=all", &service);
        assert_eq!(reply.status, 200);
        let body: TrendsResponse = serde_json::from_str(&reply.body).unwrap();
        let empty: TrendReport = body.data;
        assert_eq!(empty.category, None);

        let grains: TrendsResponse =
            serde_json::from_str(&get("/api/market/trends?category=Grains", &service).body).unwrap();
        assert_eq!(grains.data.category, Some(Category::Grains));

        assert_eq!(get("/api/market/trends?category=metals", &service).status, 400);
    }

    #[test]
    fn alerts_report_count() {
        let (_, store, service) = demo_service();
        store.upsert(&quote("Coffee", "Nairobi", 450.0 * 1.1)).unwrap();
        let body: AlertsResponse =
            serde_json::from_str(&get("/api/market/alerts", &service).body).unwrap();
        assert_eq!(body.count, 1);
        assert_eq!(body.data[0].commodity, "Coffee");
    }

    #[test]
    fn unknown_route_and_method() {
        let (_, _, service) = demo_service();
        assert_eq!(get("/api/market/weather", &service).status, 404);
        assert_eq!(get("/api/market/prices//history", &service).status, 404);
        assert_eq!(route(&Method::Post, "/api/market/prices", &service).status, 405);
    }

    #[test]
    fn serves_requests_over_a_socket() {
        let (_, _, service) = demo_service();
        let mut server = HttpServer::start("127.0.0.1:0", 2, Arc::new(service)).unwrap();
        let addr = server.local_addr().unwrap();

        let response = reqwest::blocking::get(format!("http://{}{}", addr, HEALTH_PATH)).unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert_eq!(content_type, "application/json");
        let body: HealthResponse = response.json().unwrap();
        assert!(body.success);

        server.stop();
        server.stop();
    }
}

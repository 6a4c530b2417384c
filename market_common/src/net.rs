//! Shared networking constants and helpers used by client and server.

/// Default HTTP port of the market server.
pub const HTTP_PORT: u16 = 5000;

/// Route prefix of the market read surface.
pub const PRICES_PATH: &str = "/api/market/prices";
/// Trend analysis route.
pub const TRENDS_PATH: &str = "/api/market/trends";
/// Alerts route.
pub const ALERTS_PATH: &str = "/api/market/alerts";
/// Liveness route.
pub const HEALTH_PATH: &str = "/health";

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

/// Path of the history route for `commodity`.
pub fn history_path(commodity: &str) -> String {
    format!("{}/{}/history", PRICES_PATH, commodity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_paths() {
        assert_eq!(addr("127.0.0.1", HTTP_PORT), "127.0.0.1:5000");
        assert_eq!(history_path("wheat"), "/api/market/prices/wheat/history");
    }
}

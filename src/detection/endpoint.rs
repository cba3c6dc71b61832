//! Endpoint resolution for the detection service.

use reqwest::Url;

/// Path of the detection route relative to the serving origin.
pub const DETECT_PATH: &str = "/detect";

/// Address of a locally running detection service.
pub const LOCAL_DEV_ENDPOINT: &str = "http://127.0.0.1:5000/detect";

/// Environment variable that overrides the endpoint entirely.
pub const ENDPOINT_ENV: &str = "GUIDE_CAM_ENDPOINT";

/// Resolve the detection endpoint for an origin such as `https://example.com`.
///
/// Loopback origins (`localhost`, `127.0.0.1`) point at the local development
/// service instead of the origin itself.
pub fn resolve_endpoint(origin: &str) -> String {
    if let Ok(url) = Url::parse(origin) {
        if matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) {
            return LOCAL_DEV_ENDPOINT.to_string();
        }
    }
    format!("{}{}", origin.trim_end_matches('/'), DETECT_PATH)
}

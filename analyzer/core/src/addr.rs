//! The heuristic deciding whether a configured value may be a network address.

use once_cell::sync::Lazy;
use url::{ParseError, Url};

/// The only scheme stripped before comparing an address against a service endpoint.
const HTTP_PREFIX: &str = "http://";

/// Relative references resolve against a placeholder base; only the parse result matters.
static BASE: Lazy<Option<Url>> = Lazy::new(|| Url::parse("http://address.invalid/").ok());

/// Returns true if `value` may be a network address.
///
/// Any non-empty string that parses as a URI reference is accepted, with or without a scheme
/// (`cart:7070`, `http://cart:7070/api`, `cart`), except plain integers: numeric configuration
/// values (timeouts, replica counts, ports on their own) are far more common than addresses.
///
/// A reference without a valid scheme may not have a colon in its first path segment, so
/// `10.0.0.1:9000` and `:8080` are rejected.
pub fn is_network_address(value: &str) -> bool {
    if value.trim().is_empty() || value.parse::<i64>().is_ok() {
        return false;
    }

    match Url::parse(value) {
        Ok(_) => true,
        Err(ParseError::RelativeUrlWithoutBase) => {
            let path = value.split(['?', '#']).next().unwrap_or_default();
            let first_segment = path.split('/').next().unwrap_or_default();
            !first_segment.contains(':')
                && BASE.as_ref().map_or(false, |base| base.join(value).is_ok())
        }
        Err(_) => false,
    }
}

/// Strips a literal `http://` prefix, if present. No other scheme is normalized.
#[inline]
pub fn strip_http(addr: &str) -> &str {
    addr.strip_prefix(HTTP_PREFIX).unwrap_or(addr)
}

/// Formats the canonical `name:port` endpoint of a service port.
#[inline]
pub fn endpoint(service: &str, port: i32) -> String {
    format!("{}:{}", service, port)
}

//! Client IP extraction.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderName,
};

/// Extract the client IP address of `request`.
///
/// With `header` set, the address comes from that header only (first entry of a
/// comma separated list) and a missing or unparsable value is an error. Without
/// it, the peer address from `ConnectInfo` is used.
pub fn extract_client_ip(
    request: &Request,
    header: Option<&HeaderName>,
) -> Result<IpAddr, &'static str> {
    match header {
        Some(name) => {
            let value = request
                .headers()
                .get(name)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            value
                .split(',')
                .next()
                .map(str::trim)
                .and_then(|ip| ip.parse().ok())
                .ok_or("IP header does not contain an address")
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip())
            .ok_or("No client IP available"),
    }
}

/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Absolute URLs as the browser sees them, behind a reverse proxy or not.

use axum::http::{header, HeaderMap};

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";
const FORWARDED_PORT: &str = "x-forwarded-port";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        // Proxies chain values: "https, http". The first hop is the client's.
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Drop a `:port` suffix, leaving IPv6 literals (`[::1]`) intact.
fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(idx) if !host[idx..].contains(']') => &host[..idx],
        _ => host,
    }
}

/// Build `{proto}://{host}:{port}{path}` from `X-Forwarded-*` headers,
/// falling back to `http`, the `Host` header and `default_port`.
pub fn external_url(headers: &HeaderMap, default_port: u16, path: &str) -> String {
    let proto = header_str(headers, FORWARDED_PROTO).unwrap_or("http");
    let host = header_str(headers, FORWARDED_HOST)
        .or_else(|| header_str(headers, header::HOST.as_str()))
        .map(strip_port)
        .unwrap_or("localhost");
    let port = header_str(headers, FORWARDED_PORT)
        .map(str::to_string)
        .unwrap_or_else(|| default_port.to_string());

    format!("{proto}://{host}:{port}{path}")
}

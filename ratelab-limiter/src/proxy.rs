//! The proxy data path: decide, then forward.
//!
//! Every request that does not hit the config/health/metrics surface lands
//! here. The admission decision runs first; a denied request is answered
//! with `429` and never touches the upstream. Allowed requests are
//! forwarded with hop-by-hop headers stripped and `X-Forwarded-For` set
//! from the peer address. Upstream failures surface as `502`.

#[cfg(test)]
mod proxy_tests;

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, histogram};
use tokio::time::Instant;

use ratelab_types::Algorithm;

use crate::state::AppState;

const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

pub async fn proxy_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let config = state.inner.config.current();
    let started = Instant::now();

    let allowed = state.inner.limiter.allow(&config).await;
    if !allowed {
        record_decision(&state, config.algorithm, false, 429);
        finish_timing(&state, started);
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }

    match forward(&state, peer.map(|ConnectInfo(addr)| addr), request).await {
        Ok(response) => {
            record_decision(&state, config.algorithm, true, response.status().as_u16());
            finish_timing(&state, started);
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "Proxy request failed");
            record_decision(&state, config.algorithm, true, 502);
            finish_timing(&state, started);
            (StatusCode::BAD_GATEWAY, "Upstream error").into_response()
        }
    }
}

fn record_decision(state: &AppState, algorithm: Algorithm, allowed: bool, status: u16) {
    let decision = if allowed { "forwarded" } else { "rejected" };
    counter!("ratelimiter_requests_total", "decision" => decision).increment(1);
    counter!("ratelimiter_requests_by_algorithm_total", "algorithm" => algorithm.as_str())
        .increment(1);
    state.inner.traffic.record_decision(allowed, status);
}

fn finish_timing(state: &AppState, started: Instant) {
    let seconds = started.elapsed().as_secs_f64();
    histogram!("ratelimiter_request_duration_seconds").record(seconds);
    state.inner.latency.record(seconds);
}

async fn forward(
    state: &AppState,
    peer: Option<SocketAddr>,
    request: Request,
) -> Result<Response, Box<dyn std::error::Error + Send + Sync>> {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;

    let target = build_target_url(&state.inner.target_url, &parts.uri);
    let mut outbound = state
        .inner
        .http_client
        .request(parts.method, target)
        .headers(filter_headers(&parts.headers));
    if let Some(peer) = peer {
        outbound = outbound.header("x-forwarded-for", peer.ip().to_string());
    }
    if !body_bytes.is_empty() {
        outbound = outbound.body(body_bytes);
    }

    let upstream = outbound.send().await?;
    let status = upstream.status();
    let headers = filter_headers(upstream.headers());
    let bytes = upstream.bytes().await?;

    let mut response = Response::builder().status(status);
    if let Some(response_headers) = response.headers_mut() {
        *response_headers = headers;
    }
    Ok(response.body(Body::from(bytes))?)
}

fn build_target_url(base: &str, uri: &axum::http::Uri) -> String {
    let base = base.trim_end_matches('/');
    let path = uri.path();
    let mut target = format!("{base}{path}");
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_bytes()),
        ) {
            filtered.append(name, value);
        }
    }
    filtered
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

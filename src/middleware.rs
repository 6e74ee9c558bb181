use crate::{config::AnalyticsConfig, logger::RequestLogger, record::RequestRecord};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Framework name reported to the collection server
pub const FRAMEWORK: &str = "Axum";

/// Privacy level from which client IP addresses are no longer collected
pub const HIDE_IP_PRIVACY_LEVEL: i32 = 2;

/// State for [`analytics_middleware`]
#[derive(Clone)]
pub struct AnalyticsState {
    pub logger: Arc<RequestLogger>,
    pub api_key: Option<Arc<str>>,
    pub privacy_level: i32,
}

impl AnalyticsState {
    pub fn new(logger: Arc<RequestLogger>, config: &AnalyticsConfig) -> Self {
        Self {
            logger,
            api_key: config.api_key.as_deref().map(Arc::from),
            privacy_level: config.privacy_level,
        }
    }
}

/// Analytics middleware
/// Logs one record per completed request; the response is passed through
/// untouched.
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(state, analytics_middleware));
/// ```
pub async fn analytics_middleware(
    State(state): State<AnalyticsState>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let mut record = RequestRecord::new()
        .with("hostname", hostname(&req))
        .with("path", req.uri().path())
        .with("user_agent", header_str(req.headers(), header::USER_AGENT))
        .with("method", req.method().as_str());

    if state.privacy_level < HIDE_IP_PRIVACY_LEVEL {
        if let Some(ip) = client_ip(&req) {
            record.insert("ip_address", ip);
        }
    }

    let response = next.run(req).await;

    record.insert("status", response.status().as_u16());
    record.insert("response_time", start.elapsed().as_millis() as u64);
    record.insert("created_at", chrono::Utc::now().to_rfc3339());

    state
        .logger
        .log_request(state.api_key.as_deref(), record, FRAMEWORK, state.privacy_level);

    response
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `Host` header, else the URI authority (HTTP/2 carries it there)
fn hostname(req: &Request) -> String {
    let host = header_str(req.headers(), header::HOST);
    if !host.is_empty() {
        return host;
    }
    req.uri().host().unwrap_or_default().to_string()
}

/// First `X-Forwarded-For` hop, else the peer address when the server was
/// started with `into_make_service_with_connect_info`
fn client_ip(req: &Request) -> Option<String> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

use crate::{config::Config, services::DecodeQueue};
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use http::{
    HeaderValue, Method, StatusCode, Uri, Version,
    header::{HOST, LOCATION},
};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use log::{error, info};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Pooled keep-alive client used for every forwarded request.
pub type HttpClient = Client<HttpConnector, Body>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("error reading body: {0}")]
    ReadBody(axum::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
    #[error("invalid upstream request: {0}")]
    InvalidUri(#[from] http::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let message = match self {
            ProxyError::ReadBody(_) => "Error reading body",
            _ => "Error handling request",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct InterceptorSettings {
    pub hostname: String,
    pub upstream_host: String,
    pub upstream_addr: String,
    pub redirect_port: u16,
    pub max_body_bytes: usize,
    pub upstream_timeout: Duration,
}

impl From<&Config> for InterceptorSettings {
    fn from(config: &Config) -> Self {
        Self {
            hostname: config.vendor.hostname.clone(),
            upstream_host: config.vendor.upstream_host.clone(),
            upstream_addr: config.vendor.upstream_addr.clone(),
            redirect_port: config.server.redirect_port,
            max_body_bytes: config.server.max_body_bytes,
            upstream_timeout: config.timeouts.upstream(),
        }
    }
}

pub fn http_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_keepalive(Some(Duration::from_secs(60)));
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .build(connector)
}

/// Forwards the bridge's plaintext uploads to the vendor while tapping the
/// POST bodies for telemetry.
pub struct Interceptor {
    client: HttpClient,
    settings: InterceptorSettings,
    upstream_host: HeaderValue,
    queue: DecodeQueue,
}

impl Interceptor {
    pub fn new(
        settings: InterceptorSettings,
        client: HttpClient,
        queue: DecodeQueue,
    ) -> Result<Self, ProxyError> {
        let upstream_host =
            HeaderValue::from_str(&settings.upstream_host).map_err(http::Error::from)?;

        Ok(Self {
            client,
            settings,
            upstream_host,
            queue,
        })
    }

    async fn forward(&self, req: Request) -> Result<Response, ProxyError> {
        let (mut parts, body) = req.into_parts();

        let body = if parts.method == Method::POST {
            let bytes = axum::body::to_bytes(body, self.settings.max_body_bytes)
                .await
                .map_err(ProxyError::ReadBody)?;
            self.queue.submit(bytes.clone());
            Body::from(bytes)
        } else {
            body
        };

        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        parts.uri = Uri::builder()
            .scheme("http")
            .authority(self.settings.upstream_addr.as_str())
            .path_and_query(path)
            .build()?;
        parts.headers.insert(HOST, self.upstream_host.clone());
        parts.version = Version::HTTP_11;

        let timeout = self.settings.upstream_timeout;
        let response = tokio::time::timeout(
            timeout,
            self.client.request(Request::from_parts(parts, body)),
        )
        .await
        .map_err(|_| ProxyError::Timeout(timeout))??;

        Ok(response.map(Body::new))
    }

    fn redirect(&self, host: &str, uri: &Uri) -> Response {
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let location = format!(
            "http://{}:{}{}",
            strip_port(host),
            self.settings.redirect_port,
            path
        );

        match HeaderValue::from_str(&location) {
            Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
            Err(_) => StatusCode::BAD_REQUEST.into_response(),
        }
    }
}

pub fn router(interceptor: Arc<Interceptor>) -> Router {
    Router::new().fallback(intercept).with_state(interceptor)
}

async fn intercept(State(proxy): State<Arc<Interceptor>>, req: Request) -> Response {
    info!("Received: {} {}", req.method(), req.uri());

    // No host at all is just another non-vendor host: `http://:<port>/...`
    let host = request_host(&req).unwrap_or_default();

    if host != proxy.settings.hostname {
        // Try redirect to server running on another port
        return proxy.redirect(&host, req.uri());
    }

    match proxy.forward(req).await {
        Ok(response) => response,
        Err(e) => {
            error!("Error proxying request for {}: {}", host, e);
            e.into_response()
        }
    }
}

/// Authority of an absolute-form request line, else the `Host` header.
fn request_host(req: &Request) -> Option<String> {
    req.uri()
        .authority()
        .map(|authority| authority.as_str().to_string())
        .or_else(|| {
            req.headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .filter(|host| !host.is_empty())
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

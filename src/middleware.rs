/* src/middleware.rs */

use axum::{
    extract::{ConnectInfo, OptionalFromRequestParts, Request},
    http::{HeaderMap, request::Parts},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use std::{
    convert::Infallible,
    fmt,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;

use crate::detector::ClientIpDetector;
use crate::error::ClientIpError;
use crate::request::RequestMeta;
use crate::trust::TrustPredicate;

/// Called with the detection result before the request reaches the inner service.
pub type Callback = Arc<dyn Fn(Request, Option<IpAddr>) -> Request + Send + Sync>;

/// Produces the response for requests whose client IP could not be determined.
pub type Reject = Arc<dyn Fn(Request) -> Response + Send + Sync>;

/// Extension that holds the detected client IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    /// Get the IP address.
    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

/// Layer detecting the client IP of every request.
///
/// A detected address is stored as a [`ClientIp`] request extension. Configure
/// detectors, a callback and a rejection handler with the builder methods;
/// detectors follow [`ClientIpDetector`] ordering, so the last one added is
/// consulted first.
///
/// The connection peer address comes from axum's `ConnectInfo<SocketAddr>`, so
/// serve the app with `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use clientip::{ClientIp, ClientIpLayer};
/// use clientip::trust::trust_ips;
///
/// async fn handler(ClientIp(ip): ClientIp) -> String {
///     ip.to_string()
/// }
///
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(
///         ClientIpLayer::new()
///             .with_xff_detector(trust_ips(["10.0.0.1".parse().unwrap()]))
///             .reject_undetermined(),
///     );
/// ```
#[derive(Clone, Default)]
pub struct ClientIpLayer {
    detector: ClientIpDetector,
    callback: Option<Callback>,
    reject: Option<Reject>,
}

impl fmt::Debug for ClientIpLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIpLayer")
            .field("detector", &self.detector)
            .field("callback", &self.callback.is_some())
            .field("reject", &self.reject.is_some())
            .finish()
    }
}

impl ClientIpLayer {
    /// Create a layer that only looks at the connection peer address.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer from a prepared detector chain.
    pub fn with_chain(detector: ClientIpDetector) -> Self {
        Self {
            detector,
            ..Self::default()
        }
    }

    /// Add a custom detector.
    pub fn with_detector<F>(mut self, detector: F) -> Self
    where
        F: Fn(&RequestMeta) -> Option<IpAddr> + Send + Sync + 'static,
    {
        self.detector = self.detector.with_detector(detector);
        self
    }

    /// Add a trusted-header detector, see [`ClientIpDetector::with_trusted_header`].
    pub fn with_trusted_header_detector(mut self, name: impl Into<String>) -> Self {
        self.detector = self.detector.with_trusted_header(name);
        self
    }

    /// Add an `X-Forwarded-For` detector, see [`ClientIpDetector::with_xff`].
    pub fn with_xff_detector(mut self, trusted: TrustPredicate) -> Self {
        self.detector = self.detector.with_xff(trusted);
        self
    }

    /// Set the callback run with the detection result. The request it returns
    /// is passed on to the inner service.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Request, Option<IpAddr>) -> Request + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Answer requests without a detected client IP with `reject` instead of
    /// calling the inner service.
    pub fn with_reject<F>(mut self, reject: F) -> Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.reject = Some(Arc::new(reject));
        self
    }

    /// Reject undetermined requests with `400 Bad Request`.
    pub fn reject_undetermined(self) -> Self {
        self.with_reject(|_| ClientIpError::Undetermined.into_response())
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            detector: Arc::new(self.detector.clone()),
            callback: self.callback.clone(),
            reject: self.reject.clone(),
        }
    }
}

/// Service that detects client IP addresses.
#[derive(Clone)]
pub struct ClientIpService<S> {
    inner: S,
    detector: Arc<ClientIpDetector>,
    callback: Option<Callback>,
    reject: Option<Reject>,
}

impl<S: fmt::Debug> fmt::Debug for ClientIpService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIpService")
            .field("inner", &self.inner)
            .field("detector", &self.detector)
            .finish()
    }
}

impl<S> Service<Request> for ClientIpService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let meta = request_meta(&req);
        let client_ip = self.detector.detect(&meta);

        match (client_ip, &self.reject) {
            (None, Some(reject)) => {
                debug!(remote_addr = ?meta.remote_addr(), "Rejecting request with undetermined client IP");
                let response = reject(req);
                return Box::pin(async move { Ok(response) });
            }
            (Some(ip), _) => {
                req.extensions_mut().insert(ClientIp(ip));
            }
            (None, None) => {}
        }

        if let Some(callback) = &self.callback {
            req = callback(req, client_ip);
        }

        let future = self.inner.call(req);
        Box::pin(future)
    }
}

/// Build the detector view of an axum request.
fn request_meta(req: &Request) -> RequestMeta {
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.to_string());

    let mut meta = headers_to_meta(req.headers());
    if let Some(addr) = remote_addr {
        meta = meta.with_remote_addr(addr);
    }
    meta
}

/// Copy every header value, repeated ones included. Values that are not UTF-8
/// are kept lossily so they still occupy their position in a forwarding chain.
fn headers_to_meta(headers: &HeaderMap) -> RequestMeta {
    let mut meta = RequestMeta::new();

    for (name, value) in headers.iter() {
        meta.append_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }

    meta
}

/// Axum extractor for the detected client IP.
///
/// Fails with [`ClientIpError::Undetermined`] when [`ClientIpLayer`] did not
/// detect an address; use `Option<ClientIp>` to handle that case yourself.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{response::Json, routing::get, Router};
/// use clientip::{ClientIp, ClientIpLayer};
/// use serde_json::json;
///
/// async fn handler(client_ip: Option<ClientIp>) -> Json<serde_json::Value> {
///     match client_ip {
///         Some(ip) => Json(json!({"ip": ip.ip().to_string()})),
///         None => Json(json!({"error": "Could not determine client IP"})),
///     }
/// }
///
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(ClientIpLayer::default());
/// ```
impl<S> axum::extract::FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = ClientIpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ClientIp>()
            .copied()
            .ok_or(ClientIpError::Undetermined)
    }
}

impl<S> OptionalFromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<ClientIp>().copied())
    }
}

//! API Middleware
//!
//! Bearer-token authentication for axum. [`AuthLayer`] puts the shared
//! [`AppState`] into request extensions; the extractors read it from there.
//! [`envelope_routing_misses`] renders router-level 404/405 responses in the
//! standard error envelope.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{
        header::{ALLOW, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
        request::Parts,
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use crate::auth::auth_service::{extract_bearer_token, AuthService};
use crate::shared::authorization_service::{AuthContext, AuthorizationService};
use crate::shared::error::PlatformError;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub authz_service: Arc<AuthorizationService>,
    pub trusted_proxies: TrustedProxies,
}

/// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
///
/// Empty by default, in which case the socket peer address is the client IP.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<Vec<IpAddr>>);

impl TrustedProxies {
    pub fn parse<S: AsRef<str>>(addrs: &[S]) -> Result<Self, PlatformError> {
        let parsed = addrs
            .iter()
            .map(|a| {
                let a = a.as_ref().trim();
                a.parse::<IpAddr>()
                    .map_err(|_| PlatformError::validation(format!("invalid trusted proxy address: {}", a)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(Arc::new(parsed)))
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }

    /// Client address for a request that arrived from `peer`.
    ///
    /// Forwarding headers are only read when `peer` is a trusted proxy. The
    /// forwarded chain is walked right to left and the first hop that is not
    /// itself a trusted proxy wins.
    pub fn client_ip(&self, peer: Option<IpAddr>, forwarded_for: Option<&str>, real_ip: Option<&str>) -> Option<IpAddr> {
        let peer = peer?;
        if !self.contains(&peer) {
            return Some(peer);
        }

        if let Some(chain) = forwarded_for {
            for hop in chain.rsplit(',').map(str::trim) {
                match hop.parse::<IpAddr>() {
                    Ok(ip) if self.contains(&ip) => continue,
                    Ok(ip) => return Some(ip),
                    Err(_) => break,
                }
            }
        }

        real_ip
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
            .or(Some(peer))
    }
}

/// Authenticated user extractor
pub struct Authenticated(pub AuthContext);

impl std::ops::Deref for Authenticated {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
}

fn app_state(parts: &Parts) -> Result<&AppState, PlatformError> {
    parts
        .extensions
        .get::<AppState>()
        .ok_or_else(|| PlatformError::internal("auth service not configured"))
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?.clone();
        let token = bearer_token(parts)
            .ok_or_else(|| PlatformError::unauthorized("missing bearer token"))?
            .to_string();

        let claims = state.auth_service.validate_access(&token).await?;
        Ok(Authenticated(AuthContext::from_claims(token, claims)))
    }
}

/// Optional authentication extractor; invalid tokens count as anonymous.
pub struct OptionalAuth(pub Option<AuthContext>);

impl std::ops::Deref for OptionalAuth {
    type Target = Option<AuthContext>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Ok(state) = app_state(parts).cloned() else {
            return Ok(OptionalAuth(None));
        };
        let Some(token) = bearer_token(parts).map(str::to_string) else {
            return Ok(OptionalAuth(None));
        };
        let Ok(claims) = state.auth_service.validate_access(&token).await else {
            return Ok(OptionalAuth(None));
        };
        Ok(OptionalAuth(Some(AuthContext::from_claims(token, claims))))
    }
}

/// Caller address and user agent, recorded on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let proxies = parts
            .extensions
            .get::<AppState>()
            .map(|state| state.trusted_proxies.clone())
            .unwrap_or_default();

        let ip = proxies
            .client_ip(peer, header("x-forwarded-for"), header("x-real-ip"))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Ok(ClientInfo { ip, user_agent })
    }
}

/// Re-renders the router's bare 404 and 405 responses as [`PlatformError`]
/// envelopes. Handler responses already carry a content type and pass through.
pub async fn envelope_routing_misses(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if response.headers().contains_key(CONTENT_TYPE) {
        return response;
    }

    match response.status() {
        StatusCode::METHOD_NOT_ALLOWED => {
            let allow = response.headers().get(ALLOW).cloned();
            let mut rendered = PlatformError::method_not_allowed(method.as_str(), path).into_response();
            if let Some(allow) = allow {
                rendered.headers_mut().insert(ALLOW, allow);
            }
            rendered
        }
        StatusCode::NOT_FOUND => PlatformError::not_found("Route", path).into_response(),
        _ => response,
    }
}

/// Middleware layer that injects AppState into request extensions
#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    state: AppState,
}

impl<S, B> Service<axum::http::Request<B>> for AuthMiddleware<S>
where
    S: Service<axum::http::Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        req.extensions_mut().insert(self.state.clone());
        let future = self.inner.call(req);
        Box::pin(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn client_info(request: Request<()>) -> ClientInfo {
        let (mut parts, _) = request.into_parts();
        ClientInfo::from_request_parts(&mut parts, &()).await.unwrap()
    }

    fn from_peer(peer: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder();
        if let Some(extensions) = builder.extensions_mut() {
            extensions.insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        }
        builder
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_client_ip_ignores_forwarding_headers_from_untrusted_peer() {
        let request = from_peer("198.51.100.20:40000")
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "203.0.113.8")
            .header(USER_AGENT, "curl/8")
            .body(())
            .unwrap();
        let info = client_info(request).await;
        assert_eq!(info.ip, "198.51.100.20");
        assert_eq!(info.user_agent, "curl/8");
    }

    #[tokio::test]
    async fn test_client_ip_falls_back_to_peer_address() {
        let request = from_peer("192.0.2.4:5555").body(()).unwrap();
        let info = client_info(request).await;
        assert_eq!(info.ip, "192.0.2.4");
        assert_eq!(info.user_agent, "unknown");
    }

    #[tokio::test]
    async fn test_client_ip_without_peer_is_unknown() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        assert_eq!(client_info(request).await.ip, "unknown");
    }

    #[test]
    fn test_trusted_proxy_chain_takes_first_untrusted_hop_from_the_right() {
        let proxies = TrustedProxies::parse(&["10.0.0.1", "10.0.0.2"]).unwrap();

        // A client-supplied left-most entry cannot override the real hop
        let resolved = proxies.client_ip(Some(ip("10.0.0.1")), Some("1.2.3.4, 203.0.113.7, 10.0.0.2"), None);
        assert_eq!(resolved, Some(ip("203.0.113.7")));

        let resolved = proxies.client_ip(Some(ip("10.0.0.1")), None, Some("203.0.113.9"));
        assert_eq!(resolved, Some(ip("203.0.113.9")));

        let resolved = proxies.client_ip(Some(ip("10.0.0.1")), Some("not-an-ip"), None);
        assert_eq!(resolved, Some(ip("10.0.0.1")));
    }

    #[test]
    fn test_untrusted_peer_wins_over_headers() {
        let proxies = TrustedProxies::parse(&["10.0.0.1"]).unwrap();
        let resolved = proxies.client_ip(Some(ip("198.51.100.20")), Some("203.0.113.7"), Some("203.0.113.8"));
        assert_eq!(resolved, Some(ip("198.51.100.20")));
    }

    #[test]
    fn test_trusted_proxies_rejects_garbage() {
        assert!(TrustedProxies::parse(&["10.0.0.1", "proxy.internal"]).is_err());
        assert!(TrustedProxies::parse::<&str>(&[]).unwrap().client_ip(None, None, None).is_none());
    }

    #[tokio::test]
    async fn test_missing_state_rejects_authenticated() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        assert!(Authenticated::from_request_parts(&mut parts, &()).await.is_err());
        assert!(OptionalAuth::from_request_parts(&mut parts, &()).await.unwrap().is_none());
    }
}

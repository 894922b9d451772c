//! Web server module.

mod access;
mod error;
mod handlers;

pub use error::*;

use crate::auth::{Authenticator, RateLimiter};
use crate::monitor::Monitor;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub auth: Arc<Authenticator>,
    pub limiter: Arc<RateLimiter>,
}

/// Web server for Pingkeeper.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        routes(self.state.clone())
    }

    /// Serve until `shutdown` resolves.
    pub async fn start<F>(
        &self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        Ok(())
    }
}

pub fn routes(state: AppState) -> Router {
    // Probe endpoints: authenticated, then rate limited
    let limited = Router::new()
        .route("/check-scheduled-ping", get(handlers::handle_check_scheduled))
        .route("/ping/{index}", get(handlers::handle_ping_one))
        .route("/ping-all", get(handlers::handle_ping_all))
        .route_layer(middleware::from_fn_with_state(state.clone(), access::rate_limit));

    let protected = Router::new()
        .merge(limited)
        .route("/api/ping-history", get(handlers::handle_history))
        .route("/api/stats", get(handlers::handle_stats))
        .route("/logout", post(handlers::handle_logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), access::require_auth));

    Router::new()
        .merge(protected)
        .route("/login", post(handlers::handle_login))
        .route("/healthz", get(handlers::handle_healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::history::{HistoryLimits, HistoryStore};
    use crate::probe::testing::ScriptedTransport;
    use crate::probe::{Prober, RetryPolicy};
    use crate::scheduler::NextCycle;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::time::Instant;
    use tower::ServiceExt;

    const TARGETS: [&str; 2] = ["http://203.0.113.1/", "http://203.0.113.2/"];

    struct Harness {
        router: Router,
        next: Arc<NextCycle>,
        transport: Arc<ScriptedTransport>,
    }

    fn harness(rate_limit_max: usize) -> Harness {
        let targets: Vec<String> = TARGETS.iter().map(|t| t.to_string()).collect();
        let store = Arc::new(HistoryStore::new(&targets, HistoryLimits::default()));
        let transport = Arc::new(ScriptedTransport::always(200));
        let prober = Arc::new(Prober::new(transport.clone(), store, RetryPolicy::default()));
        let next = Arc::new(NextCycle::new());
        next.publish(Instant::now() + Duration::from_secs(300));

        let auth = Authenticator::new(
            b"web-test-secret",
            Duration::from_secs(300),
            Some(Credentials {
                username: "admin".to_string(),
                passphrase: "hunter2".to_string(),
            }),
        )
        .unwrap();

        let state = AppState {
            monitor: Arc::new(Monitor::new(prober, next.clone(), Duration::from_secs(60))),
            auth: Arc::new(auth),
            limiter: Arc::new(RateLimiter::new(Duration::from_secs(60), rate_limit_max)),
        };

        Harness {
            router: routes(state),
            next,
            transport,
        }
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
    }

    fn get_as(uri: &str, auth: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> Response {
        router.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let h = harness(60);
        for uri in [
            "/api/ping-history",
            "/api/stats",
            "/ping/0",
            "/ping-all",
            "/check-scheduled-ping",
        ] {
            let resp = send(&h.router, Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(
                resp.headers()[header::WWW_AUTHENTICATE],
                "Basic realm=\"Login Required\""
            );
        }

        let resp = send(&h.router, get_as("/api/ping-history", &basic("admin", "nope"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_login_cookie_grants_access() {
        let h = harness(60);

        let login = Request::post("/login")
            .header(header::AUTHORIZATION, basic("admin", "hunter2"))
            .body(Body::empty())
            .unwrap();
        let resp = send(&h.router, login).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Secure"));
        assert!(set_cookie.contains("SameSite=Strict"));
        assert!(set_cookie.contains("Max-Age=300"));

        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let req = Request::get("/api/ping-history")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let resp = send(&h.router, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        let urls: Vec<&str> = body.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(urls, TARGETS.to_vec());
    }

    #[tokio::test]
    async fn test_forged_cookie_rejected() {
        let h = harness(60);
        let req = Request::get("/api/ping-history")
            .header(header::COOKIE, "session=anything.1.deadbeef")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&h.router, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_failed_login() {
        let h = harness(60);
        let req = Request::post("/login")
            .header(header::AUTHORIZATION, basic("admin", "wrong"))
            .body(Body::empty())
            .unwrap();
        let resp = send(&h.router, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let h = harness(60);

        let anonymous = Request::post("/logout").body(Body::empty()).unwrap();
        assert_eq!(send(&h.router, anonymous).await.status(), StatusCode::UNAUTHORIZED);

        let req = Request::post("/logout")
            .header(header::AUTHORIZATION, basic("admin", "hunter2"))
            .body(Body::empty())
            .unwrap();
        let resp = send(&h.router, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_ping_one() {
        let h = harness(60);
        let auth = basic("admin", "hunter2");

        let resp = send(&h.router, get_as("/ping/1", &auth)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["url"], TARGETS[1]);
        assert_eq!(body["data"]["status"], "Success");
        assert_eq!(body["data"]["status_code"], 200);

        let resp = send(&h.router, get_as("/ping/7", &auth)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&h.router, get_as("/ping/abc", &auth)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_guard_window_returns_locked() {
        let h = harness(60);
        h.next.publish(Instant::now() + Duration::from_secs(30));
        let auth = basic("admin", "hunter2");

        for uri in ["/ping/0", "/ping-all"] {
            let resp = send(&h.router, get_as(uri, &auth)).await;
            assert_eq!(resp.status(), StatusCode::LOCKED, "{}", uri);
            let body = json_body(resp).await;
            assert_eq!(body["status"], "wait");
            let remaining = body["remainingTime"].as_f64().unwrap();
            assert!(remaining > 0.0 && remaining <= 30.0);
        }
        assert_eq!(h.transport.call_count(), 0);

        let resp = send(&h.router, get_as("/check-scheduled-ping", &auth)).await;
        let body = json_body(resp).await;
        assert_eq!(body["imminent"], false);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let h = harness(2);
        let auth = basic("admin", "hunter2");

        for _ in 0..2 {
            let resp = send(&h.router, get_as("/check-scheduled-ping", &auth)).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = send(&h.router, get_as("/check-scheduled-ping", &auth)).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(resp).await["error"], "Rate limit exceeded");

        // History is not rate limited
        let resp = send(&h.router, get_as("/api/ping-history", &auth)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_after_manual_probe() {
        let h = harness(60);
        let auth = basic("admin", "hunter2");

        let resp = send(&h.router, get_as("/ping/0", &auth)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&h.router, get_as("/api/stats", &auth)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        let stats = body.as_array().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["url"], TARGETS[0]);
        assert_eq!(stats[0]["total"], 1);
        assert_eq!(stats[0]["uptime"], 100.0);
        assert!(stats[0]["incidents"].as_array().unwrap().is_empty());
        assert_eq!(stats[1]["total"], 0);
        assert!(stats[1]["latencies"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_healthz_is_public() {
        let h = harness(60);
        let resp = send(&h.router, Request::get("/healthz").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

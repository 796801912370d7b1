//! HTTP control surface
//!
//! A thin shim over [`GossipEngine`]:
//!
//! - `POST /send` with `{"amount": <number>}` starts a broadcast
//! - `GET /metrics` returns the current trust scores with a timestamp

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};

use trust_gossip_core::message::Amount;
use trust_gossip_net::traits::GossipTransport;
use trust_gossip_runtime::NodeRuntime;

use crate::audit::format_timestamp;
use crate::engine::GossipEngine;
use crate::error::{Error, Result};

/// Body returned by a successful `POST /send`
pub const SEND_OK: &str = "Message broadcasted successfully";
/// Body returned when `POST /send` has no usable amount
pub const SEND_MISSING_AMOUNT: &str = "Missing 'amount' in request";
/// Value of the `technology` field in `/metrics`
pub const TECHNOLOGY: &str = "Rust";

#[derive(Debug, Deserialize)]
struct SendRequest {
    amount: Option<serde_json::Value>,
}

/// Extract the amount from a `POST /send` body
///
/// Missing, null or non-numeric amounts and non-JSON bodies are rejected.
pub fn parse_send_request(body: &[u8]) -> Result<Amount> {
    let request: SendRequest = serde_json::from_slice(body)
        .map_err(|e| Error::InvalidRequest(format!("body is not a JSON object: {e}")))?;
    let raw = request
        .amount
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| Error::InvalidRequest("amount must be a number".into()))?;
    Amount::new(raw).map_err(|e| Error::InvalidRequest(e.to_string()))
}

/// `GET /metrics` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub trust_scores: BTreeMap<String, f64>,
    pub timestamp: String,
    pub technology: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, SEND_MISSING_AMOUNT).into_response()
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
        }
    }
}

async fn send<T: GossipTransport, R: NodeRuntime>(
    State(engine): State<Arc<GossipEngine<T, R>>>,
    body: Bytes,
) -> Result<&'static str> {
    let amount = parse_send_request(&body).map_err(|e| {
        debug!(error = %e, "rejected send request");
        e
    })?;
    engine.originate(amount).await;
    Ok(SEND_OK)
}

async fn metrics<T: GossipTransport, R: NodeRuntime>(
    State(engine): State<Arc<GossipEngine<T, R>>>,
) -> Json<MetricsResponse> {
    let snapshot = engine.trust_snapshot();
    Json(MetricsResponse {
        trust_scores: snapshot
            .scores
            .iter()
            .map(|(peer, score)| (peer.key(), *score))
            .collect(),
        timestamp: format_timestamp(snapshot.taken_at_millis),
        technology: TECHNOLOGY.to_string(),
    })
}

/// Control routes bound to `engine`
pub fn router<T: GossipTransport, R: NodeRuntime>(engine: Arc<GossipEngine<T, R>>) -> Router {
    Router::new()
        .route("/send", post(send::<T, R>))
        .route("/metrics", get(metrics::<T, R>))
        .with_state(engine)
}

/// Serve the control routes on `listener` until `shutdown` resolves
pub async fn serve<T, R, F>(
    listener: TcpListener,
    engine: Arc<GossipEngine<T, R>>,
    shutdown: F,
) -> Result<()>
where
    T: GossipTransport,
    R: NodeRuntime,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "control server listening");
    }
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use trust_gossip_core::identity::PeerIdentity;
    use trust_gossip_net::{MockNetwork, MockTransport};
    use trust_gossip_runtime::mock_runtime::MockRuntime;

    use crate::config::NodeConfig;

    fn engine() -> Arc<GossipEngine<MockTransport, MockRuntime>> {
        let config = NodeConfig::builder()
            .listen_addr("127.0.0.1:8000".parse().unwrap())
            .peers(vec![
                PeerIdentity::new("127.0.0.1", 8000),
                PeerIdentity::new("127.0.0.1", 8001),
            ])
            .build();
        // 2024-05-01 12:00:00 UTC
        let runtime = MockRuntime::new(1_714_564_800_000);
        Arc::new(GossipEngine::new(&config, MockNetwork::new().transport(), runtime).unwrap())
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    fn post_send(body: &'static str) -> Request<Body> {
        Request::post("/send")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn parse_accepts_numbers_only() {
        assert_eq!(parse_send_request(br#"{"amount": 100}"#).unwrap(), Amount::from(100));
        assert_eq!(parse_send_request(br#"{"amount": -2.5}"#).unwrap().value(), -2.5);

        for bad in [
            r#"{}"#,
            r#"{"amount": null}"#,
            r#"{"amount": "100"}"#,
            r#"[100]"#,
            "amount=100",
        ] {
            assert!(matches!(
                parse_send_request(bad.as_bytes()),
                Err(Error::InvalidRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn send_broadcasts() {
        let (status, body) = call(router(engine()), post_send(r#"{"amount": 100}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], SEND_OK.as_bytes());
    }

    #[tokio::test]
    async fn send_without_amount_is_a_client_error() {
        let engine = engine();
        let (status, body) = call(router(engine.clone()), post_send(r#"{"value": 1}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], SEND_MISSING_AMOUNT.as_bytes());
        assert_eq!(engine.stats().delivery_failures, 0);
    }

    #[tokio::test]
    async fn metrics_reports_scores_and_timestamp() {
        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let (status, body) = call(router(engine()), request).await;
        assert_eq!(status, StatusCode::OK);

        let metrics: MetricsResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(metrics.technology, "Rust");
        assert_eq!(metrics.timestamp, "2024-05-01 12:00:00");
        assert_eq!(metrics.trust_scores.len(), 2);
        assert_eq!(metrics.trust_scores["127.0.0.1:8001"], 1.0);
    }
}

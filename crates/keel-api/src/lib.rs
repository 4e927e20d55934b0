//! HTTP surface of the Keel deployment registry.
//!
//! Queries read the registry directly through a [`QueryEngine`]; mutations
//! are turned into ledger transitions and answered once finalized. Every
//! response uses the `{success, data, error}` envelope.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/keel/deployment/v1/deployments/list` | List deployments (filters + pagination) |
//! | GET | `/keel/deployment/v1/deployments/info` | Get one deployment with its groups |
//! | GET | `/keel/deployment/v1/groups/info` | Get one group |
//! | POST | `/keel/deployment/v1/deployments/create` | Create a deployment |
//! | POST | `/keel/deployment/v1/deployments/update` | Replace group specs |
//! | POST | `/keel/deployment/v1/deployments/close` | Close a deployment |
//! | POST | `/keel/deployment/v1/groups/{close,pause,start}` | Group transitions |
//! | GET | `/keel/cert/v1/certificates/list` | List certificates |
//! | GET | `/keel/cert/v1/certificates/info` | Get one owner's certificate |
//! | POST | `/keel/cert/v1/certificates/{generate,publish,revoke}` | Certificate lifecycle |
//! | GET | `/keel/ledger/v1/height` | Current ledger height |

pub mod error;
pub mod handlers;
pub mod tx_handlers;

use axum::Router;
use axum::routing::{get, post};
use keel_ledger::LedgerHandle;
use keel_query::QueryEngine;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub query: QueryEngine,
    pub ledger: LedgerHandle,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let deployment_routes = Router::new()
        .route("/deployments/list", get(handlers::list_deployments))
        .route("/deployments/info", get(handlers::get_deployment))
        .route("/deployments/create", post(tx_handlers::create_deployment))
        .route("/deployments/update", post(tx_handlers::update_deployment))
        .route("/deployments/close", post(tx_handlers::close_deployment))
        .route("/groups/info", get(handlers::get_group))
        .route("/groups/close", post(tx_handlers::close_group))
        .route("/groups/pause", post(tx_handlers::pause_group))
        .route("/groups/start", post(tx_handlers::start_group));

    let cert_routes = Router::new()
        .route("/certificates/list", get(handlers::list_certificates))
        .route("/certificates/info", get(handlers::get_certificate))
        .route("/certificates/generate", post(tx_handlers::generate_certificate))
        .route("/certificates/publish", post(tx_handlers::publish_certificate))
        .route("/certificates/revoke", post(tx_handlers::revoke_certificate));

    Router::new()
        .nest("/keel/deployment/v1", deployment_routes)
        .nest("/keel/cert/v1", cert_routes)
        .route("/keel/ledger/v1/height", get(handlers::get_height))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use keel_cert::{CertificateAuthority, CertificateOptions};
    use keel_core::config::LedgerConfig;
    use keel_ledger::{Applier, Ledger};
    use keel_query::QueryLimits;
    use keel_state::StateStore;
    use tower::ServiceExt;

    fn router() -> Router {
        let store = StateStore::open_in_memory().unwrap();
        let authority = CertificateAuthority::new(store.clone(), CertificateOptions::default());
        let (ledger, _) =
            Ledger::spawn(Applier::new(store.clone(), authority), &LedgerConfig::default()).unwrap();
        build_router(ApiState {
            query: QueryEngine::new(store, QueryLimits::default()),
            ledger,
        })
    }

    #[tokio::test]
    async fn height_route_is_mounted() {
        let req = Request::builder()
            .uri("/keel/ledger/v1/height")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let req = Request::builder()
            .uri("/keel/deployment/v2/deployments/list")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn queries_reject_post() {
        let req = Request::builder()
            .method("POST")
            .uri("/keel/deployment/v1/deployments/list")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn malformed_query_string_keeps_envelope() {
        let req = Request::builder()
            .uri("/keel/deployment/v1/deployments/list?filters.owner=keel1alice000&filters.owner=keel1bob00000")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("invalid query"));
    }
}

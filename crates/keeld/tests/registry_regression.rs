//! Registry regression tests.
//!
//! Drives the full HTTP router over an in-memory registry: certificate
//! activation, deployment creation through the ledger, and the list/info
//! query surface with its error mapping.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use keel_api::{ApiState, build_router};
use keel_cert::{CertificateAuthority, CertificateOptions};
use keel_core::config::LedgerConfig;
use keel_ledger::{Applier, Ledger};
use keel_query::{QueryEngine, QueryLimits};
use keel_state::StateStore;

const ALICE: &str = "keel1alice000";
const BOB: &str = "keel1bob00000";

fn test_router() -> Router {
    let store = StateStore::open_in_memory().unwrap();
    let authority = CertificateAuthority::new(store.clone(), CertificateOptions::default());
    let (ledger, _) =
        Ledger::spawn(Applier::new(store.clone(), authority), &LedgerConfig::default()).unwrap();
    build_router(ApiState {
        query: QueryEngine::new(store, QueryLimits::default()),
        ledger,
    })
}

async fn get(router: &Router, uri: &str) -> Response<Body> {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(req).await.unwrap()
}

async fn post(router: &Router, uri: &str, body: Value) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    router.clone().oneshot(req).await.unwrap()
}

async fn body_json(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn groups(names: &[&str]) -> Value {
    Value::Array(
        names
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "requirements": { "signed_by": [], "attributes": { "region": "us-west" } },
                    "resources": [
                        { "cpu_millis": 500, "memory_bytes": 536870912, "storage_bytes": 0, "count": 1 }
                    ]
                })
            })
            .collect(),
    )
}

async fn activate(router: &Router, owner: &str) {
    let resp = post(router, "/keel/cert/v1/certificates/generate", json!({ "owner": owner })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = post(router, "/keel/cert/v1/certificates/publish", json!({ "owner": owner })).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

/// Router with ALICE's deployment 1 (one group) already created.
async fn seeded_router() -> Router {
    let router = test_router();
    activate(&router, ALICE).await;
    let resp = post(
        &router,
        "/keel/deployment/v1/deployments/create",
        json!({ "signer": ALICE, "groups": groups(&["web"]) }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    router
}

// ── Deployments list ───────────────────────────────────────────

#[tokio::test]
async fn list_deployments_without_filters() {
    let router = seeded_router().await;
    let resp = get(&router, "/keel/deployment/v1/deployments/list").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["deployments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_deployments_with_owner_filter() {
    let router = seeded_router().await;
    let resp = get(
        &router,
        &format!("/keel/deployment/v1/deployments/list?filters.owner={ALICE}"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let deployments = body["data"]["deployments"].as_array().unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0]["deployment"]["deployment_id"]["owner"], ALICE);
    assert_eq!(deployments[0]["deployment"]["deployment_id"]["dseq"], 1);
    assert_eq!(deployments[0]["groups"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_deployments_with_invalid_state_filter() {
    let router = seeded_router().await;
    let resp = get(&router, "/keel/deployment/v1/deployments/list?filters.state=invalid").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn list_deployments_with_state_and_owner_and_dseq() {
    let router = seeded_router().await;
    let resp = get(
        &router,
        &format!("/keel/deployment/v1/deployments/list?filters.state=active&filters.owner={ALICE}&filters.dseq=1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["deployments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_deployments_dseq_without_owner_is_rejected() {
    let router = seeded_router().await;
    let resp = get(&router, "/keel/deployment/v1/deployments/list?filters.state=active&filters.dseq=1").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_deployments_no_matches_is_empty() {
    let router = seeded_router().await;
    let resp = get(
        &router,
        &format!("/keel/deployment/v1/deployments/list?filters.owner={BOB}"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["data"]["deployments"].as_array().unwrap().is_empty());
}

// ── Deployment info ────────────────────────────────────────────

#[tokio::test]
async fn get_deployment_cases() {
    let router = seeded_router().await;
    let cases = [
        ("/keel/deployment/v1/deployments/info".to_string(), StatusCode::BAD_REQUEST),
        (
            format!("/keel/deployment/v1/deployments/info?id.owner={ALICE}"),
            StatusCode::BAD_REQUEST,
        ),
        (
            format!("/keel/deployment/v1/deployments/info?id.owner={ALICE}&id.dseq=249"),
            StatusCode::NOT_FOUND,
        ),
        (
            format!("/keel/deployment/v1/deployments/info?id.owner={ALICE}&id.dseq=1"),
            StatusCode::OK,
        ),
    ];
    for (uri, status) in cases {
        let resp = get(&router, &uri).await;
        assert_eq!(resp.status(), status, "{uri}");
    }
}

// ── Group info ─────────────────────────────────────────────────

#[tokio::test]
async fn get_group_cases() {
    let router = seeded_router().await;
    let cases = [
        ("/keel/deployment/v1/groups/info".to_string(), StatusCode::BAD_REQUEST),
        (
            format!("/keel/deployment/v1/groups/info?id.owner={ALICE}"),
            StatusCode::BAD_REQUEST,
        ),
        (
            format!("/keel/deployment/v1/groups/info?id.owner={ALICE}&id.dseq=249"),
            StatusCode::BAD_REQUEST,
        ),
        (
            format!("/keel/deployment/v1/groups/info?id.owner={ALICE}&id.dseq=249&id.gseq=1"),
            StatusCode::NOT_FOUND,
        ),
        (
            format!("/keel/deployment/v1/groups/info?id.owner={ALICE}&id.dseq=1&id.gseq=1"),
            StatusCode::OK,
        ),
    ];
    for (uri, status) in cases {
        let resp = get(&router, &uri).await;
        assert_eq!(resp.status(), status, "{uri}");
    }

    let resp = get(
        &router,
        &format!("/keel/deployment/v1/groups/info?id.owner={ALICE}&id.dseq=1&id.gseq=1"),
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body["data"]["group_spec"]["name"], "web");
    assert_eq!(body["data"]["state"], "open");
}

// ── Transitions ────────────────────────────────────────────────

#[tokio::test]
async fn create_before_publish_is_forbidden() {
    let router = test_router();
    let resp = post(&router, "/keel/cert/v1/certificates/generate", json!({ "owner": ALICE })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert!(
        body["data"]["outcome"]["certificate"]["key_pem"]
            .as_str()
            .unwrap()
            .contains("PRIVATE KEY")
    );

    let resp = post(
        &router,
        "/keel/deployment/v1/deployments/create",
        json!({ "signer": ALICE, "groups": groups(&["web"]) }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn publish_before_generate_is_not_found() {
    let router = test_router();
    let resp = post(&router, "/keel/cert/v1/certificates/publish", json!({ "owner": ALICE })).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn certificate_info_hides_private_key() {
    let router = seeded_router().await;
    let resp = get(&router, &format!("/keel/cert/v1/certificates/info?owner={ALICE}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["status"], "published");
    assert!(body["data"].get("key_pem").is_none());

    let resp = get(&router, "/keel/cert/v1/certificates/list?filter.state=published").await;
    let body = body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn resubmitted_create_is_conflict() {
    let router = test_router();
    activate(&router, ALICE).await;
    let create = json!({ "signer": ALICE, "dseq": 42, "groups": groups(&["web", "db"]) });
    let resp = post(&router, "/keel/deployment/v1/deployments/create", create.clone()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = post(&router, "/keel/deployment/v1/deployments/create", create).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = get(&router, "/keel/ledger/v1/height").await;
    let body = body_json(resp).await;
    assert_eq!(body["data"]["height"], 3);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let router = test_router();
    let resp = post(&router, "/keel/deployment/v1/deployments/create", json!({ "groups": 7 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn close_marks_every_group_closed() {
    let router = test_router();
    activate(&router, ALICE).await;
    post(
        &router,
        "/keel/deployment/v1/deployments/create",
        json!({ "signer": ALICE, "groups": groups(&["web", "db"]) }),
    )
    .await;

    let resp = post(
        &router,
        "/keel/deployment/v1/deployments/close",
        json!({ "signer": ALICE, "id": { "owner": ALICE, "dseq": 1 } }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = get(
        &router,
        &format!("/keel/deployment/v1/deployments/list?filters.owner={ALICE}&filters.state=closed"),
    )
    .await;
    let body = body_json(resp).await;
    let deployments = body["data"]["deployments"].as_array().unwrap();
    assert_eq!(deployments.len(), 1);
    assert!(
        deployments[0]["groups"]
            .as_array()
            .unwrap()
            .iter()
            .all(|g| g["state"] == "closed")
    );
}

// ── Pagination ─────────────────────────────────────────────────

#[tokio::test]
async fn paginates_and_detects_stale_cursor() {
    let router = test_router();
    activate(&router, ALICE).await;
    for _ in 0..3 {
        let resp = post(
            &router,
            "/keel/deployment/v1/deployments/create",
            json!({ "signer": ALICE, "groups": groups(&["web"]) }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = get(
        &router,
        "/keel/deployment/v1/deployments/list?pagination.limit=1&pagination.count_total=true",
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body["data"]["pagination"]["total"], 3);
    let key = body["data"]["pagination"]["next_key"].as_str().unwrap().to_string();

    let resp = get(
        &router,
        &format!("/keel/deployment/v1/deployments/list?pagination.limit=1&pagination.key={key}"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["deployments"][0]["deployment"]["deployment_id"]["dseq"], 2);

    let resp = get(
        &router,
        &format!("/keel/deployment/v1/deployments/list?pagination.key={key}&pagination.offset=1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    post(
        &router,
        "/keel/deployment/v1/deployments/close",
        json!({ "signer": ALICE, "id": { "owner": ALICE, "dseq": 3 } }),
    )
    .await;
    let resp = get(
        &router,
        &format!("/keel/deployment/v1/deployments/list?pagination.limit=1&pagination.key={key}"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::GONE);
}

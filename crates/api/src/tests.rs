use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use pollstake_core::{now_ts, KycStatus, PaymentStatus, Poll, PollOption, PollStatus, Role, User};
use pollstake_gateway::MockProvider;
use pollstake_settlement::OrderConfig;
use pollstake_store::{LedgerStore, StoreError};

use crate::{router, AppState, StaticTokenAuth};

const ADMIN_TOKEN: &str = "admin-token";
const ALICE_TOKEN: &str = "alice-token";

fn make_user(id: &str, role: Role) -> User {
    User {
        id: id.into(),
        email: format!("{id}@example.com"),
        name: id.into(),
        phone: "9876543210".into(),
        role,
        cash_wallet: 0,
        kyc_status: KycStatus::Approved,
        upi_id: Some(format!("{id}@upi")),
        created_at: now_ts(),
    }
}

fn make_poll(id: &str, vote_price: i64) -> Poll {
    Poll {
        id: id.into(),
        title: "Best captain".into(),
        description: String::new(),
        image_url: String::new(),
        options: vec![PollOption::new("Yes"), PollOption::new("No")],
        vote_price,
        end_at: now_ts() + 86_400,
        status: PollStatus::Active,
        winning_option: None,
        created_by: "admin".into(),
        created_at: now_ts(),
        result_declared_at: None,
    }
}

struct TestApp {
    app: Router,
    store: Arc<LedgerStore>,
    mock: Arc<MockProvider>,
}

async fn test_app() -> TestApp {
    let store = Arc::new(LedgerStore::in_memory());
    store
        .write(|s| {
            s.users.insert("admin".into(), make_user("admin", Role::Admin));
            s.users.insert("alice".into(), make_user("alice", Role::User));
            s.polls.insert("poll1".into(), make_poll("poll1", 10_000));
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap();
    let mock = Arc::new(MockProvider::new("test_secret"));
    let auth = StaticTokenAuth::new()
        .with_token(ADMIN_TOKEN, "admin", Role::Admin)
        .with_token(ALICE_TOKEN, "alice", Role::User);
    let state = AppState::new(
        store.clone(),
        mock.clone(),
        Arc::new(auth),
        OrderConfig::default(),
    );
    TestApp {
        app: router(state),
        store,
        mock,
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_polls_are_public() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/polls", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Best captain");
    assert_eq!(body[0]["total_votes"], 0);

    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/polls/nope", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_my_polls_requires_auth() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/my-polls", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/my-polls", Some(ALICE_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_order_verify_flow() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/payments/create-order",
            Some(ALICE_TOKEN),
            Some(json!({ "poll_id": "poll1", "option_index": 0, "num_votes": 3 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["base_amount"], 30_000);
    assert_eq!(body["gateway_charge"], 600);
    assert_eq!(body["amount"], 30_600);
    let order_id = body["order_id"].as_str().unwrap().to_string();
    let provider_ref = body["provider_ref"].as_str().unwrap().to_string();

    // Still pending at the provider.
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/payments/verify?order_id={order_id}"),
            Some(ALICE_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "pending");

    t.mock.set_status(&provider_ref, PaymentStatus::Success);
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/payments/verify?order_id={order_id}"),
            Some(ALICE_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["status"], "success");

    // The settled votes show up in the public overview.
    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/polls/poll1", Some(ALICE_TOKEN), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total_votes"], 3);
    assert_eq!(body["total_amount_collected"], 30_000);
    assert_eq!(body["user_votes"][0]["num_votes"], 3);
}

#[tokio::test]
async fn test_webhook_signature_gates() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/payments/create-order",
            Some(ALICE_TOKEN),
            Some(json!({ "poll_id": "poll1", "option_index": 1, "num_votes": 1 })),
        ))
        .await
        .unwrap();
    let provider_ref = json_body(response).await["provider_ref"]
        .as_str()
        .unwrap()
        .to_string();

    let (body, sig) = t.mock.signed_webhook(&provider_ref, "success");

    // Missing signature header.
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Wrong signature.
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("x-mock-signature", "deadbeef")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Valid signature settles the order.
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("x-mock-signature", &sig)
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    assert_eq!(result["outcome"], "settled");

    // Redelivery is acknowledged but settles nothing new.
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("x-mock-signature", &sig)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(response).await["outcome"], "already_settled");

    let votes = t.store.read(|s| s.votes.len()).await;
    assert_eq!(votes, 1);
}

#[tokio::test]
async fn test_admin_routes_enforce_role() {
    let t = test_app().await;
    let body = json!({
        "title": "New poll",
        "options": ["A", "B"],
        "vote_price": 5_000,
        "end_at": now_ts() + 3600,
    });

    let response = t
        .app
        .clone()
        .oneshot(request("POST", "/api/admin/polls", None, Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = t
        .app
        .clone()
        .oneshot(request("POST", "/api/admin/polls", Some(ALICE_TOKEN), Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = t
        .app
        .clone()
        .oneshot(request("POST", "/api/admin/polls", Some(ADMIN_TOKEN), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let polls = t.store.read(|s| s.polls.len()).await;
    assert_eq!(polls, 2);
}

#[tokio::test]
async fn test_set_result_and_stats() {
    let t = test_app().await;
    // Alice buys 2 votes on option 0 through the full payment flow.
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/payments/create-order",
            Some(ALICE_TOKEN),
            Some(json!({ "poll_id": "poll1", "option_index": 0, "num_votes": 2 })),
        ))
        .await
        .unwrap();
    let order = json_body(response).await;
    let provider_ref = order["provider_ref"].as_str().unwrap().to_string();
    t.mock.set_status(&provider_ref, PaymentStatus::Success);
    t.app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/payments/verify?order_id={}", order["order_id"].as_str().unwrap()),
            Some(ALICE_TOKEN),
            None,
        ))
        .await
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/admin/polls/poll1/set-result?winning_option_index=0",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summary = json_body(response).await;
    assert_eq!(summary["winners"], 1);
    assert_eq!(summary["distributed"], 20_000);

    // Second declaration is rejected.
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/admin/polls/poll1/set-result?winning_option_index=1",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t
        .app
        .clone()
        .oneshot(request(
            "GET",
            "/api/admin/polls/poll1/result-stats",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;
    assert_eq!(stats["winning_option_name"], "Yes");
    assert_eq!(stats["total_distributed"], 20_000);

    // The winnings landed in Alice's wallet.
    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/wallet", Some(ALICE_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["balance"], 20_000);
}

#[tokio::test]
async fn test_withdrawal_flow() {
    let t = test_app().await;
    t.store
        .write(|s| {
            s.user_mut("alice")?.cash_wallet = 100_000;
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/withdrawal/request",
            Some(ALICE_TOKEN),
            Some(json!({ "amount": 50_000 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let withdrawal = json_body(response).await;
    assert_eq!(withdrawal["withdrawal_charge"], 5_000);
    assert_eq!(withdrawal["net_amount"], 45_000);
    let withdrawal_id = withdrawal["id"].as_str().unwrap().to_string();

    // Only admins review.
    let response = t
        .app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/admin/withdrawals/{withdrawal_id}"),
            Some(ALICE_TOKEN),
            Some(json!({ "status": "rejected" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = t
        .app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/admin/withdrawals/{withdrawal_id}"),
            Some(ADMIN_TOKEN),
            Some(json!({ "status": "rejected" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Rejection refunded the original amount.
    let balance = t.store.read(|s| s.user("alice").unwrap().cash_wallet).await;
    assert_eq!(balance, 100_000);
}

#[tokio::test]
async fn test_insufficient_balance_is_bad_request() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/withdrawal/request",
            Some(ALICE_TOKEN),
            Some(json!({ "amount": 50_000 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_roundtrip() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/settings/public", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let settings = json_body(response).await;
    assert_eq!(settings["payment_gateway_charge_bps"], 200);
    assert_eq!(settings["withdrawal_charge_bps"], 1000);

    let response = t
        .app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/admin/settings",
            Some(ADMIN_TOKEN),
            Some(json!({ "payment_gateway_charge_bps": 300, "withdrawal_charge_bps": 500 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/settings/public", None, None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["payment_gateway_charge_bps"], 300);
}

#[tokio::test]
async fn test_kyc_review_flow() {
    let t = test_app().await;
    t.store
        .write(|s| {
            s.user_mut("alice")?.kyc_status = KycStatus::NotSubmitted;
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap();

    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/kyc/submit",
            Some(ALICE_TOKEN),
            Some(json!({ "upi_id": "alice@newupi" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = t.store.read(|s| s.user("alice").unwrap().kyc_status).await;
    assert_eq!(status, KycStatus::Pending);

    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/admin/kyc/alice/approve",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    t.store
        .read(|s| {
            let user = s.user("alice").unwrap();
            assert_eq!(user.kyc_status, KycStatus::Approved);
            assert_eq!(user.upi_id.as_deref(), Some("alice@newupi"));
        })
        .await;

    // Approving again fails: nothing is pending.
    let response = t
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/admin/kyc/alice/approve",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_and_transactions() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/admin/dashboard-stats", Some(ADMIN_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;
    assert_eq!(stats["total_users"], 2);
    assert_eq!(stats["active_polls"], 1);

    let response = t
        .app
        .clone()
        .oneshot(request(
            "GET",
            "/api/admin/transactions?page=1&limit=10",
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["total"], 0);
    assert_eq!(page["transactions"].as_array().unwrap().len(), 0);

    // A page number near usize::MAX must yield an empty page, not an
    // offset that overflows.
    let uri = format!("/api/admin/transactions?page={}&limit=200", usize::MAX);
    let response = t
        .app
        .clone()
        .oneshot(request("GET", &uri, Some(ADMIN_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["transactions"].as_array().unwrap().len(), 0);
}

//! API integration tests, driving the router in-process

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use circulation_server::{
    api::{self, BORROWER_ID_HEADER, ROLE_HEADER},
    clock::ManualClock,
    config::{AppConfig, CirculationConfig},
    repository::Repository,
    services::Services,
    AppState,
};

struct TestApp {
    router: Router,
    clock: ManualClock,
}

fn app() -> TestApp {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
    let services = Services::new(
        Repository::in_memory(),
        Arc::new(clock.clone()),
        &CirculationConfig::default(),
    );
    let state = AppState {
        config: Arc::new(AppConfig::default()),
        services: Arc::new(services),
    };
    TestApp {
        router: api::router(state),
        clock,
    }
}

enum As {
    Admin,
    Borrower(Uuid),
    Nobody,
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, caller: As, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(format!("/api/v1{}", uri));
        request = match caller {
            As::Admin => request.header(ROLE_HEADER, "admin"),
            As::Borrower(id) => request.header(BORROWER_ID_HEADER, id.to_string()),
            As::Nobody => request,
        };
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register_borrower(&self) -> Uuid {
        let id = Uuid::new_v4();
        let (status, _) = self
            .call(Method::POST, &format!("/borrowers/{}", id), As::Admin, Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        id
    }

    async fn register_item(&self, copies: i32) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                "/items",
                As::Admin,
                Some(json!({ "total_copies": copies })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
    }

    async fn add_to_basket(&self, borrower: Uuid, item: Uuid) -> StatusCode {
        self.call(
            Method::POST,
            "/basket/items",
            As::Borrower(borrower),
            Some(json!({ "item_id": item })),
        )
        .await
        .0
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/health", As::Nobody, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_identity_is_forbidden() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/basket", As::Nobody, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotAuthorized");
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = app();
    let borrower = app.register_borrower().await;

    let (status, _) = app
        .call(
            Method::POST,
            "/items",
            As::Borrower(borrower),
            Some(json!({ "total_copies": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::POST, "/sweep", As::Borrower(borrower), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/borrowers/{}/reactivate", borrower),
            As::Borrower(borrower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_copy_count_is_a_bad_request() {
    let app = app();
    let (status, body) = app
        .call(Method::POST, "/items", As::Admin, Some(json!({ "total_copies": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_checkout_and_return_flow() {
    let app = app();
    let borrower = app.register_borrower().await;
    let item = app.register_item(1).await;

    assert_eq!(app.add_to_basket(borrower, item).await, StatusCode::OK);
    assert_eq!(app.add_to_basket(borrower, item).await, StatusCode::CONFLICT);

    let (status, basket) = app.call(Method::GET, "/basket", As::Borrower(borrower), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(basket["items"].as_array().unwrap().len(), 1);
    assert_eq!(basket["items"][0]["available_copies"], 1);

    let (status, loan) = app.call(Method::POST, "/checkout", As::Borrower(borrower), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["status"], "borrowed");
    let loan_id = loan["id"].as_str().unwrap().to_string();

    let (_, stock) = app
        .call(Method::GET, &format!("/items/{}", item), As::Borrower(borrower), None)
        .await;
    assert_eq!(stock["available_copies"], 0);

    app.clock.advance(Duration::days(10));
    let (status, loan) = app
        .call(Method::GET, &format!("/loans/{}", loan_id), As::Borrower(borrower), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["status"], "overdue");
    assert_eq!(loan["accrued_fine"], 15000);

    let (status, returned) = app
        .call(
            Method::POST,
            &format!("/loans/{}/return", loan_id),
            As::Borrower(borrower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "returned");
    assert_eq!(returned["fine_amount"], 15000);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/loans/{}/return", loan_id),
            As::Borrower(borrower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NoOpTransition");
}

#[tokio::test]
async fn test_rejections_name_offending_items() {
    let app = app();
    let first = app.register_borrower().await;
    let second = app.register_borrower().await;
    let item = app.register_item(1).await;

    app.add_to_basket(first, item).await;
    app.call(Method::POST, "/checkout", As::Borrower(first), None).await;

    app.add_to_basket(second, item).await;
    let (status, body) = app.call(Method::POST, "/checkout", As::Borrower(second), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InsufficientCopies");
    assert_eq!(body["items"], json!([item]));
}

#[tokio::test]
async fn test_empty_basket_checkout_conflicts() {
    let app = app();
    let borrower = app.register_borrower().await;
    let (status, body) = app.call(Method::POST, "/checkout", As::Borrower(borrower), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidState");
}

#[tokio::test]
async fn test_borrowers_cannot_read_each_others_loans() {
    let app = app();
    let owner = app.register_borrower().await;
    let stranger = app.register_borrower().await;
    let item = app.register_item(1).await;

    app.add_to_basket(owner, item).await;
    let (_, loan) = app.call(Method::POST, "/checkout", As::Borrower(owner), None).await;
    let loan_id = loan["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(Method::GET, &format!("/loans/{}", loan_id), As::Borrower(stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/loans/{}/return", loan_id),
            As::Borrower(stranger),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Listing is scoped to the caller
    let (status, page) = app.call(Method::GET, "/loans", As::Borrower(stranger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);

    let (status, page) = app.call(Method::GET, "/loans?status=borrowed", As::Admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_admin_revert_reports_unavailable_items() {
    let app = app();
    let first = app.register_borrower().await;
    let second = app.register_borrower().await;
    let item = app.register_item(1).await;

    app.add_to_basket(first, item).await;
    let (_, loan) = app.call(Method::POST, "/checkout", As::Borrower(first), None).await;
    let loan_id = loan["id"].as_str().unwrap().to_string();
    app.call(
        Method::POST,
        &format!("/loans/{}/return", loan_id),
        As::Borrower(first),
        None,
    )
    .await;

    app.add_to_basket(second, item).await;
    app.call(Method::POST, "/checkout", As::Borrower(second), None).await;

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/loans/{}/status", loan_id),
            As::Admin,
            Some(json!({ "status": "borrowed" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "ItemUnavailable");
    assert_eq!(body["items"], json!([item]));
}

#[tokio::test]
async fn test_sweep_and_reactivation() {
    let app = app();
    let borrower = app.register_borrower().await;
    let item = app.register_item(1).await;

    app.add_to_basket(borrower, item).await;
    let (_, loan) = app.call(Method::POST, "/checkout", As::Borrower(borrower), None).await;
    let loan_id = loan["id"].as_str().unwrap().to_string();

    app.clock.advance(Duration::days(7 + 8));
    let (status, report) = app.call(Method::POST, "/sweep", As::Admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["deactivated"], 1);

    let (_, summary) = app
        .call(
            Method::GET,
            &format!("/borrowers/{}/summary", borrower),
            As::Borrower(borrower),
            None,
        )
        .await;
    assert_eq!(summary["eligibility_status"], "inactive");
    assert_eq!(summary["total_fines"], 40000);
    assert_eq!(summary["overdue_loans"], 1);

    let reactivate = format!("/borrowers/{}/reactivate", borrower);
    let (status, _) = app.call(Method::POST, &reactivate, As::Admin, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.call(
        Method::POST,
        &format!("/loans/{}/return", loan_id),
        As::Borrower(borrower),
        None,
    )
    .await;
    let (status, body) = app.call(Method::POST, &reactivate, As::Admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eligibility_status"], "active");
}

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use mentorbook_api::{
    build_app,
    config::{AppConfig, AuthConfig},
    services::AppState,
};
use mentorbook_common::{DatabaseConfig, JwtConfig, ServerConfig, StorageBackend};
use mentorbook_database::MemoryStore;

const PASSWORD: &str = "pw123";

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:3000".to_string()],
        },
        database: DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            username: "unused".to_string(),
            password: "unused".to_string(),
            database: "unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            expiration_hours: 1,
            refresh_expiration_hours: 24,
            issuer: "mentorbook-test".to_string(),
        },
        auth: AuthConfig { bcrypt_cost: 4 },
        storage: StorageBackend::Memory,
    }
}

fn create_test_server() -> TestServer {
    let state = AppState::new(Arc::new(MemoryStore::new()), test_config());
    TestServer::new(build_app(state)).unwrap()
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn register(server: &TestServer, username: &str, role: &str) {
    server
        .post("/register")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
            "role": role,
        }))
        .await
        .assert_status(StatusCode::CREATED);
}

async fn login(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/token")
        .json(&json!({ "username": username, "password": PASSWORD }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    body["data"]["access"].as_str().unwrap().to_string()
}

async fn mentor_id_of(server: &TestServer, username: &str) -> String {
    let body: Value = server.get("/mentors").await.json();
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|mentor| mentor["user"]["username"] == username)
        .map(|mentor| mentor["mentor_id"].as_str().unwrap().to_string())
        .unwrap()
}

struct Fixture {
    server: TestServer,
    alice: String,
    bob: String,
    bob_mentor_id: String,
}

/// alice (mentee) and bob (mentor charging 60.00/h).
async fn fixture() -> Fixture {
    let server = create_test_server();
    register(&server, "alice", "mentee").await;
    register(&server, "bob", "mentor").await;

    let alice = login(&server, "alice").await;
    let bob = login(&server, "bob").await;
    let bob_mentor_id = mentor_id_of(&server, "bob").await;

    server
        .patch(&format!("/mentors/{}", bob_mentor_id))
        .add_header(AUTHORIZATION, bearer(&bob))
        .json(&json!({ "hourly_rate": "60.00" }))
        .await
        .assert_status_ok();

    Fixture {
        server,
        alice,
        bob,
        bob_mentor_id,
    }
}

async fn book(fx: &Fixture) -> Value {
    let response = fx
        .server
        .post("/bookings")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .json(&json!({
            "mentor": fx.bob_mentor_id,
            "session_date": "2030-01-15",
            "session_time": "10:00:00",
            "duration_minutes": 90,
            "topic": "Rust ownership",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["data"].clone()
}

async fn act(fx: &Fixture, token: &str, booking_id: &str, action: &str) -> axum_test::TestResponse {
    fx.server
        .post(&format!("/bookings/{}/{}", booking_id, action))
        .add_header(AUTHORIZATION, bearer(token))
        .await
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = create_test_server();
    let response = server.get("/nowhere").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_booking_total_uses_rate_at_creation() {
    let fx = fixture().await;
    let booking = book(&fx).await;

    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["total_amount"], "90.00");
    assert_eq!(booking["mentee"]["username"], "alice");
    assert_eq!(booking["mentor"]["user"]["username"], "bob");

    // A later rate change leaves the stored total alone.
    fx.server
        .patch(&format!("/mentors/{}", fx.bob_mentor_id))
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .json(&json!({ "hourly_rate": "80.00" }))
        .await
        .assert_status_ok();

    let response = fx
        .server
        .get(&format!("/bookings/{}", booking["booking_id"].as_str().unwrap()))
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["total_amount"], "90.00");
}

#[tokio::test]
async fn test_accept_twice_is_rejected() {
    let fx = fixture().await;
    let booking = book(&fx).await;
    let booking_id = booking["booking_id"].as_str().unwrap();

    let response = act(&fx, &fx.bob, booking_id, "accept").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "confirmed");

    let response = act(&fx, &fx.bob, booking_id, "accept").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "STATE_CONFLICT");

    // The refused transition leaves the stored status alone.
    let body: Value = fx
        .server
        .get(&format!("/bookings/{}", booking_id))
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .await
        .json();
    assert_eq!(body["data"]["status"], "confirmed");

    act(&fx, &fx.bob, booking_id, "decline")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let body: Value = fx
        .server
        .get(&format!("/bookings/{}", booking_id))
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .await
        .json();
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn test_only_parties_can_cancel() {
    let fx = fixture().await;
    register(&fx.server, "carol", "mentee").await;
    let carol = login(&fx.server, "carol").await;

    let booking = book(&fx).await;
    let booking_id = booking["booking_id"].as_str().unwrap();
    act(&fx, &fx.bob, booking_id, "accept").await.assert_status_ok();

    act(&fx, &carol, booking_id, "cancel")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = act(&fx, &fx.alice, booking_id, "cancel").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "cancelled");

    // Cancelled is terminal.
    act(&fx, &fx.alice, booking_id, "cancel")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mentee_cannot_run_mentor_actions() {
    let fx = fixture().await;
    let booking = book(&fx).await;
    let booking_id = booking["booking_id"].as_str().unwrap();

    for action in ["accept", "decline", "complete"] {
        act(&fx, &fx.alice, booking_id, action)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    // Authorization wins over state: complete on a pending booking is still 403.
    act(&fx, &fx.alice, booking_id, "complete")
        .await
        .assert_status(StatusCode::FORBIDDEN);
    act(&fx, &fx.bob, booking_id, "complete")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_leaving_mentor_role_removes_bookings() {
    let fx = fixture().await;
    book(&fx).await;

    let profile: Value = fx
        .server
        .get("/profiles/me")
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .await
        .json();
    let profile_id = profile["data"]["profile_id"].as_str().unwrap().to_string();
    assert_eq!(profile["data"]["role"], "mentor");

    let response = fx
        .server
        .patch(&format!("/profiles/{}", profile_id))
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .json(&json!({ "role": "mentee" }))
        .await;
    response.assert_status_ok();

    let mentors: Value = fx.server.get("/mentors").await.json();
    assert!(mentors["data"].as_array().unwrap().is_empty());

    let bookings: Value = fx
        .server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .await
        .json();
    assert!(bookings["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_protected_endpoints_require_token() {
    let server = create_test_server();
    server.get("/bookings").await.assert_status(StatusCode::UNAUTHORIZED);

    server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer("not-a-jwt"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_rules() {
    let server = create_test_server();
    register(&server, "alice", "mentee").await;

    let response = server
        .post("/register")
        .json(&json!({ "username": "alice", "email": "other@example.com", "password": PASSWORD }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert!(body["details"]["username"].is_array());

    let response = server
        .post("/register")
        .json(&json!({ "username": "mallory", "email": "mallory@example.com", "password": PASSWORD, "role": "admin" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/register")
        .json(&json!({ "username": "dave", "email": "not-an-email", "password": PASSWORD }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["details"]["email"].is_array());

    let response = server
        .post("/token")
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_refresh_and_verify() {
    let server = create_test_server();
    register(&server, "alice", "mentee").await;

    let pair: Value = server
        .post("/token")
        .json(&json!({ "username": "alice", "password": PASSWORD }))
        .await
        .json();
    let access = pair["data"]["access"].as_str().unwrap();
    let refresh = pair["data"]["refresh"].as_str().unwrap();

    server
        .post("/token/verify")
        .json(&json!({ "token": access }))
        .await
        .assert_status_ok();

    // A refresh token is not an access token.
    server
        .post("/token/verify")
        .json(&json!({ "token": refresh }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/token/refresh")
        .json(&json!({ "refresh": refresh }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["data"]["access"].is_string());
}

#[tokio::test]
async fn test_review_requires_completed_booking() {
    let fx = fixture().await;
    let booking = book(&fx).await;
    let booking_id = booking["booking_id"].as_str().unwrap();

    let review = json!({
        "booking": booking_id,
        "rating": 5,
        "comment": "Very clear explanations",
    });

    fx.server
        .post("/reviews")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .json(&review)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    act(&fx, &fx.bob, booking_id, "accept").await.assert_status_ok();
    act(&fx, &fx.bob, booking_id, "complete").await.assert_status_ok();

    // Only the booking's mentee may review it.
    fx.server
        .post("/reviews")
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .json(&review)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    fx.server
        .post("/reviews")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .json(&json!({ "booking": booking_id, "rating": 6, "comment": "Too good" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    fx.server
        .post("/reviews")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .json(&json!({ "booking": booking_id, "rating": 4 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    fx.server
        .post("/reviews")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .json(&review)
        .await
        .assert_status(StatusCode::CREATED);

    let response = fx
        .server
        .post("/reviews")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .json(&review)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    let mentor: Value = fx
        .server
        .get(&format!("/mentors/{}", fx.bob_mentor_id))
        .await
        .json();
    assert_eq!(mentor["data"]["rating"], "5.00");
    assert_eq!(mentor["data"]["total_sessions"], 1);

    let public: Value = fx
        .server
        .get(&format!("/mentors/{}/reviews", fx.bob_mentor_id))
        .await
        .json();
    assert_eq!(public["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_follow_role() {
    let fx = fixture().await;
    let booking = book(&fx).await;
    let booking_id = booking["booking_id"].as_str().unwrap();
    act(&fx, &fx.bob, booking_id, "accept").await.assert_status_ok();
    act(&fx, &fx.bob, booking_id, "complete").await.assert_status_ok();

    let mentor: Value = fx
        .server
        .get("/users/me/stats")
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .await
        .json();
    assert_eq!(mentor["data"]["total_sessions"], 1);
    assert_eq!(mentor["data"]["total_earnings"], "90.00");

    let mentee: Value = fx
        .server
        .get("/users/me/stats")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .await
        .json();
    assert_eq!(mentee["data"]["total_hours"], "1.5");
    assert_eq!(mentee["data"]["unique_mentors"], 1);
}

#[tokio::test]
async fn test_scoping_hides_other_peoples_records() {
    let fx = fixture().await;
    register(&fx.server, "carol", "mentee").await;
    let carol = login(&fx.server, "carol").await;

    let booking = book(&fx).await;
    fx.server
        .get(&format!("/bookings/{}", booking["booking_id"].as_str().unwrap()))
        .add_header(AUTHORIZATION, bearer(&carol))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let profiles: Value = fx
        .server
        .get("/profiles")
        .add_header(AUTHORIZATION, bearer(&carol))
        .await
        .json();
    assert_eq!(profiles["data"].as_array().unwrap().len(), 1);

    fx.server
        .get("/users")
        .add_header(AUTHORIZATION, bearer(&carol))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

fn booking_ids(body: &Value) -> Vec<String> {
    let mut ids: Vec<String> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|booking| booking["booking_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_mentor_can_decline_pending_booking() {
    let fx = fixture().await;
    let booking = book(&fx).await;
    let booking_id = booking["booking_id"].as_str().unwrap();

    let response = act(&fx, &fx.bob, booking_id, "decline").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "cancelled");

    let body: Value = fx
        .server
        .get(&format!("/bookings/{}", booking_id))
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .await
        .json();
    assert_eq!(body["data"]["status"], "cancelled");

    act(&fx, &fx.bob, booking_id, "accept")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upcoming_and_past_split_by_status() {
    let fx = fixture().await;
    let ids: Vec<String> = {
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(book(&fx).await["booking_id"].as_str().unwrap().to_string());
        }
        ids
    };
    let (pending, confirmed, completed, cancelled) = (&ids[0], &ids[1], &ids[2], &ids[3]);

    act(&fx, &fx.bob, confirmed, "accept").await.assert_status_ok();
    act(&fx, &fx.bob, completed, "accept").await.assert_status_ok();
    act(&fx, &fx.bob, completed, "complete").await.assert_status_ok();
    act(&fx, &fx.alice, cancelled, "cancel").await.assert_status_ok();

    for token in [&fx.alice, &fx.bob] {
        let upcoming: Value = fx
            .server
            .get("/bookings/upcoming")
            .add_header(AUTHORIZATION, bearer(token))
            .await
            .json();
        let mut expected = vec![pending.clone(), confirmed.clone()];
        expected.sort();
        assert_eq!(booking_ids(&upcoming), expected);

        let past: Value = fx
            .server
            .get("/bookings/past")
            .add_header(AUTHORIZATION, bearer(token))
            .await
            .json();
        let mut expected = vec![completed.clone(), cancelled.clone()];
        expected.sort();
        assert_eq!(booking_ids(&past), expected);
    }
}

#[tokio::test]
async fn test_total_sessions_counts_every_booking() {
    let fx = fixture().await;
    let done = book(&fx).await;
    let done_id = done["booking_id"].as_str().unwrap();
    act(&fx, &fx.bob, done_id, "accept").await.assert_status_ok();
    act(&fx, &fx.bob, done_id, "complete").await.assert_status_ok();
    book(&fx).await;

    let mentor: Value = fx
        .server
        .get("/users/me/stats")
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .await
        .json();
    assert_eq!(mentor["data"]["total_sessions"], 2);
    assert_eq!(mentor["data"]["total_earnings"], "90.00");

    let mentee: Value = fx
        .server
        .get("/users/me/stats")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .await
        .json();
    assert_eq!(mentee["data"]["total_sessions"], 2);
    assert_eq!(mentee["data"]["total_hours"], "1.5");
}

#[tokio::test]
async fn test_rates_and_totals_stay_within_money_column() {
    let fx = fixture().await;
    let rate_url = format!("/mentors/{}", fx.bob_mentor_id);

    let response = fx
        .server
        .patch(&rate_url)
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .json(&json!({ "hourly_rate": "79228162514264337593543950" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["details"]["hourly_rate"].is_array());

    fx.server
        .patch(&rate_url)
        .add_header(AUTHORIZATION, bearer(&fx.bob))
        .json(&json!({ "hourly_rate": "99999999.99" }))
        .await
        .assert_status_ok();

    // A day at the top rate no longer fits the total column.
    let response = fx
        .server
        .post("/bookings")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .json(&json!({
            "mentor": fx.bob_mentor_id,
            "session_date": "2030-01-15",
            "session_time": "10:00:00",
            "duration_minutes": 1440,
            "topic": "All day",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert!(body["details"]["total_amount"].is_array());

    let bookings: Value = fx
        .server
        .get("/bookings")
        .add_header(AUTHORIZATION, bearer(&fx.alice))
        .await
        .json();
    assert!(bookings["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_mentor_signup_keeps_mentee_role() {
    let server = create_test_server();
    register(&server, "carol", "mentee").await;
    let carol = login(&server, "carol").await;

    let response = server
        .post("/mentors")
        .add_header(AUTHORIZATION, bearer(&carol))
        .json(&json!({ "expertise_ids": [uuid::Uuid::new_v4()] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let profile: Value = server
        .get("/profiles/me")
        .add_header(AUTHORIZATION, bearer(&carol))
        .await
        .json();
    assert_eq!(profile["data"]["role"], "mentee");
    let mentors: Value = server.get("/mentors").await.json();
    assert!(mentors["data"].as_array().unwrap().is_empty());

    let response = server
        .post("/mentors")
        .add_header(AUTHORIZATION, bearer(&carol))
        .json(&json!({ "hourly_rate": "40.00" }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let profile: Value = server
        .get("/profiles/me")
        .add_header(AUTHORIZATION, bearer(&carol))
        .await
        .json();
    assert_eq!(profile["data"]["role"], "mentor");

    server
        .post("/mentors")
        .add_header(AUTHORIZATION, bearer(&carol))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_look_alike() {
    let server = create_test_server();
    register(&server, "alice", "mentee").await;

    let wrong_password = server
        .post("/token")
        .json(&json!({ "username": "alice", "password": "not-it" }))
        .await;
    wrong_password.assert_status(StatusCode::UNAUTHORIZED);

    let unknown_user = server
        .post("/token")
        .json(&json!({ "username": "nobody", "password": "not-it" }))
        .await;
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);

    let a: Value = wrong_password.json();
    let b: Value = unknown_user.json();
    assert_eq!(a["error_code"], b["error_code"]);
    assert_eq!(a["message"], b["message"]);
    assert_eq!(a["message"], "Invalid username or password");
}

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::{json, Value};

use super::client_ip;
use crate::app::router;
use crate::testing::http::{get, send};
use crate::testing::{fixture_uuid, memory_state};

fn app(users: i64) -> axum::Router {
    router(memory_state(users))
}

async fn sign_in(app: &axum::Router, username: &str) -> String {
    let body = json!({ "username": username, "password": "password", "isRemember": 0 });
    let res = send(app, Method::POST, "/api/v1/auth/token", None, Some(body)).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    res.body["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn signs_in_by_username_email_or_phone() {
    let app = app(2);
    for username in ["user1", "user1@example.com", "0800000001"] {
        let body = json!({ "username": username, "password": "password", "isRemember": 1 });
        let res = send(&app, Method::POST, "/api/v1/auth/token", None, Some(body)).await;
        assert_eq!(res.status, StatusCode::OK, "{}", username);
        assert_eq!(res.body["tokenType"], "bearer");
        assert!(res.body["expiresIn"].as_i64().unwrap() > 3600);
    }
}

#[tokio::test]
async fn sign_in_records_the_login() {
    let app = app(1);
    let token = sign_in(&app, "user1").await;
    let res = send(&app, Method::GET, "/api/v1/auth", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_ne!(res.body["data"]["attributes"]["lastLoginAt"], "");
}

#[tokio::test]
async fn rejects_bad_credentials() {
    let body = json!({ "username": "user1", "password": "wrong", "isRemember": 0 });
    let res = send(&app(1), Method::POST, "/api/v1/auth/token", None, Some(body)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let error: &Value = &res.body["errors"][0];
    assert_eq!(error["code"], "401");
    assert_eq!(error["title"], "invalid login");
    assert_eq!(error["detail"], "user or password is invalid");
    assert_eq!(error["source"]["parameter"], "username");
}

#[tokio::test]
async fn profile_requires_a_token() {
    let app = app(1);
    let res = get(&app, "/api/v1/auth").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers[header::CONTENT_TYPE], "application/vnd.api+json");

    let res = send(&app, Method::GET, "/api/v1/auth", Some("garbage"), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shows_the_profile() {
    let app = app(2);
    let token = sign_in(&app, "user2").await;
    let res = send(&app, Method::GET, "/api/v1/auth", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["type"], "auth");
    assert_eq!(res.body["data"]["id"], fixture_uuid(2));
    assert_eq!(res.body["data"]["links"]["self"], "/api/v1/auth");
    assert!(res.body["data"].get("relationships").is_none());
}

#[tokio::test]
async fn refresh_revokes_the_old_token() {
    let app = app(1);
    let token = sign_in(&app, "user1").await;
    let res = send(&app, Method::PUT, "/api/v1/auth/token", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    let fresh = res.body["accessToken"].as_str().unwrap().to_string();
    assert_ne!(fresh, token);

    assert_eq!(send(&app, Method::GET, "/api/v1/auth", Some(&token), None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(send(&app, Method::GET, "/api/v1/auth", Some(&fresh), None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = app(1);
    let token = sign_in(&app, "user1").await;
    let res = send(&app, Method::DELETE, "/api/v1/auth/token", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, Method::GET, "/api/v1/auth", Some(&token), None).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registers_and_hands_off_a_token() {
    let app = app(1);
    let uuid = fixture_uuid(70);
    let body = json!({
        "data": {
            "type": "auth",
            "id": uuid,
            "attributes": {
                "fullname": "New Person",
                "username": "newbie",
                "email": "newbie@example.com",
                "phone": "0899999999",
                "password": "secret",
                "passwordConfirm": "secret",
            }
        }
    });
    let res = send(&app, Method::POST, "/api/v1/auth", None, Some(body)).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["data"]["type"], "auth");
    assert_eq!(res.body["data"]["attributes"]["email"], "newbie@example.com");

    let location = res.headers[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with(&format!("/api/v1/auth/token?uuid={}&time=", uuid)));

    let res = get(&app, &location).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["tokenType"], "bearer");

    let expired = format!("/api/v1/auth/token?uuid={}&time=1", uuid);
    let res = get(&app, &expired).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["errors"][0]["detail"], "time expired");
}

#[tokio::test]
async fn updates_the_profile() {
    let app = app(2);
    let token = sign_in(&app, "user1").await;
    let body = json!({
        "data": {
            "type": "auth",
            "id": fixture_uuid(1),
            "attributes": {
                "fullname": "First User",
                "passwordOld": "password",
                "password": "changed",
                "passwordConfirm": "changed",
            }
        }
    });
    let res = send(&app, Method::PATCH, "/api/v1/auth", Some(&token), Some(body)).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["attributes"]["fullname"], "First User");

    let login = json!({ "username": "user1", "password": "changed", "isRemember": 0 });
    let res = send(&app, Method::POST, "/api/v1/auth/token", None, Some(login)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn profile_update_checks_the_old_password() {
    let app = app(1);
    let token = sign_in(&app, "user1").await;
    let body = json!({
        "data": {
            "type": "auth",
            "id": fixture_uuid(1),
            "attributes": { "passwordOld": "wrong-one", "password": "changed", "passwordConfirm": "changed" }
        }
    });
    let res = send(&app, Method::PUT, "/api/v1/auth", Some(&token), Some(body)).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["errors"][0]["detail"], "Old Password is invalid.");
}

#[test]
fn prefers_forwarded_addresses() {
    let mut headers = HeaderMap::new();
    assert_eq!(client_ip(&headers, None), None);
    headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
    assert_eq!(client_ip(&headers, None).as_deref(), Some("10.0.0.7"));
}

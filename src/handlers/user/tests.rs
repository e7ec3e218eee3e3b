use axum::http::{header, Method, StatusCode};
use serde_json::{json, Value};

use crate::app::router;
use crate::testing::http::{get, send};
use crate::testing::{fixture_uuid, memory_state};

fn app(users: i64) -> axum::Router {
    router(memory_state(users))
}

fn user_body(uuid: &str, attributes: Value) -> Value {
    json!({ "data": { "type": "user", "id": uuid, "attributes": attributes } })
}

#[tokio::test]
async fn lists_newest_first_in_pages() {
    let app = app(5);
    let res = get(&app, "/api/v1/user?sort=-createdAt&page[size]=2").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::CONTENT_TYPE], "application/vnd.api+json");

    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], fixture_uuid(5));
    assert_eq!(data[1]["id"], fixture_uuid(4));
    assert_eq!(data[0]["type"], "user");
    assert_eq!(data[0]["links"]["self"], format!("/api/v1/user/{}", fixture_uuid(5)));

    let pagination = &res.body["meta"]["pagination"];
    assert_eq!(pagination["total"], 5);
    assert_eq!(pagination["currentPage"], 1);
    assert_eq!(pagination["totalPages"], 3);
    assert!(res.body["links"]["prev"].is_null());
    assert!(res.body["links"]["next"].as_str().unwrap().contains("page%5Bnumber%5D=2"));
}

#[tokio::test]
async fn filters_by_email() {
    let app = app(5);
    let res = get(&app, "/api/v1/user?filter[email]=user2%40example.com").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(res.body["data"][0]["attributes"]["email"], "user2@example.com");

    let res = get(&app, "/api/v1/user?filter[email]=nobody%40example.com").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["data"].as_array().unwrap().is_empty());
    assert_eq!(res.body["meta"]["pagination"]["total"], 0);
    assert_eq!(res.body["meta"]["pagination"]["totalPages"], 0);
}

#[tokio::test]
async fn rejects_unknown_filter_columns() {
    let res = get(&app(3), "/api/v1/user?filter[badcolumn]=x").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"][0]["detail"], "filter column is invalid");
    assert_eq!(res.body["errors"][0]["source"]["parameter"], "filter");
}

#[tokio::test]
async fn includes_creators() {
    let res = get(&app(3), "/api/v1/user?include=createdBy&sort=createdAt").await;
    assert_eq!(res.status, StatusCode::OK);
    let included = res.body["included"].as_array().unwrap();
    assert_eq!(included.len(), 1);
    assert_eq!(included[0]["id"], fixture_uuid(1));
    assert_eq!(res.body["data"][1]["relationships"]["createdBy"]["data"]["id"], fixture_uuid(1));
}

#[tokio::test]
async fn shows_a_user() {
    let app = app(2);
    let res = get(&app, &format!("/api/v1/user/{}", fixture_uuid(2))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["attributes"]["username"], "user2");
    assert!(res.body["data"]["attributes"].get("password").is_none());

    let res = get(&app, "/api/v1/user/not-a-uuid").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"][0]["detail"], "uuid is invalid format.");

    let res = get(&app, &format!("/api/v1/user/{}", fixture_uuid(9))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"][0]["detail"], "uuid resource is not exists.");
}

#[tokio::test]
async fn creates_a_user() {
    let app = app(1);
    let uuid = fixture_uuid(50);
    let body = user_body(
        &uuid,
        json!({
            "fullname": "Jane Doe",
            "username": "jdoe",
            "phone": "0812345678",
            "password": "secret",
            "passwordConfirm": "secret",
        }),
    );
    let res = send(&app, Method::POST, "/api/v1/user", None, Some(body.clone())).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.headers[header::LOCATION], format!("/api/v1/user/{}", uuid));
    assert_eq!(res.body["data"]["id"], uuid);
    assert_eq!(res.body["data"]["attributes"]["fullname"], "Jane Doe");

    let res = send(&app, Method::POST, "/api/v1/user", None, Some(body)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"][0]["source"]["pointer"], "/data/id");
}

#[tokio::test]
async fn create_reports_attribute_errors() {
    let body = user_body(&fixture_uuid(50), json!({ "username": "user1", "password": "secret" }));
    let res = send(&app(1), Method::POST, "/api/v1/user", None, Some(body)).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let pointers: Vec<&str> = res.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["source"]["pointer"].as_str())
        .collect();
    assert!(pointers.contains(&"/data/attributes/fullname"));
    assert!(pointers.contains(&"/data/attributes/username"));
    assert!(pointers.contains(&"/data/attributes/passwordConfirm"));
}

#[tokio::test]
async fn create_requires_json() {
    let res = send(&app(1), Method::POST, "/api/v1/user", None, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"][0]["title"], "Bad Request");
}

#[tokio::test]
async fn updates_and_deletes_a_user() {
    let app = app(3);
    let uuid = fixture_uuid(2);
    let path = format!("/api/v1/user/{}", uuid);

    let body = user_body(&uuid, json!({ "fullname": "Renamed User", "dateOfBirth": "1985-05-05" }));
    let res = send(&app, Method::PATCH, &path, None, Some(body)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["attributes"]["fullname"], "Renamed User");
    assert_eq!(res.body["data"]["attributes"]["dateOfBirth"], "1985-05-05");
    assert_eq!(res.body["data"]["attributes"]["username"], "user2");

    let other = user_body(&fixture_uuid(3), json!({ "fullname": "Someone Else" }));
    let res = send(&app, Method::PUT, &path, None, Some(other)).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["errors"][0]["detail"], "id resource is invalid.");

    let res = send(&app, Method::DELETE, &path, None, None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_null());

    let res = get(&app, &path).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = get(&app, "/api/v1/user").await;
    assert_eq!(res.body["meta"]["pagination"]["total"], 2);
}

#[tokio::test]
async fn unknown_routes_and_methods() {
    let app = app(1);
    let res = get(&app, "/api/v1/nothing").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["errors"][0]["detail"], "request not found");

    let res = send(&app, Method::DELETE, "/api/v1/user", None, None).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.body["errors"][0]["detail"], "method request not allowed");
    assert_eq!(res.headers[header::ALLOW], "GET,HEAD,OPTIONS,POST,PUT,PATCH,DELETE");
}

//! CORS policy and headers on preflight responses.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/generate")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap()
}

fn get_with_origin(origin: &str) -> Request<Body> {
    Request::builder()
        .uri("/")
        .header(header::ORIGIN, origin)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn wildcard_default_allows_any_origin() {
    let app = TestApp::with_cors(&["*"]);

    let response = app.request(get_with_origin("https://anywhere.example")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn allowed_origin_is_echoed_with_credentials() {
    let app = TestApp::with_cors(&["https://clinic.example"]);

    let response = app.request(get_with_origin("https://clinic.example")).await;

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://clinic.example"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
async fn disallowed_origin_gets_no_allow_origin() {
    let app = TestApp::with_cors(&["https://clinic.example"]);

    let response = app.request(get_with_origin("https://evil.example")).await;

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn preflight_carries_request_id_and_security_headers() {
    for origins in [&["*"][..], &["https://clinic.example"][..]] {
        let app = TestApp::with_cors(origins);

        let response = app.request(preflight("https://clinic.example")).await;

        assert!(response.status().is_success());
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(app.engine.call_count(), 0);
    }
}

#[tokio::test]
async fn preflight_keeps_caller_request_id() {
    let app = TestApp::with_cors(&["*"]);
    let mut request = preflight("https://clinic.example");
    request
        .headers_mut()
        .insert("x-request-id", "req-123".parse().unwrap());

    let response = app.request(request).await;

    assert_eq!(response.headers()["x-request-id"], "req-123");
}

//! Tests for the color endpoint

use super::color::render_color;
use super::router::{build_router, AppState};
use super::DrainState;
use crate::color::{ColorPicker, Palette, Randomness, ScriptedRandom, SystemRandom};
use crate::config::Overrides;
use crate::policy::PolicyEvaluator;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;

fn app(overrides: Overrides, random: Arc<dyn Randomness>) -> Router {
    let picker = ColorPicker::new(Palette::default(), random);
    let evaluator = Arc::new(PolicyEvaluator::new(overrides, picker));
    build_router(AppState::new(evaluator, DrainState::new()), ".")
}

fn seeded() -> Arc<dyn Randomness> {
    Arc::new(SystemRandom::from_seed(5))
}

async fn call(app: Router, method: Method, body: &'static str) -> Response {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri("/color")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_success_response_shape() {
    let response = call(
        app(Overrides::default(), Arc::new(ScriptedRandom::new([4]))),
        Method::POST,
        "",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(body_text(response).await, "\"blue\"");
}

#[tokio::test]
async fn test_any_method_reaches_color() {
    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
        let response = call(app(Overrides::default(), seeded()), method.clone(), "").await;
        assert_eq!(response.status(), StatusCode::OK, "{} /color", method);
    }
}

#[tokio::test]
async fn test_sentinel_body_accepted() {
    let response = call(app(Overrides::default(), seeded()), Method::POST, "\"[]\"").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forced_color_wins_for_every_body() {
    let app = app(Overrides::default().with_color("green"), seeded());

    for body in [
        "",
        "\"[]\"",
        r#"[{"color":"red","delayPercent":0}]"#,
        r#"[{"color":"blue","return500":100}]"#,
    ] {
        let response = call(app.clone(), Method::POST, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "\"green\"", "body {}", body);
    }
}

#[tokio::test]
async fn test_error_rate_100_always_500_with_quoted_color() {
    let app = app(Overrides::default().with_error_rate("100"), seeded());

    for _ in 0..20 {
        let response = call(app.clone(), Method::POST, "").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(response).await;
        let color = text.trim_matches('"');
        assert!(Palette::default().contains(color), "unexpected body {}", text);
    }
}

#[tokio::test]
async fn test_error_rate_0_overrides_return500() {
    let app = app(Overrides::default().with_error_rate("0"), seeded());
    let body = r#"[{"color":"red","return500":100},{"color":"orange","return500":100},
                   {"color":"yellow","return500":100},{"color":"green","return500":100},
                   {"color":"blue","return500":100},{"color":"purple","return500":100}]"#;

    for _ in 0..20 {
        let response = call(app.clone(), Method::POST, body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test(start_paused = true)]
async fn test_red_example_delays_and_fails_only_for_red() {
    let body = r#"[{"color":"red","delayPercent":100,"delayLength":2,"return500":100}]"#;

    // red: color draw, delay roll, failure roll
    let start = Instant::now();
    let red = call(
        app(Overrides::default(), Arc::new(ScriptedRandom::new([0, 50, 50]))),
        Method::POST,
        body,
    )
    .await;
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(red.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(red).await, "\"red\"");

    // yellow: only the color draw
    let start = Instant::now();
    let yellow = call(
        app(Overrides::default(), Arc::new(ScriptedRandom::new([2]))),
        Method::POST,
        body,
    )
    .await;
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(yellow.status(), StatusCode::OK);
    assert_eq!(body_text(yellow).await, "\"yellow\"");
}

#[tokio::test(start_paused = true)]
async fn test_forced_latency_delays_every_response() {
    let app = app(Overrides::default().with_latency("4"), seeded());
    let body = r#"[{"color":"red","delayPercent":100,"delayLength":30}]"#;

    let start = Instant::now();
    let response = call(app, Method::POST, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_secs(4));
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_malformed_body_returns_error_text() {
    let response = call(app(Overrides::default(), seeded()), Method::POST, "[{").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response).await;
    assert!(!text.starts_with('"'), "error body must not be a color: {}", text);
    assert!(!text.is_empty());
}

#[tokio::test]
async fn test_malformed_override_fails_each_request() {
    let app = app(Overrides::default().with_error_rate("lots"), seeded());

    for _ in 0..3 {
        let response = call(app.clone(), Method::POST, "").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("ERROR_RATE"));
    }
}

#[tokio::test]
async fn test_render_empty_color_falls_back_to_palette() {
    let picker = ColorPicker::new(Palette::default(), Arc::new(ScriptedRandom::new([5])));

    let response = render_color("", true, &picker);

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "\"purple\"");
}

#[tokio::test]
async fn test_render_quotes_without_escaping() {
    let picker = ColorPicker::new(Palette::default(), seeded());

    let response = render_color("sky \"blue\"", false, &picker);

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "\"sky \"blue\"\"");
}

#[tokio::test]
async fn test_large_body_is_read_in_full() {
    let record = r#"{"color":"red","delayPercent":100,"delayLength":30,"return500":100}"#;
    let body = format!("[{}]", vec![record; 40_000].join(","));
    assert!(body.len() > 2 * 1024 * 1024, "body must exceed axum's default limit");

    // forced color with no matching record: no draws at all
    let app = app(
        Overrides::default().with_color("green"),
        Arc::new(ScriptedRandom::new(Vec::<usize>::new())),
    );
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/color")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "\"green\"");
}

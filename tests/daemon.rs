use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use archetype_studio::config::{Config, OpenAiConfig};
use archetype_studio::daemon::{build_router, AppState};

const TOKEN: &str = "token";

const SITE: &str = r#"<html><head><title>Harbor Bank</title>
<meta name="description" content="Safe and simple banking for families."></head>
<body><h1>Banking that keeps your family safe</h1>
<p>Trusted, secure accounts with guaranteed protection and community support.</p>
</body></html>"#;

fn chat_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn make_app(server: &MockServer, token: &str) -> (Router, TempDir) {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("studio.db").to_string_lossy().to_string();
    let mut config = Config::convention_defaults(&db_path);
    config.openai = Some(OpenAiConfig {
        api_key: Some("key".to_string()),
        model: Some("gpt-4o-mini".to_string()),
        base_url: Some(server.base_url()),
    });
    let state = AppState::from_config(&config, token).await.unwrap();
    (build_router(state), temp)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"));
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn daemon_health_and_auth() {
    let server = MockServer::start_async().await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/alignment")
                .header("content-type", "application/json")
                .body(Body::from(json!({"keywords": ["safe"]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/alignment")
                .header("x-api-key", TOKEN)
                .header("content-type", "application/json")
                .body(Body::from(json!({"keywords": ["safe"]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn daemon_empty_token_fails_closed() {
    let server = MockServer::start_async().await;
    let (app, _temp) = make_app(&server, "").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .header("authorization", "Bearer ")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn brand_values_drive_alignment() {
    let server = MockServer::start_async().await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let (status, body) = send(
        &app,
        "POST",
        "/brand_values",
        Some(json!({
            "user_id": "u1",
            "mission": "Keep families safe",
            "keywords": "Safe, secure\ntrusted",
            "tone": {"reassuring": 90, "warm": 0.5}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["brand_values"]["tone"]["reassuring"], 0.9);
    assert_eq!(body["report"].as_array().unwrap().len(), 4);
    assert_eq!(body["report"][2]["archetype"], "avoidant");

    let (status, body) = send(&app, "GET", "/brand_values?user_id=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mission"], "Keep families safe");

    let (status, _) = send(&app, "GET", "/brand_values?user_id=u2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "POST", "/alignment", Some(json!({"user_id": "u1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["top"]["archetype"], "avoidant");
    assert_eq!(body["scores"]["avoidant"], 0.3);
    assert_eq!(body["scores"]["autonomous"], 0.0);

    let (status, body) = send(&app, "POST", "/alignment", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("keywords"));

    let (status, _) = send(&app, "POST", "/alignment", Some(json!({"user_id": "nobody"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/brand_values",
        Some(json!({"user_id": "u1", "mission": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_keyword_sets_score_zero() {
    let server = MockServer::start_async().await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let (status, body) = send(&app, "POST", "/alignment", Some(json!({"keywords": []}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keywords"], json!([]));
    assert_eq!(body["top"]["archetype"], "autonomous");
    assert_eq!(body["top"]["score"], 0.0);
    for archetype in ["autonomous", "impulsive", "avoidant", "isolated"] {
        assert_eq!(body["scores"][archetype], 0.0);
    }

    // "Go" is too short to survive keyword extraction.
    let (status, body) = send(
        &app,
        "POST",
        "/brand_values",
        Some(json!({"user_id": "u1", "mission": "Go"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["brand_values"]["keywords"], json!([]));

    let (status, body) = send(&app, "POST", "/alignment", Some(json!({"user_id": "u1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["top"]["archetype"], "autonomous");
    assert_eq!(body["scores"]["impulsive"], 0.0);

    let (status, body) = send(&app, "GET", "/personalize?user_id=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    let ranked = body["ranked"].as_array().unwrap();
    assert_eq!(ranked.len(), 4);
    assert_eq!(ranked[0]["archetype"], "autonomous");
    assert!(ranked.iter().all(|row| row["score"] == 0.0));

    let (status, _) = send(&app, "GET", "/personalize?user_id=nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn icp_round_trip_and_validation() {
    let server = MockServer::start_async().await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let (status, body) = send(
        &app,
        "POST",
        "/icp",
        Some(json!({
            "user_id": "u1",
            "industry": "Fintech",
            "pain_points": "hidden fees, slow support",
            "channels": "Email, LinkedIn"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channels"], json!(["email", "linkedin"]));

    let (status, body) = send(&app, "GET", "/icp?user_id=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pain_points"][0], "hidden fees");

    let (status, _) = send(
        &app,
        "POST",
        "/icp",
        Some(json!({"user_id": "u1", "industry": "Fintech"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analyze_website_stores_keywords_for_personalization() {
    let server = MockServer::start_async().await;
    let site = server
        .mock_async(|when, then| {
            when.method(GET).path("/home");
            then.status(200)
                .header("content-type", "text/html")
                .body(SITE);
        })
        .await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let (status, body) = send(
        &app,
        "POST",
        "/analyze_website",
        Some(json!({"user_id": "u1", "url": server.url("/home")})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"]["title"], "Harbor Bank");
    assert!(body["alignment"]["avoidant"].as_f64().unwrap() > 0.0);

    // Cached on the second call.
    let (status, _) = send(
        &app,
        "POST",
        "/analyze_website",
        Some(json!({"user_id": "u1", "url": server.url("/home")})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    site.assert_calls(1);

    let (status, body) = send(&app, "GET", "/personalize?user_id=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ranked"][0]["archetype"], "avoidant");

    let (status, _) = send(
        &app,
        "POST",
        "/analyze_website",
        Some(json!({"user_id": "u1", "url": "ftp://example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn emotions_report_resonance_per_archetype() {
    let server = MockServer::start_async().await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let (status, body) = send(
        &app,
        "POST",
        "/emotions",
        Some(json!({"text": "Join our community. Simple, safe and trusted."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["emotions"]["belonging"].as_f64().is_some());
    assert_eq!(body["resonance"]["impulsive"], 0.0);
    assert!(body["resonance"]["avoidant"].as_f64().unwrap() > 0.5);
}

#[tokio::test]
async fn generate_content_uses_stored_brand() {
    let server = MockServer::start_async().await;
    let chat = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_includes("Return only the copy");
            then.status(200)
                .json_body(chat_body("Safe, simple banking your family can trust."));
        })
        .await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let (status, _) = send(
        &app,
        "POST",
        "/generate_content",
        Some(json!({"user_id": "u1", "kind": "headline"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(
        &app,
        "POST",
        "/brand_values",
        Some(json!({"user_id": "u1", "mission": "Keep families safe", "keywords": "safe, trusted"})),
    )
    .await;
    let (status, body) = send(
        &app,
        "POST",
        "/generate_content",
        Some(json!({"user_id": "u1", "kind": "headline"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["archetype"], "avoidant");
    assert_eq!(body["text"], "Safe, simple banking your family can trust.");
    chat.assert_calls(1);
}

#[tokio::test]
async fn campaigns_feedback_and_metrics() {
    let server = MockServer::start_async().await;
    let reply = json!({
        "name": "Peace of Mind",
        "assets": [
            {"kind": "headline", "text": "Banking without the worry"},
            {"kind": "email_subject", "text": "Your savings, protected"}
        ]
    })
    .to_string();
    let chat = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_includes("json_object");
            then.status(200).json_body(chat_body(&reply));
        })
        .await;
    let (app, _temp) = make_app(&server, TOKEN).await;

    let brand = json!({"mission": "Keep families safe", "keywords": ["safe", "secure"]});
    let (status, campaign) = send(
        &app,
        "POST",
        "/campaigns",
        Some(json!({
            "user_id": "u1",
            "archetype": "avoidant",
            "brand": brand,
            "kinds": ["headline", "email_subject"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(campaign["name"], "Peace of Mind");
    assert_eq!(campaign["assets"].as_array().unwrap().len(), 2);
    chat.assert_calls(1);
    let id = campaign["id"].as_i64().unwrap();

    let (status, body) = send(&app, "GET", &format!("/campaigns/{id}?user_id=u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["archetype"], "avoidant");

    let (status, _) = send(&app, "GET", &format!("/campaigns/{id}?user_id=u2"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/campaigns/9999?user_id=u1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/campaigns?user_id=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["campaigns"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({"archetype": "avoidant", "rating": 5, "campaign_id": id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ema"], 1.0);

    let (status, body) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({"archetype": "avoidant", "rating": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["ema"].as_f64().unwrap() - 0.7).abs() < 1e-9);

    let (status, _) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({"archetype": "avoidant", "rating": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({"archetype": "avoidant", "rating": 3, "campaign_id": 9999})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"][0]["metric"], "rating");
    assert_eq!(body["metrics"][0]["samples"], 2);
    assert_eq!(body["recent"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn generation_without_api_key_is_a_server_error() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("studio.db").to_string_lossy().to_string();
    let mut config = Config::convention_defaults(&db_path);
    config.openai = None;
    let app = build_router(AppState::from_config(&config, TOKEN).await.unwrap());

    let (status, body) = send(
        &app,
        "POST",
        "/generate_content",
        Some(json!({
            "kind": "tagline",
            "archetype": "impulsive",
            "brand": {"mission": "Ship joy fast"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("openai.api_key"));
}

// tests/sanitization_tests.rs
//
// End-to-end checks that user-supplied markup is cleaned before it is stored.

use bloggit::{
    config::{Config, JwtSettings},
    routes,
    state::AppState,
    store::{PostRepository, Repositories, UserRepository},
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

struct TestApp {
    address: String,
    repos: Repositories,
    client: Client,
    token: String,
}

/// Spawns the app over the in-memory store and logs in a fresh user.
async fn spawn_app() -> TestApp {
    let config = Config {
        database_url: None,
        jwt: JwtSettings {
            secret: "test_secret_for_sanitization_tests_0123456789".to_string(),
            issuer: "bloggit".to_string(),
            audience: "bloggit-clients".to_string(),
            expiration_hours: 24,
            refresh_threshold_hours: 1,
        },
        cookie_secure: false,
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: Vec::new(),
        rust_log: "error".to_string(),
        superadmin: None,
    };

    let repos = Repositories::memory();
    let app = routes::create_router(AppState::new(repos.clone(), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let address = format!("http://127.0.0.1:{}", port);
    let client = Client::new();

    // 1. Register
    let response = client
        .post(format!("{}/api/v1/auth/register", address))
        .json(&json!({
            "email": "writer@example.com",
            "username": "writer",
            "password": "Secret#123",
            "first_name": "<b>Ada</b><script>alert(1)</script>"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    // 2. Login
    let body: Value = client
        .post(format!("{}/api/v1/auth/login", address))
        .json(&json!({ "email_or_username": "writer", "password": "Secret#123" }))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    let token = body["token"].as_str().expect("token in login response").to_string();

    TestApp {
        address,
        repos,
        client,
        token,
    }
}

impl TestApp {
    async fn create_post(&self, title: &str, content: &str) -> Value {
        let response = self
            .client
            .post(format!("{}/api/v1/posts", self.address))
            .bearer_auth(&self.token)
            .json(&json!({ "title": title, "content": content }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn script_and_iframe_are_removed_from_posts() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let post = app
        .create_post(
            "<script>alert('XSS')</script>Hello",
            "<p>Safe</p><iframe src=\"https://evil.com\"></iframe>",
        )
        .await;

    // Assert
    assert_eq!(post["title"], "Hello");
    assert_eq!(post["content"], "<p>Safe</p>");

    let stored = app
        .repos
        .posts
        .find(post["id"].as_i64().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Hello");
    assert_eq!(stored.content, "<p>Safe</p>");
}

#[tokio::test]
async fn event_handlers_are_stripped_from_allowed_tags() {
    let app = spawn_app().await;

    let post = app
        .create_post("Title", "<div onclick=\"steal()\">Safe</div>")
        .await;

    assert_eq!(post["content"], "<div>Safe</div>");
}

#[tokio::test]
async fn plain_text_is_stored_verbatim() {
    let app = spawn_app().await;
    let content = "Tom & Jerry say 2 > 1 and &lt;b&gt; is not bold";

    let post = app.create_post("Just text", content).await;

    assert_eq!(post["title"], "Just text");
    assert_eq!(post["content"], content);
}

#[tokio::test]
async fn a_title_that_is_only_markup_fails_validation() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/v1/posts", app.address))
        .bearer_auth(&app.token)
        .json(&json!({ "title": "<script>x()</script>", "content": "body" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_updates_are_sanitized() {
    let app = spawn_app().await;
    let post = app.create_post("Title", "Body").await;
    let id = post["id"].as_i64().unwrap();

    let response = app
        .client
        .put(format!("{}/api/v1/posts/{}", app.address, id))
        .bearer_auth(&app.token)
        .json(&json!({ "content": "<a href=\"javascript:alert(1)\">Click</a>" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let stored = app.repos.posts.find(id).await.unwrap().unwrap();
    assert!(!stored.content.contains("javascript:"));
    assert!(stored.content.contains("Click"));
}

#[tokio::test]
async fn comments_are_sanitized() {
    let app = spawn_app().await;
    let post = app.create_post("Title", "Body").await;
    let id = post["id"].as_i64().unwrap();

    let response = app
        .client
        .post(format!("{}/api/v1/posts/{}/comments", app.address, id))
        .bearer_auth(&app.token)
        .json(&json!({ "content": "Nice<style>body{display:none}</style>!" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let comment: Value = response.json().await.unwrap();
    assert_eq!(comment["content"], "Nice!");
}

#[tokio::test]
async fn registration_fields_are_sanitized() {
    let app = spawn_app().await;

    let user = app
        .repos
        .users
        .find_by_username("writer")
        .await
        .unwrap()
        .unwrap();

    // <b> is not on the allowlist, so it is unwrapped
    assert_eq!(user.first_name, "Ada");
}

#[tokio::test]
async fn profile_updates_are_sanitized() {
    let app = spawn_app().await;

    let response = app
        .client
        .put(format!("{}/api/v1/auth/profile", app.address))
        .bearer_auth(&app.token)
        .json(&json!({
            "first_name": "Ada<iframe src=\"https://evil.com\"></iframe>",
            "last_name": "<em>Lovelace</em>"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["first_name"], "Ada");
    assert_eq!(body["last_name"], "<em>Lovelace</em>");
}

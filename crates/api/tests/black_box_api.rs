use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use sesame_auth::{Role, SessionClaims};
use sesame_core::IdentityId;
use sesame_infra::{AuthConfig, InMemoryOutbox};

const JWT_SECRET: &str = "test-secret";
const ADMIN_EMAIL: &str = "root@example.com";
const ADMIN_PASSWORD: &str = "RootPass1";

struct TestServer {
    base_url: String,
    outbox: Arc<InMemoryOutbox>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        sesame_observability::tracing::init_for_tests();

        let vars: HashMap<&str, &str> = HashMap::from([
            ("JWT_SECRET", JWT_SECRET),
            ("BCRYPT_COST", "4"),
            ("FRONTEND_URL", "https://app.example.com"),
            ("SEED_ADMIN_EMAIL", ADMIN_EMAIL),
            ("SEED_ADMIN_USERNAME", "root"),
            ("SEED_ADMIN_PASSWORD", ADMIN_PASSWORD),
        ]);
        let config = AuthConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
            .expect("test config");

        let outbox = Arc::new(InMemoryOutbox::new("no-reply@example.com"));
        let state = sesame_api::app::build_state(&config, outbox.clone())
            .await
            .expect("app state");
        // Same router as prod, bound to an ephemeral port.
        let app = sesame_api::app::build_app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            outbox,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, who: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "emailOrUsername": who, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn token_for(&self, who: &str, password: &str) -> String {
        let res = self.login(who, password).await;
        assert_eq!(res.status(), StatusCode::OK, "login as {who}");
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    async fn create_role(&self, token: &str, name: &str) -> reqwest::Response {
        self.client
            .post(self.url("/roles"))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await
            .unwrap()
    }

    async fn register_alice(&self, token: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .bearer_auth(token)
            .json(&json!({
                "email": "alice@example.com",
                "username": "alice",
                "password": "Secret123",
                "firstname": "Alice",
                "roles": ["editor"],
            }))
            .send()
            .await
            .unwrap()
    }

    async fn request_reset(&self, email: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url("/auth/request-password-reset"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url("/auth/reset-password"))
            .json(&json!({ "token": token, "newPassword": new_password }))
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    fn last_reset_token(&self) -> String {
        let mail = self.outbox.sent().pop().expect("reset mail");
        let (_, rest) = mail.html_body.split_once("token=").unwrap();
        rest.chars().take_while(|c| c.is_ascii_hexdigit()).collect()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, roles: Vec<Role>, issued: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = SessionClaims {
        sub: IdentityId::new(),
        email: "ghost@example.com".to_string(),
        roles,
        iat: issued.timestamp(),
        exp: (issued + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Admin creates `editor`, registers alice with it, returns alice's token.
async fn alice_session(srv: &TestServer) -> String {
    let admin = srv.admin_token().await;
    assert_eq!(srv.create_role(&admin, "editor").await.status(), StatusCode::CREATED);
    assert_eq!(srv.register_alice(&admin).await.status(), StatusCode::CREATED);
    srv.token_for("alice@example.com", "Secret123").await
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    for path in ["/auth/me", "/roles"] {
        let res = srv.client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn alice_logs_in_and_reads_her_profile() {
    let srv = TestServer::spawn().await;
    let token = alice_session(&srv).await;

    let res = srv
        .client
        .get(srv.url("/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["firstname"], "Alice");
    assert_eq!(body["user"]["roles"], json!(["editor"]));
    assert!(body["user"].get("password_hash").is_none());

    // The token itself carries the same identity and roles.
    let mut validation = jsonwebtoken::Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let decoded = jsonwebtoken::decode::<SessionClaims>(
        &token,
        &jsonwebtoken::DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &validation,
    )
    .unwrap();
    assert_eq!(decoded.claims.sub.to_string(), body["user"]["id"].as_str().unwrap());
    assert_eq!(decoded.claims.roles, vec![Role::new("editor")]);
    assert_eq!(decoded.claims.exp - decoded.claims.iat, 2 * 60 * 60);
}

#[tokio::test]
async fn missing_role_is_forbidden_not_unauthorized() {
    let srv = TestServer::spawn().await;
    let alice = alice_session(&srv).await;

    let res = srv
        .client
        .get(srv.url("/roles"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.register_alice(&alice).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hostile_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    let now = Utc::now();

    let expired = mint_jwt(
        JWT_SECRET,
        vec![Role::new("backoffice")],
        now - ChronoDuration::hours(3),
        ChronoDuration::hours(2),
    );
    let foreign = mint_jwt(
        "some-other-secret",
        vec![Role::new("backoffice")],
        now,
        ChronoDuration::hours(2),
    );

    // Flip one character in the payload segment.
    let mut parts: Vec<String> = admin.split('.').map(str::to_string).collect();
    let flipped = if parts[1].ends_with('A') { 'B' } else { 'A' };
    parts[1].pop();
    parts[1].push(flipped);
    let tampered = parts.join(".");

    for token in [expired, foreign, tampered, "not-a-jwt".to_string()] {
        let res = srv
            .client
            .get(srv.url("/roles"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    // A correctly signed, unexpired token is honoured without any lookup.
    let forged_ok = mint_jwt(JWT_SECRET, vec![Role::new("backoffice")], now, ChronoDuration::hours(2));
    let res = srv
        .client
        .get(srv.url("/roles"))
        .bearer_auth(&forged_ok)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_and_unknown_login_look_identical() {
    let srv = TestServer::spawn().await;
    alice_session(&srv).await;

    let wrong = srv.login("alice", "Wrong-password").await;
    let wrong_status = wrong.status();
    let wrong_body: Value = wrong.json().await.unwrap();

    let unknown = srv.login("mallory", "Secret123").await;
    let unknown_status = unknown.status();
    let unknown_body: Value = unknown.json().await.unwrap();

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);

    for odd in [String::new(), "x".repeat(100)] {
        let res = srv.login("alice", &odd).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, wrong_body);
    }
}

#[tokio::test]
async fn reset_flow_is_single_use_and_non_enumerating() {
    let srv = TestServer::spawn().await;
    alice_session(&srv).await;

    let known = srv.request_reset("alice@example.com").await;
    let unknown = srv.request_reset("nobody@example.com").await;
    assert_eq!(known.0, StatusCode::OK);
    assert_eq!(known, unknown);
    assert_eq!(srv.outbox.sent().len(), 1);

    let token = srv.last_reset_token();
    let (status, _) = srv.reset_password(&token, "NewSecret456").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = srv.reset_password(&token, "Another789").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_or_expired_token");

    assert_eq!(srv.login("alice", "Secret123").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(srv.login("alice", "NewSecret456").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_reset_token_is_rejected_generically() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.reset_password(&"ab".repeat(32), "NewSecret456").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_or_expired_token");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    srv.create_role(&admin, "editor").await;
    assert_eq!(srv.register_alice(&admin).await.status(), StatusCode::CREATED);

    let res = srv.register_alice(&admin).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_field");
    assert_eq!(body["field"], "email");

    let res = srv.create_role(&admin, "editor").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "emailOrUsername": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["field"], "password");
}

#[tokio::test]
async fn role_admin_crud() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let res = srv.create_role(&admin, "editor").await;
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .put(srv.url(&format!("/roles/{id}")))
        .bearer_auth(&admin)
        .json(&json!({ "description": "Edits content" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["name"], "editor");
    assert_eq!(updated["description"], "Edits content");

    let res = srv
        .client
        .delete(srv.url(&format!("/roles/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = srv
        .client
        .get(srv.url(&format!("/roles/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .client
        .get(srv.url("/roles/not-a-uuid"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deactivated_user_cannot_log_in() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    srv.create_role(&admin, "editor").await;
    let res = srv.register_alice(&admin).await;
    let body: Value = res.json().await.unwrap();
    let id = body["user"]["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .delete(srv.url(&format!("/auth/users/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    assert_eq!(srv.login("alice", "Secret123").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_is_acknowledged() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let res = srv
        .client
        .post(srv.url("/auth/logout"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Stateless tokens survive logout until they expire.
    let res = srv
        .client
        .get(srv.url("/auth/me"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

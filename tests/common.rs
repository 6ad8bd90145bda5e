use eventdesk_backend::{
    api::router::create_router,
    state::AppState,
    config::Config,
    infra::factory::sqlite_state,
};
use sqlx::{sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions}, Pool, Sqlite};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;
use axum::{
    body::Body,
    http::{Request, header},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use std::str::FromStr;
use tower::ServiceExt;
use serde_json::{json, Value};

pub const PASSWORD: &str = "correct-horse-battery";
/// Listed in the test config, so this signup starts out as a support agent.
#[allow(dead_code)]
pub const SUPPORT_LEAD_EMAIL: &str = "support-lead@example.com";

pub struct AuthHeaders {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    support_lead: OnceCell<AuthHeaders>,
}

fn cookie_value(cookies: &[String], name: &str) -> String {
    let prefix = format!("{}=", name);
    let cookie = cookies.iter()
        .find(|c| c.starts_with(&prefix))
        .unwrap_or_else(|| panic!("No {} cookie returned", name));
    let start = prefix.len();
    let end = cookie[start..].find(';').unwrap_or(cookie.len() - start);
    cookie[start..start + end].to_string()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|h| h.to_str().unwrap().to_string())
        .collect()
}

pub async fn parse_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn event_payload(title: &str, capacity: i32, days_ahead: i64) -> Value {
    json!({
        "title": title,
        "description": "An evening of talks",
        "date": (Utc::now() + Duration::days(days_ahead)).to_rfc3339(),
        "location": "Main Hall",
        "capacity": capacity,
        "category": "Technology",
        "price": 25.0
    })
}

impl TestApp {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let priv_key_pem = include_str!("../tests/keys/test_private.pem");
        let pub_key_pem = include_str!("../tests/keys/test_public.pem");

        let config = Config {
            database_url: db_url.clone(),
            port: 0,
            jwt_secret_key: priv_key_pem.to_string(),
            jwt_public_key: pub_key_pem.to_string(),
            auth_issuer: "test-issuer".to_string(),
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            cookie_secure: false,
            support_agent_emails: vec![SUPPORT_LEAD_EMAIL.to_string()],
        };

        let state = Arc::new(sqlite_state(&config, pool.clone()).expect("Failed to build state"));
        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
            support_lead: OnceCell::new(),
        }
    }

    /// Sends a JSON request, attaching cookies and the CSRF header when `auth` is given.
    pub async fn request(&self, method: &str, uri: &str, auth: Option<&AuthHeaders>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(auth) = auth {
            builder = builder
                .header(header::COOKIE, format!("access_token={}", auth.access_token))
                .header("X-CSRF-Token", &auth.csrf_token);
        }

        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    pub async fn signup(&self, name: &str, email: &str, role: &str) -> Value {
        let response = self.request("POST", "/api/auth/signup", None, Some(json!({
            "name": name,
            "email": email,
            "password": PASSWORD,
            "role": role
        }))).await;

        if !response.status().is_success() {
            panic!("Signup failed in test helper: status {}", response.status());
        }
        parse_body(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthHeaders {
        let response = self.request("POST", "/api/auth/login", None, Some(json!({
            "email": email,
            "password": password
        }))).await;

        if !response.status().is_success() {
            panic!("Login failed in test helper: status {}", response.status());
        }

        let cookies = set_cookies(&response);
        let access_token = cookie_value(&cookies, "access_token");
        let refresh_token = cookie_value(&cookies, "refresh_token");

        let body_json = parse_body(response).await;
        let csrf_token = body_json["csrf_token"].as_str().expect("No csrf_token in body").to_string();
        let user_id = body_json["user"]["id"].as_str().expect("No user id in body").to_string();

        AuthHeaders {
            user_id,
            access_token,
            refresh_token,
            csrf_token,
        }
    }

    pub async fn user(&self, name: &str, role: &str) -> AuthHeaders {
        let email = format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4());
        self.signup(name, &email, role).await;
        self.login(&email, PASSWORD).await
    }

    /// The configured support agent, signed up on first use.
    #[allow(dead_code)]
    pub async fn support_lead(&self) -> &AuthHeaders {
        self.support_lead
            .get_or_init(|| async {
                self.signup("Support Lead", SUPPORT_LEAD_EMAIL, "attendee").await;
                self.login(SUPPORT_LEAD_EMAIL, PASSWORD).await
            })
            .await
    }

    /// Signs up a customer, has the support lead promote them, then logs in
    /// so the new token carries the agent role.
    #[allow(dead_code)]
    pub async fn agent(&self, name: &str) -> AuthHeaders {
        let email = format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4());
        let body = self.signup(name, &email, "attendee").await;
        let user_id = body["user"]["id"].as_str().unwrap().to_string();

        let lead = self.support_lead().await;
        let response = self.request(
            "PUT",
            &format!("/api/users/{}/support-role", user_id),
            Some(lead),
            Some(json!({ "support_role": "agent" })),
        ).await;
        assert!(response.status().is_success(), "promotion failed: {}", response.status());

        self.login(&email, PASSWORD).await
    }

    #[allow(dead_code)]
    pub async fn create_event(&self, auth: &AuthHeaders, payload: Value) -> Value {
        let response = self.request("POST", "/api/events", Some(auth), Some(payload)).await;
        assert!(response.status().is_success(), "create event failed: {}", response.status());
        parse_body(response).await
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    #[allow(dead_code)]
    pub async fn spawn_server(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}

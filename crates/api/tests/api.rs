use std::{path::Path, sync::Arc, time::Duration};

use axum::{
  body::Body,
  http::{header, Method, Request, StatusCode},
  Router,
};
use chrono::{Days, Utc};
use http_body_util::BodyExt;
use imara_api::{
  chain::ContractCall,
  config::{ChainSettings, GithubSettings, SettlementSettings, Settings},
  entities::payment::PaymentStatus,
  service::mutation,
  state::AppState,
  MIGRATOR,
};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
  router: Router,
  pool: Arc<SqlitePool>,
  _uploads: TempDir,
}

fn settings(upload_dir: &Path) -> Settings {
  Settings {
    log_level: "debug".to_string(),
    database_url: "sqlite::memory:".to_string(),
    host: "127.0.0.1".to_string(),
    port: 0,
    cors_origin: "http://localhost:3000".to_string(),
    jwt_secret: "integration-secret".to_string(),
    jwt_maxage: 60,
    upload_dir: upload_dir.to_path_buf(),
    typing_ttl: Duration::from_secs(3),
    permit_ttl_secs: 3600,
    settlement: SettlementSettings {
      num_workers: 1,
      interval: Duration::from_secs(1),
      max_attempts: 3,
    },
    swypt: None,
    chain: None,
    email: None,
    github: GithubSettings::default(),
  }
}

impl TestApp {
  async fn new() -> Self {
    Self::with_settings(|_| {}).await
  }

  async fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .unwrap();
    MIGRATOR.run(&pool).await.unwrap();

    let pool = Arc::new(pool);
    let uploads = tempfile::tempdir().unwrap();
    let mut settings = settings(uploads.path());
    configure(&mut settings);
    let state = AppState::new(pool.clone(), settings, CancellationToken::new()).unwrap();

    Self {
      router: imara_api::router(state).unwrap(),
      pool,
      _uploads: uploads,
    }
  }

  async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
    let response = self.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let body = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    (status, body)
  }

  async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    self.request(request).await
  }

  /// Registers a user and returns its id with a bearer token.
  async fn sign_up(&self, username: &str) -> (Uuid, String) {
    let (status, user) = self
      .send(
        Method::POST,
        "/api/users",
        None,
        Some(json!({
          "username": username,
          "email": format!("{username}@example.com"),
          "password": "correct horse battery",
        })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");

    let (status, login) = self
      .send(
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({ "username": username, "password": "correct horse battery" })),
      )
      .await;
    assert_eq!(status, StatusCode::OK, "{login}");

    let id = user["id"].as_str().unwrap().parse().unwrap();
    (id, login["token"].as_str().unwrap().to_string())
  }

  async fn create_idea(&self, token: &str, resources: Value) -> Uuid {
    let (status, idea) = self
      .send(
        Method::POST,
        "/api/ideas",
        Some(token),
        Some(json!({
          "title": "Solar kiosks",
          "problem_statement": "Rural shops lack power",
          "solution": "Pay-as-you-go solar kiosks",
          "resources": resources,
        })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{idea}");

    idea["id"].as_str().unwrap().parse().unwrap()
  }

  /// Records an M-Pesa order that the aggregator already confirmed.
  async fn paid_order(&self, order_id: &str, user_id: Uuid, idea_id: Uuid) {
    mutation::payments::create(
      &self.pool,
      mutation::payments::CreateOrderParams {
        order_id: order_id.to_string(),
        user_id,
        idea_id: Some(idea_id),
        phone: "254712345678".to_string(),
        amount: 500,
        message: None,
      },
    )
    .await
    .unwrap();

    mutation::payments::finish(&self.pool, order_id, PaymentStatus::Success, Some("0xfeed"), "paid")
      .await
      .unwrap();
  }

  async fn upload_cv(&self, token: &str, content: &str) -> (StatusCode, Value) {
    let body = format!(
      "--BOUNDARY\r\n\
      Content-Disposition: form-data; name=\"file\"; filename=\"cv.txt\"\r\n\
      Content-Type: text/plain\r\n\r\n\
      {content}\r\n\
      --BOUNDARY--\r\n"
    );
    let request = Request::builder()
      .method(Method::POST)
      .uri("/api/users/me/cv")
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
      .body(Body::from(body))
      .unwrap();

    self.request(request).await
  }

  /// Uploads a CV and records a qualifying verification for `role`.
  async fn verify(&self, token: &str, idea_id: Uuid, role: &str) {
    let (status, user) = self.upload_cv(token, "Shipped firmware and field pilots").await;
    assert_eq!(status, StatusCode::OK, "{user}");

    let (status, verification) = self
      .send(
        Method::POST,
        &format!("/api/ideas/{idea_id}/verification"),
        Some(token),
        Some(json!({ "role": role })),
      )
      .await;
    assert_eq!(status, StatusCode::OK, "{verification}");
    assert_eq!(verification["qualified"], true);
  }

  /// Verifies, pays and joins; returns the pending contributor's id.
  async fn join_pending(&self, token: &str, user_id: Uuid, idea_id: Uuid, role: &str, order_id: &str) -> String {
    self.verify(token, idea_id, role).await;
    self.paid_order(order_id, user_id, idea_id).await;

    let (status, joined) = self
      .send(
        Method::POST,
        &format!("/api/ideas/{idea_id}/contributors"),
        Some(token),
        Some(mpesa_join(role, order_id)),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{joined}");
    assert_eq!(joined["contributor"]["status"], "pending");

    joined["contributor"]["id"].as_str().unwrap().to_string()
  }
}

fn mpesa_join(role: &str, order_id: &str) -> Value {
  json!({
    "role": role,
    "stake": { "method": "mpesa", "reference": order_id, "amount": "500", "token": "KES" },
  })
}

#[tokio::test]
async fn test_register_login_and_profile() {
  let app = TestApp::new().await;

  let (status, _) = app.send(Method::GET, "/api/users/me", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (_, token) = app.sign_up("wanjiku").await;

  let (status, me) = app.send(Method::GET, "/api/users/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["username"], "wanjiku");

  let (status, _) = app
    .send(
      Method::POST,
      "/api/users/login",
      None,
      Some(json!({ "username": "wanjiku", "password": "wrong password" })),
    )
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = app
    .send(
      Method::PUT,
      "/api/users/me",
      Some(&token),
      Some(json!({ "wallet_address": "0x1234" })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, me) = app
    .send(
      Method::PUT,
      "/api/users/me",
      Some(&token),
      Some(json!({ "github": "https://github.com/wanjiku" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["github"], "https://github.com/wanjiku");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
  let app = TestApp::new().await;
  app.sign_up("otieno").await;

  let (status, body) = app
    .send(
      Method::POST,
      "/api/users",
      None,
      Some(json!({
        "username": "otieno",
        "email": "otieno@example.com",
        "password": "correct horse battery",
      })),
    )
    .await;

  assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn test_cv_upload_is_served_back() {
  let app = TestApp::new().await;
  let (_, token) = app.sign_up("achieng").await;

  let body = "--BOUNDARY\r\n\
    Content-Disposition: form-data; name=\"file\"; filename=\"my cv.pdf\"\r\n\
    Content-Type: application/pdf\r\n\r\n\
    %PDF-1.4 resume\r\n\
    --BOUNDARY--\r\n";
  let request = Request::builder()
    .method(Method::POST)
    .uri("/api/users/me/cv")
    .header(header::AUTHORIZATION, format!("Bearer {token}"))
    .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
    .body(Body::from(body))
    .unwrap();

  let (status, user) = app.request(request).await;
  assert_eq!(status, StatusCode::OK, "{user}");

  let cv_url = user["cv_url"].as_str().unwrap().to_string();
  assert!(cv_url.starts_with("/uploads/"));

  let (status, file) = app.send(Method::GET, &cv_url, None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(file, Value::String("%PDF-1.4 resume".to_string()));
}

#[tokio::test]
async fn test_idea_rejects_zero_count_roles() {
  let app = TestApp::new().await;
  let (_, token) = app.sign_up("founder").await;

  let (status, _) = app
    .send(
      Method::POST,
      "/api/ideas",
      Some(&token),
      Some(json!({
        "title": "Solar kiosks",
        "problem_statement": "Rural shops lack power",
        "solution": "Pay-as-you-go solar kiosks",
        "resources": [{ "role": "Builder", "count": 0 }],
      })),
    )
    .await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_role_rejects_second_contributor() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let (alice_id, alice) = app.sign_up("alice").await;
  let (bob_id, bob) = app.sign_up("bobby").await;

  let idea_id = app
    .create_idea(&founder, json!([{ "role": "Builder", "count": "1", "description": "Firmware" }]))
    .await;

  app.paid_order("ord-alice", alice_id, idea_id).await;
  app.paid_order("ord-bob", bob_id, idea_id).await;
  app.verify(&alice, idea_id, "Builder").await;
  app.verify(&bob, idea_id, "Builder").await;

  let uri = format!("/api/ideas/{idea_id}/contributors");
  let (status, joined) = app
    .send(Method::POST, &uri, Some(&alice), Some(mpesa_join("Builder", "ord-alice")))
    .await;
  assert_eq!(status, StatusCode::CREATED, "{joined}");
  assert_eq!(joined["contributor"]["status"], "pending");
  assert_eq!(joined["contributor"]["stake_status"], "staked");
  assert_eq!(joined["stake"]["status"], "attached");

  // Pending contributors don't take the slot yet.
  let availability_uri = format!("/api/ideas/{idea_id}/availability");
  let (_, availability) = app.send(Method::GET, &availability_uri, None, None).await;
  assert_eq!(availability["roles"][0]["available"], true);

  let contributor_id = joined["contributor"]["id"].as_str().unwrap();
  let (status, _) = app
    .send(
      Method::PATCH,
      &format!("{uri}/{contributor_id}"),
      Some(&alice),
      Some(json!({ "status": "approved" })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, approved) = app
    .send(
      Method::PATCH,
      &format!("{uri}/{contributor_id}"),
      Some(&founder),
      Some(json!({ "status": "approved" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{approved}");
  assert_eq!(approved["status"], "approved");

  let (_, details) = app.send(Method::GET, &format!("/api/ideas/{idea_id}"), None, None).await;
  assert_eq!(details["title"], "Solar kiosks");
  assert_eq!(details["availability"]["roles"][0]["role"], "Builder");
  assert_eq!(details["availability"]["roles"][0]["filled"], 1);
  assert_eq!(details["availability"]["roles"][0]["available"], false);
  assert_eq!(details["availability"]["team_full"], true);

  let (status, body) = app
    .send(Method::POST, &uri, Some(&bob), Some(mpesa_join("Builder", "ord-bob")))
    .await;
  assert_eq!(status, StatusCode::CONFLICT, "{body}");

  let stake_status: String = sqlx::query_scalar("SELECT status FROM stakes WHERE reference = 'ord-bob'")
    .fetch_one(&*app.pool)
    .await
    .unwrap();
  assert_eq!(stake_status, "unclaimed");

  let (_, contributors) = app.send(Method::GET, &uri, Some(&founder), None).await;
  assert_eq!(contributors.as_array().unwrap().len(), 1);

  let (_, messages) = app
    .send(Method::GET, &format!("/api/projects/{idea_id}/chat/messages"), Some(&founder), None)
    .await;
  let system = &messages.as_array().unwrap()[0];
  assert_eq!(system["message"], "alice joined as Builder");
  assert_eq!(system["is_system_message"], true);
}

#[tokio::test]
async fn test_join_rejects_unpaid_and_foreign_orders() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let (alice_id, alice) = app.sign_up("alice").await;
  let (_, bob) = app.sign_up("bobby").await;

  let idea_id = app.create_idea(&founder, json!([{ "role": "Designer", "count": 2 }])).await;
  app.paid_order("ord-alice", alice_id, idea_id).await;
  app.verify(&bob, idea_id, "Designer").await;

  let uri = format!("/api/ideas/{idea_id}/contributors");

  let (status, _) = app
    .send(Method::POST, &uri, Some(&bob), Some(mpesa_join("Designer", "ord-alice")))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = app
    .send(Method::POST, &uri, Some(&bob), Some(mpesa_join("Designer", "ord-missing")))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = app
    .send(Method::POST, &uri, Some(&alice), Some(mpesa_join("Marketer", "ord-alice")))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let crypto = json!({
    "role": "Designer",
    "stake": { "method": "crypto", "reference": "not-a-hash", "amount": "10", "token": "USDC" },
  });
  let (status, _) = app.send(Method::POST, &uri, Some(&bob), Some(crypto)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_progress_follows_task_completion() {
  let app = TestApp::new().await;
  let (_, token) = app.sign_up("founder").await;
  let idea_id = app.create_idea(&token, json!([{ "role": "Builder", "count": 1 }])).await;

  let progress_uri = format!("/api/projects/{idea_id}/progress");
  let (status, progress) = app.send(Method::GET, &progress_uri, Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(progress["percentage"], 0);
  assert_eq!(progress["next_milestone"], Value::Null);

  let today = Utc::now().date_naive();
  let mut task_ids = vec![];
  let mut milestone_ids = vec![];
  for (title, days) in [("Prototype", 10), ("Pilot", 20)] {
    let (status, milestone) = app
      .send(
        Method::POST,
        "/api/milestones",
        Some(&token),
        Some(json!({
          "project_id": idea_id,
          "title": title,
          "due_date": today.checked_add_days(Days::new(days)).unwrap(),
        })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{milestone}");
    let milestone_id = milestone["id"].as_str().unwrap().to_string();

    let (status, task) = app
      .send(
        Method::POST,
        &format!("/api/milestones/{milestone_id}/tasks"),
        Some(&token),
        Some(json!({ "title": format!("{title} task") })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    assert_eq!(task["status"], "pending");

    milestone_ids.push(milestone_id);
    task_ids.push(task["id"].as_str().unwrap().to_string());
  }

  let (status, _) = app
    .send(
      Method::PUT,
      &format!("/api/tasks/{}", task_ids[0]),
      Some(&token),
      Some(json!({ "status": "done" })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, task) = app
    .send(
      Method::PUT,
      &format!("/api/tasks/{}", task_ids[0]),
      Some(&token),
      Some(json!({ "status": "completed" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(task["status"], "completed");

  let (_, progress) = app.send(Method::GET, &progress_uri, Some(&token), None).await;
  assert_eq!(progress["percentage"], 50);
  assert_eq!(progress["next_milestone"]["id"], milestone_ids[0].as_str());

  let (_, milestones) = app
    .send(Method::GET, &format!("/api/projects/{idea_id}/milestones"), Some(&token), None)
    .await;
  assert_eq!(milestones[0]["title"], "Prototype");
  assert_eq!(milestones[0]["tasks"][0]["status"], "completed");

  let (status, _) = app
    .send(Method::GET, &format!("/api/projects/{}/progress", Uuid::new_v4()), Some(&token), None)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_timeline_is_null_until_created() {
  let app = TestApp::new().await;
  let (_, token) = app.sign_up("founder").await;
  let idea_id = app.create_idea(&token, json!([{ "role": "Builder", "count": 1 }])).await;

  let uri = format!("/api/projects/{idea_id}/timeline");
  let (status, timeline) = app.send(Method::GET, &uri, Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(timeline, Value::Null);

  let (status, created) = app
    .send(
      Method::POST,
      "/api/timeline",
      Some(&token),
      Some(json!({
        "project_id": idea_id,
        "start_date": "2025-07-01",
        "end_date": "2025-12-31",
        "description": "Build and pilot",
      })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{created}");

  let (_, timeline) = app.send(Method::GET, &uri, Some(&token), None).await;
  assert_eq!(timeline["id"], created["id"]);
  assert_eq!(timeline["description"], "Build and pilot");
}

#[tokio::test]
async fn test_typing_excludes_caller() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let (_, alice) = app.sign_up("alice").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Builder", "count": 1 }])).await;

  let uri = format!("/api/projects/{idea_id}/chat/typing");
  let (status, _) = app.send(Method::POST, &uri, Some(&alice), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, typing) = app.send(Method::GET, &uri, Some(&founder), None).await;
  assert_eq!(typing, json!(["alice"]));

  let (_, typing) = app.send(Method::GET, &uri, Some(&alice), None).await;
  assert_eq!(typing, json!([]));
}

#[tokio::test]
async fn test_payments_need_configured_aggregator() {
  let app = TestApp::new().await;
  let (_, token) = app.sign_up("alice").await;

  let (status, body) = app
    .send(
      Method::POST,
      "/api/mpesa/initiate",
      Some(&token),
      Some(json!({ "phone": "0712345678", "amount": 100 })),
    )
    .await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");

  let (status, _) = app.send(Method::GET, "/api/swypt/supported-assets", Some(&token), None).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_join_requires_verification() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let (alice_id, alice) = app.sign_up("alice").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Builder", "count": 2 }])).await;
  app.paid_order("ord-alice", alice_id, idea_id).await;

  let uri = format!("/api/ideas/{idea_id}/contributors");
  let verification_uri = format!("/api/ideas/{idea_id}/verification");

  let (status, body) = app
    .send(Method::POST, &uri, Some(&alice), Some(mpesa_join("Builder", "ord-alice")))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

  let (status, _) = app.send(Method::GET, &verification_uri, Some(&alice), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  // Nothing to check yet.
  let (status, _) = app
    .send(Method::POST, &verification_uri, Some(&alice), Some(json!({ "role": "Builder" })))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = app
    .send(Method::POST, &verification_uri, Some(&alice), Some(json!({ "role": "Marketer" })))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);

  app.verify(&alice, idea_id, "Builder").await;

  let (status, verification) = app.send(Method::GET, &verification_uri, Some(&alice), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(verification["role"], "Builder");
  assert_eq!(verification["cv_checked"], true);

  let (status, joined) = app
    .send(Method::POST, &uri, Some(&alice), Some(mpesa_join("Builder", "ord-alice")))
    .await;
  assert_eq!(status, StatusCode::CREATED, "{joined}");
}

#[tokio::test]
async fn test_verification_is_per_role() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let (alice_id, alice) = app.sign_up("alice").await;
  let idea_id = app
    .create_idea(
      &founder,
      json!([{ "role": "Frontend Developer", "count": 1 }, { "role": "Builder", "count": 1 }]),
    )
    .await;
  app.paid_order("ord-alice", alice_id, idea_id).await;

  let (status, _) = app.upload_cv(&alice, "React and CSS, some HTML").await;
  assert_eq!(status, StatusCode::OK);

  let (status, verification) = app
    .send(
      Method::POST,
      &format!("/api/ideas/{idea_id}/verification"),
      Some(&alice),
      Some(json!({ "role": "Frontend Developer" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{verification}");
  assert_eq!(verification["qualified"], false);
  assert_eq!(verification["missing_skills"], json!(["javascript"]));

  let uri = format!("/api/ideas/{idea_id}/contributors");
  let (status, _) = app
    .send(Method::POST, &uri, Some(&alice), Some(mpesa_join("Frontend Developer", "ord-alice")))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  // A qualification for one role does not open another.
  app.verify(&alice, idea_id, "Builder").await;
  let (status, _) = app
    .send(Method::POST, &uri, Some(&alice), Some(mpesa_join("Frontend Developer", "ord-alice")))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_github_languages_qualify_without_cv() {
  let mut github = mockito::Server::new_async().await;
  let api_url = github.url();
  github
    .mock("GET", "/users/octo/repos")
    .with_body(json!([{ "name": "shop", "languages_url": format!("{api_url}/repos/octo/shop/languages") }]).to_string())
    .create_async()
    .await;
  github
    .mock("GET", "/repos/octo/shop/languages")
    .with_body(json!({ "TypeScript": 5120, "Shell": 40 }).to_string())
    .create_async()
    .await;
  github.mock("GET", "/users/ghost/repos").with_status(404).create_async().await;

  let app = TestApp::with_settings(|settings| settings.github.api_url = api_url.clone()).await;
  let (_, founder) = app.sign_up("founder").await;
  let (_, alice) = app.sign_up("alice").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Frontend Developer", "count": 1 }])).await;
  let uri = format!("/api/ideas/{idea_id}/verification");

  let (status, _) = app
    .send(
      Method::POST,
      &uri,
      Some(&alice),
      Some(json!({ "role": "Frontend Developer", "github": "https://github.com/ghost" })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, verification) = app
    .send(
      Method::POST,
      &uri,
      Some(&alice),
      Some(json!({ "role": "Frontend Developer", "github": "https://github.com/octo" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{verification}");
  assert_eq!(verification["cv_checked"], false);
  assert_eq!(verification["github_username"], "octo");
  assert_eq!(verification["github_languages"], json!(["TypeScript"]));
  assert_eq!(verification["qualified"], true);
}

const WALLET: &str = "0x1111111111111111111111111111111111111111";
const STAKE_CONTRACT: &str = "0x2222222222222222222222222222222222222222";
const PROJECT_CONTRACT: &str = "0x4444444444444444444444444444444444444444";

fn chain_settings(rpc_url: String) -> ChainSettings {
  ChainSettings {
    rpc_url,
    chain_id: 84532,
    stake_contract: STAKE_CONTRACT.to_string(),
    token_address: "0x3333333333333333333333333333333333333333".to_string(),
    token_name: "USD Coin".to_string(),
    project_contract: Some(PROJECT_CONTRACT.to_string()),
  }
}

async fn mock_mined(server: &mut mockito::ServerGuard, tx_hash: &str, from: &str, to: &str, input: &str) {
  for (method, result) in [
    ("eth_getTransactionReceipt", json!({ "status": "0x1", "from": from, "to": to })),
    ("eth_getTransactionByHash", json!({ "input": input })),
  ] {
    server
      .mock("POST", "/")
      .match_body(mockito::Matcher::PartialJson(json!({ "method": method, "params": [tx_hash] })))
      .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
      .create_async()
      .await;
  }
}

#[tokio::test]
async fn test_crypto_stake_must_come_from_wallet_to_staking_contract() {
  let mut rpc = mockito::Server::new_async().await;
  let stake = ContractCall::Stake { amount: 10 }.encode().unwrap();
  let transfer = format!("0xa9059cbb{}", "0".repeat(128));
  let other = "0x5555555555555555555555555555555555555555";

  let wrong_contract = format!("0x{}", "a".repeat(64));
  let wrong_sender = format!("0x{}", "b".repeat(64));
  let wrong_function = format!("0x{}", "c".repeat(64));
  let staked = format!("0x{}", "d".repeat(64));
  mock_mined(&mut rpc, &wrong_contract, WALLET, other, &stake).await;
  mock_mined(&mut rpc, &wrong_sender, other, STAKE_CONTRACT, &stake).await;
  mock_mined(&mut rpc, &wrong_function, WALLET, STAKE_CONTRACT, &transfer).await;
  mock_mined(&mut rpc, &staked, WALLET, STAKE_CONTRACT, &stake).await;

  let rpc_url = rpc.url();
  let app = TestApp::with_settings(|settings| settings.chain = Some(chain_settings(rpc_url))).await;
  let (_, founder) = app.sign_up("founder").await;
  let (_, alice) = app.sign_up("alice").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Builder", "count": 1 }])).await;
  app.verify(&alice, idea_id, "Builder").await;

  let uri = format!("/api/ideas/{idea_id}/contributors");
  let crypto_join = |hash: &str| {
    json!({
      "role": "Builder",
      "stake": { "method": "crypto", "reference": hash, "amount": "10", "token": "USDC" },
    })
  };

  // No wallet on the profile yet.
  let (status, _) = app.send(Method::POST, &uri, Some(&alice), Some(crypto_join(&staked))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = app
    .send(Method::PUT, "/api/users/me", Some(&alice), Some(json!({ "wallet_address": WALLET })))
    .await;
  assert_eq!(status, StatusCode::OK);

  for hash in [&wrong_contract, &wrong_sender, &wrong_function] {
    let (status, body) = app.send(Method::POST, &uri, Some(&alice), Some(crypto_join(hash))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{hash}: {body}");
  }

  let (status, joined) = app.send(Method::POST, &uri, Some(&alice), Some(crypto_join(&staked))).await;
  assert_eq!(status, StatusCode::CREATED, "{joined}");
  assert_eq!(joined["stake"]["method"], "crypto");
}

#[tokio::test]
async fn test_approving_past_capacity_conflicts() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let (alice_id, alice) = app.sign_up("alice").await;
  let (bob_id, bob) = app.sign_up("bobby").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Builder", "count": 1 }])).await;

  // Pending requests don't hold the slot, so both get in line.
  let alice_slot = app.join_pending(&alice, alice_id, idea_id, "Builder", "ord-alice").await;
  let bob_slot = app.join_pending(&bob, bob_id, idea_id, "Builder", "ord-bob").await;

  let uri = format!("/api/ideas/{idea_id}/contributors");
  let approve = json!({ "status": "approved" });

  let (status, _) = app
    .send(Method::PATCH, &format!("{uri}/{alice_slot}"), Some(&founder), Some(approve.clone()))
    .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = app
    .send(Method::PATCH, &format!("{uri}/{bob_slot}"), Some(&founder), Some(approve))
    .await;
  assert_eq!(status, StatusCode::CONFLICT, "{body}");

  let (_, availability) = app
    .send(Method::GET, &format!("/api/ideas/{idea_id}/availability"), None, None)
    .await;
  assert_eq!(availability["roles"][0]["filled"], 1);

  let (_, contributors) = app.send(Method::GET, &uri, Some(&founder), None).await;
  let statuses: Vec<&str> = contributors
    .as_array()
    .unwrap()
    .iter()
    .map(|contributor| contributor["status"].as_str().unwrap())
    .collect();
  assert_eq!(statuses, ["approved", "pending"]);
}

#[tokio::test]
async fn test_concurrent_approvals_fill_one_slot() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let (alice_id, alice) = app.sign_up("alice").await;
  let (bob_id, bob) = app.sign_up("bobby").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Builder", "count": 1 }])).await;

  let alice_slot = app.join_pending(&alice, alice_id, idea_id, "Builder", "ord-alice").await;
  let bob_slot = app.join_pending(&bob, bob_id, idea_id, "Builder", "ord-bob").await;

  let (app, founder) = (&app, founder.as_str());
  let approve = |slot: &str| {
    let uri = format!("/api/ideas/{idea_id}/contributors/{slot}");
    async move {
      app
        .send(Method::PATCH, &uri, Some(founder), Some(json!({ "status": "approved" })))
        .await
    }
  };

  let ((first, _), (second, _)) = tokio::join!(approve(&alice_slot), approve(&bob_slot));

  let mut statuses = [first, second];
  statuses.sort();
  assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

  let (_, availability) = app
    .send(Method::GET, &format!("/api/ideas/{idea_id}/availability"), None, None)
    .await;
  assert_eq!(availability["roles"][0]["filled"], 1);
  assert_eq!(availability["team_full"], true);
}

#[tokio::test]
async fn test_project_transactions_target_project_contract() {
  let app = TestApp::with_settings(|settings| settings.chain = Some(chain_settings("http://127.0.0.1:9".to_string()))).await;
  let (_, founder) = app.sign_up("founder").await;
  let (_, alice) = app.sign_up("alice").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Builder", "count": 1 }])).await;
  let other_idea = app.create_idea(&founder, json!([{ "role": "Builder", "count": 1 }])).await;

  let mut milestone_ids = vec![];
  for project_id in [idea_id, other_idea] {
    let (status, milestone) = app
      .send(
        Method::POST,
        "/api/milestones",
        Some(&founder),
        Some(json!({ "project_id": project_id, "title": "Prototype", "due_date": "2030-01-01" })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{milestone}");
    milestone_ids.push(milestone["id"].as_str().unwrap().to_string());
  }

  let uri = format!("/api/projects/{idea_id}/chain/transactions");

  let (status, tx) = app
    .send(Method::POST, &uri, Some(&founder), Some(json!({ "action": "create_project", "amount": "1000" })))
    .await;
  assert_eq!(status, StatusCode::OK, "{tx}");
  assert_eq!(tx["to"], PROJECT_CONTRACT);
  assert_eq!(tx["chain_id"], 84532);
  let data = tx["data"].as_str().unwrap();
  assert!(data.starts_with("0x9853275c"));
  assert_eq!(&data[10..74], format!("{:064x}", idea_id.as_u128()));
  assert!(data.ends_with("3e8"));

  let (status, _) = app
    .send(Method::POST, &uri, Some(&alice), Some(json!({ "action": "create_project", "amount": "1000" })))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  // Backers may add funds to someone else's project.
  let (status, tx) = app
    .send(Method::POST, &uri, Some(&alice), Some(json!({ "action": "add_funds", "amount": "5" })))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert!(tx["data"].as_str().unwrap().starts_with("0x85f45250"));

  let share = |milestone_id: &str, percentage: u8| {
    json!({ "milestone_id": milestone_id, "budget": "500", "recipient": WALLET, "percentage": percentage })
  };
  let (status, tx) = app
    .send(
      Method::POST,
      &uri,
      Some(&founder),
      Some(json!({ "action": "set_milestones", "milestones": [share(&milestone_ids[0], 100)] })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{tx}");
  assert!(tx["data"].as_str().unwrap().starts_with("0xe1a12d04"));

  let (status, _) = app
    .send(
      Method::POST,
      &uri,
      Some(&founder),
      Some(json!({ "action": "set_milestones", "milestones": [share(&milestone_ids[0], 60)] })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = app
    .send(
      Method::POST,
      &uri,
      Some(&founder),
      Some(json!({ "action": "complete_milestone", "milestone_id": milestone_ids[1] })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, tx) = app
    .send(
      Method::POST,
      &uri,
      Some(&founder),
      Some(json!({ "action": "complete_milestone", "milestone_id": milestone_ids[0] })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert!(tx["data"].as_str().unwrap().starts_with("0xf326206b"));
}

#[tokio::test]
async fn test_project_transactions_need_project_contract() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;
  let idea_id = app.create_idea(&founder, json!([{ "role": "Builder", "count": 1 }])).await;

  let (status, _) = app
    .send(
      Method::POST,
      &format!("/api/projects/{idea_id}/chain/transactions"),
      Some(&founder),
      Some(json!({ "action": "add_funds", "amount": "5" })),
    )
    .await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_extreme_sizes_are_handled() {
  let app = TestApp::new().await;
  let (_, founder) = app.sign_up("founder").await;

  let (status, _) = app
    .send(
      Method::POST,
      "/api/ideas",
      Some(&founder),
      Some(json!({
        "title": "Solar kiosks",
        "problem_statement": "Rural shops lack power",
        "solution": "Pay-as-you-go solar kiosks",
        "resources": [{ "role": "Builder", "count": 4_294_967_295u64 }, { "role": "Builder", "count": 1 }],
      })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, page) = app
    .send(Method::GET, &format!("/api/ideas?page={}&ideas_per_page=100", i64::MAX), None, None)
    .await;
  assert_eq!(status, StatusCode::OK, "{page}");
}

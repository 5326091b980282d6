#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{TimeZone, Utc};
use explorer_api::config::ServerConfig;
use explorer_api::middleware::rbac::ADMIN_TOKEN_HEADER;
use explorer_api::router::build_app_router;
use explorer_api::state::AppState;
use explorer_core::comments::{Comment, SeedComments};
use explorer_core::error::CoreError;
use explorer_core::guide::{Guide, GuideCatalog};
use explorer_core::import::ImportedPlace;
use explorer_core::merge::ListFilters;
use explorer_core::normalize::SourceKind;
use explorer_core::source::EntitySource;
use explorer_db::local_cache::LocalCache;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin-token";

// ---------------------------------------------------------------------------
// In-memory relational store
// ---------------------------------------------------------------------------

/// Stands in for the relational store. Records are kept in the remote raw
/// shape; `set_failing` makes every call report the store as unreachable.
#[derive(Default)]
pub struct MemorySource {
    records: Mutex<Vec<Value>>,
    failing: AtomicBool,
}

impl MemorySource {
    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            records: Mutex::new(records),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Value> {
        self.records.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Upstream("relational store: connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EntitySource for MemorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn list(&self, _filters: &ListFilters) -> Result<Vec<Value>, CoreError> {
        self.check()?;
        Ok(self.records())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, CoreError> {
        self.check()?;
        Ok(self.records().into_iter().find(|r| r["id"] == id))
    }

    async fn create(&self, raw: Value) -> Result<Value, CoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r["id"] == raw["id"]) {
            return Err(CoreError::Conflict("duplicate id".into()));
        }
        records.push(raw.clone());
        Ok(raw)
    }

    async fn update(&self, id: &str, patch: Value) -> Result<Option<Value>, CoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.iter_mut().find(|r| r["id"] == id) else {
            return Ok(None);
        };
        if let (Value::Object(target), Value::Object(fields)) = (record, patch) {
            target.extend(fields);
            return Ok(Some(Value::Object(target.clone())));
        }
        Err(CoreError::Validation("patch must be an object".into()))
    }

    async fn delete(&self, id: &str) -> Result<bool, CoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r["id"] != id);
        Ok(records.len() < before)
    }

    async fn imported_reviews(&self, id: &str) -> Result<Vec<Value>, CoreError> {
        self.check()?;
        Ok(self
            .records()
            .into_iter()
            .find(|r| r["id"] == id)
            .and_then(|r| r.get("reviews").and_then(Value::as_array).cloned())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), CoreError> {
        self.check()
    }

    async fn upsert_place(&self, place: &ImportedPlace) -> Result<(), CoreError> {
        self.check()?;
        let mut record = serde_json::to_value(place)
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        record["status"] = json!("unverified");
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r["id"] != place.id);
        records.push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A remote-shaped record in Canggu.
pub fn remote_record(id: &str, title: &str, rating: f64, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "status": status,
        "type": "place",
        "area": "Canggu",
        "total_score": rating,
        "reviews_count": 12,
        "tags": ["Cafe"],
        "location_lat": -8.65,
        "location_lng": 115.13,
    })
}

/// A local-shaped record in Ubud.
pub fn local_record(id: &str, title: &str, rating: f64, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "status": status,
        "area": "Ubud",
        "totalScore": rating,
        "reviewsCount": 3,
        "tags": ["Yoga"],
        "location": { "lat": -8.5069, "lng": 115.2625 },
    })
}

pub fn seed_comment(entity_id: &str) -> Comment {
    Comment {
        id: format!("seed-{entity_id}"),
        entity_id: entity_id.to_string(),
        rating: 5,
        text: "Staff favourite".to_string(),
        author: "Island Team".to_string(),
        created_at: Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()),
    }
}

pub fn guides() -> GuideCatalog {
    GuideCatalog::new(vec![
        Guide {
            id: "best-cafes".to_string(),
            title: "Best cafes".to_string(),
            category: "food".to_string(),
            content: "# Best cafes\n\nStart at **Crate**.\n- Early\n- Busy".to_string(),
            related_entities: vec!["p1".to_string(), "missing".to_string()],
            created_at: None,
            updated_at: None,
        },
        Guide {
            id: "visa-basics".to_string(),
            title: "Visa basics".to_string(),
            category: "practical".to_string(),
            content: "Bring your passport.".to_string(),
            related_entities: Vec::new(),
            created_at: None,
            updated_at: None,
        },
    ])
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults and a known admin token.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        remote_timeout_secs: 5,
        local_cache_dir: PathBuf::from("unused"),
        guides_path: PathBuf::from("unused"),
        seed_comments_path: PathBuf::from("unused"),
        admin_token: Some(ADMIN_TOKEN.to_string()),
    }
}

/// Router plus handles on its backends. The temp dir lives as long as this.
pub struct TestApp {
    pub router: Router,
    pub remote: Arc<MemorySource>,
    pub local: Arc<LocalCache>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router over an in-memory remote store and a
/// temporary local cache, using the same middleware stack as production.
pub fn build_test_app(remote_records: Vec<Value>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = test_config();
    let remote = Arc::new(MemorySource::with_records(remote_records));
    let local = Arc::new(LocalCache::new(dir.path()));

    let state = AppState {
        config: Arc::new(config.clone()),
        remote: remote.clone(),
        local: local.clone(),
        guides: Arc::new(guides()),
        seed_comments: Arc::new(SeedComments::from_comments(vec![seed_comment("p1")])),
    };

    TestApp {
        router: build_app_router(state, &config),
        remote,
        local,
        dir,
    }
}

/// Seed the local cache with raw local records.
pub async fn seed_local(app: &TestApp, records: Vec<Value>) {
    app.local.replace_entities(records).await.unwrap();
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    admin: bool,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if admin {
        builder = builder.header(ADMIN_TOKEN_HEADER, ADMIN_TOKEN);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, false).await
}

pub async fn get_admin(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, true).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body), false).await
}

pub async fn admin_json(app: Router, method: Method, uri: &str, body: Value) -> Response<Body> {
    send(app, method, uri, Some(body), true).await
}

pub async fn admin_delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None, true).await
}

/// Ids of a listing response, in order.
pub fn listed_ids(json: &Value) -> Vec<String> {
    json["data"]["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

//! Test doubles and request helpers for the HTTP surface.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::DynamicImage;
use ltx_core::{GenerationParams, VideoModel};
use ltx_server::config::ServiceConfig;
use ltx_server::encoder::{EncodeError, Mp4Encoder};
use ltx_server::handlers::router;
use ltx_server::state::AppState;
use ltx_server::storage::{public_url, ObjectStore, StoreError};
use tower::util::ServiceExt;

/// Model double that returns tiny frames and counts invocations.
pub struct FakeModel {
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl VideoModel for FakeModel {
    fn run(&self, params: &GenerationParams) -> anyhow::Result<Vec<DynamicImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![DynamicImage::new_rgb8(8, 8); params.num_frames.min(4)])
    }
}

/// Model double that panics mid-generation, for the catch-panic layer.
pub struct PanickingModel;

impl VideoModel for PanickingModel {
    fn run(&self, _params: &GenerationParams) -> anyhow::Result<Vec<DynamicImage>> {
        panic!("device wedged");
    }
}

/// Store double that records uploads, or fails every upload on demand.
pub struct FakeStore {
    pub uploads: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            fail: true,
        })
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn bucket_exists(&self, _bucket: &str) -> bool {
        !self.fail
    }

    async fn upload_public(
        &self,
        bucket: &str,
        object: &str,
        _path: &Path,
        _content_type: &str,
    ) -> Result<String, StoreError> {
        if self.fail {
            return Err(StoreError::Timeout);
        }
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), object.to_string()));
        Ok(public_url(bucket, object))
    }
}

/// Encoder double that just touches the destination file.
pub struct FakeEncoder;

#[async_trait]
impl Mp4Encoder for FakeEncoder {
    async fn encode(&self, frames: &[DynamicImage], dest: &Path) -> Result<(), EncodeError> {
        if frames.is_empty() {
            return Err(EncodeError::NoFrames);
        }
        tokio::fs::write(dest, b"").await.map_err(EncodeError::Spawn)
    }
}

pub fn test_config(default_bucket: Option<&str>) -> ServiceConfig {
    ServiceConfig {
        default_bucket: default_bucket.map(str::to_string),
        project_id: None,
        model_id: "Lightricks/LTX-Video".to_string(),
        efficient_attention: true,
    }
}

pub fn app(
    config: ServiceConfig,
    model: Option<Arc<FakeModel>>,
    store: Option<Arc<FakeStore>>,
) -> Router {
    let model: Option<Arc<dyn VideoModel>> = match model {
        Some(m) => Some(m),
        None => None,
    };
    app_with(config, model, store)
}

pub fn app_with(
    config: ServiceConfig,
    model: Option<Arc<dyn VideoModel>>,
    store: Option<Arc<FakeStore>>,
) -> Router {
    let store: Option<Arc<dyn ObjectStore>> = match store {
        Some(s) => Some(s),
        None => None,
    };
    router(Arc::new(AppState {
        config,
        model,
        store,
        encoder: Arc::new(FakeEncoder),
    }))
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

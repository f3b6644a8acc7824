//! End-to-end tests of the HTTP surface with fake model and storage.

mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use serde_json::json;

use common::{app, assert_status, body_json, get, post_json, test_config, FakeModel, FakeStore};

#[tokio::test]
async fn health_succeeds_without_model() {
    let app = app(test_config(Some("out-bucket")), None, None);
    let response = get(app, "/health").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["model_id"], "Lightricks/LTX-Video");
    assert_eq!(body["default_bucket"], "out-bucket");
    assert_eq!(body["storage_client_initialized"], false);
}

#[tokio::test]
async fn service_info_succeeds_without_model() {
    let app = app(test_config(None), None, None);
    let response = get(app, "/").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["service"], "ltx-serve");
    assert_eq!(body["endpoints"]["predict"], "POST /predict");
    assert_eq!(body["features"]["gcs_upload"], false);
}

#[tokio::test]
async fn predict_without_model_returns_503() {
    let app = app(test_config(Some("out-bucket")), None, Some(FakeStore::new()));
    let response = post_json(app, "/predict", json!({"prompt": "a fox"})).await;
    assert_status(&response, StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_READY");
}

#[tokio::test]
async fn predict_rejects_invalid_height_before_running_model() {
    let model = FakeModel::new();
    let app = app(
        test_config(Some("out-bucket")),
        Some(model.clone()),
        Some(FakeStore::new()),
    );
    let response = post_json(app, "/predict", json!({"prompt": "a fox", "height": 100})).await;
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["details"][0]["field"], "height");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn predict_rejects_malformed_destination_before_running_model() {
    let model = FakeModel::new();
    let app = app(
        test_config(Some("out-bucket")),
        Some(model.clone()),
        Some(FakeStore::new()),
    );
    for destination in [
        "s3://bucket/file.mp4",
        "gs://bucket/file.avi",
        "gs://bucket.mp4",
        "gs://UPPER/file.mp4",
    ] {
        let response = post_json(
            app.clone(),
            "/predict",
            json!({"prompt": "a fox", "gcs_destination": destination}),
        )
        .await;
        assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["details"][0]["field"], "gcs_destination");
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn predict_uploads_to_default_bucket() {
    let model = FakeModel::new();
    let store = FakeStore::new();
    let app = app(
        test_config(Some("out-bucket")),
        Some(model.clone()),
        Some(store.clone()),
    );
    let response = post_json(
        app,
        "/predict",
        json!({"prompt": "a fox jumping", "num_frames": 4, "num_inference_steps": 2}),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    let filename = body["video_filename"].as_str().unwrap();
    assert!(filename.starts_with("ltx_video_"));
    assert!(filename.ends_with(".mp4"));
    assert_eq!(body["gcs_bucket"], "out-bucket");
    assert_eq!(body["gcs_blob"], format!("videos/{filename}"));
    assert_eq!(
        body["video_url"],
        format!("https://storage.googleapis.com/out-bucket/videos/{filename}")
    );
    assert_eq!(body["seed"], 42);
    assert_eq!(body["metadata"]["resolution"], "1216x704");
    assert_eq!(body["metadata"]["model"], "Lightricks/LTX-Video");
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);

    let uploads = store.uploads.lock().unwrap();
    assert_eq!(
        *uploads,
        vec![("out-bucket".to_string(), format!("videos/{filename}"))]
    );
}

#[tokio::test]
async fn predict_honors_custom_destination() {
    let store = FakeStore::new();
    let app = app(
        test_config(Some("out-bucket")),
        Some(FakeModel::new()),
        Some(store.clone()),
    );
    let response = post_json(
        app,
        "/predict",
        json!({
            "prompt": "a fox",
            "num_frames": 4,
            "gcs_destination": "gs://my-bucket/path/out.mp4",
        }),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["gcs_bucket"], "my-bucket");
    assert_eq!(body["gcs_blob"], "path/out.mp4");
    assert_eq!(
        body["video_url"],
        "https://storage.googleapis.com/my-bucket/path/out.mp4"
    );

    let uploads = store.uploads.lock().unwrap();
    assert_eq!(
        *uploads,
        vec![("my-bucket".to_string(), "path/out.mp4".to_string())]
    );
}

#[tokio::test]
async fn predict_falls_back_to_local_path_when_upload_fails() {
    let app = app(
        test_config(Some("out-bucket")),
        Some(FakeModel::new()),
        Some(FakeStore::failing()),
    );
    let response = post_json(app, "/predict", json!({"prompt": "a fox", "num_frames": 4})).await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["gcs_bucket"], serde_json::Value::Null);
    let url = body["video_url"].as_str().unwrap();
    assert!(!url.starts_with("https://"));
    assert!(url.ends_with(".mp4"));
    assert_eq!(body["gcs_blob"], body["video_url"]);
}

#[tokio::test]
async fn predict_without_configured_bucket_keeps_video_local() {
    let app = app(test_config(None), Some(FakeModel::new()), None);
    let response = post_json(app, "/predict", json!({"prompt": "a fox", "num_frames": 4})).await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["gcs_bucket"], serde_json::Value::Null);
    assert!(!body["video_url"].as_str().unwrap().starts_with("https://"));
}

#[tokio::test]
async fn identical_requests_get_distinct_filenames() {
    let store = FakeStore::new();
    let app = app(
        test_config(Some("out-bucket")),
        Some(FakeModel::new()),
        Some(store.clone()),
    );
    let request = json!({"prompt": "a fox", "num_frames": 4});
    let first = body_json(post_json(app.clone(), "/predict", request.clone()).await).await;
    let second = body_json(post_json(app, "/predict", request).await).await;
    assert_ne!(first["video_filename"], second["video_filename"]);
}

#[tokio::test]
async fn panicking_generation_becomes_500_without_killing_service() {
    use common::{app_with, PanickingModel};
    use std::sync::Arc;

    let app = app_with(
        test_config(Some("out-bucket")),
        Some(Arc::new(PanickingModel)),
        Some(FakeStore::new()),
    );
    let response = post_json(app.clone(), "/predict", json!({"prompt": "a fox"})).await;
    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);

    // The router keeps serving after the panic.
    let response = get(app, "/health").await;
    assert_status(&response, StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = app(test_config(None), None, None);
    let response = get(app, "/nope").await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

//! Endpoint handlers.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use driveloft_offload::{AuthorizeOutcome, ConnectionStatus, MigrationReport, SettingsView};
use driveloft_storage::{mime_for_name, ObjectInfo};

use crate::{ApiError, ApiState};

/// Liveness probe.
pub async fn ping() -> &'static str {
    "pong"
}

/// Configuration summary for screens.
pub async fn settings(State(state): State<ApiState>) -> Result<Json<SettingsView>, ApiError> {
    Ok(Json(state.engine.settings().await?))
}

/// Connection probe; failure is reported in the body, not the status.
pub async fn test_connection(State(state): State<ApiState>) -> Json<ConnectionStatus> {
    Json(state.engine.test_connection().await)
}

#[derive(Debug, Deserialize)]
pub struct ServeParams {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Stream a private file back through the proxy.
pub async fn serve_file(
    State(state): State<ApiState>,
    Query(params): Query<ServeParams>,
) -> Result<Response, ApiError> {
    let file_id = params.file_id.unwrap_or_default();
    let served = state
        .engine
        .serve_file(&file_id, params.file_name.as_deref())
        .await?;

    let content_type = mime_for_name(&served.file_name);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        served.file_name.replace(['"', '\r', '\n'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        served.content,
    )
        .into_response())
}

/// Sweep pre-existing local files into remote storage.
pub async fn migrate(State(state): State<ApiState>) -> Result<Json<MigrationReport>, ApiError> {
    info!("Migration requested over the endpoint surface");
    Ok(Json(state.engine.migrate_existing().await?))
}

#[derive(Debug, Deserialize)]
pub struct FileInfoParams {
    pub file_id: String,
}

/// Remote metadata for one object; JSON `null` when the lookup fails.
pub async fn file_info(
    State(state): State<ApiState>,
    Query(params): Query<FileInfoParams>,
) -> Result<Json<Option<ObjectInfo>>, ApiError> {
    Ok(Json(state.engine.file_info(&params.file_id).await?))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AuthorizeRequest {
    pub reauthorize: bool,
    pub code: Option<String>,
}

/// Run the authorization flow.
pub async fn authorize(
    State(state): State<ApiState>,
    Json(request): Json<AuthorizeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .engine
        .authorize_access(request.reauthorize, request.code.as_deref())
        .await?;

    let body = match outcome {
        AuthorizeOutcome::ConsentUrl(consent_url) => {
            serde_json::json!({ "consent_url": consent_url })
        }
        AuthorizeOutcome::Authorized => serde_json::json!({
            "success": true,
            "message": "Authorization successful",
        }),
    };

    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use driveloft_common::{Result, SecretString};
    use driveloft_offload::{
        ConfigCache, FileRecord, MemoryConfigStore, MemoryDocumentStore, OffloadConfig,
        OffloadEngine, SiteRoots,
    };
    use driveloft_storage::{AuthFlow, MemoryFactory, MemoryRemote};

    struct StubAuthFlow;

    #[async_trait]
    impl AuthFlow for StubAuthFlow {
        fn consent_url(&self) -> String {
            "https://accounts.google.com/o/oauth2/v2/auth?stub".to_string()
        }

        async fn exchange_code(&self, code: &str) -> Result<SecretString> {
            Ok(SecretString::new(format!("refresh-{}", code)))
        }
    }

    struct Fixture {
        app: axum::Router,
        remote: Arc<MemoryRemote>,
        store: Arc<MemoryDocumentStore>,
        engine: Arc<OffloadEngine>,
        _site: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let site = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let remote = Arc::new(MemoryRemote::new());
        let config = OffloadConfig {
            enabled: true,
            refresh_token: Some(SecretString::new("refresh")),
            ..Default::default()
        };

        let engine = Arc::new(OffloadEngine::new(
            Arc::new(ConfigCache::new(Arc::new(MemoryConfigStore::with_config(
                config,
            )))),
            store.clone(),
            Arc::new(MemoryFactory::new(remote.clone())),
            Arc::new(StubAuthFlow),
            SiteRoots::new(site.path()),
        ));

        Fixture {
            app: router(engine.clone()),
            remote,
            store,
            engine,
            _site: site,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let fx = fixture();
        let response = fx
            .app
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"pong");
    }

    #[tokio::test]
    async fn test_settings_shape() {
        let fx = fixture();
        let response = fx
            .app
            .oneshot(Request::get("/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["enabled"], true);
        assert_eq!(json["has_authorization"], true);
        assert_eq!(json["sharing_permission"], "private");
    }

    #[tokio::test]
    async fn test_serve_file_requires_id() {
        let fx = fixture();
        let response = fx
            .app
            .oneshot(Request::get("/serve_file").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_serve_file_round_trip() {
        let fx = fixture();

        // Seed one offloaded record straight through the engine.
        let site_file = fx._site.path().join("private/files/r.pdf");
        std::fs::create_dir_all(site_file.parent().unwrap()).unwrap();
        std::fs::write(&site_file, b"pdf-bytes").unwrap();

        let mut record = FileRecord {
            id: "f1".to_string(),
            file_name: "r.pdf".to_string(),
            file_url: "/private/files/r.pdf".to_string(),
            is_private: true,
            attached_to_doctype: None,
            attached_to_name: None,
            content_hash: None,
        };
        fx.store.insert(record.clone());
        fx.engine.on_file_created(&mut record).await;
        let object_id = record.content_hash.unwrap();

        let uri = format!("/serve_file?file_id={}&file_name=r.pdf", object_id);
        let response = fx
            .app
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"r.pdf\""
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"pdf-bytes");
        assert_eq!(fx.remote.download_count(), 1);
    }

    #[tokio::test]
    async fn test_migrate_reports_counts() {
        let fx = fixture();
        let response = fx
            .app
            .oneshot(Request::post("/migrate").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["migrated"], 0);
        assert_eq!(json["errors"], 0);
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn test_authorize_returns_consent_url() {
        let fx = fixture();
        let request = Request::post("/authorize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = fx.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert!(json["consent_url"]
            .as_str()
            .unwrap()
            .contains("accounts.google.com"));
    }

    #[tokio::test]
    async fn test_file_info_returns_null_for_unknown_object() {
        let fx = fixture();
        let response = fx
            .app
            .oneshot(
                Request::get("/files/info?file_id=missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::Value::Null);
    }
}

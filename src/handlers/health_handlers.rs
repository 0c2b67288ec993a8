//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the record database and the
//!   storage root

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness endpoint — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness check. Not ready means the service cannot currently serve its
/// two dependencies: the SQLite record database and the blob-storage root.
/// HTTP 200 when both checks pass, HTTP 503 otherwise, with a JSON body
/// describing each check.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let database = database_check(&state).await;
    let storage = storage_check(&state).await;
    let ready = database.ok && storage.check.ok;

    let body = ReadyResponse {
        status: if ready { "ok" } else { "unavailable" },
        database,
        storage,
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// `SELECT 1` against the record pool.
async fn database_check(state: &AppState) -> Check {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.records.db)
        .await
    {
        Ok(1) => Check::pass(),
        Ok(other) => Check::fail(format!("unexpected result: {other}")),
        Err(err) => Check::fail(format!("query failed: {err}")),
    }
}

/// Round-trip a scratch file under the storage root. Objects land in this
/// tree, so an unwritable or unreadable root means uploads and thumbnail
/// writes would fail.
async fn storage_check(state: &AppState) -> StorageCheck {
    let root = &state.storage.base_path;
    let scratch = root.join(format!(".readyz-{}", Uuid::new_v4()));

    let check = match fs::write(&scratch, b"ready").await {
        Ok(()) => match fs::read(&scratch).await {
            Ok(bytes) if bytes == b"ready" => Check::pass(),
            Ok(_) => Check::fail("scratch file read back different bytes".into()),
            Err(err) => Check::fail(format!("cannot read back scratch file: {err}")),
        },
        Err(err) => Check::fail(format!("cannot write under storage root: {err}")),
    };
    let _ = fs::remove_file(&scratch).await;

    StorageCheck {
        path: root.display().to_string(),
        check,
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    database: Check,
    storage: StorageCheck,
}

#[derive(Serialize)]
struct Check {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Check {
    fn pass() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}

#[derive(Serialize)]
struct StorageCheck {
    /// Storage root the round-trip ran against.
    path: String,
    #[serde(flatten)]
    check: Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record_service::RecordService;
    use crate::services::storage_service::StorageService;
    use axum::response::Response;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn state(storage_dir: &std::path::Path) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        AppState {
            storage: StorageService::new(storage_dir, "vault-test"),
            records: RecordService::new(Arc::new(pool)),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn readyz_reports_each_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        let response = readyz(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["ok"], true);
        assert_eq!(body["storage"]["ok"], true);
        assert_eq!(body["storage"]["path"], dir.path().display().to_string());
    }

    #[tokio::test]
    async fn readyz_is_unavailable_when_storage_root_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("vanished");
        let state = state(&missing).await;

        let response = readyz(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["database"]["ok"], true);
        assert_eq!(body["storage"]["ok"], false);
        assert!(body["storage"]["error"].as_str().unwrap().contains("write"));
    }
}

//! Route table

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Upload limit for balance and email spreadsheets together
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let bulk_import = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/preview", post(handlers::preview))
        .route("/validate", post(handlers::validate))
        .route("/jobs", get(handlers::list_jobs).post(handlers::create_job))
        .route("/jobs/:id", get(handlers::get_job))
        .route("/jobs/:id/send-invitations", post(handlers::send_job_invitations))
        .route("/pending/:id/send-invitation", post(handlers::send_invitation))
        .route("/pending/:id/expire", post(handlers::expire_pending));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/admin/bulk-import", bulk_import)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use guincoin_core::GuincoinContext;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "guincoin-test-boundary";

    fn app(dir: &TempDir) -> Router {
        let ctx = GuincoinContext::new(dir.path()).unwrap();
        router(AppState::new(ctx, None))
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(file) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n",
                    name, file
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn multipart(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_post(uri: &str, value: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .header("x-admin-email", "ops@corp.com")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    const BALANCES: &str = "Employee,Email,Guincoins\nJane Doe,jane@corp.com,100\nSam Lee,,25";

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(
            &app(&dir),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_detects_columns() {
        let dir = TempDir::new().unwrap();
        let body = multipart_body(&[("balanceFile", Some("march.csv"), BALANCES)]);
        let (status, body) = send(&app(&dir), multipart("/api/admin/bulk-import/upload", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balanceFile"]["totalRows"], 2);
        assert_eq!(body["balanceFile"]["detected"]["email"], "Email");
        assert_eq!(body["balanceFile"]["detected"]["amount"], "Guincoins");
        assert_eq!(body["balanceFile"]["detected"]["name"], "Employee");
        assert!(body.get("emailFile").is_none());
    }

    #[tokio::test]
    async fn test_upload_rejects_missing_and_unsupported_files() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let body = multipart_body(&[("columnMapping", None, "{}")]);
        let (status, body) = send(&app, multipart("/api/admin/bulk-import/upload", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("balanceFile is required"));

        let body = multipart_body(&[("balanceFile", Some("march.pdf"), "nope")]);
        let (status, _) = send(&app, multipart("/api/admin/bulk-import/upload", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preview_validate_commit_flow() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let mapping = json!({
            "balances": { "name": "Employee", "amount": "Guincoins", "email": "Email" }
        });
        let body = multipart_body(&[
            ("balanceFile", Some("march.csv"), BALANCES),
            ("columnMapping", None, &mapping.to_string()),
        ]);
        let (status, preview) = send(&app, multipart("/api/admin/bulk-import/preview", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["summary"]["totalRows"], 2);
        assert_eq!(preview["summary"]["autoMatched"], 1);
        assert_eq!(preview["summary"]["manualRequired"], 1);

        let mut rows = preview["rows"].clone();
        let (status, validation) = send(
            &app,
            json_post("/api/admin/bulk-import/validate", rows.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(validation["valid"], false);

        rows[1]["email"] = json!("sam.lee@corp.com");
        rows[1]["matchType"] = json!("manual");
        rows[1]["confidence"] = json!(1.0);
        let (_, validation) = send(
            &app,
            json_post("/api/admin/bulk-import/validate", rows.clone()),
        )
        .await;
        assert_eq!(validation["valid"], true);
        assert_eq!(validation["summary"]["totalRows"], 2);

        let (status, commit) = send(
            &app,
            json_post(
                "/api/admin/bulk-import/jobs",
                json!({ "name": "March", "rows": rows, "columnMapping": mapping }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(commit["status"], "completed");
        assert_eq!(commit["pendingBalancesCreated"], 2);

        let job_id = commit["jobId"].as_str().unwrap().to_string();
        let (status, detail) = send(
            &app,
            Request::get(format!("/api/admin/bulk-import/jobs/{}", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["createdBy"], "ops@corp.com");
        assert_eq!(detail["pendingBalances"].as_array().unwrap().len(), 2);

        let (status, batch) = send(
            &app,
            json_post(
                &format!("/api/admin/bulk-import/jobs/{}/send-invitations", job_id),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(batch["sent"], 2);

        let pending_id = detail["pendingBalances"][0]["id"].as_str().unwrap().to_string();
        let expire_uri = format!("/api/admin/bulk-import/pending/{}/expire", pending_id);
        let (status, expired) = send(&app, json_post(&expire_uri, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(expired["status"], "expired");

        let (status, body) = send(&app, json_post(&expire_uri, json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("already expired"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let dir = TempDir::new().unwrap();
        let uri = format!("/api/admin/bulk-import/jobs/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&app(&dir), Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_commit_with_invalid_rows_is_400() {
        let dir = TempDir::new().unwrap();
        let rows = json!([{ "name": "Nobody", "email": "", "amount": "5", "matchType": "none", "confidence": 0 }]);
        let (status, body) = send(
            &app(&dir),
            json_post("/api/admin/bulk-import/jobs", json!({ "name": "Broken", "rows": rows })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Missing email address"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_error_body() {
        let dir = TempDir::new().unwrap();
        let request = Request::post("/api/admin/bulk-import/validate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app(&dir), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let missing_rows = json_post("/api/admin/bulk-import/jobs", json!({ "name": "No rows" }));
        let (status, body) = send(&app(&dir), missing_rows).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_id_is_error_body() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let (status, body) = send(
            &app,
            Request::get("/api/admin/bulk-import/jobs/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(
            &app,
            json_post("/api/admin/bulk-import/pending/42/expire", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}

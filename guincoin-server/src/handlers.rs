//! Request handlers for the bulk import API

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use guincoin_core::adapters::spreadsheet::read_sheet_bytes;
use guincoin_core::services::{
    CommitResult, InvitationBatchResult, LogEvent, PreviewResult, UploadResult,
};
use guincoin_core::{
    BulkImportJob, BulkImportJobDetail, ColumnMapping, Error, MergedRow, PendingImportBalance,
    SheetData, ValidationResult,
};

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam};
use crate::state::AppState;

/// Header naming the admin performing a commit
pub const ADMIN_HEADER: &str = "x-admin-email";

struct FilePart {
    file_name: String,
    bytes: Vec<u8>,
}

/// Multipart fields shared by upload and preview
#[derive(Default)]
struct ImportForm {
    balance_file: Option<FilePart>,
    email_file: Option<FilePart>,
    column_mapping: Option<String>,
}

impl ImportForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "balanceFile" | "emailFile" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?.to_vec();
                    // Browsers send an empty part for an unused file input
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    let part = FilePart { file_name, bytes };
                    if name == "balanceFile" {
                        form.balance_file = Some(part);
                    } else {
                        form.email_file = Some(part);
                    }
                }
                "columnMapping" => form.column_mapping = Some(field.text().await?),
                _ => {}
            }
        }

        Ok(form)
    }

    fn sheets(&self) -> anyhow::Result<(SheetData, Option<SheetData>)> {
        let balances = self
            .balance_file
            .as_ref()
            .ok_or_else(|| Error::validation("balanceFile is required"))?;
        let balances = read_sheet_bytes(&balances.file_name, &balances.bytes)?;
        let emails = self
            .email_file
            .as_ref()
            .map(|f| read_sheet_bytes(&f.file_name, &f.bytes))
            .transpose()?;
        Ok((balances, emails))
    }

    fn mapping(&self) -> anyhow::Result<ColumnMapping> {
        let raw = self
            .column_mapping
            .as_deref()
            .ok_or_else(|| Error::validation("columnMapping is required"))?;
        let mapping = serde_json::from_str(raw)
            .map_err(|e| Error::validation(format!("Invalid columnMapping: {}", e)))?;
        Ok(mapping)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub name: String,
    pub rows: Vec<MergedRow>,
    #[serde(default)]
    pub column_mapping: Option<ColumnMapping>,
}

fn admin_email(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// POST /api/admin/bulk-import/upload
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResult>, ApiError> {
    let form = ImportForm::read(multipart).await?;
    state
        .run(move |state| {
            let (balances, emails) = form.sheets()?;
            state.log(LogEvent::new("import_uploaded").with_route("bulk-import/upload"));
            Ok(state.ctx.import_service.upload(&balances, emails.as_ref()))
        })
        .await
        .map(Json)
}

/// POST /api/admin/bulk-import/preview
pub async fn preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PreviewResult>, ApiError> {
    let form = ImportForm::read(multipart).await?;
    state
        .run(move |state| {
            let (balances, emails) = form.sheets()?;
            let mapping = form.mapping()?;
            let result = state
                .ctx
                .import_service
                .preview(&balances, emails.as_ref(), &mapping)?;
            state.log(LogEvent::new("import_previewed").with_route("bulk-import/preview"));
            Ok(result)
        })
        .await
        .map(Json)
}

/// POST /api/admin/bulk-import/validate
pub async fn validate(
    State(state): State<AppState>,
    JsonBody(rows): JsonBody<Vec<MergedRow>>,
) -> Result<Json<ValidationResult>, ApiError> {
    state
        .run(move |state| state.ctx.validation_service.validate(&rows))
        .await
        .map(Json)
}

/// POST /api/admin/bulk-import/jobs
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<CreateJobRequest>,
) -> Result<Json<CommitResult>, ApiError> {
    let created_by = admin_email(&headers, &state.ctx.config.operator);
    tracing::info!(rows = request.rows.len(), "committing bulk import job");

    state
        .run(move |state| {
            let event = LogEvent::new("import_committed").with_route("bulk-import/jobs");
            match state.ctx.job_service.create_job(
                &request.name,
                &request.rows,
                request.column_mapping,
                &created_by,
            ) {
                Ok(result) => {
                    state.log(event.with_job(result.job_id));
                    Ok(result)
                }
                Err(e) => {
                    state.log(event.with_error(e.to_string()));
                    Err(e)
                }
            }
        })
        .await
        .map(Json)
}

/// GET /api/admin/bulk-import/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<BulkImportJob>>, ApiError> {
    state
        .run(|state| state.ctx.job_service.list_jobs())
        .await
        .map(Json)
}

/// GET /api/admin/bulk-import/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<BulkImportJobDetail>, ApiError> {
    state
        .run(move |state| state.ctx.job_service.get_job(id))
        .await
        .map(Json)
}

/// POST /api/admin/bulk-import/jobs/:id/send-invitations
pub async fn send_job_invitations(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<InvitationBatchResult>, ApiError> {
    state
        .run(move |state| {
            let result = state.ctx.pending_service.send_job_invitations(id)?;
            let mut event = LogEvent::new("invitations_sent")
                .with_route("bulk-import/jobs/send-invitations")
                .with_job(id);
            if result.failed > 0 {
                event = event.with_error(format!("{} invitation(s) failed", result.failed));
            }
            state.log(event);
            Ok(result)
        })
        .await
        .map(Json)
}

/// POST /api/admin/bulk-import/pending/:id/send-invitation
pub async fn send_invitation(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<PendingImportBalance>, ApiError> {
    state
        .run(move |state| {
            let pending = state.ctx.pending_service.send_invitation(id)?;
            state.log(
                LogEvent::new("invitation_sent")
                    .with_route("bulk-import/pending/send-invitation")
                    .with_job(pending.job_id),
            );
            Ok(pending)
        })
        .await
        .map(Json)
}

/// POST /api/admin/bulk-import/pending/:id/expire
pub async fn expire_pending(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<PendingImportBalance>, ApiError> {
    state
        .run(move |state| {
            let pending = state.ctx.pending_service.expire(id)?;
            state.log(
                LogEvent::new("pending_expired")
                    .with_route("bulk-import/pending/expire")
                    .with_job(pending.job_id),
            );
            Ok(pending)
        })
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_admin_email_header_and_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(admin_email(&headers, "admin"), "admin");

        headers.insert(ADMIN_HEADER, HeaderValue::from_static("  "));
        assert_eq!(admin_email(&headers, "admin"), "admin");

        headers.insert(ADMIN_HEADER, HeaderValue::from_static("ops@corp.com"));
        assert_eq!(admin_email(&headers, "admin"), "ops@corp.com");
    }

    #[test]
    fn test_form_requires_balance_file_and_mapping() {
        let form = ImportForm::default();
        let err = form.sheets().unwrap_err();
        assert!(err.to_string().contains("balanceFile is required"));
        assert!(form.mapping().is_err());

        let form = ImportForm {
            column_mapping: Some("{not json".to_string()),
            ..Default::default()
        };
        let err = form.mapping().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation(_))));
    }
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use cohort_db::models::NewReport;
use cohort_types::api::{Claims, CreateReportRequest, ReportQuery, ReportResponse, ResolveReportRequest};
use cohort_types::models::{ReportStatus, ReportTargetType};

use crate::error::ApiError;
use crate::feed::visible_post;
use crate::messages::visible_message;
use crate::{AppState, blocking, convert};

const MAX_REASON_LEN: usize = 1000;

pub async fn create_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = req.reason.trim().to_string();
    if reason.is_empty() || reason.chars().count() > MAX_REASON_LEN {
        return Err(ApiError::bad_request("reason must be 1-1000 characters"));
    }

    let report_id = Uuid::new_v4();
    let reporter = claims.sub.to_string();
    let is_admin = claims.is_admin();
    let (target_type, target_id) = (req.target_type, req.target_id);

    blocking(&state, move |db| {
        let tid = target_id.to_string();
        match target_type {
            ReportTargetType::Post => {
                visible_post(db, &tid, is_admin)?;
            }
            ReportTargetType::Comment => {
                db.get_comment(&tid)?.ok_or(ApiError::NotFound("comment"))?;
            }
            ReportTargetType::Message => {
                visible_message(db, &tid, &reporter)?;
            }
            ReportTargetType::User => {
                db.get_user_by_id(&tid)?.ok_or(ApiError::NotFound("user"))?;
            }
        }

        db.create_report(&NewReport {
            id: &report_id.to_string(),
            reporter_id: &reporter,
            target_type: target_type.as_str(),
            target_id: &tid,
            reason: &reason,
        })?;
        Ok(())
    })
    .await?;

    info!("User {} reported {} {}", claims.sub, target_type, target_id);
    Ok((StatusCode::CREATED, Json(json!({ "id": report_id }))))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query.status.map(|s| s.as_str());
    let rows = blocking(&state, move |db| Ok(db.list_reports(status)?)).await?;

    let items: Vec<ReportResponse> = rows
        .into_iter()
        .map(|row| ReportResponse {
            id: convert::uuid(&row.id, "report"),
            reporter: convert::summary(
                row.reporter_id.as_deref(),
                row.reporter_name,
                row.reporter_avatar,
            ),
            target_type: convert::enum_value(&row.target_type, ReportTargetType::Post),
            target_id: convert::uuid(&row.target_id, "report target"),
            reason: row.reason,
            status: convert::enum_value(&row.status, ReportStatus::Pending),
            created_at: convert::timestamp(&row.created_at),
            resolved_at: convert::opt_timestamp(row.resolved_at.as_deref()),
        })
        .collect();

    Ok(Json(items))
}

pub async fn resolve_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(report_id): Path<Uuid>,
    Json(req): Json<ResolveReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.status == ReportStatus::Pending {
        return Err(ApiError::bad_request("status must be resolved or dismissed"));
    }

    let admin = claims.sub.to_string();
    let found = blocking(&state, move |db| {
        Ok(db.resolve_report(&report_id.to_string(), req.status.as_str(), &admin)?)
    })
    .await?;
    if !found {
        return Err(ApiError::NotFound("report"));
    }

    info!("Admin {} marked report {} {}", claims.sub, report_id, req.status);
    Ok(StatusCode::NO_CONTENT)
}

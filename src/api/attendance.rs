use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};
use validator::Validate;

use crate::api::{created, ok, paged};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::{
    AttendanceQuery, AttendanceRecord, CheckOut, NewAttendance, UpdateAttendance,
};
use crate::state::AppState;
use crate::store::{AttendanceStore, Conflict, Guarded, StoreError};

/// Fetches a record the caller may see. Workers get a 404 for other
/// people's rows rather than a 403.
async fn load_visible(
    auth: &AuthUser,
    state: &AppState,
    attendance_id: u64,
) -> Result<AttendanceRecord, AppError> {
    let record = state
        .store
        .get_attendance(attendance_id)
        .await?
        .ok_or(AppError::NotFound("Attendance record"))?;

    if auth.is_worker() && record.employee_id != Some(auth.user_id) {
        return Err(AppError::NotFound("Attendance record"));
    }
    Ok(record)
}


/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = NewAttendance,
    responses(
        (status = 201, description = "Attendance recorded", body = crate::api::AttendanceEnvelope),
        (status = 400, description = "Validation failed or unknown project/employee", body = crate::error::ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate attendance for this date, or project archived", body = crate::error::ErrorBody, example = json!({
            "success": false,
            "error": "Duplicate attendance for this date"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "attendance_check_in", skip_all, fields(actor = auth.user_id))]
pub async fn check_in(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;

    let payload = payload.into_inner().normalized();
    payload.validate()?;

    state
        .projects
        .ensure_writable(state.store.as_ref(), payload.project_id)
        .await?;

    let draft = payload.into_draft(auth.user_id, Utc::now().date_naive());
    let (project_id, date) = (draft.project_id, draft.date);

    match state.store.insert_attendance(draft).await {
        Ok(record) => {
            info!(
                attendance_id = record.id,
                project_id,
                %date,
                kind = ?record.kind(),
                "Attendance recorded"
            );
            Ok(created(record))
        }
        // Duplicate check-in for same person-day
        Err(StoreError::Conflict(Conflict::Attendance)) => {
            info!(project_id, %date, "Duplicate attendance rejected");
            Err(AppError::DuplicateAttendance)
        }
        Err(e) => Err(e.into()),
    }
}

/// Paginated attendance list
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = crate::api::AttendanceList),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let (mut filter, page) = query.into_inner().split();
    if auth.is_worker() {
        filter.employee_id = Some(auth.user_id);
    }

    let records = state.store.list_attendance(&filter, page).await?;
    Ok(paged(records))
}

/// Single attendance record
#[utoipa::path(
    get,
    path = "/api/attendance/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record")
    ),
    responses(
        (status = 200, description = "Attendance record found", body = crate::api::AttendanceEnvelope),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Attendance record not found", body = crate::error::ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let record = load_visible(&auth, &state, path.into_inner()).await?;
    Ok(ok(record))
}

/// Edit an attendance record
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record")
    ),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Attendance updated", body = crate::api::AttendanceEnvelope),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found", body = crate::error::ErrorBody),
        (status = 409, description = "Update would duplicate another record, or project archived", body = crate::error::ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "attendance_update", skip_all, fields(actor = auth.user_id))]
pub async fn update_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;

    let payload = payload.into_inner().normalized();
    payload.validate()?;

    let record = load_visible(&auth, &state, path.into_inner()).await?;
    let store = state.store.as_ref();
    state.projects.ensure_writable(store, record.project_id).await?;
    if let Some(target) = payload.project_id.filter(|p| *p != record.project_id) {
        state.projects.ensure_writable(store, target).await?;
    }

    let record = state
        .store
        .update_attendance(record.id, &payload)
        .await?
        .ok_or(AppError::NotFound("Attendance record"))?;

    info!(attendance_id = record.id, "Attendance updated");
    Ok(ok(record))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/check-out",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record")
    ),
    request_body = CheckOut,
    responses(
        (status = 200, description = "Checked out successfully", body = crate::api::AttendanceEnvelope),
        (status = 400, description = "Validation failed or already checked out", body = crate::error::ErrorBody, example = json!({
            "success": false,
            "error": "Already checked out"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found", body = crate::error::ErrorBody),
        (status = 409, description = "Project archived", body = crate::error::ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<CheckOut>,
) -> Result<HttpResponse, AppError> {
    auth.require_site_staff()?;

    let payload = payload.into_inner();
    payload.validate()?;

    let record = load_visible(&auth, &state, path.into_inner()).await?;
    state
        .projects
        .ensure_writable(state.store.as_ref(), record.project_id)
        .await?;

    let payload = payload.with_derived_hours(record.time_in.as_deref());
    let record = match state.store.check_out_attendance(record.id, &payload).await? {
        Guarded::Applied(record) => record,
        Guarded::Refused => return Err(AppError::BadRequest("Already checked out".to_string())),
        Guarded::Missing => return Err(AppError::NotFound("Attendance record")),
    };

    info!(
        attendance_id = record.id,
        actor = auth.user_id,
        hours = record.hours,
        "Checked out"
    );
    Ok(ok(record))
}

/// Approve an attendance record
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/approve",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record to approve")
    ),
    responses(
        (status = 200, description = "Attendance approved (idempotent)", body = crate::api::AttendanceEnvelope),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found", body = crate::error::ErrorBody),
        (status = 409, description = "Project archived", body = crate::error::ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn approve_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_manager()?;

    let record = load_visible(&auth, &state, path.into_inner()).await?;
    state
        .projects
        .ensure_writable(state.store.as_ref(), record.project_id)
        .await?;

    let record = match state.store.approve_attendance(record.id, auth.user_id).await? {
        Guarded::Applied(record) => record,
        // already approved; the first approver stays
        Guarded::Refused => load_visible(&auth, &state, record.id).await?,
        Guarded::Missing => return Err(AppError::NotFound("Attendance record")),
    };

    info!(attendance_id = record.id, approver = auth.user_id, "Attendance approved");
    Ok(ok(record))
}

/// Delete an attendance record (admin)
#[utoipa::path(
    delete,
    path = "/api/attendance/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "success": true,
            "data": { "id": 7 }
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found", body = crate::error::ErrorBody),
        (status = 409, description = "Project archived", body = crate::error::ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let attendance_id = path.into_inner();
    let record = load_visible(&auth, &state, attendance_id).await?;
    state
        .projects
        .ensure_writable(state.store.as_ref(), record.project_id)
        .await?;

    if !state.store.delete_attendance(attendance_id).await? {
        return Err(AppError::NotFound("Attendance record"));
    }

    info!(attendance_id, actor = auth.user_id, "Attendance deleted");
    Ok(ok(json!({ "id": attendance_id })))
}

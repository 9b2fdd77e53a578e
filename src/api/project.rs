use actix_web::{HttpResponse, web};
use tracing::{info, instrument};
use validator::Validate;

use crate::api::{created, ok, paged};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::project::{NewProject, Project, ProjectQuery, ProjectStatus, UpdateProject};
use crate::state::AppState;
use crate::store::{Guarded, ProjectStore};

async fn load(state: &AppState, project_id: u64) -> Result<Project, AppError> {
    state
        .store
        .get_project(project_id)
        .await?
        .ok_or(AppError::NotFound("Project"))
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Project created", body = crate::api::ProjectEnvelope),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
#[instrument(name = "project_create", skip_all, fields(actor = auth.user_id))]
pub async fn create_project(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewProject>,
) -> Result<HttpResponse, AppError> {
    auth.require_manager()?;

    let payload = payload.into_inner().normalized();
    payload.validate()?;

    let project = state
        .store
        .insert_project(payload.into_draft(auth.user_id))
        .await?;
    state.projects.put(project.id, project.status).await;

    info!(project_id = project.id, "Project created");
    Ok(created(project))
}

/// List projects
#[utoipa::path(
    get,
    path = "/api/projects",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Paginated project list", body = crate::api::ProjectList)
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn list_projects(
    _auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ProjectQuery>,
) -> Result<HttpResponse, AppError> {
    let (status, page) = query.into_inner().split();
    let projects = state.store.list_projects(status, page).await?;
    Ok(paged(projects))
}

/// Get a project
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}",
    params(("project_id" = u64, Path, description = "ID of the project")),
    responses(
        (status = 200, description = "Project found", body = crate::api::ProjectEnvelope),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn get_project(
    _auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    Ok(ok(load(&state, path.into_inner()).await?))
}

/// Update a project
#[utoipa::path(
    put,
    path = "/api/projects/{project_id}",
    params(("project_id" = u64, Path, description = "ID of the project")),
    request_body = UpdateProject,
    responses(
        (status = 200, description = "Project updated", body = crate::api::ProjectEnvelope),
        (status = 400, description = "Validation failed, or archive requested here", body = crate::error::ErrorBody),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
        (status = 409, description = "Project archived", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
#[instrument(name = "project_update", skip_all, fields(actor = auth.user_id))]
pub async fn update_project(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<UpdateProject>,
) -> Result<HttpResponse, AppError> {
    auth.require_manager()?;

    let payload = payload.into_inner().normalized();
    payload.validate()?;
    if payload.status.is_some_and(ProjectStatus::is_archived) {
        return Err(AppError::BadRequest(
            "status: use the archive endpoint to archive a project".to_string(),
        ));
    }

    let project_id = path.into_inner();
    let project = match state.store.update_project(project_id, &payload).await? {
        Guarded::Applied(project) => project,
        Guarded::Refused => {
            state.projects.put(project_id, ProjectStatus::Archived).await;
            return Err(AppError::ProjectArchived(project_id));
        }
        Guarded::Missing => return Err(AppError::NotFound("Project")),
    };
    state.projects.put(project.id, project.status).await;

    info!(project_id = project.id, status = %project.status, "Project updated");
    Ok(ok(project))
}

/// Archive a project. Attendance on it becomes read-only.
#[utoipa::path(
    put,
    path = "/api/projects/{project_id}/archive",
    params(("project_id" = u64, Path, description = "ID of the project")),
    responses(
        (status = 200, description = "Project archived (idempotent)", body = crate::api::ProjectEnvelope),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn archive_project(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_manager()?;

    let project = state
        .store
        .archive_project(path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Project"))?;
    state.projects.put(project.id, project.status).await;

    info!(project_id = project.id, actor = auth.user_id, "Project archived");
    Ok(ok(project))
}

#[cfg(test)]
mod tests {
    use actix_web::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::{fixture, id_of, send, test_app};

    #[actix_web::test]
    async fn managers_create_projects_supervisors_cannot() {
        let fx = fixture().await;
        let app = test_app!(fx);
        let payload = json!({ "name": "  Metro Depot ", "location": "Pune" });

        let (status, _) = send!(
            app,
            fx.request(Method::POST, "/api/projects", Some(&fx.supervisor)).set_json(&payload)
        );
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send!(
            app,
            fx.request(Method::POST, "/api/projects", Some(&fx.manager)).set_json(&payload)
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["name"], "Metro Depot");
        assert_eq!(body["data"]["status"], "active");

        let (_, body) = send!(
            app,
            fx.request(Method::GET, "/api/projects?status=active", Some(&fx.worker))
        );
        assert_eq!(body["pagination"]["total"], 3);
    }

    #[actix_web::test]
    async fn archived_project_freezes_attendance() {
        let fx = fixture().await;
        let app = test_app!(fx);
        let sup = Some(&fx.supervisor);
        let labour = json!({
            "employee_name": "Mohan",
            "project_id": fx.site_a.id,
            "date": "2024-01-10"
        });

        let (_, body) = send!(
            app,
            fx.request(Method::POST, "/api/attendance", sup).set_json(&labour)
        );
        let record = id_of(&body);

        let archive = format!("/api/projects/{}/archive", fx.site_a.id);
        let (status, body) = send!(app, fx.request(Method::PUT, &archive, Some(&fx.manager)));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "archived");

        let (status, body) = send!(
            app,
            fx.request(Method::POST, "/api/attendance", sup).set_json(json!({
                "employee_name": "Suresh",
                "project_id": fx.site_a.id,
                "date": "2024-01-10"
            }))
        );
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], format!("Project {} is archived", fx.site_a.id));

        let (status, _) = send!(
            app,
            fx.request(Method::PUT, &format!("/api/attendance/{record}/check-out"), sup)
                .set_json(json!({ "time_out": "17:00" }))
        );
        assert_eq!(status, StatusCode::CONFLICT);

        // reads still work
        let (status, _) = send!(
            app,
            fx.request(Method::GET, &format!("/api/attendance/{record}"), sup)
        );
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send!(
            app,
            fx.request(
                Method::PUT,
                &format!("/api/projects/{}", fx.site_a.id),
                Some(&fx.manager)
            )
            .set_json(json!({ "status": "active" }))
        );
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn update_cannot_archive() {
        let fx = fixture().await;
        let app = test_app!(fx);
        let uri = format!("/api/projects/{}", fx.site_b.id);

        let (status, _) = send!(
            app,
            fx.request(Method::PUT, &uri, Some(&fx.manager))
                .set_json(json!({ "status": "archived" }))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send!(
            app,
            fx.request(Method::PUT, &uri, Some(&fx.manager))
                .set_json(json!({ "status": "on_hold", "location": "Nashik" }))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "on_hold");
        assert_eq!(body["data"]["location"], "Nashik");

        let (status, _) = send!(
            app,
            fx.request(Method::GET, "/api/projects/424242", Some(&fx.worker))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

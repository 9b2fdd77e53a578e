use actix_web::{HttpResponse, web};
use tracing::{info, instrument};
use validator::Validate;

use crate::api::{created, ok, paged};
use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::model::page::{Page, PageRequest};
use crate::model::user::{NewUser, UserDraft, UserResponse};
use crate::state::AppState;
use crate::store::UserStore;

#[derive(Debug, serde::Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub limit: Option<u64>,
}

/// Create a user (admin)
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = crate::api::UserEnvelope),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Username already exists", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(name = "user_create", skip_all, fields(actor = auth.user_id))]
pub async fn create_user(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let payload = payload.into_inner().normalized();
    payload.validate()?;

    let password = hash_password(&payload.password)?;
    let user = state
        .store
        .insert_user(UserDraft {
            username: payload.username,
            password,
            full_name: payload.full_name,
            mobile_number: payload.mobile_number,
            role: payload.role,
        })
        .await?;

    info!(user_id = user.id, role = %user.role, "User created");
    Ok(created(UserResponse::from(user)))
}

/// List users (admin)
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated user list", body = crate::api::UserList),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let query = query.into_inner();
    let page = state
        .store
        .list_users(PageRequest::new(query.page, query.limit))
        .await?;

    Ok(paged(Page {
        items: page.items.into_iter().map(UserResponse::from).collect(),
        total: page.total,
        request: page.request,
    }))
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = crate::api::UserEnvelope),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = state
        .store
        .get_user(auth.user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(ok(UserResponse::from(user)))
}

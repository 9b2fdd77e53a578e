use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token_of_type;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

/// The authenticated actor. Every write handler takes one; there is no
/// anonymous fallback.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role = Role::from_id(claims.role).ok_or(AppError::Unauthorized("Invalid role"))?;
        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        })
    }
}

/// Pulls the bearer token out of the `Authorization` header.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or(AppError::Unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding"))?;

    header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Authorization header must start with Bearer"))
}

fn extract(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // already decoded by the middleware
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token = bearer_token(req)?;
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal("Config missing from app data".to_string()))?;

    let claims = verify_token_of_type(token, &config.jwt_secret, TokenType::Access)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token"))?;
    AuthUser::try_from(claims)
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(extract(req).map_err(actix_web::Error::from))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only"))
        }
    }

    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.role.can_manage_projects() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin/Project manager only"))
        }
    }

    pub fn require_site_staff(&self) -> Result<(), AppError> {
        if self.role.can_record_attendance() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Supervisor or above only"))
        }
    }

    /// Workers only ever see their own attendance.
    pub fn is_worker(&self) -> bool {
        self.role == Role::Worker
    }
}

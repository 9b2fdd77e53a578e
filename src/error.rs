use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::auth::password::PasswordError;
use crate::store::{Conflict, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldError {
    #[schema(example = "time_in")]
    pub field: String,
    #[schema(example = "must be HH:MM in 24-hour format")]
    pub message: String,
}

/// Body of every failed response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = "Duplicate attendance for this date")]
    pub error: String,
    /// Present on validation failures only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Duplicate attendance for this date")]
    DuplicateAttendance,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Project {0} is archived")]
    ProjectArchived(u64),

    /// Detail is logged, never sent to the client.
    #[error("Internal Server Error")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |err| FieldError {
                    field: field.clone(),
                    message: match &err.message {
                        Some(message) => message.to_string(),
                        None => format!("is invalid ({})", err.code),
                    },
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(Conflict::Attendance) => AppError::DuplicateAttendance,
            StoreError::Conflict(Conflict::Username) => AppError::UsernameTaken,
            StoreError::UnknownReference(message) => AppError::BadRequest(message),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("token encoding failed: {e}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateAttendance
            | AppError::UsernameTaken
            | AppError::ProjectArchived(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let errors = match self {
            AppError::Validation(errors) => Some(errors.clone()),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                None
            }
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.to_string(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 2))]
        name: String,
        #[validate(range(max = 24.0, message = "must be between 0 and 24"))]
        hours: f64,
    }

    #[test]
    fn validation_errors_are_listed_per_field() {
        let errors = Probe {
            name: "x".into(),
            hours: 30.0,
        }
        .validate()
        .unwrap_err();
        let AppError::Validation(fields) = AppError::from(errors) else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "hours");
        assert_eq!(fields[0].message, "must be between 0 and 24");
        assert_eq!(fields[1].field, "name");
        assert_eq!(fields[1].message, "is invalid (length)");
    }

    #[test]
    fn store_conflicts_map_to_409() {
        let err = AppError::from(StoreError::Conflict(Conflict::Attendance));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Duplicate attendance for this date");

        let err = AppError::from(StoreError::UnknownReference("project_id".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn internal_detail_is_not_leaked() {
        let resp = AppError::Internal("secret connection string".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Internal Server Error");
    }
}

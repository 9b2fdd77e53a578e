pub mod attendance;
pub mod project;
pub mod user;

use actix_web::HttpResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::AttendanceRecord;
use crate::model::page::{Page, Pagination};
use crate::model::project::Project;
use crate::model::user::UserResponse;
use crate::models::TokenPair;

/// `{ "success": true, "data": ... }`
#[derive(Serialize, ToSchema)]
#[aliases(
    AttendanceEnvelope = ApiResponse<AttendanceRecord>,
    ProjectEnvelope = ApiResponse<Project>,
    UserEnvelope = ApiResponse<UserResponse>,
    TokenEnvelope = ApiResponse<TokenPair>
)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Serialize, ToSchema)]
#[aliases(
    AttendanceList = ListResponse<AttendanceRecord>,
    ProjectList = ListResponse<Project>,
    UserList = ListResponse<UserResponse>
)]
pub struct ListResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(ApiResponse {
        success: true,
        data,
    })
}

pub fn paged<T: Serialize>(page: Page<T>) -> HttpResponse {
    let pagination = page.pagination();
    HttpResponse::Ok().json(ListResponse {
        success: true,
        data: page.items,
        pagination,
    })
}

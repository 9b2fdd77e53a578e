use crate::api::{
    AttendanceEnvelope, AttendanceList, ProjectEnvelope, ProjectList, TokenEnvelope,
    UserEnvelope, UserList,
};
use crate::error::{ErrorBody, FieldError};
use crate::model::attendance::{
    AttendanceKind, AttendanceRecord, AttendanceStatus, CheckOut, NewAttendance, UpdateAttendance,
};
use crate::model::page::Pagination;
use crate::model::project::{NewProject, Project, ProjectStatus, UpdateProject};
use crate::model::role::Role;
use crate::model::user::{NewUser, UserResponse};
use crate::models::{LoginReqDto, TokenPair};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sitebook API",
        version = "1.0.0",
        description = r#"
## Construction site attendance

Daily attendance for a construction company's sites.

### Who is recorded
- **Employees** have a user account and appear at most once per calendar day,
  across all projects
- **Labour** are identified only by name and appear at most once per day
  per project

A second check-in for the same person-day is rejected with **409**.

### Security
All `/api` endpoints require a **JWT Bearer** access token. Supervisors and
above record attendance, project managers approve it, admins delete it.

### Response format
- `{ "success": true, "data": ... }` on success
- list endpoints add `pagination`
- `{ "success": false, "error": ..., "errors": [...] }` on failure
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::check_in,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::check_out,
        crate::api::attendance::approve_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::project::create_project,
        crate::api::project::list_projects,
        crate::api::project::get_project,
        crate::api::project::update_project,
        crate::api::project::archive_project,

        crate::api::user::create_user,
        crate::api::user::list_users,
        crate::api::user::me
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceStatus,
            AttendanceKind,
            NewAttendance,
            UpdateAttendance,
            CheckOut,
            Project,
            ProjectStatus,
            NewProject,
            UpdateProject,
            UserResponse,
            NewUser,
            Role,
            LoginReqDto,
            TokenPair,
            Pagination,
            ErrorBody,
            FieldError,
            AttendanceEnvelope,
            AttendanceList,
            ProjectEnvelope,
            ProjectList,
            UserEnvelope,
            UserList,
            TokenEnvelope
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Attendance", description = "Daily attendance records"),
        (name = "Projects", description = "Construction projects"),
        (name = "Users", description = "User accounts"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

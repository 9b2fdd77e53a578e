//! Storage contract for users, projects and attendance.
//!
//! Two backends implement it: [`mysql::MySqlStore`] for deployments and
//! [`memory::MemoryStore`] for local runs and tests. Both enforce the
//! attendance uniqueness policy inside the store, so two concurrent
//! check-ins for the same person-day cannot both succeed:
//!
//! * employee rows (`employee_id` set) are unique on `(employee_id, date)`;
//! * labour rows (`employee_id` null) are unique on
//!   `(employee_name, date, project_id)`.
//!
//! A violation comes back as [`StoreError::Conflict`] and is never retried.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::attendance::{
    AttendanceDraft, AttendanceFilter, AttendanceRecord, CheckOut, UpdateAttendance,
};
use crate::model::page::{Page, PageRequest};
use crate::model::project::{Project, ProjectDraft, ProjectStatus, UpdateProject};
use crate::model::user::{User, UserDraft};

/// Which uniqueness rule a write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Attendance,
    Username,
}

/// Result of a write that only applies while the stored row still meets
/// its precondition. The check and the write happen in one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    Applied(T),
    /// The row exists but no longer meets the precondition.
    Refused,
    Missing,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    Conflict(Conflict),

    /// A referenced user or project does not exist.
    #[error("{0}")]
    UnknownReference(String),

    /// A stored value could not be mapped back to the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, draft: UserDraft) -> Result<User, StoreError>;

    async fn get_user(&self, id: u64) -> Result<Option<User>, StoreError>;

    /// `username` is matched lowercase.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self, page: PageRequest) -> Result<Page<User>, StoreError>;

    async fn count_users(&self) -> Result<u64, StoreError>;

    async fn touch_last_login(&self, id: u64) -> Result<(), StoreError>;

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Revokes an active refresh token and returns its owner. `None` when
    /// the token is unknown or was already revoked, so a token can only be
    /// spent once.
    async fn revoke_refresh_token(&self, jti: &str) -> Result<Option<u64>, StoreError>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, draft: ProjectDraft) -> Result<Project, StoreError>;

    async fn get_project(&self, id: u64) -> Result<Option<Project>, StoreError>;

    /// Writes the fields set in `changes`. Refused once the project is
    /// archived.
    async fn update_project(
        &self,
        id: u64,
        changes: &UpdateProject,
    ) -> Result<Guarded<Project>, StoreError>;

    /// Idempotent. `None` when the project does not exist.
    async fn archive_project(&self, id: u64) -> Result<Option<Project>, StoreError>;

    async fn list_projects(
        &self,
        status: Option<ProjectStatus>,
        page: PageRequest,
    ) -> Result<Page<Project>, StoreError>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Fails with [`Conflict::Attendance`] when the draft's person-day is
    /// already recorded.
    async fn insert_attendance(&self, draft: AttendanceDraft)
    -> Result<AttendanceRecord, StoreError>;

    async fn get_attendance(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Writes the fields set in `changes` under the same uniqueness rules as
    /// insert. Approval columns are never touched. `None` when the row is
    /// gone.
    async fn update_attendance(
        &self,
        id: u64,
        changes: &UpdateAttendance,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Sets `time_out` and the check-out fields. Refused when the record
    /// already has a `time_out`.
    async fn check_out_attendance(
        &self,
        id: u64,
        check_out: &CheckOut,
    ) -> Result<Guarded<AttendanceRecord>, StoreError>;

    /// Refused when the record is already approved, so the first approver
    /// is kept.
    async fn approve_attendance(
        &self,
        id: u64,
        approver: u64,
    ) -> Result<Guarded<AttendanceRecord>, StoreError>;

    async fn delete_attendance(&self, id: u64) -> Result<bool, StoreError>;

    /// Ordered by `date` desc, then `id` desc.
    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>, StoreError>;
}

pub trait Store: UserStore + ProjectStore + AttendanceStore {}

impl<T: UserStore + ProjectStore + AttendanceStore> Store for T {}

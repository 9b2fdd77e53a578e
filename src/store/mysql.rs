use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, MySqlPool};

use super::{AttendanceStore, Conflict, Guarded, ProjectStore, StoreError, UserStore};
use crate::model::attendance::{
    AttendanceDraft, AttendanceFilter, AttendanceKind, AttendanceRecord, CheckOut,
    UpdateAttendance,
};
use crate::model::page::{Page, PageRequest};
use crate::model::project::{Project, ProjectDraft, ProjectStatus, UpdateProject};
use crate::model::role::Role;
use crate::model::user::{User, UserDraft};

const USER_COLS: &str =
    "id, username, password, full_name, mobile_number, role_id, is_active, created_at, last_login_at";

const PROJECT_COLS: &str = "id, name, location, status, created_by, created_at, updated_at";

const ATTENDANCE_COLS: &str = "id, employee_id, employee_name, mobile_number, project_id, \
     labour_type, date, time_in, time_out, status, hours, overtime_hours, notes, attachments, \
     approved_by, is_approved, created_by, created_at, updated_at";

#[derive(FromRow)]
struct UserSql {
    id: u64, // BIGINT UNSIGNED
    username: String,
    password: String,
    full_name: String,
    mobile_number: Option<String>,
    role_id: u8,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserSql> for User {
    type Error = StoreError;

    fn try_from(row: UserSql) -> Result<Self, Self::Error> {
        let role = Role::from_id(row.role_id)
            .ok_or_else(|| StoreError::Corrupt(format!("user {}: role id {}", row.id, row.role_id)))?;
        Ok(User {
            id: row.id,
            username: row.username,
            password: row.password,
            full_name: row.full_name,
            mobile_number: row.mobile_number,
            role,
            is_active: row.is_active,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

#[derive(FromRow)]
struct ProjectSql {
    id: u64,
    name: String,
    location: Option<String>,
    status: String,
    created_by: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectSql> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectSql) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("project {}: status {:?}", row.id, row.status)))?;
        Ok(Project {
            id: row.id,
            name: row.name,
            location: row.location,
            status,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AttendanceSql {
    id: u64,
    employee_id: Option<u64>,
    employee_name: String,
    mobile_number: Option<String>,
    project_id: u64,
    labour_type: Option<String>,
    date: NaiveDate,
    time_in: Option<String>,
    time_out: Option<String>,
    status: String,
    hours: f64,
    overtime_hours: f64,
    notes: Option<String>,
    attachments: Json<Vec<u64>>,
    approved_by: Option<u64>,
    is_approved: bool,
    created_by: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceSql> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceSql) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| {
            StoreError::Corrupt(format!("attendance {}: status {:?}", row.id, row.status))
        })?;
        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            mobile_number: row.mobile_number,
            project_id: row.project_id,
            labour_type: row.labour_type,
            date: row.date,
            time_in: row.time_in,
            time_out: row.time_out,
            status,
            hours: row.hours,
            overtime_hours: row.overtime_hours,
            notes: row.notes,
            attachments: row.attachments.0,
            approved_by: row.approved_by,
            is_approved: row.is_approved,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
    Bool(bool),
}

fn attendance_where(filter: &AttendanceFilter) -> (String, Vec<FilterValue>) {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();

    if let Some(v) = filter.project_id {
        where_sql.push_str(" AND project_id = ?");
        args.push(FilterValue::U64(v));
    }
    if let Some(v) = filter.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(v));
    }
    if let Some(v) = filter.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(v.to_string()));
    }
    if let Some(v) = filter.date {
        where_sql.push_str(" AND date = ?");
        args.push(FilterValue::Date(v));
    }
    if let Some(v) = filter.from {
        where_sql.push_str(" AND date >= ?");
        args.push(FilterValue::Date(v));
    }
    if let Some(v) = filter.to {
        where_sql.push_str(" AND date <= ?");
        args.push(FilterValue::Date(v));
    }
    if let Some(v) = filter.is_approved {
        where_sql.push_str(" AND is_approved = ?");
        args.push(FilterValue::Bool(v));
    }
    match filter.kind {
        Some(AttendanceKind::Employee) => where_sql.push_str(" AND employee_id IS NOT NULL"),
        Some(AttendanceKind::Labour) => where_sql.push_str(" AND employee_id IS NULL"),
        None => {}
    }

    (where_sql, args)
}

/// Maps constraint violations on a write to domain errors.
fn write_error(e: sqlx::Error, conflict: Option<Conflict>) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if let (true, Some(conflict)) = (db_err.is_unique_violation(), conflict) {
            return StoreError::Conflict(conflict);
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::UnknownReference(
                "referenced user or project does not exist".to_string(),
            );
        }
    }
    StoreError::Database(e)
}

/// `Missing` when the row was deleted right after its guarded write.
fn applied<T>(row: Option<T>) -> Guarded<T> {
    row.map_or(Guarded::Missing, Guarded::Applied)
}

fn to_total(total: i64) -> u64 {
    u64::try_from(total).unwrap_or(0)
}

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserSql>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn fetch_project(&self, id: u64) -> Result<Option<Project>, StoreError> {
        let sql = format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?");
        sqlx::query_as::<_, ProjectSql>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Project::try_from)
            .transpose()
    }

    async fn fetch_attendance(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!("SELECT {ATTENDANCE_COLS} FROM attendance WHERE id = ?");
        sqlx::query_as::<_, AttendanceSql>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn exists(&self, table: &str, id: u64) -> Result<bool, StoreError> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?)");
        let found = sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn insert_user(&self, draft: UserDraft) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password, full_name, mobile_number, role_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.username.to_lowercase())
        .bind(&draft.password)
        .bind(&draft.full_name)
        .bind(&draft.mobile_number)
        .bind(draft.role.id())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, Some(Conflict::Username)))?;

        let id = result.last_insert_id();
        self.fetch_user(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("user {id} missing after insert")))
    }

    async fn get_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        self.fetch_user(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE username = ?");
        sqlx::query_as::<_, UserSql>(&sql)
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self, page: PageRequest) -> Result<Page<User>, StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!("SELECT {USER_COLS} FROM users ORDER BY id DESC LIMIT ? OFFSET ?");
        let items = sqlx::query_as::<_, UserSql>(&sql)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: to_total(total),
            request: page,
        })
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(to_total(total))
    }

    async fn touch_last_login(&self, id: u64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, None))?;
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<Option<u64>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = ?
            AND revoked = FALSE
            "#,
        )
        .bind(jti)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let user_id =
            sqlx::query_scalar::<_, u64>("SELECT user_id FROM refresh_tokens WHERE jti = ?")
                .bind(jti)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user_id)
    }
}

#[async_trait]
impl ProjectStore for MySqlStore {
    async fn insert_project(&self, draft: ProjectDraft) -> Result<Project, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO projects (name, location, status, created_by)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.location)
        .bind(draft.status.to_string())
        .bind(draft.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, None))?;

        let id = result.last_insert_id();
        self.fetch_project(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("project {id} missing after insert")))
    }

    async fn get_project(&self, id: u64) -> Result<Option<Project>, StoreError> {
        self.fetch_project(id).await
    }

    async fn update_project(
        &self,
        id: u64,
        changes: &UpdateProject,
    ) -> Result<Guarded<Project>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = COALESCE(?, name),
                location = COALESCE(?, location),
                status = COALESCE(?, status),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            AND status <> 'archived'
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.location)
        .bind(changes.status.map(|s| s.to_string()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        let project = self.fetch_project(id).await?;
        // an unchanged row can report zero affected rows
        if result.rows_affected() == 0 && project.as_ref().is_some_and(|p| p.status.is_archived()) {
            return Ok(Guarded::Refused);
        }
        Ok(applied(project))
    }

    async fn archive_project(&self, id: u64) -> Result<Option<Project>, StoreError> {
        sqlx::query(
            r#"
            UPDATE projects
            SET status = 'archived', updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            AND status <> 'archived'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.fetch_project(id).await
    }

    async fn list_projects(
        &self,
        status: Option<ProjectStatus>,
        page: PageRequest,
    ) -> Result<Page<Project>, StoreError> {
        let where_sql = if status.is_some() { " WHERE status = ?" } else { "" };
        let status = status.map(|s| s.to_string());

        let count_sql = format!("SELECT COUNT(*) FROM projects{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(s) = &status {
            count_q = count_q.bind(s);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql =
            format!("SELECT {PROJECT_COLS} FROM projects{where_sql} ORDER BY id DESC LIMIT ? OFFSET ?");
        let mut data_q = sqlx::query_as::<_, ProjectSql>(&data_sql);
        if let Some(s) = &status {
            data_q = data_q.bind(s);
        }
        let items = data_q
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Project::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: to_total(total),
            request: page,
        })
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn insert_attendance(
        &self,
        draft: AttendanceDraft,
    ) -> Result<AttendanceRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, employee_name, mobile_number, project_id, labour_type, date,
                 time_in, time_out, status, hours, overtime_hours, notes, attachments, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.employee_id)
        .bind(&draft.employee_name)
        .bind(&draft.mobile_number)
        .bind(draft.project_id)
        .bind(&draft.labour_type)
        .bind(draft.date)
        .bind(&draft.time_in)
        .bind(&draft.time_out)
        .bind(draft.status.to_string())
        .bind(draft.hours)
        .bind(draft.overtime_hours)
        .bind(&draft.notes)
        .bind(Json(&draft.attachments))
        .bind(draft.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, Some(Conflict::Attendance)))?;

        let id = result.last_insert_id();
        self.fetch_attendance(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("attendance {id} missing after insert")))
    }

    async fn get_attendance(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        self.fetch_attendance(id).await
    }

    async fn update_attendance(
        &self,
        id: u64,
        changes: &UpdateAttendance,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET employee_name = COALESCE(?, employee_name),
                mobile_number = COALESCE(?, mobile_number),
                project_id = COALESCE(?, project_id),
                labour_type = COALESCE(?, labour_type),
                date = COALESCE(?, date),
                time_in = COALESCE(?, time_in),
                time_out = COALESCE(?, time_out),
                status = COALESCE(?, status),
                hours = COALESCE(?, hours),
                overtime_hours = COALESCE(?, overtime_hours),
                notes = COALESCE(?, notes),
                attachments = COALESCE(?, attachments),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&changes.employee_name)
        .bind(&changes.mobile_number)
        .bind(changes.project_id)
        .bind(&changes.labour_type)
        .bind(changes.date)
        .bind(&changes.time_in)
        .bind(&changes.time_out)
        .bind(changes.status.map(|s| s.to_string()))
        .bind(changes.hours)
        .bind(changes.overtime_hours)
        .bind(&changes.notes)
        .bind(changes.attachments.as_ref().map(Json))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, Some(Conflict::Attendance)))?;

        if result.rows_affected() == 0 && !self.exists("attendance", id).await? {
            return Ok(None);
        }
        self.fetch_attendance(id).await
    }

    async fn check_out_attendance(
        &self,
        id: u64,
        check_out: &CheckOut,
    ) -> Result<Guarded<AttendanceRecord>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET time_out = ?,
                hours = COALESCE(?, hours),
                overtime_hours = COALESCE(?, overtime_hours),
                status = COALESCE(?, status),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            AND time_out IS NULL
            "#,
        )
        .bind(check_out.time_out.trim())
        .bind(check_out.hours)
        .bind(check_out.overtime_hours)
        .bind(check_out.status.map(|s| s.to_string()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(if self.exists("attendance", id).await? {
                Guarded::Refused
            } else {
                Guarded::Missing
            });
        }
        Ok(applied(self.fetch_attendance(id).await?))
    }

    async fn approve_attendance(
        &self,
        id: u64,
        approver: u64,
    ) -> Result<Guarded<AttendanceRecord>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET is_approved = TRUE,
                approved_by = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            AND is_approved = FALSE
            "#,
        )
        .bind(approver)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, None))?;

        if result.rows_affected() == 0 {
            return Ok(if self.exists("attendance", id).await? {
                Guarded::Refused
            } else {
                Guarded::Missing
            });
        }
        Ok(applied(self.fetch_attendance(id).await?))
    }

    async fn delete_attendance(&self, id: u64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>, StoreError> {
        let (where_sql, args) = attendance_where(filter);

        // -------------------------
        // COUNT query
        // -------------------------
        let count_sql = format!("SELECT COUNT(*) FROM attendance{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Str(s) => count_q.bind(s.as_str()),
                FilterValue::Date(d) => count_q.bind(*d),
                FilterValue::Bool(b) => count_q.bind(*b),
            };
        }
        let total = count_q.fetch_one(&self.pool).await?;

        // -------------------------
        // DATA query
        // -------------------------
        let data_sql = format!(
            "SELECT {ATTENDANCE_COLS} FROM attendance{where_sql} \
             ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut data_q = sqlx::query_as::<_, AttendanceSql>(&data_sql);
        for arg in &args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(*v),
                FilterValue::Str(s) => data_q.bind(s.as_str()),
                FilterValue::Date(d) => data_q.bind(*d),
                FilterValue::Bool(b) => data_q.bind(*b),
            };
        }
        let items = data_q
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: to_total(total),
            request: page,
        })
    }
}

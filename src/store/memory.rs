use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AttendanceStore, Conflict, Guarded, ProjectStore, StoreError, UserStore};
use crate::model::attendance::{
    AttendanceDraft, AttendanceFilter, AttendanceKey, AttendanceRecord, CheckOut,
    UpdateAttendance,
};
use crate::model::page::{Page, PageRequest};
use crate::model::project::{Project, ProjectDraft, ProjectStatus, UpdateProject};
use crate::model::user::{User, UserDraft};

struct RefreshToken {
    user_id: u64,
    revoked: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    users: BTreeMap<u64, User>,
    refresh_tokens: HashMap<String, RefreshToken>,
    projects: BTreeMap<u64, Project>,
    attendance: BTreeMap<u64, AttendanceRecord>,
    /// Person-day index; plays the part of both partial unique indexes.
    attendance_keys: HashMap<AttendanceKey, u64>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_user(&self, id: u64, field: &str) -> Result<(), StoreError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::UnknownReference(format!("{field}: user {id} does not exist")))
        }
    }

    fn check_attendance_refs(
        &self,
        employee_id: Option<u64>,
        project_id: u64,
        approved_by: Option<u64>,
        created_by: u64,
    ) -> Result<(), StoreError> {
        if let Some(id) = employee_id {
            self.require_user(id, "employee_id")?;
        }
        if let Some(id) = approved_by {
            self.require_user(id, "approved_by")?;
        }
        self.require_user(created_by, "created_by")?;
        if !self.projects.contains_key(&project_id) {
            return Err(StoreError::UnknownReference(format!(
                "project_id: project {project_id} does not exist"
            )));
        }
        Ok(())
    }
}

/// In-process store. Every write takes one lock for its check and its
/// mutation, which gives the same atomicity as a unique index.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, draft: UserDraft) -> Result<User, StoreError> {
        let mut state = self.write();
        let username = draft.username.to_lowercase();
        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict(Conflict::Username));
        }
        let id = state.allocate_id();
        let user = UserDraft { username, ..draft }.into_user(id, Utc::now());
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let username = username.to_lowercase();
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, page: PageRequest) -> Result<Page<User>, StoreError> {
        let users = self.read().users.values().rev().cloned().collect();
        Ok(Page::from_sorted(users, page))
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.read().users.len() as u64)
    }

    async fn touch_last_login(&self, id: u64) -> Result<(), StoreError> {
        if let Some(user) = self.write().users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.write();
        state.require_user(user_id, "user_id")?;
        state.refresh_tokens.insert(
            jti.to_string(),
            RefreshToken {
                user_id,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<Option<u64>, StoreError> {
        let mut state = self.write();
        Ok(match state.refresh_tokens.get_mut(jti) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Some(token.user_id)
            }
            _ => None,
        })
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, draft: ProjectDraft) -> Result<Project, StoreError> {
        let mut state = self.write();
        state.require_user(draft.created_by, "created_by")?;
        let id = state.allocate_id();
        let project = draft.into_project(id, Utc::now());
        state.projects.insert(id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: u64) -> Result<Option<Project>, StoreError> {
        Ok(self.read().projects.get(&id).cloned())
    }

    async fn update_project(
        &self,
        id: u64,
        changes: &UpdateProject,
    ) -> Result<Guarded<Project>, StoreError> {
        let mut state = self.write();
        let Some(stored) = state.projects.get_mut(&id) else {
            return Ok(Guarded::Missing);
        };
        if stored.status.is_archived() {
            return Ok(Guarded::Refused);
        }
        changes.apply_to(stored);
        stored.updated_at = Utc::now();
        Ok(Guarded::Applied(stored.clone()))
    }

    async fn archive_project(&self, id: u64) -> Result<Option<Project>, StoreError> {
        let mut state = self.write();
        let Some(stored) = state.projects.get_mut(&id) else {
            return Ok(None);
        };
        if !stored.status.is_archived() {
            stored.status = ProjectStatus::Archived;
            stored.updated_at = Utc::now();
        }
        Ok(Some(stored.clone()))
    }

    async fn list_projects(
        &self,
        status: Option<ProjectStatus>,
        page: PageRequest,
    ) -> Result<Page<Project>, StoreError> {
        let projects = self
            .read()
            .projects
            .values()
            .rev()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        Ok(Page::from_sorted(projects, page))
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert_attendance(
        &self,
        draft: AttendanceDraft,
    ) -> Result<AttendanceRecord, StoreError> {
        let mut state = self.write();
        state.check_attendance_refs(draft.employee_id, draft.project_id, None, draft.created_by)?;

        let key = draft.key();
        if state.attendance_keys.contains_key(&key) {
            return Err(StoreError::Conflict(Conflict::Attendance));
        }

        let id = state.allocate_id();
        let record = draft.into_record(id, Utc::now());
        state.attendance_keys.insert(key, id);
        state.attendance.insert(id, record.clone());
        Ok(record)
    }

    async fn get_attendance(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.read().attendance.get(&id).cloned())
    }

    async fn update_attendance(
        &self,
        id: u64,
        changes: &UpdateAttendance,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let mut state = self.write();
        let Some(stored) = state.attendance.get(&id) else {
            return Ok(None);
        };
        let old_key = stored.key();
        let mut record = stored.clone();
        changes.apply_to(&mut record);
        state.check_attendance_refs(
            record.employee_id,
            record.project_id,
            record.approved_by,
            record.created_by,
        )?;

        let new_key = record.key();
        if new_key != old_key {
            if state.attendance_keys.contains_key(&new_key) {
                return Err(StoreError::Conflict(Conflict::Attendance));
            }
            state.attendance_keys.remove(&old_key);
            state.attendance_keys.insert(new_key, id);
        }

        record.updated_at = Utc::now();
        state.attendance.insert(id, record.clone());
        Ok(Some(record))
    }

    async fn check_out_attendance(
        &self,
        id: u64,
        check_out: &CheckOut,
    ) -> Result<Guarded<AttendanceRecord>, StoreError> {
        let mut state = self.write();
        let Some(stored) = state.attendance.get_mut(&id) else {
            return Ok(Guarded::Missing);
        };
        if stored.time_out.is_some() {
            return Ok(Guarded::Refused);
        }
        check_out.apply_to(stored);
        stored.updated_at = Utc::now();
        Ok(Guarded::Applied(stored.clone()))
    }

    async fn approve_attendance(
        &self,
        id: u64,
        approver: u64,
    ) -> Result<Guarded<AttendanceRecord>, StoreError> {
        let mut state = self.write();
        state.require_user(approver, "approved_by")?;
        let Some(stored) = state.attendance.get_mut(&id) else {
            return Ok(Guarded::Missing);
        };
        if stored.is_approved {
            return Ok(Guarded::Refused);
        }
        stored.is_approved = true;
        stored.approved_by = Some(approver);
        stored.updated_at = Utc::now();
        Ok(Guarded::Applied(stored.clone()))
    }

    async fn delete_attendance(&self, id: u64) -> Result<bool, StoreError> {
        let mut state = self.write();
        match state.attendance.remove(&id) {
            Some(record) => {
                state.attendance_keys.remove(&record.key());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>, StoreError> {
        let mut records: Vec<AttendanceRecord> = self
            .read()
            .attendance
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(Page::from_sorted(records, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use crate::model::role::Role;
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Site {
        store: MemoryStore,
        supervisor: u64,
        employee: u64,
        p1: u64,
        p2: u64,
    }

    async fn site() -> Site {
        let store = MemoryStore::new();
        let user = |username: &str, role| UserDraft {
            username: username.into(),
            password: "hash".into(),
            full_name: username.into(),
            mobile_number: None,
            role,
        };
        let supervisor = store.insert_user(user("sup", Role::Supervisor)).await.unwrap().id;
        let employee = store.insert_user(user("emp", Role::Worker)).await.unwrap().id;
        let project = |name: &str| ProjectDraft {
            name: name.into(),
            location: None,
            status: ProjectStatus::Active,
            created_by: supervisor,
        };
        let p1 = store.insert_project(project("P1")).await.unwrap().id;
        let p2 = store.insert_project(project("P2")).await.unwrap().id;
        Site {
            store,
            supervisor,
            employee,
            p1,
            p2,
        }
    }

    impl Site {
        fn labour(&self, name: &str, project_id: u64, date: &str) -> AttendanceDraft {
            AttendanceDraft {
                employee_id: None,
                employee_name: name.into(),
                mobile_number: None,
                project_id,
                labour_type: Some("helper".into()),
                date: day(date),
                time_in: Some("08:00".into()),
                time_out: None,
                status: AttendanceStatus::Present,
                hours: 0.0,
                overtime_hours: 0.0,
                notes: None,
                attachments: vec![],
                created_by: self.supervisor,
            }
        }

        fn employee(&self, project_id: u64, date: &str) -> AttendanceDraft {
            AttendanceDraft {
                employee_id: Some(self.employee),
                employee_name: "emp".into(),
                ..self.labour("emp", project_id, date)
            }
        }
    }

    fn is_attendance_conflict(err: &StoreError) -> bool {
        matches!(err, StoreError::Conflict(Conflict::Attendance))
    }

    #[actix_web::test]
    async fn labour_checkin_scenario() {
        let site = site().await;
        site.store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();

        let err = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap_err();
        assert!(is_attendance_conflict(&err));

        site.store
            .insert_attendance(site.labour("Ravi", site.p2, "2024-01-10"))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn different_labourers_share_a_day_and_project() {
        let site = site().await;
        for name in ["Ravi", "Suresh", "Meena"] {
            site.store
                .insert_attendance(site.labour(name, site.p1, "2024-01-10"))
                .await
                .unwrap();
        }
        let page = site
            .store
            .list_attendance(&AttendanceFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
    }

    #[actix_web::test]
    async fn employee_is_unique_per_day_across_projects() {
        let site = site().await;
        site.store
            .insert_attendance(site.employee(site.p1, "2024-01-10"))
            .await
            .unwrap();

        let err = site
            .store
            .insert_attendance(site.employee(site.p2, "2024-01-10"))
            .await
            .unwrap_err();
        assert!(is_attendance_conflict(&err));

        site.store
            .insert_attendance(site.employee(site.p1, "2024-01-11"))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn employee_and_labour_rules_do_not_interfere() {
        let site = site().await;
        // same name as the employee row, but a labour row
        site.store
            .insert_attendance(site.employee(site.p1, "2024-01-10"))
            .await
            .unwrap();
        site.store
            .insert_attendance(site.labour("emp", site.p1, "2024-01-10"))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn labour_names_are_case_sensitive() {
        let site = site().await;
        site.store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();
        site.store
            .insert_attendance(site.labour("RAVI", site.p1, "2024-01-10"))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn update_into_collision_is_rejected_and_leaves_rows_intact() {
        let site = site().await;
        let first = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();
        let second = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-11"))
            .await
            .unwrap();

        let moved = UpdateAttendance {
            date: Some(first.date),
            ..Default::default()
        };
        let err = site
            .store
            .update_attendance(second.id, &moved)
            .await
            .unwrap_err();
        assert!(is_attendance_conflict(&err));

        let stored = site.store.get_attendance(second.id).await.unwrap().unwrap();
        assert_eq!(stored.date, day("2024-01-11"));

        // after the failed move the original key still blocks duplicates
        let err = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-11"))
            .await
            .unwrap_err();
        assert!(is_attendance_conflict(&err));
    }

    #[actix_web::test]
    async fn update_frees_old_key() {
        let site = site().await;
        let record = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();
        let moved = UpdateAttendance {
            project_id: Some(site.p2),
            hours: Some(8.0),
            ..Default::default()
        };
        let updated = site
            .store
            .update_attendance(record.id, &moved)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.project_id, site.p2);
        assert_eq!(updated.hours, 8.0);
        assert!(site.store.update_attendance(9_999, &moved).await.unwrap().is_none());

        site.store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn edit_after_approval_keeps_the_approval() {
        let site = site().await;
        let record = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();

        // an editor loaded the row before it was approved
        let stale = site.store.get_attendance(record.id).await.unwrap().unwrap();
        assert!(!stale.is_approved);

        let approved = site
            .store
            .approve_attendance(record.id, site.supervisor)
            .await
            .unwrap();
        assert!(matches!(approved, Guarded::Applied(ref r) if r.is_approved));

        let edited = site
            .store
            .update_attendance(
                stale.id,
                &UpdateAttendance {
                    notes: Some("rain delay".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.notes.as_deref(), Some("rain delay"));
        assert!(edited.is_approved);
        assert_eq!(edited.approved_by, Some(site.supervisor));

        let again = site
            .store
            .approve_attendance(record.id, site.employee)
            .await
            .unwrap();
        assert_eq!(again, Guarded::Refused);
        let stored = site.store.get_attendance(record.id).await.unwrap().unwrap();
        assert_eq!(stored.approved_by, Some(site.supervisor));
        assert_eq!(
            site.store.approve_attendance(9_999, site.supervisor).await.unwrap(),
            Guarded::Missing
        );
    }

    #[actix_web::test]
    async fn archived_project_refuses_stale_update() {
        let site = site().await;
        let stale = site.store.get_project(site.p1).await.unwrap().unwrap();
        assert_eq!(stale.status, ProjectStatus::Active);

        let archived = site.store.archive_project(site.p1).await.unwrap().unwrap();
        assert_eq!(archived.status, ProjectStatus::Archived);

        let changes = UpdateProject {
            name: Some(format!("{} renamed", stale.name)),
            status: Some(ProjectStatus::Active),
            ..Default::default()
        };
        let outcome = site.store.update_project(stale.id, &changes).await.unwrap();
        assert_eq!(outcome, Guarded::Refused);

        let stored = site.store.get_project(site.p1).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Archived);
        assert_eq!(stored.name, "P1");

        // archiving again is a no-op
        let again = site.store.archive_project(site.p1).await.unwrap().unwrap();
        assert_eq!(again.status, ProjectStatus::Archived);
        assert!(site.store.archive_project(9_999).await.unwrap().is_none());

        let outcome = site.store.update_project(site.p2, &changes).await.unwrap();
        assert!(matches!(outcome, Guarded::Applied(ref p) if p.name == "P1 renamed"));
    }

    #[actix_web::test]
    async fn second_check_out_is_refused() {
        let site = site().await;
        let record = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();
        let first = CheckOut {
            time_out: "17:00".into(),
            hours: None,
            overtime_hours: None,
            status: None,
        };
        let second = CheckOut {
            time_out: "19:00".into(),
            hours: Some(11.0),
            ..first.clone()
        };

        let outcome = site.store.check_out_attendance(record.id, &first).await.unwrap();
        assert!(matches!(outcome, Guarded::Applied(ref r) if r.hours == 9.0));

        let outcome = site.store.check_out_attendance(record.id, &second).await.unwrap();
        assert_eq!(outcome, Guarded::Refused);
        let stored = site.store.get_attendance(record.id).await.unwrap().unwrap();
        assert_eq!(stored.time_out.as_deref(), Some("17:00"));
        assert_eq!(stored.hours, 9.0);
    }

    #[actix_web::test]
    async fn delete_frees_key() {
        let site = site().await;
        let record = site
            .store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();
        assert!(site.store.delete_attendance(record.id).await.unwrap());
        assert!(!site.store.delete_attendance(record.id).await.unwrap());
        site.store
            .insert_attendance(site.labour("Ravi", site.p1, "2024-01-10"))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn unknown_references_are_rejected() {
        let site = site().await;
        let err = site
            .store
            .insert_attendance(site.labour("Ravi", 999, "2024-01-10"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownReference(_)));

        let mut draft = site.employee(site.p1, "2024-01-10");
        draft.employee_id = Some(999);
        let err = site.store.insert_attendance(draft).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownReference(_)));
    }

    #[actix_web::test]
    async fn lists_newest_day_first_with_filters() {
        let site = site().await;
        for (name, project, date) in [
            ("A", site.p1, "2024-01-10"),
            ("B", site.p1, "2024-01-12"),
            ("C", site.p2, "2024-01-11"),
            ("D", site.p1, "2024-01-11"),
        ] {
            site.store
                .insert_attendance(site.labour(name, project, date))
                .await
                .unwrap();
        }

        let filter = AttendanceFilter {
            project_id: Some(site.p1),
            ..Default::default()
        };
        let page = site
            .store
            .list_attendance(&filter, PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|r| r.employee_name.as_str()).collect();
        assert_eq!(names, ["B", "D"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.pagination().pages, 2);
    }

    #[actix_web::test]
    async fn usernames_are_unique_ignoring_case() {
        let site = site().await;
        let err = site
            .store
            .insert_user(UserDraft {
                username: "SUP".into(),
                password: "hash".into(),
                full_name: "Other".into(),
                mobile_number: None,
                role: Role::Worker,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(Conflict::Username)));
        assert!(site.store.find_user_by_username("Sup").await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn refresh_tokens_are_single_use() {
        let site = site().await;
        site.store
            .store_refresh_token(site.employee, "jti-1", Utc::now())
            .await
            .unwrap();
        assert_eq!(
            site.store.revoke_refresh_token("jti-1").await.unwrap(),
            Some(site.employee)
        );
        assert_eq!(site.store.revoke_refresh_token("jti-1").await.unwrap(), None);
        assert_eq!(site.store.revoke_refresh_token("nope").await.unwrap(), None);
    }
}

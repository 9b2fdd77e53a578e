use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[display(fmt = "admin")]
    Admin = 1,
    #[display(fmt = "project_manager")]
    ProjectManager = 2,
    #[display(fmt = "supervisor")]
    Supervisor = 3,
    #[display(fmt = "worker")]
    Worker = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::ProjectManager),
            3 => Some(Role::Supervisor),
            4 => Some(Role::Worker),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Roles allowed to record check-ins and edit attendance on site.
    pub fn can_record_attendance(self) -> bool {
        matches!(self, Role::Admin | Role::ProjectManager | Role::Supervisor)
    }

    pub fn can_manage_projects(self) -> bool {
        matches!(self, Role::Admin | Role::ProjectManager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_round_trip() {
        for role in [Role::Admin, Role::ProjectManager, Role::Supervisor, Role::Worker] {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(5), None);
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(Role::ProjectManager.to_string(), "project_manager");
        assert_eq!(
            serde_json::to_value(Role::ProjectManager).unwrap(),
            serde_json::json!("project_manager")
        );
    }

    #[test]
    fn only_site_staff_record_attendance() {
        assert!(Role::Supervisor.can_record_attendance());
        assert!(!Role::Worker.can_record_attendance());
        assert!(!Role::Supervisor.can_manage_projects());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::page::PageRequest;
use super::validation::trim_opt;

#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    /// Terminal. Attendance on an archived project is frozen.
    Archived,
}

impl ProjectStatus {
    pub fn is_archived(self) -> bool {
        self == ProjectStatus::Archived
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Project {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = "Riverside Tower, Block B")]
    pub name: String,
    #[schema(example = "Pune", nullable = true)]
    pub location: Option<String>,
    pub status: ProjectStatus,
    pub created_by: u64,
    #[schema(example = "2024-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2024-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    pub name: String,
    pub location: Option<String>,
    pub status: ProjectStatus,
    pub created_by: u64,
}

impl ProjectDraft {
    pub fn into_project(self, id: u64, now: DateTime<Utc>) -> Project {
        Project {
            id,
            name: self.name,
            location: self.location,
            status: self.status,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewProject {
    #[validate(length(min = 1, max = 150, message = "is required (max 150 characters)"))]
    #[schema(example = "Riverside Tower, Block B")]
    pub name: String,
    #[validate(length(max = 200))]
    #[schema(example = "Pune", nullable = true)]
    pub location: Option<String>,
}

impl NewProject {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.location = trim_opt(self.location);
        self
    }

    pub fn into_draft(self, created_by: u64) -> ProjectDraft {
        ProjectDraft {
            name: self.name,
            location: self.location,
            status: ProjectStatus::Active,
            created_by,
        }
    }
}

/// Archiving goes through its own endpoint, not through this payload.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProject {
    #[validate(length(min = 1, max = 150, message = "cannot be blank (max 150 characters)"))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl UpdateProject {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.location = trim_opt(self.location);
        self
    }

    pub fn apply_to(&self, project: &mut Project) {
        if let Some(v) = &self.name {
            project.name = v.clone();
        }
        if let Some(v) = &self.location {
            project.location = Some(v.clone());
        }
        if let Some(v) = self.status {
            project.status = v;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub limit: Option<u64>,
}

impl ProjectQuery {
    pub fn split(self) -> (Option<ProjectStatus>, PageRequest) {
        (self.status, PageRequest::new(self.page, self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_trims_and_validates() {
        let payload = NewProject {
            name: "   ".into(),
            location: Some(" ".into()),
        }
        .normalized();
        assert_eq!(payload.location, None);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn update_applies_status() {
        let mut project = NewProject {
            name: "Depot".into(),
            location: None,
        }
        .into_draft(1)
        .into_project(7, Utc::now());
        UpdateProject {
            status: Some(ProjectStatus::OnHold),
            ..Default::default()
        }
        .apply_to(&mut project);
        assert_eq!(project.status, ProjectStatus::OnHold);
        assert_eq!(project.name, "Depot");
        assert_eq!(ProjectStatus::OnHold.as_ref(), "on_hold");
    }
}

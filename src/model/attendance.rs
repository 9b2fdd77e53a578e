use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::page::PageRequest;
use super::validation::{parse_hhmm, trim_opt, validate_hhmm, validate_mobile};

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
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    HalfDay,
    Overtime,
}

/// Which kind of person an attendance row belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceKind {
    Employee,
    Labour,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    /// Registered user; `null` for day labour
    #[schema(example = json!(null), nullable = true)]
    pub employee_id: Option<u64>,
    #[schema(example = "Ravi")]
    pub employee_name: String,
    #[schema(example = "9876543210", nullable = true)]
    pub mobile_number: Option<String>,
    #[schema(example = 3)]
    pub project_id: u64,
    #[schema(example = "mason", nullable = true)]
    pub labour_type: Option<String>,
    #[schema(example = "2024-01-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "08:30", nullable = true)]
    pub time_in: Option<String>,
    #[schema(example = "17:00", nullable = true)]
    pub time_out: Option<String>,
    pub status: AttendanceStatus,
    #[schema(example = 8.5)]
    pub hours: f64,
    #[schema(example = 0.0)]
    pub overtime_hours: f64,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    /// Stored file ids, in upload order
    pub attachments: Vec<u64>,
    #[schema(nullable = true)]
    pub approved_by: Option<u64>,
    pub is_approved: bool,
    #[schema(example = 2)]
    pub created_by: u64,
    #[schema(example = "2024-01-10T08:31:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2024-01-10T08:31:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

/// Identity of a person-day. Employees are keyed by account, labourers by
/// name within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttendanceKey {
    Employee {
        employee_id: u64,
        date: NaiveDate,
    },
    Labour {
        employee_name: String,
        date: NaiveDate,
        project_id: u64,
    },
}

/// A validated attendance row that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceDraft {
    pub employee_id: Option<u64>,
    pub employee_name: String,
    pub mobile_number: Option<String>,
    pub project_id: u64,
    pub labour_type: Option<String>,
    pub date: NaiveDate,
    pub time_in: Option<String>,
    pub time_out: Option<String>,
    pub status: AttendanceStatus,
    pub hours: f64,
    pub overtime_hours: f64,
    pub notes: Option<String>,
    pub attachments: Vec<u64>,
    pub created_by: u64,
}

fn key_for(
    employee_id: Option<u64>,
    employee_name: &str,
    date: NaiveDate,
    project_id: u64,
) -> AttendanceKey {
    match employee_id {
        Some(employee_id) => AttendanceKey::Employee { employee_id, date },
        None => AttendanceKey::Labour {
            employee_name: employee_name.to_string(),
            date,
            project_id,
        },
    }
}

impl AttendanceDraft {
    pub fn key(&self) -> AttendanceKey {
        key_for(
            self.employee_id,
            &self.employee_name,
            self.date,
            self.project_id,
        )
    }

    /// Materializes the draft as a stored row.
    pub fn into_record(self, id: u64, now: DateTime<Utc>) -> AttendanceRecord {
        AttendanceRecord {
            id,
            employee_id: self.employee_id,
            employee_name: self.employee_name,
            mobile_number: self.mobile_number,
            project_id: self.project_id,
            labour_type: self.labour_type,
            date: self.date,
            time_in: self.time_in,
            time_out: self.time_out,
            status: self.status,
            hours: self.hours,
            overtime_hours: self.overtime_hours,
            notes: self.notes,
            attachments: self.attachments,
            approved_by: None,
            is_approved: false,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl AttendanceRecord {
    pub fn key(&self) -> AttendanceKey {
        key_for(
            self.employee_id,
            &self.employee_name,
            self.date,
            self.project_id,
        )
    }

    pub fn kind(&self) -> AttendanceKind {
        match self.employee_id {
            Some(_) => AttendanceKind::Employee,
            None => AttendanceKind::Labour,
        }
    }
}

/// Hours between two `HH:MM` stamps. A check-out earlier than the check-in
/// is an overnight shift.
pub fn hours_between(time_in: &str, time_out: &str) -> Option<f64> {
    let start = parse_hhmm(time_in)?;
    let end = parse_hhmm(time_out)?;
    let minutes = if end >= start {
        end - start
    } else {
        end + 24 * 60 - start
    };
    let hours = f64::from(minutes) / 60.0;
    Some(((hours * 100.0).round() / 100.0).min(24.0))
}

/// Check-in payload.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewAttendance {
    /// Omit for day labour
    #[schema(example = json!(null), nullable = true)]
    pub employee_id: Option<u64>,
    #[validate(length(min = 1, max = 100, message = "is required (max 100 characters)"))]
    #[schema(example = "Ravi")]
    pub employee_name: String,
    #[validate(custom(function = "validate_mobile"))]
    #[schema(example = "9876543210", nullable = true)]
    pub mobile_number: Option<String>,
    #[schema(example = 3)]
    pub project_id: u64,
    #[validate(length(max = 50))]
    #[schema(example = "mason", nullable = true)]
    pub labour_type: Option<String>,
    /// Defaults to today (UTC)
    #[schema(example = "2024-01-10", format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    #[validate(custom(function = "validate_hhmm"))]
    #[schema(example = "08:30", nullable = true)]
    pub time_in: Option<String>,
    #[validate(custom(function = "validate_hhmm"))]
    #[schema(example = json!(null), nullable = true)]
    pub time_out: Option<String>,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub hours: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "cannot be negative"))]
    pub overtime_hours: f64,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    #[serde(default)]
    pub attachments: Vec<u64>,
}

impl NewAttendance {
    /// Trims text fields; blank optional text becomes `None`.
    pub fn normalized(mut self) -> Self {
        self.employee_name = self.employee_name.trim().to_string();
        self.mobile_number = trim_opt(self.mobile_number);
        self.labour_type = trim_opt(self.labour_type);
        self.time_in = trim_opt(self.time_in);
        self.time_out = trim_opt(self.time_out);
        self.notes = trim_opt(self.notes);
        self
    }

    pub fn into_draft(self, created_by: u64, today: NaiveDate) -> AttendanceDraft {
        AttendanceDraft {
            employee_id: self.employee_id,
            employee_name: self.employee_name,
            mobile_number: self.mobile_number,
            project_id: self.project_id,
            labour_type: self.labour_type,
            date: self.date.unwrap_or(today),
            time_in: self.time_in,
            time_out: self.time_out,
            status: self.status,
            hours: self.hours,
            overtime_hours: self.overtime_hours,
            notes: self.notes,
            attachments: self.attachments,
            created_by,
        }
    }
}

/// Partial update. Absent fields are left as they are; the record kind
/// (employee or labour) cannot be changed.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAttendance {
    #[validate(length(min = 1, max = 100, message = "cannot be blank (max 100 characters)"))]
    pub employee_name: Option<String>,
    #[validate(custom(function = "validate_mobile"))]
    pub mobile_number: Option<String>,
    pub project_id: Option<u64>,
    #[validate(length(max = 50))]
    pub labour_type: Option<String>,
    #[schema(example = "2024-01-10", format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    #[validate(custom(function = "validate_hhmm"))]
    pub time_in: Option<String>,
    #[validate(custom(function = "validate_hhmm"))]
    pub time_out: Option<String>,
    pub status: Option<AttendanceStatus>,
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub hours: Option<f64>,
    #[validate(range(min = 0.0, message = "cannot be negative"))]
    pub overtime_hours: Option<f64>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub attachments: Option<Vec<u64>>,
}

impl UpdateAttendance {
    pub fn normalized(mut self) -> Self {
        self.employee_name = self.employee_name.map(|n| n.trim().to_string());
        self.mobile_number = trim_opt(self.mobile_number);
        self.labour_type = trim_opt(self.labour_type);
        self.time_in = trim_opt(self.time_in);
        self.time_out = trim_opt(self.time_out);
        self.notes = trim_opt(self.notes);
        self
    }

    pub fn apply_to(&self, record: &mut AttendanceRecord) {
        if let Some(v) = &self.employee_name {
            record.employee_name = v.clone();
        }
        if let Some(v) = &self.mobile_number {
            record.mobile_number = Some(v.clone());
        }
        if let Some(v) = self.project_id {
            record.project_id = v;
        }
        if let Some(v) = &self.labour_type {
            record.labour_type = Some(v.clone());
        }
        if let Some(v) = self.date {
            record.date = v;
        }
        if let Some(v) = &self.time_in {
            record.time_in = Some(v.clone());
        }
        if let Some(v) = &self.time_out {
            record.time_out = Some(v.clone());
        }
        if let Some(v) = self.status {
            record.status = v;
        }
        if let Some(v) = self.hours {
            record.hours = v;
        }
        if let Some(v) = self.overtime_hours {
            record.overtime_hours = v;
        }
        if let Some(v) = &self.notes {
            record.notes = Some(v.clone());
        }
        if let Some(v) = &self.attachments {
            record.attachments = v.clone();
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CheckOut {
    #[validate(custom(function = "validate_hhmm"))]
    #[schema(example = "17:30")]
    pub time_out: String,
    /// Derived from `time_in` when omitted
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub hours: Option<f64>,
    #[validate(range(min = 0.0, message = "cannot be negative"))]
    pub overtime_hours: Option<f64>,
    pub status: Option<AttendanceStatus>,
}

impl CheckOut {
    /// Fills `hours` from the record's `time_in` when the caller left it out.
    pub fn with_derived_hours(mut self, time_in: Option<&str>) -> Self {
        self.time_out = self.time_out.trim().to_string();
        if self.hours.is_none() {
            self.hours = time_in.and_then(|time_in| hours_between(time_in, &self.time_out));
        }
        self
    }

    pub fn apply_to(&self, record: &mut AttendanceRecord) {
        let derived = record
            .time_in
            .as_deref()
            .and_then(|time_in| hours_between(time_in, self.time_out.trim()));
        if let Some(hours) = self.hours.or(derived) {
            record.hours = hours;
        }
        if let Some(v) = self.overtime_hours {
            record.overtime_hours = v;
        }
        if let Some(v) = self.status {
            record.status = v;
        }
        record.time_out = Some(self.time_out.trim().to_string());
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AttendanceFilter {
    pub project_id: Option<u64>,
    pub employee_id: Option<u64>,
    pub status: Option<AttendanceStatus>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub is_approved: Option<bool>,
    pub kind: Option<AttendanceKind>,
}

impl AttendanceFilter {
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.project_id.is_none_or(|v| record.project_id == v)
            && self.employee_id.is_none_or(|v| record.employee_id == Some(v))
            && self.status.is_none_or(|v| record.status == v)
            && self.date.is_none_or(|v| record.date == v)
            && self.from.is_none_or(|v| record.date >= v)
            && self.to.is_none_or(|v| record.date <= v)
            && self.is_approved.is_none_or(|v| record.is_approved == v)
            && self.kind.is_none_or(|v| record.kind() == v)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Filter by project
    pub project_id: Option<u64>,
    /// Filter by registered employee
    pub employee_id: Option<u64>,
    pub status: Option<AttendanceStatus>,
    /// Exact day (YYYY-MM-DD)
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    /// First day of a range, inclusive
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Last day of a range, inclusive
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub is_approved: Option<bool>,
    /// `employee` or `labour`
    pub kind: Option<AttendanceKind>,
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub limit: Option<u64>,
}

impl AttendanceQuery {
    pub fn split(self) -> (AttendanceFilter, PageRequest) {
        let page = PageRequest::new(self.page, self.limit);
        let filter = AttendanceFilter {
            project_id: self.project_id,
            employee_id: self.employee_id,
            status: self.status,
            date: self.date,
            from: self.from,
            to: self.to,
            is_approved: self.is_approved,
            kind: self.kind,
        };
        (filter, page)
    }
}

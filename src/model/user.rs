use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::role::Role;
use super::validation::{trim_opt, validate_mobile};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub mobile_number: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// What gets stored for a new account; `password` is already hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDraft {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub mobile_number: Option<String>,
    pub role: Role,
}

impl UserDraft {
    pub fn into_user(self, id: u64, now: DateTime<Utc>) -> User {
        User {
            id,
            username: self.username,
            password: self.password,
            full_name: self.full_name,
            mobile_number: self.mobile_number,
            role: self.role,
            is_active: true,
            created_at: now,
            last_login_at: None,
        }
    }
}

/// User as returned by the API; never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 2)]
    pub id: u64,
    #[schema(example = "site.sup")]
    pub username: String,
    #[schema(example = "Anil Kumar")]
    pub full_name: String,
    #[schema(nullable = true)]
    pub mobile_number: Option<String>,
    pub role: Role,
    pub is_active: bool,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            mobile_number: user.mobile_number,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[validate(length(min = 3, max = 64))]
    #[schema(example = "site.sup")]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    #[schema(example = "correct-horse-battery")]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Anil Kumar")]
    pub full_name: String,
    #[validate(custom(function = "validate_mobile"))]
    #[schema(example = "9876543210", nullable = true)]
    pub mobile_number: Option<String>,
    pub role: Role,
}

impl NewUser {
    /// Usernames are compared lowercase.
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_lowercase();
        self.full_name = self.full_name.trim().to_string();
        self.mobile_number = trim_opt(self.mobile_number);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_drops_password() {
        let user = UserDraft {
            username: "ravi".into(),
            password: "$argon2id$...".into(),
            full_name: "Ravi".into(),
            mobile_number: None,
            role: Role::Worker,
        }
        .into_user(4, Utc::now());
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "worker");
    }

    #[test]
    fn new_user_lowercases_username() {
        let payload: NewUser = serde_json::from_value(serde_json::json!({
            "username": "  Site.Sup ",
            "password": "long-enough-pass",
            "full_name": "Anil",
            "role": "supervisor"
        }))
        .unwrap();
        let payload = payload.normalized();
        assert_eq!(payload.username, "site.sup");
        assert!(payload.validate().is_ok());
    }
}

//! User domain model.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TollgateError;
use crate::id::ObjectId;
use crate::pagination::Projection;

/// Confirmation-code key for account activation.
pub const ACTIVATE_CODE: &str = "activate";

/// Salted password hash. Never holds plaintext.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Password {
    pub salt: Vec<u8>,
    /// Argon2id PHC string.
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

/// Denormalized snapshot of a group membership. Kept in sync with the
/// group directory by the consistency coordinator; not authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRef {
    pub group_id: ObjectId,
    pub group_name: String,
}

/// A user record. Fields left out of a listing projection keep their
/// `Default` value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: ObjectId,
    pub email: String,
    pub password: Password,
    pub approved: bool,
    /// Purpose -> opaque code, e.g. `"activate"`. Present while pending.
    pub confirm_codes: BTreeMap<String, String>,
    pub privileges: Vec<String>,
    pub group_refs: Vec<GroupRef>,
    pub profile: Option<serde_json::Value>,
    pub last_activity: DateTime<Utc>,
    pub joined_at: DateTime<Utc>,
}

impl User {
    pub fn in_group(&self, group_id: &ObjectId) -> bool {
        self.group_refs.iter().any(|r| &r.group_id == group_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    /// Raw password (hashed before storage).
    pub password: String,
    /// `false` leaves the account pending with an activation code.
    pub pre_approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateUserDetail {
    pub email: String,
    pub password: String,
    pub pre_approved: bool,
    pub privileges: Vec<String>,
    /// Replaces the generated activation code when supplied.
    pub confirm_codes: Option<BTreeMap<String, String>>,
    pub profile: Option<serde_json::Value>,
    /// Resolved through the group directory; ids that do not resolve are
    /// dropped.
    pub group_ids: Vec<String>,
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    /// Raw password; validated and re-hashed.
    pub password: Option<String>,
    pub approved: Option<bool>,
    pub privileges: Option<Vec<String>>,
    pub confirm_codes: Option<BTreeMap<String, String>>,
    pub profile: Option<serde_json::Value>,
    /// `Some(vec![])` clears all memberships.
    pub group_ids: Option<Vec<String>>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.approved.is_none()
            && self.privileges.is_none()
            && self.confirm_codes.is_none()
            && self.profile.is_none()
            && self.group_ids.is_none()
    }
}

/// Listing projection for users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Id,
    Email,
    Password,
    Approved,
    ConfirmCodes,
    Privileges,
    GroupRefs,
    Profile,
    LastActivity,
    JoinedAt,
}

impl Projection for UserField {
    fn column(&self) -> Option<&'static str> {
        match self {
            UserField::Id => None,
            UserField::Email => Some("email"),
            UserField::Password => Some("password"),
            UserField::Approved => Some("approved"),
            UserField::ConfirmCodes => Some("confirm_codes"),
            UserField::Privileges => Some("privileges"),
            UserField::GroupRefs => Some("group_refs"),
            UserField::Profile => Some("profile"),
            UserField::LastActivity => Some("last_activity"),
            UserField::JoinedAt => Some("joined_at"),
        }
    }
}

impl FromStr for UserField {
    type Err = TollgateError;

    /// Accepts both the camelCase names used by web clients and the
    /// snake_case column names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "id" => UserField::Id,
            "email" => UserField::Email,
            "password" => UserField::Password,
            "approved" => UserField::Approved,
            "confirmCodes" | "confirm_codes" => UserField::ConfirmCodes,
            "privileges" => UserField::Privileges,
            "groupRefs" | "group_refs" => UserField::GroupRefs,
            "profile" => UserField::Profile,
            "lastActivity" | "last_activity" => UserField::LastActivity,
            "joinedAt" | "joined_at" => UserField::JoinedAt,
            _ => return Err(TollgateError::NoResult),
        })
    }
}

//! Group domain model.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TollgateError;
use crate::id::ObjectId;
use crate::pagination::Projection;

/// A named set of privileges granted to every member. Membership lives on
/// the user as a [`GroupRef`](super::user::GroupRef) snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub id: ObjectId,
    pub name: String,
    pub privileges: Vec<String>,
    pub info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub privileges: Vec<String>,
    pub info: Option<serde_json::Value>,
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    /// A rename is pushed into every member's group snapshot.
    pub name: Option<String>,
    pub privileges: Option<Vec<String>>,
    pub info: Option<serde_json::Value>,
}

/// Listing projection for groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupField {
    Id,
    Name,
    Privileges,
    Info,
}

impl Projection for GroupField {
    fn column(&self) -> Option<&'static str> {
        match self {
            GroupField::Id => None,
            GroupField::Name => Some("name"),
            GroupField::Privileges => Some("privileges"),
            GroupField::Info => Some("info"),
        }
    }
}

impl FromStr for GroupField {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "id" => GroupField::Id,
            "name" => GroupField::Name,
            "privileges" | "privilege" => GroupField::Privileges,
            "info" => GroupField::Info,
            _ => return Err(TollgateError::NoResult),
        })
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::Role;

/// Columns selected for a full user row. `password_hash` is loaded but never
/// serialized.
pub const USER_COLUMNS: &str = "id, church_id, branch_id, first_name, last_name, email, phone, password_hash, role, \
     gender, date_of_birth, address, profile_image, is_active, member_details, pastor_details, \
     bishop_details, admin_details, last_login_at, is_deleted, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// None only for superadmins
    pub church_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub is_active: bool,
    pub member_details: Option<Value>,
    pub pastor_details: Option<Value>,
    pub bishop_details: Option<Value>,
    pub admin_details: Option<Value>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The role-specific sub-document for `role`, if any.
    pub fn details_for(&self, role: Role) -> Option<&Value> {
        match role {
            Role::Member => self.member_details.as_ref(),
            Role::Pastor => self.pastor_details.as_ref(),
            Role::Bishop => self.bishop_details.as_ref(),
            Role::Admin => self.admin_details.as_ref(),
            Role::Superadmin => None,
        }
    }

    pub fn details_slot(&mut self, role: Role) -> Option<&mut Option<Value>> {
        match role {
            Role::Member => Some(&mut self.member_details),
            Role::Pastor => Some(&mut self.pastor_details),
            Role::Bishop => Some(&mut self.bishop_details),
            Role::Admin => Some(&mut self.admin_details),
            Role::Superadmin => None,
        }
    }
}

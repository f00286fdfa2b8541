use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles a user can hold. Ordered by rank: superadmin outranks everyone,
/// member is the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Bishop,
    Pastor,
    Member,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Superadmin, Role::Admin, Role::Bishop, Role::Pastor, Role::Member];

    /// Roles allowed to manage people and pastoral records.
    pub const PASTORAL: [Role; 4] = [Role::Superadmin, Role::Admin, Role::Bishop, Role::Pastor];

    /// Roles that administer the church structure itself.
    pub const ADMINS: [Role; 2] = [Role::Superadmin, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Bishop => "bishop",
            Role::Pastor => "pastor",
            Role::Member => "member",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Role::Superadmin => 4,
            Role::Admin => 3,
            Role::Bishop => 2,
            Role::Pastor => 1,
            Role::Member => 0,
        }
    }

    pub fn outranks(&self, other: Role) -> bool {
        self.rank() > other.rank()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }

    pub fn is_pastoral(&self) -> bool {
        !matches!(self, Role::Member)
    }

    /// Name of the JSONB sub-document holding role-specific details.
    pub fn details_field(&self) -> Option<&'static str> {
        match self {
            Role::Superadmin => None,
            Role::Admin => Some("admin_details"),
            Role::Bishop => Some("bishop_details"),
            Role::Pastor => Some("pastor_details"),
            Role::Member => Some("member_details"),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "superadmin" => Ok(Role::Superadmin),
            "admin" => Ok(Role::Admin),
            "bishop" => Ok(Role::Bishop),
            "pastor" => Ok(Role::Pastor),
            "member" => Ok(Role::Member),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// Stored as TEXT (with a CHECK constraint) rather than a Postgres enum type.
impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_strictly_ordered() {
        for pair in Role::ALL.windows(2) {
            assert!(pair[0].outranks(pair[1]), "{} should outrank {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Pastor".parse::<Role>().unwrap(), Role::Pastor);
        assert_eq!("SUPERADMIN".parse::<Role>().unwrap(), Role::Superadmin);
        assert!("deacon".parse::<Role>().is_err());
    }

    #[test]
    fn details_field_per_role() {
        assert_eq!(Role::Member.details_field(), Some("member_details"));
        assert_eq!(Role::Bishop.details_field(), Some("bishop_details"));
        assert_eq!(Role::Superadmin.details_field(), None);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), serde_json::json!("admin"));
    }
}

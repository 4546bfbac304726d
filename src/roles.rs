//! Roles and the static role-to-area table.
//!
//! Every authenticated identity carries exactly one role, assigned by the
//! backend. Each role has a home area and a set of areas it may enter; the
//! admin set covers every other role's home.

use serde::{Deserialize, Deserializer, Serialize};

/// User role as issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[serde(rename = "HOUSEOWNER")]
    HouseOwner,
    Renter,
}

/// A role-scoped section of the site, identified by its path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Admin,
    Owner,
    Renter,
}

/// Every area, in the order they are matched.
pub const AREAS: [Area; 3] = [Area::Admin, Area::Owner, Area::Renter];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::HouseOwner => "HOUSEOWNER",
            Role::Renter => "RENTER",
        }
    }

    /// Parse a backend role string. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Role::Admin),
            "HOUSEOWNER" => Some(Role::HouseOwner),
            "RENTER" => Some(Role::Renter),
            _ => None,
        }
    }

    /// Area the role lands in after login.
    pub fn home(&self) -> Area {
        match self {
            Role::Admin => Area::Admin,
            Role::HouseOwner => Area::Owner,
            Role::Renter => Area::Renter,
        }
    }

    /// Areas the role may enter.
    pub fn permitted_areas(&self) -> &'static [Area] {
        match self {
            Role::Admin => &[Area::Admin, Area::Owner, Area::Renter],
            Role::HouseOwner => &[Area::Owner],
            Role::Renter => &[Area::Renter],
        }
    }

    pub fn may_enter(&self, area: Area) -> bool {
        self.permitted_areas().contains(&area)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the effective role of a session.
///
/// A missing or unrecognised role falls back to the most restrictive role,
/// `RENTER`. Access is never widened by an unknown value.
pub fn effective_role(role: Option<Role>) -> Role {
    role.unwrap_or(Role::Renter)
}

impl Area {
    pub fn prefix(&self) -> &'static str {
        match self {
            Area::Admin => "/admin",
            Area::Owner => "/owner",
            Area::Renter => "/renter",
        }
    }

    /// Landing page of the area.
    pub fn dashboard_path(&self) -> String {
        format!("{}/dashboard", self.prefix())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Admin => "admin",
            Area::Owner => "owner",
            Area::Renter => "renter",
        }
    }

    /// Find the area a request path belongs to.
    /// Matches whole segments: `/owner` and `/owner/x` match, `/owners` does not.
    pub fn of_path(path: &str) -> Option<Area> {
        AREAS
            .into_iter()
            .find(|area| path_has_prefix(path, area.prefix()))
    }
}

/// Segment-aware prefix test.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Serde helper for role fields coming from tokens and sessions.
///
/// Unknown strings, nulls and non-string values become `None` instead of
/// failing the whole document.
pub mod lenient {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(|v| v.as_str()).and_then(Role::parse))
    }

    pub fn serialize<S>(role: &Option<Role>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        role.serialize(serializer)
    }
}

/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User roles recognized by the platform.
///
/// Serialized in lowercase everywhere (permission matrices, persisted
/// records) to stay compatible with matrices edited through the admin UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    /// Fixed identifier prefix for issued user ids (e.g. student -> "STU").
    /// Superadmins are platform operators and carry no tenant-scoped ids.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Role::Superadmin => None,
            Role::Admin => Some("ADM"),
            Role::Teacher => Some("TCH"),
            Role::Student => Some("STU"),
            Role::Parent => Some("PAR"),
        }
    }

    /// The tenant sub-collection holding accounts for this role.
    pub fn collection(&self) -> Option<TenantCollection> {
        match self {
            Role::Superadmin => None,
            Role::Admin => Some(TenantCollection::Admins),
            Role::Teacher => Some(TenantCollection::Teachers),
            Role::Student => Some(TenantCollection::Students),
            Role::Parent => Some(TenantCollection::Parents),
        }
    }

    /// Reverse lookup from an issued identifier's tag prefix.
    pub fn from_tag(tag: &str) -> Option<Role> {
        match tag {
            "ADM" => Some(Role::Admin),
            "TCH" => Some(Role::Teacher),
            "STU" => Some(Role::Student),
            "PAR" => Some(Role::Parent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "superadmin" => Ok(Role::Superadmin),
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            _ => Err(()),
        }
    }
}

/// Registry-verified uppercase school code.
///
/// Construction goes through the registry (or `CanonicalCode::new` for
/// already-trusted values); callers pass these around instead of raw strings
/// so a handle can only be requested for a resolved tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalCode(String);

impl CanonicalCode {
    pub fn new(code: impl Into<String>) -> Self {
        let code: String = code.into();
        CanonicalCode(code.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named sub-collections inside every tenant store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantCollection {
    Admins,
    Teachers,
    Students,
    Parents,
    Messages,
    Results,
    Timetables,
    PermissionOverrides,
    TenantInfo,
}

impl TenantCollection {
    pub const ALL: [TenantCollection; 9] = [
        TenantCollection::Admins,
        TenantCollection::Teachers,
        TenantCollection::Students,
        TenantCollection::Parents,
        TenantCollection::Messages,
        TenantCollection::Results,
        TenantCollection::Timetables,
        TenantCollection::PermissionOverrides,
        TenantCollection::TenantInfo,
    ];

    /// Table name in the Postgres backend, key in the memory backend.
    pub fn name(&self) -> &'static str {
        match self {
            TenantCollection::Admins => "admins",
            TenantCollection::Teachers => "teachers",
            TenantCollection::Students => "students",
            TenantCollection::Parents => "parents",
            TenantCollection::Messages => "messages",
            TenantCollection::Results => "results",
            TenantCollection::Timetables => "timetables",
            TenantCollection::PermissionOverrides => "permission_overrides",
            TenantCollection::TenantInfo => "tenant_info",
        }
    }
}

impl fmt::Display for TenantCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

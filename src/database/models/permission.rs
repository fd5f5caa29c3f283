use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::Role;

/// Capability flags for one role: permission key -> allowed.
pub type RolePermissions = HashMap<String, bool>;

/// Role -> capability map, as edited through the admin matrix screens and
/// as shipped in the static defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionMatrix(pub HashMap<Role, RolePermissions>);

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self, role: Role) -> Option<&RolePermissions> {
        self.0.get(&role)
    }

    pub fn set(&mut self, role: Role, key: impl Into<String>, allowed: bool) {
        self.0.entry(role).or_default().insert(key.into(), allowed);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tenant-local override document. At most one per tenant store; absence is
/// the common case for freshly registered schools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionOverrideDocument {
    pub code: String,
    pub matrix: PermissionMatrix,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_round_trips_through_json() {
        let mut matrix = PermissionMatrix::new();
        matrix.set(Role::Student, "viewResults", true);
        matrix.set(Role::Teacher, "editResults", false);

        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(json["student"]["viewResults"], true);

        let back: PermissionMatrix = serde_json::from_value(json).unwrap();
        assert_eq!(back, matrix);
    }
}

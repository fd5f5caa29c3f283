//! Statically shipped permission defaults, so a newly registered school is
//! usable before anyone has edited a matrix.

use once_cell::sync::Lazy;

use crate::database::models::PermissionMatrix;
use crate::types::Role;

pub static DEFAULT_PERMISSIONS: Lazy<PermissionMatrix> = Lazy::new(|| {
    let mut matrix = PermissionMatrix::new();

    for (key, allowed) in [
        ("manageStaff", true),
        ("manageStudents", true),
        ("manageParents", true),
        ("viewResults", true),
        ("editResults", true),
        ("publishResults", true),
        ("manageTimetable", true),
        ("viewTimetable", true),
        ("sendMessages", true),
        ("viewMessages", true),
        ("editPermissions", true),
        ("resetCredentials", true),
    ] {
        matrix.set(Role::Admin, key, allowed);
    }

    for (key, allowed) in [
        ("viewStudents", true),
        ("viewResults", true),
        ("editResults", true),
        ("publishResults", false),
        ("viewTimetable", true),
        ("manageTimetable", false),
        ("sendMessages", true),
        ("viewMessages", true),
    ] {
        matrix.set(Role::Teacher, key, allowed);
    }

    for (key, allowed) in [
        ("viewResults", true),
        ("viewAssignments", true),
        ("viewTimetable", true),
        ("viewMessages", true),
        ("sendMessages", false),
        ("editResults", false),
    ] {
        matrix.set(Role::Student, key, allowed);
    }

    for (key, allowed) in [
        ("viewResults", true),
        ("viewTimetable", true),
        ("viewMessages", true),
        ("sendMessages", true),
    ] {
        matrix.set(Role::Parent, key, allowed);
    }

    matrix
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn students_can_view_assignments_by_default() {
        let entry = DEFAULT_PERMISSIONS.role(Role::Student).unwrap();
        assert_eq!(entry.get("viewAssignments"), Some(&true));
        assert_eq!(entry.get("sendMessages"), Some(&false));
    }

    #[test]
    fn superadmin_needs_no_table_entry() {
        assert!(DEFAULT_PERMISSIONS.role(Role::Superadmin).is_none());
    }
}

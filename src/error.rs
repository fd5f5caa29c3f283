//! Crate-level error type for callers of the access service.
//!
//! Propagation policy: infrastructure failures (an unreachable tenant store)
//! pass through unchanged and may be retried with backoff; business
//! outcomes (unknown school, permission denied) are ordinary values or
//! non-retryable errors.

use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::identity::IdentityError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl CoreError {
    /// Transient infrastructure failure; the whole operation may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Database(DatabaseError::TenantUnreachable(_)) => true,
            CoreError::Identity(IdentityError::Database(DatabaseError::TenantUnreachable(_))) => {
                true
            }
            CoreError::Registry(RegistryError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// The identifier matched no known tenant; not retried.
    pub fn is_unknown_school(&self) -> bool {
        matches!(self, CoreError::Registry(RegistryError::UnknownSchool(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_unknown_school() {
        let err = CoreError::from(RegistryError::UnknownSchool("NOPE".into()));
        assert!(err.is_unknown_school());
        assert!(!err.is_transient());
    }

    #[test]
    fn classifies_transient_failures() {
        let err = CoreError::from(DatabaseError::TenantUnreachable("timeout".into()));
        assert!(err.is_transient());
        assert!(!err.is_unknown_school());
    }
}

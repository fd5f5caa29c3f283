use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Tenant store connection and health-check behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    /// Upper bound on establishing a new tenant connection, seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound on the pre-return liveness probe, seconds.
    pub probe_timeout_secs: u64,
    /// Upper bound on any single store operation, seconds.
    pub operation_timeout_secs: u64,
}

/// Identifier and initial-credential issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Length of generated random credentials.
    pub credential_length: usize,
    /// Attempts before a duplicate identifier is surfaced to the caller.
    pub max_issue_retries: u32,
    /// Zero-pad width of the numeric part of issued ids (STU0007).
    pub sequence_pad_width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Legacy compatibility shim: treat a well-formed but unregistered code
    /// token as a literal canonical code. Off unless explicitly enabled;
    /// every use is logged.
    pub allow_unregistered_codes: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs =
                v.parse().unwrap_or(self.database.connect_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_PROBE_TIMEOUT_SECS") {
            self.database.probe_timeout_secs =
                v.parse().unwrap_or(self.database.probe_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_OPERATION_TIMEOUT_SECS") {
            self.database.operation_timeout_secs =
                v.parse().unwrap_or(self.database.operation_timeout_secs);
        }

        // Identity overrides
        if let Ok(v) = env::var("IDENTITY_CREDENTIAL_LENGTH") {
            self.identity.credential_length = v.parse().unwrap_or(self.identity.credential_length);
        }
        if let Ok(v) = env::var("IDENTITY_MAX_ISSUE_RETRIES") {
            self.identity.max_issue_retries = v.parse().unwrap_or(self.identity.max_issue_retries);
        }
        if let Ok(v) = env::var("IDENTITY_SEQUENCE_PAD_WIDTH") {
            self.identity.sequence_pad_width =
                v.parse().unwrap_or(self.identity.sequence_pad_width);
        }

        // Registry overrides
        if let Ok(v) = env::var("REGISTRY_ALLOW_UNREGISTERED_CODES") {
            self.registry.allow_unregistered_codes =
                v.parse().unwrap_or(self.registry.allow_unregistered_codes);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connect_timeout_secs: 10,
                probe_timeout_secs: 5,
                operation_timeout_secs: 10,
            },
            identity: IdentityConfig {
                credential_length: 8,
                max_issue_retries: 5,
                sequence_pad_width: 4,
            },
            registry: RegistryConfig {
                allow_unregistered_codes: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connect_timeout_secs: 10,
                probe_timeout_secs: 5,
                operation_timeout_secs: 10,
            },
            identity: IdentityConfig {
                credential_length: 8,
                max_issue_retries: 5,
                sequence_pad_width: 4,
            },
            registry: RegistryConfig {
                allow_unregistered_codes: false,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connect_timeout_secs: 5,
                probe_timeout_secs: 5,
                operation_timeout_secs: 10,
            },
            identity: IdentityConfig {
                credential_length: 8,
                max_issue_retries: 5,
                sequence_pad_width: 4,
            },
            registry: RegistryConfig {
                allow_unregistered_codes: false,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.identity.credential_length, 8);
        assert!(!config.registry.allow_unregistered_codes);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.database.max_connections, 50);
        assert_eq!(config.database.connect_timeout_secs, 5);
        assert!(!config.registry.allow_unregistered_codes);
    }
}

//! Configuration management for Gatehouse
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (GATE_* prefix, highest precedence)
//! 2. gatehouse.local.toml (gitignored, local overrides)
//! 3. gatehouse.toml (git-tracked, project config)
//! 4. ~/.config/gatehouse/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! The credential-signing secret lives here and nowhere else: it is loaded
//! once at startup, validated for minimum length, redacted from debug
//! output, and handed to the engine by reference.

use std::fmt::{self, Debug};

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Minimum acceptable length of the credential secret, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

/// Main Gatehouse configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatehouseConfig {
    pub facility: FacilityConfig,
    pub security: SecurityConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityConfig {
    pub name: String,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            name: "gatehouse-facility".to_string(),
        }
    }
}

/// Security settings. `Debug` never prints the secret.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared secret bound into every credential signature. Required,
    /// at least [`MIN_SECRET_BYTES`] bytes. Never logged, never returned
    /// in any response.
    pub credential_secret: String,
}

impl Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("credential_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Credential validity applied when the caller does not specify one.
    pub default_validity_hours: u32,
    /// Whether guard decisions are logged to the audit trail.
    pub audit_decisions: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_validity_hours: 24,
            audit_decisions: true,
        }
    }
}

impl GatehouseConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from a specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<std::path::Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Checks the loaded values against the engine's requirements.
    ///
    /// Called by the engine constructor; a process must not come up with a
    /// missing or weak signing secret or a zero validity window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.credential_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret {
                min_bytes: MIN_SECRET_BYTES,
            });
        }
        if self.policy.default_validity_hours == 0 {
            return Err(ConfigError::ValidationError(
                "policy.default_validity_hours must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

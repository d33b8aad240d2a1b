//! Account credentials from the process environment.

use crate::config::Environment;
use crate::error::{AppError, AppResult};
use std::fmt;

pub const API_KEY_VAR: &str = "EXTENDED_API_KEY";
pub const PUBLIC_KEY_VAR: &str = "EXTENDED_PUBLIC_KEY";
pub const PRIVATE_KEY_VAR: &str = "EXTENDED_PRIVATE_KEY";
pub const VAULT_ID_VAR: &str = "EXTENDED_VAULT_ID";
pub const ENVIRONMENT_VAR: &str = "EXTENDED_ENV";
pub const USER_AGENT_VAR: &str = "USER_AGENT";
pub const SUBACCOUNT_ID_VAR: &str = "SUBACCOUNT_ID";

/// Read once at startup; nothing re-reads the environment afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    /// Stark key pair and vault, needed only by a signing gateway.
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub vault_id: Option<String>,
    pub user_agent: Option<String>,
    pub subaccount_id: Option<String>,
    /// Overrides the configured environment.
    pub environment: Option<Environment>,
}

impl Credentials {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_VAR).ok_or(AppError::MissingCredential(API_KEY_VAR))?;
        let environment = get(ENVIRONMENT_VAR)
            .map(|v| v.parse::<Environment>())
            .transpose()?;

        Ok(Self {
            api_key,
            public_key: get(PUBLIC_KEY_VAR),
            private_key: get(PRIVATE_KEY_VAR),
            vault_id: get(VAULT_ID_VAR),
            user_agent: get(USER_AGENT_VAR),
            subaccount_id: get(SUBACCOUNT_ID_VAR),
            environment,
        })
    }

    /// Whether a signing gateway could be built from these credentials.
    pub fn can_sign(&self) -> bool {
        self.public_key.is_some() && self.private_key.is_some() && self.vault_id.is_some()
    }

    pub fn resolve_environment(&self, configured: Environment) -> Environment {
        self.environment.unwrap_or(configured)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("vault_id", &self.vault_id)
            .field("user_agent", &self.user_agent)
            .field("subaccount_id", &self.subaccount_id)
            .field("environment", &self.environment)
            .finish()
    }
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Deployment environment for the relay.
///
/// Staging and production require the hot and cold stores to be reachable and
/// abort on missing signer material; development may degrade to the in-memory
/// hot-store fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    // Whether the remote hot/cold stores must be reachable at boot
    pub fn requires_remote_stores(&self) -> bool {
        !matches!(self, Environment::Development)
    }

    // In-memory hot-store fallback is a development-only convenience
    pub fn allows_hot_fallback(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("mainnet".parse::<Environment>().is_err());
    }

    #[test]
    fn test_fallback_policy() {
        assert!(Environment::Development.allows_hot_fallback());
        assert!(!Environment::Staging.allows_hot_fallback());
        assert!(!Environment::Production.allows_hot_fallback());
    }
}

//! Bridge configuration.
//!
//! A [`BridgeConfig`] picks the native backend and how much checking the
//! bridge does before a native call. It deserialises with `serde`, so a host
//! can embed it in its own configuration file, and can be read from the
//! environment:
//!
//! | variable | values |
//! |---|---|
//! | `LABRIDGE_BACKEND` | `reference`, `system` |
//! | `LABRIDGE_VALIDATION` | `strict`, `native` |

use crate::{FfiError, FfiResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable selecting the backend.
pub const BACKEND_VAR: &str = "LABRIDGE_BACKEND";

/// Environment variable selecting the validation policy.
pub const VALIDATION_VAR: &str = "LABRIDGE_VALIDATION";

/// Which implementation of the native routines to call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The pure Rust reference routines.
    #[default]
    Reference,
    /// The system BLAS/LAPACK library selected at build time.
    System,
}

impl BackendKind {
    /// The configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::System => "system",
        }
    }
}

impl FromStr for BackendKind {
    type Err = FfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "system" => Ok(Self::System),
            _ => Err(FfiError::InvalidConfig {
                key: BACKEND_VAR,
                value: s.to_string(),
            }),
        }
    }
}

/// How much argument checking the bridge does itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Reject inconsistent shapes with the routine's illegal-argument
    /// status before calling it.
    #[default]
    Strict,
    /// Pass shapes through and rely on the routine's own argument checks.
    Native,
}

impl ValidationPolicy {
    /// The configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Native => "native",
        }
    }
}

impl FromStr for ValidationPolicy {
    type Err = FfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "native" => Ok(Self::Native),
            _ => Err(FfiError::InvalidConfig {
                key: VALIDATION_VAR,
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for a [`crate::Bridge`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Native backend.
    pub backend: BackendKind,
    /// Pre-call validation.
    pub validation: ValidationPolicy,
}

impl BridgeConfig {
    /// Read the configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::InvalidConfig`] for an unrecognised value.
    pub fn from_env() -> FfiResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::InvalidConfig`] for an unrecognised value.
    pub fn from_lookup<F>(lookup: F) -> FfiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(BACKEND_VAR) {
            config.backend = value.parse()?;
        }
        if let Some(value) = lookup(VALIDATION_VAR) {
            config.validation = value.parse()?;
        }
        Ok(config)
    }

    /// Set the backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the validation policy.
    #[must_use]
    pub const fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }
}

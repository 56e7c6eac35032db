//! Secret resolution for repository and pull-request credentials.
//!
//! A secret can be given inline, read from a file (container secrets), or
//! read from an environment variable. The first non-empty source wins.

use secrecy::SecretString;
use std::fs;

/// Errors raised while resolving a secret.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a secret may come from, in priority order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn is_configured(&self) -> bool {
        [self.direct, self.file, self.env_var]
            .into_iter()
            .any(|source| non_empty(source).is_some())
    }
}

/// Resolves a secret from the first configured source.
pub fn resolve_secret(source: SecretSource<'_>) -> Result<SecretString> {
    if let Some(value) = non_empty(source.direct) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = non_empty(source.file) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|e| SecretError::FileRead {
                path: expanded,
                source: e,
            });
    }

    if let Some(name) = non_empty(source.env_var) {
        return match std::env::var(name) {
            // values exported from files often carry a trailing newline
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but an unconfigured secret is `None` rather than an error.
pub fn resolve_secret_optional(source: SecretSource<'_>) -> Result<Option<SecretString>> {
    match resolve_secret(source) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

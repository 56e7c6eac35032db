//! Credentials for git network operations.
//!
//! Username/password credentials are handed to git through a short-lived
//! `GIT_ASKPASS` script, so they never appear on a command line.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use super::error::{GitError, Result};

/// Credentials used for clone, pull and push.
#[derive(Debug, Clone, Default)]
pub struct GitCredentials {
    pub username: String,
    pub password: Option<SecretString>,
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, password: Option<SecretString>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Credentials that never prompt; for public or local remotes.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Escapes a value for safe use in single-quoted shell strings.
pub fn shell_escape(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Deletes the askpass script when dropped.
#[derive(Debug)]
pub struct AskpassCleanup {
    path: Option<PathBuf>,
}

impl AskpassCleanup {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn empty() -> Self {
        Self { path: None }
    }
}

impl Drop for AskpassCleanup {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to clean up askpass script: {}", e);
            }
        }
    }
}

/// Environment for one git invocation. Must outlive the child process.
#[derive(Debug)]
pub struct AuthEnv {
    pub env_vars: Vec<(String, String)>,
    pub _cleanup: AskpassCleanup,
}

/// Builds the environment that feeds `credentials` to git.
pub fn build_auth_env(credentials: &GitCredentials) -> Result<AuthEnv> {
    let mut env = vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())];

    let password = match &credentials.password {
        Some(password) if !password.expose_secret().is_empty() => password,
        _ => {
            return Ok(AuthEnv {
                env_vars: env,
                _cleanup: AskpassCleanup::empty(),
            })
        }
    };

    let askpass_path = write_askpass_script(&credentials.username, password)?;
    let cleanup = AskpassCleanup::new(askpass_path.clone());

    let askpass_path_str = askpass_path
        .to_str()
        .ok_or_else(|| {
            GitError::Credentials("Temp directory path contains non-UTF8 characters".to_string())
        })?
        .to_string();

    env.push(("GIT_ASKPASS".to_string(), askpass_path_str));

    Ok(AuthEnv {
        env_vars: env,
        _cleanup: cleanup,
    })
}

#[cfg(unix)]
fn write_askpass_script(username: &str, password: &SecretString) -> Result<PathBuf> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let path = std::env::temp_dir().join(format!(".git-askpass-{}.sh", uuid::Uuid::new_v4()));
    let script = format!(
        "#!/bin/sh\ncase \"$1\" in\n  Username*) echo '{}' ;;\n  *) echo '{}' ;;\nesac\n",
        shell_escape(username),
        shell_escape(password.expose_secret())
    );

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o700)
        .open(&path)
        .map_err(|e| GitError::Credentials(e.to_string()))?;
    file.write_all(script.as_bytes())
        .map_err(|e| GitError::Credentials(e.to_string()))?;

    Ok(path)
}

#[cfg(not(unix))]
fn write_askpass_script(_username: &str, _password: &SecretString) -> Result<PathBuf> {
    Err(GitError::Credentials(
        "password credentials are only supported on unix hosts".to_string(),
    ))
}

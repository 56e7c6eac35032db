use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::github::parse_repo_slug;
use crate::sanitize::redact_repo_url;

/// Reads a JSON config file, applies environment overrides and validates it.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config: Config = serde_json::from_str(&content)?;
    config.apply_env_overrides();
    validate_config(&config)?;

    Ok(config)
}

/// Parses and validates a JSON config without consulting the environment.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

impl Config {
    /// Applies the deployment environment variables on top of the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(url) = get("GIT_REPO") {
            self.repository.url = url;
        }
        if let Some(username) = get("GIT_USERNAME") {
            self.repository.username = username;
        }
        if let Some(password) = get("GIT_PASSWORD") {
            self.repository.password = Some(password);
        }
        if let Some(email) = get("GIT_EMAIL") {
            self.repository.email = email;
        }
        if let Some(token) = get("GH_TOKEN") {
            self.repository.github_token = Some(token);
        }
        if let Some(socket) = get("CLAM_SOCKET") {
            self.virus_scan.clamd_socket = Some(PathBuf::from(socket));
        }
        if let Some(path) = get("JOBS_PATH") {
            self.jobs_path = PathBuf::from(path);
        }
        if let Some(path) = get("UPLOAD_PATH") {
            self.upload_path = PathBuf::from(path);
        }
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: &str| {
        Err(ConfigError::Validation {
            message: message.to_string(),
        })
    };

    let url = config.repository.url.trim();
    if url.is_empty() {
        return invalid("repository.url must not be empty");
    }

    if parse_repo_slug(url).is_err() {
        return Err(ConfigError::Validation {
            message: format!(
                "Could not find repo organisation and name in repository.url {}",
                redact_repo_url(url)
            ),
        });
    }

    if config.repository.branch.trim().is_empty() {
        return invalid("repository.branch must not be empty");
    }
    if config.repository.refresh_interval_secs == 0 {
        return invalid("repository.refreshIntervalSecs must be greater than 0");
    }
    if config.queue.capacity == 0 {
        return invalid("queue.capacity must be greater than 0");
    }
    if config.queue.collection_capacity == 0 {
        return invalid("queue.collectionCapacity must be greater than 0");
    }
    if config.repository.collections_path.trim().is_empty() {
        return invalid("repository.collectionsPath must not be empty");
    }
    if config.queue.poll_wait_ms == 0 {
        return invalid("queue.pollWaitMs must be greater than 0");
    }
    if config.sweep.interval_secs == 0 {
        return invalid("sweep.intervalSecs must be greater than 0");
    }
    if config.sweep.max_age_hours == 0 {
        return invalid("sweep.maxAgeHours must be greater than 0");
    }
    if config.virus_scan.timeout_secs == 0 {
        return invalid("virusScan.timeoutSecs must be greater than 0");
    }
    if config.virus_scan.command.trim().is_empty() {
        return invalid("virusScan.command must not be empty");
    }
    if config.engine.command.trim().is_empty() {
        return invalid("engine.command must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"{
        "repository": { "url": "https://github.com/unreal-archive/unreal-archive-data.git" },
        "engine": { "command": "ua-engine" }
    }"#;

    #[test]
    fn test_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.repository.branch, "master");
        assert_eq!(config.repository.content_path, "content");
        assert_eq!(config.repository.collections_path, "collections");
        assert_eq!(config.queue.collection_capacity, 5);
        assert_eq!(config.repository.refresh_interval_secs, 1800);
        assert_eq!(config.repository.submission_url, "https://unrealarchive.org/submit");
        assert_eq!(config.queue.capacity, 5);
        assert_eq!(config.queue.poll_wait_ms, 5000);
        assert_eq!(config.sweep.interval_secs, 120);
        assert_eq!(config.sweep.max_age_hours, 36);
        assert_eq!(config.virus_scan.command, "clamscan");
        assert_eq!(config.virus_scan.options, vec!["-avr"]);
        assert_eq!(config.virus_scan.timeout_secs, 300);
        assert!(config.virus_scan.clamd_socket.is_none());
        assert_eq!(config.jobs_path, PathBuf::from("/tmp"));
        assert_eq!(config.upload_path, PathBuf::from("/tmp/ua-submit-files"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_camel_case_fields() {
        let config = load_config_from_str(
            r#"{
                "repository": {
                    "url": "https://github.com/o/r.git",
                    "pullRequestLabels": ["submission"],
                    "refreshIntervalSecs": 60
                },
                "queue": { "capacity": 2, "pollWaitMs": 100 },
                "virusScan": { "clamdSocket": "/run/clamd.ctl", "timeoutSecs": 10 },
                "engine": { "command": "ua-engine" },
                "jobsPath": "/var/jobs"
            }"#,
        )
        .unwrap();
        assert_eq!(config.repository.pull_request_labels, vec!["submission"]);
        assert_eq!(config.queue.capacity, 2);
        assert_eq!(
            config.virus_scan.clamd_socket,
            Some(PathBuf::from("/run/clamd.ctl"))
        );
        assert_eq!(config.jobs_path, PathBuf::from("/var/jobs"));
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            (r#""url": """#, r#""command": "e""#, "", "repository.url"),
            (r#""url": "https://example.com/repo""#, r#""command": "e""#, "", "organisation"),
            (r#""url": "https://github.com/o/r.git""#, r#""command": " ""#, "", "engine.command"),
            (
                r#""url": "https://github.com/o/r.git""#,
                r#""command": "e""#,
                r#", "queue": { "capacity": 0 }"#,
                "queue.capacity",
            ),
            (
                r#""url": "https://github.com/o/r.git""#,
                r#""command": "e""#,
                r#", "queue": { "collectionCapacity": 0 }"#,
                "queue.collectionCapacity",
            ),
            (
                r#""url": "https://github.com/o/r.git", "collectionsPath": " ""#,
                r#""command": "e""#,
                "",
                "repository.collectionsPath",
            ),
            (
                r#""url": "https://github.com/o/r.git""#,
                r#""command": "e""#,
                r#", "sweep": { "maxAgeHours": 0 }"#,
                "sweep.maxAgeHours",
            ),
            (
                r#""url": "https://github.com/o/r.git""#,
                r#""command": "e""#,
                r#", "virusScan": { "timeoutSecs": 0 }"#,
                "virusScan.timeoutSecs",
            ),
        ];

        for (repo, engine, extra, expected) in cases {
            let json = format!(
                r#"{{ "repository": {{ {} }}, "engine": {{ {} }}{} }}"#,
                repo, engine, extra
            );
            match load_config_from_str(&json) {
                Err(ConfigError::Validation { message }) => {
                    assert!(message.contains(expected), "{} !~ {}", message, expected)
                }
                other => panic!("expected validation error for {}, got {:?}", json, other),
            }
        }
    }

    #[test]
    fn test_missing_required_section() {
        let result = load_config_from_str(r#"{ "repository": { "url": "https://github.com/o/r.git" } }"#);
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = load_config_from_str(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = [
            ("GIT_REPO", "https://github.com/other/data.git"),
            ("GIT_USERNAME", "bot"),
            ("GIT_PASSWORD", "secret"),
            ("GIT_EMAIL", "bot@example.com"),
            ("GH_TOKEN", "token"),
            ("CLAM_SOCKET", "/run/clamd.ctl"),
            ("JOBS_PATH", "/var/jobs"),
            ("UPLOAD_PATH", ""),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.repository.url, "https://github.com/other/data.git");
        assert_eq!(config.repository.username, "bot");
        assert_eq!(config.repository.password.as_deref(), Some("secret"));
        assert_eq!(config.repository.email, "bot@example.com");
        assert_eq!(config.repository.github_token.as_deref(), Some("token"));
        assert_eq!(
            config.virus_scan.clamd_socket,
            Some(PathBuf::from("/run/clamd.ctl"))
        );
        assert_eq!(config.jobs_path, PathBuf::from("/var/jobs"));
        // empty values leave the file setting alone
        assert_eq!(config.upload_path, PathBuf::from("/tmp/ua-submit-files"));
    }

    #[test]
    fn test_load_config_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.engine.command, "ua-engine");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/config.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}

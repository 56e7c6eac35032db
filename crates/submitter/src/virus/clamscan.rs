//! Virus scanning by running clamscan (or clamdscan) as a subprocess.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::runtime::Runtime;

use super::{ClamdConfig, VirusScanError, VirusScanner, VirusVerdict};
use crate::engine::absolute;
use crate::job::{Job, JobState};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ClamScan {
    program: String,
    options: Vec<String>,
    clamd: Option<ClamdConfig>,
    timeout: Duration,
    runtime: Runtime,
}

impl ClamScan {
    pub fn new(
        program: impl Into<String>,
        options: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, VirusScanError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| VirusScanError::Setup(e.to_string()))?;

        Ok(Self {
            program: program.into(),
            options,
            clamd: None,
            timeout,
            runtime,
        })
    }

    /// Scans through a clamd daemon using the given client config.
    pub fn with_clamd(mut self, config: ClamdConfig) -> Self {
        self.clamd = Some(config);
        self
    }

    /// Arguments passed to the scanner for `files`.
    pub fn arguments(&self, files: &[PathBuf]) -> Vec<String> {
        let mut args = self.options.clone();
        if let Some(clamd) = &self.clamd {
            args.push(clamd.config_arg());
        }
        args.extend(files.iter().map(|f| absolute(f).display().to_string()));
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<Option<i32>, VirusScanError> {
        let child = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| VirusScanError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| VirusScanError::Spawn {
                command: self.program.clone(),
                source: e,
            })?;

        log::debug!(
            "Malware scanner output: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );

        Ok(output.status.code())
    }
}

impl VirusScanner for ClamScan {
    fn scan(&self, job: &Job, files: &[PathBuf]) -> VirusVerdict {
        job.transition(JobState::VirusScanning, "Scanning for malware");

        let args = self.arguments(files);
        log::info!(
            "Invoking malware scan with command {} {}",
            self.program,
            args.join(" ")
        );

        let code = match self.runtime.block_on(self.run(args)) {
            Ok(code) => code,
            Err(e) => {
                log::error!("Malware scan failure for job {}: {}", job.id(), e);
                job.log_error(Some(JobState::VirusError), "Malware scan error.", &e);
                return VirusVerdict::ToolError;
            }
        };

        let verdict = VirusVerdict::from_exit_code(code);
        match verdict {
            VirusVerdict::Clean => job.transition(JobState::VirusFree, "No malware found"),
            VirusVerdict::Infected => job.log_error(
                Some(JobState::VirusFound),
                "Malware found!!",
                &VirusScanError::Infected,
            ),
            VirusVerdict::ScanFailed | VirusVerdict::ToolError => job.log_error(
                Some(JobState::VirusError),
                "Malware scan failed.",
                &VirusScanError::Failed(code),
            ),
        }

        verdict
    }
}

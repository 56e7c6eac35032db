//! Content engine driven through an external executable.
//!
//! The executable is invoked as
//! `<command> <scan|index> --root <dir> --content <dir> [--type <TYPE>] <path>...`
//! for uploads, and as
//! `<command> <collection-checkin|collection-archive|collection-sync> --root <dir> --content <dir> --manifest <file> [--image <file>]`
//! for collections. It writes one JSON event per line to stdout. Other
//! output is ignored.

use std::ffi::OsString;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{
    absolute, CollectionCurator, ContentEngine, CurateEvent, EngineError, IndexEvent, Result,
    ScanEvent,
};
use crate::collection::CollectionManifest;
use crate::job::ContentType;
use crate::repo::ContentView;

pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    /// `command` is split on whitespace; the first word is the executable.
    pub fn new(command: &str) -> Self {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_default();
        Self {
            program,
            args: words.collect(),
        }
    }

    fn run<E: DeserializeOwned>(
        &self,
        action: &str,
        view: &ContentView,
        extra: Vec<OsString>,
        sink: &mut dyn FnMut(E),
    ) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(action)
            .arg("--root")
            .arg(view.root())
            .arg("--content")
            .arg(view.content_dir())
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::debug!("Running content engine {} {}", self.program, action);

        let mut child = cmd.spawn().map_err(|e| EngineError::Spawn {
            command: self.program.clone(),
            source: e,
        })?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        if let Some(stdout) = child.stdout.take() {
            if let Err(e) = read_events(stdout, sink) {
                log::warn!("Lost content engine output, stopping {}: {}", self.program, e);
                let _ = child.kill();
                let _ = child.wait();
                if let Some(handle) = stderr_reader {
                    let _ = handle.join();
                }
                return Err(e.into());
            }
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(EngineError::Failed {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    /// Runs a collection action with `manifest` written to a temporary file.
    fn curate(
        &self,
        action: &str,
        view: &ContentView,
        manifest: &CollectionManifest,
        image: Option<&Path>,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<()> {
        let manifest_file =
            std::env::temp_dir().join(format!("ua-collection-{}.json", Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))?;
        fs::write(&manifest_file, json)?;

        let mut extra: Vec<OsString> = vec!["--manifest".into(), manifest_file.clone().into()];
        if let Some(image) = image {
            extra.push("--image".into());
            extra.push(absolute(image).into());
        }

        let result = self.run(action, view, extra, sink);
        if let Err(e) = fs::remove_file(&manifest_file) {
            log::warn!(
                "Failed to delete collection manifest {}: {}",
                manifest_file.display(),
                e
            );
        }
        result
    }
}

fn path_args(forced_type: Option<ContentType>, paths: &[PathBuf]) -> Vec<OsString> {
    let mut args = Vec::with_capacity(paths.len() + 2);
    if let Some(content_type) = forced_type {
        args.push("--type".into());
        args.push(content_type.as_str().into());
    }
    args.extend(paths.iter().map(|p| absolute(p).into_os_string()));
    args
}

/// Feeds every stdout line that parses as an event to `sink`. Lines are
/// decoded lossily so stray binary output cannot end the stream.
fn read_events<E: DeserializeOwned>(
    stdout: impl Read,
    sink: &mut dyn FnMut(E),
) -> std::io::Result<()> {
    for raw in BufReader::new(stdout).split(b'\n') {
        let raw = raw?;
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<E>(line) {
            Ok(event) => sink(event),
            Err(e) => log::debug!("Ignoring content engine output '{}': {}", line, e),
        }
    }
    Ok(())
}

impl ContentEngine for CommandEngine {
    fn scan(
        &self,
        view: &ContentView,
        paths: &[PathBuf],
        sink: &mut dyn FnMut(ScanEvent),
    ) -> Result<()> {
        self.run("scan", view, path_args(None, paths), sink)
    }

    fn index(
        &self,
        view: &ContentView,
        paths: &[PathBuf],
        forced_type: Option<ContentType>,
        sink: &mut dyn FnMut(IndexEvent),
    ) -> Result<()> {
        self.run("index", view, path_args(forced_type, paths), sink)
    }
}

impl CollectionCurator for CommandEngine {
    fn checkin(
        &self,
        view: &ContentView,
        manifest: &CollectionManifest,
        image: Option<&Path>,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<()> {
        self.curate("collection-checkin", view, manifest, image, sink)
    }

    fn archive(
        &self,
        view: &ContentView,
        manifest: &CollectionManifest,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<()> {
        self.curate("collection-archive", view, manifest, None, sink)
    }

    fn sync(
        &self,
        view: &ContentView,
        manifest: &CollectionManifest,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<()> {
        self.curate("collection-sync", view, manifest, None, sink)
    }
}

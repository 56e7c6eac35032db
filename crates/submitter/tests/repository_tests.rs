//! Content repository behaviour around the lock, refreshes and views.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use submitter::job::{ContentType, Job, JobState};
use submitter::repo::{ContentRepository, LockError, RefreshOutcome, RepoLock};
use submitter::SubmitterError;

#[test]
fn test_refresh_unchanged_keeps_view() {
    let p = Pipeline::new();
    let before = p.repo.view();

    assert_eq!(p.repo.refresh().unwrap(), RefreshOutcome::Unchanged);
    assert!(Arc::ptr_eq(&before, &p.repo.view()));
    assert!(p.vcs.calls().contains(&"pull".to_string()));
}

#[test]
fn test_refresh_publishes_new_view() {
    let p = Pipeline::new();
    let held = p.repo.view();
    assert_eq!(held.revision(), "rev-0");

    p.vcs.advance_remote("rev-1");
    assert_eq!(
        p.repo.refresh().unwrap(),
        RefreshOutcome::Updated {
            revision: "rev-1".to_string()
        }
    );

    // readers keep the snapshot they started with
    assert_eq!(held.revision(), "rev-0");
    assert_eq!(p.repo.view().revision(), "rev-1");
}

#[test]
fn test_refresh_skips_while_locked() {
    let p = Pipeline::new();
    p.vcs.advance_remote("rev-1");

    let guard = p.repo.lock().lock().unwrap();
    assert_eq!(p.repo.refresh().unwrap(), RefreshOutcome::Skipped);
    assert!(!p.vcs.calls().contains(&"pull".to_string()));
    drop(guard);

    assert!(matches!(
        p.repo.refresh().unwrap(),
        RefreshOutcome::Updated { .. }
    ));
}

#[test]
fn test_refresh_skips_during_publish_on_other_thread() {
    let p = Arc::new(Pipeline::new());

    let holder = {
        let p = Arc::clone(&p);
        let (locked_tx, locked_rx) = crossbeam_channel::bounded::<()>(0);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::spawn(move || {
            let _guard = p.repo.lock().lock().unwrap();
            locked_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        locked_rx.recv().unwrap();
        (handle, release_tx)
    };

    assert_eq!(p.repo.refresh().unwrap(), RefreshOutcome::Skipped);
    assert_eq!(p.repo.lock().lock().unwrap_err(), LockError::AlreadyLocked);

    holder.1.send(()).unwrap();
    holder.0.join().unwrap();
    assert!(!p.repo.lock().is_locked());
}

#[test]
fn test_submit_rejects_foreign_guard() {
    let p = Pipeline::new();
    let other = RepoLock::new();
    let guard = other.lock().unwrap();

    let job = Job::new(Some(ContentType::Map));
    let files = p.upload(&["DM-Deck16.zip"]);
    let result = p.repo.submit(&guard, &job, &files);

    assert!(matches!(
        result,
        Err(SubmitterError::Lock(LockError::ForeignGuard))
    ));
    assert!(p.vcs.mutating_calls().is_empty());
}

#[test]
fn test_submit_returns_one_result_per_file() {
    let p = Pipeline::new();
    let files = p.upload(&["a.zip", "b.zip", "c.zip", "d.zip"]);
    let job = Job::new(Some(ContentType::Map));
    job.transition(JobState::VirusScanning, "Scanning for malware");
    job.transition(JobState::VirusFree, "No malware found");
    job.transition(JobState::Scanned, "Content scan skipped");

    let guard = p.repo.lock().lock().unwrap();
    let results = p.repo.submit(&guard, &job, &files).unwrap();
    drop(guard);

    assert_eq!(results.len(), files.len());
    assert_eq!(job.state(), JobState::Submitted);
    assert_eq!(p.vcs.branch(), "master");
}

#[test]
fn test_scan_without_paths_is_error() {
    let p = Pipeline::new();
    let job = Job::new(None);
    assert!(matches!(
        p.repo.scan(&job, &[]),
        Err(SubmitterError::NoPaths)
    ));
}

#[test]
fn test_view_lists_content_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("content/UT/Maps")).unwrap();
    std::fs::write(root.join("content/UT/Maps/dm-deck16.yml"), "name: DM-Deck16").unwrap();

    let vcs = Arc::new(FakeVcs::new(root));
    let repo = ContentRepository::new(
        vcs,
        Arc::new(FakePullRequests::new()),
        Arc::new(FakeEngine::new()),
        settings(),
    )
    .unwrap();

    let view = repo.view();
    assert_eq!(view.len(), 1);
    assert!(view.contains(std::path::Path::new("UT/Maps/dm-deck16.yml")));
}

#[test]
fn test_lock_waiter_gets_lock_after_release() {
    let lock = Arc::new(RepoLock::new());
    let guard = lock.lock().unwrap();

    let waiter = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || lock.lock_timeout(Duration::from_secs(5)).map(|_| ()))
    };

    thread::sleep(Duration::from_millis(50));
    drop(guard);
    assert!(waiter.join().unwrap().is_ok());
}

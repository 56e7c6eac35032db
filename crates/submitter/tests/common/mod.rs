//! Shared test utilities for submitter integration tests.
//!
//! - fakes for every external collaborator of the pipeline
//! - `Pipeline`, which wires them into a repository, stage runner and queue

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::*;

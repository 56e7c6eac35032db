//! Job registry and the sweeper that evicts idle entries.

pub mod store;
pub mod sweeper;

pub use store::{JobRegistry, SweepStats};
pub use sweeper::Sweeper;

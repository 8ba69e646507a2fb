//! Run journal: append-only JSONL record of what a run did.

pub mod eventlog;
pub mod hasher;

pub use eventlog::EventLog;

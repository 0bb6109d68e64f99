//! Session orchestration.
//!
//! Covers transcript extraction, the per-session monitor state machine,
//! the monitor registry, startup recovery and the session creation path.

pub mod extractor;
pub mod monitor;
pub mod prompts;
pub mod recovery;
pub mod session_manager;
pub mod supervisor;

//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `JobState`: Tracks the lifecycle of a crawl job (created, running, draining, finished)

mod job_state;

// Re-export main types
pub use job_state::JobState;

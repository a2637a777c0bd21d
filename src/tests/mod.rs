//! Integration testing module
//!
//! - Orchestration scenarios against a scripted engine
//! - The real FFmpeg pipeline on generated tones

pub mod e2e;

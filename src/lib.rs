//! assetpipe - build-pipeline orchestrator for front-end assets
//!
//! This library provides functionality to:
//! - Describe asset types as a transform plugin, a lint plugin and extra stages
//! - Register them as named, dependency-ordered tasks
//! - Stream matched files through the stages, isolating per-file failures
//! - Re-run tasks when watched sources change

pub mod asset;
pub mod build;
pub mod cli;
pub mod config;
pub mod logging;
pub mod plugin;
pub mod project;
pub mod task;
pub mod watch;

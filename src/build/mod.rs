//! Pipeline execution for asset descriptors.
//!
//! # Overview
//!
//! - **Discovery**: match source files with the descriptor's glob
//! - **Pipeline**: stream each file through the transform, partial filter,
//!   extra stages and the destination writer (or the lint stages)
//! - **Result**: per-run reports and error tracking across runs
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::PipelineRunner;
//!
//! let report = PipelineRunner::new(descriptor).with_root(root).compile()?;
//! println!("{}", report.summary());
//! ```

pub mod discovery;
pub mod pipeline;
pub mod result;

pub use discovery::*;
pub use pipeline::*;
pub use result::*;

//! Plugins: named stream stages resolved from a capability registry.
//!
//! This module provides:
//! - The [`Stage`] trait and the [`SourceFile`] record stages operate on
//! - [`PluginRegistry`], which resolves plugin names (with options) to stages
//! - The built-in plugins registered by [`PluginRegistry::with_builtins`]
//!
//! Resolution happens when an asset descriptor is built, never per file, so
//! a missing plugin is a startup error.

pub mod builtin;
mod registry;
mod stage;

pub use registry::{
    find_program, PluginError, PluginHandle, PluginRegistry, StageFactory, EXEC_PREFIX,
};
pub use stage::{Diagnostic, Reporter, Severity, SourceFile, Stage, StageError};

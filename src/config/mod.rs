//! Configuration for asset types and projects
//!
//! Asset types read their plugin options from `.<type-id>-config.toml`
//! files; projects may declare asset types in `assetpipe.toml`.

pub mod loader;
pub mod schema;

pub use loader::{
    config_path_for, find_manifest_from, load, load_asset_config, load_manifest, resolve_path,
    ConfigError, MANIFEST_FILE,
};
pub use schema::*;

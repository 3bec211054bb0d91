//! User configuration for Bundlever.
//!
//! Preferences live in an optional `config.kdl`:
//!
//! ```kdl
//! backup #true
//! output-format "human"
//! ```
//!
//! Located at `$BUNDLEVER_CONFIG_DIR/config.kdl` when the variable is set,
//! otherwise `~/.config/bundlever/config.kdl` (platform config dir).
//!
//! ## Precedence
//!
//! CLI flag > config.kdl > built-in defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_DIR_ENV, ConfigOverrides, Resolved, ResolvedConfig, ValueSource, config_path,
    load_config_file, resolve_config,
};
pub use schema::{BundleverConfig, OutputFormat};

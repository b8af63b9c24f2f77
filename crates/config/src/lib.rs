//! Environment and YAML-backed configuration for the relay.
//!
//! Two independent pieces, matching the split in the system this crate
//! models: [`AppConfig`] is process configuration sourced entirely from
//! environment variables, and [`model_map`] owns loading and caching the
//! separate model-map YAML file. Model-map *resolution* (exact / wildcard /
//! catch-all precedence) is pure logic and lives in `transform::model_map`;
//! this crate only reads the file and keeps the process-wide cache.

pub mod app;
pub mod model_map;

pub use app::AppConfig;
pub use model_map::ModelMapCache;

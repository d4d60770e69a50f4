//! Frame handling shared by the stacking tools.
//!
//! This crate wraps the pure geometry in `stack-math` with everything that
//! touches pixels or the outside world: raster I/O and star extraction, the
//! compositor, the cached frame store and persisted configuration.

pub mod cli_args;
pub mod composite;
pub mod frame_store;
pub mod image_proc;
pub mod stack_config;

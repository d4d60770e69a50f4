//! Star-field frame stacking.
//!
//! Ties the frame store, star extraction, registration and compositing
//! together into a single run; see [`pipeline`].

pub mod pipeline;

pub use pipeline::{Frame, StackReport, StackRequest, Stacker};

//! Pointer-driven autohide for a desktop panel.
//!
//! A sampler thread polls the pointer and drives a four-state visibility
//! machine; a single dispatch thread owns the geometry cache and applies the
//! resulting visibility to a render sink. Compositor layout events force the
//! panel visible.

pub mod actor;
pub mod common;
pub mod model;
pub mod sys;

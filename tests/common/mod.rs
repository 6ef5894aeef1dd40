//! Shared test utilities for trailmark
//!
//! - Deterministic clock and config presets
//! - A simulated "world" of execution contexts sharing one slot store

pub mod world;

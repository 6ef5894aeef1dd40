//! Per-context trace accumulation.

pub mod builder;

pub use builder::TraceBuilder;

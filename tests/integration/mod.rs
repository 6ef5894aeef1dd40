//! Integration tests for trailmark
//!
//! These tests drive several session controllers against one shared store.

#[path = "../common/mod.rs"]
pub mod common;

pub mod cli;
pub mod session_flow;
pub mod sqlite_store;

//! MCP tool implementations.
//!
//! This module contains all tools exposed by the satchel server.

pub mod cache;

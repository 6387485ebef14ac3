//! Integration tests for the soipc routing daemon
//!
//! This crate contains end-to-end tests that exercise the full pipeline:
//! - Command decode and dispatch
//! - Routing tables and subscription state
//! - The three I/O contexts and the watchdog
//!
//! # Test Structure
//!
//! - `daemon_e2e.rs` - Full daemon scenarios over the in-memory transport
//! - `unix_channel.rs` - Local delivery over real unix datagram sockets

// This crate only contains tests, no library code

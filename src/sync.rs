//! Synchronization primitives for in-process communication.
//!
//! This module provides the blocking queue underneath both dispatcher
//! endpoints.

pub mod queue;

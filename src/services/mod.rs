//! Asynchronous services and external integrations
//!
//! This module contains all code that talks to the remote-storage
//! collaborator, runs transfers, or sets up process-wide logging.

pub mod log_dirs;
pub mod remote;
pub mod session;
pub mod tracing_setup;
pub mod transfer;

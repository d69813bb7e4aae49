// Cloud explorer library - lazy remote tree, capability gating and transfer coordination

pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod services;
pub mod view;

pub use error::{ExplorerError, Result};

//! View layer
//!
//! Presentation-side state a shell renders from. Nothing here draws.

pub mod file_tree;

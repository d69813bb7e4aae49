//! Controllers a shell drives: the explorer navigator and the destination picker

pub mod folder_picker;
pub mod navigator;

pub use folder_picker::FolderPicker;
pub use navigator::{Affordances, BusyState, Navigator};

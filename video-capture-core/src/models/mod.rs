pub mod descriptor;
pub mod error;
pub mod format;
pub mod frame;
pub mod state;

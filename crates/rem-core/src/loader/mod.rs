pub mod loader;

pub use loader::{encode_str, ProgramImage};

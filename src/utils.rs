//! Utility functions and helpers.

pub mod settings;
pub mod text;

pub use settings::{get_env_var, get_env_vars, Settings};

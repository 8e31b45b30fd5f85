// Tree view library - exposes all core modules for the dump tool and tests

pub mod app;
pub mod config;
pub mod error;
pub mod host;
pub mod protocol;
pub mod services;
pub mod tree;

pub use error::{Result, TreeError};

pub mod bump;
pub mod changelog;
pub mod config;
pub mod context;
pub mod cutting;
pub mod domain;
pub mod error;
pub mod git;
pub mod hosting;
pub mod logging;
pub mod project;
pub mod ui;
pub mod warning;

pub use error::{ReleaseError, Result};

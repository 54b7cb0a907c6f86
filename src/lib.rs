#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod provider;
pub mod queue;
pub mod security;
pub mod sessions;
pub mod terminal;
pub mod tui;

pub use config::Config;
pub use error::{MagpieError, Result};

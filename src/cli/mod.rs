//! Command-line entry point for the photobooth service
//!
//! Only available when the "server" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, Cli};

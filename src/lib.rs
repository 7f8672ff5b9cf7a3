#[macro_use]
extern crate log;

pub mod cli;
pub mod daemon_status;
pub mod env;
pub mod error;
pub mod fingerprint;
pub mod logger;
pub mod port;
pub mod procs;
pub mod registry;
pub mod scrape_config;
pub mod settings;
pub mod supervisor;
pub mod target;
pub mod ui;
pub mod web;

pub use miette::Result;

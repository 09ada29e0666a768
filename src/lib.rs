#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;
pub mod utils;

pub use agent::AgentLoop;
pub use config::Config;
pub use error::ReagentError;

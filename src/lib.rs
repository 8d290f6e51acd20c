#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod agent;
pub mod app;
pub mod attachments;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
#[doc(hidden)]
pub mod observability;
pub mod parser;
pub mod postprocess;
pub mod prompt;
pub mod training;
pub mod transport;

pub use config::Config;

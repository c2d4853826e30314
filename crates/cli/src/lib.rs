//! Command-line client for the PromptLink relay server

pub mod api_client;
pub mod completions;
pub mod display;
pub mod interactive;
pub mod oneshot;

pub mod cli;
pub mod gemini;
pub mod load_config;
pub mod steps;

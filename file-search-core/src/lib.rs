#![doc = "file-search-core: workflows for driving a hosted file search (RAG) service."]

//! This crate holds everything in file-search-demo that is not transport:
//! the [`contract::FileSearchApi`] trait and its data types, the process-wide
//! [`config::Settings`] value, the error taxonomy, the polling primitive and the
//! three workflows (store resolution, upload/replace, query).
//!
//! The HTTP client for the Gemini API lives in the `file-search-demo` crate and
//! implements [`contract::FileSearchApi`]; tests use the `mockall` generated
//! `MockFileSearchApi` or an in-memory fake.

pub mod config;
pub mod contract;
pub mod error;
pub mod metadata;
pub mod poll;
pub mod query;
pub mod store;
pub mod upload;

pub use error::{Error, Result};

//! Core types and trait definitions for the Roster people directory.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the visibility policy, the filter model, the query plan and the directory
//! entry point; storage backends implement [`store::DirectoryStore`].

pub mod capability;
pub mod classify;
pub mod course;
pub mod department;
pub mod directory;
pub mod error;
pub mod filter;
pub mod id;
pub mod person;
pub mod policy;
pub mod query;
pub mod role;
pub mod settings;
pub mod store;

pub use directory::{Directory, DirectoryResult};
pub use error::{Error, Result};

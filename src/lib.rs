#![warn(clippy::unused_async)]
//! Model, field and method intelligence for Odoo-style Python projects.
//!
//! The entry point is [`Workspace`], which scans a project for model declarations,
//! keeps an inheritance graph of them up to date and resolves inherited members.

pub mod config;
pub mod error;
pub mod index;
pub mod inspect;
pub mod model;
pub mod resolve;
pub mod str;
pub mod syntax;
pub mod utils;
pub mod workspace;

pub use error::IndexError;
pub use str::ImStr;
pub use workspace::{ModelSummary, Workspace};

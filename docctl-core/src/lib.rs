#![doc = "docctl-core: core logic library for docctl."]

//! This crate holds the document-control pipeline: Markdown conversion,
//! revision decisions, redlines, uid allocation and publish sequencing.
//! The HTTP page store and git integration live in the `docctl` binary
//! crate behind the traits in [`contract`].
//!
//! # Usage
//! Add this as a dependency for anything that converts, validates or
//! publishes controlled documents.

pub mod blocks;
pub mod config;
pub mod contract;
pub mod convert;
pub mod diff;
pub mod document;
pub mod error;
pub mod inline;
pub mod links;
pub mod page;
pub mod pipeline;
pub mod publish;
pub mod revision;
pub mod schema;
pub mod store;
pub mod uid;
pub mod validate;
pub mod wire;

//! AWS-oriented adapters and handlers for archiving DynamoDB stream batches.
//!
//! This crate owns runtime integration details (the Lambda handler, logging
//! setup and object store adapters) and re-exports the domain primitives
//! from `stream_archive_core` under a single runtime module boundary.

pub mod adapters;
pub mod handlers;
pub mod logging;
pub mod runtime;

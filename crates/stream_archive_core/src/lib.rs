//! Shared change-stream archiving primitives.
//!
//! This crate owns the change-record contract, typed attribute untagging,
//! category selection and object key layout. It intentionally excludes AWS
//! SDK and Lambda runtime concerns.

pub mod attributes;
pub mod category;
pub mod contract;
pub mod storage_keys;

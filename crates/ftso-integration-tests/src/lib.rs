//! Integration test crate for the FTSO data provider.
//!
//! This crate has no library code; it only contains integration tests
//! that exercise end-to-end round flows across the workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p ftso-integration-tests
//! ```

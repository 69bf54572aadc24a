//! # Entigraph Testkit
//!
//! Test utilities for entigraph.
//!
//! This crate provides:
//! - A canned teaching-platform dataset and seeded memory transports
//! - Property-based payload generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entigraph_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn reads_the_dataset() {
//!     let transport = memory_transport();
//!     assert_eq!(transport.read_count("units"), 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;

//! # Entigraph Service
//!
//! Entity services and transports for entigraph.
//!
//! This crate provides:
//! - [`EntityService`]: get / fetch / query / fetch_all / update over one resource
//! - The [`Transport`] abstraction consumed by services
//! - [`MemoryTransport`] for fixtures and tests
//! - [`HttpTransport`] over a pluggable [`HttpClient`]
//!
//! ## Key Invariants
//!
//! - A fetch merges into the cached instance; it never replaces it
//! - Every successful decode commits to the target cache scope
//! - Concurrent reads of one (scope, resource, id) share one transport call
//! - A failed async continuation never fails an already-resolved call

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod filter;
mod http;
mod service;
mod transport;

pub use config::{RequestOptions, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use filter::Filter;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use service::{EntityService, Target};
pub use transport::{MemoryTransport, RecordedWrite, Transport};

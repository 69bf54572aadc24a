//! # Entigraph Core
//!
//! Identity-cached entity mapping for graph-shaped API data.
//!
//! This crate provides:
//! - Entity identity and shared handles ([`EntityId`], [`EntityRef`])
//! - Declarative mapping tables (rename, decode, side-effect and async rules)
//! - A mapping process that applies a table to one raw payload
//! - Identity caches that guarantee one live instance per id per scope
//! - Outbound encoding of the round-trippable subset of an entity
//!
//! ## Architecture
//!
//! ```text
//! RawPayload ──▶ IdentityCache::get_or_create ──▶ EntityFactory::create_instance
//!                        │                                   │
//!                        ╰── MappingProcess::run ◀── MappingTable (ordered rules)
//!                                   │
//!                                   ╰── async rules: stub now, continuation later
//! ```
//!
//! ## Key Invariants
//!
//! - A cache scope never holds two instances for one id
//! - Rules run in declared order; a decode rule sees only earlier fields
//! - A rule whose wire key is absent is skipped, so partial payloads merge
//! - A decode completes without waiting for async continuations
//! - Only round-trippable keys are encoded

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
pub mod entity;
mod error;
mod factory;
pub mod mapping;
pub mod payload;

pub use cache::IdentityCache;
pub use entity::{Entity, EntityId, EntityRef, WeakEntityRef};
pub use error::{MappingError, MappingResult, SharedError};
pub use factory::{ConstructorFn, EntityFactory, EntityMapper};
pub use mapping::{
    encode, encode_ref, AsyncTracker, Continuation, Decoded, MappingProcess, MappingRule,
    MappingTable, MappingTableBuilder, Pending, ProcessState, RuleKind,
};
pub use payload::{payload_from_value, stub_payload, to_wire_key, PayloadExt, RawPayload};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

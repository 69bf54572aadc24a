//! Declarative wire ↔ entity mapping.
//!
//! - [`MappingRule`] / [`RuleKind`]: one declarative instruction
//! - [`MappingTable`]: the ordered rules of one entity type
//! - [`MappingProcess`]: applies a table to one payload
//! - [`encode`]: the inverse, for round-trippable fields only

mod encode;
mod process;
mod rule;
mod table;
mod tracker;

pub use encode::{encode, encode_ref};
pub use process::{Decoded, MappingProcess, ProcessState};
pub use rule::{
    AsyncDecodeFn, AsyncStep, DecodeFn, EncodeFn, Field, MappingRule, Pending, RenameFn, RuleKind,
    SideEffectFn,
};
pub use table::{MappingTable, MappingTableBuilder};
pub use tracker::{AsyncTracker, Continuation};

//! Declarative mapping rules.

use crate::entity::{Entity, EntityRef};
use crate::error::{MappingError, MappingResult, SharedError};
use crate::payload::{decode_value, to_wire_key, RawPayload};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

/// A deferred assignment of one field value onto an entity.
pub type Assign<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Copies a single wire value into the entity.
pub type RenameFn<T> = Arc<dyn Fn(&mut T, &Value) -> MappingResult<()> + Send + Sync>;

/// Computes a field value from the payload and already-populated fields.
pub type DecodeFn<T> = Arc<dyn Fn(&RawPayload, &T) -> MappingResult<Assign<T>> + Send + Sync>;

/// Mutates the entity without producing a field value.
pub type SideEffectFn<T> = Arc<dyn Fn(&RawPayload, &EntityRef<T>) -> MappingResult<()> + Send + Sync>;

/// Produces a stub assignment plus the nested fetch that yields the final one.
pub type AsyncDecodeFn<T> =
    Arc<dyn Fn(&RawPayload, &EntityRef<T>) -> MappingResult<AsyncStep<T>> + Send + Sync>;

/// Renders one field for an outbound payload.
pub type EncodeFn<T> = Arc<dyn Fn(&T) -> MappingResult<Value> + Send + Sync>;

/// A typed accessor pair for one entity field.
///
/// Usually built with the [`field!`](crate::field) macro.
pub struct Field<T, F> {
    name: &'static str,
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F> Field<T, F> {
    /// Creates a field accessor.
    pub fn new(name: &'static str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self {
        Self { name, get, get_mut }
    }

    /// Returns the Rust field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reads the field.
    pub fn get<'a>(&self, entity: &'a T) -> &'a F {
        (self.get)(entity)
    }

    /// Overwrites the field.
    pub fn set(&self, entity: &mut T, value: F) {
        *(self.get_mut)(entity) = value;
    }
}

impl<T, F> Clone for Field<T, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, F> Copy for Field<T, F> {}

/// Builds a [`Field`] accessor for `entity_type.field_name`.
///
/// ```ignore
/// let grade = field!(Project, grade);
/// ```
#[macro_export]
macro_rules! field {
    ($ty:ty, $name:ident) => {
        $crate::mapping::Field::<$ty, _>::new(
            stringify!($name),
            |entity| &entity.$name,
            |entity| &mut entity.$name,
        )
    };
}

/// The value an async rule hands back: a provisional stub, available
/// immediately, and the nested fetch producing the final value.
pub struct Pending<F> {
    stub: F,
    fetch: BoxFuture<'static, Result<F, SharedError>>,
}

impl<F: Send + 'static> Pending<F> {
    /// Creates a pending value from a stub and the fetch that refines it.
    pub fn new<Fut, E>(stub: F, fetch: Fut) -> Self
    where
        Fut: Future<Output = Result<F, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            stub,
            fetch: fetch
                .map(|result| result.map_err(|e| Arc::new(e) as SharedError))
                .boxed(),
        }
    }
}

/// Type-erased form of [`Pending`], bound to a field.
pub struct AsyncStep<T> {
    pub(crate) stub: Assign<T>,
    pub(crate) fetch: BoxFuture<'static, Result<Assign<T>, SharedError>>,
}

/// How a rule turns wire data into entity state.
pub enum RuleKind<T: Entity> {
    /// Copy the wire value under the rule's key into a field.
    Rename(RenameFn<T>),
    /// Compute a field from the payload and earlier fields.
    Decode(DecodeFn<T>),
    /// Mutate the entity (nested collections, derived aggregates).
    SideEffect(SideEffectFn<T>),
    /// Assign a stub now and the resolved value once a nested fetch completes.
    AsyncDecode(AsyncDecodeFn<T>),
}

impl<T: Entity> RuleKind<T> {
    /// Short name of the variant, for logs.
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Rename(_) => "rename",
            RuleKind::Decode(_) => "decode",
            RuleKind::SideEffect(_) => "side_effect",
            RuleKind::AsyncDecode(_) => "async_decode",
        }
    }
}

/// One entry of a mapping table.
///
/// A rule is keyed by an entity key (`targetGrade`) and a wire key
/// (`target_grade` by default). It is skipped when its wire key is absent
/// from the payload, unless it is marked [`required`](Self::required).
pub struct MappingRule<T: Entity> {
    entity_key: &'static str,
    wire_key: String,
    required: bool,
    encoder: Option<EncodeFn<T>>,
    kind: RuleKind<T>,
}

impl<T: Entity> MappingRule<T> {
    fn with_kind(entity_key: &'static str, kind: RuleKind<T>) -> Self {
        Self {
            entity_key,
            wire_key: to_wire_key(entity_key),
            required: false,
            encoder: None,
            kind,
        }
    }

    /// A plain copy of the wire value into `field`. Also encodable.
    ///
    /// A `null` the field type cannot hold (a `bool`, a `String`) leaves
    /// the field as it was; `Option` fields take it as `None`. Any other
    /// value that does not fit the field is [`MappingError::InvalidValue`].
    pub fn rename<F>(entity_key: &'static str, field: Field<T, F>) -> Self
    where
        F: Serialize + DeserializeOwned + Send + 'static,
    {
        let wire_key = to_wire_key(entity_key);
        let apply: RenameFn<T> = Arc::new(move |entity: &mut T, value: &Value| {
            match decode_value(entity_key, value) {
                Ok(decoded) => field.set(entity, decoded),
                Err(_) if value.is_null() => {
                    trace!(rule = entity_key, "null leaves the field unchanged");
                }
                Err(error) => return Err(error),
            }
            Ok(())
        });
        let encoder: EncodeFn<T> = Arc::new(move |entity: &T| {
            serde_json::to_value(field.get(entity))
                .map_err(|e| MappingError::invalid(entity_key, e.to_string()))
        });
        Self {
            entity_key,
            wire_key,
            required: false,
            encoder: Some(encoder),
            kind: RuleKind::Rename(apply),
        }
    }

    /// A pure function of the payload and already-populated fields,
    /// assigned to `field`.
    ///
    /// The closure runs while a read lock on the entity is held. It must
    /// not lock the same entity for writing, directly or through a nested
    /// decode that merges into it (a cached relation pointing back at this
    /// entity). Use [`side_effect`](Self::side_effect) or
    /// [`async_decode`](Self::async_decode) for rules that can re-enter.
    pub fn decode<F, D>(entity_key: &'static str, field: Field<T, F>, decode: D) -> Self
    where
        F: Send + 'static,
        D: Fn(&RawPayload, &T) -> MappingResult<F> + Send + Sync + 'static,
    {
        let decode: DecodeFn<T> = Arc::new(move |raw: &RawPayload, entity: &T| {
            let value = decode(raw, entity)?;
            Ok(Box::new(move |entity: &mut T| field.set(entity, value)) as Assign<T>)
        });
        Self::with_kind(entity_key, RuleKind::Decode(decode))
    }

    /// A mutation with no field value of its own. The callback receives
    /// the shared handle so it can populate child scopes without holding
    /// the entity lock.
    pub fn side_effect<S>(entity_key: &'static str, effect: S) -> Self
    where
        S: Fn(&RawPayload, &EntityRef<T>) -> MappingResult<()> + Send + Sync + 'static,
    {
        Self::with_kind(entity_key, RuleKind::SideEffect(Arc::new(effect)))
    }

    /// A side effect that only touches the entity's own fields.
    pub fn side_effect_mut<S>(entity_key: &'static str, effect: S) -> Self
    where
        S: Fn(&RawPayload, &mut T) -> MappingResult<()> + Send + Sync + 'static,
    {
        Self::side_effect(entity_key, move |raw, entity| effect(raw, &mut entity.write()))
    }

    /// A relation resolved through a nested fetch.
    pub fn async_decode<F, A>(entity_key: &'static str, field: Field<T, F>, resolve: A) -> Self
    where
        F: Send + 'static,
        A: Fn(&RawPayload, &EntityRef<T>) -> MappingResult<Pending<F>> + Send + Sync + 'static,
    {
        let resolve: AsyncDecodeFn<T> = Arc::new(move |raw: &RawPayload, entity: &EntityRef<T>| {
            let Pending { stub, fetch } = resolve(raw, entity)?;
            Ok(AsyncStep {
                stub: Box::new(move |entity: &mut T| field.set(entity, stub)),
                fetch: fetch
                    .map(move |result| {
                        result.map(|value| {
                            Box::new(move |entity: &mut T| field.set(entity, value)) as Assign<T>
                        })
                    })
                    .boxed(),
            })
        });
        Self::with_kind(entity_key, RuleKind::AsyncDecode(resolve))
    }

    /// Overrides the wire key.
    pub fn wire_key(mut self, wire_key: impl Into<String>) -> Self {
        self.wire_key = wire_key.into();
        self
    }

    /// Fails the decode when the wire key is absent.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets how the field is written to outbound payloads.
    ///
    /// A `null` result omits the key.
    pub fn to_json<E>(mut self, encode: E) -> Self
    where
        E: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.encoder = Some(Arc::new(move |entity: &T| Ok(encode(entity))));
        self
    }

    /// Returns the entity key.
    pub fn entity_key(&self) -> &'static str {
        self.entity_key
    }

    /// Returns the wire key.
    pub fn wire_key_name(&self) -> &str {
        &self.wire_key
    }

    /// Returns true if the wire key must be present.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the rule kind.
    pub fn kind(&self) -> &RuleKind<T> {
        &self.kind
    }

    /// Returns the encoder, if the rule has one.
    pub fn encoder(&self) -> Option<&EncodeFn<T>> {
        self.encoder.as_ref()
    }
}

impl<T: Entity> fmt::Debug for MappingRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingRule")
            .field("entity_key", &self.entity_key)
            .field("wire_key", &self.wire_key)
            .field("kind", &self.kind.label())
            .field("required", &self.required)
            .field("encodable", &self.encoder.is_some())
            .finish()
    }
}

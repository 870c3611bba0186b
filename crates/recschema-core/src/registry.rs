//! # Type Registry and Introspector
//!
//! Converts record types into [`TypeDescriptor`]s and memoizes them.
//!
//! ## Sessions
//!
//! [`Catalog::describe`] opens an [`Introspection`] session. The session
//! stages a placeholder for a record *before* running its `describe`, so
//! self-referential and mutually recursive records resolve to a reference
//! instead of recursing forever. Variants of a discriminated base are
//! introspected after the base itself is staged, so a variant may inherit
//! the base's fields.
//!
//! Once the root and everything it reaches is staged, discriminator values
//! are resolved for every base and the whole session is committed in one
//! step. A failing session commits nothing, so other threads never observe
//! a placeholder or a half-built graph.
//!
//! ## Concurrency
//!
//! Committed descriptors live in a sharded map guarded by `parking_lot`
//! read-write locks. Commits are insert-if-absent-or-stale: two threads
//! introspecting the same type concurrently both succeed and one of the two
//! equivalent descriptors wins.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;

use crate::codec::{EncodeContext, EncodeOptions};
use crate::descriptor::{FieldDescriptor, TypeDescriptor, Variant};
use crate::encoder::{EncoderRegistry, FieldEncoder};
use crate::error::SchemaGenerationError;
use crate::record::{FieldValue, Record};
use crate::signature::{EncoderMarker, TypeKey, TypeSignature};

const SHARDS: usize = 16;

/// Memoized descriptors, sharded by type identity.
pub struct TypeRegistry {
    shards: [RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>; SHARDS],
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
        }
    }

    fn shard(&self, id: TypeId) -> &RwLock<HashMap<TypeId, Arc<TypeDescriptor>>> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARDS]
    }

    /// The committed descriptor for `key`, whatever its version.
    pub fn get(&self, key: &TypeKey) -> Option<Arc<TypeDescriptor>> {
        self.shard(key.id()).read().get(&key.id()).cloned()
    }

    fn get_fresh(&self, key: &TypeKey, version: u64) -> Option<Arc<TypeDescriptor>> {
        self.get(key).filter(|d| d.encoder_version == version)
    }

    fn commit(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let id = descriptor.key.id();
        let mut shard = self.shard(id).write();
        match shard.get(&id) {
            Some(existing) if existing.encoder_version >= descriptor.encoder_version => existing.clone(),
            _ => {
                let descriptor = Arc::new(descriptor);
                shard.insert(id, descriptor.clone());
                descriptor
            }
        }
    }

    /// Every committed descriptor, sorted by name.
    pub fn all(&self) -> Vec<Arc<TypeDescriptor>> {
        let mut out: Vec<_> = self
            .shards
            .iter()
            .flat_map(|s| s.read().values().cloned().collect::<Vec<_>>())
            .collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    /// Number of committed descriptors.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// True if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-runs introspection for one record type.
type Refresh = fn(&Catalog) -> Result<Arc<TypeDescriptor>, SchemaGenerationError>;

/// Field encoders plus the descriptors resolved against them.
pub struct Catalog {
    types: TypeRegistry,
    encoders: EncoderRegistry,
    refreshers: RwLock<HashMap<TypeId, Refresh>>,
}

impl Catalog {
    /// A catalog with the built-in encoders.
    pub fn new() -> Self {
        Self::with_encoders(EncoderRegistry::with_defaults())
    }

    /// A catalog over a caller-supplied encoder registry.
    pub fn with_encoders(encoders: EncoderRegistry) -> Self {
        Self {
            types: TypeRegistry::new(),
            encoders,
            refreshers: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide catalog.
    pub fn global() -> Arc<Catalog> {
        static GLOBAL: OnceLock<Arc<Catalog>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Catalog::new())).clone()
    }

    /// The field encoder registry.
    pub fn encoders(&self) -> &EncoderRegistry {
        &self.encoders
    }

    /// The committed descriptors.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Register (or replace) the encoder for `T`. Descriptors resolved
    /// before this call are rebuilt on next use.
    pub fn register_encoder<T: 'static, E: FieldEncoder<T>>(&self, encoder: E) -> u64 {
        self.encoders.register::<T, E>(encoder)
    }

    /// Descriptor for `R`, introspecting it (and everything it reaches) on
    /// first use.
    pub fn describe<R: Record>(&self) -> Result<Arc<TypeDescriptor>, SchemaGenerationError> {
        let key = R::type_key();
        let version = self.encoders.version();
        match self.types.get(&key) {
            Some(existing) if existing.encoder_version == version => return Ok(existing),
            Some(existing) => tracing::warn!(
                type_name = key.name(),
                stale = existing.encoder_version,
                current = version,
                "rebuilding stale descriptor"
            ),
            None => {}
        }
        let mut session = Introspection::new(self, version);
        session.record::<R>()?;
        session.commit()?;
        self.types
            .get(&key)
            .ok_or(SchemaGenerationError::UnknownType { type_name: key.name() })
    }

    /// The committed descriptor for `key`, if any.
    pub fn descriptor(&self, key: &TypeKey) -> Option<Arc<TypeDescriptor>> {
        self.types.get(key)
    }

    /// Every described record, sorted by name. Descriptors resolved
    /// against an older encoder registry are rebuilt first.
    pub fn descriptors(&self) -> Result<Vec<Arc<TypeDescriptor>>, SchemaGenerationError> {
        let version = self.encoders.version();
        let mut out = Vec::new();
        for descriptor in self.types.all() {
            if descriptor.encoder_version == version {
                out.push(descriptor);
                continue;
            }
            let refresh = self.refreshers.read().get(&descriptor.key.id()).copied();
            match refresh {
                Some(refresh) => out.push(refresh(self)?),
                None => tracing::debug!(
                    type_name = descriptor.name(),
                    "skipping stale descriptor with no refresher"
                ),
            }
        }
        Ok(out)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

type VariantIntrospector<'c> = fn(&mut Introspection<'c>) -> Result<TypeKey, SchemaGenerationError>;

struct Staged {
    descriptor: Option<TypeDescriptor>,
    variants: Vec<TypeKey>,
}

/// One introspection pass over a type graph.
pub struct Introspection<'c> {
    catalog: &'c Catalog,
    version: u64,
    staged: HashMap<TypeId, Staged>,
    order: Vec<TypeId>,
    refreshers: Vec<(TypeId, Refresh)>,
}

impl<'c> Introspection<'c> {
    fn new(catalog: &'c Catalog, version: u64) -> Self {
        Self {
            catalog,
            version,
            staged: HashMap::new(),
            order: Vec::new(),
            refreshers: Vec::new(),
        }
    }

    /// The catalog this session commits into.
    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    /// Signature of a field type, preferring a registered encoder over the
    /// type's structural signature.
    pub fn resolve<F: FieldValue>(&mut self) -> Result<TypeSignature, SchemaGenerationError> {
        if self.catalog.encoders.contains::<F>() {
            return Ok(TypeSignature::Custom(EncoderMarker::of::<F>()));
        }
        F::signature(self)
    }

    /// Stage `R` (if not already known) and return its key.
    pub fn record<R: Record>(&mut self) -> Result<TypeKey, SchemaGenerationError> {
        let key = R::type_key();
        if self.staged.contains_key(&key.id())
            || self.catalog.types.get_fresh(&key, self.version).is_some()
        {
            return Ok(key);
        }
        self.staged.insert(
            key.id(),
            Staged {
                descriptor: None,
                variants: Vec::new(),
            },
        );

        let mut builder = TypeBuilder::new(key, self);
        R::describe(&mut builder)?;
        let (descriptor, deferred) = builder.finish();

        self.staged.insert(
            key.id(),
            Staged {
                descriptor: Some(descriptor),
                variants: Vec::new(),
            },
        );
        self.order.push(key.id());
        self.refreshers.push((key.id(), Catalog::describe::<R> as Refresh));
        tracing::debug!(type_name = key.name(), "introspected record");

        if !deferred.is_empty() {
            let mut variants = Vec::with_capacity(deferred.len());
            for introspect in deferred {
                variants.push(introspect(self)?);
            }
            if let Some(staged) = self.staged.get_mut(&key.id()) {
                staged.variants = variants;
            }
        }
        Ok(key)
    }

    fn is_pending(&self, key: &TypeKey) -> bool {
        matches!(self.staged.get(&key.id()), Some(Staged { descriptor: None, .. }))
    }

    fn with_descriptor<T>(&self, key: &TypeKey, f: impl FnOnce(&TypeDescriptor) -> T) -> Option<T> {
        match self.staged.get(&key.id()) {
            Some(Staged {
                descriptor: Some(d), ..
            }) => Some(f(d)),
            Some(_) => None,
            None => self
                .catalog
                .types
                .get_fresh(key, self.version)
                .map(|d| f(&d)),
        }
    }

    fn discriminator_value(
        &self,
        base: &TypeDescriptor,
        property: &str,
        variant: &TypeKey,
    ) -> Result<Value, SchemaGenerationError> {
        self.with_descriptor(variant, |d| {
            d.field_by_wire_name(property)
                .and_then(|f| f.signature.single_literal())
                .cloned()
        })
        .flatten()
        .ok_or_else(|| SchemaGenerationError::MissingDiscriminator {
            base: base.name(),
            variant: variant.name(),
            property: property.to_string(),
        })
    }

    fn commit(self) -> Result<(), SchemaGenerationError> {
        let mut finished = Vec::with_capacity(self.order.len());
        for id in &self.order {
            let Some(staged) = self.staged.get(id) else {
                continue;
            };
            let Some(mut descriptor) = staged.descriptor.clone() else {
                continue;
            };
            if let Some(property) = descriptor.discriminator.clone() {
                for key in &staged.variants {
                    let value = self.discriminator_value(&descriptor, &property, key)?;
                    if let Some(existing) = descriptor.variant_for(&value) {
                        return Err(SchemaGenerationError::DiscriminatorCollision {
                            base: descriptor.name(),
                            property,
                            value: value.to_string(),
                            first: existing.key.name(),
                            second: key.name(),
                        });
                    }
                    descriptor.variants.push(Variant { value, key: *key });
                }
            }
            finished.push(descriptor);
        }
        let count = finished.len();
        for descriptor in finished {
            self.catalog.types.commit(descriptor);
        }
        self.catalog.refreshers.write().extend(self.refreshers.iter().copied());
        tracing::debug!(count, version = self.version, "committed introspection session");
        Ok(())
    }
}

/// Declares the shape of one record inside [`Record::describe`].
pub struct TypeBuilder<'s, 'c> {
    session: &'s mut Introspection<'c>,
    key: TypeKey,
    description: Option<String>,
    fields: Vec<FieldDescriptor>,
    own: HashSet<&'static str>,
    bases: Vec<TypeKey>,
    discriminator: Option<String>,
    deferred: Vec<VariantIntrospector<'c>>,
    additional_properties: bool,
}

impl<'s, 'c> TypeBuilder<'s, 'c> {
    fn new(key: TypeKey, session: &'s mut Introspection<'c>) -> Self {
        Self {
            session,
            key,
            description: None,
            fields: Vec::new(),
            own: HashSet::new(),
            bases: Vec::new(),
            discriminator: None,
            deferred: Vec::new(),
            additional_properties: true,
        }
    }

    /// Schema name of the record being described.
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    /// Set the description text.
    pub fn description(&mut self, text: impl Into<String>) -> &mut Self {
        self.description = Some(text.into());
        self
    }

    /// Inherit every field of `B`. Base fields come first; a field
    /// declared later under the same name replaces the inherited one in
    /// place.
    pub fn base<B: Record>(&mut self) -> Result<&mut Self, SchemaGenerationError> {
        let base_key = self.session.record::<B>()?;
        if self.session.is_pending(&base_key) {
            return Err(SchemaGenerationError::CyclicInheritance {
                type_name: self.key.name(),
                base: base_key.name(),
            });
        }
        let inherited = self
            .session
            .with_descriptor(&base_key, |d| (d.fields.clone(), d.additional_properties))
            .ok_or(SchemaGenerationError::UnknownType {
                type_name: base_key.name(),
            })?;
        let (fields, additional_properties) = inherited;
        for field in fields {
            match self.fields.iter().position(|f| f.name == field.name) {
                Some(i) => self.fields[i] = field,
                None => self.fields.push(field),
            }
        }
        self.additional_properties &= additional_properties;
        self.bases.push(base_key);
        Ok(self)
    }

    /// Declare a field of type `F`.
    pub fn field<F: FieldValue>(&mut self, name: &'static str) -> Result<FieldBuilder<'_, F>, SchemaGenerationError> {
        let signature = self.session.resolve::<F>()?;
        let index = self.declare(FieldDescriptor::new(name, signature))?;
        Ok(FieldBuilder {
            type_name: self.key.name(),
            catalog: self.session.catalog,
            field: &mut self.fields[index],
            _marker: PhantomData,
        })
    }

    /// Declare a field that always holds the single literal `value`. The
    /// writer fills it in automatically.
    pub fn tag(&mut self, name: &'static str, value: impl Into<Value>) -> Result<&mut Self, SchemaGenerationError> {
        self.declare(FieldDescriptor::new(name, TypeSignature::Literal(vec![value.into()])))?;
        Ok(self)
    }

    /// Make this record an abstract base discriminated by `property`.
    pub fn discriminator(&mut self, property: impl Into<String>) -> &mut Self {
        self.discriminator = Some(property.into());
        self
    }

    /// Add `V` as a concrete variant. Its discriminator value is read from
    /// its single-literal field named by the discriminator property.
    pub fn variant<V: Record>(&mut self) -> &mut Self {
        self.deferred.push(Introspection::record::<V>);
        self
    }

    /// Reject properties outside the declared fields.
    pub fn deny_unknown_fields(&mut self) -> &mut Self {
        self.additional_properties = false;
        self
    }

    fn declare(&mut self, descriptor: FieldDescriptor) -> Result<usize, SchemaGenerationError> {
        if !self.own.insert(descriptor.name) {
            return Err(SchemaGenerationError::DuplicateField {
                type_name: self.key.name(),
                field: descriptor.name,
            });
        }
        match self.fields.iter().position(|f| f.name == descriptor.name) {
            Some(i) => {
                self.fields[i] = descriptor;
                Ok(i)
            }
            None => {
                self.fields.push(descriptor);
                Ok(self.fields.len() - 1)
            }
        }
    }

    fn finish(self) -> (TypeDescriptor, Vec<VariantIntrospector<'c>>) {
        let mut fields = self.fields;
        for field in &mut fields {
            field.settle_required();
        }
        let descriptor = TypeDescriptor {
            key: self.key,
            description: self.description,
            fields,
            bases: self.bases,
            discriminator: self.discriminator,
            variants: Vec::new(),
            additional_properties: self.additional_properties,
            encoder_version: self.session.version,
        };
        (descriptor, self.deferred)
    }
}

/// Attaches metadata and constraints to one declared field.
pub struct FieldBuilder<'b, F> {
    type_name: &'static str,
    catalog: &'b Catalog,
    field: &'b mut FieldDescriptor,
    _marker: PhantomData<fn() -> F>,
}

impl<F: FieldValue> FieldBuilder<'_, F> {
    /// Use `wire` as the property name in generic data and schemas.
    pub fn rename(self, wire: &'static str) -> Self {
        self.field.serialized_name = Some(wire);
        self
    }

    pub fn title(self, text: impl Into<String>) -> Self {
        self.field.title = Some(text.into());
        self
    }

    pub fn description(self, text: impl Into<String>) -> Self {
        self.field.description = Some(text.into());
        self
    }

    /// Native default. It is encoded once, here; the field becomes
    /// optional.
    pub fn default(self, value: F) -> Result<Self, SchemaGenerationError> {
        let mut cx = EncodeContext::new(self.catalog, EncodeOptions::default());
        let encoded = cx
            .encode(&value)
            .map_err(|e| SchemaGenerationError::InvalidDefault {
                type_name: self.type_name,
                field: self.field.name,
                reason: e.to_string(),
            })?;
        self.field.default = Some(encoded);
        Ok(self)
    }

    /// Default already in generic form.
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.field.default = Some(value.into());
        self
    }

    /// Add an example value, in generic form.
    pub fn example(self, value: impl Into<Value>) -> Self {
        self.field.examples.push(value.into());
        self
    }

    pub fn read_only(self) -> Self {
        self.field.read_only = true;
        self
    }

    /// Vendor extension emitted as `x-<name>` where the dialect allows it.
    pub fn extension(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field.extensions.push((name.into(), value.into()));
        self
    }

    pub fn minimum(self, bound: f64) -> Self {
        self.field.constraints.minimum = Some(bound);
        self
    }

    pub fn maximum(self, bound: f64) -> Self {
        self.field.constraints.maximum = Some(bound);
        self
    }

    pub fn exclusive_minimum(self, bound: f64) -> Self {
        self.field.constraints.exclusive_minimum = Some(bound);
        self
    }

    pub fn exclusive_maximum(self, bound: f64) -> Self {
        self.field.constraints.exclusive_maximum = Some(bound);
        self
    }

    pub fn multiple_of(self, factor: f64) -> Self {
        self.field.constraints.multiple_of = Some(factor);
        self
    }

    pub fn min_length(self, n: u64) -> Self {
        self.field.constraints.min_length = Some(n);
        self
    }

    pub fn max_length(self, n: u64) -> Self {
        self.field.constraints.max_length = Some(n);
        self
    }

    pub fn min_items(self, n: u64) -> Self {
        self.field.constraints.min_items = Some(n);
        self
    }

    pub fn max_items(self, n: u64) -> Self {
        self.field.constraints.max_items = Some(n);
        self
    }

    /// Regular expression the string value must match.
    pub fn pattern(self, regex: impl Into<String>) -> Self {
        self.field.constraints.pattern = Some(regex.into());
        self
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.field.constraints.format = Some(format.into());
        self
    }
}

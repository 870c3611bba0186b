//! # Field Encoder Registry
//!
//! Maps a scalar type that the generic data model cannot represent
//! natively (timestamps, dates, decimals, UUIDs, addresses, domain
//! newtypes) to a bundle of
//! three capabilities: encode to generic data, decode from generic data,
//! and a dialect-independent schema fragment.
//!
//! ## Versioning
//!
//! Every registration bumps a version counter while the write lock is
//! held. Descriptors and cached schema documents record the version they
//! were built against and are rebuilt when it no longer matches, so no
//! reader keeps using an encoder lookup from before a registration.
//!
//! ## Lookup Precedence
//!
//! The introspector and the codecs consult the registry with the exact
//! `TypeId` of a field type *before* falling back to the type's own
//! structural signature. Containers resolve their inner types the same
//! way, so `Option<Uuid>` and `Vec<Uuid>` pick up the `Uuid` encoder.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::signature::EncoderMarker;

/// Encode, decode and describe values of one scalar type `T`.
pub trait FieldEncoder<T>: Send + Sync + 'static {
    /// Convert a native value to generic data.
    fn to_wire(&self, value: &T) -> Value;

    /// Convert generic data back to a native value.
    ///
    /// Returns a message describing the mismatch on failure; the caller
    /// attaches the field path.
    fn to_native(&self, value: &Value) -> Result<T, String>;

    /// Schema fragment spliced verbatim wherever `T` appears.
    fn json_schema(&self) -> Value;
}

trait ErasedEncoder: Send + Sync {
    fn encode(&self, value: &dyn Any) -> Option<Value>;
    fn decode(&self, value: &Value) -> Result<Box<dyn Any>, String>;
    fn schema(&self) -> Value;
}

struct Typed<T, E> {
    encoder: E,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static, E: FieldEncoder<T>> ErasedEncoder for Typed<T, E> {
    fn encode(&self, value: &dyn Any) -> Option<Value> {
        value.downcast_ref::<T>().map(|v| self.encoder.to_wire(v))
    }

    fn decode(&self, value: &Value) -> Result<Box<dyn Any>, String> {
        self.encoder
            .to_native(value)
            .map(|v| Box::new(v) as Box<dyn Any>)
    }

    fn schema(&self) -> Value {
        self.encoder.json_schema()
    }
}

/// A type-erased encoder together with the marker it is registered under.
#[derive(Clone)]
pub struct EncoderBundle {
    marker: EncoderMarker,
    encoder: Arc<dyn ErasedEncoder>,
}

impl EncoderBundle {
    /// Bundle `encoder` under the marker for `T`.
    pub fn new<T: 'static, E: FieldEncoder<T>>(encoder: E) -> Self {
        Self {
            marker: EncoderMarker::of::<T>(),
            encoder: Arc::new(Typed {
                encoder,
                _marker: PhantomData,
            }),
        }
    }

    /// Marker this bundle handles.
    pub fn marker(&self) -> EncoderMarker {
        self.marker
    }

    /// Schema fragment for the marker type.
    pub fn json_schema(&self) -> Value {
        self.encoder.schema()
    }

    /// Encode a native value. Fails if `T` is not the marker type.
    pub fn encode<T: 'static>(&self, value: &T) -> Result<Value, String> {
        self.encoder.encode(value).ok_or_else(|| {
            format!(
                "encoder for '{}' cannot encode '{}'",
                self.marker.type_name(),
                std::any::type_name::<T>()
            )
        })
    }

    /// Decode generic data into the marker type.
    pub fn decode<T: 'static>(&self, value: &Value) -> Result<T, String> {
        let boxed = self.encoder.decode(value)?;
        boxed.downcast::<T>().map(|b| *b).map_err(|_| {
            format!(
                "encoder for '{}' cannot produce '{}'",
                self.marker.type_name(),
                std::any::type_name::<T>()
            )
        })
    }
}

impl fmt::Debug for EncoderBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderBundle")
            .field("marker", &self.marker.type_name())
            .finish()
    }
}

/// Process-wide mapping from scalar marker to encoder bundle.
pub struct EncoderRegistry {
    encoders: RwLock<HashMap<TypeId, EncoderBundle>>,
    version: AtomicU64,
}

impl EncoderRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            encoders: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }

    /// A registry preloaded with the built-in encoders for
    /// `DateTime<Utc>`, `NaiveDate`, `Decimal`, `Uuid`, `Ipv4Addr` and
    /// `Ipv6Addr`.
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register_all([
            EncoderBundle::new::<DateTime<Utc>, _>(DateTimeEncoder),
            EncoderBundle::new::<NaiveDate, _>(DateEncoder),
            EncoderBundle::new::<Decimal, _>(DecimalEncoder::new()),
            EncoderBundle::new::<Uuid, _>(UuidEncoder),
            EncoderBundle::new::<Ipv4Addr, _>(Ipv4Encoder),
            EncoderBundle::new::<Ipv6Addr, _>(Ipv6Encoder),
        ]);
        registry
    }

    /// Register (or replace) the encoder for `T`.
    pub fn register<T: 'static, E: FieldEncoder<T>>(&self, encoder: E) -> u64 {
        self.register_all([EncoderBundle::new::<T, E>(encoder)])
    }

    /// Register (or replace) several encoders at once.
    ///
    /// Returns the registry version after the registration.
    pub fn register_all(&self, bundles: impl IntoIterator<Item = EncoderBundle>) -> u64 {
        let mut encoders = self.encoders.write();
        for bundle in bundles {
            let replaced = encoders.insert(bundle.marker.id(), bundle.clone()).is_some();
            tracing::info!(
                type_name = bundle.marker.type_name(),
                replaced,
                "registered field encoder"
            );
        }
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// The bundle registered for `id`, if any.
    pub fn get(&self, id: TypeId) -> Option<EncoderBundle> {
        self.encoders.read().get(&id).cloned()
    }

    /// Whether an encoder is registered for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.encoders.read().contains_key(&TypeId::of::<T>())
    }

    /// Current registry version.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Number of registered encoders.
    pub fn len(&self) -> usize {
        self.encoders.read().len()
    }

    /// True if no encoder is registered.
    pub fn is_empty(&self) -> bool {
        self.encoders.read().is_empty()
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoders = self.encoders.read();
        let mut names: Vec<&str> = encoders.values().map(|b| b.marker.type_name()).collect();
        names.sort_unstable();
        f.debug_struct("EncoderRegistry")
            .field("encoders", &names)
            .field("version", &self.version())
            .finish()
    }
}

/// RFC 3339 timestamps, seconds precision, UTC with `Z`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeEncoder;

impl FieldEncoder<DateTime<Utc>> for DateTimeEncoder {
    fn to_wire(&self, value: &DateTime<Utc>) -> Value {
        Value::String(value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    fn to_native(&self, value: &Value) -> Result<DateTime<Utc>, String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected a date-time string, got {value}"))?;
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid date-time '{text}': {e}"))
    }

    fn json_schema(&self) -> Value {
        json!({"type": "string", "format": "date-time"})
    }
}

/// ISO 8601 calendar dates (`2018-06-03`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DateEncoder;

impl FieldEncoder<NaiveDate> for DateEncoder {
    fn to_wire(&self, value: &NaiveDate) -> Value {
        Value::String(value.format("%Y-%m-%d").to_string())
    }

    fn to_native(&self, value: &Value) -> Result<NaiveDate, String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected a date string, got {value}"))?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .or_else(|_| DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive()))
            .map_err(|e| format!("invalid date '{text}': {e}"))
    }

    fn json_schema(&self) -> Value {
        json!({"type": "string", "format": "date"})
    }
}

/// Decimals carried as JSON numbers. With a precision, the schema requires
/// a multiple of `10^-precision`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalEncoder {
    precision: Option<u32>,
}

impl DecimalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict values to `places` decimal places. Zero places leaves the
    /// schema unrestricted.
    pub fn with_precision(places: u32) -> Self {
        Self {
            precision: Some(places),
        }
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }
}

impl FieldEncoder<Decimal> for DecimalEncoder {
    fn to_wire(&self, value: &Decimal) -> Value {
        value
            .to_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }

    fn to_native(&self, value: &Value) -> Result<Decimal, String> {
        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => return Err(format!("expected a decimal number, got {other}")),
        };
        text.parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| format!("invalid decimal '{text}': {e}"))
    }

    fn json_schema(&self) -> Value {
        let mut schema = json!({"type": "number"});
        if let Some(places) = self.precision.filter(|p| *p > 0) {
            let step = Decimal::try_new(1, places).ok().and_then(|d| d.to_f64());
            if let Some(step) = step {
                schema["multipleOf"] = json!(step);
            }
        }
        schema
    }
}

/// Hyphenated lowercase UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidEncoder;

const UUID_PATTERN: &str = "^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

impl FieldEncoder<Uuid> for UuidEncoder {
    fn to_wire(&self, value: &Uuid) -> Value {
        Value::String(value.hyphenated().to_string())
    }

    fn to_native(&self, value: &Value) -> Result<Uuid, String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected a uuid string, got {value}"))?;
        Uuid::parse_str(text).map_err(|e| format!("invalid uuid '{text}': {e}"))
    }

    fn json_schema(&self) -> Value {
        json!({"type": "string", "format": "uuid", "pattern": UUID_PATTERN})
    }
}

/// Dotted-quad IPv4 addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv4Encoder;

impl FieldEncoder<Ipv4Addr> for Ipv4Encoder {
    fn to_wire(&self, value: &Ipv4Addr) -> Value {
        Value::String(value.to_string())
    }

    fn to_native(&self, value: &Value) -> Result<Ipv4Addr, String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected an ipv4 string, got {value}"))?;
        text.parse()
            .map_err(|e| format!("invalid ipv4 address '{text}': {e}"))
    }

    fn json_schema(&self) -> Value {
        json!({"type": "string", "format": "ipv4"})
    }
}

/// RFC 5952 IPv6 addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv6Encoder;

impl FieldEncoder<Ipv6Addr> for Ipv6Encoder {
    fn to_wire(&self, value: &Ipv6Addr) -> Value {
        Value::String(value.to_string())
    }

    fn to_native(&self, value: &Value) -> Result<Ipv6Addr, String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected an ipv6 string, got {value}"))?;
        text.parse()
            .map_err(|e| format!("invalid ipv6 address '{text}': {e}"))
    }

    fn json_schema(&self) -> Value {
        json!({"type": "string", "format": "ipv6"})
    }
}

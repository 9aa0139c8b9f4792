//! Field-by-index reflection.
//!
//! A thin adapter over the typed accessors for generic tooling (dumpers,
//! editors, test harnesses). Packet and record types list their fields in
//! wire order; absent fields read as `None` and setting `None` removes the
//! field where the type allows it.

use crate::packet::{ClassIdentifier, PayloadFormat, StateEventBits, TimeStamp};
use crate::record::{ContextAssocLists, Ephemeris, GeoSentences, Geolocation};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime type of a reflected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    UInt8,
    UInt32,
    UInt64,
    Int64,
    Float64,
    /// Two values sharing one word, upper half first.
    Float64Pair,
    Bytes,
    String,
    TimeStamp,
    ClassIdentifier,
    StateEvents,
    PayloadFormat,
    Geolocation,
    Ephemeris,
    GeoSentences,
    ContextAssocLists,
}

/// Runtime value of a reflected field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    UInt8(u8),
    UInt32(u32),
    UInt64(u64),
    Int64(i64),
    Float64(f64),
    Float64Pair([f64; 2]),
    Bytes(Vec<u8>),
    String(String),
    TimeStamp(TimeStamp),
    ClassIdentifier(ClassIdentifier),
    StateEvents(StateEventBits),
    PayloadFormat(PayloadFormat),
    Geolocation(Geolocation),
    Ephemeris(Box<Ephemeris>),
    GeoSentences(GeoSentences),
    ContextAssocLists(ContextAssocLists),
}

impl Value {
    /// The runtime type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Bool(_) => FieldType::Bool,
            Value::UInt8(_) => FieldType::UInt8,
            Value::UInt32(_) => FieldType::UInt32,
            Value::UInt64(_) => FieldType::UInt64,
            Value::Int64(_) => FieldType::Int64,
            Value::Float64(_) => FieldType::Float64,
            Value::Float64Pair(_) => FieldType::Float64Pair,
            Value::Bytes(_) => FieldType::Bytes,
            Value::String(_) => FieldType::String,
            Value::TimeStamp(_) => FieldType::TimeStamp,
            Value::ClassIdentifier(_) => FieldType::ClassIdentifier,
            Value::StateEvents(_) => FieldType::StateEvents,
            Value::PayloadFormat(_) => FieldType::PayloadFormat,
            Value::Geolocation(_) => FieldType::Geolocation,
            Value::Ephemeris(_) => FieldType::Ephemeris,
            Value::GeoSentences(_) => FieldType::GeoSentences,
            Value::ContextAssocLists(_) => FieldType::ContextAssocLists,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v:#010x}"),
            Value::UInt64(v) => write!(f, "{v:#018x}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Float64Pair([a, b]) => write!(f, "({a}, {b})"),
            Value::Bytes(v) => write!(f, "{} bytes", v.len()),
            Value::String(v) => write!(f, "{v:?}"),
            Value::TimeStamp(v) => write!(f, "{v}"),
            Value::ClassIdentifier(v) => write!(f, "{v}"),
            Value::StateEvents(v) => write!(f, "{v}"),
            Value::PayloadFormat(v) => write!(f, "{v}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Conversion between a typed field value and [`Value`].
pub trait FieldValue: Sized {
    const FIELD_TYPE: FieldType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! field_value {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl FieldValue for $t {
            const FIELD_TYPE: FieldType = FieldType::$variant;
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    )*};
}

field_value!(
    bool => Bool,
    u8 => UInt8,
    u32 => UInt32,
    u64 => UInt64,
    i64 => Int64,
    f64 => Float64,
    [f64; 2] => Float64Pair,
    Vec<u8> => Bytes,
    String => String,
    TimeStamp => TimeStamp,
    ClassIdentifier => ClassIdentifier,
    StateEventBits => StateEvents,
    PayloadFormat => PayloadFormat,
    Geolocation => Geolocation,
    GeoSentences => GeoSentences,
    ContextAssocLists => ContextAssocLists,
);

impl FieldValue for Ephemeris {
    const FIELD_TYPE: FieldType = FieldType::Ephemeris;
    fn into_value(self) -> Value {
        Value::Ephemeris(Box::new(self))
    }
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Ephemeris(v) => Some(*v),
            _ => None,
        }
    }
}

impl<const N: usize> FieldValue for [u8; N] {
    const FIELD_TYPE: FieldType = FieldType::Bytes;
    fn into_value(self) -> Value {
        Value::Bytes(self.to_vec())
    }
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(v) => v.try_into().ok(),
            _ => None,
        }
    }
}

/// Field-by-index introspection.
pub trait HasFields {
    /// Number of reflected fields.
    fn field_count(&self) -> usize;

    /// Name of field `index`.
    fn field_name(&self, index: usize) -> Option<&'static str>;

    /// Type of field `index`.
    fn field_type(&self, index: usize) -> Option<FieldType>;

    /// Value of field `index`; `None` when absent or out of range.
    fn get_field(&self, index: usize) -> Option<Value>;

    /// Set field `index`; `None` removes it where the type allows.
    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()>;

    /// Index of the field called `name`.
    fn field_index(&self, name: &str) -> Option<usize> {
        (0..self.field_count()).find(|&i| self.field_name(i) == Some(name))
    }

    /// Value of the field called `name`.
    fn get_field_by_name(&self, name: &str) -> Option<Value> {
        self.get_field(self.field_index(name)?)
    }

    /// Set the field called `name`.
    fn set_field_by_name(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        let index = self
            .field_index(name)
            .ok_or_else(|| VrtError::invalid_argument("field name", format!("no field called {name:?}")))?;
        self.set_field(index, value)
    }
}

/// Unwrap a reflected value into `T`, reporting a type mismatch for `field`.
pub(crate) fn expect_value<T: FieldValue>(field: &str, value: Option<Value>) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(value) => {
            let found = value.field_type();
            T::from_value(value).map(Some).ok_or_else(|| {
                VrtError::invalid_argument(field, format!("expected {:?}, got {found:?}", T::FIELD_TYPE))
            })
        }
    }
}

/// Out-of-range index error for reflection setters.
pub(crate) fn no_such_field(index: usize, count: usize) -> VrtError {
    VrtError::invalid_argument("field index", format!("{index} is out of range for {count} fields"))
}

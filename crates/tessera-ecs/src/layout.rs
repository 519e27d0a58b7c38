//! Field descriptors and byte layouts for components and resources.
//!
//! A [`Layout`] is the static description of one component, resource, or
//! nested composite: its total byte size and an ordered list of
//! [`FieldDescriptor`]s. Layouts are immutable once built and shared through
//! [`Arc`], so views, records, and the registry all point at the same
//! metadata.
//!
//! Field bytes are packed with no padding and always accessed unaligned, so a
//! layout is fully described by offsets and sizes. Values are stored in native
//! byte order via [`bytemuck`].
//!
//! # Example
//!
//! ```
//! use tessera_ecs::layout::{Layout, ValueType};
//!
//! let inner = Layout::builder("inner")
//!     .field("a", ValueType::F32)
//!     .field("b", ValueType::I32)
//!     .build();
//! let outer = Layout::builder("outer")
//!     .field("a", ValueType::F64)
//!     .field("inner", ValueType::Composite(inner))
//!     .build();
//!
//! assert_eq!(outer.size(), 16);
//! let (offset, field) = outer.resolve("inner.b").unwrap();
//! assert_eq!(offset, 12);
//! assert_eq!(field.value_type(), &ValueType::I32);
//! ```

use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::EcsError;

// ---------------------------------------------------------------------------
// ValueType
// ---------------------------------------------------------------------------

/// The type of a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    /// Three packed `f64`s.
    DVec3,
    /// A nested layout embedded by value.
    Composite(Arc<Layout>),
}

impl ValueType {
    /// Size of one value of this type in bytes.
    pub fn size(&self) -> usize {
        match self {
            ValueType::Bool => 1,
            ValueType::I32 | ValueType::U32 | ValueType::F32 => 4,
            ValueType::I64 | ValueType::U64 | ValueType::F64 => 8,
            ValueType::DVec3 => 24,
            ValueType::Composite(layout) => layout.size(),
        }
    }

    /// Whether this is a nested layout rather than a scalar.
    pub fn is_composite(&self) -> bool {
        matches!(self, ValueType::Composite(_))
    }

    /// Short human-readable type name used in error messages.
    pub fn name(&self) -> &str {
        match self {
            ValueType::Bool => "bool",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::U32 => "u32",
            ValueType::U64 => "u64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::DVec3 => "dvec3",
            ValueType::Composite(layout) => layout.name(),
        }
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A scalar or fixed-arity vector value, passed by copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    DVec3(DVec3),
}

impl Value {
    /// Short type name of this value, matching [`ValueType::name`].
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::DVec3(_) => "dvec3",
        }
    }

    /// Numeric value widened to `f64`. `None` for bools and vectors.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::I32(v) => Some(v as f64),
            Value::I64(v) => Some(v as f64),
            Value::U32(v) => Some(v as f64),
            Value::U64(v) => Some(v as f64),
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            Value::Bool(_) | Value::DVec3(_) => None,
        }
    }

    /// Integer value widened to `i128`. `None` for non-integers.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::I32(v) => Some(v as i128),
            Value::I64(v) => Some(v as i128),
            Value::U32(v) => Some(v as i128),
            Value::U64(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_dvec3(&self) -> Option<DVec3> {
        match *self {
            Value::DVec3(v) => Some(v),
            _ => None,
        }
    }

    /// Convert this value to one storable in a field of type `ty`.
    ///
    /// Any number converts to a float field. Integers convert to an integer
    /// field when they fit. Bools and vectors only match their own type.
    /// Returns `None` when no conversion applies.
    pub fn coerce(self, ty: &ValueType) -> Option<Value> {
        match ty {
            ValueType::Bool => self.as_bool().map(Value::Bool),
            ValueType::F32 => self.as_f64().map(|v| Value::F32(v as f32)),
            ValueType::F64 => self.as_f64().map(Value::F64),
            ValueType::I32 => self
                .as_i128()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::I32),
            ValueType::I64 => self
                .as_i128()
                .and_then(|v| i64::try_from(v).ok())
                .map(Value::I64),
            ValueType::U32 => self
                .as_i128()
                .and_then(|v| u32::try_from(v).ok())
                .map(Value::U32),
            ValueType::U64 => self
                .as_i128()
                .and_then(|v| u64::try_from(v).ok())
                .map(Value::U64),
            ValueType::DVec3 => self.as_dvec3().map(Value::DVec3),
            ValueType::Composite(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::DVec3(v) => write!(f, "[{}, {}, {}]", v.x, v.y, v.z),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    DVec3 => DVec3,
}

// ---------------------------------------------------------------------------
// Byte codec
// ---------------------------------------------------------------------------

/// Encode `value` into `dst`, which must be exactly the value's size.
///
/// The caller has already coerced `value` to the field's type.
pub(crate) fn encode(value: Value, dst: &mut [u8]) {
    match value {
        Value::Bool(v) => dst.copy_from_slice(&[v as u8]),
        Value::I32(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
        Value::I64(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
        Value::U32(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
        Value::U64(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
        Value::F32(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
        Value::F64(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
        Value::DVec3(v) => dst.copy_from_slice(bytemuck::bytes_of(&v.to_array())),
    }
}

/// Decode a scalar of type `ty` from `src`. `None` for composites.
pub(crate) fn decode(ty: &ValueType, src: &[u8]) -> Option<Value> {
    let value = match ty {
        ValueType::Bool => Value::Bool(src[0] != 0),
        ValueType::I32 => Value::I32(bytemuck::pod_read_unaligned(src)),
        ValueType::I64 => Value::I64(bytemuck::pod_read_unaligned(src)),
        ValueType::U32 => Value::U32(bytemuck::pod_read_unaligned(src)),
        ValueType::U64 => Value::U64(bytemuck::pod_read_unaligned(src)),
        ValueType::F32 => Value::F32(bytemuck::pod_read_unaligned(src)),
        ValueType::F64 => Value::F64(bytemuck::pod_read_unaligned(src)),
        ValueType::DVec3 => {
            Value::DVec3(DVec3::from_array(bytemuck::pod_read_unaligned::<[f64; 3]>(src)))
        }
        ValueType::Composite(_) => return None,
    };
    Some(value)
}

/// Read the scalar `field` located at `offset` within `bytes`.
pub(crate) fn read_field(
    bytes: &[u8],
    offset: usize,
    field: &FieldDescriptor,
) -> Result<Value, EcsError> {
    let src = &bytes[offset..offset + field.size()];
    decode(field.value_type(), src).ok_or_else(|| EcsError::NotScalar {
        field: field.name().to_owned(),
    })
}

/// Coerce `value` to the type of `field` and store it at `offset`.
pub(crate) fn write_field(
    bytes: &mut [u8],
    offset: usize,
    field: &FieldDescriptor,
    value: Value,
) -> Result<(), EcsError> {
    if field.value_type().is_composite() {
        return Err(EcsError::NotScalar {
            field: field.name().to_owned(),
        });
    }
    let coerced = value
        .coerce(field.value_type())
        .ok_or_else(|| EcsError::TypeMismatch {
            field: field.name().to_owned(),
            expected: field.value_type().name().to_owned(),
            found: value.type_name(),
        })?;
    encode(coerced, &mut bytes[offset..offset + field.size()]);
    Ok(())
}

// ---------------------------------------------------------------------------
// FieldDescriptor
// ---------------------------------------------------------------------------

/// Offset, size, and type of one field inside a [`Layout`].
///
/// Hidden fields keep their bytes in the store and stay reachable through
/// [`World`](crate::world::World) field access and [`Record`]s, but views
/// refuse to resolve paths through them.
///
/// [`Record`]: crate::record::Record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    offset: usize,
    value_type: ValueType,
    hidden: bool,
}

impl FieldDescriptor {
    pub fn new(name: &str, offset: usize, value_type: ValueType) -> Self {
        Self {
            name: name.to_owned(),
            offset,
            value_type,
            hidden: false,
        }
    }

    /// Mark this field as hidden from views.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset from the start of the owning layout.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size in bytes, derived from the value type.
    pub fn size(&self) -> usize {
        self.value_type.size()
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// The nested layout if this field is a composite.
    pub fn composite(&self) -> Option<&Arc<Layout>> {
        match &self.value_type {
            ValueType::Composite(layout) => Some(layout),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Byte layout of a component, resource, or nested composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    name: String,
    size: usize,
    fields: Vec<FieldDescriptor>,
}

impl Layout {
    /// Start building a packed layout.
    pub fn builder(name: &str) -> LayoutBuilder {
        LayoutBuilder {
            name: name.to_owned(),
            size: 0,
            fields: Vec::new(),
        }
    }

    /// Build a layout from explicit descriptors.
    ///
    /// # Panics
    ///
    /// Panics if any field extends past `size` or if two fields share a
    /// name. Both are schema defects, not runtime conditions.
    pub fn from_fields(name: &str, size: usize, fields: Vec<FieldDescriptor>) -> Arc<Self> {
        for (i, field) in fields.iter().enumerate() {
            assert!(
                field.offset + field.size() <= size,
                "field '{}' of layout '{name}' spans {}..{} but the layout is {size} bytes",
                field.name,
                field.offset,
                field.offset + field.size()
            );
            assert!(
                !fields[..i].iter().any(|f| f.name == field.name),
                "duplicate field name '{}' in layout '{name}'",
                field.name
            );
        }
        Arc::new(Self {
            name: name.to_owned(),
            size,
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a direct field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve a dotted path (`"inner.a"`) to its absolute offset within this
    /// layout and its descriptor.
    ///
    /// Fails with [`EcsError::UnknownField`] if a segment does not exist and
    /// [`EcsError::NotComposite`] if a non-final segment is a scalar.
    pub fn resolve(&self, path: &str) -> Result<(usize, &FieldDescriptor), EcsError> {
        self.resolve_path(path, false)
    }

    /// Like [`resolve`](Self::resolve), but fails with
    /// [`EcsError::HiddenField`] if any segment of `path` is hidden.
    pub fn resolve_visible(&self, path: &str) -> Result<(usize, &FieldDescriptor), EcsError> {
        self.resolve_path(path, true)
    }

    fn resolve_path(
        &self,
        path: &str,
        visible_only: bool,
    ) -> Result<(usize, &FieldDescriptor), EcsError> {
        let mut layout = self;
        let mut base = 0;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let field = layout.field(segment).ok_or_else(|| EcsError::UnknownField {
                layout: layout.name.clone(),
                field: segment.to_owned(),
            })?;
            if visible_only && field.hidden {
                return Err(EcsError::HiddenField {
                    layout: layout.name.clone(),
                    field: segment.to_owned(),
                });
            }
            if segments.peek().is_none() {
                return Ok((base + field.offset, field));
            }
            match &field.value_type {
                ValueType::Composite(inner) => {
                    base += field.offset;
                    layout = &**inner;
                }
                _ => {
                    return Err(EcsError::NotComposite {
                        field: segment.to_owned(),
                    })
                }
            }
        }
        // `split` always yields at least one segment.
        Err(EcsError::UnknownField {
            layout: self.name.clone(),
            field: path.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// LayoutBuilder
// ---------------------------------------------------------------------------

/// Appends fields back to back with no padding.
#[derive(Debug)]
pub struct LayoutBuilder {
    name: String,
    size: usize,
    fields: Vec<FieldDescriptor>,
}

impl LayoutBuilder {
    /// Append a field at the current end of the layout.
    pub fn field(mut self, name: &str, value_type: ValueType) -> Self {
        let offset = self.size;
        self.size += value_type.size();
        self.fields.push(FieldDescriptor::new(name, offset, value_type));
        self
    }

    /// Append a field that views cannot reach.
    pub fn hidden_field(mut self, name: &str, value_type: ValueType) -> Self {
        let offset = self.size;
        self.size += value_type.size();
        self.fields
            .push(FieldDescriptor::new(name, offset, value_type).hidden());
        self
    }

    /// Reserve `bytes` of unnamed padding.
    pub fn padding(mut self, bytes: usize) -> Self {
        self.size += bytes;
        self
    }

    pub fn build(self) -> Arc<Layout> {
        Layout::from_fields(&self.name, self.size, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner() -> Arc<Layout> {
        Layout::builder("inner")
            .field("a", ValueType::F32)
            .field("b", ValueType::I32)
            .build()
    }

    fn outer() -> Arc<Layout> {
        Layout::builder("outer")
            .field("a", ValueType::F64)
            .field("inner", ValueType::Composite(inner()))
            .field("vec", ValueType::DVec3)
            .build()
    }

    #[test]
    fn hidden_fields_resolve_only_without_visibility_check() {
        let layout = Layout::builder("secretive")
            .field("a", ValueType::F64)
            .hidden_field("inner", ValueType::Composite(inner()))
            .build();
        assert_eq!(layout.size(), 16);
        assert!(layout.field("inner").unwrap().is_hidden());

        let (offset, field) = layout.resolve("inner.b").unwrap();
        assert_eq!((offset, field.name()), (12, "b"));
        assert!(matches!(
            layout.resolve_visible("inner.b"),
            Err(EcsError::HiddenField { ref field, .. }) if field == "inner"
        ));
        assert!(layout.resolve_visible("a").is_ok());
    }

    #[test]
    fn builder_packs_fields() {
        let layout = outer();
        assert_eq!(layout.size(), 8 + 8 + 24);
        let offsets: Vec<usize> = layout.fields().iter().map(|f| f.offset()).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
    }

    #[test]
    fn padding_shifts_following_fields() {
        let layout = Layout::builder("padded")
            .field("flag", ValueType::Bool)
            .padding(3)
            .field("n", ValueType::U32)
            .build();
        assert_eq!(layout.field("n").unwrap().offset(), 4);
        assert_eq!(layout.size(), 8);
    }

    #[test]
    fn resolve_nested_path() {
        let layout = outer();
        let (offset, field) = layout.resolve("inner.a").unwrap();
        assert_eq!(offset, 8);
        assert_eq!(field.value_type(), &ValueType::F32);
        let (offset, _) = layout.resolve("vec").unwrap();
        assert_eq!(offset, 16);
    }

    #[test]
    fn resolve_unknown_segment() {
        let err = outer().resolve("inner.zzz").unwrap_err();
        match err {
            EcsError::UnknownField { layout, field } => {
                assert_eq!(layout, "inner");
                assert_eq!(field, "zzz");
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn resolve_through_scalar_is_not_composite() {
        let err = outer().resolve("a.b").unwrap_err();
        assert!(matches!(err, EcsError::NotComposite { .. }));
    }

    #[test]
    #[should_panic(expected = "spans")]
    fn out_of_bounds_descriptor_panics() {
        Layout::from_fields(
            "broken",
            4,
            vec![FieldDescriptor::new("x", 2, ValueType::F32)],
        );
    }

    #[test]
    #[should_panic(expected = "duplicate field name")]
    fn duplicate_field_panics() {
        Layout::builder("dup")
            .field("x", ValueType::F32)
            .field("x", ValueType::F32)
            .build();
    }

    #[test]
    fn codec_preserves_each_type() {
        let cases = [
            (ValueType::Bool, Value::Bool(true)),
            (ValueType::I32, Value::I32(-7)),
            (ValueType::I64, Value::I64(i64::MIN)),
            (ValueType::U32, Value::U32(u32::MAX)),
            (ValueType::U64, Value::U64(42)),
            (ValueType::F32, Value::F32(1.5)),
            (ValueType::F64, Value::F64(-0.25)),
            (ValueType::DVec3, Value::DVec3(DVec3::new(1.0, 2.0, 3.0))),
        ];
        for (ty, value) in cases {
            let mut buf = vec![0u8; ty.size()];
            encode(value, &mut buf);
            assert_eq!(decode(&ty, &buf), Some(value), "type {}", ty.name());
        }
    }

    #[test]
    fn decode_composite_is_none() {
        let ty = ValueType::Composite(inner());
        assert_eq!(decode(&ty, &[0u8; 8]), None);
    }

    #[test]
    fn coerce_numbers() {
        assert_eq!(Value::I32(1).coerce(&ValueType::F64), Some(Value::F64(1.0)));
        assert_eq!(Value::F64(2.5).coerce(&ValueType::F32), Some(Value::F32(2.5)));
        assert_eq!(Value::U64(9).coerce(&ValueType::I32), Some(Value::I32(9)));
        assert_eq!(Value::I32(-1).coerce(&ValueType::U32), None);
        assert_eq!(Value::F64(1.0).coerce(&ValueType::I32), None);
        assert_eq!(Value::Bool(true).coerce(&ValueType::F64), None);
        assert_eq!(Value::F64(1.0).coerce(&ValueType::DVec3), None);
        assert_eq!(Value::F64(1.0).coerce(&ValueType::Composite(inner())), None);
    }

    #[test]
    fn value_serializes_with_serde() {
        let json = serde_json::to_string(&Value::F64(1.0)).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::F64(1.0));
    }
}

//! Owned, detached component and resource values.
//!
//! A [`Record`] is a byte buffer paired with the [`Layout`] that describes
//! it. Records seed components and resources before they enter the store,
//! and [`View::to_record`](crate::view::View::to_record) produces one as a
//! detached copy of live memory. Writes to a record never reach the store.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::layout::{self, Layout, Value};
use crate::EcsError;

/// Owned bytes for one [`Layout`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    layout: Arc<Layout>,
    bytes: Vec<u8>,
}

impl Record {
    /// A record with every byte set to zero.
    pub fn zeroed(layout: &Arc<Layout>) -> Self {
        Self {
            layout: Arc::clone(layout),
            bytes: vec![0; layout.size()],
        }
    }

    pub(crate) fn from_bytes(layout: Arc<Layout>, bytes: Vec<u8>) -> Self {
        assert_eq!(
            bytes.len(),
            layout.size(),
            "record bytes do not match layout '{}'",
            layout.name()
        );
        Self { layout, bytes }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Result<Self, EcsError> {
        self.set(path, value)?;
        Ok(self)
    }

    /// Builder-style [`set_record`](Self::set_record).
    pub fn with_record(mut self, path: &str, record: Record) -> Result<Self, EcsError> {
        self.set_record(path, record)?;
        Ok(self)
    }

    /// Read the scalar at `path`.
    pub fn get(&self, path: &str) -> Result<Value, EcsError> {
        let (offset, field) = self.layout.resolve(path)?;
        layout::read_field(&self.bytes, offset, field)
    }

    /// Store `value` at the scalar field `path`, coercing to the field type.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), EcsError> {
        let (offset, field) = self.layout.resolve(path)?;
        layout::write_field(&mut self.bytes, offset, field, value.into())
    }

    /// Copy out the nested composite at `path`.
    pub fn get_record(&self, path: &str) -> Result<Record, EcsError> {
        let (offset, field) = self.layout.resolve(path)?;
        let inner = field.composite().ok_or_else(|| EcsError::NotComposite {
            field: field.name().to_owned(),
        })?;
        let bytes = self.bytes[offset..offset + field.size()].to_vec();
        Ok(Record::from_bytes(Arc::clone(inner), bytes))
    }

    /// Overwrite the nested composite at `path` with `record`.
    pub fn set_record(&mut self, path: &str, record: Record) -> Result<(), EcsError> {
        let (offset, field) = self.layout.resolve(path)?;
        let inner = field.composite().ok_or_else(|| EcsError::NotComposite {
            field: field.name().to_owned(),
        })?;
        if **inner != *record.layout {
            return Err(EcsError::LayoutMismatch {
                expected: inner.name().to_owned(),
                found: record.layout.name().to_owned(),
            });
        }
        self.bytes[offset..offset + field.size()].copy_from_slice(&record.bytes);
        Ok(())
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Serializes as a map of field name to value, nesting composites.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.layout.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for field in fields {
            let bytes = &self.bytes[field.offset()..field.offset() + field.size()];
            match field.composite() {
                Some(inner) => {
                    let nested = Record::from_bytes(Arc::clone(inner), bytes.to_vec());
                    map.serialize_entry(field.name(), &nested)?;
                }
                None => {
                    if let Some(value) = layout::decode(field.value_type(), bytes) {
                        map.serialize_entry(field.name(), &value)?;
                    }
                }
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ValueType;
    use glam::DVec3;

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
    fn zeroed_reads_zero() {
        let record = Record::zeroed(&outer());
        assert_eq!(record.get("a").unwrap(), Value::F64(0.0));
        assert_eq!(record.get("inner.b").unwrap(), Value::I32(0));
        assert_eq!(record.as_bytes().len(), outer().size());
    }

    #[test]
    fn builder_sets_nested_fields() {
        let inner_rec = Record::zeroed(&inner()).with("b", 1).unwrap();
        let record = Record::zeroed(&outer())
            .with("a", 3.0)
            .unwrap()
            .with_record("inner", inner_rec)
            .unwrap()
            .with("vec", DVec3::splat(100.0))
            .unwrap();
        assert_eq!(record.get("a").unwrap(), Value::F64(3.0));
        assert_eq!(record.get("inner.b").unwrap(), Value::I32(1));
        assert_eq!(record.get("vec").unwrap(), Value::DVec3(DVec3::splat(100.0)));
        assert_eq!(record.get_record("inner").unwrap().get("b").unwrap(), Value::I32(1));
    }

    #[test]
    fn set_coerces_integer_into_float_field() {
        let mut record = Record::zeroed(&outer());
        record.set("a", 2).unwrap();
        assert_eq!(record.get("a").unwrap(), Value::F64(2.0));
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut record = Record::zeroed(&outer());
        let err = record.set("vec", 1.0).unwrap_err();
        assert!(matches!(err, EcsError::TypeMismatch { .. }));
    }

    #[test]
    fn scalar_access_on_composite_fails() {
        let record = Record::zeroed(&outer());
        assert!(matches!(
            record.get("inner").unwrap_err(),
            EcsError::NotScalar { .. }
        ));
        assert!(matches!(
            record.get_record("a").unwrap_err(),
            EcsError::NotComposite { .. }
        ));
    }

    #[test]
    fn set_record_checks_layout() {
        let mut record = Record::zeroed(&outer());
        let err = record.set_record("inner", Record::zeroed(&outer())).unwrap_err();
        assert!(matches!(err, EcsError::LayoutMismatch { .. }));
    }

    #[test]
    fn serializes_as_nested_map() {
        let record = Record::zeroed(&outer()).with("inner.b", 5).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["a"], serde_json::json!({"F64": 0.0}));
        assert_eq!(json["inner"]["b"], serde_json::json!({"I32": 5}));
        assert!(json["vec"].get("DVec3").is_some());
    }
}

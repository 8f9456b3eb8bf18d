// sbdl-core/src/domain/envelope/cdc.rs
//
// Payload building blocks. A closed set of shapes, serialized explicitly so
// that field order is the insertion order and never depends on a map's hashing:
//
//   ChangeTriplet  {operation, newValue}              (every leaf, oldValue never set)
//   FieldValue     text | struct | list               (what newValue carries)
//   PayloadNode    triplet | array of nested objects  (what a payload key holds)

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::domain::error::DomainError;

/// Golden-copy snapshots only ever insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Ordered named fields.
    Struct(Vec<(&'static str, FieldValue)>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn field_names(&self) -> Option<Vec<&'static str>> {
        match self {
            Self::Struct(fields) => Some(fields.iter().map(|(name, _)| *name).collect()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Struct(_) => "struct",
            Self::List(_) => "list",
        }
    }

    /// Every list must be homogeneous: same variant, and for structs the same
    /// field names in the same order.
    pub fn check_shape(&self, field: &str) -> Result<(), DomainError> {
        match self {
            Self::Text(_) => Ok(()),
            Self::Struct(fields) => {
                for (name, value) in fields {
                    value.check_shape(&format!("{}.{}", field, name))?;
                }
                Ok(())
            }
            Self::List(items) => {
                let Some(first) = items.first() else {
                    return Ok(());
                };
                let expected_names = first.field_names();
                for (i, item) in items.iter().enumerate() {
                    if item.kind() != first.kind() {
                        return Err(DomainError::InconsistentShape {
                            field: field.to_string(),
                            detail: format!(
                                "element {} is a {} but element 0 is a {}",
                                i,
                                item.kind(),
                                first.kind()
                            ),
                        });
                    }
                    if item.field_names() != expected_names {
                        return Err(DomainError::InconsistentShape {
                            field: field.to_string(),
                            detail: format!(
                                "element {} has fields {:?}, expected {:?}",
                                i,
                                item.field_names().unwrap_or_default(),
                                expected_names.clone().unwrap_or_default()
                            ),
                        });
                    }
                    item.check_shape(&format!("{}[{}]", field, i))?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(value) => serializer.serialize_str(value),
            Self::Struct(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeTriplet {
    operation: Operation,
    new_value: FieldValue,
}

impl ChangeTriplet {
    /// `INSERT` with no prior value. `field` only names the path in errors.
    pub fn insert(field: &str, new_value: FieldValue) -> Result<Self, DomainError> {
        new_value.check_shape(field)?;
        Ok(Self {
            operation: Operation::Insert,
            new_value,
        })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn new_value(&self) -> &FieldValue {
        &self.new_value
    }
}

impl Serialize for ChangeTriplet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // oldValue : absente, jamais null
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("operation", &self.operation)?;
        map.serialize_entry("newValue", &self.new_value)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadNode {
    Change(ChangeTriplet),
    /// Array of structs whose sub-fields each carry their own triplet.
    Records(Vec<PayloadObject>),
}

impl Serialize for PayloadNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Change(triplet) => triplet.serialize(serializer),
            Self::Records(records) => {
                let mut seq = serializer.serialize_seq(Some(records.len()))?;
                for record in records {
                    seq.serialize_element(record)?;
                }
                seq.end()
            }
        }
    }
}

/// Ordered object of payload nodes: the payload root and each nested record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PayloadObject {
    fields: Vec<(&'static str, PayloadNode)>,
}

impl PayloadObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_change(
        &mut self,
        name: &'static str,
        value: FieldValue,
    ) -> Result<&mut Self, DomainError> {
        let triplet = ChangeTriplet::insert(name, value)?;
        self.fields.push((name, PayloadNode::Change(triplet)));
        Ok(self)
    }

    pub fn insert_text(
        &mut self,
        name: &'static str,
        value: impl Into<String>,
    ) -> Result<&mut Self, DomainError> {
        self.insert_change(name, FieldValue::text(value))
    }

    /// Optional business field: no value, no key.
    pub fn insert_optional(
        &mut self,
        name: &'static str,
        value: Option<FieldValue>,
    ) -> Result<&mut Self, DomainError> {
        match value {
            Some(v) => self.insert_change(name, v),
            None => Ok(self),
        }
    }

    pub fn insert_records(&mut self, name: &'static str, records: Vec<PayloadObject>) -> &mut Self {
        self.fields.push((name, PayloadNode::Records(records)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&PayloadNode> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, node)| node)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }
}

impl Serialize for PayloadObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, node) in &self.fields {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

//! Minimal stand-ins for the document object model, which is an external
//! collaborator out of scope for this crate. These types model just enough
//! of the boundary — an identifier, an opaque field map, and a patch — for
//! the store's put/get/update/iterate semantics to be fully testable
//! without pulling in a real document engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque document identifier, e.g. `id:ns:type::a`.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scalar field value. Kept intentionally small — this crate only needs to
/// round-trip values through projections and patches, not interpret them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Bool(bool),
}

/// A document: an id plus an opaque, ordered field map. `size()` reports the
/// serialized byte size used for quota/accounting purposes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: DocumentId) -> Self {
        Document {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Serialized byte size, approximated as the id plus each field's name
    /// and value, since this crate carries no real wire codec.
    pub fn size(&self) -> u32 {
        let mut size = self.id.as_str().len();
        for (name, value) in &self.fields {
            size += name.len();
            size += match value {
                FieldValue::String(s) => s.len(),
                FieldValue::Int(_) => 8,
                FieldValue::Bool(_) => 1,
            };
        }
        size as u32
    }

    /// Returns a copy containing only the named fields.
    pub fn project(&self, field_set: &FieldSet) -> Document {
        match field_set {
            FieldSet::All => self.clone(),
            FieldSet::Fields(names) => {
                let fields = self
                    .fields
                    .iter()
                    .filter(|(name, _)| names.contains(*name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                Document {
                    id: self.id.clone(),
                    fields,
                }
            },
        }
    }
}

/// Which fields a `get`/`iterate` projection should keep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldSet {
    All,
    Fields(std::collections::BTreeSet<String>),
}

impl FieldSet {
    pub fn is_all(&self) -> bool {
        matches!(self, FieldSet::All)
    }
}

/// A patch plus the "create if nonexistent" flag, applied by
/// [`crate::provider::Provider::update`].
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentUpdate {
    pub id: DocumentId,
    pub create_if_nonexistent: bool,
    pub field_updates: BTreeMap<String, FieldValue>,
}

impl DocumentUpdate {
    pub fn new(id: DocumentId) -> Self {
        DocumentUpdate {
            id,
            create_if_nonexistent: false,
            field_updates: BTreeMap::new(),
        }
    }

    pub fn create_if_nonexistent(mut self, yes: bool) -> Self {
        self.create_if_nonexistent = yes;
        self
    }

    pub fn set_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.field_updates.insert(name.into(), value);
        self
    }

    /// Applies this update's field patch onto `doc` in place.
    pub fn apply_to(&self, doc: &mut Document) {
        for (name, value) in &self.field_updates {
            doc.fields.insert(name.clone(), value.clone());
        }
    }
}

use crate::value::{ReadFields, Value, ValueMap};

/// A stored document: its id, collection and body.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub collection: String,
    pub data: ValueMap,
}

impl Document {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, data: ValueMap) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            data,
        }
    }
}

impl ReadFields for Document {
    fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Result set of a query, or of a single-document listen (0 or 1 entries).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySnapshot {
    pub documents: Vec<Document>,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn first(&self) -> Option<&Document> {
        self.documents.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

//! Descriptor for the schema object the service requires in the backend

use serde::{Deserialize, Serialize};

/// Name of the collection that holds indexed legal documents
pub const JUSTICE_COLLECTION: &str = "justice";

/// Embedding model the backend uses to vectorize the collection's content
pub const JUSTICE_VECTORIZER_MODEL: &str =
    "sentence-transformers/paraphrase-multilingual-mpnet-base-v2";

/// Immutable description of a collection and its vectorizer.
///
/// The values must match the collection already deployed in the backend, so
/// they are fixed rather than read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    name: String,
    vectorizer_model: String,
}

impl CollectionDescriptor {
    pub fn new(name: impl Into<String>, vectorizer_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vectorizer_model: vectorizer_model.into(),
        }
    }

    /// The `justice` collection vectorized with the multilingual mpnet model
    pub fn justice() -> Self {
        Self::new(JUSTICE_COLLECTION, JUSTICE_VECTORIZER_MODEL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vectorizer_model(&self) -> &str {
        &self.vectorizer_model
    }

    /// Whether a collection name reported by the backend refers to this
    /// collection. Backends may normalise the first letter, so the
    /// comparison ignores ASCII case.
    pub fn matches(&self, reported_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(reported_name)
    }
}

impl Default for CollectionDescriptor {
    fn default() -> Self {
        Self::justice()
    }
}

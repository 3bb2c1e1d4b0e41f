//! Wire types for the Weaviate `/v1/schema` endpoints

use legalrag_core::CollectionDescriptor;
use serde::{Deserialize, Serialize};

/// Vectorizer module that embeds text with a Hugging Face model
pub(crate) const HUGGINGFACE_VECTORIZER: &str = "text2vec-huggingface";

/// Response of `GET /v1/schema`
#[derive(Debug, Deserialize)]
pub(crate) struct SchemaResponse {
    #[serde(default)]
    pub(crate) classes: Option<Vec<ClassSummary>>,
}

/// The part of a class definition we read back
#[derive(Debug, Deserialize)]
pub(crate) struct ClassSummary {
    pub(crate) class: String,
}

/// Body of `POST /v1/schema`
#[derive(Debug, Serialize)]
pub(crate) struct CreateClassRequest<'a> {
    class: &'a str,
    vectorizer: &'static str,
    #[serde(rename = "moduleConfig")]
    module_config: ModuleConfig<'a>,
}

#[derive(Debug, Serialize)]
struct ModuleConfig<'a> {
    #[serde(rename = "text2vec-huggingface")]
    huggingface: HuggingFaceModule<'a>,
}

#[derive(Debug, Serialize)]
struct HuggingFaceModule<'a> {
    model: &'a str,
}

impl<'a> From<&'a CollectionDescriptor> for CreateClassRequest<'a> {
    fn from(descriptor: &'a CollectionDescriptor) -> Self {
        Self {
            class: descriptor.name(),
            vectorizer: HUGGINGFACE_VECTORIZER,
            module_config: ModuleConfig {
                huggingface: HuggingFaceModule {
                    model: descriptor.vectorizer_model(),
                },
            },
        }
    }
}

/// Error payload Weaviate returns for rejected schema writes
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub(crate) error: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessage {
    pub(crate) message: String,
}

impl ErrorResponse {
    pub(crate) fn mentions_existing_class(&self) -> bool {
        self.error
            .iter()
            .any(|e| e.message.to_ascii_lowercase().contains("already exists"))
    }
}

use serde::{Deserialize, Serialize};

/// Raw form values. Nothing is validated or coerced except the product name
/// check done by the session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub capacity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benefit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

/// Proposal copy returned by the generation endpoint. Consumed read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPayload {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub catch_copy: String,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    #[serde(default)]
    pub product_specs: Vec<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub product_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagesRequest {
    pub product_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub product_name: String,
    pub price: String,
    pub capacity: String,
    pub image_url: String,
    pub context: String,
}

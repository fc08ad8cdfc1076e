use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub guid: String,
    pub guid_permalink: Option<String>,
    pub link: String,
    pub description: String,
    pub pub_date: String,
    pub categories: Vec<String>,
    pub creator: String,
}

/// Raw upstream response handed to the pipeline, one per configured source URL.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedDocument {
    /// MIME part of the declared content type, without parameters.
    pub fn mime_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .map(|value| value.split(';').next().unwrap_or(value).trim())
            .filter(|value| !value.is_empty())
    }
}

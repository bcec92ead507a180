//! Read-only course topic catalog
//!
//! The catalog is loaded once at startup and shared behind an `Arc`; nothing
//! mutates it afterwards. Related material is a single typed [`Resource`]
//! shape, so consumers never have to guess which fields an entry carries.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const EMBEDDED_CATALOG: &str = include_str!("../catalog/default.toml");
const SEARCH_URL: &str = "https://www.google.com/search";

/// Kind of a related learning resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Book,
    Course,
    Tutorial,
    Article,
    Video,
    General,
}

/// A link to material outside the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub kind: ResourceKind,
    pub url: String,
}

/// A concept covered by a topic, optionally linked to a reference page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConcept {
    pub concept: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Multiple-choice question attached to a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// One course topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub slug: String,
    pub title: String,
    pub duration: String,
    pub difficulty: String,
    pub summary: String,
    #[serde(default)]
    pub notes: String,
    /// Starter program shown in the editor and sent to `/compile`
    pub code: String,
    #[serde(default)]
    pub key_concepts: Vec<KeyConcept>,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Listing entry for `GET /topics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub slug: String,
    pub title: String,
    pub duration: String,
    pub difficulty: String,
}

impl Topic {
    pub fn summary_entry(&self) -> TopicSummary {
        TopicSummary {
            slug: self.slug.clone(),
            title: self.title.clone(),
            duration: self.duration.clone(),
            difficulty: self.difficulty.clone(),
        }
    }

    /// Curated resources, or a single generated search link when none exist
    pub fn related_resources(&self) -> Vec<Resource> {
        if !self.resources.is_empty() {
            return self.resources.clone();
        }

        let query = format!("C programming {}", self.title);
        let url = url::Url::parse_with_params(SEARCH_URL, &[("q", query.as_str())])
            .map(String::from)
            .unwrap_or_else(|_| SEARCH_URL.to_string());

        vec![Resource {
            title: format!("{} Resources", self.title),
            kind: ResourceKind::General,
            url,
        }]
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "topic")]
    topics: Vec<Topic>,
}

/// Immutable, ordered set of topics
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    topics: Vec<Topic>,
}

impl Catalog {
    /// Catalog compiled into the binary
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_toml(EMBEDDED_CATALOG)
    }

    /// Load a catalog file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Use `path` when given, otherwise the embedded catalog
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::embedded(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;

        let mut seen = HashSet::new();
        for topic in &file.topics {
            if !seen.insert(topic.slug.as_str()) {
                return Err(CatalogError::DuplicateSlug(topic.slug.clone()));
            }
        }

        Ok(Self {
            topics: file.topics,
        })
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn summaries(&self) -> Vec<TopicSummary> {
        self.topics.iter().map(Topic::summary_entry).collect()
    }

    pub fn get(&self, slug: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.slug == slug)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

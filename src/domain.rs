use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GoldError;

static SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.@+-]+(?: [\w.@+-]+)*$").expect("segment pattern is valid")
});

/// Path of a gold bundle inside the remote annotation repository,
/// e.g. `batch-01` or `newshour-transcript-sync/golds/batch-01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = GoldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_matches('/');
        if normalized.is_empty() {
            return Err(GoldError::InvalidDatasetId(value.to_string()));
        }
        let is_valid = normalized
            .split('/')
            .all(|segment| segment != "." && segment != ".." && SEGMENT_RE.is_match(segment));
        if !is_valid {
            return Err(GoldError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Files of one dataset as fetched from the remote, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    pub files: Vec<BundleFile>,
}

impl Bundle {
    pub fn new(files: Vec<BundleFile>) -> Self {
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Checks the bundle can be materialized as a flat directory.
    pub fn validate(&self, id: &DatasetId) -> Result<(), GoldError> {
        if self.files.is_empty() {
            return Err(GoldError::NotFound(id.to_string()));
        }
        let mut seen = HashSet::new();
        for file in &self.files {
            let name = file.name.as_str();
            if name.is_empty()
                || name == "."
                || name == ".."
                || name.contains('/')
                || name.contains('\\')
            {
                return Err(GoldError::InvalidBundle(format!(
                    "{id}: unusable file name {name:?}"
                )));
            }
            if !seen.insert(name) {
                return Err(GoldError::InvalidBundle(format!(
                    "{id}: duplicate file name {name:?}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalAction {
    Cache,
    Download,
}

impl RetrievalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalAction::Cache => "cache",
            RetrievalAction::Download => "download",
        }
    }
}

//! Data model shared between the acquisition engine and its callers

use crate::error::{OaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Declared `type` of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Http,
    Ftp,
    Esri,
}

impl SourceType {
    /// Download strategy used for this type. `http` and `ftp` are both plain
    /// pull-by-URL transfers.
    pub fn task_kind(self) -> TaskKind {
        match self {
            SourceType::Http | SourceType::Ftp => TaskKind::Generic,
            SourceType::Esri => TaskKind::EsriRest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Http => "http",
            SourceType::Ftp => "ftp",
            SourceType::Esri => "esri",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = OaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(SourceType::Http),
            "ftp" => Ok(SourceType::Ftp),
            "esri" => Ok(SourceType::Esri),
            _ => Err(OaError::UnknownSourceType(s.to_string())),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of download strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Generic,
    EsriRest,
}

/// What a previous run recorded about a source's cached artifact.
///
/// Persisted by the orchestrator between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// `file://` reference into a local store, or a published `http://` URL
    pub cache: Url,

    /// Hex md5 of the artifact bytes
    pub fingerprint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CacheRecord {
    pub fn new(cache: Url, fingerprint: impl Into<String>, version: Option<String>) -> Self {
        Self {
            cache,
            fingerprint: fingerprint.into(),
            version,
        }
    }
}

/// Immutable input to one acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub source_type: SourceType,

    /// Source URLs in declared order. Entries that are not absolute URLs are
    /// treated as local paths.
    pub urls: Vec<String>,

    /// Name used to derive stable download filenames, usually the source
    /// file's stem
    pub source_prefix: Option<String>,

    pub version: Option<String>,

    pub prior: Option<CacheRecord>,
}

impl SourceDescriptor {
    pub fn new(source_type: SourceType, urls: Vec<String>) -> Self {
        Self {
            source_type,
            urls,
            source_prefix: None,
            version: None,
            prior: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = Some(prefix.into());
        self
    }

    pub fn with_prior(mut self, prior: Option<CacheRecord>) -> Self {
        self.prior = prior;
        self
    }

    /// Build a descriptor from a source JSON object.
    ///
    /// Reads `type`, `data` (a URL or a list of URLs), optional `version`, and
    /// a prior `cache` + `fingerprint` pair when both are present. Other keys,
    /// such as `conform`, belong to later stages and are ignored.
    pub fn from_json(value: &Value, source_prefix: Option<&str>) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| OaError::InvalidSource("source must be a JSON object".to_string()))?;

        let source_type: SourceType = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| OaError::InvalidSource("missing string field 'type'".to_string()))?
            .parse()?;

        let urls = match object.get("data") {
            Some(Value::String(url)) => vec![url.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        OaError::InvalidSource("'data' list entries must be strings".to_string())
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(OaError::InvalidSource(
                    "'data' must be a string or a list of strings".to_string(),
                ))
            },
            None => return Err(OaError::InvalidSource("missing field 'data'".to_string())),
        };

        let version = object.get("version").and_then(scalar_string);

        let prior = match (
            object.get("cache").and_then(Value::as_str),
            object.get("fingerprint").and_then(Value::as_str),
        ) {
            (Some(cache), Some(fingerprint)) => {
                let cache = Url::parse(cache).map_err(|e| {
                    OaError::InvalidSource(format!("invalid prior cache '{}': {}", cache, e))
                })?;
                Some(CacheRecord::new(cache, fingerprint, version.clone()))
            },
            _ => None,
        };

        Ok(Self {
            source_type,
            urls,
            source_prefix: source_prefix.map(str::to_string),
            version,
            prior,
        })
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

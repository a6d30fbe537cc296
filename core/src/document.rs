use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

/// Wire value of the noise cluster
pub const NOISE_CLUSTER: i64 = -1;

/// Cluster membership of a document.
///
/// Stored as a plain integer: `-1` is [`ClusterId::Noise`], any non-negative value is a real
/// cluster. A missing or `null` value means the document hasn't been assigned yet and is
/// represented as `Option::<ClusterId>::None` on [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClusterId {
    /// Deliberately unclustered, cannot be classified
    Noise,
    /// A cluster discovered by the upstream clustering run
    Cluster(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid cluster id {0}, expected -1 or a non-negative integer")]
pub struct InvalidClusterId(pub i64);

impl ClusterId {
    pub fn as_i64(self) -> i64 {
        match self {
            ClusterId::Noise => NOISE_CLUSTER,
            ClusterId::Cluster(id) => i64::from(id),
        }
    }

    pub fn is_noise(self) -> bool {
        matches!(self, ClusterId::Noise)
    }

    /// The real cluster id, `None` for noise
    pub fn cluster(self) -> Option<u32> {
        match self {
            ClusterId::Noise => None,
            ClusterId::Cluster(id) => Some(id),
        }
    }
}

impl TryFrom<i64> for ClusterId {
    type Error = InvalidClusterId;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            NOISE_CLUSTER => Ok(ClusterId::Noise),
            v if v >= 0 => u32::try_from(v)
                .map(ClusterId::Cluster)
                .map_err(|_| InvalidClusterId(v)),
            v => Err(InvalidClusterId(v)),
        }
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

impl Serialize for ClusterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for ClusterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = integral(deserializer, "cluster id")?;
        ClusterId::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// An integer that may arrive as an integral float.
///
/// Dataframe exports write integer columns with nulls as floats (`3.0`).
fn integral<'de, D: Deserializer<'de>>(deserializer: D, what: &str) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(v),
        Raw::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        Raw::Float(f) => Err(serde::de::Error::custom(format!(
            "{what} must be an integer, got {f}"
        ))),
    }
}

fn optional_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    #[derive(Deserialize)]
    struct Year(#[serde(deserialize_with = "year")] i32);

    fn year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        let value = integral(deserializer, "year")?;
        i32::try_from(value).map_err(|_| serde::de::Error::custom(format!("year {value} is out of range")))
    }

    Ok(Option::<Year>::deserialize(deserializer)?.map(|Year(y)| y))
}

/// A bibliographic record in the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key, unique across the collection
    pub document_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
    #[serde(default, deserialize_with = "optional_year")]
    pub year: Option<i32>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub document_summary: Option<String>,
    #[serde(default)]
    pub drive_url: Option<String>,
    #[serde(default)]
    pub macro_category: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<ClusterId>,
    #[serde(default)]
    pub document_embedding: Option<Vec<f64>>,
    /// Populated once the document's analysis has been completed
    #[serde(default, rename = "q01_research_question")]
    pub research_question: Option<String>,
    /// Set on first insertion and never changed afterwards
    pub indexed_at: DateTime<Utc>,
    /// Columns this crate doesn't interpret, carried through rewrites untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(document_id: impl Into<String>, title: impl Into<String>, indexed_at: DateTime<Utc>) -> Self {
        Self {
            document_id: document_id.into(),
            title: title.into(),
            authors: vec![],
            year: None,
            abstract_text: None,
            document_summary: None,
            drive_url: None,
            macro_category: None,
            cluster_id: None,
            document_embedding: None,
            research_question: None,
            indexed_at,
            extra: BTreeMap::new(),
        }
    }

    /// The embedding, if present and non-empty
    pub fn usable_embedding(&self) -> Option<&[f64]> {
        self.document_embedding
            .as_deref()
            .filter(|embedding| !embedding.is_empty())
    }

    pub fn has_category(&self) -> bool {
        is_present(self.macro_category.as_deref())
    }
}

/// Cluster metadata row, used for label lookup only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: u32,
    pub label: String,
}

/// `true` for a string that is non-empty after trimming
pub(crate) fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

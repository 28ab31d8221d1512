//! SigMF collections: a `.sigmf-collection` document naming related recordings together with
//! the SHA-512 of each recording's metadata text.

use crate::hash::{is_sha512_hex, sha512_hex};
use crate::metadata::{MetadataError, Recording, SIGMF_VERSION, keys};
use crate::validate::{VERSION_RE, ValidationReport};
use serde_json::{Map, Value, json};
use thiserror::Error;

pub const STREAMS: &str = "core:streams";

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Collection document has no collection object")]
    MissingCollection,
    #[error("Missing required field {0} in collection object")]
    MissingRequiredField(&'static str),
    #[error("Stream name must not be empty")]
    EmptyName,
    #[error("Stream hash {0:?} is not a SHA-512 hex digest")]
    InvalidHash(String),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Invalid collection JSON")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRef {
    pub name: String,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    pub fields: Map<String, Value>,
}

impl Default for Collection {
    fn default() -> Self {
        Collection::new()
    }
}

impl Collection {
    pub fn new() -> Self {
        let mut fields = Map::new();
        fields.insert(keys::VERSION.to_string(), Value::from(SIGMF_VERSION));
        fields.insert(STREAMS.to_string(), Value::Array(Vec::new()));
        Collection { fields }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.fields
            .insert(keys::DESCRIPTION.to_string(), Value::from(description.into()));
        self
    }

    /// References `recording` under `name`, hashing its pretty printed metadata, which is
    /// the text stored in `.sigmf-meta` files.
    pub fn add_recording(
        &mut self,
        name: &str,
        recording: &Recording,
    ) -> Result<StreamRef, CollectionError> {
        let hash = sha512_hex(recording.to_json(true)?.as_bytes());
        self.add_stream(name, &hash)
    }

    pub fn add_stream(&mut self, name: &str, hash: &str) -> Result<StreamRef, CollectionError> {
        if name.is_empty() {
            return Err(CollectionError::EmptyName);
        }
        if !is_sha512_hex(hash) {
            return Err(CollectionError::InvalidHash(hash.to_string()));
        }

        let stream = json!({ "name": name, "hash": hash.to_lowercase() });
        match self.fields.get_mut(STREAMS) {
            Some(Value::Array(streams)) => streams.push(stream),
            _ => {
                self.fields
                    .insert(STREAMS.to_string(), Value::Array(vec![stream]));
            }
        }
        Ok(StreamRef {
            name: name.to_string(),
            hash: hash.to_lowercase(),
        })
    }

    /// Well formed stream references, in document order.
    pub fn streams(&self) -> Vec<StreamRef> {
        let Some(Value::Array(streams)) = self.fields.get(STREAMS) else {
            return Vec::new();
        };
        streams
            .iter()
            .filter_map(|s| {
                Some(StreamRef {
                    name: s.get("name")?.as_str()?.to_string(),
                    hash: s.get("hash")?.as_str()?.to_string(),
                })
            })
            .collect()
    }

    /// True if `name` is referenced with the digest of `metadata_text`.
    pub fn verify_stream(&self, name: &str, metadata_text: &str) -> bool {
        let digest = sha512_hex(metadata_text.as_bytes());
        self.streams()
            .iter()
            .any(|s| s.name == name && s.hash.eq_ignore_ascii_case(&digest))
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let version_path = format!("collection.{}", keys::VERSION);
        match self.fields.get(keys::VERSION) {
            None => report.push(version_path, "is required", None),
            Some(v) if !v.as_str().is_some_and(|s| VERSION_RE.is_match(s)) => {
                report.push(version_path, "must be a MAJOR.MINOR.PATCH version", Some(v))
            }
            Some(_) => {}
        }

        let streams_path = format!("collection.{STREAMS}");
        match self.fields.get(STREAMS) {
            None => {}
            Some(Value::Array(streams)) => {
                for (i, stream) in streams.iter().enumerate() {
                    let base = format!("{streams_path}[{i}]");
                    let name = stream.get("name");
                    if !name.and_then(Value::as_str).is_some_and(|n| !n.is_empty()) {
                        report.push(format!("{base}.name"), "must be a non-empty string", name);
                    }
                    let hash = stream.get("hash");
                    if !hash.and_then(Value::as_str).is_some_and(is_sha512_hex) {
                        report.push(
                            format!("{base}.hash"),
                            "must be 128 hexadecimal characters",
                            hash,
                        );
                    }
                }
            }
            Some(other) => report.push(streams_path, "must be an array", Some(other)),
        }
        report
    }

    pub fn from_json(text: &str) -> Result<Self, CollectionError> {
        let mut doc: Value = serde_json::from_str(text)?;
        let fields = match doc.get_mut("collection").map(Value::take) {
            Some(Value::Object(fields)) => fields,
            _ => return Err(CollectionError::MissingCollection),
        };
        if !fields.contains_key(keys::VERSION) {
            return Err(CollectionError::MissingRequiredField(keys::VERSION));
        }
        Ok(Collection { fields })
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, CollectionError> {
        let doc = json!({ "collection": self.fields });
        Ok(if pretty {
            serde_json::to_string_pretty(&doc)?
        } else {
            serde_json::to_string(&doc)?
        })
    }
}

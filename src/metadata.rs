//! The SigMF metadata document: a `global` object, and sorted `captures` and `annotations`.
//!
//! Every entity is kept as an ordered JSON map so that extension fields (`ns:field`) and key
//! order survive a parse, edit, serialize cycle untouched. Core fields are reached through the
//! typed accessors below.

use crate::datatype::{Datatype, DatatypeError};
use crate::hash::sha512_hex;
use log::warn;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// SigMF specification version written into new recordings.
pub const SIGMF_VERSION: &str = "1.2.0";

/// Keys of the `core` namespace used by this crate.
pub mod keys {
    pub const DATATYPE: &str = "core:datatype";
    pub const VERSION: &str = "core:version";
    pub const SAMPLE_RATE: &str = "core:sample_rate";
    pub const NUM_CHANNELS: &str = "core:num_channels";
    pub const OFFSET: &str = "core:offset";
    pub const SHA512: &str = "core:sha512";
    pub const GEOLOCATION: &str = "core:geolocation";
    pub const DESCRIPTION: &str = "core:description";
    pub const AUTHOR: &str = "core:author";
    pub const LICENSE: &str = "core:license";
    pub const HW: &str = "core:hw";
    pub const RECORDER: &str = "core:recorder";
    pub const DATASET: &str = "core:dataset";
    pub const TRAILING_BYTES: &str = "core:trailing_bytes";
    pub const EXTENSIONS: &str = "core:extensions";

    pub const SAMPLE_START: &str = "core:sample_start";
    pub const DATETIME: &str = "core:datetime";
    pub const FREQUENCY: &str = "core:frequency";
    pub const GLOBAL_INDEX: &str = "core:global_index";
    pub const HEADER_BYTES: &str = "core:header_bytes";

    pub const SAMPLE_COUNT: &str = "core:sample_count";
    pub const FREQ_LOWER_EDGE: &str = "core:freq_lower_edge";
    pub const FREQ_UPPER_EDGE: &str = "core:freq_upper_edge";
    pub const LABEL: &str = "core:label";
    pub const COMMENT: &str = "core:comment";
    pub const GENERATOR: &str = "core:generator";
    pub const UUID: &str = "core:uuid";
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata document was not a JSON object")]
    NotAnObject,
    #[error("Metadata document has no global object")]
    MissingGlobal,
    #[error("Missing required field {0} in global object")]
    MissingRequiredField(&'static str),
    #[error("Field {0} was present, but was of unexpected type")]
    WrongTypeField(&'static str),
    #[error(transparent)]
    Datatype(#[from] DatatypeError),
    #[error("Invalid metadata JSON")]
    Json(#[from] serde_json::Error),
}

/// Field names without a namespace belong to `core`.
fn normalize_key(key: &str) -> String {
    if key.contains(':') {
        key.to_string()
    } else {
        format!("core:{key}")
    }
}

fn normalize(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(k, v)| (normalize_key(&k), v))
        .collect()
}

/// Non-negative integer view of a JSON number, accepting integral floats such as `100.0`.
pub(crate) fn as_index(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// A GeoJSON `Point`, as used by `core:geolocation`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: Option<f64>,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        GeoPoint {
            longitude,
            latitude,
            altitude: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn to_value(&self) -> Value {
        let coordinates = match self.altitude {
            Some(alt) => json!([self.longitude, self.latitude, alt]),
            None => json!([self.longitude, self.latitude]),
        };
        json!({ "type": "Point", "coordinates": coordinates })
    }

    /// Reads back a point from GeoJSON. Shape errors are left to validation.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get("type")?.as_str()? != "Point" {
            return None;
        }
        let coords = value.get("coordinates")?.as_array()?;
        let altitude = match coords.get(2) {
            Some(v) => Some(v.as_f64()?),
            None => None,
        };
        Some(GeoPoint {
            longitude: coords.first()?.as_f64()?,
            latitude: coords.get(1)?.as_f64()?,
            altitude,
        })
    }
}

/// Accessors shared by captures and annotations, both open maps keyed by `sample_start`.
macro_rules! segment_fields {
    ($name:ident) => {
        impl $name {
            pub fn new(sample_start: u64) -> Self {
                let mut fields = Map::new();
                fields.insert(keys::SAMPLE_START.to_string(), Value::from(sample_start));
                $name { fields }
            }

            /// Wraps an existing map. Keys without a namespace are moved into `core`.
            pub fn from_fields(fields: Map<String, Value>) -> Self {
                $name {
                    fields: normalize(fields),
                }
            }

            pub fn sample_start(&self) -> Option<u64> {
                self.fields.get(keys::SAMPLE_START).and_then(as_index)
            }

            pub fn field(&self, key: &str) -> Option<&Value> {
                self.fields.get(key)
            }

            pub fn set(&mut self, key: &str, value: impl Into<Value>) {
                self.fields.insert(normalize_key(key), value.into());
            }

            pub fn remove(&mut self, key: &str) -> Option<Value> {
                self.fields.remove(&normalize_key(key))
            }

            pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
                self.set(key, value);
                self
            }

            pub fn to_value(&self) -> Value {
                Value::Object(self.fields.clone())
            }

            fn sort_key(&self) -> u64 {
                self.sample_start().unwrap_or(0)
            }
        }
    };
}

/// A run of samples sharing capture properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Capture {
    pub fields: Map<String, Value>,
}

segment_fields!(Capture);

impl Capture {
    pub fn frequency(&self) -> Option<f64> {
        self.fields.get(keys::FREQUENCY).and_then(Value::as_f64)
    }

    pub fn datetime(&self) -> Option<&str> {
        self.fields.get(keys::DATETIME).and_then(Value::as_str)
    }

    pub fn global_index(&self) -> Option<u64> {
        self.fields.get(keys::GLOBAL_INDEX).and_then(as_index)
    }

    /// Bytes of per-segment header in a non-conforming dataset.
    pub fn header_bytes(&self) -> Option<u64> {
        self.fields.get(keys::HEADER_BYTES).and_then(as_index)
    }

    pub fn geolocation(&self) -> Option<GeoPoint> {
        self.fields.get(keys::GEOLOCATION).and_then(GeoPoint::from_value)
    }

    pub fn with_frequency(self, hz: f64) -> Self {
        self.with_field(keys::FREQUENCY, hz)
    }

    pub fn with_datetime(self, datetime: impl Into<String>) -> Self {
        self.with_field(keys::DATETIME, datetime.into())
    }

    pub fn with_global_index(self, index: u64) -> Self {
        self.with_field(keys::GLOBAL_INDEX, index)
    }

    pub fn with_header_bytes(self, bytes: u64) -> Self {
        self.with_field(keys::HEADER_BYTES, bytes)
    }

    pub fn with_geolocation(self, point: GeoPoint) -> Self {
        self.with_field(keys::GEOLOCATION, point.to_value())
    }
}

/// A labelled region of the sample stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotation {
    pub fields: Map<String, Value>,
}

segment_fields!(Annotation);

impl Annotation {
    pub fn sample_count(&self) -> Option<u64> {
        self.fields.get(keys::SAMPLE_COUNT).and_then(as_index)
    }

    /// Lower and upper frequency edges, each `None` if absent or not a number.
    pub fn freq_edges(&self) -> (Option<f64>, Option<f64>) {
        (
            self.fields.get(keys::FREQ_LOWER_EDGE).and_then(Value::as_f64),
            self.fields.get(keys::FREQ_UPPER_EDGE).and_then(Value::as_f64),
        )
    }

    pub fn label(&self) -> Option<&str> {
        self.fields.get(keys::LABEL).and_then(Value::as_str)
    }

    pub fn comment(&self) -> Option<&str> {
        self.fields.get(keys::COMMENT).and_then(Value::as_str)
    }

    pub fn generator(&self) -> Option<&str> {
        self.fields.get(keys::GENERATOR).and_then(Value::as_str)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.fields.get(keys::UUID).and_then(Value::as_str)
    }

    pub fn with_sample_count(self, count: u64) -> Self {
        self.with_field(keys::SAMPLE_COUNT, count)
    }

    pub fn with_freq_edges(self, lower: f64, upper: f64) -> Self {
        self.with_field(keys::FREQ_LOWER_EDGE, lower)
            .with_field(keys::FREQ_UPPER_EDGE, upper)
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.with_field(keys::LABEL, label.into())
    }

    pub fn with_comment(self, comment: impl Into<String>) -> Self {
        self.with_field(keys::COMMENT, comment.into())
    }

    pub fn with_generator(self, generator: impl Into<String>) -> Self {
        self.with_field(keys::GENERATOR, generator.into())
    }

    pub fn with_uuid(self, uuid: impl Into<String>) -> Self {
        self.with_field(keys::UUID, uuid.into())
    }
}

/// Global fields for a new recording. Only the fields set here end up in the document,
/// except `core:version` which falls back to [`SIGMF_VERSION`].
#[derive(Clone, Debug, Default)]
pub struct RecordingOptions {
    pub datatype: Option<String>,
    pub version: Option<String>,
    pub sample_rate: Option<f64>,
    pub num_channels: Option<u64>,
    pub offset: Option<u64>,
    pub sha512: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub hw: Option<String>,
    pub recorder: Option<String>,
    /// File name of a non-conforming dataset.
    pub dataset: Option<String>,
    pub trailing_bytes: Option<u64>,
    pub geolocation: Option<GeoPoint>,
    /// Extra global fields, usually `ns:field` extension keys.
    pub extra: Map<String, Value>,
}

impl RecordingOptions {
    pub fn with_datatype(datatype: impl Into<String>) -> Self {
        RecordingOptions {
            datatype: Some(datatype.into()),
            ..Default::default()
        }
    }
}

/// A SigMF recording's metadata.
///
/// `add_capture` and `add_annotation` keep their sequences sorted by `core:sample_start`.
/// The fields are public, so direct edits (or a loaded document) may break that order;
/// [`Recording::validate`] reports it rather than fixing it.
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    pub global: Map<String, Value>,
    pub captures: Vec<Capture>,
    pub annotations: Vec<Annotation>,
}

impl Default for Recording {
    fn default() -> Self {
        Recording::new()
    }
}

impl Recording {
    /// An empty recording with only `core:version` set.
    pub fn new() -> Self {
        let mut global = Map::new();
        global.insert(keys::VERSION.to_string(), Value::from(SIGMF_VERSION));
        Recording {
            global,
            captures: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_options(options: RecordingOptions) -> Result<Self, MetadataError> {
        let mut rec = Recording {
            global: Map::new(),
            captures: Vec::new(),
            annotations: Vec::new(),
        };

        if let Some(datatype) = &options.datatype {
            rec.set_datatype(datatype)?;
        }
        let version = options.version.unwrap_or_else(|| SIGMF_VERSION.to_string());
        rec.global.insert(keys::VERSION.to_string(), Value::from(version));

        let optional: [(&str, Option<Value>); 12] = [
            (keys::SAMPLE_RATE, options.sample_rate.map(Value::from)),
            (keys::NUM_CHANNELS, options.num_channels.map(Value::from)),
            (keys::OFFSET, options.offset.map(Value::from)),
            (keys::SHA512, options.sha512.map(Value::from)),
            (keys::DESCRIPTION, options.description.map(Value::from)),
            (keys::AUTHOR, options.author.map(Value::from)),
            (keys::LICENSE, options.license.map(Value::from)),
            (keys::HW, options.hw.map(Value::from)),
            (keys::RECORDER, options.recorder.map(Value::from)),
            (keys::DATASET, options.dataset.map(Value::from)),
            (keys::TRAILING_BYTES, options.trailing_bytes.map(Value::from)),
            (keys::GEOLOCATION, options.geolocation.map(|g| g.to_value())),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                rec.global.insert(key.to_string(), value);
            }
        }
        for (key, value) in options.extra {
            rec.set_global(&key, value)?;
        }
        Ok(rec)
    }

    pub fn from_json(text: &str) -> Result<Self, MetadataError> {
        Recording::from_value(serde_json::from_str(text)?)
    }

    /// Builds a recording from a parsed document. Only the global object with `core:datatype`
    /// and `core:version` is required, anything else is left for validation to judge.
    pub fn from_value(document: Value) -> Result<Self, MetadataError> {
        let Value::Object(mut document) = document else {
            return Err(MetadataError::NotAnObject);
        };

        let global = match document.remove("global") {
            Some(Value::Object(global)) => global,
            _ => return Err(MetadataError::MissingGlobal),
        };

        let datatype = global
            .get(keys::DATATYPE)
            .ok_or(MetadataError::MissingRequiredField(keys::DATATYPE))?
            .as_str()
            .ok_or(MetadataError::WrongTypeField(keys::DATATYPE))?;
        Datatype::parse(datatype)?;

        if !global.contains_key(keys::VERSION) {
            return Err(MetadataError::MissingRequiredField(keys::VERSION));
        }

        Ok(Recording {
            global,
            captures: entries(document.remove("captures"), "captures")
                .map(Capture::from_fields)
                .collect(),
            annotations: entries(document.remove("annotations"), "annotations")
                .map(Annotation::from_fields)
                .collect(),
        })
    }

    pub fn datatype(&self) -> Option<&str> {
        self.global.get(keys::DATATYPE).and_then(Value::as_str)
    }

    pub fn parsed_datatype(&self) -> Option<Datatype> {
        self.datatype().and_then(|dt| Datatype::parse(dt).ok())
    }

    /// Sets `core:datatype`, refusing tokens outside the datatype grammar.
    pub fn set_datatype(&mut self, datatype: &str) -> Result<Datatype, MetadataError> {
        let parsed = Datatype::parse(datatype)?;
        self.global
            .insert(keys::DATATYPE.to_string(), Value::from(datatype));
        Ok(parsed)
    }

    pub fn version(&self) -> Option<&str> {
        self.global.get(keys::VERSION).and_then(Value::as_str)
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.global.get(keys::SAMPLE_RATE).and_then(Value::as_f64)
    }

    pub fn global_field(&self, key: &str) -> Option<&Value> {
        self.global.get(key)
    }

    /// Sets a global field. A `core:datatype` value must be a valid datatype token.
    pub fn set_global(&mut self, key: &str, value: impl Into<Value>) -> Result<(), MetadataError> {
        let key = normalize_key(key);
        let value = value.into();
        if key == keys::DATATYPE {
            let token = value
                .as_str()
                .ok_or(MetadataError::WrongTypeField(keys::DATATYPE))?;
            Datatype::parse(token)?;
        }
        self.global.insert(key, value);
        Ok(())
    }

    pub fn add_capture(&mut self, capture: Capture) {
        self.captures.push(Capture::from_fields(capture.fields));
        self.captures.sort_by_key(Capture::sort_key);
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations
            .push(Annotation::from_fields(annotation.fields));
        self.annotations.sort_by_key(Annotation::sort_key);
    }

    /// Whole samples held by `data_len` bytes of sample data, if the datatype is known.
    pub fn sample_count(&self, data_len: u64) -> Option<u64> {
        self.parsed_datatype()
            .map(|dt| data_len / dt.bytes_per_sample() as u64)
    }

    /// Hashes `data` and stores the digest as `core:sha512`.
    pub fn compute_sha512(&mut self, data: &[u8]) -> String {
        let digest = sha512_hex(data);
        self.global
            .insert(keys::SHA512.to_string(), Value::from(digest.clone()));
        digest
    }

    /// An independent snapshot of the document.
    pub fn to_metadata(&self) -> Value {
        json!({
            "global": self.global,
            "captures": self.captures.iter().map(Capture::to_value).collect::<Vec<_>>(),
            "annotations": self.annotations.iter().map(Annotation::to_value).collect::<Vec<_>>(),
        })
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, MetadataError> {
        let doc = self.to_metadata();
        Ok(if pretty {
            serde_json::to_string_pretty(&doc)?
        } else {
            serde_json::to_string(&doc)?
        })
    }
}

/// Object entries of an optional array. Anything else counts as empty.
fn entries(value: Option<Value>, what: &'static str) -> impl Iterator<Item = Map<String, Value>> {
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("Ignoring {what} that is not an array");
            Vec::new()
        }
        None => Vec::new(),
    };
    items.into_iter().filter_map(move |item| match item {
        Value::Object(map) => Some(map),
        other => {
            warn!("Ignoring {what} entry that is not an object: {other}");
            None
        }
    })
}

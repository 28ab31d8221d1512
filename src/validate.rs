//! Conformance checks for a [`Recording`]. Findings are data, never errors: every rule runs,
//! and its findings are collected in document order.

use crate::datatype::Datatype;
use crate::extensions::ExtensionRegistry;
use crate::hash::is_sha512_hex;
use crate::metadata::{Annotation, Capture, Recording, keys};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

pub const MAX_SAMPLE_RATE: f64 = 1e12;
pub const MAX_FREQUENCY: f64 = 1e12;

pub(crate) static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+").expect("version pattern"));
static DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z$").expect("datetime pattern")
});
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid pattern")
});

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    /// Location of the offending field, e.g. `captures[2].core:sample_start`.
    pub path: String,
    pub message: String,
    pub value: Option<Value>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        value: Option<&Value>,
    ) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            value: value.cloned(),
        });
    }

    /// Issues reported at `path` or below it.
    pub fn at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.errors.iter().filter(move |e| {
            e.path == path
                || e.path.starts_with(&format!("{path}."))
                || e.path.starts_with(&format!("{path}["))
        })
    }
}

/// Numeric value without a fractional part.
fn as_integer(value: &Value) -> Option<f64> {
    value.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0)
}

fn field_path(base: &str, key: &str) -> String {
    format!("{base}.{key}")
}

/// Checks a GeoJSON `Point` with `[longitude, latitude, altitude?]` coordinates.
pub fn check_geo_point(path: &str, value: &Value, report: &mut ValidationReport) {
    let Some(obj) = value.as_object() else {
        report.push(path, "must be a GeoJSON object", Some(value));
        return;
    };

    let kind = obj.get("type");
    if kind.and_then(Value::as_str) != Some("Point") {
        report.push(field_path(path, "type"), "must be \"Point\"", kind);
    }

    let coords = obj.get("coordinates");
    let Some(items) = coords
        .and_then(Value::as_array)
        .filter(|c| c.len() == 2 || c.len() == 3)
    else {
        report.push(
            field_path(path, "coordinates"),
            "must be an array of 2 or 3 numbers",
            coords,
        );
        return;
    };

    let ranges = [("longitude", 180.0), ("latitude", 90.0)];
    for (i, (name, limit)) in ranges.into_iter().enumerate() {
        let item = &items[i];
        let item_path = format!("{path}.coordinates[{i}]");
        match item.as_f64() {
            None => report.push(item_path, format!("{name} must be a number"), Some(item)),
            Some(v) if !(-limit..=limit).contains(&v) => report.push(
                item_path,
                format!("{name} must be within [-{limit}, {limit}]"),
                Some(item),
            ),
            Some(_) => {}
        }
    }

    if let Some(alt) = items.get(2) {
        if !alt.is_number() {
            report.push(
                format!("{path}.coordinates[2]"),
                "altitude must be a number",
                Some(alt),
            );
        }
    }
}

fn check_global(global: &Map<String, Value>, report: &mut ValidationReport) {
    let path = |key: &str| field_path("global", key);

    match global.get(keys::DATATYPE) {
        None => report.push(path(keys::DATATYPE), "is required", None),
        Some(v) => match v.as_str() {
            Some(token) if Datatype::parse(token).is_ok() => {}
            _ => report.push(
                path(keys::DATATYPE),
                "must be a datatype such as cf32_le, ri16_be or cu8",
                Some(v),
            ),
        },
    }

    match global.get(keys::VERSION) {
        None => report.push(path(keys::VERSION), "is required", None),
        Some(v) => {
            if !v.as_str().is_some_and(|s| VERSION_RE.is_match(s)) {
                report.push(path(keys::VERSION), "must be a MAJOR.MINOR.PATCH version", Some(v));
            }
        }
    }

    if let Some(v) = global.get(keys::SAMPLE_RATE) {
        match v.as_f64() {
            None => report.push(path(keys::SAMPLE_RATE), "must be a number", Some(v)),
            Some(rate) if rate <= 0.0 => {
                report.push(path(keys::SAMPLE_RATE), "must be greater than 0", Some(v))
            }
            Some(rate) if rate > MAX_SAMPLE_RATE => {
                report.push(path(keys::SAMPLE_RATE), "must be at most 1e12", Some(v))
            }
            Some(_) => {}
        }
    }

    if let Some(v) = global.get(keys::NUM_CHANNELS) {
        match as_integer(v) {
            None => report.push(path(keys::NUM_CHANNELS), "must be an integer", Some(v)),
            Some(n) if n < 1.0 => {
                report.push(path(keys::NUM_CHANNELS), "must be at least 1", Some(v))
            }
            Some(_) => {}
        }
    }

    if let Some(v) = global.get(keys::OFFSET) {
        match as_integer(v) {
            None => report.push(path(keys::OFFSET), "must be an integer", Some(v)),
            Some(n) if n < 0.0 => report.push(path(keys::OFFSET), "must be >= 0", Some(v)),
            Some(_) => {}
        }
    }

    if let Some(v) = global.get(keys::SHA512) {
        if !v.as_str().is_some_and(is_sha512_hex) {
            report.push(
                path(keys::SHA512),
                "must be 128 hexadecimal characters",
                Some(v),
            );
        }
    }

    if let Some(v) = global.get(keys::GEOLOCATION) {
        check_geo_point(&path(keys::GEOLOCATION), v, report);
    }
}

/// Checks `core:sample_start` of one capture or annotation against the previous entry.
/// Returns the start to compare the next entry with.
fn check_sample_start(
    base: &str,
    fields: &Map<String, Value>,
    previous: Option<f64>,
    report: &mut ValidationReport,
) -> Option<f64> {
    let path = field_path(base, keys::SAMPLE_START);
    let Some(v) = fields.get(keys::SAMPLE_START) else {
        report.push(path, "is required", None);
        return previous;
    };

    match as_integer(v) {
        None => {
            report.push(path, "must be an integer", Some(v));
            previous
        }
        Some(start) if start < 0.0 => {
            report.push(path, "must be >= 0", Some(v));
            previous
        }
        Some(start) => {
            if let Some(prev) = previous.filter(|p| start < *p) {
                report.push(
                    path,
                    format!(
                        "entries must be sorted by core:sample_start, previous entry starts at {prev}"
                    ),
                    Some(v),
                );
            }
            Some(start)
        }
    }
}

fn check_capture(base: &str, capture: &Capture, report: &mut ValidationReport) {
    let fields = &capture.fields;

    if let Some(v) = fields.get(keys::DATETIME) {
        if !v.as_str().is_some_and(|s| DATETIME_RE.is_match(s)) {
            report.push(
                field_path(base, keys::DATETIME),
                "must be an ISO-8601 UTC timestamp like 2024-01-01T00:00:00.000Z",
                Some(v),
            );
        }
    }

    if let Some(v) = fields.get(keys::FREQUENCY) {
        match v.as_f64() {
            None => report.push(field_path(base, keys::FREQUENCY), "must be a number", Some(v)),
            Some(f) if f.abs() > MAX_FREQUENCY => report.push(
                field_path(base, keys::FREQUENCY),
                "must be within +/- 1e12",
                Some(v),
            ),
            Some(_) => {}
        }
    }

    if let Some(v) = fields.get(keys::GEOLOCATION) {
        check_geo_point(&field_path(base, keys::GEOLOCATION), v, report);
    }
}

fn check_annotation(base: &str, annotation: &Annotation, report: &mut ValidationReport) {
    let fields = &annotation.fields;

    if let Some(v) = fields.get(keys::SAMPLE_COUNT) {
        match as_integer(v) {
            None => report.push(
                field_path(base, keys::SAMPLE_COUNT),
                "must be an integer",
                Some(v),
            ),
            Some(n) if n < 0.0 => report.push(
                field_path(base, keys::SAMPLE_COUNT),
                "must be >= 0",
                Some(v),
            ),
            Some(_) => {}
        }
    }

    match (fields.get(keys::FREQ_LOWER_EDGE), fields.get(keys::FREQ_UPPER_EDGE)) {
        (None, None) => {}
        (Some(_), None) | (None, Some(_)) => report.push(
            base,
            "core:freq_lower_edge and core:freq_upper_edge must be given together",
            None,
        ),
        (Some(lower), Some(upper)) => {
            for (key, v) in [(keys::FREQ_LOWER_EDGE, lower), (keys::FREQ_UPPER_EDGE, upper)] {
                if !v.is_number() {
                    report.push(field_path(base, key), "must be a number", Some(v));
                }
            }
            if let (Some(lo), Some(hi)) = (lower.as_f64(), upper.as_f64()) {
                if lo > hi {
                    report.push(
                        field_path(base, keys::FREQ_LOWER_EDGE),
                        "must not be greater than core:freq_upper_edge",
                        Some(lower),
                    );
                }
            }
        }
    }

    if let Some(v) = fields.get(keys::UUID) {
        if !v.as_str().is_some_and(|s| UUID_RE.is_match(s)) {
            report.push(field_path(base, keys::UUID), "must be a UUID", Some(v));
        }
    }
}

impl Recording {
    /// Runs every core rule over the document.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        check_global(&self.global, &mut report);

        let mut previous = None;
        for (i, capture) in self.captures.iter().enumerate() {
            let base = format!("captures[{i}]");
            previous = check_sample_start(&base, &capture.fields, previous, &mut report);
            check_capture(&base, capture, &mut report);
        }

        let mut previous = None;
        for (i, annotation) in self.annotations.iter().enumerate() {
            let base = format!("annotations[{i}]");
            previous = check_sample_start(&base, &annotation.fields, previous, &mut report);
            check_annotation(&base, annotation, &mut report);
        }

        report
    }

    /// Core rules followed by type checks of fields in namespaces known to `registry`.
    pub fn validate_with(&self, registry: &ExtensionRegistry) -> ValidationReport {
        let mut report = self.validate();
        registry.check_fields("global", &self.global, &mut report);
        for (i, capture) in self.captures.iter().enumerate() {
            registry.check_fields(&format!("captures[{i}]"), &capture.fields, &mut report);
        }
        for (i, annotation) in self.annotations.iter().enumerate() {
            registry.check_fields(&format!("annotations[{i}]"), &annotation.fields, &mut report);
        }
        report
    }
}

#[cfg(test)]
mod validate_tests {
    use super::*;
    use crate::metadata::{GeoPoint, RecordingOptions};
    use serde_json::json;

    fn minimal() -> Recording {
        Recording::with_options(RecordingOptions::with_datatype("cf32_le")).unwrap()
    }

    fn paths(report: &ValidationReport) -> Vec<&str> {
        report.errors.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn minimal_recording_is_valid() {
        let report = minimal().validate();
        assert!(report.is_valid());
        assert_eq!(report.errors.len(), 0);
    }

    #[test]
    fn fresh_recording_lacks_datatype() {
        let report = Recording::new().validate();
        assert_eq!(paths(&report), vec!["global.core:datatype"]);
        assert_eq!(report.errors[0].message, "is required");
    }

    #[test]
    fn global_rules() {
        let mut rec = minimal();
        rec.global.insert(keys::DATATYPE.into(), json!("cx32_le"));
        rec.global.insert(keys::VERSION.into(), json!("v1"));
        rec.set_global(keys::SAMPLE_RATE, 0.0).unwrap();
        rec.set_global(keys::NUM_CHANNELS, 1.5).unwrap();
        rec.set_global(keys::OFFSET, -1).unwrap();
        rec.set_global(keys::SHA512, "abc").unwrap();
        let point = json!({"type": "Point", "coordinates": [200.0, 10.0]});
        rec.set_global(keys::GEOLOCATION, point).unwrap();

        let report = rec.validate();
        assert_eq!(
            paths(&report),
            vec![
                "global.core:datatype",
                "global.core:version",
                "global.core:sample_rate",
                "global.core:num_channels",
                "global.core:offset",
                "global.core:sha512",
                "global.core:geolocation.coordinates[0]",
            ]
        );
        assert_eq!(report.errors[2].value, Some(json!(0.0)));
    }

    #[test]
    fn version_qualifiers_and_rate_limits() {
        let mut rec = minimal();
        rec.set_global(keys::VERSION, "1.2.0-beta").unwrap();
        rec.set_global(keys::SAMPLE_RATE, 1e12).unwrap();
        rec.set_global(keys::SHA512, "AB".repeat(64)).unwrap();
        assert!(rec.validate().is_valid());

        rec.set_global(keys::SAMPLE_RATE, 2e12).unwrap();
        assert_eq!(paths(&rec.validate()), vec!["global.core:sample_rate"]);
        rec.set_global(keys::SAMPLE_RATE, "fast").unwrap();
        assert_eq!(rec.validate().errors[0].message, "must be a number");
    }

    #[test]
    fn unsorted_captures_are_reported() {
        let mut rec = minimal();
        rec.captures = vec![Capture::new(100), Capture::new(50)];
        let report = rec.validate();
        assert!(!report.is_valid());
        assert_eq!(paths(&report), vec!["captures[1].core:sample_start"]);
        assert!(report.errors[0].message.contains("sorted"));
    }

    #[test]
    fn capture_rules() {
        let mut rec = minimal();
        rec.captures = vec![
            Capture::new(0)
                .with_datetime("2024-03-01T12:00:00.123456Z")
                .with_frequency(-2.4e9)
                .with_geolocation(GeoPoint::new(10.0, 20.0).with_altitude(-5.0)),
            Capture::new(0).with_datetime("2024-03-01 12:00:00"),
            Capture::default().with_frequency(5e12),
            Capture::new(10).with_field(
                keys::GEOLOCATION,
                json!({"type": "Polygon", "coordinates": [1, 95]}),
            ),
        ];
        let report = rec.validate();
        assert_eq!(
            paths(&report),
            vec![
                "captures[1].core:datetime",
                "captures[2].core:sample_start",
                "captures[2].core:frequency",
                "captures[3].core:geolocation.type",
                "captures[3].core:geolocation.coordinates[1]",
            ]
        );
    }

    #[test]
    fn negative_and_fractional_sample_start() {
        let mut rec = minimal();
        rec.annotations = vec![
            Annotation::new(0).with_field(keys::SAMPLE_START, -4),
            Annotation::new(0).with_field(keys::SAMPLE_START, 2.5),
            Annotation::new(3),
        ];
        let report = rec.validate();
        assert_eq!(report.errors[0].message, "must be >= 0");
        assert_eq!(report.errors[1].message, "must be an integer");
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn freq_edges_must_be_paired() {
        let mut rec = minimal();
        rec.annotations = vec![Annotation::new(0).with_field(keys::FREQ_LOWER_EDGE, 100e6)];
        assert_eq!(paths(&rec.validate()), vec!["annotations[0]"]);

        rec.annotations = vec![Annotation::new(0).with_freq_edges(200e6, 100e6)];
        assert_eq!(paths(&rec.validate()), vec!["annotations[0].core:freq_lower_edge"]);

        rec.annotations = vec![Annotation::new(0).with_freq_edges(99e6, 101e6)];
        assert!(rec.validate().is_valid());

        rec.annotations = vec![
            Annotation::new(0)
                .with_field(keys::FREQ_LOWER_EDGE, "low")
                .with_field(keys::FREQ_UPPER_EDGE, 1e6),
        ];
        assert_eq!(paths(&rec.validate()), vec!["annotations[0].core:freq_lower_edge"]);
    }

    #[test]
    fn annotation_rules() {
        let mut rec = minimal();
        rec.annotations = vec![
            Annotation::new(0)
                .with_sample_count(10)
                .with_uuid("0E9B6A3C-1F2D-4E5A-9B8C-7D6E5F4A3B2C"),
            Annotation::new(5).with_field(keys::SAMPLE_COUNT, -1),
            Annotation::new(6).with_uuid("not-a-uuid"),
            Annotation::new(1),
        ];
        let report = rec.validate();
        assert_eq!(
            paths(&report),
            vec![
                "annotations[1].core:sample_count",
                "annotations[2].core:uuid",
                "annotations[3].core:sample_start",
            ]
        );
    }

    #[test]
    fn failures_do_not_mask_each_other() {
        let mut rec = Recording::new();
        rec.global.remove(keys::VERSION);
        rec.captures = vec![Capture::new(5), Capture::new(1).with_frequency(2e12)];
        rec.annotations = vec![Annotation::new(0).with_uuid("x")];
        let report = rec.validate();
        assert_eq!(
            paths(&report),
            vec![
                "global.core:datatype",
                "global.core:version",
                "captures[1].core:sample_start",
                "captures[1].core:frequency",
                "annotations[0].core:uuid",
            ]
        );
        assert_eq!(report.at("captures[1]").count(), 2);
    }

    #[test]
    fn geo_point_shapes() {
        let mut report = ValidationReport::default();
        check_geo_point("g", &json!("here"), &mut report);
        let points = [
            json!({"type": "Point", "coordinates": [1.0]}),
            json!({"type": "Point", "coordinates": [1.0, 2.0, "high"]}),
            json!({"type": "Point", "coordinates": [-180, 90, 1e6]}),
        ];
        for point in &points {
            check_geo_point("g", point, &mut report);
        }
        assert_eq!(
            paths(&report),
            vec!["g", "g.coordinates", "g.coordinates[2]"]
        );
    }
}

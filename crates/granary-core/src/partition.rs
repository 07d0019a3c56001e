//! Partition schema and partition key validation.
//!
//! Every committable dataset slice is addressed by a set of partition
//! dimensions (for example `lang=ko,src=real`). The schema declares, per
//! dataset task, which dimensions are required, in which order they appear
//! in catalog paths, and which values a constrained dimension may take.
//!
//! Free-form partition text is parsed with [`parse_partition_string`] and
//! then resolved against the schema into [`DimensionValue`]s. A
//! `DimensionValue` can only be obtained through schema resolution, so a
//! disallowed dimension or value is unrepresentable in path-building code.
//!
//! Validation is side-effect free and always runs before any filesystem
//! mutation.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

/// Parses a partition string of the form `"k1=v1,k2=v2"` into a map.
///
/// Splits on commas, then on the first `=`, trimming whitespace around keys
/// and values. Empty input yields an empty map. A segment without `=` is
/// kept with an empty value so that schema validation reports it instead of
/// silently dropping it.
///
/// This function does **not** validate against the schema; validation is a
/// separate explicit step via [`PartitionSchema::validate`].
#[must_use]
pub fn parse_partition_string(input: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for segment in input.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match segment.split_once('=') {
            Some((key, value)) => {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                map.insert(segment.to_string(), String::new());
            }
        }
    }
    map
}

/// A single validated partition dimension.
///
/// Instances are only produced by [`PartitionSchema::ordered_values`] (or
/// [`PartitionSchema::resolve`]), which guarantees the dimension is declared
/// for its task and the value is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionValue {
    name: String,
    value: String,
}

impl DimensionValue {
    /// Returns the dimension name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dimension value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Per-task partition dimension schema.
///
/// Maps each task name to its ordered list of required dimensions, and
/// selected dimension names to their finite allowed value sets. Dimensions
/// without an entry in the allowed-value map accept any non-empty value.
#[derive(Debug, Clone, Default)]
pub struct PartitionSchema {
    tasks: BTreeMap<String, Vec<String>>,
    allowed: BTreeMap<String, BTreeSet<String>>,
}

impl PartitionSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the built-in schema covering the origin dataset tasks.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_task("ocr", &["lang", "src"])
            .with_task("layout", &["lang"])
            .with_task("vqa", &["lang", "domain"])
            .with_allowed("lang", &["ko", "en"])
            .with_allowed("src", &["real", "synth"])
    }

    /// Declares a task with its ordered list of required dimensions.
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>, dimensions: &[&str]) -> Self {
        self.tasks.insert(
            task.into(),
            dimensions.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Restricts a dimension to a finite set of allowed values.
    #[must_use]
    pub fn with_allowed(mut self, dimension: impl Into<String>, values: &[&str]) -> Self {
        self.allowed.insert(
            dimension.into(),
            values.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Returns the declared dimension order for a task, if known.
    #[must_use]
    pub fn dimensions(&self, task: &str) -> Option<&[String]> {
        self.tasks.get(task).map(Vec::as_slice)
    }

    /// Validates a partition map against a task's declared dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the task is unknown, a required
    /// dimension is absent, an undeclared dimension is present, or a
    /// constrained dimension carries a disallowed value.
    pub fn validate(&self, task: &str, map: &BTreeMap<String, String>) -> Result<()> {
        self.ordered_values(task, map).map(|_| ())
    }

    /// Resolves a partition map into the task's declared dimension order.
    ///
    /// The returned sequence is the contract for catalog path construction:
    /// order comes from the task declaration, never from map iteration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] under the same conditions as
    /// [`Self::validate`].
    pub fn ordered_values(
        &self,
        task: &str,
        map: &BTreeMap<String, String>,
    ) -> Result<Vec<DimensionValue>> {
        let Some(required) = self.tasks.get(task) else {
            return Err(Error::schema(format!("unknown task: {task}")));
        };

        for key in map.keys() {
            if !required.contains(key) {
                return Err(Error::schema(format!(
                    "dimension {key:?} is not declared for task {task:?}"
                )));
            }
        }

        let mut ordered = Vec::with_capacity(required.len());
        for dimension in required {
            let Some(value) = map.get(dimension) else {
                return Err(Error::schema(format!(
                    "task {task:?} requires dimension {dimension:?}"
                )));
            };
            ordered.push(self.resolve(dimension, value)?);
        }
        Ok(ordered)
    }

    /// Resolves a single dimension value, enforcing the allowed-value set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the value is empty or not in the
    /// dimension's allowed set.
    pub fn resolve(&self, dimension: &str, value: &str) -> Result<DimensionValue> {
        if value.is_empty() {
            return Err(Error::schema(format!(
                "dimension {dimension:?} has an empty value"
            )));
        }
        if let Some(allowed) = self.allowed.get(dimension) {
            if !allowed.contains(value) {
                return Err(Error::schema(format!(
                    "value {value:?} is not allowed for dimension {dimension:?}"
                )));
            }
        }
        Ok(DimensionValue {
            name: dimension.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_partition_string() {
        let parsed = parse_partition_string("lang=ko, src = real");
        assert_eq!(parsed.get("lang").map(String::as_str), Some("ko"));
        assert_eq!(parsed.get("src").map(String::as_str), Some("real"));
    }

    #[test]
    fn test_parse_partition_string_empty() {
        assert!(parse_partition_string("").is_empty());
        assert!(parse_partition_string("  ,  ").is_empty());
    }

    #[test]
    fn test_parse_keeps_segment_without_equals() {
        let parsed = parse_partition_string("lang");
        assert_eq!(parsed.get("lang").map(String::as_str), Some(""));
    }

    #[test]
    fn test_validate_accepts_complete_key() {
        let schema = PartitionSchema::builtin();
        assert!(schema
            .validate("ocr", &map(&[("lang", "ko"), ("src", "real")]))
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_disallowed_value() {
        let schema = PartitionSchema::builtin();
        let err = schema
            .validate("ocr", &map(&[("lang", "xx"), ("src", "real")]))
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_validate_rejects_missing_dimension() {
        let schema = PartitionSchema::builtin();
        let err = schema.validate("ocr", &map(&[("lang", "ko")])).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_validate_rejects_extraneous_dimension() {
        let schema = PartitionSchema::builtin();
        let err = schema
            .validate(
                "ocr",
                &map(&[("lang", "ko"), ("src", "real"), ("extra", "1")]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_task() {
        let schema = PartitionSchema::builtin();
        let err = schema.validate("nope", &map(&[])).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_ordered_values_follow_task_declaration() {
        // Map iteration would yield domain before lang; the task order wins.
        let schema = PartitionSchema::builtin();
        let ordered = schema
            .ordered_values("vqa", &map(&[("domain", "finance"), ("lang", "ko")]))
            .unwrap();
        let names: Vec<&str> = ordered.iter().map(DimensionValue::name).collect();
        assert_eq!(names, vec!["lang", "domain"]);
    }

    #[test]
    fn test_unconstrained_dimension_accepts_any_value() {
        let schema = PartitionSchema::builtin();
        assert!(schema
            .validate("vqa", &map(&[("lang", "en"), ("domain", "anything-goes")]))
            .is_ok());
    }

    #[test]
    fn test_empty_value_rejected() {
        let schema = PartitionSchema::builtin();
        let err = schema
            .validate("ocr", &map(&[("lang", ""), ("src", "real")]))
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }
}

//! Request documents.
//!
//! A pipeline descriptor is a JSON tree. Leaves name a dataset:
//!
//! ```json
//! { "type": "data", "dataset": { "source": "dummy", "id": "dense", "variant": null } }
//! ```
//!
//! Stages name a directive, its options and either one `child` or a
//! `children` array:
//!
//! ```json
//! { "type": "expr", "options": { "expression": "y * 100" }, "child": { ... } }
//! { "type": "sum", "children": [ { ... }, { ... } ] }
//! ```

use crate::error::{PerfStreamError, Result, ResultExt};
use crate::pipeline::registry::StageOptions;
use crate::types::ScalarKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Directive of leaf descriptors
pub const LEAF_DIRECTIVE: &str = "data";

/// Which dataset (and variant) a leaf reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub source: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// One node of a pipeline descriptor tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// `data` for leaves, a stage directive otherwise
    #[serde(rename = "type")]
    pub directive: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetDescriptor>,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "StageOptions::is_empty"
    )]
    pub options: StageOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<NodeDescriptor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeDescriptor>>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<StageOptions, D::Error> {
    Ok(Option::<StageOptions>::deserialize(deserializer)?.unwrap_or_default())
}

impl NodeDescriptor {
    /// Leaf reading `source`/`id`, optionally one variant of it.
    pub fn leaf(source: &str, id: &str, variant: Option<&str>) -> Self {
        Self {
            directive: LEAF_DIRECTIVE.to_string(),
            dataset: Some(DatasetDescriptor {
                source: source.to_string(),
                id: id.to_string(),
                variant: variant.map(str::to_string),
            }),
            ..Self::default()
        }
    }

    /// Single-child stage.
    pub fn stage(directive: &str, child: NodeDescriptor) -> Self {
        Self {
            directive: directive.to_string(),
            child: Some(Box::new(child)),
            ..Self::default()
        }
    }

    /// Multi-child stage.
    pub fn merge(directive: &str, children: Vec<NodeDescriptor>) -> Self {
        Self {
            directive: directive.to_string(),
            children: Some(children),
            ..Self::default()
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.directive.eq_ignore_ascii_case(LEAF_DIRECTIVE)
    }
}

/// Body of a multi-pipeline fetch.
///
/// `from`/`to` are parsed in the X kind shared by each pipeline's leaves. A
/// missing end leaves that side of the range open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchDataRequest {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub pipelines: Vec<NodeDescriptor>,
}

/// Body of a single-dataset bulk export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkDataRequest {
    /// Variants to export, in order. Empty means the dataset's default.
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Output kinds of one compiled pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpecs {
    pub x_type: ScalarKind,
    pub y_type: ScalarKind,
}

/// Parse a request document. Malformed JSON is a client error.
pub fn parse_request<T: DeserializeOwned>(content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| PerfStreamError::Request(e.to_string()))
}

/// Read a request document from `path`, or from stdin when `path` is `-`.
pub fn load_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map(|_| content)
    } else {
        std::fs::read_to_string(path)
    };
    let content = content
        .map_err(PerfStreamError::from)
        .with_context(|| format!("Failed to read request {:?}", path))?;

    parse_request(&content).with_context(|| format!("Malformed request {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_descriptor() {
        let request: FetchDataRequest = serde_json::from_value(json!({
            "from": "1700000000",
            "pipelines": [{
                "type": "expr",
                "options": { "expression": "y * 2" },
                "child": {
                    "type": "sum",
                    "children": [
                        { "type": "data", "dataset": { "source": "dummy", "id": "dense" } },
                        { "type": "data", "dataset": { "source": "dummy", "id": "extradense", "variant": null } }
                    ]
                }
            }]
        }))
        .unwrap();

        assert_eq!(request.from.as_deref(), Some("1700000000"));
        assert_eq!(request.to, None);

        let root = &request.pipelines[0];
        assert_eq!(root.directive, "expr");
        assert_eq!(root.options["expression"], "y * 2");

        let sum = root.child.as_deref().unwrap();
        let children = sum.children.as_ref().unwrap();
        assert!(children.iter().all(NodeDescriptor::is_leaf));
        assert_eq!(children[1].dataset.as_ref().unwrap().variant, None);
    }

    #[test]
    fn test_null_options_are_empty() {
        let node: NodeDescriptor =
            serde_json::from_value(json!({ "type": "diff", "options": null, "child": null }))
                .unwrap();
        assert!(node.options.is_empty());
        assert!(node.child.is_none());
    }

    #[test]
    fn test_builders_serialize_compactly() {
        let desc = NodeDescriptor::stage("expr", NodeDescriptor::leaf("dummy", "peak", None))
            .with_option("expression", "y + 1");

        assert_eq!(
            serde_json::to_value(&desc).unwrap(),
            json!({
                "type": "expr",
                "options": { "expression": "y + 1" },
                "child": { "type": "data", "dataset": { "source": "dummy", "id": "peak" } }
            })
        );
    }

    #[test]
    fn test_malformed_request_is_a_client_error() {
        let err = parse_request::<FetchDataRequest>("{\"from\": 5}").unwrap_err();
        assert!(matches!(err, PerfStreamError::Request(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_load_request_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk.json");
        std::fs::write(&path, r#"{ "variants": ["read"], "to": "60" }"#).unwrap();

        let request: BulkDataRequest = load_request(&path).unwrap();
        assert_eq!(request.variants, vec!["read".to_string()]);
        assert_eq!(request.to.as_deref(), Some("60"));
        assert_eq!(request.from, None);
    }

    #[test]
    fn test_load_request_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = load_request::<FetchDataRequest>(&path).unwrap_err();
        assert!(matches!(err, PerfStreamError::WithContext { .. }));
        assert!(err.to_string().contains("absent.json"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_specs_shape() {
        let specs = PipelineSpecs {
            x_type: ScalarKind::Instant,
            y_type: ScalarKind::Real32,
        };
        assert_eq!(
            serde_json::to_value(specs).unwrap(),
            json!({ "x_type": "datetime", "y_type": "float" })
        );
    }
}

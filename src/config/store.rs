use crate::error::{ConfigError, EvostratError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Typed value carried by a parameter node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Long(i64),
    Double(f64),
    Bool(bool),
    File(PathBuf),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) | ParamValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ParamValue::Double(v) => Some(*v),
            ParamValue::Int(v) | ParamValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Path> {
        match self {
            ParamValue::File(p) => Some(p),
            _ => None,
        }
    }
}

/// One named node of the hierarchical parameter tree. Nodes that declare an
/// optimization parameter or an operator additionally carry `class_value`,
/// the type tag resolved against the representation/operator registries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParameterNode>,
}

impl ParameterNode {
    pub fn group(name: &str, children: Vec<ParameterNode>) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            class_value: None,
            children,
        }
    }

    pub fn leaf(name: &str, value: ParamValue) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value),
            class_value: None,
            children: Vec::new(),
        }
    }

    pub fn with_class(mut self, class_value: &str) -> Self {
        self.class_value = Some(class_value.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<ParameterNode>) -> Self {
        self.children = children;
        self
    }

    /// Depth-first, first-match search among the descendants of this node.
    /// Names are assumed unique within the subtree they are queried in.
    pub fn find(&self, name: &str) -> Option<&ParameterNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn str_param(&self, name: &str) -> Result<&str, ConfigError> {
        let node = self.require(name)?;
        node.value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or(ConfigError::WrongParameterKind {
                name: name.to_string(),
                expected: "string",
            })
    }

    pub fn int_param(&self, name: &str) -> Result<i64, ConfigError> {
        let node = self.require(name)?;
        node.value
            .as_ref()
            .and_then(|v| v.as_int())
            .ok_or(ConfigError::WrongParameterKind {
                name: name.to_string(),
                expected: "int",
            })
    }

    pub fn double_param(&self, name: &str) -> Result<f64, ConfigError> {
        let node = self.require(name)?;
        node.value
            .as_ref()
            .and_then(|v| v.as_double())
            .ok_or(ConfigError::WrongParameterKind {
                name: name.to_string(),
                expected: "double",
            })
    }

    pub fn bool_param(&self, name: &str) -> Result<bool, ConfigError> {
        let node = self.require(name)?;
        node.value
            .as_ref()
            .and_then(|v| v.as_bool())
            .ok_or(ConfigError::WrongParameterKind {
                name: name.to_string(),
                expected: "bool",
            })
    }

    fn require(&self, name: &str) -> Result<&ParameterNode, ConfigError> {
        self.find(name)
            .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
    }
}

/// The four fixed subtrees of the optimization configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeKind {
    ParametersToOptimize,
    ParametersConstant,
    AlgorithmParameters,
    Output,
}

/// Read-only query interface over the parameter tree. Loaded once from the
/// external configuration collaborator; no mutation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterStore {
    #[serde(rename = "problemParametersToOptimize")]
    pub parameters_to_optimize: ParameterNode,
    #[serde(rename = "problemParametersConstant")]
    pub parameters_constant: ParameterNode,
    #[serde(rename = "esParameters")]
    pub es_parameters: ParameterNode,
    #[serde(rename = "output")]
    pub output: ParameterNode,
}

impl ParameterStore {
    pub fn subtree(&self, kind: SubtreeKind) -> &ParameterNode {
        match kind {
            SubtreeKind::ParametersToOptimize => &self.parameters_to_optimize,
            SubtreeKind::ParametersConstant => &self.parameters_constant,
            SubtreeKind::AlgorithmParameters => &self.es_parameters,
            SubtreeKind::Output => &self.output,
        }
    }

    /// Depth-first, first-match lookup within one of the four subtrees.
    pub fn find_by_name(&self, kind: SubtreeKind, name: &str) -> Result<&ParameterNode, ConfigError> {
        self.subtree(kind)
            .find(name)
            .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self, EvostratError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvostratError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| {
                ConfigError::Invalid(format!("Failed to parse {}: {}", path.display(), e)).into()
            }),
            _ => Ok(serde_json::from_str(&contents)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_nested_lookup() -> ParameterStore {
        ParameterStore {
            parameters_to_optimize: ParameterNode::group(
                "problemParametersToOptimize",
                vec![ParameterNode::group(
                    "Processing",
                    vec![ParameterNode::leaf("Selected features", ParamValue::Int(5))
                        .with_class("BinaryVector")],
                )],
            ),
            parameters_constant: ParameterNode::group("problemParametersConstant", vec![]),
            es_parameters: ParameterNode::group("esParameters", vec![]),
            output: ParameterNode::group("output", vec![]),
        }
    }

    #[test]
    fn find_by_name_descends_depth_first() {
        let store = store_with_nested_lookup();
        let node = store
            .find_by_name(SubtreeKind::ParametersToOptimize, "Selected features")
            .unwrap();
        assert_eq!(node.class_value.as_deref(), Some("BinaryVector"));
    }

    #[test]
    fn find_by_name_reports_missing_parameter() {
        let store = store_with_nested_lookup();
        let err = store
            .find_by_name(SubtreeKind::Output, "Logging interval")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter(name) if name == "Logging interval"));
    }

    #[test]
    fn json_round_trip() {
        let store = store_with_nested_lookup();
        let json = serde_json::to_string(&store).unwrap();
        let parsed = ParameterStore::from_json_str(&json).unwrap();
        assert!(parsed
            .find_by_name(SubtreeKind::ParametersToOptimize, "Selected features")
            .is_ok());
    }
}

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Distance thresholds used by the diagram recoverers.
///
/// The defaults are tuned to Mermaid's default output scale (16px font, unscaled `viewBox`).
/// A page that renders diagrams at a different scale needs proportionally different values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecoveryOptions {
    /// Max distance between a flowchart connector's midpoint and an edge-label center.
    pub flowchart_label_distance: f64,
    /// Max distance between a connector end and a node box when the connector id cannot be
    /// decomposed into node ids.
    pub edge_endpoint_tolerance: f64,
    /// Max distance between a note connector end and a class center.
    pub class_note_center_distance: f64,
    /// Max distance between a note connector end and a class/note box edge.
    pub class_note_edge_distance: f64,
    /// Max horizontal drift between the ends of a curved self-message.
    pub sequence_self_message_tolerance: f64,
    /// Max distance between a transition end and a state box.
    pub state_endpoint_tolerance: f64,
    /// Max distance between a transition midpoint and an edge-label center.
    pub state_label_distance: f64,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            flowchart_label_distance: 75.0,
            edge_endpoint_tolerance: 10.0,
            class_note_center_distance: 150.0,
            class_note_edge_distance: 20.0,
            sequence_self_message_tolerance: 5.0,
            state_endpoint_tolerance: 10.0,
            state_label_distance: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertOptions {
    pub recovery: RecoveryOptions,
    /// Deeper subtrees are replaced by an error marker instead of being converted.
    pub max_depth: usize,
    /// Relative link and image targets are resolved against this URL when set.
    pub base_url: Option<String>,
    /// Info string of fenced diagram blocks.
    pub diagram_fence: String,
    /// When false, failed subtrees are dropped silently instead of leaving a marker.
    pub emit_error_markers: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            recovery: RecoveryOptions::default(),
            max_depth: 256,
            base_url: None,
            diagram_fence: "mermaid".to_string(),
            emit_error_markers: true,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON. Keys that are absent keep their defaults; nested objects are
    /// merged key by key.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let overrides: Value = serde_json::from_str(text).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })?;
        Self::default().merged_with(&overrides)
    }

    pub fn merged_with(&self, overrides: &Value) -> Result<Self> {
        if !overrides.is_object() {
            return Err(Error::InvalidConfig {
                message: "options must be a JSON object".to_string(),
            });
        }
        let mut base = serde_json::to_value(self).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })?;
        deep_merge_value(&mut base, overrides);
        serde_json::from_value(base).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })
    }

    pub fn with_recovery(mut self, recovery: RecoveryOptions) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_error_markers(mut self, enabled: bool) -> Self {
        self.emit_error_markers = enabled;
        self
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_json_keeps_defaults() {
        let opts =
            ConvertOptions::from_json_str(r#"{"recovery":{"flowchartLabelDistance":120},"maxDepth":8}"#)
                .unwrap();
        assert_eq!(opts.recovery.flowchart_label_distance, 120.0);
        assert_eq!(opts.recovery.state_label_distance, 150.0);
        assert_eq!(opts.max_depth, 8);
        assert_eq!(opts.diagram_fence, "mermaid");
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(
            ConvertOptions::from_json_str("{"),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(matches!(
            ConvertOptions::from_json_str("[1]"),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(matches!(
            ConvertOptions::default().merged_with(&json!({ "maxDepth": "deep" })),
            Err(Error::InvalidConfig { .. })
        ));
    }
}

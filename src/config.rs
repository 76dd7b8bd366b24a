// Engine configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_GOVERNMENT: &str = "Government of Sri Lanka";
pub const DEFAULT_ID_NAMESPACE: &str = "gzt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Natural key of the root government every minister reports to
    pub government: String,

    /// Leading segment of generated ids (`gzt` in `gzt_min_12`)
    pub id_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            government: DEFAULT_GOVERNMENT.to_string(),
            id_namespace: DEFAULT_ID_NAMESPACE.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_government(mut self, government: impl Into<String>) -> Self {
        self.government = government.into();
        self
    }

    pub fn with_id_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.id_namespace = namespace.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"government": "Gov X"}"#).unwrap();

        assert_eq!(config.government, "Gov X");
        assert_eq!(config.id_namespace, DEFAULT_ID_NAMESPACE);
    }
}

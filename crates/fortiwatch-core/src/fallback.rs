// ── Static fallback dataset ──
//
// Last tier of the fallback chain. The dataset is already in canonical
// shape; serving it per resource lets it flow through the same
// normalizer as live and cached payloads. Every device is marked
// synthetic on load.

use std::path::Path;

use fortiwatch_api::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{AccessPoint, Endpoint, GatewayInfo, Switch};

const BUNDLED: &str = include_str!("../data/fallback.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackDataset {
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gateway: GatewayInfo,
    #[serde(default)]
    pub access_points: Vec<AccessPoint>,
    #[serde(default)]
    pub switches: Vec<Switch>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// Holds the dataset, or the reason it could not be loaded.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    dataset: Result<FallbackDataset, String>,
}

impl FallbackStore {
    /// The dataset compiled into the binary.
    pub fn bundled() -> Self {
        Self::from_json(BUNDLED)
    }

    /// Load an operator-supplied dataset. A missing or corrupt file does
    /// not fail construction; it surfaces per cycle as an unavailable tier.
    pub fn from_path(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read fallback dataset");
                Self {
                    dataset: Err(format!("cannot read {}: {e}", path.display())),
                }
            }
        }
    }

    pub fn from_json(text: &str) -> Self {
        let dataset = serde_json::from_str::<FallbackDataset>(text)
            .map_err(|e| format!("corrupt dataset: {e}"))
            .and_then(|mut ds| {
                if ds.version.trim().is_empty() {
                    return Err("dataset has no version".into());
                }
                ds.access_points.iter_mut().for_each(|ap| ap.synthetic = true);
                ds.switches.iter_mut().for_each(|sw| sw.synthetic = true);
                Ok(ds)
            });

        match &dataset {
            Ok(ds) => debug!(version = %ds.version, "fallback dataset loaded"),
            Err(e) => warn!(error = %e, "fallback dataset unusable"),
        }
        Self { dataset }
    }

    pub fn dataset(&self) -> Result<&FallbackDataset, CoreError> {
        self.dataset
            .as_ref()
            .map_err(|message| CoreError::FallbackUnavailable {
                message: message.clone(),
            })
    }

    pub fn version(&self) -> Option<&str> {
        self.dataset.as_ref().ok().map(|ds| ds.version.as_str())
    }

    /// The dataset's slice for one resource, in canonical form.
    pub fn payload(&self, resource: Resource) -> Result<Value, CoreError> {
        let ds = self.dataset()?;
        let value = match resource {
            Resource::SystemStatus => serde_json::to_value(&ds.gateway),
            Resource::AccessPoints => serde_json::to_value(&ds.access_points),
            Resource::Switches => serde_json::to_value(&ds.switches),
            Resource::Endpoints => serde_json::to_value(&ds.endpoints),
            Resource::ResourceUsage => Ok(Value::Array(Vec::new())),
        };
        value.map_err(|e| CoreError::FallbackUnavailable {
            message: format!("cannot encode {resource}: {e}"),
        })
    }
}

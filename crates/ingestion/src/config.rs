//! Pipeline settings shared by the batch and trigger surfaces.

use serde::{Deserialize, Serialize};

use crate::merger::DEFAULT_PATH_TEMPLATE;

/// Default pub/sub topic for newly inserted entries.
pub const DEFAULT_PUBLISH_TOPIC: &str = "landsat-stac";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Entry location inside the collection, e.g. `{column}/{row}/{date}/{id}.json`
    pub path_template: String,
    /// Topic new entries are announced on
    pub publish_topic: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            publish_topic: DEFAULT_PUBLISH_TOPIC.to_string(),
        }
    }
}

use serde::{Deserialize, Serialize};

pub const ATTR_FEATURE_IDENTIFIER: &str = "featureIdentifier";
pub const ATTR_FEATURE_NAME: &str = "featureName";
pub const ATTR_VARIATION_IDENTIFIER: &str = "variationIdentifier";
pub const ATTR_SDK_LANGUAGE: &str = "SDK_LANGUAGE";
pub const ATTR_SDK_VERSION: &str = "SDK_VERSION";
pub const ATTR_SDK_TYPE: &str = "SDK_TYPE";
pub const ATTR_SDK_NAME: &str = "SDK_NAME";
pub const ATTR_TARGET: &str = "target";

/// Sentinel every `target` attribute is rewritten to by the target-analytics
/// aggregation variant, intentionally collapsing per-target identity.
pub const GLOBAL_TARGET_SENTINEL: &str = "__global__cf_target";

pub type Attributes = Vec<(String, String)>;

pub fn attribute<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDatum {
    pub attributes: Attributes,
    pub count: u64,
    #[serde(rename = "metricsType")]
    pub metrics_type: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDatum {
    pub identifier: String,
    pub name: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricRecord {
    #[serde(rename = "environmentID")]
    pub environment_id: String,
    #[serde(default, rename = "metricsData")]
    pub metrics_data: Vec<MetricDatum>,
    #[serde(default, rename = "targetData")]
    pub target_data: Vec<TargetDatum>,
    #[serde(default)]
    pub size: u64,
}

impl MetricRecord {
    /// Splits a record into a metrics-only copy and a target-only copy, the way
    /// MetricsQueue fans a single incoming record out to its two sub-queues.
    pub fn split(&self) -> (MetricRecord, MetricRecord) {
        let metrics_only = MetricRecord {
            environment_id: self.environment_id.clone(),
            metrics_data: self.metrics_data.clone(),
            target_data: Vec::new(),
            size: self.size,
        };
        let targets_only = MetricRecord {
            environment_id: self.environment_id.clone(),
            metrics_data: Vec::new(),
            target_data: self.target_data.clone(),
            size: self.size,
        };
        (metrics_only, targets_only)
    }
}

/// `(env, flag, variation, sdk language, sdk version)` — collapses repeated metric
/// events into a single record with a summed count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationKey {
    pub environment_id: String,
    pub flag_identifier: String,
    pub variation_identifier: String,
    pub sdk_language: String,
    pub sdk_version: String,
}

impl AggregationKey {
    pub fn from_datum(environment_id: &str, datum: &MetricDatum) -> Self {
        let flag_identifier = attribute(&datum.attributes, ATTR_FEATURE_IDENTIFIER)
            .or_else(|| attribute(&datum.attributes, ATTR_FEATURE_NAME))
            .unwrap_or_default()
            .to_string();
        AggregationKey {
            environment_id: environment_id.to_string(),
            flag_identifier,
            variation_identifier: attribute(&datum.attributes, ATTR_VARIATION_IDENTIFIER)
                .unwrap_or_default()
                .to_string(),
            sdk_language: attribute(&datum.attributes, ATTR_SDK_LANGUAGE)
                .unwrap_or_default()
                .to_string(),
            sdk_version: attribute(&datum.attributes, ATTR_SDK_VERSION)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Rewrites any `target` attribute on `datum` to [`GLOBAL_TARGET_SENTINEL`], used by
/// the target-analytics aggregation variant.
pub fn normalize_target_attribute(attributes: &mut Attributes) {
    for (k, v) in attributes.iter_mut() {
        if k == ATTR_TARGET {
            *v = GLOBAL_TARGET_SENTINEL.to_string();
        }
    }
}

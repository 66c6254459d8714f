use async_trait::async_trait;
use edge_core_types::{EdgeError, EdgeResult, MetricRecord};
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};
use std::time::Duration;
use tracing::{debug, warn};

lazy_static! {
    pub static ref METRICS_UPLOAD: IntCounterVec = register_int_counter_vec!(
        "edge_metrics_upload_total",
        "Number of attempts to upload a metrics batch to the upstream SaaS, by environment and outcome",
        &["environment", "error"]
    )
    .unwrap();
}

/// POSTs one environment's worth of aggregated metrics upstream. A single failed
/// POST only drops that batch; it is never retried by the reporter itself.
#[async_trait]
pub trait MetricsReporter: Send + Sync {
    async fn post_metrics(&self, record: &MetricRecord, cluster_id: &str) -> EdgeResult<()>;
}

pub struct ReqwestMetricsReporter {
    http_client: reqwest::Client,
    metrics_url_template: String,
    bearer_token: String,
}

impl ReqwestMetricsReporter {
    /// `metrics_url_template` must contain one `{environment}` placeholder, e.g.
    /// `https://saas.example.com/api/edge/metrics/{environment}`.
    pub fn new(metrics_url_template: String, bearer_token: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            metrics_url_template,
            bearer_token,
        }
    }

    fn url_for(&self, environment_id: &str) -> String {
        self.metrics_url_template
            .replace("{environment}", environment_id)
    }
}

#[async_trait]
impl MetricsReporter for ReqwestMetricsReporter {
    async fn post_metrics(&self, record: &MetricRecord, cluster_id: &str) -> EdgeResult<()> {
        debug!(
            environment = %record.environment_id,
            "posting metrics batch upstream"
        );
        let result = self
            .http_client
            .post(self.url_for(&record.environment_id))
            .bearer_auth(&self.bearer_token)
            .query(&[("cluster", cluster_id)])
            .timeout(Duration::from_secs(5))
            .json(record)
            .send()
            .await;

        let outcome = match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                let status = response.status();
                warn!(environment = %record.environment_id, %status, "metrics upload rejected by upstream");
                Err(EdgeError::TransportError(format!(
                    "upstream responded {status} for environment {}",
                    record.environment_id
                )))
            }
            Err(e) => {
                warn!(environment = %record.environment_id, error = %e, "metrics upload transport failure");
                Err(EdgeError::TransportError(e.to_string()))
            }
        };

        let error_label = if outcome.is_ok() { "false" } else { "true" };
        METRICS_UPLOAD
            .with_label_values(&[&record.environment_id, error_label])
            .inc();

        outcome
    }
}

//! Dispatcher configuration: queue and collection names, concurrency and failure handling.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use judge_dispatch_core::WireFormat;

/// What to do with a request whose compilation backend failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompileFailurePolicy {
    /// Publish the entity with `compile_status = backend_error` and the error
    /// text in `compile_error`, so the next stage can report it.
    #[default]
    Publish,
    /// Log the failure and publish nothing.
    Drop,
}

impl FromStr for CompileFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(Self::Publish),
            "drop" => Ok(Self::Drop),
            other => Err(anyhow::anyhow!("unknown compile failure policy: {other}")),
        }
    }
}

impl fmt::Display for CompileFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Publish => "publish",
            Self::Drop => "drop",
        })
    }
}

/// Dispatcher-level configuration.
///
/// Controls queue and collection names, concurrency and failure handling.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Queue compile requests are consumed from.
    pub inbound_queue: String,
    /// Queue compile results are published to.
    pub outbound_queue: String,
    /// Collection holding problem and contest submissions.
    pub graded_collection: String,
    /// Collection holding playground submissions.
    pub practice_collection: String,
    /// Maximum number of requests processed concurrently. 1 means sequential.
    pub max_in_flight: usize,
    pub compile_failure_policy: CompileFailurePolicy,
    /// Encoding of inbound requests and outbound results.
    pub wire_format: WireFormat,
    /// Drop requests whose `type` is in neither known family instead of
    /// routing them as practice.
    pub strict_request_types: bool,
    /// Serialize concurrent requests for the same submission id.
    pub serialize_per_submission: bool,
    /// How long the consume loop waits for in-flight requests on shutdown.
    pub drain_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            inbound_queue: "submission_requests".to_string(),
            outbound_queue: "processed_submission".to_string(),
            graded_collection: "submissions".to_string(),
            practice_collection: "playground_submissions".to_string(),
            max_in_flight: 8,
            compile_failure_policy: CompileFailurePolicy::Publish,
            wire_format: WireFormat::Json,
            strict_request_types: false,
            serialize_per_submission: false,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_queue_names() {
        let config = DispatcherConfig::default();
        assert_eq!(config.inbound_queue, "submission_requests");
        assert_eq!(config.outbound_queue, "processed_submission");
        assert_eq!(config.compile_failure_policy, CompileFailurePolicy::Publish);
        assert_eq!(config.wire_format, WireFormat::Json);
        assert!(!config.strict_request_types);
        assert!(!config.serialize_per_submission);
    }

    #[test]
    fn policy_parses() {
        assert_eq!("drop".parse::<CompileFailurePolicy>().unwrap(), CompileFailurePolicy::Drop);
        assert_eq!(
            "publish".parse::<CompileFailurePolicy>().unwrap(),
            CompileFailurePolicy::Publish
        );
        assert!("retry".parse::<CompileFailurePolicy>().is_err());
    }
}

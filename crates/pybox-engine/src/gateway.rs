//! Invocation gateway: the async entry point of the engine.
//!
//! The gateway sequences one invocation end to end (fresh execution
//! context, fresh capture channel, runner under deadline, fault
//! normalization, result assembly) and guarantees the caller always gets a
//! string back. Concurrency across invocations is bounded by a semaphore;
//! nothing is shared between them beyond the read-only interpreter
//! installation.

use crate::capture::CaptureChannel;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::fault::{Fault, FaultKind};
use crate::runner::{RunOutcome, Runner};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

// ============================================================================
// Statistics
// ============================================================================

/// Gateway counters for observability.
///
/// All counters are atomic and can be read without locking.
#[derive(Debug, Default)]
pub struct GatewayStats {
    /// Total invocations received.
    pub invocations: AtomicU64,
    /// Invocations that ran to completion.
    pub completed: AtomicU64,
    /// Invocations that ended in a parse fault.
    pub parse_faults: AtomicU64,
    /// Invocations that ended in a runtime fault.
    pub runtime_faults: AtomicU64,
    /// Invocations that ended in a resource fault.
    pub resource_faults: AtomicU64,
    /// Invocations that ended in an internal fault.
    pub internal_faults: AtomicU64,
}

impl GatewayStats {
    fn record(&self, fault: Option<&Fault>) {
        let counter = match fault.map(|f| f.kind) {
            None => &self.completed,
            Some(FaultKind::Parse) => &self.parse_faults,
            Some(FaultKind::Runtime) => &self.runtime_faults,
            Some(FaultKind::Resource) => &self.resource_faults,
            Some(FaultKind::Internal) => &self.internal_faults,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters for serialization.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            parse_faults: self.parse_faults.load(Ordering::Relaxed),
            runtime_faults: self.runtime_faults.load(Ordering::Relaxed),
            resource_faults: self.resource_faults.load(Ordering::Relaxed),
            internal_faults: self.internal_faults.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GatewayStats`].
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub invocations: u64,
    pub completed: u64,
    pub parse_faults: u64,
    pub runtime_faults: u64,
    pub resource_faults: u64,
    pub internal_faults: u64,
}

// ============================================================================
// Execution result
// ============================================================================

/// Structured outcome of one invocation.
///
/// `output` is everything the program wrote, in order; `fault` is present
/// when the invocation did not run to completion. The fault's diagnostic is
/// appended to the output when rendering text, never substituted for it.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    /// Captured output, possibly empty, possibly partial on fault.
    pub output: String,
    /// The fault that ended the invocation, if any.
    pub fault: Option<Fault>,
}

impl Execution {
    /// True if the invocation ran to completion.
    pub fn success(&self) -> bool {
        self.fault.is_none()
    }

    /// Assemble the single caller-facing string: captured output, with the
    /// diagnostic line appended after it on fault. Never absent; an
    /// invocation with no output yields an empty string.
    pub fn into_text(self) -> String {
        match self.fault {
            None => self.output,
            Some(fault) => {
                let mut text = self.output;
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&fault.message);
                text
            }
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Async entry point for executing untrusted source text.
///
/// # Thread Safety
///
/// `Gateway` is safe to share across tasks; wrap it in an `Arc` and call
/// [`execute`](Self::execute) concurrently. Each call gets its own context
/// and capture channel.
pub struct Gateway {
    config: EngineConfig,
    permits: Arc<Semaphore>,
    stats: Arc<GatewayStats>,
}

impl Gateway {
    /// Create a gateway over the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        tracing::info!(
            timeout_secs = config.timeout.as_secs(),
            max_concurrent = config.max_concurrent,
            max_output_bytes = config.max_output_bytes,
            "Creating gateway"
        );
        if config.resolved_interpreter().is_none() {
            tracing::warn!("No usable interpreter found; invocations will fault");
        }

        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            stats: Arc::new(GatewayStats::default()),
            config,
        }
    }

    /// Get the gateway configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the gateway statistics.
    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    /// Execute source text and return the single result string.
    ///
    /// Always resolves to a string: captured output on success, captured
    /// output plus a diagnostic line on fault. Never raises to the caller.
    pub async fn execute(&self, source: &str) -> String {
        self.run(source).await.into_text()
    }

    /// Execute source text and return the structured outcome.
    pub async fn run(&self, source: &str) -> Execution {
        self.stats.invocations.fetch_add(1, Ordering::Relaxed);

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                // Semaphore closed: cannot happen while the gateway is alive,
                // but degrade to a diagnostic rather than panic.
                let execution = Execution {
                    output: String::new(),
                    fault: Some(Fault::new(FaultKind::Internal, "execution failed")),
                };
                self.stats.record(execution.fault.as_ref());
                return execution;
            }
        };

        let start = std::time::Instant::now();

        let context = match ExecutionContext::create(&self.config) {
            Ok(context) => context,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create execution context");
                let execution = Execution {
                    output: String::new(),
                    fault: Some(Fault::new(
                        FaultKind::Internal,
                        format!("execution failed: {e}"),
                    )),
                };
                self.stats.record(execution.fault.as_ref());
                return execution;
            }
        };

        tracing::debug!(
            invocation_id = %context.id(),
            source_len = source.len(),
            "Invocation started"
        );

        let capture = Arc::new(CaptureChannel::new(self.config.max_output_bytes));
        let runner = Runner::new(&self.config);
        let outcome = runner.run(source, &context, &capture).await;
        let output = capture.output();

        let execution = match outcome {
            Ok(RunOutcome::Success) => Execution {
                output,
                fault: None,
            },
            Ok(RunOutcome::Fault(fault)) => Execution {
                output,
                fault: Some(fault),
            },
            Err(e) => {
                tracing::error!(invocation_id = %context.id(), error = %e, "Worker supervision failed");
                Execution {
                    output,
                    fault: Some(Fault::new(
                        FaultKind::Internal,
                        format!("execution failed: {e}"),
                    )),
                }
            }
        };

        self.stats.record(execution.fault.as_ref());

        match &execution.fault {
            None => tracing::info!(
                invocation_id = %context.id(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                output_len = execution.output.len(),
                "Invocation completed"
            ),
            Some(fault) => tracing::info!(
                invocation_id = %context.id(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                output_len = execution.output.len(),
                fault_kind = %fault.kind,
                fault_message = %fault.message,
                "Invocation faulted"
            ),
        }

        execution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = GatewayStats::default();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.invocations, 0);
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.parse_faults, 0);
        assert_eq!(snapshot.runtime_faults, 0);
        assert_eq!(snapshot.resource_faults, 0);
        assert_eq!(snapshot.internal_faults, 0);
    }

    #[test]
    fn test_stats_record_by_kind() {
        let stats = GatewayStats::default();
        stats.record(None);
        stats.record(Some(&Fault::new(FaultKind::Parse, "x")));
        stats.record(Some(&Fault::new(FaultKind::Runtime, "x")));
        stats.record(Some(&Fault::new(FaultKind::Resource, "x")));
        stats.record(Some(&Fault::new(FaultKind::Internal, "x")));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.parse_faults, 1);
        assert_eq!(snapshot.runtime_faults, 1);
        assert_eq!(snapshot.resource_faults, 1);
        assert_eq!(snapshot.internal_faults, 1);
    }

    #[test]
    fn test_into_text_success_is_output_only() {
        let execution = Execution {
            output: "hello\n".to_string(),
            fault: None,
        };
        assert!(execution.success());
        assert_eq!(execution.into_text(), "hello\n");
    }

    #[test]
    fn test_into_text_appends_diagnostic_after_partial_output() {
        let execution = Execution {
            output: "partial".to_string(),
            fault: Some(Fault::new(
                FaultKind::Runtime,
                "ZeroDivisionError: division by zero",
            )),
        };
        assert_eq!(
            execution.into_text(),
            "partial\nZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn test_into_text_empty_output_is_diagnostic_only() {
        let execution = Execution {
            output: String::new(),
            fault: Some(Fault::new(FaultKind::Parse, "SyntaxError: invalid syntax")),
        };
        assert_eq!(execution.into_text(), "SyntaxError: invalid syntax");
    }

    #[tokio::test]
    async fn test_missing_interpreter_degrades_to_diagnostic() {
        let config = EngineConfig::builder()
            .interpreter("/nonexistent/python3")
            .build()
            .expect("config is valid");
        let gateway = Gateway::new(config);

        let result = gateway.execute("print('unreachable')").await;
        assert!(result.contains("execution failed"));

        let snapshot = gateway.stats().snapshot();
        assert_eq!(snapshot.invocations, 1);
        assert_eq!(snapshot.internal_faults, 1);
    }
}

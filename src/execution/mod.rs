//! Fan-out/fan-in executor
//!
//! Runs the three specialists concurrently against one enriched query and
//! waits for all of them to settle. A specialist that errors, times out or
//! panics yields a zero-confidence result carrying the failure; the others
//! are never cancelled because of it. No retries happen here.

use crate::error::OrchestrationError;
use crate::models::{
    clamp_confidence, AnalysisContext, FailureKind, SpecialistResult, SpecialistResults,
    SpecialistRole,
};
use crate::specialists::Specialist;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct FanOutExecutor {
    macro_analyst: Arc<dyn Specialist>,
    technical_analyst: Arc<dyn Specialist>,
    sentiment_analyst: Arc<dyn Specialist>,
    timeout: Duration,
}

impl FanOutExecutor {
    pub fn new(
        macro_analyst: Arc<dyn Specialist>,
        technical_analyst: Arc<dyn Specialist>,
        sentiment_analyst: Arc<dyn Specialist>,
        timeout: Duration,
    ) -> Self {
        Self {
            macro_analyst,
            technical_analyst,
            sentiment_analyst,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn specialist(&self, role: SpecialistRole) -> &Arc<dyn Specialist> {
        match role {
            SpecialistRole::Macro => &self.macro_analyst,
            SpecialistRole::Technical => &self.technical_analyst,
            SpecialistRole::Sentiment => &self.sentiment_analyst,
        }
    }

    /// Run every specialist and return once all three have settled
    pub async fn run_all(&self, query: &str, context: &AnalysisContext) -> SpecialistResults {
        let started = Instant::now();
        let mut set = JoinSet::new();

        for role in SpecialistRole::ALL {
            let specialist = Arc::clone(self.specialist(role));
            let query = query.to_string();
            let context = context.clone();
            let timeout = self.timeout;

            set.spawn(async move { (role, run_one(role, specialist, query, context, timeout).await) });
        }

        let mut slots: [Option<SpecialistResult>; 3] = [None, None, None];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((role, result)) => slots[slot(role)] = Some(result),
                // run_one never panics outward; a JoinError here means the task was aborted
                Err(e) => warn!(error = %e, "Specialist task did not complete"),
            }
        }

        let [macro_slot, technical_slot, sentiment_slot] = slots;
        let fill = |role: SpecialistRole, slot: Option<SpecialistResult>| {
            slot.unwrap_or_else(|| {
                SpecialistResult::failed(role, FailureKind::Error, "specialist task aborted")
            })
        };

        let results = SpecialistResults {
            macro_analysis: fill(SpecialistRole::Macro, macro_slot),
            technical_analysis: fill(SpecialistRole::Technical, technical_slot),
            sentiment_analysis: fill(SpecialistRole::Sentiment, sentiment_slot),
        };

        info!(
            failed = results.failed_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Specialists settled"
        );

        results
    }
}

fn slot(role: SpecialistRole) -> usize {
    match role {
        SpecialistRole::Macro => 0,
        SpecialistRole::Technical => 1,
        SpecialistRole::Sentiment => 2,
    }
}

async fn run_one(
    role: SpecialistRole,
    specialist: Arc<dyn Specialist>,
    query: String,
    context: AnalysisContext,
    timeout: Duration,
) -> SpecialistResult {
    debug!(role = %role, "Dispatching specialist");

    let call = AssertUnwindSafe(tokio::time::timeout(
        timeout,
        specialist.analyze(&query, &context),
    ))
    .catch_unwind()
    .await;

    match call {
        Ok(Ok(Ok(result))) => normalize(role, result),
        Ok(Ok(Err(e))) => {
            warn!(role = %role, error = %e, "Specialist failed");
            SpecialistResult::failed(role, FailureKind::Error, e.to_string())
        }
        Ok(Err(_elapsed)) => {
            let e = OrchestrationError::SpecialistTimeout(timeout);
            warn!(role = %role, error = %e, "Specialist timed out");
            SpecialistResult::failed(role, FailureKind::Timeout, e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(role = %role, panic = %message, "Specialist panicked");
            SpecialistResult::failed(role, FailureKind::Panic, message)
        }
    }
}

/// Pin the result to the slot it was produced for and keep confidence in range
fn normalize(role: SpecialistRole, mut result: SpecialistResult) -> SpecialistResult {
    if result.role != role {
        debug!(expected = %role, reported = %result.role, "Specialist reported another role");
    }
    result.role = role;
    if result.agent_name.trim().is_empty() {
        result.agent_name = role.agent_name().to_string();
    }
    result.confidence = clamp_confidence(result.confidence);
    if result.is_failed() {
        result.confidence = 0.0;
    }
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "specialist panicked".to_string()
    }
}

//! Scriptable processor double for development and testing.

use crate::error::{PayrunError, Result};
use crate::processor::{PayoutProcessor, TransferOutcome, TransferRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// What the mock should do with the next new transfer request.
#[derive(Debug, Clone)]
enum ScriptedResponse {
    Reject { code: String, message: String },
    Unavailable { reason: String },
}

/// In-memory processor that honors idempotency keys.
///
/// Repeating a key replays the stored outcome without counting a new
/// execution, which is the contract real processors provide and the
/// reconciliation sweep depends on. Tests assert on
/// [`executions`](Self::executions) to prove no double payment happened,
/// and on [`requests`](Self::requests) to inspect what was sent.
#[derive(Default)]
pub struct MockProcessor {
    /// Outcomes by idempotency key; the replay table.
    completed: Mutex<HashMap<String, TransferOutcome>>,
    /// Responses scripted for upcoming new requests, consumed in order.
    script: Mutex<Vec<ScriptedResponse>>,
    /// Every request received, replays included.
    requests: Mutex<Vec<TransferRequest>>,
    /// Count of actual executions (replays excluded).
    executions: AtomicU64,
    ref_counter: AtomicU64,
}

impl MockProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next new request to be rejected.
    pub fn reject_next(&self, code: impl Into<String>, message: impl Into<String>) {
        self.script.lock().unwrap().push(ScriptedResponse::Reject {
            code: code.into(),
            message: message.into(),
        });
    }

    /// Script the next new request to fail with an unknown outcome.
    pub fn unavailable_next(&self, reason: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push(ScriptedResponse::Unavailable {
                reason: reason.into(),
            });
    }

    /// Every request received, in order, replays included.
    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// How many requests actually executed (idempotent replays excluded).
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayoutProcessor for MockProcessor {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        self.requests.lock().unwrap().push(request.clone());

        // Idempotency replay: a known key returns the prior result and
        // moves no money.
        if let Some(prior) = self
            .completed
            .lock()
            .unwrap()
            .get(&request.idempotency_key)
        {
            return Ok(prior.clone());
        }

        if let Some(scripted) = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                None
            } else {
                Some(script.remove(0))
            }
        } {
            return match scripted {
                ScriptedResponse::Reject { code, message } => Err(PayrunError::rejected(
                    request.idempotency_key.clone(),
                    code,
                    message,
                )),
                ScriptedResponse::Unavailable { reason } => Err(PayrunError::unavailable(
                    request.idempotency_key.clone(),
                    reason,
                )),
            };
        }

        let n = self.ref_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = TransferOutcome::paid(format!("po_mock_{}", n));
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.completed
            .lock()
            .unwrap()
            .insert(request.idempotency_key.clone(), outcome.clone());
        Ok(outcome)
    }
}

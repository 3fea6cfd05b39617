use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::core::client::compute::{ComputeEngine, ComputeError, ComputeRequest};

/// Compute engine that answers from a script, then with a default result.
#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<Value, String>>>,
    requests: Mutex<Vec<ComputeRequest>>,
    calls: AtomicUsize,
    gate: Option<Gate>,
}

/// Lets a test hold an execution open: `started` fires when the engine is
/// entered, the call returns only after `release`.
#[derive(Clone, Default)]
pub struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, result: Value) -> Self {
        self.push(Ok(result))
    }

    pub fn then_err(self, message: &str) -> Self {
        self.push(Err(message.to_string()))
    }

    /// Fails every call.
    pub fn always_failing(self, message: &str, times: usize) -> Self {
        (0..times).fold(self, |engine, _| engine.then_err(message))
    }

    pub fn gated(mut self) -> (Self, Gate) {
        let gate = Gate::default();
        self.gate = Some(gate.clone());
        (self, gate)
    }

    fn push(self, entry: Result<Value, String>) -> Self {
        self.script.lock().unwrap().push_back(entry);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ComputeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputeEngine for ScriptedEngine {
    async fn execute(&self, request: &ComputeRequest) -> Result<Value, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ComputeError::Engine { status: 500, message }),
            None => Ok(json!({"equity": [0.52, 0.48], "iterations": 10000})),
        }
    }

    async fn health_check(&self) -> Result<(), ComputeError> {
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generation service for deterministic testing.
//!
//! Window and task requests each pop outcomes from their own FIFO script.
//! An empty script answers with a success whose result reference is derived
//! from the request key.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use chronicler_core::{
    AdapterType, ChroniclerError, Credential, GenerationError, GenerationRequest,
    GenerationResponse, GenerationService, HealthStatus, PluginAdapter, RequestPurpose,
};

type Outcome = Result<GenerationResponse, GenerationError>;

/// One call the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub purpose: RequestPurpose,
    pub key: String,
    pub credential: String,
    /// Number of messages in a window request; `None` for tasks.
    pub message_count: Option<usize>,
    pub body: serde_json::Value,
}

#[derive(Default)]
pub struct MockGenerator {
    window_script: Mutex<VecDeque<Outcome>>,
    task_script: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<RecordedCall>>,
    overflow_above_messages: Option<usize>,
    max_request_bytes: Option<usize>,
    latency: Option<Duration>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window requests with more than `n` messages overflow without
    /// consuming a scripted outcome.
    pub fn overflow_above_messages(mut self, n: usize) -> Self {
        self.overflow_above_messages = Some(n);
        self
    }

    /// Advertises a request size limit so the caller can refuse oversized
    /// requests before calling.
    pub fn with_max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = Some(limit);
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn push_window_outcome(&self, outcome: Outcome) {
        self.window_script.lock().await.push_back(outcome);
    }

    pub async fn push_task_outcome(&self, outcome: Outcome) {
        self.task_script.lock().await.push_back(outcome);
    }

    /// Scripts `n` consecutive transient failures for window calls.
    pub async fn fail_windows_transiently(&self, n: usize) {
        let mut script = self.window_script.lock().await;
        for i in 0..n {
            script.push_back(Err(GenerationError::Transient(format!("scripted failure {}", i + 1))));
        }
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn window_calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.purpose == RequestPurpose::Window)
            .cloned()
            .collect()
    }

    pub async fn task_calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.purpose != RequestPurpose::Window)
            .cloned()
            .collect()
    }

    /// Result reference the mock reports for a request key by default.
    pub fn default_reference(key: &str) -> String {
        format!("mock://{key}")
    }

    async fn next_outcome(&self, request: &GenerationRequest) -> Outcome {
        let script = match request.purpose {
            RequestPurpose::Window => &self.window_script,
            RequestPurpose::Task(_) => &self.task_script,
        };
        script.lock().await.pop_front().unwrap_or_else(|| {
            Ok(GenerationResponse {
                result_reference: Self::default_reference(&request.key),
                artifacts: Vec::new(),
            })
        })
    }
}

fn message_count(request: &GenerationRequest) -> Option<usize> {
    match request.purpose {
        RequestPurpose::Window => request.body["messages"].as_array().map(Vec::len),
        RequestPurpose::Task(_) => None,
    }
}

#[async_trait]
impl PluginAdapter for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }

    async fn health_check(&self) -> Result<HealthStatus, ChroniclerError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl GenerationService for MockGenerator {
    fn max_request_bytes(&self) -> Option<usize> {
        self.max_request_bytes
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResponse, GenerationError> {
        let count = message_count(request);
        self.calls.lock().await.push(RecordedCall {
            purpose: request.purpose,
            key: request.key.clone(),
            credential: credential.name.clone(),
            message_count: count,
            body: request.body.clone(),
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let (Some(limit), Some(count)) = (self.overflow_above_messages, count) {
            if count > limit {
                return Err(GenerationError::Overflow {
                    request_bytes: request.serialized_len(),
                    limit: None,
                });
            }
        }
        self.next_outcome(request).await
    }
}

use crate::api::client::{ByteStream, MockBackend};
use crate::session::StopHandle;
use crate::types::{AssistantStatus, Message, QueryExecution};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};

/// Scripted backend for session tests: one list of raw byte chunks per turn,
/// a queue of execute-query outcomes, and an optional stop trigger fired
/// when a given chunk index is yielded.
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    executions: Arc<Mutex<Vec<Result<QueryExecution, String>>>>,
    executed_queries: Arc<Mutex<Vec<String>>>,
    status: AssistantStatus,
    stream_error: Option<String>,
    stop_before_chunk: Option<(StopHandle, usize)>,
}

impl MockApiClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            executions: Arc::new(Mutex::new(Vec::new())),
            executed_queries: Arc::new(Mutex::new(Vec::new())),
            status: AssistantStatus {
                enabled: true,
                configured: true,
            },
            stream_error: None,
            stop_before_chunk: None,
        }
    }

    pub fn with_executions(mut self, executions: Vec<Result<QueryExecution, String>>) -> Self {
        self.executions = Arc::new(Mutex::new(executions));
        self
    }

    pub fn with_status(mut self, enabled: bool, configured: bool) -> Self {
        self.status = AssistantStatus {
            enabled,
            configured,
        };
        self
    }

    pub fn with_stream_error(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }

    /// Fire `handle.stop()` when the stream yields the chunk at `index`;
    /// events decoded from that chunk onward must be suppressed.
    pub fn with_stop_before_chunk(mut self, handle: StopHandle, index: usize) -> Self {
        self.stop_before_chunk = Some((handle, index));
        self
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.executed_queries.lock().unwrap().clone()
    }
}

impl MockBackend for MockApiClient {
    fn status(&self) -> Result<AssistantStatus> {
        Ok(self.status.clone())
    }

    fn create_mock_stream(&self, _messages: &[Message]) -> Result<ByteStream> {
        if let Some(message) = &self.stream_error {
            return Err(anyhow!("{message}"));
        }

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow!("MockApiClient: no more responses configured"));
        }
        let chunks = responses_guard.remove(0);

        let stop_before_chunk = self.stop_before_chunk.clone();
        let stream = stream::iter(chunks.into_iter().enumerate()).map(move |(index, chunk)| {
            if let Some((handle, at)) = &stop_before_chunk {
                if index == *at {
                    handle.stop();
                }
            }
            Ok(Bytes::from(chunk))
        });

        Ok(Box::pin(stream))
    }

    fn execute_mock_query(&self, query: &str) -> Result<QueryExecution> {
        self.executed_queries.lock().unwrap().push(query.to_string());

        let mut executions_guard = self.executions.lock().unwrap();
        if executions_guard.is_empty() {
            return Err(anyhow!("MockApiClient: no execution outcome configured"));
        }
        executions_guard.remove(0).map_err(|message| anyhow!(message))
    }
}

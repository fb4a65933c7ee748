//! Workout backend client
//!
//! Posts finished workouts to `{base_url}/workouts` as JSON, with a bearer
//! token when one is configured. The same endpoint lists saved workouts.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{SinkError, WorkoutRecord, WorkoutRecordSink};

const USER_AGENT: &str = concat!("flexit-counter/", env!("CARGO_PKG_VERSION"));

/// HTTP sink for the workout backend
pub struct HttpRecordSink {
    http_client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpRecordSink {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, SinkError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/workouts", base_url.trim_end_matches('/')),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl WorkoutRecordSink for HttpRecordSink {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn save(&self, record: &WorkoutRecord) -> Result<(), SinkError> {
        debug!(url = %self.endpoint, exercise = %record.exercise_type, reps = record.reps, "Posting workout");

        let mut request = self.http_client.post(&self.endpoint).json(record);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SinkError::Api(status.as_u16(), error_text));
        }

        Ok(())
    }

    async fn history(&self) -> Result<Vec<WorkoutRecord>, SinkError> {
        debug!(url = %self.endpoint, "Fetching workout history");

        let mut request = self.http_client.get(&self.endpoint);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SinkError::Api(status.as_u16(), error_text));
        }

        response
            .json::<Vec<WorkoutRecord>>()
            .await
            .map_err(|e| SinkError::Network(format!("Invalid history response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let sink = HttpRecordSink::new("http://localhost:5000/api/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(sink.endpoint(), "http://localhost:5000/api/workouts");
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let sink = HttpRecordSink::new("http://localhost:5000/api", Some(String::new()), Duration::from_secs(1)).unwrap();
        assert!(sink.token.is_none());
    }
}

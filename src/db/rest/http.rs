//! Blocking HTTP transport for the Airtable REST API.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use super::RestTransport;
use crate::error::{EngineError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTransport {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(api_key: &str, endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::connection(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| EngineError::connection(format!("Airtable request failed: {e}")))?;
        let status = response.status();
        let body: Value = response.json().unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .or_else(|| body.get("error"))
                .map(|m| match m {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "no details".to_string());
            return Err(EngineError::execution(format!(
                "Airtable returned status {status}: {message}"
            )));
        }
        Ok(body)
    }
}

impl RestTransport for HttpTransport {
    fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        self.send(self.client.get(self.url(path)).query(query))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.post(self.url(path)).json(body))
    }

    fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.patch(self.url(path)).json(body))
    }

    fn delete(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        self.send(self.client.delete(self.url(path)).query(query))
    }
}

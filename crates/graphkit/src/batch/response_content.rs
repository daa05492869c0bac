//! Splitting a batch response into per-step responses

use crate::error::{Error, Result, ServiceError};
use crate::http::Response;
use crate::observability;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct BatchResponseEnvelope {
    #[serde(default)]
    responses: Option<Vec<BatchResponseItem>>,
}

#[derive(Debug, Deserialize)]
struct BatchResponseItem {
    id: String,
    #[serde(default)]
    status: serde_json::Value,
    #[serde(default)]
    headers: HashMap<String, serde_json::Value>,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct StepResponse {
    response: Response,
    /// Body arrived as a JSON string, which is how binary content is encoded.
    string_body: bool,
}

/// The per-step responses of one batch, keyed by step id.
///
/// The service may answer steps in any order; lookups are by id only.
#[derive(Debug, Clone, Default)]
pub struct BatchResponseContent {
    order: Vec<String>,
    responses: HashMap<String, StepResponse>,
}

impl BatchResponseContent {
    /// Parse the body of a `$batch` response.
    ///
    /// # Errors
    ///
    /// A non-success outer response becomes [`Error::Service`]; a body that is
    /// not a batch envelope becomes [`Error::Serialization`]. Failed steps are
    /// kept as responses and never fail parsing. A step whose status is not a
    /// valid HTTP status is kept as `502 Bad Gateway`.
    pub fn from_response(response: Response) -> Result<Self> {
        if let Some(err) = response.error() {
            return Err(err.into());
        }
        if response.body().is_empty() {
            return Ok(Self::default());
        }

        let envelope: BatchResponseEnvelope = serde_json::from_slice(response.body())?;
        let mut content = Self::default();
        let mut failed = 0;

        for item in envelope.responses.unwrap_or_default() {
            let status = step_status(&item.id, &item.status);
            if !status.is_success() {
                failed += 1;
                observability::log_batch_step_failed(&item.id, status.as_u16());
            }

            let mut headers = HeaderMap::new();
            for (name, value) in &item.headers {
                let Some(value) = header_text(value) else {
                    continue;
                };
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(&value),
                ) {
                    headers.insert(name, value);
                }
            }

            let (body, string_body) = match item.body {
                None | Some(serde_json::Value::Null) => (Bytes::new(), false),
                Some(serde_json::Value::String(text)) => (Bytes::from(text), true),
                Some(value) => (Bytes::from(serde_json::to_vec(&value)?), false),
            };

            content.insert(
                item.id,
                StepResponse {
                    response: Response::new(status, headers, body),
                    string_body,
                },
            );
        }

        observability::log_batch_parsed(content.len(), failed);
        Ok(content)
    }

    fn insert(&mut self, id: String, response: StepResponse) {
        if self.responses.insert(id.clone(), response).is_none() {
            self.order.push(id);
        }
    }

    /// Response of step `id`.
    pub fn get(&self, id: &str) -> Option<&Response> {
        self.responses.get(id).map(|step| &step.response)
    }

    /// Deserialize the body of step `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::StepNotFound`] if the batch has no such step
    /// - [`Error::Service`] with `step_id` set when the step failed
    pub fn get_typed<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let step = self
            .responses
            .get(id)
            .ok_or_else(|| Error::StepNotFound(id.to_string()))?;
        let response = &step.response;

        if !response.is_success() {
            let err = ServiceError::from_response(
                response.status().as_u16(),
                response.body(),
                response.headers(),
            )
            .with_step_id(id);
            return Err(err.into());
        }

        if step.string_body {
            return Ok(serde_json::from_value(serde_json::Value::String(
                response.text(),
            ))?);
        }
        response.json()
    }

    /// Raw body of step `id`, base64-decoded when it arrived as a string.
    ///
    /// Returns `Ok(None)` if the batch has no such step.
    pub fn get_stream(&self, id: &str) -> Result<Option<Bytes>> {
        let Some(step) = self.responses.get(id) else {
            return Ok(None);
        };
        let body = step.response.body();
        if step.string_body {
            return Ok(Some(Bytes::from(STANDARD.decode(body)?)));
        }
        Ok(Some(body.clone()))
    }

    /// Status of every step.
    pub fn status_codes(&self) -> HashMap<String, StatusCode> {
        self.responses
            .iter()
            .map(|(id, step)| (id.clone(), step.response.status()))
            .collect()
    }

    /// Step ids in the order the service returned them.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of step responses.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there are no step responses.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Move the responses of `other` into this one.
    pub(crate) fn merge(&mut self, other: BatchResponseContent) {
        let BatchResponseContent {
            order,
            mut responses,
        } = other;
        for id in order {
            if let Some(response) = responses.remove(&id) {
                self.insert(id, response);
            }
        }
    }
}

fn step_status(id: &str, status: &serde_json::Value) -> StatusCode {
    status
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or_else(|| {
            observability::log_batch_step_invalid_status(id, status);
            StatusCode::BAD_GATEWAY
        })
}

/// Header values may arrive as JSON numbers or booleans, e.g. `"Retry-After": 10`.
fn header_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

//! Batch request assembly and serialization

use super::step::BatchStep;
use crate::error::{Error, Result};
use crate::http::RequestInformation;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use graphkit_transport::{HttpRequest, RequestBody};
use http::{StatusCode, header};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// Maximum number of steps the service accepts in one batch.
pub const MAX_BATCH_STEPS: usize = 20;

/// API version segments removed from step URLs.
const VERSION_SEGMENTS: [&str; 2] = ["v1.0", "beta"];

/// An ordered set of batch steps sent as one `$batch` request.
///
/// Steps keep their insertion order; lookup by id is constant time.
///
/// # Examples
///
/// ```rust
/// use graphkit::batch::BatchRequestContent;
/// use graphkit::HttpRequest;
/// use graphkit::http::Method;
///
/// let mut batch = BatchRequestContent::default();
/// let me = HttpRequest::new(Method::GET, "https://graph.microsoft.com/v1.0/me".parse().unwrap());
/// let first = batch.add_request(me.clone(), &[]).unwrap();
/// batch.add_request(me, &[first.as_str()]).unwrap();
///
/// assert_eq!(batch.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchRequestContent {
    order: Vec<String>,
    steps: HashMap<String, BatchStep>,
}

impl BatchRequestContent {
    /// Build a batch from `steps`, validating each in order.
    ///
    /// # Errors
    ///
    /// Fails on the first step [`add_step`](Self::add_step) would reject; no
    /// partial batch is returned.
    pub fn new(steps: impl IntoIterator<Item = BatchStep>) -> Result<Self> {
        let mut batch = Self::default();
        for step in steps {
            batch.add_step(step)?;
        }
        Ok(batch)
    }

    /// Add a step.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyStepId`] for an empty id
    /// - [`Error::DuplicateStepId`] if the id is taken
    /// - [`Error::BatchCapacityExceeded`] when the batch holds [`MAX_BATCH_STEPS`]
    /// - [`Error::UnknownDependency`] if a dependency is not in the batch
    pub fn add_step(&mut self, step: BatchStep) -> Result<()> {
        self.validate(&step)?;
        self.order.push(step.id().to_string());
        self.steps.insert(step.id().to_string(), step);
        Ok(())
    }

    /// Add a step, returning false without changing the batch if it is rejected.
    pub fn try_add_step(&mut self, step: BatchStep) -> bool {
        self.add_step(step).is_ok()
    }

    /// Add a request under a generated id. Any `Authorization` header is dropped;
    /// the outer batch request carries the credentials.
    pub fn add_request(&mut self, mut request: HttpRequest, depends_on: &[&str]) -> Result<String> {
        request.headers.remove(header::AUTHORIZATION);
        let step = BatchStep::with_generated_id(request).depends_on(depends_on.iter().copied());
        let id = step.id().to_string();
        self.add_step(step)?;
        Ok(id)
    }

    /// Add a request descriptor under `id`, or under a generated id when `None`.
    pub fn add_request_information(
        &mut self,
        info: RequestInformation,
        id: Option<&str>,
    ) -> Result<String> {
        let mut request = info.into_http_request()?;
        request.headers.remove(header::AUTHORIZATION);
        let step = match id {
            Some(id) => BatchStep::new(id, request),
            None => BatchStep::with_generated_id(request),
        };
        let id = step.id().to_string();
        self.add_step(step)?;
        Ok(id)
    }

    /// Remove a step and every reference to it. Returns whether it existed.
    pub fn remove_step(&mut self, id: &str) -> bool {
        if self.steps.remove(id).is_none() {
            return false;
        }
        self.order.retain(|existing| existing != id);
        for step in self.steps.values_mut() {
            step.remove_dependency(id);
        }
        true
    }

    /// Look up a step by id.
    pub fn get(&self, id: &str) -> Option<&BatchStep> {
        self.steps.get(id)
    }

    /// Whether a step with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }

    /// Steps in insertion order.
    pub fn steps(&self) -> impl Iterator<Item = &BatchStep> {
        self.order.iter().filter_map(|id| self.steps.get(id))
    }

    /// Step ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the batch has no steps.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether another step fits.
    pub fn is_full(&self) -> bool {
        self.len() >= MAX_BATCH_STEPS
    }

    /// A new batch holding only the steps whose status is not a success.
    ///
    /// Steps missing from `statuses` are left out. Dependencies on steps that
    /// are not carried over are dropped.
    pub fn new_batch_with_failed_requests(
        &self,
        statuses: &HashMap<String, StatusCode>,
    ) -> Result<Self> {
        let failed = |id: &str| statuses.get(id).is_some_and(|status| !status.is_success());

        let mut batch = Self::default();
        for step in self.steps().filter(|step| failed(step.id())) {
            let mut step = step.clone();
            step.retain_dependencies(|dep| failed(dep));
            batch.add_step(step)?;
        }
        Ok(batch)
    }

    /// The `{"requests": [...]}` envelope as a JSON value.
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.envelope()?)?)
    }

    /// The `{"requests": [...]}` envelope as bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.envelope()?)?)
    }

    fn envelope(&self) -> Result<BatchRequestEnvelope> {
        let requests = self
            .steps()
            .map(BatchRequestItem::from_step)
            .collect::<Result<Vec<_>>>()?;
        Ok(BatchRequestEnvelope { requests })
    }

    fn validate(&self, step: &BatchStep) -> Result<()> {
        if step.id().is_empty() {
            return Err(Error::EmptyStepId);
        }
        if self.contains(step.id()) {
            return Err(Error::DuplicateStepId(step.id().to_string()));
        }
        if self.is_full() {
            return Err(Error::BatchCapacityExceeded {
                max: MAX_BATCH_STEPS,
            });
        }
        if let Some(missing) = step.dependencies().iter().find(|dep| !self.contains(dep)) {
            return Err(Error::UnknownDependency {
                step_id: step.id().to_string(),
                dependency: missing.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct BatchRequestEnvelope {
    requests: Vec<BatchRequestItem>,
}

#[derive(Debug, Serialize)]
struct BatchRequestItem {
    id: String,
    url: String,
    method: String,
    #[serde(rename = "dependsOn", skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<serde_json::Value>,
}

impl BatchRequestItem {
    fn from_step(step: &BatchStep) -> Result<Self> {
        let request = step.request();

        let mut headers = BTreeMap::new();
        for name in request.headers.keys() {
            if name == header::AUTHORIZATION {
                continue;
            }
            let values = request
                .headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>();
            headers.insert(canonical_header_name(name.as_str()), values.join(", "));
        }

        let body = match &request.body {
            RequestBody::Empty => None,
            RequestBody::Buffered(bytes) if bytes.is_empty() => None,
            RequestBody::Buffered(bytes) if is_json(request) => Some(serde_json::from_slice(bytes)?),
            RequestBody::Buffered(bytes) => Some(serde_json::Value::String(STANDARD.encode(bytes))),
            RequestBody::Streaming(_) => {
                return Err(Error::InvalidArgument(format!(
                    "step '{}' has a streaming body, which cannot be embedded in a batch",
                    step.id()
                )));
            }
        };

        Ok(Self {
            id: step.id().to_string(),
            url: service_relative_url(&request.url),
            method: request.method.as_str().to_string(),
            depends_on: step.dependencies().to_vec(),
            headers,
            body,
        })
    }
}

/// `content-type` -> `Content-Type`. `http` stores names lowercased.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn is_json(request: &HttpRequest) -> bool {
    request
        .header(header::CONTENT_TYPE.as_str())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

/// Strip scheme, host and a leading API version segment, keeping the query.
///
/// `https://graph.microsoft.com/v1.0/me/messages?$top=5` becomes
/// `/me/messages?$top=5`.
pub(crate) fn service_relative_url(url: &Url) -> String {
    let path = url.path();
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let (first, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));

    let mut relative = if VERSION_SEGMENTS.contains(&first) {
        format!("/{rest}")
    } else {
        path.to_string()
    };

    if let Some(query) = url.query() {
        relative.push('?');
        relative.push_str(query);
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn get(url: &str) -> HttpRequest {
        HttpRequest::new(Method::GET, url.parse().unwrap())
    }

    fn me() -> HttpRequest {
        get("https://graph.microsoft.com/v1.0/me")
    }

    #[rstest]
    #[case("https://graph.microsoft.com/v1.0/me", "/me")]
    #[case("https://graph.microsoft.com/beta/users?$top=5", "/users?$top=5")]
    #[case("https://graph.microsoft.com/v1.0", "/")]
    #[case("https://graph.microsoft.com/me/drive", "/me/drive")]
    fn test_service_relative_url(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(service_relative_url(&url.parse().unwrap()), expected);
    }

    #[test]
    fn test_exact_serialization() {
        let post = HttpRequest::new(Method::POST, "https://graph.microsoft.com/v1.0/me".parse().unwrap());
        let batch = BatchRequestContent::new([
            BatchStep::new("1", me()),
            BatchStep::new("2", post).depends_on(["1"]),
        ])
        .unwrap();

        let json = String::from_utf8(batch.to_json_bytes().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"requests":[{"id":"1","url":"/me","method":"GET"},{"id":"2","url":"/me","method":"POST","dependsOn":["1"]}]}"#
        );
    }

    #[test]
    fn test_json_body_nested_and_binary_body_base64() {
        let json = HttpRequest::new(Method::POST, "https://graph.microsoft.com/v1.0/me/messages".parse().unwrap())
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"))
            .with_body(br#"{"subject":"Hello"}"#.to_vec());
        let binary = HttpRequest::new(Method::PUT, "https://graph.microsoft.com/v1.0/me/photo/$value".parse().unwrap())
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"))
            .with_body(vec![0xff, 0xd8, 0xff]);

        let batch = BatchRequestContent::new([BatchStep::new("1", json), BatchStep::new("2", binary)]).unwrap();
        let value = batch.to_json_value().unwrap();

        assert_eq!(value["requests"][0]["body"], serde_json::json!({"subject": "Hello"}));
        assert_eq!(
            value["requests"][0]["headers"]["Content-Type"],
            "application/json; charset=utf-8"
        );
        assert_eq!(value["requests"][1]["body"], "/9j/");
        assert_eq!(value["requests"][1]["url"], "/me/photo/$value");
    }

    #[test]
    fn test_step_header_names_canonical() {
        let request = me()
            .with_header(header::IF_MATCH, HeaderValue::from_static("W/\"1\""))
            .with_header(
                header::HeaderName::from_static("consistencylevel"),
                HeaderValue::from_static("eventual"),
            );
        let batch = BatchRequestContent::new([BatchStep::new("1", request)]).unwrap();
        let value = batch.to_json_value().unwrap();

        let headers = value["requests"][0]["headers"].as_object().unwrap();
        assert_eq!(headers["If-Match"], "W/\"1\"");
        assert_eq!(headers["Consistencylevel"], "eventual");
        assert!(!headers.contains_key("if-match"));
        assert_eq!(canonical_header_name("x-ms-client-request-id"), "X-Ms-Client-Request-Id");
    }

    #[test]
    fn test_dangling_dependency_fails_construction() {
        let result = BatchRequestContent::new([BatchStep::new("2", me()).depends_on(["1"])]);
        match result {
            Err(Error::UnknownDependency { step_id, dependency }) => {
                assert_eq!(step_id, "2");
                assert_eq!(dependency, "1");
            }
            other => panic!("Expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_and_duplicate_ids() {
        let mut batch = BatchRequestContent::default();
        assert!(matches!(batch.add_step(BatchStep::new("", me())), Err(Error::EmptyStepId)));

        batch.add_step(BatchStep::new("1", me())).unwrap();
        assert!(matches!(
            batch.add_step(BatchStep::new("1", me())),
            Err(Error::DuplicateStepId(id)) if id == "1"
        ));
    }

    #[test]
    fn test_capacity() {
        let mut batch = BatchRequestContent::default();
        for i in 0..MAX_BATCH_STEPS {
            assert!(batch.try_add_step(BatchStep::new(i.to_string(), me())));
        }

        assert!(!batch.try_add_step(BatchStep::new("extra", me())));
        assert_eq!(batch.len(), MAX_BATCH_STEPS);
        assert!(!batch.contains("extra"));
        assert!(matches!(
            batch.add_step(BatchStep::new("extra", me())),
            Err(Error::BatchCapacityExceeded { max: 20 })
        ));
    }

    #[test]
    fn test_remove_cleans_dependencies() {
        let mut batch = BatchRequestContent::new([
            BatchStep::new("1", me()),
            BatchStep::new("2", me()).depends_on(["1"]),
            BatchStep::new("3", me()).depends_on(["1", "2"]),
        ])
        .unwrap();

        assert!(batch.remove_step("1"));
        assert!(!batch.remove_step("1"));

        assert_eq!(batch.ids().collect::<Vec<_>>(), vec!["2", "3"]);
        assert!(batch.get("2").unwrap().dependencies().is_empty());
        assert_eq!(batch.get("3").unwrap().dependencies(), ["2"]);
    }

    #[test]
    fn test_add_request_strips_authorization() {
        let mut batch = BatchRequestContent::default();
        let request = me().with_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        let id = batch.add_request(request, &[]).unwrap();

        assert!(batch.get(&id).unwrap().request().header("authorization").is_none());
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_add_request_information_with_id() {
        let mut batch = BatchRequestContent::default();
        let info = RequestInformation::new(Method::GET, "{+baseurl}/users/{id}")
            .path_parameter("baseurl", "https://graph.microsoft.com/v1.0")
            .path_parameter("id", "42");

        let id = batch.add_request_information(info, Some("user")).unwrap();

        assert_eq!(id, "user");
        assert_eq!(batch.to_json_value().unwrap()["requests"][0]["url"], "/users/42");
    }

    #[test]
    fn test_streaming_body_cannot_be_serialized() {
        let request = me().with_body(RequestBody::from_stream(futures::stream::empty()));
        let batch = BatchRequestContent::new([BatchStep::new("1", request)]).unwrap();
        assert!(matches!(batch.to_json_bytes(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_new_batch_with_failed_requests() {
        let batch = BatchRequestContent::new([
            BatchStep::new("1", me()),
            BatchStep::new("2", me()).depends_on(["1"]),
            BatchStep::new("3", me()).depends_on(["2"]),
        ])
        .unwrap();

        let statuses = HashMap::from([
            ("1".to_string(), StatusCode::OK),
            ("2".to_string(), StatusCode::TOO_MANY_REQUESTS),
            ("3".to_string(), StatusCode::FAILED_DEPENDENCY),
        ]);

        let retry = batch.new_batch_with_failed_requests(&statuses).unwrap();
        assert_eq!(retry.ids().collect::<Vec<_>>(), vec!["2", "3"]);
        assert!(retry.get("2").unwrap().dependencies().is_empty());
        assert_eq!(retry.get("3").unwrap().dependencies(), ["2"]);
    }
}

//! A single sub-request of a batch

use graphkit_transport::HttpRequest;

/// One logical request inside a batch.
///
/// `depends_on` lists the steps the service must complete before this one.
/// Duplicate dependencies are collapsed, first occurrence wins the position.
#[derive(Debug, Clone)]
pub struct BatchStep {
    id: String,
    request: HttpRequest,
    depends_on: Vec<String>,
}

impl BatchStep {
    /// Create an independent step.
    pub fn new(id: impl Into<String>, request: HttpRequest) -> Self {
        Self {
            id: id.into(),
            request,
            depends_on: Vec::new(),
        }
    }

    /// Create a step with a random UUID v4 id.
    pub fn with_generated_id(request: HttpRequest) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), request)
    }

    /// Add dependencies on other steps of the same batch.
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.add_dependency(id);
        }
        self
    }

    /// Add one dependency; returns false if it was already present.
    pub fn add_dependency(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.depends_on.contains(&id) {
            return false;
        }
        self.depends_on.push(id);
        true
    }

    /// Drop a dependency; returns whether it was present.
    pub fn remove_dependency(&mut self, id: &str) -> bool {
        let before = self.depends_on.len();
        self.depends_on.retain(|dep| dep != id);
        self.depends_on.len() != before
    }

    /// Step id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The sub-request.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Ids this step depends on, in insertion order.
    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub(crate) fn retain_dependencies(&mut self, keep: impl Fn(&str) -> bool) {
        self.depends_on.retain(|dep| keep(dep));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request() -> HttpRequest {
        HttpRequest::new(Method::GET, "https://graph.microsoft.com/v1.0/me".parse().unwrap())
    }

    #[test]
    fn test_dependencies_deduplicated_in_order() {
        let step = BatchStep::new("3", request()).depends_on(["2", "1", "2"]);
        assert_eq!(step.dependencies(), ["2", "1"]);
    }

    #[test]
    fn test_remove_dependency() {
        let mut step = BatchStep::new("3", request()).depends_on(["1", "2"]);
        assert!(step.remove_dependency("1"));
        assert!(!step.remove_dependency("1"));
        assert_eq!(step.dependencies(), ["2"]);
    }

    #[test]
    fn test_generated_id_is_uuid() {
        let step = BatchStep::with_generated_id(request());
        assert!(uuid::Uuid::parse_str(step.id()).is_ok());
    }
}

//! Packing any number of steps into successive batches

use super::request_content::{BatchRequestContent, MAX_BATCH_STEPS};
use super::step::BatchStep;
use crate::error::{Error, Result};
use crate::http::RequestInformation;
use graphkit_transport::HttpRequest;
use http::{StatusCode, header};
use std::collections::HashMap;

/// A sequence of batches filled greedily: a new batch opens once the current
/// one holds `batch_size` steps.
///
/// Dependencies must resolve inside the batch a step lands in.
#[derive(Debug, Clone)]
pub struct BatchRequestContentCollection {
    batches: Vec<BatchRequestContent>,
    batch_size: usize,
}

impl Default for BatchRequestContentCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRequestContentCollection {
    /// Create a collection using the maximum batch size.
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
            batch_size: MAX_BATCH_STEPS,
        }
    }

    /// Create a collection with at most `batch_size` steps per batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless `1 <= batch_size <= 20`.
    pub fn with_batch_size(batch_size: usize) -> Result<Self> {
        if !(1..=MAX_BATCH_STEPS).contains(&batch_size) {
            return Err(Error::InvalidArgument(format!(
                "batch size must be between 1 and {MAX_BATCH_STEPS}, got {batch_size}"
            )));
        }
        Ok(Self {
            batches: Vec::new(),
            batch_size,
        })
    }

    /// Add a step to the current batch, opening a new one when it is full.
    pub fn add_step(&mut self, step: BatchStep) -> Result<()> {
        if step.id().is_empty() {
            return Err(Error::EmptyStepId);
        }
        if self.contains(step.id()) {
            return Err(Error::DuplicateStepId(step.id().to_string()));
        }

        match self.batches.last_mut() {
            Some(current) if current.len() < self.batch_size => current.add_step(step),
            _ => {
                let mut batch = BatchRequestContent::default();
                batch.add_step(step)?;
                self.batches.push(batch);
                Ok(())
            }
        }
    }

    /// Add a request under a generated id.
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

    /// Remove a step from whichever batch holds it. Empty batches are dropped.
    pub fn remove_step(&mut self, id: &str) -> bool {
        let removed = self.batches.iter_mut().any(|batch| batch.remove_step(id));
        if removed {
            self.batches.retain(|batch| !batch.is_empty());
        }
        removed
    }

    /// Whether any batch holds a step with `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.batches.iter().any(|batch| batch.contains(id))
    }

    /// The physical batches in send order.
    pub fn batches(&self) -> &[BatchRequestContent] {
        &self.batches
    }

    /// All steps in insertion order.
    pub fn steps(&self) -> impl Iterator<Item = &BatchStep> {
        self.batches.iter().flat_map(|batch| batch.steps())
    }

    /// Total number of steps.
    pub fn len(&self) -> usize {
        self.batches.iter().map(BatchRequestContent::len).sum()
    }

    /// Whether there are no steps.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Maximum steps per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// A new collection holding only the steps whose status is not a success.
    ///
    /// Each batch is filtered on its own, so retained dependencies stay in the
    /// same batch as the steps that need them.
    pub fn new_batch_with_failed_requests(
        &self,
        statuses: &HashMap<String, StatusCode>,
    ) -> Result<Self> {
        let mut batches = Vec::new();
        for batch in &self.batches {
            let failed = batch.new_batch_with_failed_requests(statuses)?;
            if !failed.is_empty() {
                batches.push(failed);
            }
        }
        Ok(Self {
            batches,
            batch_size: self.batch_size,
        })
    }
}

//! The `$batch` endpoint

use crate::batch::{
    BatchRequestContent, BatchRequestContentCollection, BatchResponseContent,
    BatchResponseContentCollection,
};
use crate::client::GraphClient;
use crate::error::{Error, Result};
use crate::http::{FeatureFlags, RequestInformation};
use http::{HeaderValue, Method, header};
use tokio_util::sync::CancellationToken;

/// Sends JSON batches.
#[derive(Clone)]
pub struct Batches {
    client: GraphClient,
}

impl Batches {
    pub(crate) fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Send one batch.
    ///
    /// # Errors
    ///
    /// Fails for an empty batch, when the batch cannot be serialized, or when
    /// the `$batch` call itself fails. Failed steps are not errors; inspect
    /// them through the returned [`BatchResponseContent`].
    pub async fn post(&self, batch: &BatchRequestContent) -> Result<BatchResponseContent> {
        self.post_with_cancellation(batch, &CancellationToken::new())
            .await
    }

    /// Send one batch, aborting when `cancellation` fires.
    pub async fn post_with_cancellation(
        &self,
        batch: &BatchRequestContent,
        cancellation: &CancellationToken,
    ) -> Result<BatchResponseContent> {
        if batch.is_empty() {
            return Err(Error::InvalidArgument("batch has no steps".to_string()));
        }

        let mut info = RequestInformation::new(Method::POST, "{+baseurl}/$batch")
            .path_parameter("baseurl", self.client.service_root());
        info.headers
            .insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        info.set_content(
            batch.to_json_bytes()?,
            HeaderValue::from_static("application/json"),
        );

        tracing::debug!(steps = batch.len(), "Sending batch");

        let response = self
            .client
            .send_request(info.into_http_request()?, cancellation, FeatureFlags::BATCH_REQUEST)
            .await?;
        BatchResponseContent::from_response(response)
    }

    /// Send every batch of `collection`, one after another, and merge the responses.
    pub async fn post_collection(
        &self,
        collection: &BatchRequestContentCollection,
    ) -> Result<BatchResponseContentCollection> {
        self.post_collection_with_cancellation(collection, &CancellationToken::new())
            .await
    }

    /// Send every batch of `collection`, aborting when `cancellation` fires.
    ///
    /// Stops at the first batch whose `$batch` call fails.
    pub async fn post_collection_with_cancellation(
        &self,
        collection: &BatchRequestContentCollection,
        cancellation: &CancellationToken,
    ) -> Result<BatchResponseContentCollection> {
        let mut responses = BatchResponseContentCollection::new();
        for batch in collection.batches() {
            responses.push(self.post_with_cancellation(batch, cancellation).await?);
        }
        Ok(responses)
    }
}

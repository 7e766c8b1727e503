//! State transitions for CSR requests using the typestate pattern.
//!
//! Each request state is represented as a distinct type parameter on
//! `Request<State>`, so only the transitions valid for the current state can be
//! called:
//!
//! ```text
//! Request<RequestReceived> ──mark_sent()──────────> Request<SentToProvider>
//!          ^                                                │
//!          └──────────────revert()──────────────────────────┤
//!                                                           └──record_response()──> Request<ResponseReceived>
//!                                                                                           │
//!                                                           Request<Completed> <──forward()─┘
//! ```
//!
//! # Dispatch
//!
//! [`dispatch_batch`] moves every request of one provider together: the batch
//! is stamped, handed to the [`ProviderGateway`], and persisted in a single
//! `persist_many` call only once the provider accepted it. If the provider is
//! unreachable the stamped batch is reverted in memory and nothing is written,
//! so the store still shows `RequestReceived` with no `sentToProvider` stamp.
//!
//! # Forward
//!
//! `forward()` delivers the response to the station first and persists
//! `Completed` afterwards; a failed delivery leaves the stored request in
//! `ResponseReceived`.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::domain::provider::ServiceProvider;
use crate::error::{CsrError, Result};
use crate::gateway::{ProviderGateway, StationGateway};
use crate::storage::Storage;

use super::state::{
    AnyRequest, Completed, Request, RequestData, RequestReceived, ResponseReceived,
    SentToProvider,
};

impl Request<RequestReceived> {
    /// Stamp the request as sent. Never earlier than the time it was received.
    pub fn mark_sent(self, sent_at: DateTime<Utc>) -> Request<SentToProvider> {
        Request {
            state: SentToProvider {
                received_at: self.state.received_at,
                sent_at: sent_at.max(self.state.received_at),
            },
            data: self.data,
        }
    }
}

impl Request<SentToProvider> {
    /// Undo a dispatch that the provider never accepted, dropping the sent stamp.
    pub fn revert(self) -> Request<RequestReceived> {
        Request {
            state: RequestReceived {
                received_at: self.state.received_at,
            },
            data: self.data,
        }
    }

    /// Attach the provider's reply and move the request to review.
    #[tracing::instrument(skip(self, provider_response, storage), fields(request_id = %self.data.id, provider = %self.data.service_provider))]
    pub async fn record_response<S: Storage + ?Sized>(
        self,
        provider_response: String,
        storage: &S,
    ) -> Result<Request<ResponseReceived>> {
        let request = Request {
            state: ResponseReceived {
                received_at: self.state.received_at,
                sent_at: self.state.sent_at,
                response_received_at: Utc::now().max(self.state.sent_at),
                provider_response,
            },
            data: self.data,
        };
        storage.persist(&request).await?;

        counter!(
            "csrdesk_responses_received_total",
            "provider" => request.data.service_provider.as_str()
        )
        .increment(1);
        tracing::info!("Provider response recorded");

        Ok(request)
    }
}

impl Request<ResponseReceived> {
    /// Deliver the reviewed response to the originating station and complete the request.
    ///
    /// Returns `ForwardFailed` if delivery fails; the stored request is left untouched.
    #[tracing::instrument(skip(self, gateway, storage), fields(request_id = %self.data.id))]
    pub async fn forward<S, G>(self, gateway: &G, storage: &S) -> Result<Request<Completed>>
    where
        S: Storage + ?Sized,
        G: StationGateway + ?Sized,
    {
        if let Err(e) = gateway
            .deliver(&self.data, &self.state.provider_response)
            .await
        {
            counter!(
                "csrdesk_forward_failures_total",
                "provider" => self.data.service_provider.as_str()
            )
            .increment(1);
            tracing::warn!(error = %e, "Delivery to station failed, request stays in review");
            return Err(CsrError::ForwardFailed {
                id: self.data.id,
                reason: e.to_string(),
            });
        }

        let request = Request {
            state: Completed {
                received_at: self.state.received_at,
                sent_at: self.state.sent_at,
                response_received_at: self.state.response_received_at,
                forwarded_at: Utc::now().max(self.state.response_received_at),
                provider_response: self.state.provider_response,
            },
            data: self.data,
        };
        storage.persist(&request).await?;

        counter!(
            "csrdesk_responses_forwarded_total",
            "provider" => request.data.service_provider.as_str()
        )
        .increment(1);

        Ok(request)
    }
}

/// Send every request in `batch` to `provider` as one consolidated dispatch.
///
/// An empty batch is a no-op: the gateway is not called and nothing is stamped.
/// On success the whole batch is persisted as `SentToProvider` in one step. On
/// failure the batch is reverted and `ProviderUnreachable` is returned.
#[tracing::instrument(skip(batch, gateway, storage), fields(count = batch.len()))]
pub async fn dispatch_batch<S, G>(
    provider: ServiceProvider,
    batch: Vec<Request<RequestReceived>>,
    gateway: &G,
    storage: &S,
) -> Result<Vec<Request<SentToProvider>>>
where
    S: Storage + ?Sized,
    G: ProviderGateway + ?Sized,
{
    if batch.is_empty() {
        tracing::debug!("No pending requests, nothing to dispatch");
        return Ok(Vec::new());
    }

    let sent_at = Utc::now();
    let sent: Vec<Request<SentToProvider>> =
        batch.into_iter().map(|r| r.mark_sent(sent_at)).collect();
    let payload: Vec<RequestData> = sent.iter().map(|r| r.data.clone()).collect();

    match gateway.dispatch(provider, &payload).await {
        Ok(receipt) => {
            storage
                .persist_many(sent.iter().cloned().map(AnyRequest::from).collect())
                .await?;

            counter!(
                "csrdesk_requests_dispatched_total",
                "provider" => provider.as_str()
            )
            .increment(sent.len() as u64);
            tracing::info!(accepted = receipt.accepted, "Batch dispatched to provider");

            Ok(sent)
        }
        Err(e) => {
            let reverted: Vec<Request<RequestReceived>> =
                sent.into_iter().map(Request::revert).collect();

            counter!(
                "csrdesk_dispatch_failures_total",
                "provider" => provider.as_str()
            )
            .increment(1);
            tracing::warn!(
                error = %e,
                rolled_back = reverted.len(),
                "Provider unreachable, dispatch rolled back"
            );

            Err(CsrError::ProviderUnreachable {
                provider,
                reason: e.to_string(),
            })
        }
    }
}

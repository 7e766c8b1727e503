//! Response reviewer: provider responses awaiting review, and per-request forwarding.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::activity::{Activity, ActivityGuard, ActivityTracker};
use crate::error::{CsrError, Result};
use crate::gateway::StationGateway;
use crate::notify::{Notification, Notifier};
use crate::request::{AnyRequest, Completed, Request, RequestId, RequestStatus, ResponseReceived};
use crate::storage::{RequestFilter, Storage};

/// Requests with a provider response awaiting review, in collection order.
pub fn list_awaiting_review(requests: &[AnyRequest]) -> Vec<Request<ResponseReceived>> {
    requests
        .iter()
        .filter_map(AnyRequest::as_response_received)
        .cloned()
        .collect()
}

/// Projection of the store for the response review screen.
///
/// Forwarded requests stay in the store as `Completed`; they simply stop
/// matching the review filter.
pub struct ResponseReviewer<S, G> {
    storage: Arc<S>,
    gateway: Arc<G>,
    activity: Arc<ActivityTracker>,
    notifier: Notifier,
}

impl<S, G> ResponseReviewer<S, G>
where
    S: Storage + 'static,
    G: StationGateway + 'static,
{
    pub fn new(
        storage: Arc<S>,
        gateway: Arc<G>,
        activity: Arc<ActivityTracker>,
        notifier: Notifier,
    ) -> Self {
        Self {
            storage,
            gateway,
            activity,
            notifier,
        }
    }

    pub async fn list_awaiting_review(&self) -> Result<Vec<Request<ResponseReceived>>> {
        let requests = self
            .storage
            .list(RequestFilter::with_status(RequestStatus::ResponseReceived))
            .await?;
        Ok(list_awaiting_review(&requests))
    }

    pub async fn awaiting_count(&self) -> Result<usize> {
        Ok(self.list_awaiting_review().await?.len())
    }

    /// Full provider response text of one request.
    pub async fn response_for(&self, id: &RequestId) -> Result<String> {
        let request = self.storage.get(id).await?;
        request
            .provider_response()
            .map(str::to_string)
            .ok_or_else(|| {
                CsrError::InvalidState(
                    id.clone(),
                    request.status().to_string(),
                    RequestStatus::ResponseReceived.to_string(),
                )
            })
    }

    /// Whether a forward of `id` is in flight (its forward control is busy).
    pub fn is_forwarding(&self, id: &RequestId) -> bool {
        self.activity.is_active(&Activity::Forwarding(id.clone()))
    }

    /// Forward the response of `id` to its police station and wait for the outcome.
    pub async fn forward(&self, id: &RequestId) -> Result<Request<Completed>> {
        let guard = self.activity.begin(Activity::Forwarding(id.clone()))?;
        Self::run_forward(
            id.clone(),
            guard,
            self.storage.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
        .await
    }

    /// Start a forward in the background. The request is marked busy before this returns.
    pub fn start_forward(&self, id: &RequestId) -> Result<JoinHandle<Result<Request<Completed>>>> {
        let guard = self.activity.begin(Activity::Forwarding(id.clone()))?;
        Ok(tokio::spawn(Self::run_forward(
            id.clone(),
            guard,
            self.storage.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )))
    }

    #[tracing::instrument(skip(guard, storage, gateway, notifier), fields(request_id = %id))]
    async fn run_forward(
        id: RequestId,
        guard: ActivityGuard,
        storage: Arc<S>,
        gateway: Arc<G>,
        notifier: Notifier,
    ) -> Result<Request<Completed>> {
        let _guard = guard;

        let request = storage.get(&id).await?;
        let status = request.status();
        let Some(responded) = request.into_response_received() else {
            tracing::warn!(%status, "Request is not awaiting review");
            return Err(CsrError::InvalidState(
                id,
                status.to_string(),
                RequestStatus::ResponseReceived.to_string(),
            ));
        };
        let reference_id = responded.data.reference_id.clone();

        match responded.forward(gateway.as_ref(), storage.as_ref()).await {
            Ok(completed) => {
                tracing::info!(%reference_id, "Response forwarded to station");
                notifier.publish(Notification::success(
                    "Response Forwarded",
                    "The response has been sent back to the requesting police station",
                ));
                Ok(completed)
            }
            Err(e) => {
                notifier.publish(Notification::error(format!(
                    "Could not forward response {}; it remains awaiting review",
                    reference_id
                )));
                Err(e)
            }
        }
    }
}

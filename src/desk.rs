//! The control-room desk: one store shared by every view.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::activity::{ActivityState, ActivityTracker};
use crate::auth::LoginGate;
use crate::config::DeskConfig;
use crate::dashboard::DashboardAggregator;
use crate::error::Result;
use crate::gateway::{ProviderGateway, SimulatedGateway, StationGateway};
use crate::intake::{FixtureGenerator, IngestReport, RequestIntake, review_fixtures};
use crate::notify::Notifier;
use crate::reviewer::ResponseReviewer;
use crate::storage::{InMemoryStorage, Storage, StoreEvent};

/// Wires the store, the busy-flag tracker and the notification channel into the
/// dashboard, the reviewer, the intake and the login gate.
///
/// Every view reads and writes the same store, so a forward performed through
/// the reviewer is immediately visible to the dashboard and vice versa.
pub struct CsrDesk<S = InMemoryStorage, G = SimulatedGateway> {
    config: DeskConfig,
    storage: Arc<S>,
    activity: Arc<ActivityTracker>,
    notifier: Notifier,
    dashboard: DashboardAggregator<S, G>,
    reviewer: ResponseReviewer<S, G>,
    intake: RequestIntake<S>,
    login: LoginGate,
}

impl CsrDesk {
    /// Desk backed by an in-memory store and simulated gateways.
    pub fn from_config(config: DeskConfig) -> Self {
        let storage = Arc::new(InMemoryStorage::with_event_capacity(config.event_capacity));
        let gateway = Arc::new(SimulatedGateway::from_config(&config));
        Self::with_parts(config, storage, gateway)
    }
}

impl Default for CsrDesk {
    fn default() -> Self {
        Self::from_config(DeskConfig::default())
    }
}

impl<S, G> CsrDesk<S, G>
where
    S: Storage + 'static,
    G: ProviderGateway + StationGateway + 'static,
{
    pub fn with_parts(config: DeskConfig, storage: Arc<S>, gateway: Arc<G>) -> Self {
        let activity = ActivityTracker::new();
        let notifier = Notifier::new(config.notification_capacity);

        tracing::info!(
            dispatch_latency_ms = config.dispatch_latency_ms,
            forward_latency_ms = config.forward_latency_ms,
            "Starting CSR desk"
        );

        Self {
            dashboard: DashboardAggregator::new(
                storage.clone(),
                gateway.clone(),
                activity.clone(),
                notifier.clone(),
            ),
            reviewer: ResponseReviewer::new(
                storage.clone(),
                gateway,
                activity.clone(),
                notifier.clone(),
            ),
            intake: RequestIntake::new(storage.clone()),
            login: LoginGate::from_config(notifier.clone(), &config),
            config,
            storage,
            activity,
            notifier,
        }
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn dashboard(&self) -> &DashboardAggregator<S, G> {
        &self.dashboard
    }

    pub fn reviewer(&self) -> &ResponseReviewer<S, G> {
        &self.reviewer
    }

    pub fn intake(&self) -> &RequestIntake<S> {
        &self.intake
    }

    pub fn login_gate(&self) -> &LoginGate {
        &self.login
    }

    pub fn login_gate_mut(&mut self) -> &mut LoginGate {
        &mut self.login
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Snapshot of every dispatch and forward currently in flight.
    pub fn activity(&self) -> ActivityState {
        self.activity.snapshot()
    }

    /// Change feed of the shared store.
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.storage.subscribe()
    }

    /// Load a generated batch of requests plus the canned review responses.
    pub async fn seed_fixtures(&self) -> Result<IngestReport> {
        let mut generator = FixtureGenerator::from_config(&self.config);
        let mut report = self.intake.ingest(&mut generator).await?;

        let mut canned = review_fixtures(&self.config.email_domain);
        let review = self.intake.ingest(&mut canned).await?;
        report.accepted.extend(review.accepted);
        report.rejected.extend(review.rejected);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::request::RequestId;

    #[tokio::test]
    async fn test_seed_fixtures_fills_both_views() {
        let desk = CsrDesk::from_config(DeskConfig::instant());
        let report = desk.seed_fixtures().await.unwrap();

        assert_eq!(report.accepted.len(), 18);
        assert!(report.rejected.is_empty());
        assert_eq!(desk.storage().len(), 18);

        let pending = desk.dashboard().pending_total().await.unwrap();
        let awaiting = desk.reviewer().awaiting_count().await.unwrap();
        assert_eq!(pending + awaiting, 18);
        assert!(awaiting >= 3);
    }

    #[tokio::test]
    async fn test_forward_is_visible_through_shared_store() {
        let desk = CsrDesk::with_parts(
            DeskConfig::instant(),
            Arc::new(InMemoryStorage::new()),
            Arc::new(MockGateway::new()),
        );
        let mut canned = review_fixtures("tnpolice.gov.in");
        desk.intake().ingest(&mut canned).await.unwrap();
        let mut events = desk.subscribe_events();

        let id = RequestId::from("CSR-002");
        desk.reviewer().forward(&id).await.unwrap();

        assert!(desk.storage().get(&id).await.unwrap().is_terminal());
        assert_eq!(desk.reviewer().awaiting_count().await.unwrap(), 2);
        assert!(matches!(
            events.recv().await.unwrap(),
            StoreEvent::Transitioned { ref id, .. } if id.as_str() == "CSR-002"
        ));
        assert!(desk.activity().is_idle());
    }
}

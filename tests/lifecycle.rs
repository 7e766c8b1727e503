use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use csrdesk::intake::station_email;
use csrdesk::{
    CsrDesk, CsrError, CsrRequest, DeskConfig, InMemoryStorage, MockGateway, NotificationLevel,
    RequestId, RequestStatus, ServiceProvider, Storage, Timestamps,
};
use tokio_stream::StreamExt;

fn incoming(id: &str, provider: ServiceProvider) -> CsrRequest {
    let station = "Trichy West Police Station";
    CsrRequest {
        id: RequestId::from(id),
        police_station_email: station_email(station, "tnpolice.gov.in"),
        police_station_name: station.to_string(),
        mobile_number: "9444012345".to_string(),
        service_provider: provider,
        status: RequestStatus::RequestReceived,
        timestamps: Timestamps {
            received: Utc::now(),
            sent_to_provider: None,
            response_received: None,
            forwarded: None,
        },
        reference_id: format!("REF-{}", id),
        provider_response: None,
    }
}

fn mock_desk() -> (CsrDesk<InMemoryStorage, MockGateway>, MockGateway) {
    let gateway = MockGateway::new();
    let desk = CsrDesk::with_parts(
        DeskConfig::instant(),
        Arc::new(InMemoryStorage::new()),
        Arc::new(gateway.clone()),
    );
    (desk, gateway)
}

#[test_log::test(tokio::test)]
async fn test_full_lifecycle_across_both_views() {
    let (desk, gateway) = mock_desk();
    for (id, provider) in [
        ("CSR-A", ServiceProvider::Jio),
        ("CSR-B", ServiceProvider::Jio),
        ("CSR-C", ServiceProvider::Airtel),
        ("CSR-D", ServiceProvider::Jio),
    ] {
        desk.intake()
            .submit_request(incoming(id, provider))
            .await
            .unwrap();
    }

    let stats = desk.dashboard().provider_stats().await.unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].provider, ServiceProvider::Jio);
    assert_eq!(stats[0].pending_count, 3);

    // Dispatch Jio: only the Airtel group remains
    let outcome = desk
        .dashboard()
        .dispatch_to_provider(ServiceProvider::Jio)
        .await
        .unwrap();
    assert_eq!(
        outcome.dispatched,
        vec![
            RequestId::from("CSR-A"),
            RequestId::from("CSR-B"),
            RequestId::from("CSR-D")
        ]
    );
    assert_eq!(gateway.call_count(), 1);

    let stats = desk.dashboard().provider_stats().await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].provider, ServiceProvider::Airtel);
    assert_eq!(stats[0].pending_count, 1);

    for id in &outcome.dispatched {
        let stored = desk.storage().get(id).await.unwrap();
        assert_eq!(stored.status(), RequestStatus::SentToProvider);
        let stamps = stored.timestamps();
        assert!(stamps.sent_to_provider.unwrap() >= stamps.received);
    }

    // Provider replies for one of them; it appears in the review list
    let id = RequestId::from("CSR-B");
    desk.intake()
        .record_response(&id, "Subscriber Details:\nName: A. Kumar\nStatus: Active")
        .await
        .unwrap();
    let awaiting = desk.reviewer().list_awaiting_review().await.unwrap();
    assert_eq!(awaiting.len(), 1);
    assert_eq!(awaiting[0].data.id, id);

    desk.reviewer().forward(&id).await.unwrap();
    assert_eq!(desk.reviewer().awaiting_count().await.unwrap(), 0);

    // Completed requests are archived and invisible to the dashboard
    let stored = desk.storage().get(&id).await.unwrap();
    assert_eq!(stored.status(), RequestStatus::Completed);
    assert!(stored.timestamps().forwarded.is_some());
    assert_eq!(desk.dashboard().pending_total().await.unwrap(), 1);
    assert_eq!(desk.storage().len(), 4);
}

#[tokio::test]
async fn test_grouping_accounts_for_every_pending_request() {
    let desk = CsrDesk::from_config(DeskConfig::instant());
    desk.seed_fixtures().await.unwrap();

    let stats = desk.dashboard().provider_stats().await.unwrap();
    let grouped: usize = stats.iter().map(|s| s.pending_count).sum();
    assert_eq!(grouped, desk.dashboard().pending_total().await.unwrap());

    for group in &stats {
        assert_eq!(group.pending_count, group.requests.len());
        assert!(
            group
                .requests
                .iter()
                .all(|r| r.data.service_provider == group.provider)
        );
    }
}

#[tokio::test]
async fn test_notifications_stream_follows_operations() {
    let (desk, gateway) = mock_desk();
    let mut stream = pin!(desk.notifier().stream());

    desk.intake()
        .submit_request(incoming("CSR-1", ServiceProvider::Bsnl))
        .await
        .unwrap();
    gateway.fail_dispatch(ServiceProvider::Bsnl, "gateway timeout");

    let err = desk
        .dashboard()
        .dispatch_to_provider(ServiceProvider::Bsnl)
        .await
        .unwrap_err();
    assert!(err.is_retriable());
    desk.dashboard()
        .dispatch_to_provider(ServiceProvider::Bsnl)
        .await
        .unwrap();

    let failure = stream.next().await.unwrap();
    assert_eq!(failure.level, NotificationLevel::Error);
    let success = stream.next().await.unwrap();
    assert_eq!(success.title, "Requests Sent");
    assert_eq!(
        success.description,
        "All pending requests have been consolidated and sent to BSNL"
    );
}

#[tokio::test]
async fn test_forward_of_unknown_request() {
    let (desk, _gateway) = mock_desk();
    let err = desk
        .reviewer()
        .forward(&RequestId::from("CSR-404"))
        .await
        .unwrap_err();
    assert!(matches!(err, CsrError::RequestNotFound(_)));
    assert!(desk.activity().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_simulated_latency_holds_busy_flag() {
    let desk = CsrDesk::from_config(DeskConfig::default());
    desk.intake()
        .submit_request(incoming("CSR-1", ServiceProvider::Vi))
        .await
        .unwrap();

    let start = tokio::time::Instant::now();
    let handle = desk.dashboard().start_dispatch(ServiceProvider::Vi).unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(desk.dashboard().is_dispatching(ServiceProvider::Vi));
    assert!(matches!(
        desk.dashboard().start_dispatch(ServiceProvider::Vi),
        Err(CsrError::ProviderBusy(ServiceProvider::Vi))
    ));

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome.dispatched.len(), 1);
    assert!(start.elapsed() >= Duration::from_millis(2000));
    assert!(!desk.dashboard().is_dispatching(ServiceProvider::Vi));
}

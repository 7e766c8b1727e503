//! Per-provider grouping of pending requests.

use serde::Serialize;

use crate::domain::provider::ServiceProvider;
use crate::request::{AnyRequest, Request, RequestReceived};

/// Pending requests of one provider, derived on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub provider: ServiceProvider,
    pub pending_count: usize,
    pub requests: Vec<Request<RequestReceived>>,
}

impl ProviderStats {
    /// The first `limit` requests and how many more are hidden behind them.
    pub fn preview(&self, limit: usize) -> (&[Request<RequestReceived>], usize) {
        let shown = self.requests.len().min(limit);
        (&self.requests[..shown], self.requests.len() - shown)
    }
}

/// Group every request awaiting dispatch by provider.
///
/// Groups appear in the order their provider is first seen, each holding its
/// requests in collection order. Requests in any other state contribute to no
/// group, and providers without pending requests get no entry.
pub fn group_by_provider(requests: &[AnyRequest]) -> Vec<ProviderStats> {
    let mut groups: Vec<ProviderStats> = Vec::new();

    for request in requests {
        let AnyRequest::RequestReceived(pending) = request else {
            continue;
        };
        let provider = pending.data.service_provider;

        match groups.iter_mut().find(|g| g.provider == provider) {
            Some(group) => {
                group.requests.push(pending.clone());
                group.pending_count += 1;
            }
            None => groups.push(ProviderStats {
                provider,
                pending_count: 1,
                requests: vec![pending.clone()],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RequestData, RequestId};
    use chrono::Utc;

    fn pending(id: &str, provider: ServiceProvider) -> Request<RequestReceived> {
        Request {
            state: RequestReceived {
                received_at: Utc::now(),
            },
            data: RequestData {
                id: RequestId::from(id),
                reference_id: format!("REF-{}", id),
                police_station_name: "Coimbatore North Police Station".to_string(),
                police_station_email: "coimbatore.north.police.station@tnpolice.gov.in"
                    .to_string(),
                mobile_number: "8765432109".to_string(),
                service_provider: provider,
            },
        }
    }

    fn mixed_collection() -> Vec<AnyRequest> {
        vec![
            pending("CSR-1", ServiceProvider::Airtel).into(),
            pending("CSR-2", ServiceProvider::Jio).into(),
            pending("CSR-3", ServiceProvider::Jio)
                .mark_sent(Utc::now())
                .into(),
            pending("CSR-4", ServiceProvider::Airtel).into(),
            pending("CSR-5", ServiceProvider::Bsnl)
                .mark_sent(Utc::now())
                .into(),
            pending("CSR-6", ServiceProvider::Jio).into(),
        ]
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let groups = group_by_provider(&mixed_collection());

        let providers: Vec<_> = groups.iter().map(|g| g.provider).collect();
        assert_eq!(providers, vec![ServiceProvider::Airtel, ServiceProvider::Jio]);

        let jio_ids: Vec<_> = groups[1].requests.iter().map(|r| r.data.id.as_str()).collect();
        assert_eq!(jio_ids, vec!["CSR-2", "CSR-6"]);
    }

    #[test]
    fn test_each_pending_request_in_exactly_one_group() {
        let collection = mixed_collection();
        let groups = group_by_provider(&collection);

        let total: usize = groups.iter().map(|g| g.pending_count).sum();
        let pending = collection.iter().filter(|r| r.is_pending()).count();
        assert_eq!(total, pending);

        for request in &collection {
            let appearances = groups
                .iter()
                .flat_map(|g| g.requests.iter())
                .filter(|r| &r.data.id == request.id())
                .count();
            assert_eq!(appearances, usize::from(request.is_pending()));
        }

        for group in &groups {
            assert_eq!(group.pending_count, group.requests.len());
        }
    }

    #[test]
    fn test_provider_without_pending_requests_has_no_group() {
        let groups = group_by_provider(&mixed_collection());
        assert!(groups.iter().all(|g| g.provider != ServiceProvider::Bsnl));
        assert!(group_by_provider(&[]).is_empty());
    }

    #[test]
    fn test_preview_reports_overflow() {
        let requests: Vec<AnyRequest> = (0..7)
            .map(|i| pending(&format!("CSR-{}", i), ServiceProvider::Vi).into())
            .collect();
        let groups = group_by_provider(&requests);

        let (shown, more) = groups[0].preview(5);
        assert_eq!(shown.len(), 5);
        assert_eq!(more, 2);

        let (shown, more) = groups[0].preview(10);
        assert_eq!(shown.len(), 7);
        assert_eq!(more, 0);
    }
}

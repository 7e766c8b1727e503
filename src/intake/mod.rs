//! Intake boundary: new requests and provider replies entering the store.
//!
//! The store does not care where requests come from. Anything that yields flat
//! [`CsrRequest`] records implements [`RequestSource`]; the fixture generator is
//! one such source and a live feed would be another.

use std::sync::Arc;

use crate::error::{CsrError, Result};
use crate::request::{AnyRequest, CsrRequest, Request, RequestId, ResponseReceived};
use crate::storage::Storage;

pub mod fixtures;

pub use fixtures::{FixtureGenerator, review_fixtures};

/// A feed of incoming requests.
pub trait RequestSource {
    /// Take the next batch of requests. An empty batch means the feed is drained.
    fn next_batch(&mut self) -> Vec<CsrRequest>;
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: Vec<RequestId>,
    /// Rejected records with the reason they were refused
    pub rejected: Vec<(RequestId, String)>,
}

/// Derive a police station's email address from its name.
///
/// `"Chennai Central Police Station"` becomes
/// `"chennai.central.police.station@<domain>"`.
pub fn station_email(station_name: &str, domain: &str) -> String {
    let local = station_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".");
    format!("{}@{}", local, domain)
}

/// Check the fields of a record that the typed model cannot express.
pub fn validate_record(record: &CsrRequest) -> Result<()> {
    if record.id.trim().is_empty() {
        return Err(CsrError::ValidationError("Request ID must not be empty".to_string()));
    }
    if record.police_station_name.trim().is_empty() {
        return Err(CsrError::ValidationError(format!(
            "Request {}: police station name must not be empty",
            record.id
        )));
    }
    let valid_email = record
        .police_station_email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.contains('@')
        });
    if !valid_email {
        return Err(CsrError::ValidationError(format!(
            "Request {}: police station email '{}' is not a valid address",
            record.id, record.police_station_email
        )));
    }
    if record.reference_id.trim().is_empty() {
        return Err(CsrError::ValidationError(format!(
            "Request {}: reference ID must not be empty",
            record.id
        )));
    }
    if record.mobile_number.len() != 10 || !record.mobile_number.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(CsrError::ValidationError(format!(
            "Request {}: mobile number '{}' is not a 10-digit number",
            record.id, record.mobile_number
        )));
    }
    Ok(())
}

/// Entry point for requests and provider replies arriving from outside.
pub struct RequestIntake<S> {
    storage: Arc<S>,
}

impl<S: Storage> RequestIntake<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Validate a flat record and add it to the store.
    #[tracing::instrument(skip(self, record), fields(request_id = %record.id, provider = %record.service_provider))]
    pub async fn submit_request(&self, record: CsrRequest) -> Result<RequestId> {
        validate_record(&record)?;
        let request = AnyRequest::try_from(record)?;
        let id = request.id().clone();
        self.storage.insert(request).await?;
        tracing::debug!("Request accepted");
        Ok(id)
    }

    /// Attach a provider's reply to a request that was sent to it.
    pub async fn record_response(
        &self,
        id: &RequestId,
        provider_response: impl Into<String>,
    ) -> Result<Request<ResponseReceived>> {
        let request = self.storage.get(id).await?;
        let status = request.status();
        let sent = request.into_sent().ok_or_else(|| {
            CsrError::InvalidState(
                id.clone(),
                status.to_string(),
                "Sent to Provider".to_string(),
            )
        })?;
        sent.record_response(provider_response.into(), self.storage.as_ref())
            .await
    }

    /// Drain `source`, submitting every record it yields.
    ///
    /// Invalid and duplicate records are reported rather than aborting the run;
    /// any other error stops ingestion.
    pub async fn ingest<R: RequestSource + ?Sized>(&self, source: &mut R) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        loop {
            let batch = source.next_batch();
            if batch.is_empty() {
                break;
            }
            for record in batch {
                let id = record.id.clone();
                match self.submit_request(record).await {
                    Ok(id) => report.accepted.push(id),
                    Err(e @ (CsrError::ValidationError(_) | CsrError::DuplicateRequest(_))) => {
                        tracing::warn!(request_id = %id, error = %e, "Rejected incoming request");
                        report.rejected.push((id, e.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "Ingestion finished"
        );
        Ok(report)
    }
}

/// Source over a fixed list of records, yielded as one batch.
impl RequestSource for Vec<CsrRequest> {
    fn next_batch(&mut self) -> Vec<CsrRequest> {
        std::mem::take(self)
    }
}

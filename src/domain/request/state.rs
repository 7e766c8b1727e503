//! Core types for the CSR request lifecycle.
//!
//! This module defines the type-safe request lifecycle using the typestate pattern.
//! Each request progresses through distinct states, enforced at compile time:
//!
//! ```text
//! RequestReceived ──> SentToProvider ──> ResponseReceived ──> Completed
//! ```
//!
//! Each state carries exactly the timestamps that have been stamped so far, so a
//! typed request can never hold a `forwarded` time without a `sentToProvider` one.
//! [`CsrRequest`] is the flat record used at the intake boundary and for display;
//! converting it into an [`AnyRequest`] rejects records whose timestamps do not
//! match their status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::provider::ServiceProvider;
use crate::error::{CsrError, Result};

/// Lifecycle status of a request, as stored on the flat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "Request Received")]
    RequestReceived,
    #[serde(rename = "Sent to Provider")]
    SentToProvider,
    #[serde(rename = "Response Received")]
    ResponseReceived,
    #[serde(rename = "Completed")]
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::RequestReceived => "Request Received",
            RequestStatus::SentToProvider => "Sent to Provider",
            RequestStatus::ResponseReceived => "Response Received",
            RequestStatus::Completed => "Completed",
        }
    }

    /// Status a stored request must hold to move into this one.
    ///
    /// `None` for `RequestReceived`, which is only ever inserted.
    pub fn predecessor(&self) -> Option<RequestStatus> {
        match self {
            RequestStatus::RequestReceived => None,
            RequestStatus::SentToProvider => Some(RequestStatus::RequestReceived),
            RequestStatus::ResponseReceived => Some(RequestStatus::SentToProvider),
            RequestStatus::Completed => Some(RequestStatus::ResponseReceived),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker trait for valid request states.
///
/// This trait enables the typestate pattern, ensuring that operations
/// are only performed on requests in valid states.
pub trait RequestState: Send + Sync {}

/// A CSR request.
///
/// The generic parameter `T` represents the current state of the request.
///
/// # Example
/// ```ignore
/// let received = Request {
///     state: RequestReceived { received_at: Utc::now() },
///     data: request_data,
/// };
/// // Can only call operations valid for RequestReceived
/// let sent = received.mark_sent(Utc::now());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request<T: RequestState> {
    /// The current state of the request.
    pub state: T,
    /// The data raised by the police station.
    pub data: RequestData,
}

/// Immutable data of a request, as raised by the police station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestData {
    pub id: RequestId,

    /// Reference shown to operators and quoted back to the station
    pub reference_id: String,

    pub police_station_name: String,

    /// Address the reviewed response is delivered to; checked at intake
    pub police_station_email: String,

    /// 10-digit subscriber number being looked up
    pub mobile_number: String,

    /// Provider the lookup is raised against (dispatch partition key)
    pub service_provider: ServiceProvider,
}

// ============================================================================
// Request States
// ============================================================================

/// Request has been received from a police station and awaits dispatch.
///
/// This is the initial state for all newly submitted requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestReceived {
    pub received_at: DateTime<Utc>,
}

impl RequestState for RequestReceived {}

/// Request has been dispatched to its provider as part of a bulk send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentToProvider {
    pub received_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
}

impl RequestState for SentToProvider {}

/// The provider has replied; the response awaits operator review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseReceived {
    pub received_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
    pub response_received_at: DateTime<Utc>,
    pub provider_response: String,
}

impl RequestState for ResponseReceived {}

/// The response has been forwarded back to the police station (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completed {
    pub received_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
    pub response_received_at: DateTime<Utc>,
    pub forwarded_at: DateTime<Utc>,
    pub provider_response: String,
}

impl RequestState for Completed {}

/// Identifier of a request.
///
/// Intake feeds supply their own opaque identifiers (e.g. `CSR-001`), so this
/// wraps a string rather than a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a fresh identifier of the form `CSR-XXXXXXXXXXXX`.
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        RequestId(format!("CSR-{}", uuid[..12].to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId(id)
    }
}

impl std::ops::Deref for RequestId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// Flat Record
// ============================================================================

/// Timestamps stamped as a request advances through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub received: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_to_provider: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_received: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded: Option<DateTime<Utc>>,
}

/// Flat representation of a request, as exchanged with intake feeds and views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrRequest {
    pub id: RequestId,
    pub police_station_email: String,
    pub police_station_name: String,
    pub mobile_number: String,
    pub service_provider: ServiceProvider,
    pub status: RequestStatus,
    pub timestamps: Timestamps,
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<String>,
}

// ============================================================================
// Unified Request Representation
// ============================================================================

/// Enum that can hold a request in any state.
///
/// This is used for storage and views where we need to handle
/// requests uniformly regardless of their current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "request")]
pub enum AnyRequest {
    RequestReceived(Request<RequestReceived>),
    SentToProvider(Request<SentToProvider>),
    ResponseReceived(Request<ResponseReceived>),
    Completed(Request<Completed>),
}

impl AnyRequest {
    /// Get the request ID regardless of state.
    pub fn id(&self) -> &RequestId {
        &self.data().id
    }

    /// Get the request data regardless of state.
    pub fn data(&self) -> &RequestData {
        match self {
            AnyRequest::RequestReceived(r) => &r.data,
            AnyRequest::SentToProvider(r) => &r.data,
            AnyRequest::ResponseReceived(r) => &r.data,
            AnyRequest::Completed(r) => &r.data,
        }
    }

    pub fn provider(&self) -> ServiceProvider {
        self.data().service_provider
    }

    pub fn status(&self) -> RequestStatus {
        match self {
            AnyRequest::RequestReceived(_) => RequestStatus::RequestReceived,
            AnyRequest::SentToProvider(_) => RequestStatus::SentToProvider,
            AnyRequest::ResponseReceived(_) => RequestStatus::ResponseReceived,
            AnyRequest::Completed(_) => RequestStatus::Completed,
        }
    }

    /// Timestamps stamped so far, in flat form.
    pub fn timestamps(&self) -> Timestamps {
        match self {
            AnyRequest::RequestReceived(r) => Timestamps {
                received: r.state.received_at,
                sent_to_provider: None,
                response_received: None,
                forwarded: None,
            },
            AnyRequest::SentToProvider(r) => Timestamps {
                received: r.state.received_at,
                sent_to_provider: Some(r.state.sent_at),
                response_received: None,
                forwarded: None,
            },
            AnyRequest::ResponseReceived(r) => Timestamps {
                received: r.state.received_at,
                sent_to_provider: Some(r.state.sent_at),
                response_received: Some(r.state.response_received_at),
                forwarded: None,
            },
            AnyRequest::Completed(r) => Timestamps {
                received: r.state.received_at,
                sent_to_provider: Some(r.state.sent_at),
                response_received: Some(r.state.response_received_at),
                forwarded: Some(r.state.forwarded_at),
            },
        }
    }

    pub fn provider_response(&self) -> Option<&str> {
        match self {
            AnyRequest::ResponseReceived(r) => Some(&r.state.provider_response),
            AnyRequest::Completed(r) => Some(&r.state.provider_response),
            _ => None,
        }
    }

    /// Check if this request is awaiting dispatch.
    pub fn is_pending(&self) -> bool {
        matches!(self, AnyRequest::RequestReceived(_))
    }

    /// Check if this request has a provider response awaiting review.
    pub fn is_awaiting_review(&self) -> bool {
        matches!(self, AnyRequest::ResponseReceived(_))
    }

    /// Check if this request has been forwarded (terminal).
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnyRequest::Completed(_))
    }

    /// Try to take as a pending request, consuming self.
    pub fn into_received(self) -> Option<Request<RequestReceived>> {
        match self {
            AnyRequest::RequestReceived(r) => Some(r),
            _ => None,
        }
    }

    /// Try to take as a sent request, consuming self.
    pub fn into_sent(self) -> Option<Request<SentToProvider>> {
        match self {
            AnyRequest::SentToProvider(r) => Some(r),
            _ => None,
        }
    }

    /// Try to extract as a request awaiting review.
    pub fn as_response_received(&self) -> Option<&Request<ResponseReceived>> {
        match self {
            AnyRequest::ResponseReceived(r) => Some(r),
            _ => None,
        }
    }

    /// Try to take as a request awaiting review, consuming self.
    pub fn into_response_received(self) -> Option<Request<ResponseReceived>> {
        match self {
            AnyRequest::ResponseReceived(r) => Some(r),
            _ => None,
        }
    }

    /// Flatten into the record form used by views and intake feeds.
    pub fn to_record(&self) -> CsrRequest {
        let data = self.data();
        CsrRequest {
            id: data.id.clone(),
            police_station_email: data.police_station_email.clone(),
            police_station_name: data.police_station_name.clone(),
            mobile_number: data.mobile_number.clone(),
            service_provider: data.service_provider,
            status: self.status(),
            timestamps: self.timestamps(),
            reference_id: data.reference_id.clone(),
            provider_response: self.provider_response().map(str::to_string),
        }
    }
}

fn require<T>(value: Option<T>, field: &str, record: &CsrRequest) -> Result<T> {
    value.ok_or_else(|| {
        CsrError::ValidationError(format!(
            "Request {} in status '{}' is missing {}",
            record.id, record.status, field
        ))
    })
}

fn forbid<T>(value: &Option<T>, field: &str, record: &CsrRequest) -> Result<()> {
    if value.is_some() {
        return Err(CsrError::ValidationError(format!(
            "Request {} in status '{}' must not carry {}",
            record.id, record.status, field
        )));
    }
    Ok(())
}

fn ensure_ordered(earlier: DateTime<Utc>, later: DateTime<Utc>, field: &str, id: &RequestId) -> Result<()> {
    if later < earlier {
        return Err(CsrError::ValidationError(format!(
            "Request {}: {} precedes the previous lifecycle timestamp",
            id, field
        )));
    }
    Ok(())
}

impl TryFrom<CsrRequest> for AnyRequest {
    type Error = CsrError;

    /// Build a typed request, rejecting records whose timestamps are not the
    /// prefix matching their status.
    fn try_from(record: CsrRequest) -> Result<Self> {
        let ts = &record.timestamps;
        let received_at = ts.received;

        let request = match record.status {
            RequestStatus::RequestReceived => {
                forbid(&ts.sent_to_provider, "timestamps.sentToProvider", &record)?;
                forbid(&ts.response_received, "timestamps.responseReceived", &record)?;
                forbid(&ts.forwarded, "timestamps.forwarded", &record)?;
                forbid(&record.provider_response, "providerResponse", &record)?;
                AnyRequest::RequestReceived(Request {
                    state: RequestReceived { received_at },
                    data: record.data(),
                })
            }
            RequestStatus::SentToProvider => {
                let sent_at = require(ts.sent_to_provider, "timestamps.sentToProvider", &record)?;
                forbid(&ts.response_received, "timestamps.responseReceived", &record)?;
                forbid(&ts.forwarded, "timestamps.forwarded", &record)?;
                forbid(&record.provider_response, "providerResponse", &record)?;
                ensure_ordered(received_at, sent_at, "sentToProvider", &record.id)?;
                AnyRequest::SentToProvider(Request {
                    state: SentToProvider {
                        received_at,
                        sent_at,
                    },
                    data: record.data(),
                })
            }
            RequestStatus::ResponseReceived => {
                let sent_at = require(ts.sent_to_provider, "timestamps.sentToProvider", &record)?;
                let response_received_at =
                    require(ts.response_received, "timestamps.responseReceived", &record)?;
                forbid(&ts.forwarded, "timestamps.forwarded", &record)?;
                let provider_response =
                    require(record.provider_response.clone(), "providerResponse", &record)?;
                ensure_ordered(received_at, sent_at, "sentToProvider", &record.id)?;
                ensure_ordered(sent_at, response_received_at, "responseReceived", &record.id)?;
                AnyRequest::ResponseReceived(Request {
                    state: ResponseReceived {
                        received_at,
                        sent_at,
                        response_received_at,
                        provider_response,
                    },
                    data: record.data(),
                })
            }
            RequestStatus::Completed => {
                let sent_at = require(ts.sent_to_provider, "timestamps.sentToProvider", &record)?;
                let response_received_at =
                    require(ts.response_received, "timestamps.responseReceived", &record)?;
                let forwarded_at = require(ts.forwarded, "timestamps.forwarded", &record)?;
                let provider_response =
                    require(record.provider_response.clone(), "providerResponse", &record)?;
                ensure_ordered(received_at, sent_at, "sentToProvider", &record.id)?;
                ensure_ordered(sent_at, response_received_at, "responseReceived", &record.id)?;
                ensure_ordered(response_received_at, forwarded_at, "forwarded", &record.id)?;
                AnyRequest::Completed(Request {
                    state: Completed {
                        received_at,
                        sent_at,
                        response_received_at,
                        forwarded_at,
                        provider_response,
                    },
                    data: record.data(),
                })
            }
        };

        Ok(request)
    }
}

impl CsrRequest {
    fn data(&self) -> RequestData {
        RequestData {
            id: self.id.clone(),
            reference_id: self.reference_id.clone(),
            police_station_name: self.police_station_name.clone(),
            police_station_email: self.police_station_email.clone(),
            mobile_number: self.mobile_number.clone(),
            service_provider: self.service_provider,
        }
    }
}

// Conversion traits for going from typed Request to AnyRequest

impl From<Request<RequestReceived>> for AnyRequest {
    fn from(r: Request<RequestReceived>) -> Self {
        AnyRequest::RequestReceived(r)
    }
}

impl From<Request<SentToProvider>> for AnyRequest {
    fn from(r: Request<SentToProvider>) -> Self {
        AnyRequest::SentToProvider(r)
    }
}

impl From<Request<ResponseReceived>> for AnyRequest {
    fn from(r: Request<ResponseReceived>) -> Self {
        AnyRequest::ResponseReceived(r)
    }
}

impl From<Request<Completed>> for AnyRequest {
    fn from(r: Request<Completed>) -> Self {
        AnyRequest::Completed(r)
    }
}

//! In-memory request store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{RequestFilter, Storage, StoreEvent};
use crate::error::{CsrError, Result};
use crate::request::{AnyRequest, Request, RequestId, RequestState};

const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Inner {
    /// Requests in insertion order
    requests: Vec<AnyRequest>,
    /// Position of each request in `requests`
    index: HashMap<RequestId, usize>,
}

/// Process-wide request store held in memory.
///
/// All mutations take the write lock once and replace the affected records
/// before releasing it. Events are broadcast after the lock is dropped.
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
    events: broadcast::Sender<StoreEvent>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a store whose change channel buffers `capacity` events per subscriber.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Number of requests held, in any state.
    pub fn len(&self) -> usize {
        self.inner.read().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, events: Vec<StoreEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn insert(&self, request: AnyRequest) -> Result<()> {
        let event = {
            let mut inner = self.inner.write();
            let id = request.id().clone();
            if inner.index.contains_key(&id) {
                return Err(CsrError::DuplicateRequest(id));
            }
            let status = request.status();
            let position = inner.requests.len();
            inner.requests.push(request);
            inner.index.insert(id.clone(), position);
            StoreEvent::Inserted { id, status }
        };

        tracing::trace!(?event, "Inserted request");
        self.emit(vec![event]);
        Ok(())
    }

    async fn get(&self, id: &RequestId) -> Result<AnyRequest> {
        let inner = self.inner.read();
        inner
            .index
            .get(id)
            .map(|&position| inner.requests[position].clone())
            .ok_or_else(|| CsrError::RequestNotFound(id.clone()))
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<AnyRequest>> {
        Ok(self
            .inner
            .read()
            .requests
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn persist<T: RequestState + Clone>(&self, request: &Request<T>) -> Result<()>
    where
        AnyRequest: From<Request<T>>,
    {
        self.persist_many(vec![AnyRequest::from(request.clone())])
            .await
    }

    async fn persist_many(&self, requests: Vec<AnyRequest>) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }

        let events = {
            let mut inner = self.inner.write();

            // Resolve and check every position before touching anything
            let positions = requests
                .iter()
                .map(|r| {
                    let position = inner
                        .index
                        .get(r.id())
                        .copied()
                        .ok_or_else(|| CsrError::RequestNotFound(r.id().clone()))?;
                    let current = inner.requests[position].status();
                    match r.status().predecessor() {
                        Some(expected) if expected == current => Ok(position),
                        expected => Err(CsrError::InvalidState(
                            r.id().clone(),
                            current.to_string(),
                            expected.map_or("none (insert only)".to_string(), |s| s.to_string()),
                        )),
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            let mut events = Vec::with_capacity(requests.len());
            for (position, request) in positions.into_iter().zip(requests) {
                events.push(StoreEvent::Transitioned {
                    id: request.id().clone(),
                    status: request.status(),
                });
                inner.requests[position] = request;
            }
            events
        };

        tracing::trace!(count = events.len(), "Persisted requests");
        self.emit(events);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

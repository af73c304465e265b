//! In-process message transport: a hub pairing many page senders with one
//! resolver port, built on unbounded `tokio::mpsc` channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{TransportError, TransportResult};
use crate::{EngineRequest, PageId, RequestToken, ResolverPush};

type PushSender = mpsc::UnboundedSender<(RequestToken, ResolverPush)>;
type PageTable = Arc<Mutex<HashMap<PageId, PushSender>>>;

/// A request received by the resolver, with its routing metadata.
#[derive(Debug)]
pub struct Inbound {
    /// Page the request originated from.
    pub page_id: PageId,
    /// Correlation token to echo on the response.
    pub token: RequestToken,
    /// The request body.
    pub request: EngineRequest,
}

/// Sink through which a page submits resolution requests.
///
/// Object-safe so tests can substitute failing transports.
#[async_trait]
pub trait RequestSink: Send + Sync {
    /// Submit a request, returning the correlation token assigned to it.
    async fn send(&self, request: EngineRequest) -> TransportResult<RequestToken>;
}

/// Page-side sending half registered with the hub.
pub struct PageSender {
    page_id: PageId,
    next_token: AtomicU64,
    requests: mpsc::UnboundedSender<Inbound>,
}

#[async_trait]
impl RequestSink for PageSender {
    async fn send(&self, request: EngineRequest) -> TransportResult<RequestToken> {
        let token = RequestToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.requests
            .send(Inbound {
                page_id: self.page_id,
                token,
                request,
            })
            .map_err(|_| TransportError::ChannelClosed)?;
        Ok(token)
    }
}

/// Page-side receiving half: responses pushed by the resolver.
pub struct PageReceiver {
    pushes: mpsc::UnboundedReceiver<(RequestToken, ResolverPush)>,
}

impl PageReceiver {
    /// Receive the next pushed response, or `None` once detached.
    pub async fn recv(&mut self) -> Option<(RequestToken, ResolverPush)> {
        self.pushes.recv().await
    }
}

/// Registry pairing page contexts with the resolver port.
#[derive(Clone)]
pub struct MessageHub {
    requests: mpsc::UnboundedSender<Inbound>,
    pages: PageTable,
}

impl MessageHub {
    /// Register a page and hand back its transport halves.
    ///
    /// Registering the same page twice replaces the previous receiving
    /// half; its receiver completes.
    ///
    /// # Panics
    ///
    /// Panics if the page table mutex has been poisoned.
    #[must_use]
    pub fn register_page(&self, page_id: PageId) -> (PageSender, PageReceiver) {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        self.pages
            .lock()
            .expect("page table mutex poisoned")
            .insert(page_id, push_tx);
        (
            PageSender {
                page_id,
                next_token: AtomicU64::new(1),
                requests: self.requests.clone(),
            },
            PageReceiver { pushes: push_rx },
        )
    }

    /// Remove a page from the routing table.
    ///
    /// # Panics
    ///
    /// Panics if the page table mutex has been poisoned.
    pub fn detach_page(&self, page_id: PageId) {
        self.pages
            .lock()
            .expect("page table mutex poisoned")
            .remove(&page_id);
    }
}

/// Resolver-side port: drains requests, pushes responses back to pages.
pub struct ResolverPort {
    requests: mpsc::UnboundedReceiver<Inbound>,
    pages: PageTable,
}

impl ResolverPort {
    /// Receive the next request, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.requests.recv().await
    }

    /// Push a response to the page that issued `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownPage`] when the page detached, or
    /// [`TransportError::ChannelClosed`] when its receiver is gone.
    ///
    /// # Panics
    ///
    /// Panics if the page table mutex has been poisoned.
    pub fn push(
        &self,
        page_id: PageId,
        token: RequestToken,
        push: ResolverPush,
    ) -> TransportResult<()> {
        let sender = self
            .pages
            .lock()
            .expect("page table mutex poisoned")
            .get(&page_id)
            .cloned()
            .ok_or(TransportError::UnknownPage { page_id })?;
        sender
            .send((token, push))
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Build a connected hub/port pair.
#[must_use]
pub fn channel() -> (MessageHub, ResolverPort) {
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let pages: PageTable = Arc::new(Mutex::new(HashMap::new()));
    (
        MessageHub {
            requests: requests_tx,
            pages: pages.clone(),
        },
        ResolverPort {
            requests: requests_rx,
            pages,
        },
    )
}

/// Submit a request, retrying transient failures with doubling backoff.
///
/// Attempts are bounded by `max_attempts`; the delay before the second
/// attempt is `initial_delay` and doubles thereafter. The final failure is
/// logged and returned — callers fail open, leaving whatever favicon was
/// last applied.
///
/// # Errors
///
/// Returns the last transport error once `max_attempts` sends have failed.
///
/// # Panics
///
/// Panics if `max_attempts` is zero.
pub async fn send_with_retry(
    sink: &dyn RequestSink,
    request: EngineRequest,
    max_attempts: u32,
    initial_delay: Duration,
) -> TransportResult<RequestToken> {
    let mut delay = initial_delay;
    for attempt in 1..=max_attempts {
        match sink.send(request.clone()).await {
            Ok(token) => return Ok(token),
            Err(err) if attempt == max_attempts => {
                error!(
                    attempts = max_attempts,
                    error = %err,
                    "failed to reach the resolver, giving up"
                );
                return Err(err);
            }
            Err(err) => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                debug!(attempt, delay_ms, error = %err, "send failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    unreachable!("send_with_retry requires max_attempts >= 1");
}

#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Runtime wiring: connects the resolver service to page sessions over
//! the in-process message hub, and installs logging.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt};

use sigil_dom::Document;
use sigil_engine::{EngineResult, PageSession, SessionHandle};
use sigil_proto::{MessageHub, PageId, ResolverPort, ResolverPush};
use sigil_resolver::PolicyResolver;
use sigil_store::ConfigStore;

/// Default logging filter when `RUST_LOG` is not provided.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configure and install the global tracing subscriber: pretty output in
/// debug builds, JSON in release.
///
/// # Errors
///
/// Returns an error if a subscriber has already been installed.
pub fn init_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false);

    let installed = if cfg!(debug_assertions) {
        builder.pretty().try_init()
    } else {
        builder.json().try_init()
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

/// Background task draining the resolver port.
pub struct ResolverService;

impl ResolverService {
    /// Spawn the service loop: resolve each inbound request and push the
    /// outcome back to the page that asked.
    pub fn spawn(resolver: PolicyResolver, mut port: ResolverPort) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(inbound) = port.recv().await {
                let resolution = resolver.resolve_request(&inbound.request).await;
                let push = ResolverPush::SetFavicon {
                    img_url: resolution.img_url,
                    replace_strategy: resolution.policy,
                };
                if let Err(error) = port.push(inbound.page_id, inbound.token, push) {
                    warn!(page_id = %inbound.page_id, error = %error, "failed to push resolution");
                }
            }
            debug!("resolver service drained");
        })
    }
}

/// Registers pages on the hub and runs an enforcement session for each.
#[derive(Clone)]
pub struct PageSupervisor {
    hub: MessageHub,
}

impl PageSupervisor {
    /// Construct a supervisor over a hub.
    #[must_use]
    pub const fn new(hub: MessageHub) -> Self {
        Self { hub }
    }

    /// Attach a page: register it with the hub and spawn its session.
    ///
    /// # Errors
    ///
    /// Returns an engine error when enforcement refuses to run on the
    /// page (excluded host).
    pub fn attach(&self, document: Arc<dyn Document>) -> EngineResult<PageHandle> {
        let page_id = PageId::new();
        let (sender, receiver) = self.hub.register_page(page_id);
        match PageSession::spawn(document, Arc::new(sender), receiver) {
            Ok(session) => Ok(PageHandle {
                page_id,
                _session: session,
                hub: self.hub.clone(),
            }),
            Err(error) => {
                self.hub.detach_page(page_id);
                Err(error)
            }
        }
    }
}

/// Handle to an attached page. Dropping it detaches the page from the
/// hub and aborts its session.
pub struct PageHandle {
    page_id: PageId,
    _session: SessionHandle,
    hub: MessageHub,
}

impl PageHandle {
    /// Identifier the page is registered under.
    #[must_use]
    pub const fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        self.hub.detach_page(self.page_id);
    }
}

/// A bootstrapped runtime: resolver service plus page supervisor.
pub struct Runtime {
    /// Supervisor used to attach pages.
    pub supervisor: PageSupervisor,
    resolver_task: JoinHandle<()>,
}

impl Runtime {
    /// Stop the resolver service.
    pub fn shutdown(&self) {
        self.resolver_task.abort();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.resolver_task.abort();
    }
}

/// Wire a complete runtime over the given store.
#[must_use]
pub fn bootstrap(store: Arc<dyn ConfigStore>) -> Runtime {
    let (hub, port) = sigil_proto::channel();
    let resolver = PolicyResolver::new(store);
    let resolver_task = ResolverService::spawn(resolver, port);
    Runtime {
        supervisor: PageSupervisor::new(hub),
        resolver_task,
    }
}

//! Per-page enforcement session.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use sigil_dom::{
    Document, LinkInit, MutationBatch, MutationSink, NavigationEvent, NodeId, ObserveOptions,
    ObserverId,
};
use sigil_model::{ColorScheme, EnforcementPolicy};
use sigil_proto::{
    EngineRequest, PageReceiver, RequestSink, RequestToken, ResolverPush, send_with_retry,
};

use crate::apply::{cleanup_existing_icons, hiding_css, hiding_style_present};
use crate::defense::{jittered_interval, persistence_violation};
use crate::error::{EngineError, EngineResult};
use crate::state::EngineState;
use crate::{EXCLUDED_HOST, HIDING_STYLE_ID, MANAGED_CLASS};

/// Resolution send attempts before failing open.
const SEND_ATTEMPTS: u32 = 3;

/// Delay before the first resolution resend; doubles per attempt.
const SEND_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Upper bound of the random delay before a persistence retry.
const RETRY_JITTER_MS: u64 = 100;

/// Internal timer stimuli. Every tick carries the generation it was
/// armed under; a bumped generation silently cancels stragglers from a
/// cancelled incarnation.
#[derive(Debug, Clone, Copy)]
enum ControlEvent {
    PersistenceTick { generation: u64 },
    PersistenceRetry { generation: u64 },
    UrlPollTick { generation: u64 },
}

/// Handle to a running page session. Dropping it aborts the session and
/// its timers.
pub struct SessionHandle {
    join: JoinHandle<()>,
}

impl SessionHandle {
    /// Stop the session immediately.
    pub fn abort(&self) {
        self.join.abort();
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// The per-page enforcement state machine.
///
/// All state lives on this struct and is touched only from the session's
/// event loop; there is no ambient per-page global anywhere.
pub struct PageSession {
    document: Arc<dyn Document>,
    sender: Arc<dyn RequestSink>,
    control: mpsc::UnboundedSender<ControlEvent>,
    mutations_tx: MutationSink,

    state: EngineState,
    policy: EnforcementPolicy,
    current_href: Option<String>,
    managed_nodes: Vec<NodeId>,
    last_url: String,
    has_initialized: bool,
    applying: bool,
    latest_request: Option<RequestToken>,
    observer: Option<ObserverId>,

    persistence_generation: u64,
    persistence_attempt: u32,
    persistence_task: Option<JoinHandle<()>>,
    url_poll_generation: u64,
    url_poll_task: Option<JoinHandle<()>>,
}

impl PageSession {
    /// Spawn enforcement for a page.
    ///
    /// The session resolves immediately (the host attaches pages once
    /// their document is ready) and then reacts to resolver pushes,
    /// observed mutations, timers, navigations, and theme changes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExcludedHost`] when the page lives on the
    /// product's own demo host.
    pub fn spawn(
        document: Arc<dyn Document>,
        sender: Arc<dyn RequestSink>,
        responses: PageReceiver,
    ) -> EngineResult<SessionHandle> {
        let url = document.url();
        if let Some(host) = host_of(&url) {
            if host == EXCLUDED_HOST {
                info!(host, "refusing to enforce on the demo host");
                return Err(EngineError::ExcludedHost { host });
            }
        }

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (mutations_tx, mutations_rx) = mpsc::unbounded_channel();
        let navigations = document.navigations();
        let themes = document.color_scheme_changes();

        let session = Self {
            document,
            sender,
            control: control_tx,
            mutations_tx,
            state: EngineState::Idle,
            policy: EnforcementPolicy::default(),
            current_href: None,
            managed_nodes: Vec::new(),
            last_url: url,
            has_initialized: false,
            applying: false,
            latest_request: None,
            observer: None,
            persistence_generation: 0,
            persistence_attempt: 0,
            persistence_task: None,
            url_poll_generation: 0,
            url_poll_task: None,
        };

        let join = tokio::spawn(session.run(responses, control_rx, mutations_rx, navigations, themes));
        Ok(SessionHandle { join })
    }

    async fn run(
        mut self,
        mut responses: PageReceiver,
        mut control: mpsc::UnboundedReceiver<ControlEvent>,
        mut mutations: mpsc::UnboundedReceiver<MutationBatch>,
        mut navigations: mpsc::UnboundedReceiver<NavigationEvent>,
        mut themes: mpsc::UnboundedReceiver<ColorScheme>,
    ) {
        self.initialize(false).await;

        loop {
            tokio::select! {
                Some((token, push)) = responses.recv() => self.handle_response(token, push),
                Some(batch) = mutations.recv() => self.handle_mutation(&batch),
                Some(event) = navigations.recv() => self.handle_navigation(&event).await,
                Some(scheme) = themes.recv() => self.handle_theme_change(scheme).await,
                Some(event) = control.recv() => self.handle_control(event).await,
                else => break,
            }
        }
    }

    /// Ask the resolver which favicon applies to the current page.
    ///
    /// A non-forced attempt while one is already pending is dropped;
    /// URL and theme changes force through with a fresh request token,
    /// which is what invalidates any response still in flight.
    async fn initialize(&mut self, force: bool) {
        if self.has_initialized && !force {
            debug!("already initialized, skipping");
            return;
        }
        if self.state == EngineState::Initializing && !force {
            debug!("initialization already in flight, dropping");
            return;
        }

        self.state = EngineState::Initializing;
        self.has_initialized = true;

        let url = self.document.url();
        let color_scheme = Some(self.document.color_scheme());
        debug!(url = %url, "requesting favicon resolution");

        let request = EngineRequest::ReplaceFavicon { color_scheme, url };
        match send_with_retry(
            self.sender.as_ref(),
            request,
            SEND_ATTEMPTS,
            SEND_INITIAL_DELAY,
        )
        .await
        {
            Ok(token) => {
                self.latest_request = Some(token);
            }
            Err(_) => {
                // Already logged by the transport; fail open and leave
                // whatever favicon was last applied.
                self.state = EngineState::Idle;
            }
        }
    }

    fn handle_response(&mut self, token: RequestToken, push: ResolverPush) {
        if self.latest_request != Some(token) {
            debug!(%token, "discarding stale resolution response");
            return;
        }

        let ResolverPush::SetFavicon {
            img_url,
            replace_strategy,
        } = push;

        let Some(img_url) = img_url else {
            self.stand_down();
            return;
        };

        if let Some(strategy) = replace_strategy {
            self.policy = strategy;
        }

        self.state = EngineState::Active;
        let policy = self.policy.clone();
        self.apply(&img_url, &policy);

        self.persistence_attempt = 0;
        self.setup_persistence();
        self.reset_observer();
        self.setup_url_watch();

        self.state = EngineState::Defending;
    }

    /// Stand down: stop every timer and the observer, reset flags, and
    /// leave whatever favicon tags are currently in the page untouched.
    fn stand_down(&mut self) {
        info!("no favicon applies here, standing down");
        self.clear_persistence();
        self.clear_url_poll();
        if let Some(observer) = self.observer.take() {
            self.document.disconnect(observer);
        }
        self.current_href = None;
        self.managed_nodes.clear();
        self.has_initialized = false;
        self.applying = false;
        self.state = EngineState::Idle;
    }

    /// One re-apply per observed batch; defense is deliberately coarse
    /// and does not inspect what changed.
    fn handle_mutation(&mut self, batch: &MutationBatch) {
        let Some(href) = self.current_href.clone() else {
            error!("mutation observed with no favicon to defend, ignoring");
            return;
        };
        debug!(records = batch.len(), "mutation observed, re-applying favicon");
        let policy = self.policy.clone();
        self.apply(&href, &policy);
    }

    async fn handle_navigation(&mut self, event: &NavigationEvent) {
        if !self.policy.url_change_detection.enabled {
            debug!("url change detection disabled, ignoring navigation");
            return;
        }
        debug!(?event, "navigation reported");
        self.check_url_change().await;
    }

    async fn handle_theme_change(&mut self, scheme: ColorScheme) {
        info!(scheme = %scheme, "color scheme changed, re-initializing");
        self.clear_persistence();
        self.has_initialized = false;
        self.initialize(true).await;
    }

    async fn handle_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::PersistenceTick { generation }
                if generation == self.persistence_generation =>
            {
                self.persistence_check();
            }
            ControlEvent::PersistenceRetry { generation }
                if generation == self.persistence_generation =>
            {
                self.persistence_retry();
            }
            ControlEvent::UrlPollTick { generation } if generation == self.url_poll_generation => {
                self.check_url_change().await;
            }
            // A tick from a cancelled timer incarnation.
            _ => {}
        }
    }

    /// Apply the favicon to the page.
    ///
    /// Reentrancy-guarded, and bracketed: a connected observer is
    /// disconnected before the engine's own writes and reconnected when
    /// the guard drops, on every exit path.
    fn apply(&mut self, img_url: &str, policy: &EnforcementPolicy) {
        if self.applying {
            info!("apply already in progress, skipping");
            return;
        }
        self.applying = true;

        let reconnect = match self.observer.take() {
            Some(observer) => {
                debug!("temporarily disconnecting mutation observer");
                self.document.disconnect(observer);
                true
            }
            None => false,
        };

        let mut guard = ApplyGuard {
            session: self,
            reconnect,
            options: ObserveOptions::from_watch(&policy.observe_mutations),
        };
        guard.run(img_url, policy);
    }

    fn reset_observer(&mut self) {
        if let Some(observer) = self.observer.take() {
            self.document.disconnect(observer);
        }
        if self.policy.observe_mutations.enabled && self.has_initialized {
            debug!("connecting mutation observer");
            let options = ObserveOptions::from_watch(&self.policy.observe_mutations);
            self.observer = Some(self.document.observe(options, self.mutations_tx.clone()));
        }
    }

    fn setup_persistence(&mut self) {
        self.clear_persistence();
        let Some(interval) = jittered_interval(&self.policy.persistence) else {
            debug!("persistence checking disabled");
            return;
        };

        let generation = self.persistence_generation;
        let control = self.control.clone();
        debug!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "persistence checking armed");
        self.persistence_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if control
                    .send(ControlEvent::PersistenceTick { generation })
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    /// Bump the persistence generation (cancelling in-flight ticks and
    /// pending retries) and stop the interval task.
    fn clear_persistence(&mut self) {
        self.persistence_generation += 1;
        if let Some(task) = self.persistence_task.take() {
            task.abort();
        }
    }

    fn persistence_check(&mut self) {
        let Some(href) = self.current_href.clone() else {
            return;
        };
        let head = self.document.head();
        let Some(reason) =
            persistence_violation(&head, &self.managed_nodes, &href, &self.policy)
        else {
            return;
        };
        debug!(reason, "persistence check failed");
        self.clear_persistence();

        let Some(limit) = self.policy.persistence.retry_limit else {
            info!("persistence violated with no retry budget, giving up");
            self.settle_after_give_up();
            return;
        };

        if self.persistence_attempt < limit {
            self.persistence_attempt += 1;
            let attempt = self.persistence_attempt;
            info!(attempt, "scheduling persistence retry");
            self.state = EngineState::Retrying { attempt };

            let generation = self.persistence_generation;
            let control = self.control.clone();
            let delay = Duration::from_millis(rand::rng().random_range(0..RETRY_JITTER_MS));
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = control.send(ControlEvent::PersistenceRetry { generation });
            });
        } else {
            info!(limit, "persistence retry limit reached, giving up");
            self.settle_after_give_up();
        }
    }

    /// Re-run the full persistence setup: one re-apply of the last-known
    /// favicon, then a fresh jittered interval.
    fn persistence_retry(&mut self) {
        let Some(href) = self.current_href.clone() else {
            return;
        };
        info!(attempt = self.persistence_attempt, "re-running persistence setup");
        let policy = self.policy.clone();
        self.apply(&href, &policy);
        self.setup_persistence();
        self.state = EngineState::Defending;
    }

    fn settle_after_give_up(&mut self) {
        self.state = if self.observer.is_some() {
            EngineState::Defending
        } else {
            EngineState::Idle
        };
    }

    fn setup_url_watch(&mut self) {
        self.clear_url_poll();
        if !self.policy.url_change_detection.enabled {
            debug!("url change detection disabled");
            return;
        }
        let interval_ms = self.policy.url_change_detection.check_interval_time;
        if interval_ms == 0 {
            return;
        }

        self.url_poll_generation += 1;
        let generation = self.url_poll_generation;
        let control = self.control.clone();
        let interval = Duration::from_millis(interval_ms);
        self.url_poll_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if control
                    .send(ControlEvent::UrlPollTick { generation })
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    fn clear_url_poll(&mut self) {
        self.url_poll_generation += 1;
        if let Some(task) = self.url_poll_task.take() {
            task.abort();
        }
    }

    async fn check_url_change(&mut self) {
        let current = self.document.url();
        if current == self.last_url {
            return;
        }
        info!(from = %self.last_url, to = %current, "url changed, re-initializing");
        self.last_url = current;
        self.clear_persistence();
        self.state = EngineState::Idle;
        self.has_initialized = false;
        self.initialize(true).await;
    }
}

/// RAII guard around the apply step: restores the reentrancy flag and
/// reconnects the observer on every exit path, including unwinds.
struct ApplyGuard<'a> {
    session: &'a mut PageSession,
    reconnect: bool,
    options: ObserveOptions,
}

impl ApplyGuard<'_> {
    fn run(&mut self, img_url: &str, policy: &EnforcementPolicy) {
        let document = Arc::clone(&self.session.document);

        if policy.remove_existing_icons {
            cleanup_existing_icons(document.as_ref());
        } else {
            debug!("leaving existing favicon declarations in place");
        }

        // Drop any previously managed tags before re-injecting.
        for element in document.head() {
            if element.has_class(MANAGED_CLASS) {
                document.remove(element.id);
            }
        }
        self.session.managed_nodes.clear();

        let link = LinkInit::new("icon", img_url)
            .with_type("image/png")
            .with_class(MANAGED_CLASS);

        if policy.add_shortcut_link {
            let shortcut = link.clone_with_rel("shortcut icon");
            let id = document.append_link(shortcut);
            self.session.managed_nodes.push(id);
        }
        let id = document.append_link(link);
        self.session.managed_nodes.push(id);

        self.session.current_href = Some(img_url.to_string());

        if policy.add_css_hiding && !hiding_style_present(&document.head()) {
            document.append_style(HIDING_STYLE_ID, &hiding_css());
        }

        info!("favicon applied");
    }
}

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        if self.reconnect {
            debug!("reconnecting mutation observer");
            let sink = self.session.mutations_tx.clone();
            self.session.observer = Some(
                self.session
                    .document
                    .observe(self.options.clone(), sink),
            );
        }
        self.session.applying = false;
    }
}

/// Extract the lowercased host of a URL, ignoring scheme, port, path,
/// query, and fragment.
fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default();
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

//! The bridge coordinator.
//!
//! Owns one capability registry, one execution engine, and a pluggable
//! transport. Inbound protocol messages become registry/engine calls; their
//! outcomes go back out as correlated results. Registration changes are
//! announced to the agent side, and a connect preamble re-announces the full
//! catalogue whenever a transport session is (re-)established.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock as StdRwLock, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::Value;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::errors::{codes, BridgeError};
use crate::execution::context::{AgentInfo, ContextSeed, UserInfo};
use crate::execution::envelope::EnvelopeError;
use crate::execution::ExecutionEngine;
use crate::protocol::messages::{DecodeError, Envelope, MessageBody, ResultPayload};
use crate::registry::{
    CapabilityHandler, CapabilityRegistry, CatalogSnapshot, ComponentDefinition,
    ComponentImplementation, FunctionDefinition, FunctionImplementation,
};
use crate::transport::{Inbound, MessageTransport};

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
    Disposed,
}

/// Handlers accompanying a component registration: an optional update
/// handler plus one handler per declared action.
#[derive(Clone, Default)]
pub struct ComponentHandlers {
    pub update: Option<CapabilityHandler>,
    pub actions: IndexMap<String, CapabilityHandler>,
}

impl ComponentHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update(mut self, handler: CapabilityHandler) -> Self {
        self.update = Some(handler);
        self
    }

    pub fn with_action(mut self, name: impl Into<String>, handler: CapabilityHandler) -> Self {
        self.actions.insert(name.into(), handler);
        self
    }
}

pub struct AgentBridge {
    config: BridgeConfig,
    session_id: String,
    registry: Arc<RwLock<CapabilityRegistry>>,
    engine: ExecutionEngine,
    state: Mutex<BridgeState>,
    transport: StdRwLock<Option<Arc<dyn MessageTransport>>>,
    /// Catalogue cache kept in step with the registry by the single writer;
    /// read synchronously by the transport's connect preamble.
    latest_snapshot: StdRwLock<CatalogSnapshot>,
    /// Whether any announcement has been sent (register vs update kind).
    announced_any: AtomicBool,
    /// Whether a non-empty announcement has been sent (empty-suppression).
    announced_nonempty: AtomicBool,
    session_user: StdRwLock<Option<UserInfo>>,
    disposed_tx: watch::Sender<bool>,
}

impl AgentBridge {
    /// Coordinator with its own registry.
    pub fn new(config: BridgeConfig) -> Arc<Self> {
        Self::with_registry(config, Arc::new(RwLock::new(CapabilityRegistry::new())))
    }

    /// Coordinator over an externally owned registry. Disposal tears down
    /// the coordinator and transport only; the registry's lifetime belongs
    /// to whoever constructed it.
    pub fn with_registry(config: BridgeConfig, registry: Arc<RwLock<CapabilityRegistry>>) -> Arc<Self> {
        let engine = ExecutionEngine::new(registry.clone(), config.application.clone())
            .with_detailed_errors(config.detailed_errors);
        let (disposed_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            session_id: Uuid::new_v4().to_string(),
            registry,
            engine,
            state: Mutex::new(BridgeState::Uninitialized),
            transport: StdRwLock::new(None),
            latest_snapshot: StdRwLock::new(CatalogSnapshot::default()),
            announced_any: AtomicBool::new(false),
            announced_nonempty: AtomicBool::new(false),
            session_user: StdRwLock::new(None),
            disposed_tx,
        })
    }

    /// Stable for the coordinator's lifetime.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock().expect("state lock poisoned")
    }

    pub fn registry(&self) -> Arc<RwLock<CapabilityRegistry>> {
        self.registry.clone()
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Authenticated user the embedding application vouches for; flows into
    /// the execution context of subsequent inbound commands.
    pub fn set_session_user(&self, user: Option<UserInfo>) {
        *self.session_user.write().expect("user lock poisoned") = user;
    }

    fn ensure_not_disposed(&self) -> Result<(), BridgeError> {
        if self.state() == BridgeState::Disposed {
            Err(BridgeError::Disposed)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: BridgeState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    // ---- capability registration -------------------------------------------------

    pub async fn register_function(
        &self,
        definition: FunctionDefinition,
        handler: CapabilityHandler,
    ) -> Result<(), BridgeError> {
        self.ensure_not_disposed()?;
        let snapshot = {
            let mut registry = self.registry.write().await;
            registry.register_function(FunctionImplementation { definition, handler })?;
            registry.snapshot()
        };
        self.catalogue_changed(snapshot);
        Ok(())
    }

    pub async fn register_component(
        &self,
        definition: ComponentDefinition,
        handlers: ComponentHandlers,
    ) -> Result<(), BridgeError> {
        self.ensure_not_disposed()?;
        let snapshot = {
            let mut registry = self.registry.write().await;
            registry.register_component(ComponentImplementation {
                definition,
                update_handler: handlers.update,
                action_handlers: handlers.actions,
            })?;
            registry.snapshot()
        };
        self.catalogue_changed(snapshot);
        Ok(())
    }

    /// Idempotent; only an actual removal triggers an announcement.
    pub async fn unregister_function(&self, name: &str) {
        let snapshot = {
            let mut registry = self.registry.write().await;
            if !registry.unregister_function(name) {
                return;
            }
            registry.snapshot()
        };
        self.catalogue_changed(snapshot);
    }

    /// Idempotent; only an actual removal triggers an announcement.
    pub async fn unregister_component(&self, id: &str) {
        let snapshot = {
            let mut registry = self.registry.write().await;
            if !registry.unregister_component(id) {
                return;
            }
            registry.snapshot()
        };
        self.catalogue_changed(snapshot);
    }

    // ---- announcements -----------------------------------------------------------

    fn catalogue_changed(&self, snapshot: CatalogSnapshot) {
        *self
            .latest_snapshot
            .write()
            .expect("snapshot lock poisoned") = snapshot.clone();
        let transport = self.transport.read().expect("transport lock poisoned").clone();
        let Some(transport) = transport else { return };
        if let Some(envelope) = self.announcement_envelope(snapshot, false) {
            transport.send(envelope);
        }
    }

    /// Build the announcement for a catalogue snapshot, or `None` while an
    /// empty announcement is still suppressed. `fresh` marks a (re)connected
    /// session, which always gets the `capability_register` kind.
    fn announcement_envelope(&self, snapshot: CatalogSnapshot, fresh: bool) -> Option<Envelope> {
        let nonempty = !snapshot.is_empty();
        if !nonempty && !self.announced_nonempty.load(Ordering::SeqCst) {
            debug!("suppressing empty capability announcement");
            return None;
        }
        let first = !self.announced_any.swap(true, Ordering::SeqCst);
        if nonempty {
            self.announced_nonempty.store(true, Ordering::SeqCst);
        }
        let body = if first || fresh {
            MessageBody::CapabilityRegister(snapshot)
        } else {
            MessageBody::CapabilityUpdate(snapshot)
        };
        Some(Envelope::new(body).with_session(self.session_id.clone()))
    }

    /// Full re-announcement for a fresh session (inbound `session_connect`).
    async fn announce_fresh(&self) {
        let snapshot = self.registry.read().await.snapshot();
        if let Some(envelope) = self.announcement_envelope(snapshot, true) {
            self.send_through_transport(envelope);
        }
    }

    // ---- transport ---------------------------------------------------------------

    /// Attach a transport and connect it. The initial dial error, if any, is
    /// propagated; the transport's own retry policy governs later drops.
    pub async fn attach_transport(
        self: &Arc<Self>,
        transport: Arc<dyn MessageTransport>,
    ) -> Result<(), BridgeError> {
        self.ensure_not_disposed()?;
        self.set_state(BridgeState::Connecting);

        // Preamble: announce the current catalogue at the head of every
        // (re)established session, ahead of the queued backlog.
        let weak = Arc::downgrade(self);
        transport.set_connect_preamble(Arc::new(move || match weak.upgrade() {
            Some(bridge) => {
                let snapshot = bridge
                    .latest_snapshot
                    .read()
                    .expect("snapshot lock poisoned")
                    .clone();
                bridge
                    .announcement_envelope(snapshot, true)
                    .into_iter()
                    .collect()
            }
            None => Vec::new(),
        }));

        // Inbound messages drain through a channel into a dedicated
        // dispatch loop, keeping transport callbacks non-blocking.
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        transport.on_message(Arc::new(move |inbound| {
            let _ = inbound_tx.send(inbound);
        }));
        tokio::spawn(dispatch_loop(self.clone(), inbound_rx));
        tokio::spawn(watch_status(Arc::downgrade(self), transport.subscribe_status()));
        if self.config.heartbeat.enabled {
            tokio::spawn(heartbeat_loop(
                Arc::downgrade(self),
                self.config.heartbeat.interval_ms,
            ));
        }

        *self.transport.write().expect("transport lock poisoned") = Some(transport.clone());
        transport.connect().await?;
        Ok(())
    }

    fn send_through_transport(&self, envelope: Envelope) {
        let transport = self.transport.read().expect("transport lock poisoned").clone();
        match transport {
            Some(transport) => transport.send(envelope),
            None => warn!(kind = envelope.body.kind(), "no transport attached, message dropped"),
        }
    }

    /// Unsolicited state-change notification to the agent side.
    pub fn emit_event(&self, name: impl Into<String>, data: Value) -> Result<(), BridgeError> {
        self.ensure_not_disposed()?;
        if self.transport.read().expect("transport lock poisoned").is_none() {
            return Err(BridgeError::NoTransport);
        }
        let envelope = Envelope::new(MessageBody::Event {
            name: name.into(),
            data,
        })
        .with_session(self.session_id.clone());
        self.send_through_transport(envelope);
        Ok(())
    }

    /// Tear down the coordinator and its transport. Registry contents are
    /// untouched.
    pub async fn dispose(&self) {
        self.set_state(BridgeState::Disposed);
        let _ = self.disposed_tx.send(true);
        let transport = self.transport.write().expect("transport lock poisoned").take();
        if let Some(transport) = transport {
            if let Err(error) = transport.disconnect().await {
                warn!(%error, "transport disconnect failed during dispose");
            }
        }
        info!(session_id = %self.session_id, "bridge disposed");
    }

    // ---- inbound dispatch --------------------------------------------------------

    fn seed_for(&self, envelope: &Envelope) -> ContextSeed {
        ContextSeed {
            agent: Some(AgentInfo::new(
                envelope
                    .session_id
                    .clone()
                    .unwrap_or_else(|| self.session_id.clone()),
            )),
            user: self.session_user.read().expect("user lock poisoned").clone(),
            ip: None,
        }
    }

    fn respond(&self, request: &Envelope, body: MessageBody) {
        let envelope =
            Envelope::replying_to(request, body).with_session(self.session_id.clone());
        self.send_through_transport(envelope);
    }

    async fn handle_envelope(&self, envelope: Envelope) {
        let seed = self.seed_for(&envelope);
        match &envelope.body {
            MessageBody::CallFunction { name, parameters } => {
                let outcome = self
                    .engine
                    .execute(name, parameters.clone(), seed)
                    .await;
                self.respond(
                    &envelope,
                    MessageBody::FunctionResult(ResultPayload::from(outcome)),
                );
            }
            MessageBody::UpdateComponent {
                component_id,
                properties,
            } => {
                let outcome = self
                    .engine
                    .execute_component_update(component_id, properties.clone(), seed)
                    .await;
                self.respond(
                    &envelope,
                    MessageBody::ComponentUpdateResult(ResultPayload::from(outcome)),
                );
            }
            MessageBody::CallComponentAction {
                component_id,
                action,
                parameters,
            } => {
                let outcome = self
                    .engine
                    .execute_component_action(component_id, action, parameters.clone(), seed)
                    .await;
                self.respond(
                    &envelope,
                    MessageBody::ComponentActionResult(ResultPayload::from(outcome)),
                );
            }
            MessageBody::QueryCapabilities { filter } => {
                let result = self.registry.read().await.query(filter);
                self.respond(&envelope, MessageBody::CapabilitiesResult(result));
            }
            MessageBody::SessionConnect => {
                info!(
                    peer_session = envelope.session_id.as_deref().unwrap_or("unknown"),
                    "agent session connected"
                );
                self.announce_fresh().await;
            }
            MessageBody::SessionHeartbeat => {
                self.respond(&envelope, MessageBody::SessionHeartbeat);
            }
            MessageBody::SessionDisconnect { reason } => {
                info!(
                    reason = reason.as_deref().unwrap_or("none given"),
                    "agent session disconnected"
                );
            }
            MessageBody::Error { error } => {
                warn!(code = %error.code, message = %error.message, "protocol error from peer");
            }
            // App-to-agent kinds arriving inbound have no meaning here.
            MessageBody::CapabilityRegister(_)
            | MessageBody::CapabilityUpdate(_)
            | MessageBody::FunctionResult(_)
            | MessageBody::ComponentUpdateResult(_)
            | MessageBody::ComponentActionResult(_)
            | MessageBody::CapabilitiesResult(_)
            | MessageBody::Event { .. } => {
                debug!(
                    kind = envelope.body.kind(),
                    "ignoring inbound message of outbound-only kind"
                );
            }
        }
    }

    fn handle_invalid(&self, error: DecodeError) {
        match error {
            DecodeError::UnknownKind { kind, .. } => {
                debug!(%kind, "ignoring message of unrecognized kind");
            }
            DecodeError::Malformed { id: Some(id), reason } => {
                warn!(message_id = %id, %reason, "malformed inbound message, replying with error");
                let details = if self.config.detailed_errors {
                    Some(Value::String(reason))
                } else {
                    None
                };
                let mut envelope = Envelope::new(MessageBody::Error {
                    error: EnvelopeError::new(
                        codes::PROCESSING_ERROR,
                        "failed to process inbound message",
                    )
                    .with_details(details),
                })
                .with_session(self.session_id.clone());
                envelope.correlation_id = Some(id);
                self.send_through_transport(envelope);
            }
            DecodeError::Malformed { id: None, reason } => {
                warn!(%reason, "malformed inbound message with no recoverable id, dropped");
            }
        }
    }
}

/// Consume inbound messages until the transport side closes or the bridge is
/// disposed. Nothing that happens in here may take the loop down.
async fn dispatch_loop(bridge: Arc<AgentBridge>, mut inbound_rx: mpsc::UnboundedReceiver<Inbound>) {
    let mut disposed = bridge.disposed_tx.subscribe();
    loop {
        tokio::select! {
            inbound = inbound_rx.recv() => match inbound {
                Some(Inbound::Envelope(envelope)) => bridge.handle_envelope(envelope).await,
                Some(Inbound::Invalid(error)) => bridge.handle_invalid(error),
                None => break,
            },
            _ = disposed.changed() => {
                if *disposed.borrow() {
                    break;
                }
            }
        }
    }
    debug!("dispatch loop stopped");
}

/// Mirror transport status into the coordinator state machine.
async fn watch_status(
    bridge: Weak<AgentBridge>,
    mut status_rx: watch::Receiver<crate::transport::TransportStatus>,
) {
    use crate::transport::TransportStatus;
    while status_rx.changed().await.is_ok() {
        let status = *status_rx.borrow();
        let Some(bridge) = bridge.upgrade() else { return };
        if bridge.state() == BridgeState::Disposed {
            return;
        }
        match status {
            TransportStatus::Connected => bridge.set_state(BridgeState::Connected),
            TransportStatus::Connecting => bridge.set_state(BridgeState::Connecting),
            TransportStatus::Disconnected | TransportStatus::Failed => {
                bridge.set_state(BridgeState::Disconnected)
            }
        }
    }
}

/// Advisory heartbeat; sends while connected, stops when the bridge goes
/// away or is disposed.
async fn heartbeat_loop(bridge: Weak<AgentBridge>, interval_ms: u64) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(100)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(bridge) = bridge.upgrade() else { return };
        match bridge.state() {
            BridgeState::Disposed => return,
            BridgeState::Connected => {
                let envelope = Envelope::new(MessageBody::SessionHeartbeat)
                    .with_session(bridge.session_id.clone());
                bridge.send_through_transport(envelope);
            }
            _ => {}
        }
    }
}

// ---- optional default instance --------------------------------------------------

static DEFAULT_BRIDGE: OnceCell<Arc<AgentBridge>> = OnceCell::new();

/// Install a process-wide default coordinator. Purely a convenience for
/// embedders that want one; everything in this crate takes explicit
/// references and never reaches for this.
pub fn init_default(config: BridgeConfig) -> Arc<AgentBridge> {
    DEFAULT_BRIDGE.get_or_init(|| AgentBridge::new(config)).clone()
}

pub fn default_bridge() -> Option<Arc<AgentBridge>> {
    DEFAULT_BRIDGE.get().cloned()
}

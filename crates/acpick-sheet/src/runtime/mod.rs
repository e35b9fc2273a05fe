//! Sheet runtime: owns state, runs the event loop, executes effects.
//!
//! This is the "Elm runtime" boundary: all collaborator calls happen here.
//! The reducer stays pure and produces effects; this module executes them.
//!
//! ## Inbox Pattern
//!
//! - UI actions, delegate callbacks, subscription forwarders and task
//!   results all send `SheetEvent`s to `inbox_tx`
//! - `run` drains `inbox_rx` one event at a time, so every mutation happens
//!   on a single task
//! - Handles and delegate controllers share a `Presence` guard. The loop
//!   ends on dismissal, or once the last guard is dropped and no task is
//!   in flight
//! - After each event the derived `SheetModel` is published to the store,
//!   then the effects run
//!
//! Structure:
//! - `mod.rs`: `SheetRuntime`, event loop, effect dispatch
//! - `inbox.rs`: inbox channel types
//! - `handlers.rs`: collaborator calls as pure async functions
//! - `subscriptions.rs`: directory and profile-cache forwarders

mod handlers;
mod inbox;
mod subscriptions;

use std::future::Future;
use std::sync::{Arc, Weak};

use acpick_core::collaborators::{AccountDirectory, DeviceGate, ProfileCache, SigninDelegate};
use acpick_core::telemetry::Telemetry;
use acpick_core::{Account, AccountId, LaunchMode};
pub(crate) use inbox::Presence;
pub use inbox::{SheetEventReceiver, SheetEventSender};
use subscriptions::Sources;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, Span, debug, info, info_span};
use uuid::Uuid;

use crate::common::{TaskCompleted, TaskId};
use crate::effects::SheetEffect;
use crate::error::SheetError;
use crate::events::{SheetEvent, TaskResult};
use crate::handle::{SheetHandle, SigninStateController};
use crate::model::{ModelStore, SheetModel, ViewState};
use crate::state::{Launch, SheetOptions, SheetState};
use crate::update;

/// Called the first time a seamless sign-in needs visible UI.
pub type RevealCallback = Box<dyn FnOnce() + Send>;

/// Everything the sheet talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn AccountDirectory>,
    pub profiles: Arc<dyn ProfileCache>,
    pub delegate: Arc<dyn SigninDelegate>,
    pub device_gate: Arc<dyn DeviceGate>,
    pub telemetry: Arc<dyn Telemetry>,
}

/// One picker invocation.
pub struct SheetRequest {
    pub mode: LaunchMode,
    /// Preferred account for interactive modes, sign-in target for seamless.
    pub account: Option<AccountId>,
    pub reveal: Option<RevealCallback>,
}

impl SheetRequest {
    pub fn new(mode: LaunchMode) -> Self {
        Self {
            mode,
            account: None,
            reveal: None,
        }
    }

    #[must_use]
    pub fn with_account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    #[must_use]
    pub fn on_reveal(mut self, reveal: impl FnOnce() + Send + 'static) -> Self {
        self.reveal = Some(Box::new(reveal));
        self
    }
}

/// How the invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetOutcome {
    pub view: ViewState,
    /// Last account reported as signed in, if any.
    pub signed_in: Option<Account>,
}

pub struct SheetRuntime {
    state: SheetState,
    collaborators: Collaborators,
    store: ModelStore,
    inbox_tx: SheetEventSender,
    inbox_rx: SheetEventReceiver,
    /// Held until `run` starts so handles can be taken before it.
    presence: Option<Presence>,
    presence_weak: Weak<DropGuard>,
    /// Cancelled when the last `Presence` is dropped.
    abandoned: CancellationToken,
    /// Effects produced by `update::start`, executed when `run` begins.
    initial_effects: Vec<SheetEffect>,
    reveal: Option<RevealCallback>,
    signin_started: Option<Instant>,
    cancel: CancellationToken,
    forwarders: Vec<JoinHandle<()>>,
    span: Span,
}

impl SheetRuntime {
    /// Builds the sheet and subscribes to directory and profile changes.
    ///
    /// Fails if a seamless request has no target, an empty directory, or a
    /// target that is not on the device.
    pub async fn start(request: SheetRequest, collaborators: Collaborators) -> Result<Self, SheetError> {
        let span = info_span!("sheet", session = %Uuid::new_v4());
        Self::build(request, collaborators, span.clone())
            .instrument(span)
            .await
    }

    async fn build(
        request: SheetRequest,
        collaborators: Collaborators,
        span: Span,
    ) -> Result<Self, SheetError> {
        let SheetRequest {
            mode,
            account,
            reveal,
        } = request;

        // Subscribe before the first fetch so no change slips in between.
        let directory_changes = collaborators.directory.subscribe();
        let profile_changes = collaborators.profiles.subscribe();

        let accounts = collaborators.directory.accounts().await;
        let profiles = handlers::display_map(collaborators.profiles.as_ref(), &accounts);
        let options = SheetOptions {
            requires_device_unlock: collaborators.device_gate.is_required(),
            delegate_handles_add_account: collaborators.delegate.can_handle_add_account(),
        };
        let launch = Launch::from_mode(mode, accounts, account)?;
        let mut state = SheetState::new(launch, profiles, options)?;
        let initial_effects = update::start(&mut state);
        info!(
            mode = mode.display_name(),
            view = state.view.as_str(),
            accounts = state.accounts.len(),
            "sheet started"
        );

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let abandoned = CancellationToken::new();
        let presence = Arc::new(abandoned.clone().drop_guard());
        let presence_weak = Arc::downgrade(&presence);
        let sources = || Sources {
            directory: Arc::clone(&collaborators.directory),
            profiles: Arc::clone(&collaborators.profiles),
            inbox: inbox_tx.clone(),
            cancel: cancel.clone(),
        };
        let forwarders = vec![
            tokio::spawn(
                subscriptions::forward_directory(directory_changes, sources())
                    .instrument(span.clone()),
            ),
            tokio::spawn(
                subscriptions::forward_profiles(profile_changes, sources()).instrument(span.clone()),
            ),
        ];

        let store = ModelStore::new(state.model());
        Ok(Self {
            state,
            collaborators,
            store,
            inbox_tx,
            inbox_rx,
            presence: Some(presence),
            presence_weak,
            abandoned,
            initial_effects,
            reveal,
            signin_started: None,
            cancel,
            forwarders,
            span,
        })
    }

    /// UI action surface for this invocation.
    ///
    /// Handles keep the sheet alive: once every handle is dropped and no
    /// task is in flight, `run` returns without dismissing.
    pub fn handle(&self) -> SheetHandle {
        SheetHandle::new(self.inbox_tx.clone(), self.presence())
    }

    fn presence(&self) -> Option<Presence> {
        self.presence
            .clone()
            .or_else(|| self.presence_weak.upgrade())
    }

    /// Observes the view-state store.
    pub fn subscribe(&self) -> watch::Receiver<SheetModel> {
        self.store.subscribe()
    }

    pub fn model(&self) -> SheetModel {
        self.store.current()
    }

    /// Runs until the sheet is dismissed, then unsubscribes.
    pub async fn run(mut self) -> SheetOutcome {
        let span = self.span.clone();
        self.event_loop().instrument(span).await
    }

    async fn event_loop(&mut self) -> SheetOutcome {
        // Publish before running effects so callbacks observe the new model.
        let effects = std::mem::take(&mut self.initial_effects);
        self.store.publish(self.state.model());
        self.execute_effects(effects);
        self.presence = None;

        while !self.state.finished {
            let idle = !self.state.tasks.is_any_running();
            let next = tokio::select! {
                biased;
                event = self.inbox_rx.recv() => event,
                () = self.abandoned.cancelled(), if idle => None,
            };
            let Some(event) = next else {
                info!("no handle left and nothing in flight, closing sheet");
                break;
            };
            let effects = update::update(&mut self.state, event);
            self.store.publish(self.state.model());
            self.execute_effects(effects);
        }

        self.shutdown().await;
        let outcome = SheetOutcome {
            view: self.state.view,
            signed_in: self.state.signed_in.clone(),
        };
        info!(view = outcome.view.as_str(), signed_in = outcome.signed_in.is_some(), "sheet finished");
        outcome
    }

    /// Cancels the forwarders and waits for them to drop their receivers.
    async fn shutdown(&mut self) {
        self.cancel.cancel();
        for forwarder in self.forwarders.drain(..) {
            if let Err(err) = forwarder.await {
                debug!(error = %err, "subscription forwarder ended abnormally");
            }
        }
    }

    // ========================================================================
    // Effect Dispatch
    // ========================================================================

    fn execute_effects(&mut self, effects: Vec<SheetEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    /// Spawns a collaborator call and sends its result back as
    /// `TaskCompleted`.
    fn spawn_task<Fut>(&self, id: TaskId, fut: Fut)
    where
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        tokio::spawn(
            async move {
                let result = fut.await;
                let kind = result.kind();
                let completed = TaskCompleted { id, result };
                if tx.send(SheetEvent::TaskCompleted { kind, completed }).is_err() {
                    debug!(?kind, "sheet closed before task finished");
                }
            }
            .instrument(self.span.clone()),
        );
    }

    fn execute_effect(&mut self, effect: SheetEffect) {
        let c = &self.collaborators;
        match effect {
            SheetEffect::RequestDeviceUnlock { task, account } => {
                let gate = Arc::clone(&c.device_gate);
                self.spawn_task(task, handlers::device_unlock(gate, account));
            }
            SheetEffect::CheckManagement { task, account } => {
                let delegate = Arc::clone(&c.delegate);
                self.spawn_task(task, handlers::check_management(delegate, account));
            }
            SheetEffect::SignIn { task, account } => {
                let delegate = Arc::clone(&c.delegate);
                self.spawn_task(task, handlers::sign_in(delegate, account));
            }
            SheetEffect::RefreshCredentials { task, account } => {
                let delegate = Arc::clone(&c.delegate);
                self.spawn_task(task, handlers::refresh_credentials(delegate, account));
            }
            SheetEffect::RequestAddAccount { task } => {
                let directory = Arc::clone(&c.directory);
                self.spawn_task(task, handlers::add_account(directory));
            }
            SheetEffect::DelegateAddAccount => c.delegate.add_account(),
            SheetEffect::SetManagementAccepted { accepted } => {
                c.delegate.set_management_accepted(accepted);
            }
            SheetEffect::NotifySigninComplete { account } => {
                if let Some(started) = self.signin_started.take() {
                    c.telemetry.record_signin_duration(started.elapsed());
                }
                let controller = Arc::new(SigninStateController::new(
                    self.inbox_tx.clone(),
                    self.presence(),
                ));
                c.delegate.on_signin_complete(&account, controller);
            }
            SheetEffect::StartSigninTimer => self.signin_started = Some(Instant::now()),
            SheetEffect::Record(action) => c.telemetry.record_action(action),
            SheetEffect::Reveal => {
                if let Some(reveal) = self.reveal.take() {
                    debug!("revealing sheet");
                    reveal();
                }
            }
            SheetEffect::AnswerBack { reply, consumed } => {
                if reply.send(consumed).is_err() {
                    debug!("back press caller went away");
                }
            }
            SheetEffect::Dismiss => c.delegate.on_dismiss(),
        }
    }
}

impl Drop for SheetRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//! Engine runtime: the single event loop that owns the model, the thread
//! registry and the dismiss timer, plus the handle the UI shell talks to.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::actors::ActorHandle;
use crate::config::Config;
use crate::filter::resolve_title;
use crate::presenter::DismissTimer;
use crate::registry::ThreadRegistry;
use crate::render::PresenterView;
use crate::store::DocumentStore;
use crate::tea::{update, Command, Message, Model};
use crate::thread::UserId;
use crate::view::{Route, ViewContext};
use crate::{plog, plog_debug, plog_error, plog_trace, Error, Result};

pub struct Engine;

impl Engine {
    /// Start watching every thread `user_id` participates in. Must be called
    /// inside a tokio runtime.
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        user_id: UserId,
        config: Config,
    ) -> Result<EngineHandle> {
        config.validate()?;
        if user_id.is_empty() {
            return Err(Error::Validation("user id must not be empty".to_string()));
        }
        plog!("Engine::spawn user={}", user_id);

        let cancel = CancellationToken::new();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel::<Message>();
        let (nav_tx, nav_rx) = crossbeam_channel::unbounded::<Route>();

        let mut model = Model::new(user_id.clone(), config.clone());
        let (view_tx, view_rx) = watch::channel(model.snapshot());
        model.dirty = false;

        let mut registry = ThreadRegistry::new(
            store.clone(),
            user_id,
            &config,
            msg_tx.clone(),
            cancel.child_token(),
        );
        registry.start();

        let runtime = EngineLoop {
            store,
            registry,
            timer: None,
            msg_tx: msg_tx.clone(),
            view_tx,
            nav_tx,
            cancel: cancel.clone(),
            lookup_timeout: config.lookup_timeout(),
        };
        let join = tokio::spawn(runtime.run(model, msg_rx));

        Ok(EngineHandle {
            msg_tx,
            view_rx,
            nav_rx,
            actor: ActorHandle::new(cancel, join),
        })
    }
}

struct EngineLoop {
    store: Arc<dyn DocumentStore>,
    registry: ThreadRegistry,
    timer: Option<DismissTimer>,
    msg_tx: mpsc::UnboundedSender<Message>,
    view_tx: watch::Sender<PresenterView>,
    nav_tx: Sender<Route>,
    cancel: CancellationToken,
    lookup_timeout: Duration,
}

impl EngineLoop {
    async fn run(mut self, mut model: Model, mut msg_rx: mpsc::UnboundedReceiver<Message>) {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                msg = msg_rx.recv() => {
                    let Some(msg) = msg else { break };
                    // Tails and lookups queued before their watcher was stopped.
                    if let Some(key) = msg.thread_key() {
                        if !self.registry.contains(&key) {
                            plog_debug!("Dropping message for unwatched thread {}", key);
                            continue;
                        }
                    }
                    for cmd in update(&mut model, msg) {
                        self.execute(&mut model, cmd);
                    }
                    if model.dirty {
                        self.publish(&model);
                        model.dirty = false;
                    }
                }
            }
        }

        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        // Late lookups and timers see a closed channel from here on.
        drop(msg_rx);
        let watching = self.registry.len();
        if let Err(e) = self.registry.shutdown().await {
            plog_error!("Engine shutdown: {}", e);
        }
        plog!(
            "Engine stopped: watched={} observed={} surfaced={} discarded={}",
            watching,
            model.stats.observed,
            model.stats.surfaced,
            model.stats.discarded
        );
    }

    fn execute(&mut self, model: &mut Model, cmd: Command) {
        match cmd {
            Command::Reconcile { kind, threads } => {
                self.registry.reconcile(kind, threads);
                if model.watching != self.registry.len() {
                    model.watching = self.registry.len();
                    model.dirty = true;
                }
            }

            Command::ResolveTitle(request) => {
                plog_trace!("Command::ResolveTitle {:?}", request);
                let store = self.store.clone();
                let tx = self.msg_tx.clone();
                let token = self.cancel.clone();
                let timeout = self.lookup_timeout;
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {}
                        event = resolve_title(store, request, timeout) => {
                            let _ = tx.send(Message::TitleResolved { event });
                        }
                    }
                });
            }

            Command::ArmDismissTimer { generation, after } => {
                plog_trace!("Command::ArmDismissTimer generation={}", generation);
                if let Some(previous) = self.timer.take() {
                    previous.cancel();
                }
                self.timer = Some(DismissTimer::arm(
                    generation,
                    after,
                    &self.cancel,
                    self.msg_tx.clone(),
                ));
            }

            Command::CancelDismissTimer => {
                if let Some(timer) = self.timer.take() {
                    plog_trace!("Command::CancelDismissTimer generation={}", timer.generation());
                    timer.cancel();
                }
            }

            Command::Navigate(route) => {
                plog_debug!("Command::Navigate {}", route);
                if self.nav_tx.send(route).is_err() {
                    plog_debug!("Navigation receiver gone");
                }
            }
        }
    }

    fn publish(&self, model: &Model) {
        self.view_tx.send_replace(model.snapshot());
    }
}

/// Handle held by the UI shell. Dropping it stops the engine; call
/// [`EngineHandle::shutdown`] to also wait until every subscription is
/// released.
pub struct EngineHandle {
    msg_tx: mpsc::UnboundedSender<Message>,
    view_rx: watch::Receiver<PresenterView>,
    nav_rx: Receiver<Route>,
    actor: ActorHandle,
}

impl EngineHandle {
    fn send(&self, msg: Message) -> Result<()> {
        self.msg_tx.send(msg).map_err(|_| Error::EngineClosed)
    }

    /// Report a navigation. Applies to every tail evaluated afterwards.
    pub fn set_view(&self, view: ViewContext) -> Result<()> {
        self.send(Message::ViewChanged(view))
    }

    /// Activate the visible notification identified by `generation`.
    pub fn activate(&self, generation: u64) -> Result<()> {
        self.send(Message::Activate { generation })
    }

    pub fn dismiss(&self, generation: u64) -> Result<()> {
        self.send(Message::Dismiss { generation })
    }

    /// Latest published snapshot.
    pub fn view(&self) -> PresenterView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<PresenterView> {
        self.view_rx.clone()
    }

    /// Routes produced by activations, in order.
    pub fn navigation(&self) -> Receiver<Route> {
        self.nav_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.actor.is_cancelled() && !self.msg_tx.is_closed()
    }

    /// Stop the engine: cancels every watcher and the dismiss timer, then
    /// waits for all subscriptions to be released.
    pub async fn shutdown(self) -> Result<()> {
        plog_debug!("EngineHandle::shutdown");
        self.actor.stop().await
    }
}

//! Dashboard runtime.
//!
//! [`Dashboard::start`] spawns three tasks:
//!
//! 1. the push channel connection task,
//! 2. the poll fallback loop,
//! 3. one runtime loop that exclusively owns the [`Reconciler`], the log
//!    ring and the notification slot.
//!
//! The first two only talk to the runtime loop through channels, so every
//! merge runs to completion inside that one loop with no interleaving.
//! Consumers observe the result through a [`watch`] of [`DashboardState`]
//! and a [`broadcast`] of admitted changes.

use std::sync::Arc;
use std::time::Duration;

use taskboard_api::TaskboardApi;
use taskboard_channel::events::ChannelEvent;
use taskboard_channel::messages::PushMessage;
use taskboard_channel::reconnect::{ReconnectConfig, DEFAULT_RECONNECT_DELAY};
use taskboard_channel::transport::{ChannelHandle, PushChannel};
use taskboard_core::role::{Actor, RoleProfile};
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::actions::Actions;
use crate::log_ring::{LogRing, SequencedLog, DEFAULT_LOG_CAPACITY};
use crate::notify::{
    notification_for, Notification, NotificationPresenter, DEFAULT_NOTIFICATION_DURATION,
};
use crate::poller::{PollOutcome, Poller};
use crate::reconciler::{Change, Incremental, Reconciler, Snapshot, Update};

/// Buffered changes per broadcast subscriber before it starts lagging.
const CHANGE_CAPACITY: usize = 1024;

/// Inbound push events buffered ahead of the runtime loop.
const CHANNEL_EVENT_CAPACITY: usize = 256;

/// How long shutdown waits for each task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for one dashboard session.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// REST base URL including the `/api` prefix.
    pub api_url: String,
    /// Push channel base URL; the role's channel path is appended.
    pub ws_url: String,
    pub actor: Actor,
    /// Overrides the role's default poll interval.
    pub poll_interval: Option<Duration>,
    pub reconnect_delay: Duration,
    pub notification_duration: Duration,
    pub log_capacity: usize,
}

impl RuntimeConfig {
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>, actor: Actor) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            actor,
            poll_interval: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            notification_duration: DEFAULT_NOTIFICATION_DURATION,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    fn profile(&self) -> RoleProfile {
        let profile = RoleProfile::for_actor(&self.actor);
        match self.poll_interval {
            Some(interval) => profile.with_poll_interval(interval),
            None => profile,
        }
    }
}

/// Everything a view needs, published after every admitted change.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub snapshot: Arc<Snapshot>,
    /// Oldest first.
    pub logs: Vec<SequencedLog>,
    pub notification: Option<Notification>,
    pub connected: bool,
}

pub struct Dashboard;

impl Dashboard {
    /// Start a session. Must be called inside a Tokio runtime.
    pub fn start(config: RuntimeConfig) -> DashboardHandle {
        let profile = Arc::new(config.profile());
        let actor = config.actor.clone();
        let api = TaskboardApi::new(config.api_url.clone()).for_actor(&actor);
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());

        tracing::info!(
            role = %profile.role,
            actor_id = actor.id,
            poll_interval_ms = profile.poll_interval.as_millis() as u64,
            "Starting dashboard",
        );

        // Push channel.
        let (channel_tx, channel_rx) = mpsc::channel(CHANNEL_EVENT_CAPACITY);
        let ws_url = format!("{}{}", config.ws_url.trim_end_matches('/'), profile.channel_path);
        let channel = PushChannel::new(
            ws_url,
            &profile.subscription_frame(&actor),
            ReconnectConfig {
                delay: config.reconnect_delay,
            },
        )
        .start(channel_tx, cancel.child_token());

        // Poll fallback.
        let (poll_tx, poll_rx) = mpsc::channel(4);
        let poller = Poller::new(api.clone(), (*profile).clone(), actor.clone());
        let poll_task = tokio::spawn(poller.run(
            poll_tx,
            Arc::clone(&refresh),
            channel.connectivity(),
            cancel.child_token(),
        ));

        // Runtime loop.
        let (admit_tx, admit_rx) = mpsc::unbounded_channel();
        let (presenter, expired_rx) = NotificationPresenter::new(config.notification_duration);
        let (state_tx, state_rx) = watch::channel(DashboardState::default());
        let (changes_tx, _) = broadcast::channel(CHANGE_CAPACITY);

        let mut reconciler = Reconciler::new();
        let forward = changes_tx.clone();
        reconciler.subscribe(move |change: &Change| {
            // Err only means nobody is subscribed.
            let _ = forward.send(change.clone());
        });

        let runtime = Runtime {
            actor: actor.clone(),
            reconciler,
            logs: LogRing::new(config.log_capacity),
            presenter,
            connected: false,
            state: state_tx,
            refresh: Arc::clone(&refresh),
        };
        let runtime_task = tokio::spawn(runtime.run(
            Inbox {
                channel: channel_rx,
                polls: poll_rx,
                admitted: admit_rx,
                expired: expired_rx,
            },
            cancel.clone(),
        ));

        let actions = Actions::new(api, Arc::clone(&profile), admit_tx, Arc::clone(&refresh));

        DashboardHandle {
            actor,
            profile,
            state: state_rx,
            changes: changes_tx,
            actions,
            refresh,
            channel,
            tasks: vec![runtime_task, poll_task],
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
        }
    }
}

/// Control surface of a running dashboard.
///
/// Dropping the handle cancels every task; call [`DashboardHandle::shutdown`]
/// to also wait for them to finish.
pub struct DashboardHandle {
    actor: Actor,
    profile: Arc<RoleProfile>,
    state: watch::Receiver<DashboardState>,
    changes: broadcast::Sender<Change>,
    actions: Actions,
    refresh: Arc<Notify>,
    channel: ChannelHandle,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
}

impl DashboardHandle {
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn profile(&self) -> &RoleProfile {
        &self.profile
    }

    /// A receiver that sees every published state.
    pub fn state(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    /// A copy of the latest state.
    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Subscribe to admitted changes from now on.
    pub fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Ask the poll fallback for an immediate tick.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Close the channel, cancel the poll interval, reconnect and
    /// notification timers, and wait for every task to exit.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down dashboard");
        self.cancel.cancel();
        self.channel.close().await;
        for mut task in self.tasks {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Dashboard task panicked"),
                Err(_) => {
                    tracing::warn!("Dashboard task did not stop in time, aborting");
                    task.abort();
                }
            }
        }
    }
}

/// Receiving ends drained by the runtime loop.
struct Inbox {
    channel: mpsc::Receiver<ChannelEvent>,
    polls: mpsc::Receiver<PollOutcome>,
    admitted: mpsc::UnboundedReceiver<Incremental>,
    expired: mpsc::UnboundedReceiver<u64>,
}

/// Sole owner of the mutable dashboard state.
struct Runtime {
    actor: Actor,
    reconciler: Reconciler,
    logs: LogRing,
    presenter: NotificationPresenter,
    connected: bool,
    state: watch::Sender<DashboardState>,
    refresh: Arc<Notify>,
}

impl Runtime {
    async fn run(mut self, mut inbox: Inbox, cancel: CancellationToken) {
        loop {
            let dirty = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(event) = inbox.channel.recv() => self.on_channel_event(event),
                Some(outcome) = inbox.polls.recv() => self.on_poll(outcome),
                Some(update) = inbox.admitted.recv() => self.apply(Update::Incremental(update)),
                Some(id) = inbox.expired.recv() => self.presenter.expire(id),
            };
            if dirty {
                self.publish();
            }
        }

        self.presenter.clear();
        self.connected = false;
        self.publish();
        tracing::info!("Dashboard runtime stopped");
    }

    fn on_channel_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Connected => {
                tracing::info!("Push channel connected");
                self.connected = true;
                true
            }
            ChannelEvent::Disconnected => {
                tracing::warn!("Push channel disconnected; poll fallback is the sole source");
                self.connected = false;
                true
            }
            ChannelEvent::Message(message) => self.on_push(message),
        }
    }

    fn on_push(&mut self, message: PushMessage) -> bool {
        let refresh = matches!(message, PushMessage::Task { .. }) || message.is_role_scoped();
        let dirty = match message {
            PushMessage::Task { task, .. } => self.apply(Update::Incremental(Incremental::Task(task))),
            PushMessage::Worker(worker) => {
                self.apply(Update::Incremental(Incremental::Worker(worker)))
            }
            PushMessage::Log(entry) => self.logs.push(entry).is_some(),
            PushMessage::TaskAssigned(patch)
            | PushMessage::TaskAssignedBroadcast(patch)
            | PushMessage::TaskCompleted(patch)
            | PushMessage::TaskFailed(patch) => {
                self.apply(Update::Incremental(Incremental::TaskPatch(patch)))
            }
        };
        if refresh {
            self.refresh.notify_one();
        }
        dirty
    }

    fn on_poll(&mut self, outcome: PollOutcome) -> bool {
        let mut dirty = false;
        if !outcome.snapshot.is_empty() {
            dirty |= self.apply(Update::BulkSnapshot(outcome.snapshot));
        }
        if let Some(window) = outcome.logs {
            dirty |= self.logs.sync_window(window) > 0;
        }
        dirty
    }

    /// Merge an update and raise a notification for the last change that
    /// deserves one. Returns `true` when anything was admitted.
    fn apply(&mut self, update: Update) -> bool {
        let changes = self.reconciler.apply(update);
        let alert = changes
            .iter()
            .rev()
            .find_map(|change| notification_for(change, &self.actor));
        if let Some((severity, text)) = alert {
            self.presenter.show(severity, text);
        }
        !changes.is_empty()
    }

    fn publish(&self) {
        self.state.send_replace(DashboardState {
            snapshot: self.reconciler.snapshot(),
            logs: self.logs.to_vec(),
            notification: self.presenter.current().cloned(),
            connected: self.connected,
        });
    }
}

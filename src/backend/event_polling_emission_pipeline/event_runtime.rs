use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::common::constants::{
    WORKSPACE_EVENTS_HEARTBEAT_INTERVAL, WORKSPACE_EVENTS_POLL_INTERVAL,
    WORKSPACE_EVENTS_WRITE_TIMEOUT,
};
use crate::backend::workspace_discovery_context::discovery_runtime::ResolvedWorkspace;

use super::event_scope::{
    build_watch_targets, source_label_for_path, PollSnapshots, SseFrame, WatchTarget,
};
use super::event_sink::EventSink;

#[derive(Debug, Clone)]
pub struct NotifierOptions {
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// A client that accepts no bytes for this long is treated as gone.
    pub write_timeout: Duration,
    pub native_watch: bool,
}

impl Default for NotifierOptions {
    fn default() -> Self {
        Self {
            poll_interval: WORKSPACE_EVENTS_POLL_INTERVAL,
            heartbeat_interval: WORKSPACE_EVENTS_HEARTBEAT_INTERVAL,
            write_timeout: WORKSPACE_EVENTS_WRITE_TIMEOUT,
            native_watch: true,
        }
    }
}

struct NativeSubscriptions {
    watcher: RecommendedWatcher,
    targets: Vec<WatchTarget>,
}

struct ConnectionResources {
    heartbeat: JoinHandle<()>,
    poller: JoinHandle<()>,
    native: Option<NativeSubscriptions>,
}

#[derive(Default)]
struct ConnectionTeardown {
    resources: Mutex<Option<ConnectionResources>>,
}

impl ConnectionTeardown {
    fn arm(&self, resources: ConnectionResources) {
        let mut slot = match self.resources.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(resources);
    }

    /// Releases every timer and subscription. Only the first call does any work.
    fn run(&self) -> bool {
        let taken = match self.resources.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(resources) = taken else {
            return false;
        };

        resources.heartbeat.abort();
        resources.poller.abort();

        if let Some(NativeSubscriptions {
            mut watcher,
            targets,
        }) = resources.native
        {
            for target in &targets {
                if let Err(error) = watcher.unwatch(&target.path) {
                    tracing::debug!(
                        "[workspace-events] unwatch {} failed during teardown: {error}",
                        target.label
                    );
                }
            }
            drop(watcher);
        }

        true
    }
}

/// Handle to one open change stream. Cloning shares the same connection.
#[derive(Clone)]
pub struct WorkspaceEventConnection {
    shutdown: CancellationToken,
    teardown: Arc<ConnectionTeardown>,
}

impl WorkspaceEventConnection {
    /// Closes the connection. Returns `true` only for the call that performed teardown.
    pub fn close(&self) -> bool {
        self.shutdown.cancel();
        self.teardown.run()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }
}

pub struct WorkspaceEventStream {
    frames: mpsc::UnboundedReceiver<SseFrame>,
    connection: WorkspaceEventConnection,
}

impl WorkspaceEventStream {
    pub async fn next_frame(&mut self) -> Option<SseFrame> {
        tokio::select! {
            biased;
            frame = self.frames.recv() => frame,
            _ = self.connection.closed() => None,
        }
    }

    pub fn connection(&self) -> &WorkspaceEventConnection {
        &self.connection
    }
}

impl Drop for WorkspaceEventStream {
    fn drop(&mut self) {
        self.connection.close();
    }
}

fn register_native_subscriptions(
    targets: &[WatchTarget],
    sink: &EventSink,
) -> Option<NativeSubscriptions> {
    let callback_sink = sink.clone();
    let callback_targets = targets.to_vec();
    let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
        match result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }

                let label = event
                    .paths
                    .first()
                    .and_then(|path| source_label_for_path(&callback_targets, path))
                    .unwrap_or_else(|| "workspace".to_string());
                callback_sink.emit_change(&format!("watch:{label}"));
            }
            Err(error) => {
                let label = error
                    .paths
                    .first()
                    .and_then(|path| source_label_for_path(&callback_targets, path))
                    .unwrap_or_else(|| "workspace".to_string());
                tracing::warn!("[workspace-events] native watch error on {label}: {error}");
                callback_sink.emit_change(&format!("watch-error:{label}"));
            }
        }
    });

    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(error) => {
            tracing::warn!(
                "[workspace-events] native notifications unavailable, polling only: {error}"
            );
            sink.emit_change("watch-error:workspace");
            return None;
        }
    };

    let mut registered = Vec::new();
    for target in targets {
        match watcher.watch(&target.path, RecursiveMode::NonRecursive) {
            Ok(()) => registered.push(target.clone()),
            Err(error) => {
                tracing::warn!(
                    "[workspace-events] could not watch {}; relying on polling: {error}",
                    target.label
                );
                sink.emit_change(&format!("watch-error:{}", target.label));
            }
        }
    }

    Some(NativeSubscriptions {
        watcher,
        targets: registered,
    })
}

async fn run_poll_loop(
    targets: Vec<WatchTarget>,
    mut snapshots: PollSnapshots,
    sink: EventSink,
    shutdown: CancellationToken,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if shutdown.is_cancelled() {
            break;
        }

        for label in snapshots.refresh(&targets) {
            if !sink.emit_change(&format!("poll:{label}")) {
                return;
            }
        }
    }
}

async fn run_heartbeat_loop(
    sink: EventSink,
    shutdown: CancellationToken,
    heartbeat_interval: Duration,
) {
    let mut ticker = tokio::time::interval(heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if !sink.emit_heartbeat() {
                    break;
                }
            }
        }
    }
}

/// Opens a change stream for an already resolved root. The first frame is
/// always `ready`; must be called from inside a tokio runtime.
pub fn open_workspace_event_stream(
    resolved: &ResolvedWorkspace,
    request_id: &str,
    options: &NotifierOptions,
) -> WorkspaceEventStream {
    let targets = build_watch_targets(&resolved.workspace_root, &resolved.known_worktrees);
    let (tx, frames) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let sink = EventSink::new(tx, shutdown.clone());

    sink.emit_ready(request_id, &resolved.workspace_root);

    let snapshots = PollSnapshots::capture(&targets);
    let native = if options.native_watch {
        register_native_subscriptions(&targets, &sink)
    } else {
        None
    };

    let poller = tokio::spawn(run_poll_loop(
        targets.clone(),
        snapshots,
        sink.clone(),
        shutdown.clone(),
        options.poll_interval,
    ));
    let heartbeat = tokio::spawn(run_heartbeat_loop(
        sink,
        shutdown.clone(),
        options.heartbeat_interval,
    ));

    let teardown = Arc::new(ConnectionTeardown::default());
    teardown.arm(ConnectionResources {
        heartbeat,
        poller,
        native,
    });

    let supervisor_shutdown = shutdown.clone();
    let supervisor_teardown = teardown.clone();
    tokio::spawn(async move {
        supervisor_shutdown.cancelled().await;
        supervisor_teardown.run();
    });

    tracing::info!(
        "[workspace-events] watching {} targets under {}",
        targets.len(),
        resolved.workspace_root.display()
    );

    WorkspaceEventStream {
        frames,
        connection: WorkspaceEventConnection { shutdown, teardown },
    }
}

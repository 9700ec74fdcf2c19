use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::common::constants::{
    WORKSPACE_CHANGE_EVENT, WORKSPACE_EVENTS_KIND, WORKSPACE_READY_EVENT,
};

use super::event_scope::SseFrame;

/// Single ordered writer shared by the native channel, the poller and the heartbeat.
#[derive(Clone)]
pub(crate) struct EventSink {
    inner: Arc<EventSinkInner>,
}

struct EventSinkInner {
    index: Mutex<u64>,
    tx: mpsc::UnboundedSender<SseFrame>,
    shutdown: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SseFrame>, shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(EventSinkInner {
                index: Mutex::new(0),
                tx,
                shutdown,
            }),
        }
    }

    pub(crate) fn emit_ready(&self, request_id: &str, workspace_root: &Path) -> bool {
        self.send(SseFrame::Event {
            name: WORKSPACE_READY_EVENT,
            data: serde_json::json!({
                "requestId": request_id,
                "workspaceRoot": workspace_root.display().to_string(),
                "kind": WORKSPACE_EVENTS_KIND,
            })
            .to_string(),
        })
    }

    pub(crate) fn emit_change(&self, source: &str) -> bool {
        if self.inner.shutdown.is_cancelled() {
            return false;
        }

        // Index assignment and enqueue happen under one lock so frames leave in index order.
        let mut index = match self.inner.index.lock() {
            Ok(index) => index,
            Err(poisoned) => poisoned.into_inner(),
        };
        *index += 1;

        self.send(SseFrame::Event {
            name: WORKSPACE_CHANGE_EVENT,
            data: serde_json::json!({
                "index": *index,
                "source": source,
                "kind": WORKSPACE_EVENTS_KIND,
            })
            .to_string(),
        })
    }

    pub(crate) fn emit_heartbeat(&self) -> bool {
        self.send(SseFrame::Comment("heartbeat"))
    }

    fn send(&self, frame: SseFrame) -> bool {
        if self.inner.shutdown.is_cancelled() {
            return false;
        }

        if self.inner.tx.send(frame).is_err() {
            tracing::debug!("[workspace-events] outbound stream closed; shutting connection down");
            self.inner.shutdown.cancel();
            return false;
        }

        true
    }
}

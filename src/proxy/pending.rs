use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use serde_json::Value;

use crate::foundation::error::{FleetError, FleetResult};

/// Correlated request family; ids are unique within a family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    PickObjects,
    Dispose,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PickObjects => "pickObjects",
            Self::Dispose => "dispose",
        }
    }
}

type Slot = Sender<FleetResult<Value>>;

#[derive(Default)]
struct Entries {
    slots: HashMap<(RequestKind, u64), Slot>,
    closed: bool,
}

/// Outstanding correlated requests of one proxy, keyed by `(kind, id)`.
#[derive(Default)]
pub struct PendingTable {
    next_id: AtomicU64,
    entries: Mutex<Entries>,
}

impl PendingTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh id of `kind` and an entry awaiting its response.
    ///
    /// Once the table is closed the returned request is already disconnected.
    pub fn register(self: &Arc<Self>, kind: RequestKind) -> Correlated {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        {
            let mut entries = self.entries();
            if !entries.closed {
                entries.slots.insert((kind, id), tx);
            }
        }
        Correlated {
            id,
            kind,
            rx,
            table: Arc::downgrade(self),
            settled: false,
        }
    }

    /// Complete `(kind, id)`. Returns `false` when nothing was waiting for it.
    pub fn resolve(&self, kind: RequestKind, id: u64, result: FleetResult<Value>) -> bool {
        let Some(slot) = self.entries().slots.remove(&(kind, id)) else {
            return false;
        };
        slot.send(result).is_ok()
    }

    /// Forget `(kind, id)`; a response arriving afterwards is ignored.
    pub fn cancel(&self, kind: RequestKind, id: u64) -> bool {
        self.entries().slots.remove(&(kind, id)).is_some()
    }

    /// Reject everything outstanding with [`FleetError::Disconnected`] and refuse new entries.
    pub fn clear(&self, reason: &str) -> usize {
        let drained: Vec<_> = {
            let mut entries = self.entries();
            entries.closed = true;
            entries.slots.drain().collect()
        };
        let count = drained.len();
        for (_, slot) in drained {
            let _ = slot.send(Err(FleetError::disconnected(reason)));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries().slots.len()
    }

    pub fn is_closed(&self) -> bool {
        self.entries().closed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caller's half of one correlated request.
///
/// Dropping it before the response arrives cancels the entry.
pub struct Correlated {
    id: u64,
    kind: RequestKind,
    rx: Receiver<FleetResult<Value>>,
    table: Weak<PendingTable>,
    settled: bool,
}

impl Correlated {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Block until the response arrives or `deadline` passes.
    pub fn wait_until(mut self, deadline: Option<Instant>) -> FleetResult<Value> {
        let received = match deadline {
            None => self.rx.recv().map_err(|_| self.gone()),
            Some(deadline) => self
                .rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .map_err(|err| match err {
                    RecvTimeoutError::Timeout => FleetError::timeout(format!(
                        "{} request {} got no response",
                        self.kind.as_str(),
                        self.id
                    )),
                    RecvTimeoutError::Disconnected => self.gone(),
                }),
        };
        let result = received?;
        self.settled = true;
        result
    }

    fn gone(&self) -> FleetError {
        FleetError::disconnected(format!(
            "{} request {} lost its execution context",
            self.kind.as_str(),
            self.id
        ))
    }
}

impl Drop for Correlated {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(table) = self.table.upgrade()
            && table.cancel(self.kind, self.id)
        {
            tracing::debug!(kind = self.kind.as_str(), id = self.id, "cancelled pending request");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/proxy/pending.rs"]
mod tests;

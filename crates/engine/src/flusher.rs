//! Background flusher: drains the immutable memtable queue to disk.
//!
//! A single thread is spawned for the engine's lifetime, parked on a
//! `crossbeam_channel::recv()` between drains rather than polling. Every
//! memtable rotation sends a [`Message::Wake`]; because the channel is
//! unbounded, a wake sent while a drain is already in flight is never
//! lost — the thread simply loops again once it returns to `recv()`.

use crate::{compaction, Engine, EngineError, Shared};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};

pub(crate) enum Message {
    Wake,
    Shutdown,
}

pub(crate) fn spawn(shared: Arc<Shared>) -> (Sender<Message>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = std::thread::spawn(move || run(shared, rx));
    (tx, handle)
}

fn run(shared: Arc<Shared>, rx: Receiver<Message>) {
    loop {
        match rx.recv() {
            Ok(Message::Wake) => {
                if let Err(e) = drain(&shared) {
                    error!(error = %e, "background flush failed, halting this drain");
                }
            }
            Ok(Message::Shutdown) | Err(_) => {
                info!("flusher thread shutting down");
                return;
            }
        }
    }
}

/// Drains the immutable queue to disk, one memtable at a time, then
/// truncates the WAL and runs opportunistic compaction checks.
///
/// On a write failure partway through, the offending memtable is pushed
/// back onto the front of the queue and the WAL is left untruncated, so
/// recovery on restart will replay it again.
pub(crate) fn drain(shared: &Arc<Shared>) -> Result<(), EngineError> {
    shared.is_flushing.store(true, Ordering::Release);
    let result = drain_inner(shared);
    shared.is_flushing.store(false, Ordering::Release);
    result
}

fn drain_inner(shared: &Arc<Shared>) -> Result<(), EngineError> {
    loop {
        let next = {
            let mut state = shared.state.lock().expect("write lock poisoned");
            match state.immutable.pop_front() {
                Some(mem) => {
                    let counter = state.next_counter;
                    state.next_counter += 1;
                    Some((mem, counter))
                }
                None => None,
            }
        };

        let (mem, counter) = match next {
            Some(pair) => pair,
            None => break,
        };

        let write_result = {
            let _guard = shared.sst_lock.write().expect("sstable lock poisoned");
            sstable::write_from_memtable(&shared.dir, counter, &mem, &shared.bloom)
        };

        if let Err(e) = write_result {
            // Leave the memtable in memory and the WAL untruncated; re-queue
            // at the head so the next drain attempt retries it first.
            let mut state = shared.state.lock().expect("write lock poisoned");
            state.immutable.push_front(mem);
            return Err(e.into());
        }
    }

    {
        let mut wal = shared.wal.lock().expect("wal lock poisoned");
        wal.clear()?;
    }

    if let Err(e) = compaction::run_opportunistic_checks(shared) {
        error!(error = %e, "opportunistic compaction check failed");
    }

    Ok(())
}

impl Engine {
    /// Returns `true` if the background flusher's run-flag is currently
    /// set (a drain is in progress).
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.shared.is_flushing.load(Ordering::Acquire)
    }
}

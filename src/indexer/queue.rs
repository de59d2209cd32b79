//! FIFO of indexing requests drained by one background worker.
//!
//! Every submitted batch gets an [`IndexingTicket`] that receives exactly
//! one result. Cancelling bumps an epoch: batches queued under an older
//! epoch are answered with `Cancelled` without running, and the batch in
//! flight stops at its next record boundary.

use crate::error::{Result, SearchError};
use crate::index::record::IndexableRecord;
use crate::indexer::{BatchOutcome, Indexer};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

struct Job {
    id: u64,
    epoch: u64,
    records: Vec<IndexableRecord>,
    reply: Sender<Result<BatchOutcome>>,
}

#[derive(Default)]
struct QueueState {
    /// Submitted but not yet answered, including the batch in flight
    pending: usize,
    /// Highest ticket id answered so far
    finished: u64,
    worker_exited: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    changed: Condvar,
    epoch: AtomicU64,
}

/// Handle to one submitted batch
#[derive(Debug)]
pub struct IndexingTicket {
    id: u64,
    receiver: Receiver<Result<BatchOutcome>>,
}

impl IndexingTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the batch has been committed, rejected or cancelled
    pub fn wait(self) -> Result<BatchOutcome> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(SearchError::Engine("indexing worker stopped".into())))
    }

    /// The result, if it is already available
    pub fn try_result(&self) -> Option<Result<BatchOutcome>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(SearchError::Engine("indexing worker stopped".into())))
            }
        }
    }
}

/// Serializes all writes to one database through a worker thread
pub struct IndexingQueue {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
    schema: Arc<crate::index::schema::Schema>,
    next_id: Mutex<u64>,
}

impl IndexingQueue {
    /// Move `indexer` onto a new worker thread
    pub fn new(indexer: Indexer) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let shared = Arc::new(Shared::default());
        let schema = Arc::clone(indexer.schema());

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("locus-indexer".into())
            .spawn(move || run_worker(indexer, receiver, worker_shared))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            shared,
            schema,
            next_id: Mutex::new(0),
        })
    }

    /// Queue a batch of records
    pub fn submit(&self, records: Vec<IndexableRecord>) -> IndexingTicket {
        let (reply, receiver) = mpsc::channel();

        // Ids are handed out under the lock so channel order matches id order
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let id = *next_id;

        let job = Job {
            id,
            epoch: self.shared.epoch.load(Ordering::SeqCst),
            records,
            reply,
        };

        self.shared.state.lock().pending += 1;
        let sent = match &self.sender {
            Some(sender) => sender.send(job).map_err(|err| err.0),
            None => Err(job),
        };

        if let Err(job) = sent {
            let _ = job
                .reply
                .send(Err(SearchError::Engine("indexing worker stopped".into())));
            let mut state = self.shared.state.lock();
            state.pending -= 1;
            state.finished = state.finished.max(id);
            self.shared.changed.notify_all();
        }

        debug!(ticket = id, "indexing batch queued");
        IndexingTicket { id, receiver }
    }

    pub fn add_or_replace_record(&self, record: IndexableRecord) -> IndexingTicket {
        self.submit(vec![record])
    }

    pub fn add_or_replace_records(&self, records: Vec<IndexableRecord>) -> IndexingTicket {
        self.submit(records)
    }

    /// Queue removal of the document with this external id
    pub fn delete_record(&self, id: &str) -> Result<IndexingTicket> {
        let record = IndexableRecord::delete(Arc::clone(&self.schema), id)?;
        Ok(self.submit(vec![record]))
    }

    /// Batches not yet answered, including the one in progress
    pub fn queued_operation_count(&self) -> usize {
        self.shared.state.lock().pending
    }

    /// Cancel everything submitted so far. Each affected ticket receives
    /// `Cancelled`; batches submitted afterwards run normally.
    pub fn cancel_indexing(&self) {
        let _guard = self.next_id.lock();
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch, "indexing cancelled");
    }

    /// Block until every batch submitted before this call has been answered
    pub fn wait_until_indexing_is_finished(&self) {
        let target = *self.next_id.lock();
        let mut state = self.shared.state.lock();
        while state.finished < target && !state.worker_exited {
            self.shared.changed.wait(&mut state);
        }
    }
}

impl Drop for IndexingQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("indexing worker panicked");
            }
        }
    }
}

/// Marks the worker gone however it leaves, panics included, so waiters
/// wake up and nothing is reported as still queued
struct WorkerExit(Arc<Shared>);

impl Drop for WorkerExit {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.worker_exited = true;
        state.pending = 0;
        self.0.changed.notify_all();
    }
}

fn run_worker(mut indexer: Indexer, receiver: Receiver<Job>, shared: Arc<Shared>) {
    let _exit = WorkerExit(Arc::clone(&shared));
    for job in receiver {
        let result = if job.epoch < shared.epoch.load(Ordering::SeqCst) {
            Err(SearchError::Cancelled)
        } else {
            let probe = || shared.epoch.load(Ordering::SeqCst) != job.epoch;
            indexer.apply_batch(&job.records, &probe)
        };

        if let Err(err) = &result {
            debug!(ticket = job.id, error = %err, "indexing batch failed");
        }
        // The caller may have dropped its ticket
        let _ = job.reply.send(result);

        let mut state = shared.state.lock();
        state.pending = state.pending.saturating_sub(1);
        state.finished = state.finished.max(job.id);
        shared.changed.notify_all();
    }
}

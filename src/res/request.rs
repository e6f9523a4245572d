//! Asynchronous positional reads.
//!
//! A read request owns its destination buffer for as long as it is in
//! flight: the buffer goes in with `read_async` and comes back, filled, from
//! `wait`. The number of requests in flight is bounded; once every slot is
//! taken `read_async` hands the buffer back with `SubmitError::SlotsFull` and
//! the caller retries later.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::Result;
use crate::sched::prelude::{Latch, SpinLatch, WorkId, WorkerPool};
use crate::utils::prelude::ObjectPool;

use super::file::FileHandle;

impl_handle!(ReadId);

/// Buffer handed back by a finished request, with the byte count or error.
pub type ReadResult = (Vec<u8>, io::Result<usize>);

/// Why a read could not be queued.
#[derive(Debug)]
pub enum SubmitError {
    /// Every request slot is busy. Retry after collecting a finished read.
    SlotsFull(Vec<u8>),
    /// A passing condition. Retry as is.
    Transient(Vec<u8>),
    /// The read can never succeed.
    Failed(io::Error),
}

/// The async read capability the load pipeline is built on.
pub trait AsyncIo: Send + Sync {
    /// Number of requests that may be in flight at once.
    fn capacity(&self) -> usize;

    /// Queues a read of `buf.len()` bytes at `offset` of `file`.
    fn read_async(
        &self,
        file: &FileHandle,
        offset: u64,
        buf: Vec<u8>,
    ) -> ::std::result::Result<ReadId, SubmitError>;

    /// Returns true once `wait` on `id` would not block.
    fn poll(&self, id: ReadId) -> bool;

    /// Blocks until the read finished and releases its slot.
    fn wait(&self, id: ReadId) -> ReadResult;

    /// Asks the read to stop early. The request must still be collected
    /// with `wait`.
    fn abort(&self, id: ReadId);
}

struct Request {
    work: WorkId,
    aborted: Arc<SpinLatch>,
    result: Arc<Mutex<Option<ReadResult>>>,
}

/// `AsyncIo` running blocking reads on a dedicated worker pool.
pub struct ThreadedIo {
    requests: Mutex<ObjectPool<ReadId, Request>>,
    pool: WorkerPool,
    capacity: usize,
}

impl ThreadedIo {
    pub fn new(capacity: usize, threads: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        Ok(ThreadedIo {
            requests: Mutex::new(ObjectPool::new()),
            pool: WorkerPool::new("respak-io", threads, capacity)?,
            capacity,
        })
    }

    /// Number of requests not yet collected.
    pub fn in_flight(&self) -> usize {
        self.requests().len()
    }

    fn requests(&self) -> MutexGuard<ObjectPool<ReadId, Request>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AsyncIo for ThreadedIo {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_async(
        &self,
        file: &FileHandle,
        offset: u64,
        mut buf: Vec<u8>,
    ) -> ::std::result::Result<ReadId, SubmitError> {
        let mut requests = self.requests();
        if requests.len() >= self.capacity {
            return Err(SubmitError::SlotsFull(buf));
        }

        let aborted = Arc::new(SpinLatch::new());
        let result = Arc::new(Mutex::new(None));

        let file = file.dup();
        let abort_rx = aborted.clone();
        let result_tx = result.clone();
        let work = self
            .pool
            .submit(move || {
                let rsp = if abort_rx.is_set() {
                    Err(io::Error::new(io::ErrorKind::Interrupted, "read aborted"))
                } else {
                    file.read_at(&mut buf, offset).map_err(|err| match err {
                        crate::errors::Error::IO(err) => err,
                        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
                    })
                };

                *result_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some((buf, rsp));
            })
            .map_err(|err| SubmitError::Failed(io::Error::new(io::ErrorKind::Other, err.to_string())))?;

        Ok(requests.create(Request {
            work,
            aborted,
            result,
        }))
    }

    fn poll(&self, id: ReadId) -> bool {
        match self.requests().get(id) {
            Some(req) => self.pool.poll(req.work),
            None => true,
        }
    }

    fn wait(&self, id: ReadId) -> ReadResult {
        // The slot stays taken until the job is collected, so a concurrent
        // `read_async` never finds the worker pool full.
        let req = self.requests().get(id).map(|v| (v.work, v.result.clone()));
        match req {
            Some((work, result)) => {
                self.pool.wait(work);
                self.requests().free(id);
                let result = result.lock().unwrap_or_else(PoisonError::into_inner).take();

                result.unwrap_or_else(|| {
                    let err = io::Error::new(io::ErrorKind::Other, "read job vanished");
                    (Vec::new(), Err(err))
                })
            }
            None => {
                let err = io::Error::new(io::ErrorKind::NotFound, "unknown read request");
                (Vec::new(), Err(err))
            }
        }
    }

    fn abort(&self, id: ReadId) {
        if let Some(req) = self.requests().get(id) {
            req.aborted.set();
        }
    }
}

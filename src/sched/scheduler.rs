use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use crossbeam_deque::{Injector, Steal};

use crate::errors::*;
use crate::utils::prelude::ObjectPool;

use super::latch::{Latch, LockLatch};
use super::unwind;

impl_handle!(WorkId);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of OS threads draining a shared FIFO of jobs.
///
/// Every submitted job is named with a `WorkId` that stays valid until it is
/// collected by `wait`. Jobs that finished but were not collected yet still
/// count against `queue_limit`.
pub struct WorkerPool {
    shared: Arc<Shared>,
    threads: Vec<thread::JoinHandle<()>>,
}

struct Shared {
    name: String,
    injector: Injector<Job>,
    watcher: Watcher,
    terminated: AtomicBool,
    works: Mutex<ObjectPool<WorkId, Arc<LockLatch>>>,
    queue_limit: usize,
}

impl WorkerPool {
    /// Spawns `num` worker threads named after `name`.
    pub fn new<T: Into<String>>(name: T, num: usize, queue_limit: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            name: name.into(),
            injector: Injector::new(),
            watcher: Watcher(Mutex::new(()), Condvar::new()),
            terminated: AtomicBool::new(false),
            works: Mutex::new(ObjectPool::new()),
            queue_limit: queue_limit.max(1),
        });

        let mut pool = WorkerPool {
            shared,
            threads: Vec::with_capacity(num),
        };

        for i in 0..num.max(1) {
            let shared = pool.shared.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", pool.shared.name, i))
                .spawn(move || WorkerPool::main_loop(&shared))?;
            pool.threads.push(handle);
        }

        info!(
            "[WorkerPool] started {:?} with {} threads.",
            pool.shared.name,
            pool.threads.len()
        );

        Ok(pool)
    }

    /// Number of worker threads.
    #[inline]
    pub fn threads(&self) -> usize {
        self.threads.len()
    }

    /// Queues `func`. Fails without queueing when `queue_limit` jobs are
    /// outstanding.
    pub fn submit<F>(&self, func: F) -> Result<WorkId>
    where
        F: FnOnce() + Send + 'static,
    {
        let latch = Arc::new(LockLatch::new());
        let id = {
            let mut works = self.works();
            if works.len() >= self.shared.queue_limit {
                return Err(Error::PoolExhausted(self.shared.name.clone(), works.len()));
            }

            works.create(latch.clone())
        };

        let name = self.shared.name.clone();
        let job: Job = Box::new(move || {
            if let Err(payload) = unwind::halt_unwinding(func) {
                error!(
                    "[WorkerPool] job {} in {:?} panicked: {}",
                    id,
                    name,
                    unwind::describe(payload.as_ref())
                );
            }

            latch.set();
        });

        self.shared.injector.push(job);
        self.shared.watcher.notify_one();
        Ok(id)
    }

    /// Returns true if the job has finished. Unknown ids count as finished.
    pub fn poll(&self, id: WorkId) -> bool {
        self.works()
            .get(id)
            .map(|latch| latch.is_set())
            .unwrap_or(true)
    }

    /// Blocks until the job has finished, then forgets its id.
    pub fn wait(&self, id: WorkId) {
        let latch = self.works().get(id).cloned();
        if let Some(latch) = latch {
            latch.wait();
            self.works().free(id);
        }
    }

    /// Number of submitted jobs that were not collected by `wait` yet.
    pub fn outstanding(&self) -> usize {
        self.works().len()
    }

    fn works(&self) -> ::std::sync::MutexGuard<ObjectPool<WorkId, Arc<LockLatch>>> {
        self.shared
            .works
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn main_loop(shared: &Shared) {
        loop {
            match shared.injector.steal() {
                Steal::Success(job) => job(),
                Steal::Retry => continue,
                Steal::Empty => {
                    if shared.terminated.load(Ordering::Acquire) {
                        break;
                    }

                    shared.watcher.wait_for_work(shared);
                }
            }
        }

        trace!("[WorkerPool] {:?} worker exits.", shared.name);
    }
}

impl Drop for WorkerPool {
    /// Lets queued jobs drain, then joins every worker.
    fn drop(&mut self) {
        self.shared.terminated.store(true, Ordering::Release);
        self.shared.watcher.notify_all();

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("[WorkerPool] {:?} worker died.", self.shared.name);
            }
        }
    }
}

struct Watcher(Mutex<()>, Condvar);

impl Watcher {
    fn wait_for_work(&self, shared: &Shared) {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .1
            .wait_while(guard, |_| {
                shared.injector.is_empty() && !shared.terminated.load(Ordering::Acquire)
            })
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn notify_one(&self) {
        let _guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        self.1.notify_one();
    }

    fn notify_all(&self) {
        let _guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        self.1.notify_all();
    }
}

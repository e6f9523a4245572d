//! Background decompression of package members.
//!
//! A streaming job reads the compressed bytes of one member in chunks
//! through the async read layer and feeds them to the package's decoder as
//! they arrive. Two input buffers are used, so the next chunk is read while
//! the current one is decoded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::errors::*;
use crate::sched::prelude::{Latch, SpinLatch, WorkId, WorkerPool};

use super::file::FileHandle;
use super::package::inflate::{Inflate, StreamDecompressor};
use super::request::{AsyncIo, ReadId, SubmitError};

/// State shared between a streaming job and the load that started it.
pub struct StreamJob {
    abort: SpinLatch,
    failed: AtomicBool,
    output: Mutex<Option<Vec<u8>>>,
}

impl StreamJob {
    /// Asks the job to stop at its next iteration.
    #[inline]
    pub fn abort(&self) {
        self.abort.set();
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// The decoded bytes of a job that finished successfully.
    pub fn take_output(&self) -> Option<Vec<u8>> {
        if self.is_failed() {
            return None;
        }

        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::Release);
    }
}

/// What a streaming job reads and how.
pub struct StreamSource {
    pub file: FileHandle,
    pub offset: u64,
    pub stored_len: u64,
    pub uncompressed_len: usize,
}

/// Streaming decompression on a dedicated worker pool.
pub struct Background {
    pool: WorkerPool,
    pub threshold: u64,
    pub buffer_size: usize,
}

impl Background {
    pub fn new(threads: usize, queue_limit: usize, threshold: u64, buffer_size: usize) -> Result<Self> {
        Ok(Background {
            pool: WorkerPool::new("respak-inflate", threads, queue_limit)?,
            threshold,
            buffer_size: buffer_size.max(1),
        })
    }

    /// Queues a streaming job. Fails without side effects if the pool is
    /// saturated or the destination can not be allocated.
    pub fn spawn(
        &self,
        io: Arc<dyn AsyncIo>,
        source: StreamSource,
        decoder: Box<dyn StreamDecompressor>,
    ) -> Result<(WorkId, Arc<StreamJob>)> {
        let mut output = Vec::new();
        output.try_reserve_exact(source.uncompressed_len)?;
        output.resize(source.uncompressed_len, 0);

        let job = Arc::new(StreamJob {
            abort: SpinLatch::new(),
            failed: AtomicBool::new(false),
            output: Mutex::new(None),
        });

        let buffer_size = self.buffer_size;
        let shared = job.clone();
        let work = self.pool.submit(move || {
            let mut worker = Worker {
                io: &*io,
                job: &shared,
                source,
                buffer_size,
                in_flight: VecDeque::with_capacity(2),
            };

            match worker.run(decoder, &mut output) {
                Ok(()) => {
                    *shared.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
                }
                Err(err) => {
                    debug!("[Background] streaming of {:?} failed: {}", worker.source.file.path(), err);
                    shared.fail();
                }
            }
        })?;

        Ok((work, job))
    }

    #[inline]
    pub fn poll(&self, work: WorkId) -> bool {
        self.pool.poll(work)
    }

    #[inline]
    pub fn wait(&self, work: WorkId) {
        self.pool.wait(work)
    }
}

struct Worker<'a> {
    io: &'a dyn AsyncIo,
    job: &'a StreamJob,
    source: StreamSource,
    buffer_size: usize,
    in_flight: VecDeque<(ReadId, usize)>,
}

impl<'a> Worker<'a> {
    fn run(&mut self, mut decoder: Box<dyn StreamDecompressor>, output: &mut [u8]) -> Result<()> {
        let result = self.pump(&mut *decoder, output);
        self.drain();

        result?;
        if decoder.total_out() != output.len() {
            return Err(Error::Decompression(format!(
                "stream holds {} bytes, expected {}",
                decoder.total_out(),
                output.len()
            )));
        }

        Ok(())
    }

    fn pump(&mut self, decoder: &mut dyn StreamDecompressor, output: &mut [u8]) -> Result<()> {
        let mut spares = vec![vec![0; self.buffer_size], vec![0; self.buffer_size]];
        let mut next = 0u64;

        loop {
            if self.job.abort.is_set() {
                return Err(Error::Decompression("aborted".into()));
            }

            while next < self.source.stored_len && !spares.is_empty() {
                let len = (self.source.stored_len - next).min(self.buffer_size as u64) as usize;
                let mut buf = spares.pop().unwrap_or_default();
                buf.resize(len, 0);

                let offset = self.source.offset + next;
                match self.io.read_async(&self.source.file, offset, buf) {
                    Ok(id) => {
                        self.in_flight.push_back((id, len));
                        next += len as u64;
                    }
                    Err(SubmitError::SlotsFull(buf)) | Err(SubmitError::Transient(buf)) => {
                        spares.push(buf);
                        break;
                    }
                    Err(SubmitError::Failed(err)) => return Err(err.into()),
                }
            }

            let (id, expected) = match self.in_flight.pop_front() {
                Some(v) => v,
                None if next < self.source.stored_len => {
                    thread::yield_now();
                    continue;
                }
                None => return Err(Error::Decompression("truncated stream".into())),
            };

            let (buf, rsp) = self.io.wait(id);
            match rsp {
                Ok(n) if n == expected => {}
                Ok(n) => {
                    return Err(Error::Decompression(format!(
                        "short read of {} bytes, expected {}",
                        n, expected
                    )))
                }
                Err(err) => return Err(err.into()),
            }

            match decoder.decompress(&buf[..expected], output) {
                Inflate::NeedMore => spares.push(buf),
                Inflate::Complete => return Ok(()),
                Inflate::Failed => return Err(Error::Decompression("corrupt stream".into())),
            }
        }
    }

    /// Collects every read still in flight, so no read slot is leaked.
    fn drain(&mut self) {
        for (id, _) in self.in_flight.drain(..) {
            self.io.abort(id);
            let _ = self.io.wait(id);
        }
    }
}

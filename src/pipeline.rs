//! Producer → N parallel compressor workers → single serializer →
//! appender.
//!
//! The producer (the writer façade, calling [`Pipeline::submit`]) batches
//! records and hands each batch to the compressor queue tagged with a
//! monotonically increasing job index. Compressor workers run independently
//! and finish out of order; the serializer buffers early arrivals in a map
//! keyed by job index and only calls into the [`Appender`] once entries
//! arrive in order, so data blocks land on disk in the same order records
//! were submitted.
//!
//! Both queues are bounded (`2 * parallelism`) so a slow consumer
//! back-pressures the producer.
//! `submit` uses `crossbeam_channel::select!` against an error channel so a
//! dead/errored worker is visible to the producer immediately instead of
//! blocking forever on a full queue nobody is draining.

use crate::appender::{Appender, RootLocation};
use crate::codec::Codec;
use crate::error::{Error, ErrorKind};
use crate::record::pack_data;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;

enum CompressJob {
    Batch { index: u64, records: Vec<Vec<u8>> },
    Quit,
}

struct WriteJob {
    index: u64,
    first_key: Vec<u8>,
    last_key: Vec<u8>,
    codec_payload: Vec<u8>,
}

enum WriteMsg {
    Job(WriteJob),
    Quit,
}

/// Owns the compressor and serializer threads for one writer session.
pub struct Pipeline {
    compress_tx: Sender<CompressJob>,
    write_tx: Sender<WriteMsg>,
    error_rx: Receiver<Error>,
    compressors: Vec<JoinHandle<()>>,
    serializer: Option<JoinHandle<Result<RootLocation, Error>>>,
    parallelism: usize,
    next_job: u64,
}

impl Pipeline {
    pub fn new<W>(
        file: W,
        parallelism: usize,
        branching_factor: usize,
        approx_block_size: usize,
        codec: Arc<dyn Codec>,
    ) -> Self
    where
        W: Write + Send + 'static,
    {
        assert!(parallelism >= 1);
        let capacity = 2 * parallelism;
        let (compress_tx, compress_rx) = bounded::<CompressJob>(capacity);
        let (write_tx, write_rx) = bounded::<WriteMsg>(capacity);
        let (error_tx, error_rx) = bounded::<Error>(1);

        let mut compressors = Vec::with_capacity(parallelism);
        for worker_id in 0..parallelism {
            let compress_rx = compress_rx.clone();
            let write_tx = write_tx.clone();
            let error_tx = error_tx.clone();
            let codec = codec.clone();
            compressors.push(std::thread::spawn(move || {
                compress_worker(worker_id, compress_rx, write_tx, error_tx, codec, approx_block_size);
            }));
        }
        // Drop this thread's extra receiver/sender so channel closing is
        // driven entirely by the worker/serializer threads' own handles.
        drop(compress_rx);

        let write_rx_for_serializer = write_rx;
        let codec_for_serializer = codec;
        let serializer = std::thread::spawn(move || {
            serializer_loop(
                file,
                branching_factor,
                codec_for_serializer,
                write_rx_for_serializer,
            )
        });

        Self {
            compress_tx,
            write_tx,
            error_rx,
            compressors,
            serializer: Some(serializer),
            parallelism,
            next_job: 0,
        }
    }

    /// Submit one pre-sorted batch of records as a future data block.
    ///
    /// Blocks if the compressor queue is full; races that against the
    /// error channel so a worker failure is observed instead of a
    /// permanent block on a queue nobody is draining.
    pub fn submit(&mut self, records: Vec<Vec<u8>>) -> Result<(), Error> {
        if records.is_empty() {
            // Empty batches never create a block or a job index; silently
            // skipped, per the no-empty-data-blocks rule.
            return Ok(());
        }
        let job = CompressJob::Batch {
            index: self.next_job,
            records,
        };
        self.next_job += 1;

        select! {
            send(self.compress_tx, job) -> res => res.map_err(|_| {
                Error::new(ErrorKind::Closed, "compressor queue closed: a worker has already failed")
            }),
            recv(self.error_rx) -> err => Err(err.unwrap_or_else(|_| {
                Error::new(ErrorKind::Closed, "pipeline error channel closed unexpectedly")
            })),
        }
    }

    /// Check for a worker failure without submitting anything. Callers that
    /// drive the producer loop themselves (rather than through `submit`
    /// alone) can use this between steps.
    pub fn check_for_error(&self) -> Result<(), Error> {
        match self.error_rx.try_recv() {
            Ok(err) => Err(err),
            Err(_) => Ok(()),
        }
    }

    /// Shut down the pipeline: quit every compressor, wait for them, quit
    /// the serializer, and return the root location it produced.
    pub fn finish(mut self) -> Result<RootLocation, Error> {
        for _ in 0..self.parallelism {
            // Best-effort: if a worker already died the send fails, which
            // is fine, there's nothing left to tell it to quit.
            let _ = self.compress_tx.send(CompressJob::Quit);
        }
        for handle in self.compressors.drain(..) {
            let _ = handle.join();
        }

        if let Ok(err) = self.error_rx.try_recv() {
            let _ = self.write_tx.send(WriteMsg::Quit);
            if let Some(handle) = self.serializer.take() {
                let _ = handle.join();
            }
            return Err(err);
        }

        let _ = self.write_tx.send(WriteMsg::Quit);
        match self.serializer.take().map(|h| h.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(Error::new(ErrorKind::Closed, "serializer thread panicked")),
            None => Err(Error::new(ErrorKind::Closed, "pipeline already finished")),
        }
    }
}

fn compress_worker(
    _worker_id: usize,
    compress_rx: Receiver<CompressJob>,
    write_tx: Sender<WriteMsg>,
    error_tx: Sender<Error>,
    codec: Arc<dyn Codec>,
    approx_block_size: usize,
) {
    loop {
        let job = match compress_rx.recv() {
            Ok(job) => job,
            Err(_) => return, // producer side dropped, nothing left to do
        };
        let (index, records) = match job {
            CompressJob::Quit => return,
            CompressJob::Batch { index, records } => (index, records),
        };

        // A panic here (e.g. a codec implementation with a bad slice index)
        // must not vanish along with the thread: without `catch_unwind` the
        // serializer would wait forever for a job index that never arrives.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let first_key = records[0].clone();
            let last_key = records[records.len() - 1].clone();
            let logical_payload = pack_data(records.iter(), 2 * approx_block_size);
            codec
                .compress(&logical_payload)
                .map(|codec_payload| (first_key, last_key, codec_payload))
        }));

        let job = match outcome {
            Ok(Ok((first_key, last_key, codec_payload))) => WriteJob {
                index,
                first_key,
                last_key,
                codec_payload,
            },
            Ok(Err(e)) => {
                let _ = error_tx.try_send(e);
                return;
            }
            Err(panic_payload) => {
                let _ = error_tx.try_send(Error::new(
                    ErrorKind::Closed,
                    format!("compressor worker panicked: {}", panic_message(&panic_payload)),
                ));
                return;
            }
        };

        if write_tx.send(WriteMsg::Job(job)).is_err() {
            return;
        }
    }
}

/// Best-effort extraction of a human-readable message from a caught panic
/// payload; most panics carry a `&str` or `String`, anything else falls back
/// to a fixed string rather than failing to report the panic at all.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn serializer_loop<W: Write>(
    file: W,
    branching_factor: usize,
    codec: Arc<dyn Codec>,
    write_rx: Receiver<WriteMsg>,
) -> Result<RootLocation, Error> {
    let mut appender = Appender::new(file, branching_factor, codec);
    let mut pending: HashMap<u64, WriteJob> = HashMap::new();
    let mut wanted = 0u64;

    loop {
        let msg = match write_rx.recv() {
            Ok(msg) => msg,
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::Closed,
                    "write queue closed before a quit signal arrived",
                ))
            }
        };
        match msg {
            WriteMsg::Quit => {
                if !pending.is_empty() {
                    return Err(Error::new(
                        ErrorKind::Closed,
                        format!(
                            "quit received with {} buffered out-of-order job(s) still pending",
                            pending.len()
                        ),
                    ));
                }
                return appender.finish();
            }
            WriteMsg::Job(job) => {
                pending.insert(job.index, job);
                while let Some(job) = pending.remove(&wanted) {
                    appender.write_data_block(&job.first_key, &job.last_key, &job.codec_payload)?;
                    wanted += 1;
                }
            }
        }
    }
}

//! Decode boundary: a dedicated thread that owns decoding and talks to the
//! playback controller only through channels.
//!
//! Decoded pixel buffers are moved into the response, so the worker keeps no
//! reference to a frame once it has been sent.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::{
    foundation::error::{ReelError, ReelResult},
    raster::decode::{DecodedFrame, decode_native_raster},
    raster::input::NativeRasterInput,
};

/// Decode function run on the worker thread.
pub type DecodeFn = Arc<dyn Fn(&NativeRasterInput) -> ReelResult<DecodedFrame> + Send + Sync>;

pub fn native_raster_decoder() -> DecodeFn {
    Arc::new(decode_native_raster)
}

static NEXT_WORKER_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Debug)]
pub struct DecodeRequest {
    /// Monotonic request number, echoed in the response.
    pub seq: u64,
    pub frame_index: usize,
    pub input: Arc<NativeRasterInput>,
}

#[derive(Debug)]
pub struct DecodeResponse {
    pub seq: u64,
    pub frame_index: usize,
    pub result: ReelResult<DecodedFrame>,
}

/// One decode thread. Requests are processed in submission order, one response each.
pub struct DecodeWorker {
    id: usize,
    requests: Option<Sender<DecodeRequest>>,
    responses: Receiver<DecodeResponse>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DecodeWorker {
    pub fn spawn(decode: DecodeFn) -> ReelResult<Self> {
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        let (req_tx, req_rx) = unbounded::<DecodeRequest>();
        let (resp_tx, resp_rx) = unbounded::<DecodeResponse>();

        let handle = thread::Builder::new()
            .name(format!("rasterreel-decode-{id}"))
            .spawn(move || worker_loop(id, decode, req_rx, resp_tx))
            .map_err(|e| ReelError::worker(format!("failed to spawn decode thread: {e}")))?;

        tracing::debug!(worker = id, "decode worker started");
        Ok(Self {
            id,
            requests: Some(req_tx),
            responses: resp_rx,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn submit(&self, req: DecodeRequest) -> ReelResult<()> {
        let Some(tx) = self.requests.as_ref() else {
            return Err(ReelError::worker("decode worker is shut down"));
        };
        tx.send(req)
            .map_err(|_| ReelError::worker(format!("decode worker {} has exited", self.id)))
    }

    pub fn responses(&self) -> &Receiver<DecodeResponse> {
        &self.responses
    }

    /// Close the request channel and wait for the thread to drain its queue.
    pub fn shutdown(mut self) {
        drop(self.requests.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!(worker = self.id, "decode worker thread panicked");
        }
    }
}

impl Drop for DecodeWorker {
    // Closing the request channel is enough; the thread exits after its current job.
    // Not joined here so a stuck decode cannot block the controller.
    fn drop(&mut self) {
        drop(self.requests.take());
        if self.handle.take().is_some() {
            tracing::debug!(worker = self.id, "decode worker detached");
        }
    }
}

fn worker_loop(
    id: usize,
    decode: DecodeFn,
    requests: Receiver<DecodeRequest>,
    responses: Sender<DecodeResponse>,
) {
    while let Ok(req) = requests.recv() {
        let result = catch_unwind(AssertUnwindSafe(|| decode(&req.input)))
            .unwrap_or_else(|payload| {
                Err(ReelError::worker(format!(
                    "decode of '{}' panicked: {}",
                    req.input.label(),
                    panic_message(payload.as_ref())
                )))
            });

        let resp = DecodeResponse {
            seq: req.seq,
            frame_index: req.frame_index,
            result,
        };
        if responses.send(resp).is_err() {
            break;
        }
    }
    tracing::debug!(worker = id, "decode worker stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "../tests/unit/worker/worker.rs"]
mod tests;

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::error::{Result, TrimError};
use crate::ops::video_funcs::{CancelFlag, ProcessRequest, remove_segments};

/// A `remove_segments` run on a worker thread. The UI polls it each frame.
pub struct ProcessingJob {
    pub id: Uuid,
    pub output: PathBuf,
    started: Instant,
    cancel: CancelFlag,
    receiver: Receiver<Result<PathBuf>>,
    handle: Option<JoinHandle<()>>,
}

impl ProcessingJob {
    pub fn spawn(request: ProcessRequest) -> Result<Self> {
        Self::spawn_with(request, remove_segments)
    }

    pub fn spawn_with<F>(request: ProcessRequest, work: F) -> Result<Self>
    where
        F: FnOnce(&ProcessRequest, &CancelFlag) -> Result<PathBuf> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let cancel = CancelFlag::new();
        let (sender, receiver) = mpsc::channel();
        let output = request.output.clone();

        let worker_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("process-{id}"))
            .spawn(move || {
                let span = info_span!("process", job = %id);
                let _guard = span.enter();
                let started = Instant::now();
                let result = work(&request, &worker_cancel);
                match &result {
                    Ok(path) => info!(
                        output = %path.display(),
                        secs = started.elapsed().as_secs_f64(),
                        "job finished"
                    ),
                    Err(TrimError::Cancelled) => info!("job cancelled"),
                    Err(err) => error!(%err, "job failed"),
                }
                let _ = sender.send(result);
            })?;

        info!(job = %id, output = %output.display(), "job started");
        Ok(Self {
            id,
            output,
            started: Instant::now(),
            cancel,
            receiver,
            handle: Some(handle),
        })
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The job's result once the worker is done; `None` while it is running.
    pub fn poll(&mut self) -> Option<Result<PathBuf>> {
        let result = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(TrimError::tool_failed(
                "worker",
                "processing thread exited without a result",
            )),
        };
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Some(result)
    }
}

//! Fan-out/join over independent recording closures.
//!
//! Each closure is spawned on the tokio runtime as soon as it is added, and
//! reports its result through a bounded channel. `wait` drains the channel
//! until every sender (one per task, plus the recorder's own) is gone, so by
//! the time it returns every task has finished its side effects. A failing
//! task never cancels its siblings.

use tokio::sync::mpsc;

use reqscope_core::error::{Error, Result};

/// Channel capacity when none is given; the request pipeline launches at
/// most seven tasks.
pub const DEFAULT_CAPACITY: usize = 8;

pub struct ParallelRecorder {
    tx: mpsc::Sender<Result<()>>,
    rx: mpsc::Receiver<Result<()>>,
    launched: usize,
}

impl Default for ParallelRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelRecorder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx,
            launched: 0,
        }
    }

    /// Launch `task` immediately. Must be called inside a tokio runtime.
    pub fn add<F>(&mut self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.launched += 1;
        tokio::spawn(async move {
            let res = task();
            // The receiver only goes away if the recorder was dropped
            // without waiting; nobody is interested in the result then.
            let _ = tx.send(res).await;
        });
    }

    /// Number of tasks launched so far.
    pub fn len(&self) -> usize {
        self.launched
    }

    pub fn is_empty(&self) -> bool {
        self.launched == 0
    }

    /// Wait for all launched tasks.
    ///
    /// Returns the first error to arrive (completion order, not submission
    /// order). A task that panicked before reporting surfaces as
    /// `RecorderTask` if nothing else failed.
    pub async fn wait(self) -> Result<()> {
        let Self {
            tx,
            mut rx,
            launched,
        } = self;
        drop(tx);

        let mut first: Option<Error> = None;
        let mut reported = 0usize;
        while let Some(res) = rx.recv().await {
            reported += 1;
            if let Err(e) = res {
                first.get_or_insert(e);
            }
        }

        if first.is_none() && reported < launched {
            first = Some(Error::RecorderTask(format!(
                "{} of {} recording tasks ended without reporting",
                launched - reported,
                launched
            )));
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

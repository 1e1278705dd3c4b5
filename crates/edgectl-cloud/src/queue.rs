//! Bounded worker pool for bundle and upload jobs.
//!
//! `K` workers pull jobs from a channel of capacity `K`. A failing job never
//! cancels its siblings: every error is logged as it happens and the last one
//! observed is returned from [`JobQueue::collect`].

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::QueueError;

type Job<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;
type Slot<T, E> = (usize, Job<T, E>);

struct Outcome<T, E> {
    results: Vec<(usize, T)>,
    failed: usize,
    last_error: Option<E>,
}

pub struct JobQueue<T, E> {
    tx: Option<mpsc::Sender<Slot<T, E>>>,
    workers: JoinSet<()>,
    outcome: Arc<Mutex<Outcome<T, E>>>,
    submitted: usize,
}

impl<T, E> JobQueue<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    /// Start `limit` workers. A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (tx, rx) = mpsc::channel::<Slot<T, E>>(limit);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let outcome = Arc::new(Mutex::new(Outcome {
            results: Vec::new(),
            failed: 0,
            last_error: None,
        }));

        let mut workers = JoinSet::new();
        for id in 0..limit {
            workers.spawn(worker(id, Arc::clone(&rx), Arc::clone(&outcome)));
        }

        Self {
            tx: Some(tx),
            workers,
            outcome,
            submitted: 0,
        }
    }

    /// Enqueue a job, waiting while the channel is full.
    pub async fn submit<F>(&mut self, job: F) -> Result<(), QueueError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let tx = self.tx.as_ref().ok_or(QueueError::QueueClosed)?;
        tx.send((self.submitted, Box::pin(job)))
            .await
            .map_err(|e| {
                tracing::debug!("job rejected: {e}");
                QueueError::QueueClosed
            })?;
        self.submitted += 1;
        Ok(())
    }

    /// Stop accepting jobs. Already queued jobs still run.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Wait for every submitted job. Returns the results in submission order,
    /// or the last error observed if any job failed.
    pub async fn collect(mut self) -> Result<Vec<T>, E> {
        self.close();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                tracing::warn!("queue worker stopped: {e}");
            }
        }

        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = outcome.last_error.take() {
            tracing::debug!(
                failed = outcome.failed,
                submitted = self.submitted,
                "jobs finished with errors"
            );
            return Err(e);
        }
        let mut results = std::mem::take(&mut outcome.results);
        results.sort_by_key(|(slot, _)| *slot);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }
}

async fn worker<T, E: Display>(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Slot<T, E>>>>,
    outcome: Arc<Mutex<Outcome<T, E>>>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some((slot, job)) = next else {
            break;
        };
        let result = job.await;
        let mut outcome = outcome.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(value) => outcome.results.push((slot, value)),
            Err(e) => {
                tracing::error!(worker = id, "{e}");
                outcome.failed += 1;
                outcome.last_error = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn results_keep_submission_order() {
        let mut queue: JobQueue<usize, String> = JobQueue::new(3);
        for i in 0..6 {
            queue
                .submit(async move {
                    // Later jobs finish first
                    tokio::time::sleep(Duration::from_millis(30 - 5 * i as u64)).await;
                    Ok(i)
                })
                .await
                .unwrap();
        }
        assert_eq!(queue.collect().await.unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn never_exceeds_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut queue: JobQueue<(), String> = JobQueue::new(2);

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            queue
                .submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        queue.collect().await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn errors_do_not_cancel_siblings() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut queue: JobQueue<(), String> = JobQueue::new(1);

        queue.submit(async { Err("first".to_owned()) }).await.unwrap();
        for _ in 0..3 {
            let done = Arc::clone(&done);
            queue
                .submit(async move {
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        queue.submit(async { Err("last".to_owned()) }).await.unwrap();

        // One worker runs jobs in submission order, so "last" is observed last
        assert_eq!(queue.collect().await.unwrap_err(), "last");
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn submit_after_close_fails() {
        let mut queue: JobQueue<(), String> = JobQueue::new(1);
        queue.close();
        let err = queue.submit(async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, QueueError::QueueClosed));
    }

    #[tokio::test]
    async fn zero_limit_still_runs_jobs() {
        let mut queue: JobQueue<u8, String> = JobQueue::new(0);
        queue.submit(async { Ok(7) }).await.unwrap();
        assert_eq!(queue.collect().await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn empty_queue_collects_nothing() {
        let queue: JobQueue<u8, String> = JobQueue::new(4);
        assert!(queue.collect().await.unwrap().is_empty());
    }
}

use std::any::Any;
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::{DispatchError, Result};

type BoxJob<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

struct Queued<T> {
    index: usize,
    job: BoxJob<T>,
}

/// Counters for the jobs a dispatcher has driven so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub succeeded: usize,
    pub failed: usize,
    /// Highest number of jobs that were in flight at once.
    pub peak_in_flight: usize,
}

/// Owned bounded-concurrency queue.
///
/// `active` and `pending` change only when a job starts or finishes, both
/// inside [`Dispatcher::drain`].
pub struct Dispatcher<T> {
    name: String,
    max_in_flight: usize,
    active: usize,
    pending: VecDeque<Queued<T>>,
    batch_len: usize,
    stats: DispatchStats,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// `max_in_flight` of zero is treated as one.
    pub fn new(name: impl Into<String>, max_in_flight: usize) -> Self {
        Self {
            name: name.into(),
            max_in_flight: max_in_flight.max(1),
            active: 0,
            pending: VecDeque::new(),
            batch_len: 0,
            stats: DispatchStats::default(),
        }
    }

    /// Queue a job. Returns its position in the current batch, which is also
    /// its position in the vector [`drain`](Self::drain) returns.
    pub fn submit<F, E>(&mut self, job: F) -> usize
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Display,
    {
        let index = self.batch_len;
        self.batch_len += 1;
        let job = async move { job.await.map_err(|e| DispatchError::Failed(e.to_string())) };
        self.pending.push_back(Queued {
            index,
            job: Box::pin(job),
        });
        index
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Run every queued job, at most `max_in_flight` at a time, and wait for all
    /// of them. Results come back in submission order regardless of completion
    /// order; one job's failure never cancels another.
    pub async fn drain(&mut self) -> Vec<Result<T>> {
        let mut slots: Vec<Option<Result<T>>> = (0..self.batch_len).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        loop {
            while self.active < self.max_in_flight {
                let Some(Queued { index, job }) = self.pending.pop_front() else {
                    break;
                };
                self.active += 1;
                self.stats.peak_in_flight = self.stats.peak_in_flight.max(self.active);
                debug!(
                    dispatcher = %self.name,
                    job = index,
                    active = self.active,
                    queued = self.pending.len(),
                    "job started"
                );
                tasks.spawn(async move {
                    let result = match AssertUnwindSafe(job).catch_unwind().await {
                        Ok(result) => result,
                        Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
                    };
                    (index, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            self.active -= 1;

            match joined {
                Ok((index, result)) => {
                    match &result {
                        Ok(_) => {
                            self.stats.succeeded += 1;
                            debug!(dispatcher = %self.name, job = index, "job finished");
                        }
                        Err(e) => {
                            self.stats.failed += 1;
                            warn!(dispatcher = %self.name, job = index, error = %e, "job failed");
                        }
                    }
                    slots[index] = Some(result);
                }
                Err(e) => {
                    self.stats.failed += 1;
                    error!(dispatcher = %self.name, error = %e, "job task did not report back");
                }
            }
        }

        self.batch_len = 0;
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(DispatchError::Lost("no result recorded".to_string())))
            })
            .collect()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_max_in_flight() {
        let mut dispatcher = Dispatcher::new("test", 3);
        let current = Arc::new(AtomicUsize::new(0));
        let observed = Arc::new(AtomicUsize::new(0));

        for i in 0..10usize {
            let current = Arc::clone(&current);
            let observed = Arc::clone(&observed);
            dispatcher.submit(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                observed.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(i)
            });
        }
        assert_eq!(dispatcher.pending(), 10);

        let results = dispatcher.drain().await;
        assert_eq!(results.len(), 10);
        assert!(observed.load(Ordering::SeqCst) <= 3);
        assert_eq!(dispatcher.stats().peak_in_flight, 3);
        assert_eq!(dispatcher.stats().succeeded, 10);
        assert_eq!(dispatcher.active(), 0);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn jobs_start_fifo_and_results_keep_submission_order() {
        let mut dispatcher = Dispatcher::new("fifo", 1);
        let started = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5u64 {
            let started = Arc::clone(&started);
            dispatcher.submit(async move {
                started.lock().unwrap().push(i);
                // Later jobs finish faster; order must not follow completion.
                tokio::time::sleep(Duration::from_millis(5 - i)).await;
                Ok::<_, String>(i * 10)
            });
        }

        let results: Vec<u64> = dispatcher
            .drain()
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(results, vec![0, 10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let mut dispatcher = Dispatcher::new("isolation", 2);
        dispatcher.submit(async { Ok::<_, String>("a") });
        dispatcher.submit(async { Err::<&str, _>("HTTP 500".to_string()) });
        dispatcher.submit(async {
            if true {
                panic!("boom");
            }
            Ok::<_, String>("never")
        });
        dispatcher.submit(async { Ok::<_, String>("d") });

        let results = dispatcher.drain().await;
        assert_eq!(results[0], Ok("a"));
        assert_eq!(results[1], Err(DispatchError::Failed("HTTP 500".into())));
        assert_eq!(results[2], Err(DispatchError::Panicked("boom".into())));
        assert_eq!(results[3], Ok("d"));
        assert_eq!(dispatcher.stats().failed, 2);
        assert_eq!(dispatcher.stats().succeeded, 2);
    }

    #[tokio::test]
    async fn independent_dispatchers_do_not_share_state() {
        let mut a = Dispatcher::new("a", 1);
        let mut b = Dispatcher::new("b", 4);
        for i in 0..4 {
            a.submit(async move { Ok::<_, String>(i) });
            b.submit(async move { Ok::<_, String>(i) });
        }

        let (ra, rb) = tokio::join!(a.drain(), b.drain());
        assert_eq!(ra.len(), 4);
        assert_eq!(rb.len(), 4);
        assert_eq!(a.stats().peak_in_flight, 1);
        assert!(b.stats().peak_in_flight <= 4);
    }

    #[tokio::test]
    async fn dispatcher_is_reusable_across_batches() {
        let mut dispatcher = Dispatcher::new("reuse", 2);
        dispatcher.submit(async { Ok::<_, String>(1) });
        assert_eq!(dispatcher.drain().await, vec![Ok(1)]);

        let index = dispatcher.submit(async { Ok::<_, String>(2) });
        assert_eq!(index, 0);
        assert_eq!(dispatcher.drain().await, vec![Ok(2)]);
        assert_eq!(dispatcher.stats().succeeded, 2);
    }

    #[tokio::test]
    async fn empty_batch_drains_immediately() {
        let mut dispatcher: Dispatcher<()> = Dispatcher::new("empty", 0);
        assert_eq!(dispatcher.max_in_flight(), 1);
        assert!(dispatcher.drain().await.is_empty());
    }
}

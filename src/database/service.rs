//! Reactive Rebuild Service
//!
//! Drives a [`TaskDatabase`] from a stream of [`DatabaseEvent`]s. Change
//! notifications and reload requests both go through the rate limiter;
//! until the first rebuild succeeds a retry timer keeps forcing rebuilds at
//! a fixed interval.

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use super::corpus::CorpusSource;
use super::engine::{RebuildOutcome, TaskDatabase};

/// Messages accepted by a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseEvent {
    /// Something in the corpus changed
    CorpusChanged,
    /// Explicit reload from the host
    ReloadRequested,
    Shutdown,
}

/// Cloneable sender half used by the host.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    tx: mpsc::UnboundedSender<DatabaseEvent>,
}

impl DatabaseHandle {
    pub fn notify_changed(&self) -> bool {
        self.tx.send(DatabaseEvent::CorpusChanged).is_ok()
    }

    pub fn request_reload(&self) -> bool {
        self.tx.send(DatabaseEvent::ReloadRequested).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.tx.send(DatabaseEvent::Shutdown).is_ok()
    }
}

/// Creates a handle and the receiver to pass to [`DatabaseService::run`].
pub fn channel() -> (DatabaseHandle, mpsc::UnboundedReceiver<DatabaseEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DatabaseHandle { tx }, rx)
}

pub struct DatabaseService<S: CorpusSource> {
    db: TaskDatabase,
    source: S,
}

impl<S: CorpusSource> DatabaseService<S> {
    pub fn new(db: TaskDatabase, source: S) -> Self {
        Self { db, source }
    }

    pub fn database(&self) -> &TaskDatabase {
        &self.db
    }

    /// Runs until [`DatabaseEvent::Shutdown`] or every handle is dropped,
    /// then returns the database.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<DatabaseEvent>) -> TaskDatabase {
        let mut retry = time::interval(self.db.settings().retry_interval());
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Database service started");

        loop {
            let initialized = self.db.is_initialized();
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(DatabaseEvent::CorpusChanged | DatabaseEvent::ReloadRequested) => {
                        log_outcome(&self.db.request_rebuild(&self.source));
                    }
                    Some(DatabaseEvent::Shutdown) | None => break,
                },

                _ = retry.tick(), if !initialized => {
                    debug!("Retrying initial rebuild");
                    log_outcome(&self.db.force_rebuild(&self.source));
                }
            }
        }

        info!("Database service stopped");
        self.db
    }
}

fn log_outcome(outcome: &RebuildOutcome) {
    if let RebuildOutcome::Throttled = outcome {
        debug!("Rebuild request dropped by rate limiter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::database::corpus::Snapshot;
    use crate::error::SourceError;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Not ready for the first `warmup` calls.
    struct WarmingSource {
        calls: Rc<Cell<usize>>,
        warmup: usize,
    }

    impl CorpusSource for WarmingSource {
        fn snapshot(&self) -> Result<Snapshot, SourceError> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.warmup {
                Err(SourceError::NotReady)
            } else {
                Ok(Snapshot::default())
            }
        }
    }

    fn service(warmup: usize) -> (DatabaseService<WarmingSource>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let source = WarmingSource {
            calls: calls.clone(),
            warmup,
        };
        (DatabaseService::new(TaskDatabase::new(Settings::default()), source), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_initialized() {
        let (service, calls) = service(2);
        let (handle, rx) = channel();

        let driver = async {
            time::sleep(Duration::from_millis(5500)).await;
            handle.shutdown();
        };
        let (db, _) = tokio::join!(service.run(rx), driver);

        assert!(db.is_initialized());
        // Two failures, one success, then the timer is disabled.
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_throttled() {
        let (service, calls) = service(0);
        let (handle, rx) = channel();
        let mut events = service.database().subscribe();

        // First tick fires immediately and initializes.
        let driver = async {
            time::sleep(Duration::from_millis(10)).await;
            for _ in 0..10 {
                handle.notify_changed();
            }
            handle.shutdown();
        };
        let (db, _) = tokio::join!(service.run(rx), driver);

        assert!(db.is_initialized());
        assert_eq!(calls.get(), 4);
        let mut generations = 0;
        while events.try_recv().is_ok() {
            generations += 1;
        }
        assert_eq!(generations, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_burst_is_throttled() {
        let (service, calls) = service(0);
        let (handle, rx) = channel();

        let driver = async {
            time::sleep(Duration::from_millis(10)).await;
            for _ in 0..50 {
                handle.request_reload();
            }
            handle.shutdown();
        };
        let (db, _) = tokio::join!(service.run(rx), driver);

        assert!(db.is_initialized());
        // Initial tick plus three admitted reloads.
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_burst_shares_limiter() {
        let (service, calls) = service(0);
        let (handle, rx) = channel();

        let driver = async {
            time::sleep(Duration::from_millis(10)).await;
            for i in 0..10 {
                if i % 2 == 0 {
                    handle.notify_changed();
                } else {
                    handle.request_reload();
                }
            }
            handle.shutdown();
        };
        let (db, _) = tokio::join!(service.run(rx), driver);

        assert!(db.is_initialized());
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_after_quiet_period_is_admitted() {
        let (service, calls) = service(0);
        let (handle, rx) = channel();

        let driver = async {
            time::sleep(Duration::from_millis(10)).await;
            handle.request_reload();
            time::sleep(Duration::from_secs(5)).await;
            handle.request_reload();
            handle.shutdown();
        };
        let (db, _) = tokio::join!(service.run(rx), driver);

        assert!(db.is_initialized());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_stops_service() {
        let (service, _) = service(0);
        let (handle, rx) = channel();
        drop(handle);
        let db = service.run(rx).await;
        assert!(!db.is_initialized());
    }
}

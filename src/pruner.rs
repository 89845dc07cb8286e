use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};
use tokio::sync::Notify;
use tracing::debug;

use crate::clock::Clock;
use crate::orderbook::OrderBook;

const CUTOFF_HOUR: u32 = 16;
/// The 1-second poll cap is load-bearing (Design Note 9): without it a
/// pruner scheduled for next-day 16:00 would block teardown for a day.
const POLL_CAP: Duration = Duration::from_secs(1);

/// The day-scoped pruner: a single long-lived actor that cancels every
/// `GoodForDay` order at the configured wall-clock cutoff (§4.7).
pub struct Pruner {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Pruner {
    pub fn spawn(book: Arc<Mutex<OrderBook>>, clock: Arc<dyn Clock>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let thread_shutdown = Arc::clone(&shutdown);
        let thread_notify = Arc::clone(&notify);

        let handle = std::thread::Builder::new()
            .name("good-for-day-pruner".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("failed to build pruner runtime");
                rt.block_on(run_loop(book, clock, thread_shutdown, thread_notify));
            })
            .expect("failed to spawn pruner thread");

        Pruner {
            shutdown,
            notify,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Idempotent, bounded teardown (§5): signals the event and joins within
    /// one poll interval. A second call is a no-op.
    pub fn teardown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_one();
        if let Some(handle) = self
            .handle
            .lock()
            .expect("pruner handle mutex poisoned")
            .take()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for Pruner {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_loop(
    book: Arc<Mutex<OrderBook>>,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }

        let now = clock.now_local();
        let cutoff = next_cutoff(now);
        let wait = (cutoff - now).to_std().unwrap_or(Duration::ZERO).min(POLL_CAP);

        if tokio::time::timeout(wait, notify.notified()).await.is_ok() {
            return;
        }

        if shutdown.load(Ordering::SeqCst) {
            return;
        }

        if clock.now_local() < cutoff {
            continue;
        }

        let ids = {
            let guard = book.lock().expect("order book mutex poisoned");
            guard.good_for_day_ids()
        };
        debug!(count = ids.len(), "pruning day-scoped orders at cutoff");
        for id in ids {
            book.lock().expect("order book mutex poisoned").cancel(id);
        }
    }
}

/// Today at 16:00 local, rolled to tomorrow if already past it (§4.7 step 1).
fn next_cutoff(now: NaiveDateTime) -> NaiveDateTime {
    let today = NaiveDateTime::new(
        now.date(),
        NaiveTime::from_hms_opt(CUTOFF_HOUR, 0, 0).expect("16:00:00 is a valid time"),
    );
    if now < today {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

use chrono::NaiveDateTime;

/// Injectable wall-clock collaborator (§6, Design Note 3: "implementations
/// should inject the clock as a collaborator... to make the pruner testable
/// with a virtual clock").
///
/// The only thing the core ever asks of time: the current local date-time,
/// at least second resolution.
pub trait Clock: Send + Sync + 'static {
    fn now_local(&self) -> NaiveDateTime;
}

/// Production clock, backed by the OS's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_local(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

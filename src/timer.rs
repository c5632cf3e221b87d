//! Study session stopwatch
//!
//! [`Stopwatch`] is the pure two-state machine (`Idle`/`Running`) with a
//! one-second [`Stopwatch::tick`] step. [`LiveStopwatch`] drives it from a
//! tokio interval that is armed on every start and cancelled on pause, reset
//! and drop, so a partial second before a pause is discarded.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tick period of the live stopwatch
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Stopwatch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    /// Not counting
    #[default]
    Idle,
    /// Counting one second per tick
    Running,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Elapsed-seconds counter with start/pause/reset semantics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stopwatch {
    elapsed_seconds: u64,
    state: TimerState,
}

impl Stopwatch {
    /// Create an idle stopwatch at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> Running. No effect when already running.
    pub fn start(&mut self) {
        self.state = TimerState::Running;
    }

    /// Running -> Idle. No effect when already idle.
    pub fn pause(&mut self) {
        self.state = TimerState::Idle;
    }

    /// Flip between running and idle, returning the new state
    pub fn toggle(&mut self) -> TimerState {
        self.state = match self.state {
            TimerState::Idle => TimerState::Running,
            TimerState::Running => TimerState::Idle,
        };
        self.state
    }

    /// Clear the counter and stop, from any state
    pub fn reset(&mut self) {
        self.elapsed_seconds = 0;
        self.state = TimerState::Idle;
    }

    /// Advance by one second if running. Returns whether the counter moved.
    pub fn tick(&mut self) -> bool {
        if self.state == TimerState::Running {
            self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
            true
        } else {
            false
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Render the elapsed time as `HH:MM:SS`
    pub fn format(&self) -> String {
        format_elapsed(self.elapsed_seconds)
    }
}

/// Format seconds as zero-padded `HH:MM:SS`.
///
/// Hours are not wrapped at 24.
///
/// # Examples
///
/// ```
/// use studydash::timer::format_elapsed;
///
/// assert_eq!(format_elapsed(0), "00:00:00");
/// assert_eq!(format_elapsed(3661), "01:01:01");
/// assert_eq!(format_elapsed(90000), "25:00:00");
/// ```
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Stopwatch shared with the ticker task
///
/// `generation` is bumped on every start so a ticker that was stopped while
/// already holding a due tick cannot count it against a newer run.
#[derive(Debug, Default)]
struct Shared {
    watch: Stopwatch,
    generation: u64,
}

impl Shared {
    fn begin_run(&mut self) -> u64 {
        self.generation += 1;
        self.watch.start();
        self.generation
    }

    fn tick_for(&mut self, generation: u64) -> bool {
        generation == self.generation && self.watch.tick()
    }
}

/// A [`Stopwatch`] advanced by a background tokio task while running
///
/// Must be used from within a tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use studydash::timer::LiveStopwatch;
///
/// # async fn example() {
/// let mut watch = LiveStopwatch::new();
/// watch.start();
/// tokio::time::sleep(std::time::Duration::from_secs(2)).await;
/// watch.pause();
/// println!("{}", watch.format());
/// # }
/// ```
pub struct LiveStopwatch {
    inner: Arc<Mutex<Shared>>,
    ticker: Option<Ticker>,
    period: Duration,
}

impl LiveStopwatch {
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    /// Create a live stopwatch whose ticker fires every `period`
    pub fn with_period(period: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Shared::default())),
            ticker: None,
            period,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // the stopwatch has no invariants a panicking holder could break
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start counting. No effect when already running.
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let generation = self.lock().begin_run();

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let inner = Arc::clone(&self.inner);
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        let mut shared = inner.lock().unwrap_or_else(|e| e.into_inner());
                        shared.tick_for(generation);
                    }
                }
            }
        });

        tracing::debug!("Stopwatch started");
        self.ticker = Some(Ticker { cancel, handle });
    }

    /// Stop counting. No effect when already paused.
    pub fn pause(&mut self) {
        self.stop_ticker();
        self.lock().watch.pause();
    }

    /// Flip between running and paused, returning the new state
    pub fn toggle(&mut self) -> TimerState {
        if self.ticker.is_some() {
            self.pause();
        } else {
            self.start();
        }
        self.state()
    }

    /// Stop and clear the counter
    pub fn reset(&mut self) {
        self.stop_ticker();
        self.lock().watch.reset();
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel.cancel();
            ticker.handle.abort();
            tracing::debug!("Stopwatch paused");
        }
    }

    /// Copy of the current stopwatch state
    pub fn snapshot(&self) -> Stopwatch {
        self.lock().watch.clone()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.lock().watch.elapsed_seconds()
    }

    pub fn state(&self) -> TimerState {
        self.lock().watch.state()
    }

    pub fn format(&self) -> String {
        self.lock().watch.format()
    }
}

impl Default for LiveStopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LiveStopwatch {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

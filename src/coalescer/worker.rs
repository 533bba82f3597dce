//! The coalescing worker and its handle.
//!
//! One background task merges four event sources into a single stream of
//! refresh signals:
//!
//! ```text
//! input change ──► dirty = true
//! heartbeat tick ──► send (always)
//! debounce tick ──► send if dirty, then dirty = false
//! cancellation / input closed ──► stop
//! ```
//!
//! Both timers skip missed ticks. When the consumer stalls, the worker parks
//! inside `send` and at most one late tick per timer is served afterwards.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::config::CoalescerConfig;

use super::error::CoalesceError;
use super::signals::{Signal, Signals};
use super::source::ChangeSource;
use super::stats::{CoalescerStats, StatsSnapshot};

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Why a coalescer worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The change source was closed by its producer.
    InputClosed,
    /// The cancellation token fired.
    Cancelled,
    /// The [`Signals`] receiver was dropped.
    ConsumerGone,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::InputClosed => write!(f, "input closed"),
            Termination::Cancelled => write!(f, "cancelled"),
            Termination::ConsumerGone => write!(f, "consumer gone"),
        }
    }
}

/// Which timer produced a signal.
#[derive(Debug, Clone, Copy)]
enum Origin {
    Heartbeat,
    Debounce,
}

/// Handle to a running coalescer.
///
/// Dropping the handle does not stop the worker. Shutdown is driven by the
/// change source closing or the cancellation token firing.
pub struct Coalescer {
    handle: JoinHandle<Termination>,
    stats: Arc<CoalescerStats>,
    heartbeat: Duration,
    debounce: Duration,
}

impl Coalescer {
    /// Create a builder for configuring the coalescer.
    pub fn builder() -> CoalescerBuilder {
        CoalescerBuilder::new()
    }

    /// Start a coalescer with the default debounce window.
    ///
    /// The worker is running when this returns, but no signal has been
    /// emitted yet. The first heartbeat arrives one full period later.
    pub fn spawn<S>(
        cancel: CancellationToken,
        input: S,
        heartbeat: Duration,
    ) -> Result<(Self, Signals), CoalesceError>
    where
        S: ChangeSource + 'static,
    {
        Self::builder().heartbeat(heartbeat).spawn(cancel, input)
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Heartbeat period the worker runs with.
    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Debounce window the worker runs with.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Whether the worker has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to stop and report why.
    pub async fn join(self) -> Result<Termination, CoalesceError> {
        Ok(self.handle.await?)
    }
}

impl fmt::Debug for Coalescer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalescer")
            .field("heartbeat", &self.heartbeat)
            .field("debounce", &self.debounce)
            .field("finished", &self.is_finished())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Builder for constructing a [`Coalescer`].
#[derive(Debug, Clone)]
pub struct CoalescerBuilder {
    heartbeat: Option<Duration>,
    debounce: Duration,
}

impl CoalescerBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            heartbeat: None,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Take both periods from loaded settings.
    pub fn from_config(config: &CoalescerConfig) -> Self {
        Self {
            heartbeat: Some(config.heartbeat()),
            debounce: config.debounce(),
        }
    }

    /// Set the heartbeat period (required).
    pub fn heartbeat(mut self, period: Duration) -> Self {
        self.heartbeat = Some(period);
        self
    }

    /// Override the debounce window.
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Validate the periods and start the worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<S>(
        self,
        cancel: CancellationToken,
        input: S,
    ) -> Result<(Coalescer, Signals), CoalesceError>
    where
        S: ChangeSource + 'static,
    {
        let heartbeat = self.heartbeat.unwrap_or_default();
        let now = Instant::now();
        let heartbeat_ticker = ticker(now, "heartbeat", heartbeat)?;
        let debounce_ticker = ticker(now, "debounce", self.debounce)?;

        let (output, signals) = Signals::channel();
        let stats = Arc::new(CoalescerStats::default());

        let worker = Worker {
            input,
            output,
            cancel,
            dirty: false,
            heartbeat: heartbeat_ticker,
            debounce: debounce_ticker,
            stats: Arc::clone(&stats),
        };

        crate::debug_event!(
            "coalescer",
            "starting",
            "heartbeat: {heartbeat:?}, debounce: {:?}",
            self.debounce
        );

        let handle = tokio::spawn(worker.run());

        Ok((
            Coalescer {
                handle,
                stats,
                heartbeat,
                debounce: self.debounce,
            },
            signals,
        ))
    }
}

impl Default for CoalescerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-period timer that drops missed ticks instead of bursting.
///
/// The first tick lands one period after `start`. Zero periods and periods
/// whose first deadline cannot be represented are rejected.
fn ticker(
    start: Instant,
    name: &'static str,
    period: Duration,
) -> Result<Interval, CoalesceError> {
    if period.is_zero() {
        return Err(CoalesceError::InvalidPeriod {
            name,
            value: period,
        });
    }
    let first = start.checked_add(period).ok_or(CoalesceError::PeriodTooLong {
        name,
        value: period,
    })?;

    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Ok(ticker)
}

struct Worker<S> {
    input: S,
    output: mpsc::Sender<Signal>,
    cancel: CancellationToken,
    /// Set by any input change, cleared on every debounce tick.
    dirty: bool,
    heartbeat: Interval,
    debounce: Interval,
    stats: Arc<CoalescerStats>,
}

impl<S: ChangeSource> Worker<S> {
    async fn run(mut self) -> Termination {
        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break Termination::Cancelled,

                change = self.input.next_change() => match change {
                    Some(()) => {
                        self.dirty = true;
                        self.stats.record_input();
                    }
                    None => break Termination::InputClosed,
                },

                _ = self.heartbeat.tick() => {
                    if let Err(reason) = self.emit(Origin::Heartbeat).await {
                        break reason;
                    }
                }

                _ = self.debounce.tick() => {
                    let flushed = if self.dirty {
                        self.emit(Origin::Debounce).await
                    } else {
                        self.stats.record_idle_tick();
                        Ok(())
                    };
                    self.dirty = false;
                    if let Err(reason) = flushed {
                        break reason;
                    }
                }
            }
        };

        let stats = self.stats.snapshot();
        crate::log_event!(
            "coalescer",
            "stopped",
            "{reason} after {} events, {} signals",
            stats.input_events,
            stats.signals_sent()
        );
        reason
    }

    /// Hand one signal to the consumer, waiting for room in the channel.
    ///
    /// Cancellation wins over a pending send so nothing is delivered once
    /// the token has fired.
    async fn emit(&mut self, origin: Origin) -> Result<(), Termination> {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(Termination::Cancelled),

            sent = self.output.send(Signal) => match sent {
                Ok(()) => {
                    match origin {
                        Origin::Heartbeat => self.stats.record_heartbeat(),
                        Origin::Debounce => self.stats.record_debounce(),
                    }
                    crate::debug_event!("coalescer", "signal", "{origin:?}");
                    Ok(())
                }
                Err(_) => Err(Termination::ConsumerGone),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{self, timeout};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn elapsed_near(start: Instant, expected: Duration) -> bool {
        let elapsed = start.elapsed();
        elapsed >= expected && elapsed <= expected + ms(5)
    }

    #[tokio::test]
    async fn test_zero_heartbeat_rejected() {
        let (_tx, rx) = mpsc::channel::<()>(1);
        let err = Coalescer::spawn(CancellationToken::new(), rx, Duration::ZERO).unwrap_err();
        assert!(matches!(
            err,
            CoalesceError::InvalidPeriod {
                name: "heartbeat",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_debounce_rejected() {
        let (_tx, rx) = mpsc::channel::<()>(1);
        let err = Coalescer::builder()
            .heartbeat(ms(1000))
            .debounce(Duration::ZERO)
            .spawn(CancellationToken::new(), rx)
            .unwrap_err();
        assert!(matches!(
            err,
            CoalesceError::InvalidPeriod {
                name: "debounce",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unschedulable_heartbeat_rejected() {
        let (_tx, rx) = mpsc::channel::<()>(1);
        let err = Coalescer::builder()
            .heartbeat(Duration::MAX)
            .spawn(CancellationToken::new(), rx)
            .unwrap_err();
        assert!(matches!(
            err,
            CoalesceError::PeriodTooLong {
                name: "heartbeat",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unschedulable_debounce_rejected() {
        let (_tx, rx) = mpsc::channel::<()>(1);
        let err = Coalescer::builder()
            .heartbeat(ms(1000))
            .debounce(Duration::MAX)
            .spawn(CancellationToken::new(), rx)
            .unwrap_err();
        assert!(matches!(
            err,
            CoalesceError::PeriodTooLong {
                name: "debounce",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_heartbeat_rejected() {
        let (_tx, rx) = mpsc::channel::<()>(1);
        let result = Coalescer::builder().spawn(CancellationToken::new(), rx);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_heartbeat_after_one_period() {
        let (_tx, rx) = mpsc::channel::<()>(1);
        let start = Instant::now();
        let (_co, mut signals) = Coalescer::spawn(CancellationToken::new(), rx, ms(1000)).unwrap();

        assert_eq!(signals.recv().await, Some(Signal));
        assert!(elapsed_near(start, ms(1000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dirty_flag_cleared_by_idle_tick() {
        let (tx, rx) = mpsc::channel::<()>(8);
        let (co, mut signals) = Coalescer::spawn(CancellationToken::new(), rx, ms(60_000)).unwrap();

        tx.send(()).await.unwrap();
        assert_eq!(signals.recv().await, Some(Signal));

        // Next three debounce ticks see a clean flag.
        assert!(timeout(ms(1600), signals.recv()).await.is_err());
        let stats = co.stats();
        assert_eq!(stats.debounce_signals, 1);
        assert!(stats.idle_debounce_ticks >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_debounce_window() {
        let (tx, rx) = mpsc::channel::<()>(8);
        let start = Instant::now();
        let (co, mut signals) = Coalescer::builder()
            .heartbeat(ms(60_000))
            .debounce(ms(200))
            .spawn(CancellationToken::new(), rx)
            .unwrap();
        assert_eq!(co.debounce(), ms(200));

        time::sleep(ms(50)).await;
        tx.send(()).await.unwrap();

        assert_eq!(signals.recv().await, Some(Signal));
        assert!(elapsed_near(start, ms(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_builder_from_config() {
        let config = CoalescerConfig {
            heartbeat_ms: 750,
            debounce_ms: 250,
        };
        let (_tx, rx) = mpsc::channel::<()>(1);
        let (co, _signals) = CoalescerBuilder::from_config(&config)
            .spawn(CancellationToken::new(), rx)
            .unwrap();

        assert_eq!(co.heartbeat(), ms(750));
        assert_eq!(co.debounce(), ms(250));
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::InputClosed.to_string(), "input closed");
        assert_eq!(Termination::Cancelled.to_string(), "cancelled");
        assert_eq!(Termination::ConsumerGone.to_string(), "consumer gone");
    }
}

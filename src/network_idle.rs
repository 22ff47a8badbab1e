//! Network-idle waiter.
//!
//! [`IdleTracker`] is the pure state machine: it counts in-flight requests and
//! tells the caller what to do with the quiet-period timer after each event.
//! [`NetworkIdle`] drives it from a page's [`NetworkEventStream`] and resolves
//! once the timer runs out uninterrupted.
//!
//! The waiter is subscribed *before* the action it guards, then awaited
//! alongside it:
//!
//! ```ignore
//! let idle = NetworkIdle::subscribe(&page, quiet_period, 0).await?;
//! tokio::try_join!(page.click("#submit"), idle.wait())?;
//! ```

use std::time::Duration;

use futures::StreamExt;
use tokio::time::{sleep_until, Instant};

use crate::browser::{NetworkEvent, NetworkEventStream, PageDriver};
use crate::{Result, VrtError};

/// What the quiet-period timer should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Keep,
    Cancel,
    Restart,
}

/// In-flight request counter with threshold transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTracker {
    in_flight: usize,
    max_inflight: usize,
}

impl IdleTracker {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            in_flight: 0,
            max_inflight,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_inflight(&self) -> usize {
        self.max_inflight
    }

    pub fn on_start(&mut self) -> TimerCommand {
        self.in_flight += 1;
        if self.in_flight > self.max_inflight {
            TimerCommand::Cancel
        } else {
            TimerCommand::Keep
        }
    }

    pub fn on_finish(&mut self) -> TimerCommand {
        // Finished/failed can both fire for one request.
        if self.in_flight == 0 {
            return TimerCommand::Keep;
        }
        self.in_flight -= 1;
        if self.in_flight == self.max_inflight {
            TimerCommand::Restart
        } else {
            TimerCommand::Keep
        }
    }

    pub fn on_fail(&mut self) -> TimerCommand {
        self.on_finish()
    }

    pub fn apply(&mut self, event: NetworkEvent) -> TimerCommand {
        match event {
            NetworkEvent::RequestStarted => self.on_start(),
            NetworkEvent::RequestFinished => self.on_finish(),
            NetworkEvent::RequestFailed => self.on_fail(),
        }
    }
}

/// One-shot waiter resolving after `quiet_period` with at most
/// `max_inflight` requests outstanding.
///
/// The timer starts at construction, so a page that never issues a request
/// settles after exactly one quiet period.
pub struct NetworkIdle {
    events: NetworkEventStream,
    tracker: IdleTracker,
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl NetworkIdle {
    pub fn new(events: NetworkEventStream, quiet_period: Duration, max_inflight: usize) -> Self {
        Self {
            events,
            tracker: IdleTracker::new(max_inflight),
            quiet_period,
            deadline: Some(Instant::now() + quiet_period),
        }
    }

    /// Attaches to `page`'s request events and arms the initial timer.
    pub async fn subscribe<P: PageDriver>(
        page: &P,
        quiet_period: Duration,
        max_inflight: usize,
    ) -> Result<Self> {
        let events = page.network_events().await?;
        Ok(Self::new(events, quiet_period, max_inflight))
    }

    fn handle(&mut self, event: NetworkEvent) {
        let command = self.tracker.apply(event);
        match command {
            TimerCommand::Keep => {}
            TimerCommand::Cancel => self.deadline = None,
            TimerCommand::Restart => self.deadline = Some(Instant::now() + self.quiet_period),
        }
        tracing::trace!(
            ?event,
            ?command,
            in_flight = self.tracker.in_flight(),
            "network idle transition"
        );
    }

    /// Suspends until the page has been quiet for one full period.
    ///
    /// Dropping the event stream on return detaches the listeners. The wait has
    /// no cap of its own; bound it with an outer timeout.
    pub async fn wait(mut self) -> Result<()> {
        loop {
            let deadline = self.deadline;
            let timer = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                event = self.events.next() => match event {
                    Some(event) => self.handle(event),
                    None => return self.drain_after_close().await,
                },
                _ = timer => {
                    tracing::debug!(
                        quiet_period_ms = self.quiet_period.as_millis() as u64,
                        in_flight = self.tracker.in_flight(),
                        "network idle"
                    );
                    return Ok(());
                }
            }
        }
    }

    /// No more events can arrive: an armed timer still fires, a busy page never settles.
    async fn drain_after_close(self) -> Result<()> {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                Ok(())
            }
            None => Err(VrtError::browser(format!(
                "Network event stream closed with {} request(s) in flight (allowed {})",
                self.tracker.in_flight(),
                self.tracker.max_inflight()
            ))),
        }
    }
}

//! Async shell around the proximity tracker.
//!
//! The monitor owns everything with a lifetime: the position subscription,
//! the recheck and countdown intervals, and the notification sink. It runs
//! as one tokio task and multiplexes:
//!
//! - control commands from [`MonitorHandle`]
//! - position fixes (one O(1) recomputation each)
//! - a first-fix timeout
//! - the recheck interval, which re-evaluates a stationary user
//! - the countdown interval, which only republishes the snapshot
//!
//! The two intervals exist only while a destination is set. Resetting the
//! destination also drops the position subscription; the next destination
//! subscribes again and re-arms the first-fix timeout.

mod clock;

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::error::{MonitorError, PositionError};
use crate::events::Event;
use crate::geo::GeoPoint;
use crate::notify::{NotificationSink, Permission};
use crate::position::{PositionFix, PositionOptions, PositionSource, Subscription};
use crate::proximity::{ProximitySnapshot, ProximityTracker, ThresholdKm};

use clock::MonitorClock;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Timer periods and watch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub recheck_every: Duration,
    /// Period of the cosmetic countdown refresh.
    pub countdown_every: Duration,
    pub position: PositionOptions,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            recheck_every: Duration::from_secs(30),
            countdown_every: Duration::from_secs(1),
            position: PositionOptions::default(),
        }
    }
}

/// User actions forwarded to the monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetDestination(GeoPoint),
    ResetDestination,
    SetThreshold(ThresholdKm),
    SetNotifications(bool),
    /// "I'm up": ignored unless a destination is set and no snooze is active.
    Snooze,
    Shutdown,
}

pub struct ProximityMonitor {
    tracker: ProximityTracker,
    source: Arc<dyn PositionSource>,
    sink: Arc<dyn NotificationSink>,
    config: MonitorConfig,
    clock: MonitorClock,
}

impl ProximityMonitor {
    pub fn new(
        tracker: ProximityTracker,
        source: Arc<dyn PositionSource>,
        sink: Arc<dyn NotificationSink>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            tracker,
            source,
            sink,
            config,
            clock: MonitorClock::start(),
        }
    }

    /// Start the monitor task. Must be called from within a tokio runtime.
    pub fn spawn(self) -> MonitorHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snap_tx, snap_rx) = watch::channel(self.tracker.snapshot(self.clock.now()));
        let (event_tx, event_rx) = broadcast::channel(EVENT_BUFFER);

        // Subscribe before returning so no fix pushed after spawn is missed.
        tracing::debug!(source = self.source.name(), "subscribing to positions");
        let subscription = self.source.subscribe(self.config.position);
        let task = tokio::spawn(self.run(subscription, cmd_rx, snap_tx, event_tx));

        MonitorHandle {
            commands: cmd_tx,
            snapshots: snap_rx,
            events: event_rx,
            task,
        }
    }

    async fn run(
        mut self,
        subscription: Subscription,
        mut commands: mpsc::Receiver<Command>,
        snapshots: watch::Sender<ProximitySnapshot>,
        events: broadcast::Sender<Event>,
    ) -> ProximityTracker {
        let permission = self.sink.request_permission();
        if permission != Permission::Granted {
            tracing::info!(sink = self.sink.name(), ?permission, "notifications not permitted; alerts will not be delivered");
        }

        let mut out = Outbox {
            snapshots,
            events,
        };
        let mut live = Live {
            subscription: Some(subscription),
            source_ended: false,
            first_fix: deadline_after(self.config.position.timeout),
            recheck: None,
            countdown: None,
        };

        if self.tracker.destination().is_some() {
            self.start_timers(&mut live);
            self.check(&mut out);
        }
        out.publish(&self.tracker, self.clock.now());

        loop {
            tokio::select! {
                biased;

                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if cmd == Command::Shutdown {
                        break;
                    }
                    self.apply(cmd, &mut live, &mut out);
                }
                fix = next_fix(&mut live.subscription) => {
                    match fix {
                        Some(fix) => {
                            live.first_fix = None;
                            self.on_fix(fix, &mut out);
                        }
                        None => {
                            tracing::info!("position source ended; keeping last known position");
                            live.subscription = None;
                            live.source_ended = true;
                            live.first_fix = None;
                        }
                    }
                }
                _ = sleep_until(live.first_fix) => {
                    live.first_fix = None;
                    self.on_fix(Err(PositionError::Timeout), &mut out);
                }
                _ = next_tick(&mut live.recheck) => {
                    self.check(&mut out);
                }
                _ = next_tick(&mut live.countdown) => {
                    out.publish(&self.tracker, self.clock.now());
                }
            }
        }

        drop(live);
        tracing::debug!("monitor stopped");
        self.tracker
    }

    fn apply(&mut self, cmd: Command, live: &mut Live, out: &mut Outbox) {
        let now = self.clock.now();
        match cmd {
            Command::SetDestination(point) => {
                out.emit(self.tracker.set_destination(point, now));
                if live.subscription.is_none() && !live.source_ended {
                    tracing::debug!(source = self.source.name(), "resubscribing to positions");
                    live.subscription = Some(self.source.subscribe(self.config.position));
                    live.first_fix = deadline_after(self.config.position.timeout);
                }
                self.start_timers(live);
            }
            Command::ResetDestination => {
                out.emit(self.tracker.reset_destination(now));
                live.release();
            }
            Command::SetThreshold(threshold) => {
                out.emit(self.tracker.set_threshold(threshold, now));
            }
            Command::SetNotifications(enabled) => {
                out.emit(self.tracker.set_notifications_enabled(enabled, now));
            }
            Command::Snooze => {
                if self.tracker.can_snooze(now) {
                    out.emit(self.tracker.snooze(now));
                } else {
                    tracing::debug!("snooze ignored: no destination or already snoozed");
                }
            }
            Command::Shutdown => {}
        }
        self.check(out);
    }

    fn on_fix(&mut self, fix: PositionFix, out: &mut Outbox) {
        let now = self.clock.now();
        match fix {
            Ok(point) => out.emit(self.tracker.update_position(point, now)),
            Err(error) => {
                tracing::warn!(%error, "position unavailable");
                out.emit(self.tracker.position_failed(error, now));
            }
        }
        self.check(out);
    }

    /// Recompute, deliver an alert if one is due, and publish.
    fn check(&mut self, out: &mut Outbox) {
        let now = self.clock.now();
        if let Some(notification) = self.tracker.tick(now) {
            let delivered = match self.sink.deliver(&notification) {
                Ok(delivered) => delivered,
                Err(e) => {
                    tracing::warn!(sink = self.sink.name(), error = %e, "notification delivery failed");
                    false
                }
            };
            tracing::info!(
                distance_m = notification.distance_meters,
                delivered,
                "proximity alert"
            );
            out.emit(Event::ProximityAlert {
                notification,
                delivered,
            });
        }
        out.publish(&self.tracker, now);
    }

    fn start_timers(&self, live: &mut Live) {
        live.recheck = periodic(self.config.recheck_every);
        live.countdown = periodic(self.config.countdown_every);
    }
}

/// Everything the monitor holds that has a lifetime of its own.
struct Live {
    subscription: Option<Subscription>,
    /// The source ran out of fixes; do not subscribe again.
    source_ended: bool,
    first_fix: Option<Instant>,
    recheck: Option<Interval>,
    countdown: Option<Interval>,
}

impl Live {
    /// Drop the timers and the position subscription.
    fn release(&mut self) {
        self.subscription = None;
        self.first_fix = None;
        self.recheck = None;
        self.countdown = None;
    }
}

struct Outbox {
    snapshots: watch::Sender<ProximitySnapshot>,
    events: broadcast::Sender<Event>,
}

impl Outbox {
    fn emit(&mut self, event: Event) {
        // No subscribers is fine; the snapshot channel still carries state.
        let _ = self.events.send(event);
    }

    fn publish(&mut self, tracker: &ProximityTracker, now: chrono::DateTime<chrono::Utc>) {
        self.snapshots.send_replace(tracker.snapshot(now));
    }
}

/// First tick one full period from now. `None` for a period that cannot be scheduled.
fn periodic(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        tracing::warn!("ignoring zero timer period");
        return None;
    }
    let start = deadline_after(period)?;
    let mut interval = interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

fn deadline_after(period: Duration) -> Option<Instant> {
    Instant::now().checked_add(period)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn next_fix(subscription: &mut Option<Subscription>) -> Option<PositionFix> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => pending().await,
    }
}

/// Control side of a running monitor.
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<ProximitySnapshot>,
    events: broadcast::Receiver<Event>,
    task: JoinHandle<ProximityTracker>,
}

impl MonitorHandle {
    pub async fn send(&self, cmd: Command) -> Result<(), MonitorError> {
        self.commands.send(cmd).await.map_err(|_| MonitorError::Stopped)
    }

    pub async fn set_destination(&self, point: GeoPoint) -> Result<(), MonitorError> {
        self.send(Command::SetDestination(point)).await
    }

    pub async fn reset_destination(&self) -> Result<(), MonitorError> {
        self.send(Command::ResetDestination).await
    }

    pub async fn set_threshold(&self, threshold: ThresholdKm) -> Result<(), MonitorError> {
        self.send(Command::SetThreshold(threshold)).await
    }

    pub async fn set_notifications(&self, enabled: bool) -> Result<(), MonitorError> {
        self.send(Command::SetNotifications(enabled)).await
    }

    pub async fn snooze(&self) -> Result<(), MonitorError> {
        self.send(Command::Snooze).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ProximitySnapshot {
        self.snapshots.borrow().clone()
    }

    /// Next event, skipping over any this handle fell behind on.
    /// `None` once the monitor has stopped.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop the monitor, release its timers and subscription, and return the
    /// final tracker.
    pub async fn shutdown(self) -> Result<ProximityTracker, MonitorError> {
        // Already stopped is fine; the join below reports the outcome.
        let _ = self.commands.send(Command::Shutdown).await;
        Ok(self.task.await?)
    }
}

// ── Refresh task scheduler ──
//
// A set of named, periodic refresh tasks. Each `tick` runs every task that
// is due, one after another in registration order, and reschedules it from
// the outcome. Failures are logged and contained: one task erroring never
// stops the rest of the tick. A trigger that lands while the task is
// running survives the run's own rescheduling.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Future returned by a task callback.
pub type TaskFuture = BoxFuture<'static, Result<(), CoreError>>;

type TaskCallback = Box<dyn Fn() -> TaskFuture + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct TaskTiming {
    next_due: Instant,
    consecutive_failures: u32,
    /// Bumped by every trigger.
    triggers: u64,
}

struct TaskShared {
    name: String,
    interval: Duration,
    timing: Mutex<TaskTiming>,
}

/// Handle for inspecting and rescheduling one task.
///
/// Cheap to clone; other tasks hold these to trigger their dependents.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Make the task due `delay` from now.
    pub fn trigger(&self, delay: Duration) {
        let mut t = self.timing();
        t.next_due = Instant::now() + delay;
        t.triggers += 1;
    }

    /// Make the task due immediately.
    pub fn trigger_now(&self) {
        self.trigger(Duration::ZERO);
    }

    pub fn next_due(&self) -> Instant {
        self.timing().next_due
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.timing().consecutive_failures
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due() <= now
    }

    fn timing(&self) -> std::sync::MutexGuard<'_, TaskTiming> {
        self.shared.timing.lock().expect("task timing lock poisoned")
    }

    fn triggers(&self) -> u64 {
        self.timing().triggers
    }

    /// `started` is the trigger count when the run began; a newer trigger
    /// keeps its due time.
    fn record_success(&self, now: Instant, started: u64) {
        let mut t = self.timing();
        t.consecutive_failures = 0;
        if t.triggers == started {
            t.next_due = now + self.shared.interval;
        }
    }

    /// First failure leaves the task due so the next tick retries it;
    /// repeated failures back off to the normal interval.
    fn record_failure(&self, now: Instant, started: u64) -> u32 {
        let mut t = self.timing();
        t.consecutive_failures += 1;
        if t.consecutive_failures > 1 && t.triggers == started {
            t.next_due = now + self.shared.interval;
        }
        t.consecutive_failures
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.timing();
        f.debug_struct("TaskHandle")
            .field("name", &self.shared.name)
            .field("interval", &self.shared.interval)
            .field("next_due", &t.next_due)
            .field("consecutive_failures", &t.consecutive_failures)
            .finish()
    }
}

struct Task {
    handle: TaskHandle,
    callback: TaskCallback,
}

/// Outcome counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub ran: usize,
    pub failed: usize,
    /// Tasks that could not start and stay due without a failure charged.
    pub deferred: usize,
}

/// Ordered collection of periodic refresh tasks.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
    /// The task currently awaited by `tick`, with its trigger count at start.
    running: Mutex<Option<(TaskHandle, u64)>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. It is due immediately, so the next tick runs it.
    pub fn add_task<F, Fut>(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        callback: F,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let handle = TaskHandle {
            shared: Arc::new(TaskShared {
                name: name.into(),
                interval,
                timing: Mutex::new(TaskTiming {
                    next_due: Instant::now(),
                    consecutive_failures: 0,
                    triggers: 0,
                }),
            }),
        };
        self.tasks.push(Task {
            handle: handle.clone(),
            callback: Box::new(move || -> TaskFuture { Box::pin(callback()) }),
        });
        handle
    }

    pub fn handles(&self) -> impl Iterator<Item = &TaskHandle> {
        self.tasks.iter().map(|t| &t.handle)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Make every task due immediately.
    pub fn trigger_all(&self) {
        for task in &self.tasks {
            task.handle.trigger_now();
        }
    }

    /// Run every task due at `now`, sequentially in registration order.
    ///
    /// The due set is fixed before the first task runs: a task made due by
    /// an earlier task in the same tick waits for the next tick. A task
    /// erroring with a deferral is left due and not charged a failure.
    pub async fn tick(&self, now: Instant) -> TickSummary {
        let due: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.handle.is_due(now))
            .collect();

        let mut summary = TickSummary::default();
        for task in due {
            let name = task.handle.name();
            let started = task.handle.triggers();
            debug!(task = name, "running refresh task");
            *self.running_slot() = Some((task.handle.clone(), started));
            let result = (task.callback)().await;
            *self.running_slot() = None;

            summary.ran += 1;
            match result {
                Ok(()) => task.handle.record_success(now, started),
                Err(e) if e.is_deferral() => {
                    summary.deferred += 1;
                    debug!(task = name, reason = %e, "refresh task deferred");
                }
                Err(e) => {
                    summary.failed += 1;
                    let failures = task.handle.record_failure(now, started);
                    warn!(task = name, failures, error = %e, "refresh task failed");
                }
            }
        }
        summary
    }

    /// Charge a failure to the task a dropped `tick` was awaiting.
    ///
    /// Call after cancelling a tick (e.g. on timeout) so a hanging task
    /// backs off like any other failing one. Returns the task, if any.
    pub fn abandon_running(&self, now: Instant) -> Option<TaskHandle> {
        let (handle, started) = self.running_slot().take()?;
        let failures = handle.record_failure(now, started);
        warn!(task = handle.name(), failures, "refresh task abandoned");
        Some(handle)
    }

    fn running_slot(&self) -> std::sync::MutexGuard<'_, Option<(TaskHandle, u64)>> {
        self.running.lock().expect("running task lock poisoned")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_task(
        scheduler: &mut Scheduler,
        name: &str,
        interval: Duration,
        fail: bool,
    ) -> (TaskHandle, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = scheduler.add_task(name, interval, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(CoreError::Internal("boom".into()))
                } else {
                    Ok(())
                }
            }
        });
        (handle, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn new_task_runs_once_per_interval() {
        let mut scheduler = Scheduler::new();
        let interval = Duration::from_secs(120);
        let (handle, calls) = counting_task(&mut scheduler, "dashboard", interval, false);

        let t0 = Instant::now();
        scheduler.tick(t0).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.next_due(), t0 + interval);

        scheduler.tick(t0 + Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        scheduler.tick(t0 + interval).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_makes_task_due() {
        let mut scheduler = Scheduler::new();
        let (handle, calls) =
            counting_task(&mut scheduler, "pumps", Duration::from_secs(300), false);

        scheduler.tick(Instant::now()).await;
        handle.trigger_now();
        assert!(handle.is_due(Instant::now()));
        let now = Instant::now();
        scheduler.tick(now).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.next_due(), now + Duration::from_secs(300));

        handle.trigger(Duration::from_secs(5));
        assert!(!handle.is_due(Instant::now()));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(handle.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_retries_next_tick_then_backs_off() {
        let mut scheduler = Scheduler::new();
        let interval = Duration::from_secs(300);
        let (handle, calls) = counting_task(&mut scheduler, "pumps", interval, true);

        let t0 = Instant::now();
        scheduler.tick(t0).await;
        assert_eq!(handle.consecutive_failures(), 1);
        assert_eq!(handle.next_due(), t0);

        let t1 = t0 + Duration::from_secs(60);
        scheduler.tick(t1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.consecutive_failures(), 2);
        assert_eq!(handle.next_due(), t1 + interval);

        scheduler.tick(t1 + Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let mut scheduler = Scheduler::new();
        let outcomes = Arc::new(Mutex::new(vec![Ok(()), Err(()), Err(())]));
        let queue = Arc::clone(&outcomes);
        let handle = scheduler.add_task("information", Duration::from_secs(10), move || {
            let next = queue.lock().unwrap().pop().unwrap_or(Ok(()));
            async move { next.map_err(|()| CoreError::Internal("down".into())) }
        });

        let mut now = Instant::now();
        for _ in 0..2 {
            scheduler.tick(now).await;
            now += Duration::from_secs(10);
        }
        assert_eq!(handle.consecutive_failures(), 2);
        scheduler.tick(now).await;
        assert_eq!(handle.consecutive_failures(), 0);
        assert_eq!(handle.next_due(), now + Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_does_not_block_others() {
        let mut scheduler = Scheduler::new();
        let (_, pump_calls) = counting_task(&mut scheduler, "pumps", Duration::from_secs(300), true);
        let (_, info_calls) =
            counting_task(&mut scheduler, "information", Duration::from_secs(1200), false);

        let summary = scheduler.tick(Instant::now()).await;
        assert_eq!(
            summary,
            TickSummary {
                ran: 2,
                failed: 1,
                deferred: 0
            }
        );
        assert_eq!(pump_calls.load(Ordering::SeqCst), 1);
        assert_eq!(info_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn task_triggered_mid_tick_waits_for_next_tick() {
        let mut scheduler = Scheduler::new();
        let (pumps, pump_calls) =
            counting_task(&mut scheduler, "pumps", Duration::from_secs(300), false);
        // Settle pumps so it is not due on its own.
        scheduler.tick(Instant::now()).await;

        let dependent = pumps.clone();
        scheduler.add_task("dashboard", Duration::from_secs(120), move || {
            dependent.trigger_now();
            async { Ok(()) }
        });

        scheduler.tick(Instant::now()).await;
        assert_eq!(pump_calls.load(Ordering::SeqCst), 1);
        assert!(pumps.is_due(Instant::now()));

        scheduler.tick(Instant::now()).await;
        assert_eq!(pump_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_all_makes_every_task_due() {
        let mut scheduler = Scheduler::new();
        let (a, _) = counting_task(&mut scheduler, "a", Duration::from_secs(60), false);
        let (b, _) = counting_task(&mut scheduler, "b", Duration::from_secs(60), false);
        scheduler.tick(Instant::now()).await;
        assert!(!a.is_due(Instant::now()) && !b.is_due(Instant::now()));

        scheduler.trigger_all();
        assert_eq!(scheduler.handles().filter(|h| h.is_due(Instant::now())).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_during_run_survives_rescheduling() {
        let mut scheduler = Scheduler::new();
        let release = Arc::new(tokio::sync::Notify::new());
        let started = Arc::new(tokio::sync::Notify::new());
        let (gate, entered) = (Arc::clone(&release), Arc::clone(&started));
        let handle = scheduler.add_task("dashboard", Duration::from_secs(120), move || {
            let (gate, entered) = (Arc::clone(&gate), Arc::clone(&entered));
            async move {
                entered.notify_one();
                gate.notified().await;
                Ok(())
            }
        });

        let now = Instant::now();
        let tick = scheduler.tick(now);
        let trigger = async {
            started.notified().await;
            handle.trigger_now();
            release.notify_one();
        };
        let (summary, ()) = tokio::join!(tick, trigger);

        assert_eq!(summary.ran, 1);
        assert!(handle.is_due(Instant::now()), "next due {:?}", handle.next_due());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_during_triggered_run_stays_due() {
        let mut scheduler = Scheduler::new();
        let interval = Duration::from_secs(300);
        let slot: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
        let me = Arc::clone(&slot);
        let handle = scheduler.add_task("pumps", interval, move || {
            if let Some(h) = me.lock().unwrap().as_ref() {
                h.trigger_now();
            }
            async { Err(CoreError::Internal("down".into())) }
        });
        *slot.lock().unwrap() = Some(handle.clone());

        scheduler.tick(Instant::now()).await;
        scheduler.tick(Instant::now()).await;
        assert_eq!(handle.consecutive_failures(), 2);
        assert!(handle.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_task_stays_due_without_failure() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.add_task("information", Duration::from_secs(1200), || async {
            Err(CoreError::NotConnected)
        });

        let summary = scheduler.tick(Instant::now()).await;
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(handle.consecutive_failures(), 0);
        assert!(handle.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_task_is_charged_a_failure() {
        let mut scheduler = Scheduler::new();
        let interval = Duration::from_secs(120);
        let handle = scheduler.add_task("dashboard", interval, || {
            futures_util::future::pending::<Result<(), CoreError>>()
        });
        let (_, info_calls) =
            counting_task(&mut scheduler, "information", Duration::from_secs(1200), false);

        let t0 = Instant::now();
        for _ in 0..2 {
            let timed_out = tokio::time::timeout(Duration::from_secs(10), scheduler.tick(t0)).await;
            assert!(timed_out.is_err());
            assert_eq!(scheduler.abandon_running(t0).unwrap().name(), "dashboard");
        }
        assert_eq!(handle.consecutive_failures(), 2);
        assert_eq!(handle.next_due(), t0 + interval);
        assert!(scheduler.abandon_running(t0).is_none());

        scheduler.tick(t0).await;
        assert_eq!(info_calls.load(Ordering::SeqCst), 1);
    }
}

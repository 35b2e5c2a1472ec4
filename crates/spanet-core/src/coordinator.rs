// ── Per-spa coordinator ──
//
// Owns the state cache, the refresh scheduler, and the lazily established
// spa connection for one spa. Refresh cycles are serialized; commands write
// optimistically to the cache, call the API, then request a refresh.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use spanet_api::{Spa, SpaNetClient, SpaSummary};

use crate::config::{
    CoordinatorConfig, DASHBOARD_INTERVAL, INFORMATION_INTERVAL, PUMPS_INTERVAL, UPDATE_INTERVAL,
};
use crate::error::CoreError;
use crate::model::{ModeSetting, PumpMode, keys};
use crate::scheduler::{Scheduler, TaskHandle, TickSummary};
use crate::store::StateStore;

/// Lowest settable target temperature, in °C.
pub const MIN_TEMPERATURE: f64 = 5.0;
/// Highest settable target temperature, in °C.
pub const MAX_TEMPERATURE: f64 = 41.0;

/// Handles for the three refresh tasks.
#[derive(Debug, Clone)]
pub struct RefreshTasks {
    pub dashboard: TaskHandle,
    pub pumps: TaskHandle,
    pub information: TaskHandle,
}

/// Outcome of the most recent refresh cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub last_success: Option<DateTime<Utc>>,
    /// Set when the latest cycle failed; cleared by the next success.
    pub last_error: Option<String>,
}

impl RefreshStatus {
    /// Data has never been refreshed, or the latest cycle failed.
    pub fn is_stale(&self) -> bool {
        self.last_success.is_none() || self.last_error.is_some()
    }
}

// ── Refresh context ──────────────────────────────────────────────────
//
// Shared by the task callbacks. Kept separate from the coordinator so the
// scheduler does not hold a reference back to its owner.

struct RefreshContext {
    client: SpaNetClient,
    spa_id: u64,
    store: Arc<StateStore>,
    connection: Mutex<Option<Spa>>,
    /// Reason the connection was dropped during the current cycle.
    lost: std::sync::Mutex<Option<String>>,
    /// Tasks re-run when the dashboard reports a structural change.
    dependents: OnceLock<Vec<TaskHandle>>,
}

impl RefreshContext {
    /// The spa handle, resolving it on first use.
    async fn spa(&self) -> Result<Spa, CoreError> {
        let mut guard = self.connection.lock().await;
        if let Some(ref spa) = *guard {
            return Ok(spa.clone());
        }
        debug!(spa_id = self.spa_id, "resolving spa connection");
        let spa = self.client.spa(self.spa_id).await?;
        info!(spa_id = self.spa_id, name = spa.name(), "connected to spa");
        *guard = Some(spa.clone());
        Ok(spa)
    }

    /// The spa handle, without reconnecting if it was dropped this cycle.
    async fn connected(&self) -> Result<Spa, CoreError> {
        self.connection
            .lock()
            .await
            .clone()
            .ok_or(CoreError::NotConnected)
    }

    /// Convert an API result, dropping the connection on transport failure.
    async fn track<T>(&self, result: Result<T, spanet_api::Error>) -> Result<T, CoreError> {
        match result {
            Ok(v) => Ok(v),
            Err(e) => {
                let err = CoreError::from(e);
                if err.is_connection_loss() {
                    self.invalidate(&err.to_string()).await;
                }
                Err(err)
            }
        }
    }

    async fn invalidate(&self, reason: &str) {
        *self.connection.lock().await = None;
        {
            let mut lost = self.lost.lock().expect("connection state lock poisoned");
            if lost.is_none() {
                *lost = Some(reason.to_owned());
            }
        }
        warn!(spa_id = self.spa_id, reason, "spa connection dropped");
    }

    fn take_lost(&self) -> Option<String> {
        self.lost.lock().expect("connection state lock poisoned").take()
    }

    // ── Task bodies ──────────────────────────────────────────────────

    async fn refresh_dashboard(&self) -> Result<(), CoreError> {
        let spa = self.connected().await?;
        let dash = self.track(spa.get_dashboard().await).await?;
        if self.store.apply_dashboard(&dash) {
            for task in self.dependents.get().into_iter().flatten() {
                debug!(task = task.name(), "status changed, scheduling dependent refresh");
                task.trigger_now();
            }
        }
        Ok(())
    }

    async fn refresh_pumps(&self) -> Result<(), CoreError> {
        let spa = self.connected().await?;
        let pumps = self.track(spa.get_pumps().await).await?;
        self.store.apply_pumps(&pumps);
        Ok(())
    }

    async fn refresh_information(&self) -> Result<(), CoreError> {
        let spa = self.connected().await?;
        let info = self.track(spa.get_information().await).await?;
        self.store.apply_information(&info);
        Ok(())
    }
}

// ── Coordinator ──────────────────────────────────────────────────────

/// Polling and command coordinator for one spa.
///
/// Cheaply cloneable; clones share all state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    summary: SpaSummary,
    config: CoordinatorConfig,
    ctx: Arc<RefreshContext>,
    scheduler: Scheduler,
    tasks: RefreshTasks,
    /// Held for the duration of a refresh cycle.
    cycle: Mutex<()>,
    wake: Notify,
    status: watch::Sender<RefreshStatus>,
    cancel: CancellationToken,
    /// Child token for the running update loop, replaced on restart.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator. Does not contact the API until the first
    /// refresh or command.
    pub fn new(client: SpaNetClient, summary: SpaSummary, config: CoordinatorConfig) -> Self {
        let ctx = Arc::new(RefreshContext {
            client,
            spa_id: summary.id,
            store: Arc::new(StateStore::new()),
            connection: Mutex::new(None),
            lost: std::sync::Mutex::new(None),
            dependents: OnceLock::new(),
        });

        let mut scheduler = Scheduler::new();
        let dashboard = {
            let ctx = Arc::clone(&ctx);
            scheduler.add_task("dashboard", DASHBOARD_INTERVAL, move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.refresh_dashboard().await }
            })
        };
        let pumps = {
            let ctx = Arc::clone(&ctx);
            scheduler.add_task("pumps", PUMPS_INTERVAL, move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.refresh_pumps().await }
            })
        };
        let information = {
            let ctx = Arc::clone(&ctx);
            scheduler.add_task("information", INFORMATION_INTERVAL, move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.refresh_information().await }
            })
        };
        let _ = ctx.dependents.set(vec![pumps.clone()]);

        let (status, _) = watch::channel(RefreshStatus::default());
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(CoordinatorInner {
                summary,
                config,
                ctx,
                scheduler,
                tasks: RefreshTasks {
                    dashboard,
                    pumps,
                    information,
                },
                cycle: Mutex::new(()),
                wake: Notify::new(),
                status,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.summary.id
    }

    pub fn name(&self) -> &str {
        &self.inner.summary.name
    }

    pub fn summary(&self) -> &SpaSummary {
        &self.inner.summary
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.ctx.store
    }

    pub fn tasks(&self) -> &RefreshTasks {
        &self.inner.tasks
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Run one refresh cycle: connect if needed, then run every due task.
    ///
    /// Cycles never overlap. A cycle that outlives the configured timeout
    /// is abandoned, and a connection dropped by any task fails the cycle
    /// so the next one rediscovers the spa.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let _cycle = self.inner.cycle.lock().await;
        let result = self.run_cycle().await;

        match result {
            Ok(summary) => {
                let now = Utc::now();
                self.store().mark_refreshed(now);
                self.inner.status.send_modify(|s| {
                    s.last_success = Some(now);
                    s.last_error = None;
                });
                debug!(
                    spa = self.id(),
                    ran = summary.ran,
                    failed = summary.failed,
                    deferred = summary.deferred,
                    "refresh cycle complete"
                );
                Ok(())
            }
            Err(e) => {
                warn!(spa = self.id(), error = %e, "refresh cycle failed");
                let reason = e.to_string();
                self.store().mark_failed(&reason);
                self.inner.status.send_modify(|s| s.last_error = Some(reason));
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<TickSummary, CoreError> {
        let ctx = &self.inner.ctx;
        let _ = ctx.take_lost();

        ctx.spa().await.map_err(|e| {
            if e.is_connection_loss() {
                CoreError::RefreshFailed {
                    reason: e.to_string(),
                }
            } else {
                e
            }
        })?;

        let timeout = self.inner.config.cycle_timeout;
        let now = Instant::now();
        let summary = tokio::time::timeout(timeout, self.inner.scheduler.tick(now))
            .await
            .map_err(|_| {
                self.inner.scheduler.abandon_running(now);
                CoreError::Timeout { timeout }
            })?;

        if let Some(reason) = ctx.take_lost() {
            return Err(CoreError::RefreshFailed { reason });
        }
        Ok(summary)
    }

    /// Make every task due and wake the update loop.
    pub fn request_refresh(&self) {
        self.inner.scheduler.trigger_all();
        self.inner.wake.notify_one();
    }

    pub fn status(&self) -> RefreshStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RefreshStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_stale(&self) -> bool {
        self.inner.status.borrow().is_stale()
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Cached value at a dot-separated path, e.g. `pumps.1.state`.
    pub fn get_state(&self, path: &str) -> Result<Value, CoreError> {
        self.store().get(path)
    }

    /// Cached value of `sub_key` under the object at `path`, e.g. the
    /// `state` of `pumps.1`.
    pub fn get_state_key(&self, path: &str, sub_key: &str) -> Result<Value, CoreError> {
        self.store().get(&format!("{path}.{sub_key}"))
    }

    pub fn get_state_or(&self, path: &str, default: Value) -> Value {
        self.store().get_or(path, default)
    }

    /// Cached integer at `path` divided by `divisor`; `None` when absent.
    pub fn get_state_numeric(&self, path: &str, divisor: f64) -> Result<Option<f64>, CoreError> {
        self.store().get_numeric(path, divisor)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Set the target temperature in °C.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub async fn set_temperature(&self, celsius: f64) -> Result<(), CoreError> {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&celsius) {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "temperature {celsius} is outside {MIN_TEMPERATURE}..={MAX_TEMPERATURE}"
                ),
            });
        }
        let tenths = (celsius * 10.0).round() as i64;
        self.store().set(keys::SET_TEMPERATURE, tenths);
        self.command("set_temperature", move |spa| async move {
            spa.set_temperature(tenths).await
        })
        .await
    }

    /// Switch pump `number` to `mode`.
    pub async fn set_pump(&self, number: u32, mode: PumpMode) -> Result<(), CoreError> {
        let path = keys::pump(number);
        let api_id = self
            .store()
            .try_get(&format!("{path}.apiId"))
            .and_then(|v| v.as_u64())
            .ok_or_else(|| CoreError::ValidationFailed {
                message: format!("unknown pump {number}"),
            })?;
        self.store().set(&format!("{path}.state"), mode.as_ref());
        self.command("set_pump", move |spa| async move {
            spa.set_pump(api_id, mode.mode_id()).await
        })
        .await
    }

    pub async fn set_operation_mode(&self, label: &str) -> Result<(), CoreError> {
        self.set_mode(ModeSetting::OperationMode, label).await
    }

    pub async fn set_power_save(&self, label: &str) -> Result<(), CoreError> {
        self.set_mode(ModeSetting::PowerSave, label).await
    }

    pub async fn set_heat_pump(&self, label: &str) -> Result<(), CoreError> {
        self.set_mode(ModeSetting::HeatPump, label).await
    }

    /// Set one of the index-valued settings by label.
    pub async fn set_mode(&self, setting: ModeSetting, label: &str) -> Result<(), CoreError> {
        let index = setting
            .command_index(label)
            .ok_or_else(|| CoreError::ValidationFailed {
                message: format!(
                    "invalid {setting} '{label}', expected one of: {}",
                    setting.settable_options().collect::<Vec<_>>().join(", ")
                ),
            })?;
        self.store().set(setting.state_key(), setting.options()[index]);
        self.command("set_mode", move |spa| async move {
            match setting {
                ModeSetting::OperationMode => spa.set_operation_mode(index).await,
                ModeSetting::PowerSave => spa.set_power_save(index).await,
                ModeSetting::HeatPump => spa.set_heat_pump(index).await,
            }
        })
        .await
    }

    pub async fn set_element_boost(&self, enabled: bool) -> Result<(), CoreError> {
        self.store().set(keys::ELEMENT_BOOST, enabled);
        self.command("set_element_boost", move |spa| async move {
            spa.set_element_boost(enabled).await
        })
        .await
    }

    /// Call the API and request a refresh whatever the outcome. The
    /// optimistic cache write stays until the refresh overwrites it.
    async fn command<F, Fut>(&self, op: &'static str, call: F) -> Result<(), CoreError>
    where
        F: FnOnce(Spa) -> Fut + Send,
        Fut: Future<Output = Result<(), spanet_api::Error>> + Send,
    {
        let ctx = &self.inner.ctx;
        let result = match ctx.spa().await {
            Ok(spa) => ctx.track(call(spa).await).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => info!(spa = self.id(), op, "command accepted"),
            Err(ref e) => warn!(spa = self.id(), op, error = %e, "command failed"),
        }
        self.request_refresh();
        result
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background update loop. No-op if it is already running.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();
        handles.push(tokio::spawn(update_loop(self.clone(), UPDATE_INTERVAL, child)));
        info!(spa = self.id(), "update loop started");
    }

    /// Stop the update loop and wait for it to exit.
    pub async fn stop(&self) {
        self.inner.cancel_child.lock().await.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!(spa = self.id(), "update loop stopped");
    }
}

/// Runs a refresh cycle every `period`, or sooner when woken.
async fn update_loop(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
            () = coordinator.inner.wake.notified() => {
                debug!(spa = coordinator.id(), "refresh requested");
            }
        }
        // Failures are already logged and recorded in the status channel.
        let _ = coordinator.refresh().await;
    }
}

//! Progress simulation for started batches.
//!
//! Each started batch gets one timer task that advances the persisted
//! record every tick until completion. The per-tick state change lives
//! in [`advance`], a pure function of the record, an RNG and the
//! elapsed time, so a seeded run is fully reproducible.

use log::{info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::{BatchRecord, FileStatus, ProjectStatus};
use crate::storage::{Store, StoreError};

/// Tick cadence of the simulated pipeline.
pub const SIM_TICK: Duration = Duration::from_secs(2);

/// Error recorded on files the simulation fails.
pub const EXTRACTION_ERROR: &str = "Falha na extração de dados";

/// Running simulation tasks, keyed by batch id. The entry is removed
/// when the loop terminates, so `start` is idempotent while a batch is
/// active and restarts after completion.
#[derive(Default)]
pub(crate) struct SimTimers {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SimTimers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_running(&self, batch_id: &str) -> bool {
        self.tasks.lock().contains_key(batch_id)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.tasks.lock().len()
    }

    fn remove(&self, batch_id: &str) {
        self.tasks.lock().remove(batch_id);
    }

    /// Aborts every running loop. Used when the owning service is
    /// dropped.
    pub(crate) fn abort_all(&self) {
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
    }
}

/// Spawns the simulation loop for a batch unless one is already
/// running. Must be called within a tokio runtime.
pub(crate) fn start(
    store: Arc<Store>,
    timers: Arc<SimTimers>,
    tick: Duration,
    seed: Option<u64>,
    project_id: String,
    batch_id: String,
) {
    let mut tasks = timers.tasks.lock();
    if tasks.contains_key(&batch_id) {
        return;
    }

    info!("starting simulation for batch {}", batch_id);
    let handle = tokio::spawn(run_loop(
        Arc::clone(&store),
        Arc::clone(&timers),
        tick,
        seed,
        project_id,
        batch_id.clone(),
    ));
    tasks.insert(batch_id, handle);
}

async fn run_loop(
    store: Arc<Store>,
    timers: Arc<SimTimers>,
    tick: Duration,
    seed: Option<u64>,
    project_id: String,
    batch_id: String,
) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ batch_stream(&batch_id)),
        None => StdRng::from_entropy(),
    };

    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately; the loop
    // below should only run after a full period.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match step(&store, &mut rng, &project_id, &batch_id) {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => warn!("simulation tick failed for batch {}: {}", batch_id, err),
        }
    }

    timers.remove(&batch_id);
}

/// Derives a per-batch RNG stream from the configured seed.
fn batch_stream(batch_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    batch_id.hash(&mut hasher);
    hasher.finish()
}

/// One timer tick: advance the persisted batch and, on completion,
/// propagate to the parent project and the cached stats. Returns true
/// when the loop should stop.
fn step(
    store: &Store,
    rng: &mut StdRng,
    project_id: &str,
    batch_id: &str,
) -> Result<bool, StoreError> {
    let advanced = store.update_batches(|batches| {
        batches.get_mut(batch_id).map(|batch| {
            let elapsed = elapsed_sec(batch.started_at);
            advance(batch, rng, elapsed)
        })
    })?;

    // Record vanished from the store: nothing left to simulate.
    let Some(done) = advanced else {
        return Ok(true);
    };

    if done {
        store.update_projects(|projects| {
            if let Some(project) = projects.iter_mut().find(|p| p.id == project_id) {
                project.status = ProjectStatus::Completed;
                project.progress = 100;
            }
        })?;
        info!("batch {} completed", batch_id);
    }

    super::recompute_stats(store)?;
    Ok(done)
}

fn elapsed_sec(started_at_ms: i64) -> u64 {
    let delta = chrono::Utc::now().timestamp_millis() - started_at_ms;
    (delta.max(0) / 1000) as u64
}

/// Advances a batch by one tick.
///
/// File transitions are monotonic (`Queued -> Processing -> Done |
/// Failed`) and each file bumps exactly one counter, exactly when it
/// leaves `Processing`. Returns true once the batch is complete:
/// progress saturated at 100 or every file terminal. Completion pins
/// progress to 100 and marks the batch `Completed` whether or not any
/// file failed, matching the backend contract.
pub fn advance(batch: &mut BatchRecord, rng: &mut impl Rng, elapsed_sec: u64) -> bool {
    batch.elapsed_sec = elapsed_sec;
    batch.progress = (batch.progress + rng.gen::<f64>() * 15.0).min(100.0);

    for file in &mut batch.files {
        match file.status {
            FileStatus::Queued => {
                if rng.gen::<f64>() > 0.7 {
                    file.status = FileStatus::Processing;
                }
            }
            FileStatus::Processing => {
                if rng.gen::<f64>() > 0.6 {
                    let failed = rng.gen::<f64>() <= 0.1;
                    file.duration_sec = Some(20 + (rng.gen::<f64>() * 60.0) as u32);
                    if failed {
                        file.status = FileStatus::Failed;
                        file.error = Some(EXTRACTION_ERROR.to_string());
                        batch.counters.failed += 1;
                    } else {
                        file.status = FileStatus::Done;
                        batch.counters.ok += 1;
                    }
                }
            }
            FileStatus::Done | FileStatus::Failed => {}
        }
    }

    if batch.progress >= 100.0 || batch.all_files_terminal() {
        batch.progress = 100.0;
        batch.status = ProjectStatus::Completed;
        return true;
    }
    false
}

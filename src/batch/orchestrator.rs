//! Sequential batch conversion with cooperative cancellation
//!
//! One worker calls [`BatchOrchestrator::run`]; any other thread may hold a
//! [`CancelHandle`] and read the state snapshot while the run is going.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::destination::{numbered_name, DestinationPolicy};
use super::events::{BatchEvent, EventSink};
use super::state::{BatchState, ItemOutcome, ItemResult};
use crate::audio::{sanitize, strip_extension};
use crate::conversion::{ConversionEngine, ConversionOutcome, Encoder, TargetFormat};
use crate::core::{BatchJob, MusicItem};

/// Output file name for an item
///
/// `"<track>.<artist> - <title>"` when title and artist are set (the track
/// prefix only when a track number is), else the display name without its
/// extension. Sanitized, then given the target extension.
pub fn destination_file_name(item: &MusicItem, format: TargetFormat) -> String {
    let meta = &item.metadata;
    let non_blank = |v: &Option<String>| {
        v.as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    let base = match (non_blank(&meta.title), non_blank(&meta.artist)) {
        (Some(title), Some(artist)) => match non_blank(&meta.track_number) {
            Some(track) => format!("{}.{} - {}", track, artist, title),
            None => format!("{} - {}", artist, title),
        },
        _ => strip_extension(&item.name).to_string(),
    };

    format!("{}.{}", sanitize(&base), format.extension())
}

/// Claim a file name not yet used in this run, numbering repeats " (n)"
///
/// Names compare case-insensitively so they stay distinct on
/// case-insensitive filesystems.
fn claim_name(used: &mut HashSet<String>, file_name: String) -> String {
    let mut n = 0;
    loop {
        let candidate = numbered_name(&file_name, n);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Requests cancellation of a running batch. Cheap to clone.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    encoder: Arc<dyn Encoder>,
    /// Held while cancelling so a run start can't interleave
    state: Arc<Mutex<BatchState>>,
}

impl CancelHandle {
    /// Stop before the next item and signal the running encoder. Idempotent.
    pub fn cancel(&self) {
        let _state = self.state.lock();
        if !self.flag.swap(true, Ordering::SeqCst) {
            log::info!("Batch cancellation requested");
        }
        self.encoder.cancel_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct BatchOrchestrator {
    engine: ConversionEngine,
    converted_dir: PathBuf,
    cancel: CancelHandle,
    state: Arc<Mutex<BatchState>>,
    outcomes: Mutex<Vec<ItemOutcome>>,
}

impl BatchOrchestrator {
    pub fn new(engine: ConversionEngine, converted_dir: impl Into<PathBuf>) -> Self {
        let state = Arc::new(Mutex::new(BatchState::Idle));
        let cancel = CancelHandle {
            flag: Arc::new(AtomicBool::new(false)),
            encoder: Arc::clone(engine.encoder()),
            state: Arc::clone(&state),
        };
        Self {
            engine,
            converted_dir: converted_dir.into(),
            cancel,
            state,
            outcomes: Mutex::new(Vec::new()),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[cfg(test)]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current state; a running state reflects a pending cancel
    #[allow(dead_code)]
    pub fn state(&self) -> BatchState {
        let state = self.state.lock().map(|s| s.clone()).unwrap_or_default();
        match state {
            BatchState::Running {
                current_index,
                completed,
                ..
            } => BatchState::Running {
                current_index,
                completed,
                cancel_requested: self.cancel.is_cancelled(),
            },
            other => other,
        }
    }

    /// Outcomes of the items attempted in the most recent run
    pub fn last_outcomes(&self) -> Vec<ItemOutcome> {
        self.outcomes.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn set_state(&self, state: BatchState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn record(&self, item: &MusicItem, result: ItemResult) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push(ItemOutcome {
                id: item.id.clone(),
                name: item.name.clone(),
                result,
            });
        }
    }

    fn emit(&self, sink: &dyn EventSink, event: BatchEvent) {
        if catch_unwind(AssertUnwindSafe(|| sink.emit(event))).is_err() {
            log::error!("Event sink panicked; event dropped");
        }
    }

    /// Convert every item of `job` in order
    ///
    /// Returns `Completed` only when every item converted; `Idle` after a
    /// cancel or any failure.
    pub fn run(
        &self,
        job: BatchJob,
        destination: &DestinationPolicy,
        sink: &dyn EventSink,
    ) -> BatchState {
        let total = job.items.len();

        {
            let Ok(mut state) = self.state.lock() else {
                log::error!("Batch state lock poisoned");
                return BatchState::Idle;
            };
            if state.is_running() {
                log::warn!("A batch is already running; ignoring new run");
                return state.clone();
            }
            if total == 0 {
                *state = BatchState::Idle;
                return BatchState::Idle;
            }
            // Cancels from before this run are dropped; any made once the
            // state reads Running must survive
            self.cancel.flag.store(false, Ordering::SeqCst);
            self.engine.encoder().reset_cancel();
            *state = BatchState::Running {
                current_index: 0,
                completed: 0,
                cancel_requested: false,
            };
        }

        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.clear();
        }

        log::info!(
            "Starting batch of {} items -> {} ({}), destination {:?}",
            total,
            job.target_format,
            job.quality,
            destination
        );

        let mut completed = 0;
        let mut used_names = HashSet::new();

        for (index, item) in job.items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::info!("Batch cancelled before item {} of {}", index + 1, total);
                break;
            }

            self.set_state(BatchState::Running {
                current_index: index,
                completed,
                cancel_requested: false,
            });
            let label = item.label().to_string();
            self.emit(
                sink,
                BatchEvent::ItemStarted {
                    index,
                    total,
                    name: label.clone(),
                },
            );

            let file_name =
                claim_name(&mut used_names, destination_file_name(item, job.target_format));
            let converted = self.converted_dir.join(&file_name);

            match self
                .engine
                .convert(&item.path, &converted, job.target_format, job.quality)
            {
                ConversionOutcome::Success => {
                    completed += 1;
                    self.set_state(BatchState::Running {
                        current_index: index,
                        completed,
                        cancel_requested: false,
                    });

                    match destination.route(&converted, &file_name) {
                        Ok(output) => {
                            self.record(item, ItemResult::Converted(output.clone()));
                            self.emit(
                                sink,
                                BatchEvent::ItemSucceeded {
                                    index,
                                    name: label,
                                    output,
                                },
                            );
                        }
                        Err(e) => {
                            log::warn!("Routing {} failed: {}", file_name, e);
                            self.record(item, ItemResult::Converted(converted.clone()));
                            self.emit(
                                sink,
                                BatchEvent::ItemSucceeded {
                                    index,
                                    name: label.clone(),
                                    output: converted,
                                },
                            );
                            self.emit(
                                sink,
                                BatchEvent::RoutingFailed {
                                    index,
                                    name: label,
                                    reason: e.to_string(),
                                },
                            );
                        }
                    }
                }
                ConversionOutcome::CancelledByUser => {
                    self.record(item, ItemResult::Cancelled);
                    // The encoder may report a cancel we didn't ask for; end the run either way
                    self.cancel.flag.store(true, Ordering::SeqCst);
                    log::info!("Batch cancelled during {}", item.name);
                    break;
                }
                ConversionOutcome::Failed(e) => {
                    let reason = e.to_string();
                    self.record(item, ItemResult::Failed(reason.clone()));
                    self.emit(
                        sink,
                        BatchEvent::ItemFailed {
                            index,
                            name: label,
                            reason,
                        },
                    );
                }
            }
        }

        let final_state = if completed == total {
            self.emit(sink, BatchEvent::BatchFinished { completed, total });
            BatchState::Completed { completed, total }
        } else {
            BatchState::Idle
        };

        log::info!("Batch finished: {} of {} converted", completed, total);
        self.set_state(final_state.clone());
        final_state
    }
}

//! The loop controller - drives one run to a terminal outcome.
//!
//! Each cycle is a fresh-context pass: poll signals, check budgets, build the
//! outbound message from the progress log, call the agent, apply its actions,
//! checkpoint the workspace, validate externally, scan for the completion
//! token, run quality gates, evaluate the exit policy, then append and
//! persist. The checkpoint always lands before the record is persisted, so
//! the durable cycle count never claims work the workspace does not have.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::agent::Agent;
use crate::config::RunConfig;
use crate::coordination::SignalChannel;
use crate::domain::{ControlRecord, RunOutcome, RunStatus, Signal};
use crate::error::{CyclrError, Result};
use crate::exit::{CycleFacts, ExitDecision, ExitPolicy};
use crate::gates::run_gates;
use crate::progress::{CycleEntry, ProgressTracker};
use crate::prompt::{PromptBuilder, contains_completion_line};
use crate::store::StateStore;
use crate::tools::ToolExecutor;
use crate::validation::Validator;
use crate::vcs::Vcs;

/// Drives one loop instance from claim to terminal status
pub struct LoopController<A, T, V, G, S> {
    agent: Arc<A>,
    tools: Arc<T>,
    validator: Arc<V>,
    vcs: Arc<G>,
    store: Arc<S>,
    signals: Arc<SignalChannel>,
    config: RunConfig,
    workspace: PathBuf,
}

impl<A, T, V, G, S> LoopController<A, T, V, G, S>
where
    A: Agent,
    T: ToolExecutor,
    V: Validator,
    G: Vcs,
    S: StateStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: Arc<A>,
        tools: Arc<T>,
        validator: Arc<V>,
        vcs: Arc<G>,
        store: Arc<S>,
        signals: Arc<SignalChannel>,
        config: RunConfig,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            agent,
            tools,
            validator,
            vcs,
            store,
            signals,
            config,
            workspace: workspace.into(),
        }
    }

    /// Run the loop for the given id until a terminal outcome.
    ///
    /// Creates the record if it does not exist, claims it via the store's
    /// conditional transition, and holds Running until termination or a
    /// Pause signal.
    pub async fn run(&self, id: &str) -> Result<RunOutcome> {
        let mut record = match self.store.load(id)? {
            Some(existing) => existing,
            None => {
                let fresh =
                    ControlRecord::new(id, self.config.clone(), self.workspace.clone());
                self.store.save(&fresh)?;
                fresh
            }
        };

        if record.status.is_terminal() {
            return Err(CyclrError::InvalidState(format!(
                "run {} already ended with {:?}",
                id, record.status
            )));
        }
        if record.status == RunStatus::Paused {
            return Err(CyclrError::InvalidState(format!(
                "run {} is paused; mark it pending to resume",
                id
            )));
        }

        let claimed = self
            .store
            .compare_and_set_status(id, RunStatus::Pending, RunStatus::Running)?;
        if !claimed {
            return Err(CyclrError::Conflict(format!(
                "run {} is already claimed",
                id
            )));
        }
        record.status = RunStatus::Running;

        // A resumed record keeps the config and workspace it started with;
        // the constructor's copies only seed brand-new records.
        let config = record.config.clone();
        let workspace = record.workspace.clone();

        let mut tracker =
            ProgressTracker::from_log(record.progress.clone(), config.progress_cap.clone());
        let builder = PromptBuilder::new(&config.task, &config.completion_signal);
        let started = Instant::now();
        let mut total_tokens: u64 = 0;
        let mut total_cost: f64 = 0.0;

        log::info!(
            "run {} claimed at cycle {} in {}",
            id,
            record.cycle_count,
            workspace.display()
        );

        loop {
            // Signals preempt everything, including a success this cycle
            // would otherwise reach.
            if let Some(signal) = self.signals.poll() {
                match signal {
                    Signal::Stop => {
                        return self.finish_signalled(&mut record, &tracker, Signal::Stop);
                    }
                    Signal::Pause => {
                        log::info!("run {} paused at cycle {}", record.id, record.cycle_count);
                        record.progress = tracker.log().clone();
                        record.status = RunStatus::Paused;
                        record.touch();
                        self.store.save(&record)?;
                        return Ok(RunOutcome::Stopped {
                            signal: Signal::Pause,
                            cycles: record.cycle_count,
                        });
                    }
                    Signal::Invalidate => {
                        if config.invalidate_clears_progress {
                            tracker.clear();
                        }
                        return self.finish_signalled(&mut record, &tracker, Signal::Invalidate);
                    }
                    Signal::Resume => {
                        log::warn!("ignoring resume signal for already-running run {}", record.id);
                    }
                }
            }

            // Records can arrive at the ceiling from outside a normal cycle
            // (seeded, or resumed after the limit was already reached).
            if record.cycle_count >= config.max_cycles {
                return self.finish_failed(
                    &mut record,
                    &tracker,
                    "max iterations exhausted".to_string(),
                );
            }

            if let Some(reason) = budget_exhausted(&config, started, total_tokens, total_cost) {
                return self.finish_failed(&mut record, &tracker, reason);
            }

            let cycle = record.cycle_count + 1;
            let feedback = tracker.render();
            let system = builder.system();
            let user = builder.user_message(&feedback);

            log::debug!("run {} starting cycle {}", record.id, cycle);

            let reply = match tokio::time::timeout(
                config.cycle_timeout(),
                self.agent.complete(&system, &user),
            )
            .await
            {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => {
                    log::warn!("run {} cycle {} agent error: {}", record.id, cycle, e);
                    match self.record_broken_cycle(
                        &mut record,
                        &mut tracker,
                        cycle,
                        config.max_cycles,
                        format!("agent call failed: {}", e),
                    )? {
                        Some(outcome) => return Ok(outcome),
                        None => continue,
                    }
                }
                Err(_) => {
                    log::warn!("run {} cycle {} agent call timed out", record.id, cycle);
                    match self.record_broken_cycle(
                        &mut record,
                        &mut tracker,
                        cycle,
                        config.max_cycles,
                        format!(
                            "agent call timed out after {}s",
                            config.cycle_timeout_secs
                        ),
                    )? {
                        Some(outcome) => return Ok(outcome),
                        None => continue,
                    }
                }
            };

            total_tokens += reply.usage.total();
            total_cost += reply.cost_usd;

            // Actions are applied in emission order; the first failure stops
            // the batch and becomes cycle feedback.
            let mut cycle_errors: Vec<String> = Vec::new();
            for action in &reply.actions {
                if let Err(e) = self.tools.apply(action, &workspace).await {
                    log::warn!("run {} cycle {} action failed: {}", record.id, cycle, e);
                    cycle_errors.push(e.to_string());
                    break;
                }
            }

            // Checkpoint before persisting the incremented cycle count.
            if config.auto_commit {
                match self
                    .vcs
                    .commit(&workspace, &config.commit_message(cycle))
                    .await
                {
                    Ok(Some(commit_id)) => {
                        log::debug!("run {} cycle {} checkpoint {}", record.id, cycle, commit_id);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("run {} cycle {} checkpoint failed: {}", record.id, cycle, e);
                        cycle_errors.push(format!("checkpoint failed: {}", e));
                    }
                }
            }

            let report = self
                .validator
                .validate(
                    &workspace,
                    &config.validation_command,
                    config.validation_timeout(),
                )
                .await;

            let promise_found =
                contains_completion_line(&reply.text, &config.completion_signal);
            let gate_outcome = run_gates(&config.quality_gates, &workspace);

            let decision = ExitPolicy::evaluate(&CycleFacts {
                validation_passed: report.passed,
                promise_found,
                gates_passed: gate_outcome.all_passed(),
                failed_gate: gate_outcome.first_failed_gate().map(str::to_string),
                cycle_count: cycle,
                max_cycles: config.max_cycles,
            });

            let summary = match &decision {
                ExitDecision::Complete => "all completion conditions met".to_string(),
                ExitDecision::Failed(reason) => reason.clone(),
                ExitDecision::Continue(feedback) => feedback.clone(),
            };
            if !report.passed {
                cycle_errors.extend(report.error_lines.iter().cloned());
            }
            for failure in &gate_outcome.failures {
                cycle_errors.push(failure.detail.clone());
            }

            let mut entry = CycleEntry::note(cycle, summary);
            entry.promise_found = promise_found;
            entry.validation_passed = report.passed;
            entry.gates_passed = gate_outcome.all_passed();
            entry.errors = cycle_errors;
            tracker.append(entry);

            record.cycle_count = cycle;
            record.progress = tracker.log().clone();
            record.touch();

            match decision {
                ExitDecision::Complete => {
                    record.status = RunStatus::Complete;
                    self.store.save(&record)?;
                    log::info!("run {} complete after {} cycles", record.id, cycle);
                    return Ok(RunOutcome::Complete {
                        cycles: cycle,
                        artifacts: vec![workspace.clone()],
                    });
                }
                ExitDecision::Failed(reason) => {
                    record.status = RunStatus::Failed;
                    self.store.save(&record)?;
                    log::info!("run {} failed after {} cycles: {}", record.id, cycle, reason);
                    return Ok(RunOutcome::Failed {
                        reason,
                        cycles: cycle,
                    });
                }
                ExitDecision::Continue(_) => {
                    self.store.save(&record)?;
                }
            }
        }
    }

    /// Record a cycle that never produced agent output. Returns a terminal
    /// outcome when this exhausts the cycle budget, None to keep looping.
    fn record_broken_cycle(
        &self,
        record: &mut ControlRecord,
        tracker: &mut ProgressTracker,
        cycle: u32,
        max_cycles: u32,
        summary: String,
    ) -> Result<Option<RunOutcome>> {
        tracker.append(CycleEntry::note(cycle, summary));
        record.cycle_count = cycle;
        record.progress = tracker.log().clone();
        record.touch();

        if cycle >= max_cycles {
            record.status = RunStatus::Failed;
            self.store.save(record)?;
            return Ok(Some(RunOutcome::Failed {
                reason: "max iterations exhausted".to_string(),
                cycles: cycle,
            }));
        }

        self.store.save(record)?;
        Ok(None)
    }

    fn finish_signalled(
        &self,
        record: &mut ControlRecord,
        tracker: &ProgressTracker,
        signal: Signal,
    ) -> Result<RunOutcome> {
        log::info!(
            "run {} stopped by {} signal at cycle {}",
            record.id,
            signal,
            record.cycle_count
        );
        record.progress = tracker.log().clone();
        record.status = RunStatus::Stopped;
        record.touch();
        self.store.save(record)?;
        Ok(RunOutcome::Stopped {
            signal,
            cycles: record.cycle_count,
        })
    }

    fn finish_failed(
        &self,
        record: &mut ControlRecord,
        tracker: &ProgressTracker,
        reason: String,
    ) -> Result<RunOutcome> {
        log::info!("run {} failed: {}", record.id, reason);
        record.progress = tracker.log().clone();
        record.status = RunStatus::Failed;
        record.touch();
        self.store.save(record)?;
        Ok(RunOutcome::Failed {
            reason,
            cycles: record.cycle_count,
        })
    }
}

/// Hard budget limits across the whole run
fn budget_exhausted(
    config: &RunConfig,
    started: Instant,
    total_tokens: u64,
    total_cost: f64,
) -> Option<String> {
    if let Some(max_time) = config.max_time_secs
        && started.elapsed().as_secs() >= max_time
    {
        return Some(format!("time budget of {}s exhausted", max_time));
    }
    if let Some(max_tokens) = config.max_tokens
        && total_tokens >= max_tokens
    {
        return Some(format!("token budget of {} exhausted", max_tokens));
    }
    if let Some(max_cost) = config.max_cost_usd
        && total_cost >= max_cost
    {
        return Some(format!("cost budget of ${:.2} exhausted", max_cost));
    }
    None
}

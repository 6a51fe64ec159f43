//! Automaton driver.
//!
//! The worker binds every configured machine to the registry, restores its
//! last snapshot, then drives the machines from a fixed pool of threads.
//! Each machine is owned by exactly one thread for the whole run.

use crate::config::{Config, MachineConfig};
use crate::error::WorkerError;
use fsmreg_core::{Automaton, Registry};
use fsmreg_persist::{PersistError, SnapshotStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Outcome of one driven machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineReport {
    pub name: String,
    pub restored: bool,
    pub applied: u64,
    pub failures: u64,
    pub snapshots: u64,
    pub final_state: String,
    pub checksum: u64,
}

/// Outcome of a worker run.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub machines: BTreeMap<String, MachineReport>,
}

impl WorkerReport {
    pub fn applied(&self) -> u64 {
        self.machines.values().map(|m| m.applied).sum()
    }

    pub fn failures(&self) -> u64 {
        self.machines.values().map(|m| m.failures).sum()
    }

    pub fn snapshots(&self) -> u64 {
        self.machines.values().map(|m| m.snapshots).sum()
    }
}

/// Drives configured machines against a registry and a snapshot store.
pub struct Worker<'a> {
    config: &'a Config,
    registry: &'a Registry,
    store: &'a SnapshotStore,
}

impl<'a> Worker<'a> {
    pub fn new(config: &'a Config, registry: &'a Registry, store: &'a SnapshotStore) -> Self {
        Self {
            config,
            registry,
            store,
        }
    }

    /// Runs every machine for `worker.iterations` symbols.
    pub fn run(&self) -> Result<WorkerReport, WorkerError> {
        let threads = self.thread_count();
        let mut assignments: Vec<Vec<(usize, &MachineConfig)>> = vec![Vec::new(); threads];
        for (i, machine) in self.config.machines.iter().enumerate() {
            assignments[i % threads].push((i, machine));
        }

        tracing::info!(
            "Driving {} machine(s) on {} thread(s), {} symbols each",
            self.config.machines.len(),
            threads,
            self.config.worker.iterations
        );

        let results: Vec<Result<Vec<MachineReport>, WorkerError>> = std::thread::scope(|s| {
            let handles: Vec<_> = assignments
                .iter()
                .map(|owned| {
                    s.spawn(move || {
                        owned
                            .iter()
                            .map(|(index, machine)| self.drive(*index, machine))
                            .collect::<Result<Vec<_>, _>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        let mut report = WorkerReport::default();
        for result in results {
            for machine in result? {
                report.machines.insert(machine.name.clone(), machine);
            }
        }

        tracing::info!(
            "Run complete: {} symbols applied, {} failures, {} snapshots, {} definitions",
            report.applied(),
            report.failures(),
            report.snapshots(),
            self.registry.number_of_definitions()
        );

        Ok(report)
    }

    /// Configured thread count, capped at one thread per machine.
    fn thread_count(&self) -> usize {
        self.config
            .worker
            .threads
            .min(self.config.machines.len())
            .max(1)
    }

    fn drive(&self, index: usize, machine: &MachineConfig) -> Result<MachineReport, WorkerError> {
        let initial = machine.initial_state()?;
        let parts = &machine.definition;
        let mut automaton = Automaton::create_in(
            self.registry,
            &parts.alphabet,
            &parts.states,
            &parts.transitions,
            initial,
        )?;

        let restored = self.restore(&machine.name, &mut automaton)?;

        let worker = &self.config.worker;
        let mut rng = ChaCha8Rng::seed_from_u64(worker.seed.wrapping_add(index as u64));
        let alphabet_size = automaton.definition().alphabet_size();

        let mut report = MachineReport {
            name: machine.name.clone(),
            restored,
            applied: 0,
            failures: 0,
            snapshots: 0,
            final_state: String::new(),
            checksum: 0,
        };

        for step in 1..=worker.iterations {
            let symbol = rng.gen_range(0..alphabet_size);
            if automaton.apply(symbol) {
                report.applied += 1;
                tracing::trace!(
                    "Machine {} step {}: {} -> {}",
                    machine.name,
                    step,
                    automaton.definition().symbol_label(symbol).unwrap_or("?"),
                    automaton.state_label()
                );
            } else {
                report.failures += 1;
            }

            if worker.snapshot_every > 0 && step % worker.snapshot_every == 0 {
                self.store.save(&machine.name, &automaton)?;
                report.snapshots += 1;
            }
        }

        if worker.snapshot_every == 0 || worker.iterations % worker.snapshot_every != 0 {
            self.store.save(&machine.name, &automaton)?;
            report.snapshots += 1;
        }

        report.final_state = automaton.state_label().to_string();
        report.checksum = automaton.checksum();

        tracing::debug!(
            "Machine {} finished in state {} (checksum {:016x})",
            machine.name,
            report.final_state,
            report.checksum
        );

        if report.failures > 0 {
            tracing::warn!(
                "Machine {} rejected {} symbol(s)",
                machine.name,
                report.failures
            );
        }

        Ok(report)
    }

    /// Restores the last snapshot of `name` into `automaton`.
    ///
    /// Missing, corrupt or mismatched snapshots are treated as no prior
    /// state; I/O failures abort the run.
    fn restore(&self, name: &str, automaton: &mut Automaton) -> Result<bool, PersistError> {
        if self.store.meta(name).is_none() {
            return Ok(false);
        }

        match self.store.restore(name, automaton) {
            Ok(()) => {
                tracing::info!(
                    "Restored machine {} in state {}",
                    name,
                    automaton.state_label()
                );
                Ok(true)
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    "Discarding snapshot of machine {} [{}]: {}",
                    name,
                    e.error_code(),
                    e
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

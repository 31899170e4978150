//! Simulation kernel with event queue, hierarchy flattening, and delta-cycle loop.
//!
//! [`SimKernel`] is the core simulation engine. It flattens the module hierarchy
//! at construction time, then runs an event-driven simulation loop with delta
//! cycles, multi-driver resolution, edge detection, and sensitivity-based
//! process wakeup.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use aion_common::{Interner, Logic, LogicVec};
use aion_ir::arena::Arena;
use aion_ir::{
    CellKind, ConstValue, Design, Edge, Expr, ModuleId, Process, ProcessKind, Sensitivity,
    SignalId, SignalKind, SignalRef, Statement, TypeDb,
};

use crate::error::SimError;
use crate::evaluator::{exec_statement, EvalContext, ExecResult, PendingUpdate};
use crate::time::SimTime;
use crate::value::{DriveStrength, SimSignalId, SimSignalState};
use crate::waveform::WaveformRecorder;

/// An event scheduled in the simulation event queue.
#[derive(Debug, Clone)]
struct SimEvent {
    /// When this event should be applied.
    time: SimTime,
    /// The target signal.
    signal: SimSignalId,
    /// The new value.
    value: LogicVec,
    /// The drive strength.
    _strength: DriveStrength,
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time.cmp(&other.time)
    }
}

/// A simulation process with its pre-computed metadata.
#[derive(Debug, Clone)]
struct SimProcess {
    /// Index into the kernel's process list (for identification).
    _index: usize,
    /// The process kind (Combinational, Sequential, Initial).
    kind: ProcessKind,
    /// Mapping from the process's module IR `SignalId` to flat `SimSignalId`.
    signal_map: HashMap<SignalId, SimSignalId>,
    /// The process body statement tree.
    body: Statement,
    /// The sensitivity specification.
    sensitivity: Sensitivity,
    /// The set of signals this process reads (for `Sensitivity::All`).
    read_signals: HashSet<SimSignalId>,
}

/// The result of a completed simulation run.
#[derive(Debug, Clone)]
pub struct SimResult {
    /// The final simulation time when the run ended.
    pub final_time: SimTime,
    /// Whether the simulation was terminated by `$finish`.
    pub finished_by_user: bool,
    /// The total number of delta cycles executed.
    pub total_deltas: u64,
    /// All `$display` output collected during the run.
    pub display_output: Vec<String>,
    /// Assertion failure messages collected during the run.
    pub assertion_failures: Vec<String>,
}

/// The result of a single delta-cycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Simulation can continue.
    Continued,
    /// Simulation is done (no more events or $finish).
    Done,
}

/// A process whose execution is suspended pending a delay.
#[derive(Debug, Clone)]
struct SuspendedProcess {
    /// The index of the process in the kernel's process list.
    process_idx: usize,
    /// The remaining statements to execute when the process wakes.
    continuation: Statement,
}

/// The simulation kernel: flattened hierarchy, event queue, and execution engine.
///
/// Construct via [`SimKernel::new`] from an elaborated [`Design`], then call
/// [`run`](SimKernel::run) or [`run_to_completion`](SimKernel::run_to_completion).
pub struct SimKernel {
    /// Current simulation time.
    current_time: SimTime,
    /// Min-heap event queue (earliest events first).
    event_queue: BinaryHeap<Reverse<SimEvent>>,
    /// All flattened simulation signals.
    signals: Arena<SimSignalId, SimSignalState>,
    /// All simulation processes.
    processes: Vec<SimProcess>,
    /// Optional waveform recorder.
    recorder: Option<Box<dyn WaveformRecorder>>,
    /// The type database (cloned from the design).
    types: TypeDb,
    /// Whether `$finish` has been called.
    finished: bool,
    /// Collected `$display` output.
    display_output: Vec<String>,
    /// Collected assertion failure messages.
    assertion_failures: Vec<String>,
    /// Optional time limit in femtoseconds.
    time_limit: Option<u64>,
    /// Mapping from SimSignalId to the processes sensitive to it.
    sensitivity_map: HashMap<SimSignalId, Vec<usize>>,
    /// Maximum delta cycles per time step (default 10,000).
    max_delta_per_step: u32,
    /// Total delta cycles executed.
    total_deltas: u64,
    /// Processes suspended by delay statements, sorted by wake time.
    suspended_processes: Vec<(SimTime, SuspendedProcess)>,
}

impl SimKernel {
    /// Creates a new simulation kernel from an elaborated design.
    ///
    /// Flattens the module hierarchy, allocating flat signal IDs and creating
    /// simulation processes with their signal mappings. The `interner` is used
    /// to resolve interned signal and instance names into human-readable strings.
    pub fn new(design: &Design, interner: &Interner) -> Result<Self, SimError> {
        let top_id = design.top;
        if design.modules.is_empty() {
            return Err(SimError::NoTopModule);
        }

        let mut kernel = Self {
            current_time: SimTime::zero(),
            event_queue: BinaryHeap::new(),
            signals: Arena::new(),
            processes: Vec::new(),
            recorder: None,
            types: design.types.clone(),
            finished: false,
            display_output: Vec::new(),
            assertion_failures: Vec::new(),
            time_limit: None,
            sensitivity_map: HashMap::new(),
            max_delta_per_step: 10_000,
            total_deltas: 0,
            suspended_processes: Vec::new(),
        };

        // Flatten the hierarchy starting at top
        let mut signal_map = HashMap::new();
        kernel.flatten_module(design, top_id, "top", &mut signal_map, interner)?;

        // Build sensitivity map
        kernel.build_sensitivity_map();

        Ok(kernel)
    }

    /// Sets the time limit for the simulation.
    pub fn set_time_limit(&mut self, limit_fs: u64) {
        self.time_limit = Some(limit_fs);
    }

    /// Sets the maximum number of delta cycles per time step.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta_per_step = max;
    }

    /// Attaches a waveform recorder to the kernel.
    pub fn set_recorder(&mut self, recorder: Box<dyn WaveformRecorder>) {
        self.recorder = Some(recorder);
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Returns the value of a signal by its flat ID.
    pub fn signal_value(&self, id: SimSignalId) -> &LogicVec {
        &self.signals.get(id).value
    }

    /// Finds a signal by hierarchical name, returning its flat ID.
    pub fn find_signal(&self, name: &str) -> Option<SimSignalId> {
        self.signals
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    /// Returns the number of flattened signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Returns the number of simulation processes.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Runs the simulation for the given duration in femtoseconds.
    pub fn run(&mut self, duration_fs: u64) -> Result<SimResult, SimError> {
        let end_time = self.current_time.fs + duration_fs;
        self.time_limit = Some(end_time);
        self.run_simulation()
    }

    /// Runs the simulation to completion (until event queue empties or `$finish`).
    pub fn run_to_completion(&mut self) -> Result<SimResult, SimError> {
        self.run_simulation()
    }

    /// Executes a single delta-cycle step.
    pub fn step_delta(&mut self) -> Result<StepResult, SimError> {
        if self.event_queue.is_empty() {
            return Ok(StepResult::Done);
        }

        // Get the next event time
        let next_time = self.event_queue.peek().unwrap().0.time;

        // Check time limit
        if let Some(limit) = self.time_limit {
            if next_time.fs > limit {
                return Ok(StepResult::Done);
            }
        }

        self.current_time = next_time;

        // Dequeue all events at current time
        let mut events = Vec::new();
        while let Some(Reverse(evt)) = self.event_queue.peek() {
            if evt.time == self.current_time {
                events.push(self.event_queue.pop().unwrap().0);
            } else {
                break;
            }
        }

        // Apply events to signals
        let mut changed_signals = HashSet::new();
        for evt in &events {
            let sig = self.signals.get_mut(evt.signal);
            sig.previous_value = sig.value.clone();

            // Apply the new value
            let mut new_val = sig.value.clone();
            for i in 0..new_val.width().min(evt.value.width()) {
                new_val.set(i, evt.value.get(i));
            }

            if new_val != sig.value {
                sig.value = new_val;
                changed_signals.insert(evt.signal);
            }
        }

        // Record waveform changes
        if self.recorder.is_some() {
            for &sig_id in &changed_signals {
                let sig = self.signals.get(sig_id);
                let value = sig.value.clone();
                let time_fs = self.current_time.fs;
                if let Some(rec) = &mut self.recorder {
                    rec.record_change(time_fs, sig_id, &value)?;
                }
            }
        }

        // Find and execute sensitive processes
        let mut all_pending = Vec::new();
        let processes_to_run = self.find_sensitive_processes(&changed_signals);

        for proc_idx in processes_to_run {
            let proc = &self.processes[proc_idx];
            let ctx = EvalContext {
                signals: &self.signals,
                signal_map: &proc.signal_map,
                types: &self.types,
            };
            let mut pending = Vec::new();
            let mut display = Vec::new();
            let result = exec_statement(&ctx, &proc.body, &mut pending, &mut display)?;

            self.display_output.extend(display.iter().cloned());
            for msg in &display {
                if msg.starts_with("ASSERTION FAILED:") {
                    self.assertion_failures.push(msg.clone());
                }
            }
            all_pending.extend(pending);

            if matches!(result, ExecResult::Finish) {
                self.finished = true;
                return Ok(StepResult::Done);
            }
        }

        // Schedule pending updates (merging slice updates to same signal)
        let next_delta = self.current_time.next_delta();
        self.merge_and_schedule(all_pending, next_delta);

        self.total_deltas += 1;

        Ok(StepResult::Continued)
    }

    /// Flattens a module into the kernel's flat signal/process space.
    fn flatten_module(
        &mut self,
        design: &Design,
        module_id: ModuleId,
        prefix: &str,
        parent_signal_map: &mut HashMap<SignalId, SimSignalId>,
        interner: &Interner,
    ) -> Result<HashMap<SignalId, SimSignalId>, SimError> {
        let module = design.modules.get(module_id);
        let mut signal_map = HashMap::new();

        // Allocate signals
        for (sig_id, signal) in module.signals.iter() {
            // If this signal is already mapped by parent (port binding), use that
            if let Some(&existing) = parent_signal_map.get(&sig_id) {
                signal_map.insert(sig_id, existing);
                continue;
            }

            let name = format!("{prefix}.{}", interner.resolve(signal.name));
            let width = self.types.bit_width(signal.ty).unwrap_or(1);

            let init_value = match &signal.init {
                Some(ConstValue::Logic(lv)) => lv.clone(),
                Some(ConstValue::Int(v)) => LogicVec::from_u64(*v as u64, width),
                Some(ConstValue::Bool(b)) => LogicVec::from_bool(*b),
                _ => match signal.kind {
                    SignalKind::Wire | SignalKind::Port => LogicVec::new(width),
                    SignalKind::Reg | SignalKind::Latch => {
                        let mut v = LogicVec::new(width);
                        for i in 0..width {
                            v.set(i, Logic::X);
                        }
                        v
                    }
                    SignalKind::Const => LogicVec::new(width),
                },
            };

            let sim_id = self
                .signals
                .alloc(SimSignalState::new(name, width, init_value));
            signal_map.insert(sig_id, sim_id);
        }

        // Create processes
        for (_, process) in module.processes.iter() {
            self.create_sim_process(process, &signal_map);
        }

        // Create implicit processes for concurrent assignments
        for assignment in &module.assignments {
            let proc_body = Statement::Assign {
                target: assignment.target.clone(),
                value: assignment.value.clone(),
                span: assignment.span,
            };
            let read_sigs = collect_expr_read_signals(&assignment.value, &signal_map);
            let proc = SimProcess {
                _index: self.processes.len(),
                kind: ProcessKind::Combinational,
                signal_map: signal_map.clone(),
                body: proc_body,
                sensitivity: Sensitivity::All,
                read_signals: read_sigs,
            };
            self.processes.push(proc);
        }

        // Recurse into instances
        for (_, cell) in module.cells.iter() {
            if let CellKind::Instance {
                module: child_mod, ..
            } = &cell.kind
            {
                let child_module = design.modules.get(*child_mod);
                let child_prefix = format!("{prefix}.{}", interner.resolve(cell.name));

                // Build parent-to-child signal binding
                let mut child_port_map = HashMap::new();
                for conn in &cell.connections {
                    // Find the child port with matching name
                    if let Some(child_port) =
                        child_module.ports.iter().find(|p| p.name == conn.port_name)
                    {
                        // Resolve the parent's signal ref to a SimSignalId
                        if let Some(parent_sim_id) =
                            resolve_signal_ref_to_sim_id(&conn.signal, &signal_map)
                        {
                            child_port_map.insert(child_port.signal, parent_sim_id);
                        }
                    }
                }

                self.flatten_module(
                    design,
                    *child_mod,
                    &child_prefix,
                    &mut child_port_map,
                    interner,
                )?;
            }
        }

        Ok(signal_map)
    }

    /// Creates a SimProcess from an IR Process.
    fn create_sim_process(
        &mut self,
        process: &Process,
        signal_map: &HashMap<SignalId, SimSignalId>,
    ) {
        let read_sigs = collect_stmt_read_signals(&process.body, signal_map);
        let proc = SimProcess {
            _index: self.processes.len(),
            kind: process.kind,
            signal_map: signal_map.clone(),
            body: process.body.clone(),
            sensitivity: process.sensitivity.clone(),
            read_signals: read_sigs,
        };
        self.processes.push(proc);
    }

    /// Builds the sensitivity map: signal → list of process indices.
    fn build_sensitivity_map(&mut self) {
        self.sensitivity_map.clear();
        for (idx, proc) in self.processes.iter().enumerate() {
            match &proc.sensitivity {
                Sensitivity::All => {
                    // Sensitive to all read signals
                    for &sig in &proc.read_signals {
                        self.sensitivity_map.entry(sig).or_default().push(idx);
                    }
                }
                Sensitivity::EdgeList(edges) => {
                    for edge_sens in edges {
                        if let Some(&sim_id) = proc.signal_map.get(&edge_sens.signal) {
                            self.sensitivity_map.entry(sim_id).or_default().push(idx);
                        }
                    }
                }
                Sensitivity::SignalList(sigs) => {
                    for sig_id in sigs {
                        if let Some(&sim_id) = proc.signal_map.get(sig_id) {
                            self.sensitivity_map.entry(sim_id).or_default().push(idx);
                        }
                    }
                }
            }
        }
    }

    /// Finds processes to execute based on which signals changed.
    fn find_sensitive_processes(&self, changed: &HashSet<SimSignalId>) -> Vec<usize> {
        let mut to_run = HashSet::new();

        for &sig_id in changed {
            if let Some(procs) = self.sensitivity_map.get(&sig_id) {
                for &proc_idx in procs {
                    let proc = &self.processes[proc_idx];

                    // For edge-sensitive processes, check edge conditions
                    if let Sensitivity::EdgeList(edges) = &proc.sensitivity {
                        let should_wake = edges.iter().any(|es| {
                            if let Some(&sim_id) = proc.signal_map.get(&es.signal) {
                                if changed.contains(&sim_id) {
                                    let sig = self.signals.get(sim_id);
                                    check_edge(&sig.previous_value, &sig.value, es.edge)
                                } else {
                                    false
                                }
                            } else {
                                false
                            }
                        });
                        if should_wake {
                            to_run.insert(proc_idx);
                        }
                    } else {
                        to_run.insert(proc_idx);
                    }
                }
            }
        }

        let mut result: Vec<usize> = to_run.into_iter().collect();
        result.sort_unstable();
        result
    }

    /// Core simulation loop.
    /// Registers all flattened signals with the waveform recorder.
    ///
    /// Groups signals by their hierarchical scope prefix (e.g. `"top"`,
    /// `"top.child"`) and calls `begin_scope`/`register_signal`/`end_scope`
    /// on the recorder to produce the correct scope/variable hierarchy.
    fn register_waveform_signals(&mut self) -> Result<(), SimError> {
        let rec = match &mut self.recorder {
            Some(r) => r,
            None => return Ok(()),
        };

        // Collect signal info to avoid borrow conflict with recorder
        let mut sig_info: Vec<(SimSignalId, String, u32)> = Vec::new();
        for (id, state) in self.signals.iter() {
            sig_info.push((id, state.name.clone(), state.width));
        }

        // Sort by name so scopes group together
        sig_info.sort_by(|a, b| a.1.cmp(&b.1));

        // Track open scopes to emit begin_scope/end_scope correctly
        let mut open_scopes: Vec<String> = Vec::new();

        for (id, full_name, width) in &sig_info {
            // Split "top.child.sig0" into scope=["top","child"] leaf="sig0"
            let parts: Vec<&str> = full_name.split('.').collect();
            let (scope_parts, leaf) = parts.split_at(parts.len() - 1);

            // Close scopes that are no longer common
            let common = open_scopes
                .iter()
                .zip(scope_parts.iter())
                .take_while(|(a, b)| a.as_str() == **b)
                .count();

            // Close scopes from the end back to the common prefix
            while open_scopes.len() > common {
                rec.end_scope()?;
                open_scopes.pop();
            }

            // Open new scopes
            for &scope in &scope_parts[common..] {
                rec.begin_scope(scope)?;
                open_scopes.push(scope.to_string());
            }

            rec.register_signal(*id, leaf[0], *width)?;
        }

        // Close remaining open scopes
        while !open_scopes.is_empty() {
            rec.end_scope()?;
            open_scopes.pop();
        }

        Ok(())
    }

    /// Records the initial value of every signal at time 0.
    ///
    /// Called after `register_waveform_signals` so that the waveform file
    /// contains a complete initial value dump (e.g. VCD `$dumpvars`).
    fn record_initial_values(&mut self) -> Result<(), SimError> {
        let rec = match &mut self.recorder {
            Some(r) => r,
            None => return Ok(()),
        };

        for (id, state) in self.signals.iter() {
            rec.record_change(0, id, &state.value)?;
        }
        Ok(())
    }

    fn run_simulation(&mut self) -> Result<SimResult, SimError> {
        // Phase 0: Register signals with waveform recorder and dump initial values
        self.register_waveform_signals()?;
        self.record_initial_values()?;

        // Phase 1: Execute all Initial processes
        self.execute_initial_processes()?;

        // Phase 2: Execute all combinational processes once (initial propagation)
        self.execute_combinational_processes()?;

        // Phase 3: Event loop — process events and wakeups
        let mut deltas_at_current_time = 0u32;
        while !self.finished {
            // Determine next event time: min(event_queue, suspended wakeups)
            let next_event_time = self.event_queue.peek().map(|e| e.0.time.fs);
            let next_wakeup_time = self.next_wakeup_time();
            let next_time_fs = match (next_event_time, next_wakeup_time) {
                (Some(e), Some(w)) => Some(e.min(w)),
                (Some(e), None) => Some(e),
                (None, Some(w)) => Some(w),
                (None, None) => None,
            };

            let next_time_fs = match next_time_fs {
                Some(t) => t,
                None => break, // Nothing left to do
            };

            // Check time limit
            if let Some(limit) = self.time_limit {
                if next_time_fs > limit {
                    break;
                }
            }

            // Reset delta counter on time change
            if next_time_fs != self.current_time.fs {
                deltas_at_current_time = 0;
            }

            // Process suspended wakeups at this time (before events)
            self.process_wakeups(next_time_fs)?;

            // Process signal events at this time
            if self
                .event_queue
                .peek()
                .is_some_and(|e| e.0.time.fs <= next_time_fs)
            {
                let result = self.step_delta()?;
                deltas_at_current_time += 1;

                if deltas_at_current_time >= self.max_delta_per_step {
                    return Err(SimError::DeltaCycleLimit {
                        fs: self.current_time.fs,
                        max_deltas: self.max_delta_per_step,
                    });
                }

                if result == StepResult::Done {
                    break;
                }
            }
        }

        // Finalize waveform
        if let Some(rec) = &mut self.recorder {
            rec.finalize()?;
        }

        Ok(SimResult {
            final_time: self.current_time,
            finished_by_user: self.finished,
            total_deltas: self.total_deltas,
            display_output: self.display_output.clone(),
            assertion_failures: self.assertion_failures.clone(),
        })
    }

    /// Returns the earliest wakeup time among suspended processes, if any.
    fn next_wakeup_time(&self) -> Option<u64> {
        self.suspended_processes.iter().map(|(t, _)| t.fs).min()
    }

    /// Processes all suspended processes whose wakeup time has arrived.
    ///
    /// Executes their continuations, applies pending updates, and re-queues
    /// any processes that suspend again.
    fn process_wakeups(&mut self, time_fs: u64) -> Result<(), SimError> {
        // Collect wakeups due at or before this time
        let mut due: Vec<SuspendedProcess> = Vec::new();
        let mut remaining: Vec<(SimTime, SuspendedProcess)> = Vec::new();

        for (wake_time, proc) in self.suspended_processes.drain(..) {
            if wake_time.fs <= time_fs {
                due.push(proc);
            } else {
                remaining.push((wake_time, proc));
            }
        }
        self.suspended_processes = remaining;

        if due.is_empty() {
            return Ok(());
        }

        // Advance time to this wakeup
        self.current_time = SimTime {
            fs: time_fs,
            delta: 0,
        };

        for sp in due {
            let proc = &self.processes[sp.process_idx];
            let ctx = EvalContext {
                signals: &self.signals,
                signal_map: &proc.signal_map,
                types: &self.types,
            };
            let mut pending = Vec::new();
            let mut display = Vec::new();
            let result = exec_statement(&ctx, &sp.continuation, &mut pending, &mut display)?;

            self.display_output.extend(display.iter().cloned());
            for msg in &display {
                if msg.starts_with("ASSERTION FAILED:") {
                    self.assertion_failures.push(msg.clone());
                }
            }

            // Schedule updates as events for the next delta cycle so that
            // step_delta() can properly detect the change (comparing previous_value
            // vs new value) and trigger sensitive processes (e.g. posedge clk →
            // sequential counter).  We must NOT apply updates immediately here,
            // because that would make step_delta see no difference and skip the
            // sensitivity check.
            let next_delta = self.current_time.next_delta();
            self.merge_and_schedule(pending, next_delta);

            match result {
                ExecResult::Finish => {
                    self.finished = true;
                    return Ok(());
                }
                ExecResult::Suspend {
                    delay_fs,
                    continuation,
                } => {
                    let wake_time = SimTime {
                        fs: self.current_time.fs + delay_fs,
                        delta: 0,
                    };
                    self.suspended_processes.push((
                        wake_time,
                        SuspendedProcess {
                            process_idx: sp.process_idx,
                            continuation: *continuation,
                        },
                    ));
                }
                ExecResult::Continue => {}
            }
        }
        Ok(())
    }

    /// Executes all Initial processes once.
    fn execute_initial_processes(&mut self) -> Result<(), SimError> {
        let initial_indices: Vec<usize> = self
            .processes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == ProcessKind::Initial)
            .map(|(i, _)| i)
            .collect();

        for idx in initial_indices {
            let proc = &self.processes[idx];
            let ctx = EvalContext {
                signals: &self.signals,
                signal_map: &proc.signal_map,
                types: &self.types,
            };
            let mut pending = Vec::new();
            let mut display = Vec::new();
            let result = exec_statement(&ctx, &proc.body, &mut pending, &mut display)?;

            self.display_output.extend(display.iter().cloned());
            for msg in &display {
                if msg.starts_with("ASSERTION FAILED:") {
                    self.assertion_failures.push(msg.clone());
                }
            }

            // Apply initial updates immediately
            for update in pending {
                self.apply_update_immediate(&update);
            }

            match result {
                ExecResult::Finish => {
                    self.finished = true;
                    break;
                }
                ExecResult::Suspend {
                    delay_fs,
                    continuation,
                } => {
                    let wake_time = SimTime {
                        fs: self.current_time.fs + delay_fs,
                        delta: 0,
                    };
                    self.suspended_processes.push((
                        wake_time,
                        SuspendedProcess {
                            process_idx: idx,
                            continuation: *continuation,
                        },
                    ));
                }
                ExecResult::Continue => {}
            }
        }
        Ok(())
    }

    /// Executes all combinational processes once for initial propagation.
    fn execute_combinational_processes(&mut self) -> Result<(), SimError> {
        let comb_indices: Vec<usize> = self
            .processes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == ProcessKind::Combinational)
            .map(|(i, _)| i)
            .collect();

        for idx in comb_indices {
            let proc = &self.processes[idx];
            let ctx = EvalContext {
                signals: &self.signals,
                signal_map: &proc.signal_map,
                types: &self.types,
            };
            let mut pending = Vec::new();
            let mut display = Vec::new();
            let result = exec_statement(&ctx, &proc.body, &mut pending, &mut display)?;

            self.display_output.extend(display.iter().cloned());

            // Schedule updates at time 0, delta 1 (merging slice updates)
            self.merge_and_schedule(pending, SimTime { fs: 0, delta: 1 });

            if matches!(result, ExecResult::Finish) {
                self.finished = true;
                break;
            }
        }
        Ok(())
    }

    /// Merges pending updates by target signal and schedules one event per signal.
    ///
    /// Multiple bit-select assignments to the same signal (e.g., `leds[0] = ...; leds[1] = ...;`)
    /// produce separate [`PendingUpdate`] entries. Without merging, each update reads the
    /// current signal value independently, so only the last update's bit survives. This
    /// method accumulates all partial writes into a single merged value per signal.
    fn merge_and_schedule(&mut self, updates: Vec<PendingUpdate>, time: SimTime) {
        // Use a Vec of (SimSignalId, LogicVec) to preserve insertion order
        let mut merged: Vec<(SimSignalId, LogicVec)> = Vec::new();
        let mut index_map: HashMap<SimSignalId, usize> = HashMap::new();

        for update in updates {
            if let Some(&idx) = index_map.get(&update.target) {
                // Merge into existing entry
                let (_, ref mut val) = merged[idx];
                if let Some((high, low)) = update.range {
                    for i in 0..(high - low + 1) {
                        if i < update.value.width() {
                            val.set(low + i, update.value.get(i));
                        }
                    }
                } else {
                    *val = update.value;
                }
            } else {
                // New signal — start from current value and apply update
                let base = if let Some((high, low)) = update.range {
                    let sig = self.signals.get(update.target);
                    let mut merged_val = sig.value.clone();
                    for i in 0..(high - low + 1) {
                        if i < update.value.width() {
                            merged_val.set(low + i, update.value.get(i));
                        }
                    }
                    merged_val
                } else {
                    update.value
                };
                index_map.insert(update.target, merged.len());
                merged.push((update.target, base));
            }
        }

        for (signal, value) in merged {
            self.event_queue.push(Reverse(SimEvent {
                time,
                signal,
                value,
                _strength: DriveStrength::Strong,
            }));
        }
    }

    /// Applies an update immediately (for initial blocks).
    fn apply_update_immediate(&mut self, update: &PendingUpdate) {
        let sig = self.signals.get_mut(update.target);
        if let Some((high, low)) = update.range {
            for i in 0..(high - low + 1) {
                if i < update.value.width() {
                    sig.value.set(low + i, update.value.get(i));
                }
            }
        } else {
            sig.value = update.value.clone();
        }
    }

    /// Returns all signal names and their flat IDs.
    ///
    /// Useful for listing all available signals in interactive mode.
    pub fn all_signals(&self) -> Vec<(SimSignalId, &str, u32)> {
        self.signals
            .iter()
            .map(|(id, s)| (id, s.name.as_str(), s.width))
            .collect()
    }

    /// Returns whether the simulation has pending events in the queue or suspended processes.
    pub fn has_pending_events(&self) -> bool {
        !self.event_queue.is_empty() || !self.suspended_processes.is_empty()
    }

    /// Returns whether the simulation has been terminated by `$finish`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Executes initial processes (exposed for interactive mode).
    ///
    /// Call this once after kernel construction to run all `initial` blocks.
    pub fn initialize(&mut self) -> Result<(), SimError> {
        self.execute_initial_processes()?;
        self.execute_combinational_processes()
    }

    /// Returns collected `$display` output and clears the buffer.
    pub fn take_display_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.display_output)
    }

    /// Returns collected assertion failures and clears the buffer.
    pub fn take_assertion_failures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.assertion_failures)
    }

    /// Runs the simulation until the given target time in femtoseconds.
    ///
    /// Unlike `step_delta()`, this method processes both queued events and
    /// suspended process wakeups (delays), mirroring the main `run_simulation()`
    /// loop. Use this for advancing simulation time in the TUI or interactive
    /// mode where delay-based scheduling must be honored.
    pub fn run_until(&mut self, target_fs: u64) -> Result<StepResult, SimError> {
        let mut deltas_at_current_time = 0u32;

        while !self.finished {
            let next_event_time = self.event_queue.peek().map(|e| e.0.time.fs);
            let next_wakeup_time = self.next_wakeup_time();
            let next_time_fs = match (next_event_time, next_wakeup_time) {
                (Some(e), Some(w)) => Some(e.min(w)),
                (Some(e), None) => Some(e),
                (None, Some(w)) => Some(w),
                (None, None) => None,
            };

            let next_time_fs = match next_time_fs {
                Some(t) => t,
                None => return Ok(StepResult::Done),
            };

            if next_time_fs > target_fs {
                // Nothing left to do before target time — advance time
                self.current_time = SimTime {
                    fs: target_fs,
                    delta: 0,
                };
                return Ok(StepResult::Continued);
            }

            // Reset delta counter on time change
            if next_time_fs != self.current_time.fs {
                deltas_at_current_time = 0;
            }

            // Process suspended wakeups at this time (before events)
            self.process_wakeups(next_time_fs)?;

            // Process signal events at this time
            if self
                .event_queue
                .peek()
                .is_some_and(|e| e.0.time.fs <= next_time_fs)
            {
                let result = self.step_delta()?;
                deltas_at_current_time += 1;

                if deltas_at_current_time >= self.max_delta_per_step {
                    return Err(SimError::DeltaCycleLimit {
                        fs: self.current_time.fs,
                        max_deltas: self.max_delta_per_step,
                    });
                }

                if result == StepResult::Done && !self.has_pending_events() {
                    return Ok(StepResult::Done);
                }
            }
        }

        Ok(StepResult::Done)
    }

    /// Returns the earliest time at which a pending event or wakeup is scheduled.
    ///
    /// Returns `None` if no events or wakeups are pending.
    pub fn next_event_time_fs(&self) -> Option<u64> {
        let next_event = self.event_queue.peek().map(|e| e.0.time.fs);
        let next_wakeup = self.next_wakeup_time();
        match (next_event, next_wakeup) {
            (Some(e), Some(w)) => Some(e.min(w)),
            (Some(e), None) => Some(e),
            (None, Some(w)) => Some(w),
            (None, None) => None,
        }
    }

    /// Schedules an event at a future time.
    pub fn schedule_event(&mut self, time: SimTime, signal: SimSignalId, value: LogicVec) {
        self.event_queue.push(Reverse(SimEvent {
            time,
            signal,
            value,
            _strength: DriveStrength::Strong,
        }));
    }
}

/// Checks if a signal has experienced the specified edge.
fn check_edge(prev: &LogicVec, curr: &LogicVec, edge: Edge) -> bool {
    if prev.width() == 0 || curr.width() == 0 {
        return false;
    }
    let prev_bit = prev.get(0);
    let curr_bit = curr.get(0);
    match edge {
        Edge::Posedge => prev_bit == Logic::Zero && curr_bit == Logic::One,
        Edge::Negedge => prev_bit == Logic::One && curr_bit == Logic::Zero,
        Edge::Both => {
            (prev_bit == Logic::Zero && curr_bit == Logic::One)
                || (prev_bit == Logic::One && curr_bit == Logic::Zero)
        }
    }
}

/// Resolves a SignalRef to a single SimSignalId (only for simple Signal refs).
fn resolve_signal_ref_to_sim_id(
    signal_ref: &SignalRef,
    signal_map: &HashMap<SignalId, SimSignalId>,
) -> Option<SimSignalId> {
    match signal_ref {
        SignalRef::Signal(sig_id) => signal_map.get(sig_id).copied(),
        SignalRef::Slice { signal, .. } => signal_map.get(signal).copied(),
        _ => None,
    }
}

/// Collects all SimSignalIds read by an expression.
fn collect_expr_read_signals(
    expr: &Expr,
    signal_map: &HashMap<SignalId, SimSignalId>,
) -> HashSet<SimSignalId> {
    let mut result = HashSet::new();
    collect_expr_reads_inner(expr, signal_map, &mut result);
    result
}

/// Recursively collects signal reads from expressions.
fn collect_expr_reads_inner(
    expr: &Expr,
    signal_map: &HashMap<SignalId, SimSignalId>,
    result: &mut HashSet<SimSignalId>,
) {
    match expr {
        Expr::Signal(sr) => collect_signal_ref_reads(sr, signal_map, result),
        Expr::Literal(_) => {}
        Expr::Unary { operand, .. } => collect_expr_reads_inner(operand, signal_map, result),
        Expr::Binary { lhs, rhs, .. } => {
            collect_expr_reads_inner(lhs, signal_map, result);
            collect_expr_reads_inner(rhs, signal_map, result);
        }
        Expr::Ternary {
            condition,
            true_val,
            false_val,
            ..
        } => {
            collect_expr_reads_inner(condition, signal_map, result);
            collect_expr_reads_inner(true_val, signal_map, result);
            collect_expr_reads_inner(false_val, signal_map, result);
        }
        Expr::FuncCall { args, .. } => {
            for arg in args {
                collect_expr_reads_inner(arg, signal_map, result);
            }
        }
        Expr::Concat(parts) => {
            for p in parts {
                collect_expr_reads_inner(p, signal_map, result);
            }
        }
        Expr::Repeat { expr, .. } => collect_expr_reads_inner(expr, signal_map, result),
        Expr::Index { expr, index, .. } => {
            collect_expr_reads_inner(expr, signal_map, result);
            collect_expr_reads_inner(index, signal_map, result);
        }
        Expr::Slice {
            expr, high, low, ..
        } => {
            collect_expr_reads_inner(expr, signal_map, result);
            collect_expr_reads_inner(high, signal_map, result);
            collect_expr_reads_inner(low, signal_map, result);
        }
    }
}

/// Collects signal reads from a SignalRef.
fn collect_signal_ref_reads(
    sr: &SignalRef,
    signal_map: &HashMap<SignalId, SimSignalId>,
    result: &mut HashSet<SimSignalId>,
) {
    match sr {
        SignalRef::Signal(id) => {
            if let Some(&sim_id) = signal_map.get(id) {
                result.insert(sim_id);
            }
        }
        SignalRef::Slice { signal, .. } => {
            if let Some(&sim_id) = signal_map.get(signal) {
                result.insert(sim_id);
            }
        }
        SignalRef::Concat(refs) => {
            for r in refs {
                collect_signal_ref_reads(r, signal_map, result);
            }
        }
        SignalRef::Const(_) => {}
    }
}

/// Collects all SimSignalIds read by a statement tree.
fn collect_stmt_read_signals(
    stmt: &Statement,
    signal_map: &HashMap<SignalId, SimSignalId>,
) -> HashSet<SimSignalId> {
    let mut result = HashSet::new();
    collect_stmt_reads_inner(stmt, signal_map, &mut result);
    result
}

/// Recursively collects signal reads from statements.
fn collect_stmt_reads_inner(
    stmt: &Statement,
    signal_map: &HashMap<SignalId, SimSignalId>,
    result: &mut HashSet<SimSignalId>,
) {
    match stmt {
        Statement::Assign { value, .. } => {
            collect_expr_reads_inner(value, signal_map, result);
        }
        Statement::If {
            condition,
            then_body,
            else_body,
            ..
        } => {
            collect_expr_reads_inner(condition, signal_map, result);
            collect_stmt_reads_inner(then_body, signal_map, result);
            if let Some(eb) = else_body {
                collect_stmt_reads_inner(eb, signal_map, result);
            }
        }
        Statement::Case {
            subject,
            arms,
            default,
            ..
        } => {
            collect_expr_reads_inner(subject, signal_map, result);
            for arm in arms {
                for pat in &arm.patterns {
                    collect_expr_reads_inner(pat, signal_map, result);
                }
                collect_stmt_reads_inner(&arm.body, signal_map, result);
            }
            if let Some(def) = default {
                collect_stmt_reads_inner(def, signal_map, result);
            }
        }
        Statement::Block { stmts, .. } => {
            for s in stmts {
                collect_stmt_reads_inner(s, signal_map, result);
            }
        }
        Statement::Assertion { condition, .. } => {
            collect_expr_reads_inner(condition, signal_map, result);
        }
        Statement::Display { args, .. } => {
            for arg in args {
                collect_expr_reads_inner(arg, signal_map, result);
            }
        }
        Statement::Wait { duration, .. } => {
            if let Some(dur) = duration {
                collect_expr_reads_inner(dur, signal_map, result);
            }
        }
        Statement::Delay { body, .. } | Statement::Forever { body, .. } => {
            collect_stmt_reads_inner(body, signal_map, result);
        }
        Statement::Finish { .. } | Statement::Nop => {}
    }
}

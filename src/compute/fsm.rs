//! Deterministic finite state machine and simulation.
//!
//! [`Fsm`] is immutable once built and carries no simulation cursor, so a
//! single machine can be shared by every evaluation worker. Simulation
//! threads the current state explicitly through [`Fsm::trigger`] and
//! [`Fsm::trigger_sequence`]; [`Simulator`] wraps a cursor for
//! single-threaded use.

use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::Rng;

use crate::schema::{
    ConfigError, DigraphShape, FsmDefaults, FsmSpec, FsmSpecError, InputId, OutputId, StateId,
    TransitionId, TransitionSpec,
};

/// A machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub id: StateId,
    pub label: Option<String>,
    /// Indices into [`Fsm::transitions`], in declaration order.
    pub outgoing: Vec<usize>,
    /// Indices into [`Fsm::transitions`], in declaration order.
    pub incoming: Vec<usize>,
}

/// A labelled transition between two states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub id: TransitionId,
    pub start: StateId,
    pub end: StateId,
    pub input: InputId,
    pub output: OutputId,
    pub label: Option<String>,
}

/// Result of firing one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    pub next: StateId,
    pub output: OutputId,
}

/// No outgoing transition exists for `input` in `state`.
///
/// This is an ordinary simulation outcome on incomplete machines, not a
/// failure of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("state {state} has no transition on input {input}")]
pub struct UndefinedTransition {
    pub state: StateId,
    pub input: InputId,
}

/// Outputs produced by applying an input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Trace {
    pub outputs: Vec<OutputId>,
    /// Position of the input that hit an undefined transition.
    pub undefined_at: Option<usize>,
}

impl Trace {
    /// True when every input was accepted.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.undefined_at.is_none()
    }

    /// Two traces are indistinguishable only when both are complete and
    /// carry the same outputs.
    pub fn indistinguishable_from(&self, other: &Trace) -> bool {
        self.is_complete() && other.is_complete() && self.outputs == other.outputs
    }
}

/// Immutable deterministic finite state machine.
#[derive(Debug, Clone)]
pub struct Fsm {
    states: Vec<State>,
    transitions: Vec<Transition>,
    input_set: Vec<String>,
    output_set: Vec<String>,
    initial_state: StateId,
    /// `(state * |inputs| + input) -> step`.
    table: Vec<Option<Step>>,
}

impl Fsm {
    /// Build a machine from a parsed specification.
    ///
    /// Alphabets are deduplicated keeping first occurrences. Every
    /// transition must reference existing states and symbols, and no state
    /// may have two transitions on the same input.
    pub fn from_spec(spec: &FsmSpec) -> Result<Self, FsmSpecError> {
        let input_set = dedup(&spec.input_set);
        let output_set = dedup(&spec.output_set);
        if input_set.is_empty() {
            return Err(FsmSpecError::EmptyAlphabet("input"));
        }
        if output_set.is_empty() {
            return Err(FsmSpecError::EmptyAlphabet("output"));
        }

        let input_ids: HashMap<&str, InputId> = input_set
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let output_ids: HashMap<&str, OutputId> = output_set
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let mut seen = HashSet::new();
        let mut transitions = Vec::with_capacity(spec.transitions.len());
        for tr in &spec.transitions {
            if !seen.insert(tr.id) {
                return Err(FsmSpecError::DuplicateTransition(tr.id));
            }
            for state in [tr.start, tr.end] {
                if state >= spec.num_states {
                    return Err(FsmSpecError::StateOutOfRange {
                        transition: tr.id,
                        state,
                        num_states: spec.num_states,
                    });
                }
            }
            let input = *input_ids.get(tr.input.as_str()).ok_or_else(|| {
                FsmSpecError::UnknownSymbol {
                    transition: tr.id,
                    symbol: tr.input.clone(),
                    alphabet: "input",
                }
            })?;
            let output = *output_ids.get(tr.output.as_str()).ok_or_else(|| {
                FsmSpecError::UnknownSymbol {
                    transition: tr.id,
                    symbol: tr.output.clone(),
                    alphabet: "output",
                }
            })?;

            transitions.push(Transition {
                id: tr.id,
                start: tr.start,
                end: tr.end,
                input,
                output,
                label: tr.label.clone(),
            });
        }

        let labels = (0..spec.num_states)
            .map(|i| spec.state_tokens.get(i).filter(|t| !t.is_empty()).cloned())
            .collect();

        Self::assemble(labels, input_set, output_set, transitions)
    }

    /// Generate a random machine.
    ///
    /// The symmetric shape gives every state exactly one transition per
    /// input. Targets are drawn from a pool of states whose in-degree is
    /// still below the input alphabet size, and saturated states leave the
    /// pool, so total demand always matches the remaining capacity. The
    /// result is complete and deterministic but not necessarily minimal or
    /// strongly connected.
    pub fn random<R: Rng>(defaults: &FsmDefaults, rng: &mut R) -> Result<Self, ConfigError> {
        defaults.validate()?;

        let input_set = dedup(&defaults.input_set);
        let output_set = dedup(&defaults.output_set);
        let num_states = defaults.number_of_states;
        let k = input_set.len();

        let transitions = match defaults.digraph_shape_selection {
            DigraphShape::Symmetric => {
                let mut in_degree = vec![0usize; num_states];
                let mut pool: Vec<StateId> = (0..num_states).collect();
                let mut transitions = Vec::with_capacity(num_states * k);

                for start in 0..num_states {
                    for input in 0..k {
                        let slot = rng.gen_range(0..pool.len());
                        let end = pool[slot];
                        in_degree[end] += 1;
                        if in_degree[end] == k {
                            pool.swap_remove(slot);
                        }

                        transitions.push(Transition {
                            id: transitions.len(),
                            start,
                            end,
                            input,
                            output: rng.gen_range(0..output_set.len()),
                            label: None,
                        });
                    }
                }
                transitions
            }
        };

        Ok(Self::assemble(
            vec![None; num_states],
            input_set,
            output_set,
            transitions,
        )?)
    }

    fn assemble(
        labels: Vec<Option<String>>,
        input_set: Vec<String>,
        output_set: Vec<String>,
        transitions: Vec<Transition>,
    ) -> Result<Self, FsmSpecError> {
        let num_states = labels.len();
        if num_states == 0 {
            return Err(FsmSpecError::InvalidInitialState {
                state: 0,
                num_states,
            });
        }
        let k = input_set.len();

        let mut states: Vec<State> = labels
            .into_iter()
            .enumerate()
            .map(|(id, label)| State {
                id,
                label,
                outgoing: Vec::new(),
                incoming: Vec::new(),
            })
            .collect();
        let mut table = vec![None; num_states * k];

        for (index, tr) in transitions.iter().enumerate() {
            let slot = &mut table[tr.start * k + tr.input];
            if slot.is_some() {
                return Err(FsmSpecError::NonDeterministic {
                    state: tr.start,
                    input: input_set[tr.input].clone(),
                });
            }
            *slot = Some(Step {
                next: tr.end,
                output: tr.output,
            });
            states[tr.start].outgoing.push(index);
            states[tr.end].incoming.push(index);
        }

        Ok(Self {
            states,
            transitions,
            input_set,
            output_set,
            initial_state: 0,
            table,
        })
    }

    /// Use `state` as the initial state instead of state 0.
    pub fn with_initial_state(mut self, state: StateId) -> Result<Self, FsmSpecError> {
        if state >= self.states.len() {
            return Err(FsmSpecError::InvalidInitialState {
                state,
                num_states: self.states.len(),
            });
        }
        self.initial_state = state;
        Ok(self)
    }

    /// Fire the transition leaving `state` on `input`.
    #[inline]
    pub fn trigger(&self, state: StateId, input: InputId) -> Result<Step, UndefinedTransition> {
        let k = self.input_set.len();
        if state < self.states.len()
            && input < k
            && let Some(step) = self.table[state * k + input]
        {
            return Ok(step);
        }
        Err(UndefinedTransition { state, input })
    }

    /// Apply `inputs` one at a time starting in `state`.
    ///
    /// Stops at the first undefined transition and returns the outputs
    /// produced so far.
    pub fn trigger_sequence(&self, state: StateId, inputs: &[InputId]) -> Trace {
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut current = state;
        for (pos, &input) in inputs.iter().enumerate() {
            match self.trigger(current, input) {
                Ok(step) => {
                    outputs.push(step.output);
                    current = step.next;
                }
                Err(_) => {
                    return Trace {
                        outputs,
                        undefined_at: Some(pos),
                    };
                }
            }
        }
        Trace {
            outputs,
            undefined_at: None,
        }
    }

    #[inline]
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    #[inline]
    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Transition by its specification id.
    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.iter().find(|tr| tr.id == id)
    }

    pub fn input_set(&self) -> &[String] {
        &self.input_set
    }

    pub fn output_set(&self) -> &[String] {
        &self.output_set
    }

    pub fn in_degree(&self, state: StateId) -> usize {
        self.states.get(state).map_or(0, |s| s.incoming.len())
    }

    pub fn out_degree(&self, state: StateId) -> usize {
        self.states.get(state).map_or(0, |s| s.outgoing.len())
    }

    /// Every state has a transition for every input.
    pub fn is_complete(&self) -> bool {
        self.table.iter().all(Option::is_some)
    }

    /// Look up an input symbol by name.
    pub fn input_id(&self, symbol: &str) -> Option<InputId> {
        self.input_set.iter().position(|s| s == symbol)
    }

    /// Look up an output symbol by name.
    pub fn output_id(&self, symbol: &str) -> Option<OutputId> {
        self.output_set.iter().position(|s| s == symbol)
    }

    /// Translate symbol names into input ids.
    pub fn parse_inputs(&self, symbols: &[&str]) -> Option<Vec<InputId>> {
        symbols.iter().map(|s| self.input_id(s)).collect()
    }

    /// Input ids back to symbol names. Unknown ids render as `?`.
    pub fn render_inputs(&self, inputs: &[InputId]) -> Vec<String> {
        inputs
            .iter()
            .map(|&i| self.input_set.get(i).cloned().unwrap_or_else(|| "?".into()))
            .collect()
    }

    /// Compact rendering of an input sequence, e.g. `aab`.
    ///
    /// Symbols are comma separated when any of them is longer than one
    /// character.
    pub fn render_sequence(&self, inputs: &[InputId]) -> String {
        let symbols = self.render_inputs(inputs);
        if self.input_set.iter().all(|s| s.chars().count() == 1) {
            symbols.concat()
        } else {
            symbols.join(",")
        }
    }

    /// Render the machine back into its text specification.
    pub fn to_spec(&self) -> FsmSpec {
        let state_tokens = if self.states.iter().any(|s| s.label.is_some()) {
            self.states
                .iter()
                .map(|s| s.label.clone().unwrap_or_default())
                .collect()
        } else {
            Vec::new()
        };

        FsmSpec {
            num_states: self.states.len(),
            state_tokens,
            input_set: self.input_set.clone(),
            output_set: self.output_set.clone(),
            transitions: self
                .transitions
                .iter()
                .map(|tr| TransitionSpec {
                    id: tr.id,
                    start: tr.start,
                    end: tr.end,
                    input: self.input_set[tr.input].clone(),
                    output: self.output_set[tr.output].clone(),
                    label: tr.label.clone(),
                })
                .collect(),
        }
    }
}

fn dedup(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

impl fmt::Display for Fsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of States:      {}", self.num_states())?;
        writeln!(f, "Number of Transitions: {}", self.num_transitions())?;
        writeln!(f, "Input Size:            {}", self.input_set.len())?;
        writeln!(f, "Output Size:           {}", self.output_set.len())?;
        write!(f, "Initial State ID:      {}", self.initial_state)
    }
}

/// Cursor position of a [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    At(StateId),
    /// Stuck after an undefined transition until the next reset.
    Halted(UndefinedTransition),
}

/// Single-threaded simulation with its own cursor.
#[derive(Debug, Clone)]
pub struct Simulator<'a> {
    fsm: &'a Fsm,
    cursor: Cursor,
}

impl<'a> Simulator<'a> {
    /// Start in the machine's initial state.
    pub fn new(fsm: &'a Fsm) -> Self {
        Self {
            fsm,
            cursor: Cursor::At(fsm.initial_state()),
        }
    }

    /// Start in an arbitrary state.
    pub fn starting_at(fsm: &'a Fsm, state: StateId) -> Self {
        Self {
            fsm,
            cursor: Cursor::At(state),
        }
    }

    /// Return to the initial state (which may not be state 0).
    pub fn reset(&mut self) {
        self.cursor = Cursor::At(self.fsm.initial_state());
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Current state, `None` once halted.
    pub fn current(&self) -> Option<StateId> {
        match self.cursor {
            Cursor::At(state) => Some(state),
            Cursor::Halted(_) => None,
        }
    }

    /// Fire one input.
    pub fn step(&mut self, input: InputId) -> Result<OutputId, UndefinedTransition> {
        let state = match self.cursor {
            Cursor::At(state) => state,
            Cursor::Halted(err) => return Err(err),
        };
        match self.fsm.trigger(state, input) {
            Ok(step) => {
                self.cursor = Cursor::At(step.next);
                Ok(step.output)
            }
            Err(err) => {
                self.cursor = Cursor::Halted(err);
                Err(err)
            }
        }
    }

    /// Fire a sequence of inputs, stopping at the first undefined one.
    pub fn run(&mut self, inputs: &[InputId]) -> Trace {
        let mut outputs = Vec::with_capacity(inputs.len());
        for (pos, &input) in inputs.iter().enumerate() {
            match self.step(input) {
                Ok(output) => outputs.push(output),
                Err(_) => {
                    return Trace {
                        outputs,
                        undefined_at: Some(pos),
                    };
                }
            }
        }
        Trace {
            outputs,
            undefined_at: None,
        }
    }
}

/// Three-state machine used across the test suites.
///
/// Transitions `(id, start, end, input, output)`:
/// `(0,0,1,a,x) (1,0,2,b,y) (2,1,0,a,y) (3,1,2,b,x) (4,2,0,a,x) (5,2,1,b,y)`.
#[cfg(test)]
pub(crate) fn three_state_machine() -> Fsm {
    let text = "\
states: 3
input_set: a,b
output_set: x,y
0: 0:1:a:x
1: 0:2:b:y
2: 1:0:a:y
3: 1:2:b:x
4: 2:0:a:x
5: 2:1:b:y
";
    Fsm::from_spec(&FsmSpec::parse(text).unwrap()).unwrap()
}

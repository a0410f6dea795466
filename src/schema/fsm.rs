//! Text specification format for finite state machines.
//!
//! The format is line oriented and colon separated:
//!
//! ```text
//! states: 3 : s0|s1|s2
//! input_set: a,b
//! output_set: x,y
//!
//! 0: 0:1:a:x
//! 1: 0:2:b:y:reset
//! ```
//!
//! The token list on the `states` line and the trailing transition label
//! are optional. Blank lines are ignored.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Dense state index (`0..N`).
pub type StateId = usize;
/// Index into the input alphabet.
pub type InputId = usize;
/// Index into the output alphabet.
pub type OutputId = usize;
/// Transition identifier as written in the specification.
pub type TransitionId = usize;

/// Field separator of the text format.
pub const SEPARATOR: char = ':';

/// Parsed (but not yet validated) FSM specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmSpec {
    /// Number of states.
    pub num_states: usize,
    /// Optional state tokens; may be shorter than `num_states`.
    #[serde(default)]
    pub state_tokens: Vec<String>,
    /// Input alphabet in declaration order.
    pub input_set: Vec<String>,
    /// Output alphabet in declaration order.
    pub output_set: Vec<String>,
    /// Transitions in file order.
    pub transitions: Vec<TransitionSpec>,
}

/// A single transition line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub id: TransitionId,
    pub start: StateId,
    pub end: StateId,
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Errors raised while reading or validating an FSM specification.
///
/// Construction is all-or-nothing: any of these aborts the build and no
/// partial machine is produced.
#[derive(Debug, thiserror::Error)]
pub enum FsmSpecError {
    #[error("line {line}: unknown section keyword '{keyword}'")]
    UnknownSection { line: usize, keyword: String },
    #[error("line {line}: invalid number '{value}'")]
    InvalidNumber { line: usize, value: String },
    #[error("line {line}: '{keyword}' has no value")]
    EmptySection { line: usize, keyword: String },
    #[error("line {line}: transition needs 5 or 6 fields, found {fields}")]
    MalformedTransition { line: usize, fields: usize },
    #[error("missing '{0}' section")]
    MissingHeader(&'static str),
    #[error("{0} set is empty")]
    EmptyAlphabet(&'static str),
    #[error("duplicate transition id {0}")]
    DuplicateTransition(TransitionId),
    #[error("transition {transition} references state {state}, but the machine has {num_states} states")]
    StateOutOfRange {
        transition: TransitionId,
        state: StateId,
        num_states: usize,
    },
    #[error("transition {transition} uses '{symbol}', which is not in the {alphabet} set")]
    UnknownSymbol {
        transition: TransitionId,
        symbol: String,
        alphabet: &'static str,
    },
    #[error("state {state} has more than one transition on input '{input}'")]
    NonDeterministic { state: StateId, input: String },
    #[error("initial state {state} is out of range for {num_states} states")]
    InvalidInitialState { state: StateId, num_states: usize },
    #[error("I/O error reading FSM specification: {0}")]
    Io(#[from] std::io::Error),
}

impl FsmSpec {
    /// Read and parse a specification file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FsmSpecError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse specification text.
    pub fn parse(text: &str) -> Result<Self, FsmSpecError> {
        let mut num_states = None;
        let mut state_tokens = Vec::new();
        let mut input_set = None;
        let mut output_set = None;
        let mut transitions = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            let items: Vec<&str> = raw.split(SEPARATOR).map(str::trim).collect();
            let keyword = items[0].to_ascii_lowercase();

            match keyword.as_str() {
                "states" => {
                    let count = items
                        .get(1)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| FsmSpecError::EmptySection {
                            line,
                            keyword: keyword.clone(),
                        })?;
                    num_states = Some(parse_number(count, line)?);
                    state_tokens = match items.get(2) {
                        Some(tokens) if !tokens.is_empty() => {
                            tokens.split('|').map(|t| t.trim().to_string()).collect()
                        }
                        _ => Vec::new(),
                    };
                }
                "input_set" | "output_set" => {
                    let symbols = parse_symbols(items.get(1).copied().unwrap_or(""));
                    if symbols.is_empty() {
                        return Err(FsmSpecError::EmptySection { line, keyword });
                    }
                    if keyword == "input_set" {
                        input_set = Some(symbols);
                    } else {
                        output_set = Some(symbols);
                    }
                }
                _ => transitions.push(parse_transition(&items, line)?),
            }
        }

        Ok(Self {
            num_states: num_states.ok_or(FsmSpecError::MissingHeader("states"))?,
            state_tokens,
            input_set: input_set.ok_or(FsmSpecError::MissingHeader("input_set"))?,
            output_set: output_set.ok_or(FsmSpecError::MissingHeader("output_set"))?,
            transitions,
        })
    }

    /// Write the rendered specification to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        fs::write(path, self.to_string())
    }
}

/// Whether `symbol` survives a render and parse of the text format.
///
/// Symbols must be non-empty, carry no surrounding whitespace and contain
/// neither list commas, field separators nor line breaks.
pub fn is_representable_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.trim() == symbol
        && !symbol.contains([',', SEPARATOR, '\n', '\r'])
}

fn parse_number(value: &str, line: usize) -> Result<usize, FsmSpecError> {
    value.parse().map_err(|_| FsmSpecError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

fn parse_symbols(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_transition(items: &[&str], line: usize) -> Result<TransitionSpec, FsmSpecError> {
    let head = items[0];
    if !head.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(FsmSpecError::UnknownSection {
            line,
            keyword: head.to_string(),
        });
    }
    if items.len() < 5 || items.len() > 6 {
        return Err(FsmSpecError::MalformedTransition {
            line,
            fields: items.len(),
        });
    }

    let label = items
        .get(5)
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string());

    Ok(TransitionSpec {
        id: parse_number(head, line)?,
        start: parse_number(items[1], line)?,
        end: parse_number(items[2], line)?,
        input: items[3].to_string(),
        output: items[4].to_string(),
        label,
    })
}

impl fmt::Display for FsmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.state_tokens.iter().any(|t| !t.is_empty()) {
            writeln!(
                f,
                "states{SEPARATOR} {} {SEPARATOR} {}",
                self.num_states,
                self.state_tokens.join("|")
            )?;
        } else {
            writeln!(f, "states{SEPARATOR} {}", self.num_states)?;
        }
        writeln!(f, "input_set{SEPARATOR} {}", self.input_set.join(","))?;
        writeln!(f, "output_set{SEPARATOR} {}", self.output_set.join(","))?;
        writeln!(f)?;

        for tr in &self.transitions {
            let id = format!("{}{SEPARATOR}", tr.id);
            write!(
                f,
                "{id:<6} {}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
                tr.start, tr.end, tr.input, tr.output
            )?;
            if let Some(label) = &tr.label {
                write!(f, "{SEPARATOR}{label}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

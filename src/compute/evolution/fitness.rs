//! Fitness evaluation for candidate UIOs.
//!
//! The fitness of a genome combines four weighted terms:
//!
//! - discovery: still-open target states it distinguishes
//! - uio: fraction of all states with a unique trace
//! - brevity: inverse genome length
//! - breadth: fraction of distinct output observations
//!
//! Evaluation never mutates the machine or the registry, so any number of
//! candidates may be evaluated concurrently against one snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use super::{DistinguishingProfile, RegistrySnapshot, SplittingTree};
use crate::compute::Fsm;
use crate::schema::{CandidateShape, FitnessConfig, Genome, InputId, StateId};

/// Scores of one candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Combined fitness score.
    pub fitness: f32,
    /// Number of states the candidate distinguishes.
    pub number_of_uios: usize,
    /// UIO per distinguished state.
    pub uios: BTreeMap<StateId, Vec<InputId>>,
    /// Distinguished states that were open in the snapshot.
    pub new_discoveries: BTreeSet<StateId>,
    /// Number of distinct output observations.
    pub observation_classes: usize,
}

/// Errors raised while evaluating a generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Genome is empty")]
    EmptyGenome,
    #[error("Input {input} at position {position} is outside the input alphabet of size {alphabet}")]
    InvalidSymbol {
        position: usize,
        input: InputId,
        alphabet: usize,
    },
    #[error("Worker evaluating candidates {range:?} failed: {message}")]
    WorkerFailure { range: Range<usize>, message: String },
}

/// Evaluates candidates and returns fitness scores.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
    shape: CandidateShape,
    max_depth: usize,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator.
    ///
    /// `max_depth` bounds adaptive splitting trees and is ignored for flat
    /// candidates.
    pub fn new(config: FitnessConfig, shape: CandidateShape, max_depth: usize) -> Self {
        Self {
            config,
            shape,
            max_depth,
        }
    }

    pub fn shape(&self) -> CandidateShape {
        self.shape
    }

    /// Evaluate a genome against the open targets in `snapshot`.
    pub fn evaluate(
        &self,
        fsm: &Fsm,
        genome: &Genome,
        snapshot: &RegistrySnapshot,
    ) -> Result<Evaluation, EvaluationError> {
        if genome.is_empty() {
            return Err(EvaluationError::EmptyGenome);
        }
        let alphabet = fsm.input_set().len();
        if let Some((position, &input)) = genome
            .as_slice()
            .iter()
            .enumerate()
            .find(|(_, i)| **i >= alphabet)
        {
            return Err(EvaluationError::InvalidSymbol {
                position,
                input,
                alphabet,
            });
        }

        let distinction = match self.shape {
            CandidateShape::Flat => {
                DistinguishingProfile::compute(fsm, genome.as_slice()).into_distinction()
            }
            CandidateShape::Adaptive => {
                SplittingTree::build(fsm, genome.as_slice(), self.max_depth).into_distinction()
            }
        };

        let new_discoveries: BTreeSet<StateId> = distinction
            .uios
            .keys()
            .copied()
            .filter(|&s| snapshot.is_open(s))
            .collect();

        let n = fsm.num_states() as f32;
        let fitness = self.config.discovery_weight * new_discoveries.len() as f32
            + self.config.uio_weight * distinction.number_of_uios() as f32 / n
            + self.config.brevity_weight / genome.len() as f32
            + self.config.breadth_weight * distinction.observation_classes as f32 / n;

        Ok(Evaluation {
            fitness,
            number_of_uios: distinction.number_of_uios(),
            uios: distinction.uios,
            new_discoveries,
            observation_classes: distinction.observation_classes,
        })
    }
}

//! Run report export.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::UioStatistics;
use crate::compute::Fsm;
use crate::schema::{
    DiscoveredUio, EvolutionConfig, EvolutionResult, EvolutionStats, GenerationRecord, StateId,
};

/// Everything worth keeping from a run, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub fsm: FsmSummary,
    pub parameters: EvolutionConfig,
    pub discovered: Vec<DiscoveredUio>,
    pub open_states: Vec<StateId>,
    pub stats: EvolutionStats,
    /// Present when statistics are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<WindowedStatistics>,
}

/// Shape of the machine under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmSummary {
    pub states: usize,
    pub transitions: usize,
    pub input_set: Vec<String>,
    pub output_set: Vec<String>,
    pub initial_state: StateId,
    pub complete: bool,
}

impl From<&Fsm> for FsmSummary {
    fn from(fsm: &Fsm) -> Self {
        Self {
            states: fsm.num_states(),
            transitions: fsm.num_transitions(),
            input_set: fsm.input_set().to_vec(),
            output_set: fsm.output_set().to_vec(),
            initial_state: fsm.initial_state(),
            complete: fsm.is_complete(),
        }
    }
}

/// Generation records in the statistics window and their composites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowedStatistics {
    /// Half-open generation range `[from, to)`.
    pub window: (usize, usize),
    pub generations: Vec<GenerationRecord>,
    pub average_uio_distribution: BTreeMap<usize, f64>,
    pub average_uio_frequency: BTreeMap<String, usize>,
}

impl From<&UioStatistics> for WindowedStatistics {
    fn from(statistics: &UioStatistics) -> Self {
        let window = statistics.window();
        Self {
            window: (window.start, window.end),
            generations: statistics.windowed().to_vec(),
            average_uio_distribution: statistics.average_uio_distribution(),
            average_uio_frequency: statistics.average_uio_frequency(),
        }
    }
}

impl RunReport {
    pub fn new(
        fsm: &Fsm,
        parameters: &EvolutionConfig,
        result: &EvolutionResult,
        statistics: &UioStatistics,
    ) -> Self {
        Self {
            fsm: FsmSummary::from(fsm),
            parameters: parameters.clone(),
            discovered: result.discovered.clone(),
            open_states: result.open_states.clone(),
            stats: result.stats.clone(),
            statistics: parameters
                .statistics_enabled
                .then(|| WindowedStatistics::from(statistics)),
        }
    }

    /// Write the report as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Read a report written by [`RunReport::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

//! Per-generation statistics and windowed composites.

use std::collections::BTreeMap;
use std::ops::Range;

use super::{DiscoveryRegistry, Evaluation, genome_distance};
use crate::compute::Fsm;
use crate::schema::{GenerationRecord, Genome};

/// Summarize one evaluated generation.
///
/// `registry` must already contain this generation's merge.
pub fn summarize(
    generation: usize,
    fsm: &Fsm,
    genomes: &[Genome],
    evaluations: &[Evaluation],
    registry: &DiscoveryRegistry,
) -> GenerationRecord {
    let fitness: Vec<f32> = evaluations.iter().map(|e| e.fitness).collect();
    let n = fitness.len();

    let (fitness_max, fitness_min, fitness_mean, fitness_stdev) = if n == 0 {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let max = fitness.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min = fitness.iter().copied().fold(f32::INFINITY, f32::min);
        let mean = fitness.iter().sum::<f32>() / n as f32;
        let stdev = if n < 2 {
            0.0
        } else {
            let ss: f32 = fitness.iter().map(|f| (f - mean).powi(2)).sum();
            (ss / (n - 1) as f32).sqrt()
        };
        (max, min, mean, stdev)
    };

    let mut uio_distribution = BTreeMap::new();
    let mut uio_frequencies = BTreeMap::new();
    for evaluation in evaluations {
        *uio_distribution.entry(evaluation.number_of_uios).or_insert(0) += 1;
        for uio in evaluation.uios.values() {
            *uio_frequencies
                .entry(fsm.render_sequence(uio))
                .or_insert(0) += 1;
        }
    }

    GenerationRecord {
        generation,
        fitness_max,
        fitness_min,
        fitness_mean,
        fitness_stdev,
        diversity: diversity(genomes),
        uio_distribution,
        uio_frequencies,
        discovered: registry.discovered_count(),
        open: registry.open_count(),
    }
}

/// Mean pairwise edit distance.
pub fn diversity(genomes: &[Genome]) -> f32 {
    if genomes.len() < 2 {
        return 0.0;
    }

    let mut total_distance = 0usize;
    let mut count = 0usize;
    for i in 0..genomes.len() {
        for j in (i + 1)..genomes.len() {
            total_distance += genome_distance(&genomes[i], &genomes[j]);
            count += 1;
        }
    }
    total_distance as f32 / count as f32
}

/// Generation records of a run, indexed by generation.
#[derive(Debug, Clone, Default)]
pub struct UioStatistics {
    records: Vec<GenerationRecord>,
    window: Range<usize>,
}

impl UioStatistics {
    /// Create with the generation window used for composites.
    pub fn new(window: Range<usize>) -> Self {
        Self {
            records: Vec::new(),
            window,
        }
    }

    /// Append the record of the next generation.
    pub fn record(&mut self, record: GenerationRecord) {
        debug_assert_eq!(record.generation, self.records.len());
        self.records.push(record);
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn get(&self, generation: usize) -> Option<&GenerationRecord> {
        self.records.get(generation)
    }

    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    /// Recorded generations inside the window.
    pub fn windowed(&self) -> &[GenerationRecord] {
        let end = self.window.end.min(self.records.len());
        let start = self.window.start.min(end);
        &self.records[start..end]
    }

    /// Candidates per `number_of_uios`, averaged over the window.
    pub fn average_uio_distribution(&self) -> BTreeMap<usize, f64> {
        let records = self.windowed();
        let mut totals: BTreeMap<usize, usize> = BTreeMap::new();
        for record in records {
            for (&uios, &count) in &record.uio_distribution {
                *totals.entry(uios).or_insert(0) += count;
            }
        }
        totals
            .into_iter()
            .map(|(uios, total)| (uios, total as f64 / records.len() as f64))
            .collect()
    }

    /// Occurrences per rendered UIO, averaged over the window and rounded.
    pub fn average_uio_frequency(&self) -> BTreeMap<String, usize> {
        let records = self.windowed();
        let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
        for record in records {
            for (uio, &count) in &record.uio_frequencies {
                *totals.entry(uio.as_str()).or_insert(0) += count;
            }
        }
        totals
            .into_iter()
            .map(|(uio, total)| {
                let average = (total as f64 / records.len() as f64).round() as usize;
                (uio.to_string(), average)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::three_state_machine;

    fn evaluation(fitness: f32, uios: &[(usize, &[usize])]) -> Evaluation {
        Evaluation {
            fitness,
            number_of_uios: uios.len(),
            uios: uios.iter().map(|(s, u)| (*s, u.to_vec())).collect(),
            ..Default::default()
        }
    }

    fn record(
        generation: usize,
        distribution: &[(usize, usize)],
        frequencies: &[(&str, usize)],
    ) -> GenerationRecord {
        GenerationRecord {
            generation,
            uio_distribution: distribution.iter().copied().collect(),
            uio_frequencies: frequencies
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize() {
        let fsm = three_state_machine();
        let mut registry = DiscoveryRegistry::new([0, 1]);
        let evaluations = vec![
            evaluation(2.0, &[(1, &[0])]),
            evaluation(4.0, &[(0, &[0, 1]), (1, &[0]), (2, &[0, 1])]),
            evaluation(6.0, &[]),
        ];
        registry.merge(&evaluations);
        let genomes = vec![
            Genome::new(vec![0]),
            Genome::new(vec![0, 1]),
            Genome::new(vec![1]),
        ];

        let record = summarize(3, &fsm, &genomes, &evaluations, &registry);
        assert_eq!(record.generation, 3);
        assert_eq!(record.fitness_max, 6.0);
        assert_eq!(record.fitness_min, 2.0);
        assert_eq!(record.fitness_mean, 4.0);
        assert!((record.fitness_stdev - 2.0).abs() < 1e-6);
        assert_eq!(record.uio_distribution, BTreeMap::from([(0, 1), (1, 1), (3, 1)]));
        assert_eq!(record.uio_frequencies["a"], 2);
        assert_eq!(record.uio_frequencies["ab"], 2);
        assert_eq!(record.discovered, 2);
        assert_eq!(record.open, 0);
        assert!((record.diversity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_candidate_stdev() {
        let fsm = three_state_machine();
        let registry = DiscoveryRegistry::new([0]);
        let record = summarize(
            0,
            &fsm,
            &[Genome::new(vec![0])],
            &[evaluation(3.5, &[])],
            &registry,
        );
        assert_eq!(record.fitness_stdev, 0.0);
        assert_eq!(record.diversity, 0.0);
        assert_eq!(record.open, 1);
    }

    #[test]
    fn test_window_and_averages() {
        let mut stats = UioStatistics::new(1..3);
        stats.record(record(0, &[(0, 10)], &[("a", 100)]));
        stats.record(record(1, &[(1, 3), (2, 1)], &[("a", 1), ("ab", 2)]));
        stats.record(record(2, &[(1, 1)], &[("a", 2)]));
        stats.record(record(3, &[(3, 9)], &[("b", 9)]));

        assert_eq!(stats.windowed().len(), 2);
        assert_eq!(stats.get(3).unwrap().generation, 3);

        let distribution = stats.average_uio_distribution();
        assert_eq!(distribution, BTreeMap::from([(1, 2.0), (2, 0.5)]));

        let frequency = stats.average_uio_frequency();
        assert_eq!(frequency["a"], 2);
        assert_eq!(frequency["ab"], 1);
        assert!(!frequency.contains_key("b"));
    }

    #[test]
    fn test_window_past_end() {
        let mut stats = UioStatistics::new(5..10);
        stats.record(record(0, &[(1, 1)], &[]));
        assert!(stats.windowed().is_empty());
        assert!(stats.average_uio_distribution().is_empty());
    }
}

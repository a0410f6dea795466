//! Parent selection and variation operators.

use super::genome::{self, GenomeRng};
use crate::schema::{CrossoverMethod, GeneticAlgorithmConfig, Genome, SelectionMethod};

/// Chooses parents from a scored population.
pub trait SelectionStrategy: Send + Sync {
    /// Pick one parent index. `fitness` is in population order and non-empty.
    fn select(&self, fitness: &[f32], rng: &mut GenomeRng) -> usize;
}

impl SelectionStrategy for SelectionMethod {
    fn select(&self, fitness: &[f32], rng: &mut GenomeRng) -> usize {
        match self {
            SelectionMethod::Tournament { size } => {
                let mut best_idx = rng.index(fitness.len());
                for _ in 1..*size {
                    let idx = rng.index(fitness.len());
                    if fitness[idx] > fitness[best_idx] {
                        best_idx = idx;
                    }
                }
                best_idx
            }
            SelectionMethod::RankBased => {
                // Best candidate gets rank n, worst gets rank 1.
                let mut order: Vec<usize> = (0..fitness.len()).collect();
                order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

                let n = order.len();
                let total_rank = n * (n + 1) / 2;
                let mut target = rng.index(total_rank);
                for (position, &idx) in order.iter().enumerate() {
                    let rank = n - position;
                    if target < rank {
                        return idx;
                    }
                    target -= rank;
                }
                order[0]
            }
            SelectionMethod::RouletteWheel => {
                let total_fitness: f32 = fitness.iter().map(|f| f.max(0.0)).sum();
                if total_fitness <= 0.0 {
                    return rng.index(fitness.len());
                }

                let target = rng.unit() * total_fitness;
                let mut cumulative = 0.0;
                for (i, f) in fitness.iter().enumerate() {
                    cumulative += f.max(0.0);
                    if cumulative > target {
                        return i;
                    }
                }
                fitness.len() - 1
            }
        }
    }
}

/// Produces offspring genomes.
pub trait VariationOperator: Send + Sync {
    /// Combine two parents into one child.
    fn crossover(&self, parent1: &Genome, parent2: &Genome, rng: &mut GenomeRng) -> Genome;

    /// Mutate a child in place.
    fn mutate(&self, genome: &mut Genome, rng: &mut GenomeRng);
}

/// Symbol-level crossover and mutation over a fixed input alphabet.
#[derive(Debug, Clone)]
pub struct SymbolVariation {
    pub crossover: CrossoverMethod,
    pub mutation_rate: f32,
    pub insertion_rate: f32,
    pub deletion_rate: f32,
    pub alphabet_size: usize,
    pub max_length: usize,
}

impl SymbolVariation {
    pub fn new(config: &GeneticAlgorithmConfig, alphabet_size: usize, max_length: usize) -> Self {
        Self {
            crossover: config.crossover,
            mutation_rate: config.mutation_rate,
            insertion_rate: config.insertion_rate,
            deletion_rate: config.deletion_rate,
            alphabet_size,
            max_length,
        }
    }
}

impl VariationOperator for SymbolVariation {
    fn crossover(&self, parent1: &Genome, parent2: &Genome, rng: &mut GenomeRng) -> Genome {
        genome::crossover(
            self.crossover,
            parent1,
            parent2,
            self.alphabet_size,
            self.max_length,
            rng,
        )
    }

    fn mutate(&self, genome: &mut Genome, rng: &mut GenomeRng) {
        genome::mutate(
            genome,
            self.mutation_rate,
            self.insertion_rate,
            self.deletion_rate,
            self.alphabet_size,
            self.max_length,
            rng,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(method: &SelectionMethod, fitness: &[f32], draws: usize) -> Vec<usize> {
        let mut rng = GenomeRng::new(7);
        let mut counts = vec![0; fitness.len()];
        for _ in 0..draws {
            counts[method.select(fitness, &mut rng)] += 1;
        }
        counts
    }

    #[test]
    fn test_tournament_prefers_fitter() {
        let fitness = [0.0, 1.0, 5.0, 2.0];
        let counts = histogram(&SelectionMethod::Tournament { size: 3 }, &fitness, 2000);
        assert!(counts[2] > counts[0]);
        assert!(counts[2] > counts[1]);
        assert!(counts.iter().all(|&c| c <= 2000));
    }

    #[test]
    fn test_tournament_size_one_is_uniform() {
        let fitness = [0.0, 100.0];
        let counts = histogram(&SelectionMethod::Tournament { size: 1 }, &fitness, 2000);
        assert!(counts[0] > 800 && counts[1] > 800);
    }

    #[test]
    fn test_rank_based_ignores_scale() {
        let fitness = [1000.0, 1.0, 2.0];
        let counts = histogram(&SelectionMethod::RankBased, &fitness, 3000);
        // Ranks 3, 1, 2 out of 6.
        assert!(counts[0] > counts[2]);
        assert!(counts[2] > counts[1]);
        assert!(counts[1] > 0);
    }

    #[test]
    fn test_roulette_wheel() {
        let fitness = [0.0, 3.0, 1.0];
        let counts = histogram(&SelectionMethod::RouletteWheel, &fitness, 2000);
        assert_eq!(counts[0], 0);
        assert!(counts[1] > counts[2]);

        let zeros = histogram(&SelectionMethod::RouletteWheel, &[0.0, 0.0], 200);
        assert!(zeros.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_symbol_variation_bounds() {
        let config = GeneticAlgorithmConfig {
            mutation_rate: 0.5,
            insertion_rate: 0.5,
            deletion_rate: 0.3,
            ..Default::default()
        };
        let variation = SymbolVariation::new(&config, 3, 5);
        let mut rng = GenomeRng::new(3);

        for _ in 0..200 {
            let p1 = rng.random_genome(3, 5);
            let p2 = rng.random_genome(3, 5);
            let mut child = variation.crossover(&p1, &p2, &mut rng);
            variation.mutate(&mut child, &mut rng);
            assert!((1..=5).contains(&child.len()));
            assert!(child.as_slice().iter().all(|&s| s < 3));
        }
    }
}

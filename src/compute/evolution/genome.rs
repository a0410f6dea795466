//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, and mutation of input-symbol
//! genomes.

use rand::prelude::*;

use crate::schema::{CrossoverMethod, Genome, InputId};

/// Random number generator wrapper for genome operations.
#[derive(Debug, Clone)]
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Underlying generator, e.g. for random machine generation.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Random genome with length in `1..=max_length`.
    pub fn random_genome(&mut self, alphabet_size: usize, max_length: usize) -> Genome {
        let length = self.rng.gen_range(1..=max_length.max(1));
        let inputs = (0..length).map(|_| self.symbol(alphabet_size)).collect();
        Genome::new(inputs)
    }

    /// Uniform input symbol.
    #[inline]
    pub fn symbol(&mut self, alphabet_size: usize) -> InputId {
        self.rng.gen_range(0..alphabet_size.max(1))
    }

    /// Uniform index in `0..len`.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform value in `[0, 1)`.
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.rng.r#gen::<f32>()
    }

    /// True with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f32) -> bool {
        self.unit() < p
    }
}

/// Crossover two genomes.
///
/// Parents may differ in length, so each parent gets its own cut points.
/// The child is repaired to `1..=max_length` symbols.
pub fn crossover(
    method: CrossoverMethod,
    parent1: &Genome,
    parent2: &Genome,
    alphabet_size: usize,
    max_length: usize,
    rng: &mut GenomeRng,
) -> Genome {
    let (p1, p2) = (parent1.as_slice(), parent2.as_slice());

    let inputs = match method {
        CrossoverMethod::OnePoint => {
            let c1 = rng.index(p1.len() + 1);
            let c2 = rng.index(p2.len() + 1);
            p1[..c1].iter().chain(&p2[c2..]).copied().collect()
        }
        CrossoverMethod::TwoPoint => {
            let (a1, b1) = cut_pair(p1.len(), rng);
            let (a2, b2) = cut_pair(p2.len(), rng);
            p1[..a1]
                .iter()
                .chain(&p2[a2..b2])
                .chain(&p1[b1..])
                .copied()
                .collect()
        }
        CrossoverMethod::Uniform => {
            let length = if rng.chance(0.5) { p1.len() } else { p2.len() };
            (0..length)
                .filter_map(|i| match (p1.get(i), p2.get(i)) {
                    (Some(&a), Some(&b)) => Some(if rng.chance(0.5) { a } else { b }),
                    (Some(&a), None) => Some(a),
                    (None, Some(&b)) => Some(b),
                    (None, None) => None,
                })
                .collect()
        }
    };

    let mut child = Genome::new(inputs);
    repair(&mut child, alphabet_size, max_length, rng);
    child
}

fn cut_pair(len: usize, rng: &mut GenomeRng) -> (usize, usize) {
    let a = rng.index(len + 1);
    let b = rng.index(len + 1);
    (a.min(b), a.max(b))
}

/// Per-symbol mutation.
///
/// Each symbol may be deleted, replaced, and followed by an inserted
/// symbol, each with its own probability. The result is repaired to
/// `1..=max_length` symbols.
pub fn mutate(
    genome: &mut Genome,
    replace_rate: f32,
    insert_rate: f32,
    delete_rate: f32,
    alphabet_size: usize,
    max_length: usize,
    rng: &mut GenomeRng,
) {
    let mut inputs = Vec::with_capacity(genome.len() + 1);
    for &input in genome.as_slice() {
        if rng.chance(delete_rate) {
            continue;
        }
        inputs.push(if rng.chance(replace_rate) {
            rng.symbol(alphabet_size)
        } else {
            input
        });
        if rng.chance(insert_rate) {
            inputs.push(rng.symbol(alphabet_size));
        }
    }
    genome.inputs = inputs;
    repair(genome, alphabet_size, max_length, rng);
}

/// Truncate to `max_length` and pad empty genomes with one random symbol.
pub fn repair(genome: &mut Genome, alphabet_size: usize, max_length: usize, rng: &mut GenomeRng) {
    genome.inputs.truncate(max_length.max(1));
    if genome.is_empty() {
        genome.inputs.push(rng.symbol(alphabet_size));
    }
}

/// Edit distance between two genomes.
pub fn genome_distance(g1: &Genome, g2: &Genome) -> usize {
    let (a, b) = (g1.as_slice(), g2.as_slice());
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, &x) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &y) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(x != y);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

//! State splitting for candidate input sequences.
//!
//! A candidate separates the states of a machine by the outputs they
//! produce. Two interpretations are supported:
//!
//! - [`DistinguishingProfile`]: the genome is applied as one preset
//!   sequence to every state. A state is distinguished by the shortest
//!   prefix after which no other state shares its output trace.
//! - [`SplittingTree`]: the genome is consumed gene by gene, breadth-first,
//!   to refine output-equivalent blocks adaptively. Every singleton leaf
//!   yields the input path leading to it.
//!
//! Both are pure functions of the machine and the genome.

use std::collections::{BTreeMap, VecDeque};

use crate::compute::{Fsm, Trace};
use crate::schema::{InputId, OutputId, StateId};

/// States a candidate tells apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distinction {
    /// UIO per uniquely distinguished state.
    pub uios: BTreeMap<StateId, Vec<InputId>>,
    /// Number of distinct output observations at the end of the candidate.
    pub observation_classes: usize,
}

impl Distinction {
    /// Number of states with a unique output trace.
    #[inline]
    pub fn number_of_uios(&self) -> usize {
        self.uios.len()
    }
}

/// Output traces of every state under one preset input sequence.
#[derive(Debug, Clone)]
pub struct DistinguishingProfile {
    traces: Vec<Trace>,
    distinction: Distinction,
}

impl DistinguishingProfile {
    /// Apply `inputs` from every state and split the states by output.
    ///
    /// A state whose trace hits an undefined transition is never credited
    /// with a UIO but still counts as distinct from complete traces.
    pub fn compute(fsm: &Fsm, inputs: &[InputId]) -> Self {
        let n = fsm.num_states();
        let traces: Vec<Trace> = (0..n)
            .map(|state| fsm.trigger_sequence(state, inputs))
            .collect();

        // Prefix length after which each state sits alone in its block.
        let mut unique_after: Vec<Option<usize>> = vec![None; n];
        let mut blocks: Vec<Vec<StateId>> = vec![(0..n).collect()];
        mark_singletons(&blocks, 0, &mut unique_after);

        for pos in 0..inputs.len() {
            let mut refined = Vec::with_capacity(blocks.len());
            for block in &blocks {
                let mut groups: BTreeMap<OutputId, Vec<StateId>> = BTreeMap::new();
                for &state in block {
                    // States whose trace ends here drop out of the partition.
                    if let Some(&output) = traces[state].outputs.get(pos) {
                        groups.entry(output).or_default().push(state);
                    }
                }
                refined.extend(groups.into_values());
            }
            blocks = refined;
            mark_singletons(&blocks, pos + 1, &mut unique_after);
        }

        let uios = unique_after
            .iter()
            .enumerate()
            .filter(|(state, _)| traces[*state].is_complete())
            .filter_map(|(state, len)| len.map(|len| (state, inputs[..len].to_vec())))
            .collect();

        Self {
            traces,
            distinction: Distinction {
                uios,
                observation_classes: blocks.len(),
            },
        }
    }

    /// Trace of `state`.
    pub fn trace(&self, state: StateId) -> Option<&Trace> {
        self.traces.get(state)
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    #[inline]
    pub fn number_of_uios(&self) -> usize {
        self.distinction.number_of_uios()
    }

    /// Shortest distinguishing prefix per distinguished state.
    pub fn uios(&self) -> &BTreeMap<StateId, Vec<InputId>> {
        &self.distinction.uios
    }

    /// Number of distinct complete output traces.
    pub fn observation_classes(&self) -> usize {
        self.distinction.observation_classes
    }

    pub fn into_distinction(self) -> Distinction {
        self.distinction
    }
}

fn mark_singletons(blocks: &[Vec<StateId>], len: usize, unique_after: &mut [Option<usize>]) {
    for block in blocks {
        if let [state] = block.as_slice() {
            unique_after[*state].get_or_insert(len);
        }
    }
}

/// A node of the adaptive splitting tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// `(origin, current)` pairs that produced identical outputs so far.
    pub block: Vec<(StateId, StateId)>,
    /// Inputs applied from the root.
    pub path: Vec<InputId>,
    /// Input used to split this node, `None` for leaves.
    pub input: Option<InputId>,
    /// Child node indices, one per observed output.
    pub children: Vec<usize>,
}

impl TreeNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Adaptive splitting tree grown from a genome.
#[derive(Debug, Clone)]
pub struct SplittingTree {
    nodes: Vec<TreeNode>,
    distinction: Distinction,
}

impl SplittingTree {
    /// Grow the tree breadth-first, one gene per expanded node.
    ///
    /// Singleton blocks are never expanded and nodes at `max_depth` stay
    /// leaves. Growth stops when the genes run out.
    pub fn build(fsm: &Fsm, inputs: &[InputId], max_depth: usize) -> Self {
        let mut nodes = vec![TreeNode {
            block: (0..fsm.num_states()).map(|s| (s, s)).collect(),
            path: Vec::new(),
            input: None,
            children: Vec::new(),
        }];
        let mut queue = VecDeque::from([0]);
        let mut genes = inputs.iter().copied();

        while let Some(index) = queue.pop_front() {
            if nodes[index].block.len() <= 1 || nodes[index].depth() >= max_depth {
                continue;
            }
            let Some(input) = genes.next() else {
                break;
            };

            let mut groups: BTreeMap<OutputId, Vec<(StateId, StateId)>> = BTreeMap::new();
            for &(origin, current) in &nodes[index].block {
                if let Ok(step) = fsm.trigger(current, input) {
                    groups.entry(step.output).or_default().push((origin, step.next));
                }
            }

            let mut path = nodes[index].path.clone();
            path.push(input);
            for block in groups.into_values() {
                let child = nodes.len();
                nodes.push(TreeNode {
                    block,
                    path: path.clone(),
                    input: None,
                    children: Vec::new(),
                });
                nodes[index].children.push(child);
                queue.push_back(child);
            }
            nodes[index].input = Some(input);
        }

        let leaves = || nodes.iter().filter(|n| n.is_leaf() && !n.block.is_empty());
        let uios = leaves()
            .filter_map(|node| match node.block.as_slice() {
                [(origin, _)] => Some((*origin, node.path.clone())),
                _ => None,
            })
            .collect();
        let observation_classes = leaves().count();

        Self {
            distinction: Distinction {
                uios,
                observation_classes,
            },
            nodes,
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    #[inline]
    pub fn number_of_uios(&self) -> usize {
        self.distinction.number_of_uios()
    }

    /// Path to each singleton leaf, keyed by the state it isolates.
    pub fn uios(&self) -> &BTreeMap<StateId, Vec<InputId>> {
        &self.distinction.uios
    }

    /// Number of leaves.
    pub fn observation_classes(&self) -> usize {
        self.distinction.observation_classes
    }

    pub fn into_distinction(self) -> Distinction {
        self.distinction
    }
}

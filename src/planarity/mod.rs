//! Incremental planarity oracle.
//!
//! [`PlanarityState`] owns the working graph and a planar embedding of it.
//! Queries climb a ladder of increasingly expensive checks:
//!
//! 1. bridge between two components: always planar;
//! 2. both endpoints on one face of the current embedding: planar, and the
//!    commit splits that face in place;
//! 3. the blocks merged by the edge would exceed `3k - 6` edges: not planar;
//! 4. both endpoints in one block whose embedding around them is forced,
//!    either because the block is 3-connected or because three disjoint
//!    paths join them: not planar, since no other embedding puts them on a
//!    common face;
//! 5. left-right test restricted to the merged blocks: exact verdict.
//!
//! Only a commit accepted by step 5 re-embeds the graph. The block
//! decomposition is cached and only dropped when a commit joins blocks.
//! Once a block is 3-connected it stays so, and from then on every
//! rejection inside it stops at step 4 with one face walk.

pub mod blocks;
pub mod embedding;
pub mod lr;

use petgraph::unionfind::UnionFind;
use std::cell::{Cell, OnceCell};
use std::collections::{HashMap, HashSet};

use crate::error::{PmfgError, Result};
use blocks::BlockForest;
use embedding::{Chord, RotationSystem};

/// Outcome of a planarity query, naming the rung that decided it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Admission {
    /// Endpoints in different components
    Bridge,
    /// Endpoints share a face of the current embedding
    SharedFace,
    /// Accepted by the left-right test on the merged blocks
    BlockPlanar,
    /// Merged blocks (or the whole graph) already at the planar edge bound
    Saturated,
    /// Endpoints in one block, on no common face of an embedding that
    /// cannot change around them
    Rigid,
    /// Rejected by the left-right test
    NonPlanar,
    /// Edge already committed
    Existing,
    /// Self-loop or node out of range
    Invalid,
}

impl Admission {
    pub fn is_planar(self) -> bool {
        matches!(self, Self::Bridge | Self::SharedFace | Self::BlockPlanar)
    }
}

enum Probe {
    Verdict(Admission),
    Face(Chord),
}

impl Probe {
    fn admission(&self) -> Admission {
        match self {
            Probe::Verdict(admission) => *admission,
            Probe::Face(_) => Admission::SharedFace,
        }
    }
}

pub struct PlanarityState {
    node_count: usize,
    edges: Vec<(usize, usize)>,
    edge_set: HashSet<(usize, usize)>,
    adjacency: Vec<Vec<usize>>,
    components: UnionFind<usize>,
    embedding: RotationSystem,
    blocks: OnceCell<BlockForest>,
    rebuilds: usize,
    lr_tests: Cell<usize>,
}

impl PlanarityState {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::new(),
            edge_set: HashSet::new(),
            adjacency: vec![Vec::new(); node_count],
            components: UnionFind::new(node_count),
            embedding: RotationSystem::new(node_count),
            blocks: OnceCell::new(),
            rebuilds: 0,
            lr_tests: Cell::new(0),
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Committed edges as `(min, max)` pairs, in commit order
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn contains(&self, u: usize, v: usize) -> bool {
        self.edge_set.contains(&key(u, v))
    }

    /// 0 for a node outside the graph
    pub fn degree(&self, v: usize) -> usize {
        self.adjacency.get(v).map_or(0, Vec::len)
    }

    pub fn embedding(&self) -> &RotationSystem {
        &self.embedding
    }

    /// Number of full re-embeddings so far
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Number of queries that fell through to the left-right test
    pub fn lr_tests(&self) -> usize {
        self.lr_tests.get()
    }

    /// Would adding `u -- v` keep the graph planar? No observable mutation.
    pub fn test(&self, u: usize, v: usize) -> bool {
        self.check(u, v).is_planar()
    }

    /// Like [`test`](Self::test), but reports which check decided
    pub fn check(&self, u: usize, v: usize) -> Admission {
        self.probe(u, v).admission()
    }

    fn probe(&self, u: usize, v: usize) -> Probe {
        let n = self.node_count;
        if u >= n || v >= n || u == v {
            return Probe::Verdict(Admission::Invalid);
        }
        if self.contains(u, v) {
            return Probe::Verdict(Admission::Existing);
        }
        if n >= 3 && self.edges.len() >= 3 * n - 6 {
            return Probe::Verdict(Admission::Saturated);
        }
        if !self.components.equiv(u, v) {
            return Probe::Verdict(Admission::Bridge);
        }
        if let Some(chord) = self.embedding.shared_face(u, v) {
            return Probe::Face(chord);
        }

        let blocks = self
            .blocks
            .get_or_init(|| BlockForest::new(&self.adjacency));
        let path = match blocks.path(u, v) {
            Some(path) => path,
            None => return Probe::Verdict(Admission::Bridge),
        };

        let (vertices, edges) = blocks.span_size(&path);
        if vertices >= 3 && edges + 1 > 3 * vertices - 6 {
            return Probe::Verdict(Admission::Saturated);
        }

        // Not on a common face and no separation pair between them: both sit
        // in one 3-connected piece of the block, whose embedding is unique
        if let [block] = path.as_slice() {
            if blocks.is_rigid(*block, &self.embedding)
                || blocks.disjoint_paths(*block, u, v, 3) >= 3
            {
                return Probe::Verdict(Admission::Rigid);
            }
        }

        self.lr_tests.set(self.lr_tests.get() + 1);
        let mut local: HashMap<usize, usize> = HashMap::with_capacity(vertices);
        let mut local_edges = Vec::with_capacity(edges + 1);
        for (a, b) in blocks.span_edges(&path).chain(std::iter::once((u, v))) {
            let next = local.len();
            let la = *local.entry(a).or_insert(next);
            let next = local.len();
            let lb = *local.entry(b).or_insert(next);
            local_edges.push((la, lb));
        }

        if lr::is_planar(local.len(), &local_edges) {
            Probe::Verdict(Admission::BlockPlanar)
        } else {
            Probe::Verdict(Admission::NonPlanar)
        }
    }

    /// Add `u -- v`. Fails with an invariant violation if the edge exists,
    /// is invalid, or would break planarity.
    pub fn commit(&mut self, u: usize, v: usize) -> Result<Admission> {
        let admission = self.try_commit(u, v)?;
        if admission.is_planar() {
            Ok(admission)
        } else {
            Err(PmfgError::invariant(format!(
                "edge ({}, {}) cannot be committed: {:?}",
                u, v, admission
            )))
        }
    }

    /// Test and commit with a single probe. A rejected edge leaves the state
    /// untouched and is reported through the returned admission; existing
    /// or invalid pairs are still invariant violations.
    pub fn try_commit(&mut self, u: usize, v: usize) -> Result<Admission> {
        let probe = self.probe(u, v);
        let admission = probe.admission();
        match probe {
            Probe::Face(chord) => self.embedding.insert_chord(&chord),
            Probe::Verdict(Admission::Bridge) => self.embedding.insert_bridge(u, v),
            Probe::Verdict(Admission::BlockPlanar) => {
                let mut edges = self.edges.clone();
                edges.push(key(u, v));
                match lr::planar_embedding(self.node_count, &edges) {
                    Some(embedding) => {
                        self.embedding = embedding;
                        self.rebuilds += 1;
                    }
                    None => {
                        return Err(PmfgError::invariant(format!(
                            "re-embedding failed after accepting edge ({}, {})",
                            u, v
                        )))
                    }
                }
            }
            Probe::Verdict(Admission::Existing) => {
                return Err(PmfgError::invariant(format!(
                    "edge ({}, {}) is already committed",
                    u, v
                )))
            }
            Probe::Verdict(Admission::Invalid) => {
                return Err(PmfgError::invariant(format!(
                    "edge ({}, {}) is a self-loop or references a node outside 0..{}",
                    u, v, self.node_count
                )))
            }
            Probe::Verdict(_) => return Ok(admission),
        }

        self.record(u, v);
        Ok(admission)
    }

    fn record(&mut self, u: usize, v: usize) {
        let joined_block = self
            .blocks
            .get()
            .and_then(|blocks| blocks.common_block(u, v));
        match joined_block {
            Some(id) => {
                if let Some(blocks) = self.blocks.get_mut() {
                    blocks.extend_block(id, u, v);
                }
            }
            None => {
                self.blocks.take();
            }
        }

        let edge = key(u, v);
        self.edges.push(edge);
        self.edge_set.insert(edge);
        self.adjacency[u].push(v);
        self.adjacency[v].push(u);
        self.components.union(u, v);
    }
}

fn key(u: usize, v: usize) -> (usize, usize) {
    if u < v {
        (u, v)
    } else {
        (v, u)
    }
}

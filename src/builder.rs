//! Two-phase greedy PMFG construction.
//!
//! - Tree: Kruskal over the descending order until `n - 1` edges span the
//!   nodes (or the candidates run out)
//! - Saturate: re-scan the same order from the start, skipping committed
//!   edges, and keep every edge the planarity oracle accepts until the
//!   budget `3n - 6` is reached
//!
//! Construction is sequential; the only parallel work is candidate
//! preprocessing, which finishes before [`PmfgBuilder::run`] starts.

use petgraph::unionfind::UnionFind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PmfgConfig;
use crate::edge_budget;
use crate::edges::{CandidateEdge, CandidateEdgeIndex};
use crate::error::{PmfgError, Result};
use crate::planarity::{Admission, PlanarityState};
use crate::result::ResultGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Tree,
    Saturate,
    Done,
}

/// Cooperative cancellation, checked before every candidate
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How often each oracle rung decided during Saturate
#[derive(Debug, Clone, Copy, Default)]
struct Decisions {
    bridge: usize,
    shared_face: usize,
    block_planar: usize,
    saturated: usize,
    rigid: usize,
    non_planar: usize,
}

impl Decisions {
    fn record(&mut self, admission: Admission) {
        match admission {
            Admission::Bridge => self.bridge += 1,
            Admission::SharedFace => self.shared_face += 1,
            Admission::BlockPlanar => self.block_planar += 1,
            Admission::Saturated => self.saturated += 1,
            Admission::Rigid => self.rigid += 1,
            Admission::NonPlanar => self.non_planar += 1,
            Admission::Existing | Admission::Invalid => {}
        }
    }
}

pub struct PmfgBuilder<'a> {
    index: &'a CandidateEdgeIndex,
    config: &'a PmfgConfig,
    cancellation: Option<CancellationToken>,
    phase: Phase,
    scanned: usize,
}

impl<'a> PmfgBuilder<'a> {
    pub fn new(index: &'a CandidateEdgeIndex, config: &'a PmfgConfig) -> Self {
        Self {
            index,
            config,
            cancellation: None,
            phase: Phase::Tree,
            scanned: 0,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn run(self) -> Result<ResultGraph> {
        self.run_with(|_, _, _| {})
    }

    /// Run the construction, calling `observer` after every commit with the
    /// phase, the committed edge, and the oracle state that now contains it.
    pub fn run_with<F>(mut self, mut observer: F) -> Result<ResultGraph>
    where
        F: FnMut(Phase, &CandidateEdge, &PlanarityState),
    {
        self.config.validate()?;
        let index = self.index;
        let n = index.node_count();
        let budget = edge_budget(n);
        let mut state = PlanarityState::new(n);
        let mut committed = vec![false; index.len()];
        let mut kept: Vec<CandidateEdge> = Vec::with_capacity(budget);

        log::info!(
            "Building PMFG: {} nodes, {} candidates, edge budget {}",
            n,
            index.len(),
            budget
        );

        // Tree
        let tree_target = n.saturating_sub(1);
        let mut forest = UnionFind::<usize>::new(n);
        for (position, edge) in index.iter().enumerate() {
            if kept.len() >= tree_target {
                break;
            }
            self.checkpoint(kept.len())?;
            if !forest.union(edge.source, edge.target) {
                continue;
            }
            state.commit(edge.source, edge.target)?;
            committed[position] = true;
            kept.push(*edge);
            observer(Phase::Tree, edge, &state);
        }
        let tree_edges = kept.len();
        if tree_edges < tree_target {
            log::warn!(
                "Candidates do not connect all nodes: spanning forest has {} of {} edges",
                tree_edges,
                tree_target
            );
        }
        log::info!("Tree phase: {} edges after {} candidates", tree_edges, self.scanned);

        // Saturate
        self.phase = Phase::Saturate;
        let mut decisions = Decisions::default();
        for (position, edge) in index.iter().enumerate() {
            if kept.len() >= budget {
                break;
            }
            if committed[position] {
                continue;
            }
            self.checkpoint(kept.len())?;

            let admission = state.try_commit(edge.source, edge.target)?;
            decisions.record(admission);
            if admission.is_planar() {
                committed[position] = true;
                kept.push(*edge);
                observer(Phase::Saturate, edge, &state);
            }
        }

        self.phase = Phase::Done;
        log::info!(
            "Saturate phase: {} edges of budget {} after {} candidates",
            kept.len(),
            budget,
            self.scanned
        );
        log::debug!(
            "Oracle decisions: {} bridge, {} shared face, {} block test, {} saturated, {} rigid, {} non-planar; {} left-right tests, {} re-embeddings",
            decisions.bridge,
            decisions.shared_face,
            decisions.block_planar,
            decisions.saturated,
            decisions.rigid,
            decisions.non_planar,
            state.lr_tests(),
            state.rebuilds()
        );
        if n >= 3 && kept.len() < budget {
            log::warn!(
                "Candidates exhausted below the edge budget ({} of {})",
                kept.len(),
                budget
            );
        }

        Ok(ResultGraph::new(
            index.labels().to_vec(),
            kept,
            tree_edges,
            index.is_approximate(),
        ))
    }

    fn checkpoint(&mut self, kept: usize) -> Result<()> {
        if let Some(token) = &self.cancellation {
            if token.is_cancelled() {
                log::warn!("Construction cancelled in {:?} phase", self.phase);
                return Err(PmfgError::Cancelled {
                    scanned: self.scanned,
                });
            }
        }
        self.scanned += 1;
        if self.scanned % self.config.progress_interval == 0 {
            log::debug!(
                "{:?}: {} candidates scanned, {} edges kept",
                self.phase,
                self.scanned,
                kept
            );
        }
        Ok(())
    }
}

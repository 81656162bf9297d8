//! Candidate edges and their deterministic descending-weight order.
//!
//! The order is "weight descending, then `(source, target)` ascending", a
//! total order, so parallel sorting and the bounded top-K selection both
//! produce the same sequence for the same input.

use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};
use std::path::Path;

use crate::config::{CandidatePolicy, PmfgConfig, DEFAULT_TOP_K_MULTIPLE};
use crate::edge_budget;
use crate::error::{PmfgError, Result};
use crate::matrix::WeightMatrix;

/// Unordered pair with `source < target`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

impl CandidateEdge {
    pub fn new(a: usize, b: usize, weight: f64) -> Self {
        let (source, target) = if a < b { (a, b) } else { (b, a) };
        Self {
            source,
            target,
            weight,
        }
    }

    /// `Less` means "scanned earlier"
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .weight
            .total_cmp(&self.weight)
            .then(self.source.cmp(&other.source))
            .then(self.target.cmp(&other.target))
    }
}

/// Edge list input: labels plus raw `(source, target, weight)` rows, before
/// any filtering.
#[derive(Debug, Clone, Default)]
pub struct EdgeList {
    labels: Vec<String>,
    edges: Vec<(usize, usize, f64)>,
}

impl EdgeList {
    pub fn new(labels: Vec<String>, edges: Vec<(usize, usize, f64)>) -> Result<Self> {
        if labels.is_empty() {
            return Err(PmfgError::input("edge list has no nodes"));
        }
        if let Some(&(a, b, _)) = edges
            .iter()
            .find(|(a, b, _)| *a >= labels.len() || *b >= labels.len())
        {
            return Err(PmfgError::input(format!(
                "edge ({}, {}) references a node outside 0..{}",
                a,
                b,
                labels.len()
            )));
        }
        Ok(Self { labels, edges })
    }

    /// Build from labeled rows; node ids follow first appearance
    pub fn from_labeled<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String, f64)>,
    {
        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut labels = Vec::new();
        let mut edges = Vec::new();

        for (source, target, weight) in rows {
            let mut id_of = |label: String| {
                *ids.entry(label.clone()).or_insert_with(|| {
                    labels.push(label);
                    labels.len() - 1
                })
            };
            let a = id_of(source);
            let b = id_of(target);
            edges.push((a, b, weight));
        }

        Self::new(labels, edges)
    }

    /// Read `source,target,weight` rows. A first row whose weight field is
    /// not numeric is treated as a header; later malformed rows are skipped.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path.as_ref())?;

        let mut rows = Vec::new();
        let mut skipped = 0;
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let fields: Vec<&str> = record.iter().map(str::trim).collect();
            let parsed = match fields.as_slice() {
                [source, target, weight, ..] => {
                    let weight = if weight.is_empty() {
                        Some(f64::NAN)
                    } else {
                        weight.parse::<f64>().ok()
                    };
                    weight.map(|w| (source.to_string(), target.to_string(), w))
                }
                _ => None,
            };

            match parsed {
                Some(row) => rows.push(row),
                None if line == 0 => log::debug!("Header detected: {:?}", fields),
                None => {
                    log::warn!("Skipping malformed edge row at line {}: {:?}", line + 1, fields);
                    skipped += 1;
                }
            }
        }

        log::info!(
            "Read {} edge rows from {} ({} skipped)",
            rows.len(),
            path.as_ref().display(),
            skipped
        );
        Self::from_labeled(rows)
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn edges(&self) -> &[(usize, usize, f64)] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    All,
    Top(usize),
}

/// Read-only ordered view over the admissible candidate edges
#[derive(Debug, Clone)]
pub struct CandidateEdgeIndex {
    node_count: usize,
    labels: Vec<String>,
    edges: Vec<CandidateEdge>,
    approximate: bool,
    excluded: usize,
}

impl CandidateEdgeIndex {
    /// Scan the upper triangle of `matrix`
    pub fn from_matrix(matrix: &WeightMatrix, config: &PmfgConfig) -> Result<Self> {
        config.validate()?;
        let n = matrix.len();
        let pairs = n * n.saturating_sub(1) / 2;
        let min_weight = config.min_weight;

        log::debug!("Scanning {} candidate pairs for {} nodes", pairs, n);
        let excluded = install(config.threads, || {
            (0..n)
                .into_par_iter()
                .map(|i| {
                    ((i + 1)..n)
                        .filter(|&j| !admissible(matrix.weight(i, j), min_weight))
                        .count()
                })
                .sum::<usize>()
        })?;
        if excluded > 0 {
            log::warn!("Excluded {} candidate edges below the minimum weight", excluded);
        }

        let total = pairs - excluded;
        let selection = select(total, n, config)?;
        let edges = install(config.threads, || {
            let scan = (0..n)
                .into_par_iter()
                .flat_map_iter(move |i| {
                    ((i + 1)..n).map(move |j| CandidateEdge::new(i, j, matrix.weight(i, j)))
                })
                .filter(move |edge| admissible(edge.weight, min_weight));
            order(scan, selection)
        })?;

        Ok(Self::finish(n, matrix.labels().to_vec(), edges, selection, total, excluded))
    }

    /// Normalise, filter, and deduplicate a pre-extracted edge list. Of
    /// duplicate unordered pairs the heaviest is kept.
    pub fn from_edge_list(list: &EdgeList, config: &PmfgConfig) -> Result<Self> {
        config.validate()?;
        let n = list.node_count();

        let mut self_loops = 0;
        let mut out_of_domain = 0;
        let mut duplicates = 0;
        let mut best: HashMap<(usize, usize), f64> = HashMap::with_capacity(list.len());
        for &(a, b, weight) in list.edges() {
            if a == b {
                self_loops += 1;
                continue;
            }
            if !admissible(weight, config.min_weight) {
                out_of_domain += 1;
                continue;
            }
            let edge = CandidateEdge::new(a, b, weight);
            match best.entry((edge.source, edge.target)) {
                Entry::Occupied(mut slot) => {
                    duplicates += 1;
                    if weight > *slot.get() {
                        slot.insert(weight);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(weight);
                }
            }
        }

        if self_loops + out_of_domain + duplicates > 0 {
            log::warn!(
                "Edge list filtering: dropped {} self-loops, {} non-finite or out-of-domain weights, merged {} duplicates",
                self_loops,
                out_of_domain,
                duplicates
            );
        }

        let total = best.len();
        let selection = select(total, n, config)?;
        let unique: Vec<CandidateEdge> = best
            .into_iter()
            .map(|((a, b), weight)| CandidateEdge::new(a, b, weight))
            .collect();
        let edges = install(config.threads, || order(unique.into_par_iter(), selection))?;

        Ok(Self::finish(
            n,
            list.labels().to_vec(),
            edges,
            selection,
            total,
            self_loops + out_of_domain,
        ))
    }

    fn finish(
        node_count: usize,
        labels: Vec<String>,
        edges: Vec<CandidateEdge>,
        selection: Selection,
        total: usize,
        excluded: usize,
    ) -> Self {
        let approximate = matches!(selection, Selection::Top(k) if k < total);
        log::info!(
            "Candidate index: {} edges over {} nodes{}",
            edges.len(),
            node_count,
            if approximate { " (top-K approximation)" } else { "" }
        );
        Self {
            node_count,
            labels,
            edges,
            approximate,
            excluded,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn edges(&self) -> &[CandidateEdge] {
        &self.edges
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateEdge> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// True when only the top K candidates were kept
    pub fn is_approximate(&self) -> bool {
        self.approximate
    }

    /// Candidates dropped as non-finite, out of domain, or self-loops
    pub fn excluded(&self) -> usize {
        self.excluded
    }
}

fn admissible(weight: f64, min_weight: Option<f64>) -> bool {
    weight.is_finite() && min_weight.map_or(true, |min| weight >= min)
}

/// Resolve the candidate policy against the memory guard
fn select(total: usize, n: usize, config: &PmfgConfig) -> Result<Selection> {
    let budget = edge_budget(n).max(1);
    match config.candidates {
        CandidatePolicy::TopK { multiple } => Ok(Selection::Top(multiple.saturating_mul(budget))),
        CandidatePolicy::Exhaustive => match config.max_candidates {
            Some(limit) if total > limit => {
                if config.fallback_to_top_k {
                    let k = DEFAULT_TOP_K_MULTIPLE.saturating_mul(budget);
                    log::warn!(
                        "{} candidates exceed the limit of {}; keeping only the top {} (approximation)",
                        total,
                        limit,
                        k
                    );
                    Ok(Selection::Top(k))
                } else {
                    Err(PmfgError::ResourceLimit {
                        required: total,
                        limit,
                    })
                }
            }
            _ => Ok(Selection::All),
        },
    }
}

fn order<I>(scan: I, selection: Selection) -> Vec<CandidateEdge>
where
    I: ParallelIterator<Item = CandidateEdge>,
{
    match selection {
        Selection::All => {
            let mut edges: Vec<CandidateEdge> = scan.collect();
            edges.par_sort_unstable_by(CandidateEdge::rank);
            edges
        }
        Selection::Top(k) => scan
            .fold(
                || BoundedHeap::new(k),
                |mut heap, edge| {
                    heap.push(edge);
                    heap
                },
            )
            .reduce(
                || BoundedHeap::new(k),
                |mut left, right| {
                    left.merge(right);
                    left
                },
            )
            .into_sorted(),
    }
}

fn install<T, F>(threads: Option<usize>, job: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match threads {
        Some(count) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(count)
                .build()
                .map_err(|err| PmfgError::invalid_config(err.to_string()))?;
            Ok(pool.install(job))
        }
        None => Ok(job()),
    }
}

/// Heap entry ordered by scan rank; the heap top is the worst kept edge
struct Ranked(CandidateEdge);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank(&other.0)
    }
}

/// Min-heap of the best `capacity` edges, `O(capacity)` memory
struct BoundedHeap {
    capacity: usize,
    heap: BinaryHeap<Ranked>,
}

impl BoundedHeap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::new(),
        }
    }

    fn push(&mut self, edge: CandidateEdge) {
        if self.heap.len() < self.capacity {
            self.heap.push(Ranked(edge));
            return;
        }
        let better = self
            .heap
            .peek()
            .map_or(false, |worst| edge.rank(&worst.0) == Ordering::Less);
        if better {
            self.heap.pop();
            self.heap.push(Ranked(edge));
        }
    }

    fn merge(&mut self, other: BoundedHeap) {
        for Ranked(edge) in other.heap {
            self.push(edge);
        }
    }

    fn into_sorted(self) -> Vec<CandidateEdge> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Ranked(edge)| edge)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn example_matrix() -> WeightMatrix {
        let rows = vec![
            vec![0.0, 0.9, 0.8, 0.1],
            vec![0.9, 0.0, 0.7, 0.6],
            vec![0.8, 0.7, 0.0, 0.95],
            vec![0.1, 0.6, 0.95, 0.0],
        ];
        WeightMatrix::unlabeled(rows, 1e-9).unwrap()
    }

    fn pairs(index: &CandidateEdgeIndex) -> Vec<(usize, usize)> {
        index.iter().map(|e| (e.source, e.target)).collect()
    }

    #[test]
    fn test_descending_order() {
        let index = CandidateEdgeIndex::from_matrix(&example_matrix(), &PmfgConfig::default()).unwrap();
        assert_eq!(index.len(), 6);
        assert_eq!(
            pairs(&index),
            vec![(2, 3), (0, 1), (0, 2), (1, 2), (1, 3), (0, 3)]
        );
        assert!(!index.is_approximate());
    }

    #[test]
    fn test_ties_break_by_pair() {
        let rows = vec![vec![0.0; 4]; 4];
        let matrix = WeightMatrix::unlabeled(rows, 1e-9).unwrap();
        let index = CandidateEdgeIndex::from_matrix(&matrix, &PmfgConfig::default()).unwrap();
        assert_eq!(
            pairs(&index),
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
        );
    }

    #[test]
    fn test_min_weight_excludes() {
        let config = PmfgConfig::default().with_min_weight(0.65);
        let index = CandidateEdgeIndex::from_matrix(&example_matrix(), &config).unwrap();
        assert_eq!(pairs(&index), vec![(2, 3), (0, 1), (0, 2), (1, 2)]);
        assert_eq!(index.excluded(), 2);
    }

    #[test]
    fn test_min_weight_excludes_under_top_k() {
        let config = PmfgConfig::default()
            .with_min_weight(0.65)
            .with_candidates(CandidatePolicy::TopK { multiple: 1 });
        let index = CandidateEdgeIndex::from_matrix(&example_matrix(), &config).unwrap();
        // K = budget 6 covers the four admissible pairs
        assert_eq!(pairs(&index), vec![(2, 3), (0, 1), (0, 2), (1, 2)]);
        assert_eq!(index.excluded(), 2);
        assert!(!index.is_approximate());
    }

    #[test]
    fn test_top_k_is_prefix_of_full_order() {
        let n = 12;
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| (((i * j) % 7) + i + j) as f64).collect())
            .collect();
        let matrix = WeightMatrix::unlabeled(rows, 1e-9).unwrap();

        let full = CandidateEdgeIndex::from_matrix(&matrix, &PmfgConfig::default()).unwrap();
        let config = PmfgConfig::default()
            .with_candidates(CandidatePolicy::TopK { multiple: 1 })
            .with_threads(3);
        let top = CandidateEdgeIndex::from_matrix(&matrix, &config).unwrap();

        assert_eq!(top.len(), edge_budget(n));
        assert!(top.is_approximate());
        assert_eq!(top.edges(), &full.edges()[..top.len()]);
    }

    #[test]
    fn test_resource_limit() {
        let config = PmfgConfig::default().with_max_candidates(3, false);
        let err = CandidateEdgeIndex::from_matrix(&example_matrix(), &config).unwrap_err();
        assert!(matches!(
            err,
            PmfgError::ResourceLimit {
                required: 6,
                limit: 3
            }
        ));

        let config = PmfgConfig::default().with_max_candidates(3, true);
        let index = CandidateEdgeIndex::from_matrix(&example_matrix(), &config).unwrap();
        // 10 x budget covers all six pairs, so nothing is actually dropped
        assert_eq!(index.len(), 6);
    }

    #[test]
    fn test_single_node_has_no_candidates() {
        let matrix = WeightMatrix::unlabeled(vec![vec![1.0]], 1e-9).unwrap();
        let index = CandidateEdgeIndex::from_matrix(&matrix, &PmfgConfig::default()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.node_count(), 1);
    }

    #[test]
    fn test_edge_list_filtering() {
        let list = EdgeList::from_labeled(vec![
            ("a".to_string(), "b".to_string(), 0.5),
            ("b".to_string(), "a".to_string(), 0.8),
            ("a".to_string(), "a".to_string(), 1.0),
            ("b".to_string(), "c".to_string(), f64::NAN),
            ("c".to_string(), "a".to_string(), 0.3),
        ])
        .unwrap();
        assert_eq!(list.labels(), &["a", "b", "c"]);

        let index = CandidateEdgeIndex::from_edge_list(&list, &PmfgConfig::default()).unwrap();
        assert_eq!(
            index.edges(),
            &[CandidateEdge::new(0, 1, 0.8), CandidateEdge::new(0, 2, 0.3)]
        );
        assert_eq!(index.excluded(), 2);
    }

    #[test]
    fn test_edge_list_rejects_unknown_nodes() {
        let err = EdgeList::new(vec!["a".into()], vec![(0, 3, 1.0)]).unwrap_err();
        assert!(matches!(err, PmfgError::Input { .. }));
    }

    #[test]
    fn test_edge_list_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source,target,weight").unwrap();
        writeln!(file, "x,y,0.25").unwrap();
        writeln!(file, "y,z,oops").unwrap();
        writeln!(file, "z,x,0.75").unwrap();

        let list = EdgeList::from_csv(file.path()).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.labels(), &["x", "y", "z"]);
        assert_eq!(list.edges()[1], (2, 0, 0.75));
    }
}

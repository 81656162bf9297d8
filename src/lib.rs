//! Planar Maximally Filtered Graphs.
//!
//! Turns a dense symmetric proximity matrix (or a pre-extracted weighted
//! edge list) into the sparse planar subgraph obtained by greedily keeping
//! the heaviest edges that preserve planarity:
//!
//! ```text
//! WeightMatrix -> CandidateEdgeIndex -> PmfgBuilder (PlanarityState) -> ResultGraph
//! ```

pub mod builder;
pub mod config;
pub mod edges;
pub mod error;
pub mod matrix;
pub mod planarity;
pub mod result;

pub use builder::{CancellationToken, Phase, PmfgBuilder};
pub use config::{CandidatePolicy, PmfgConfig};
pub use edges::{CandidateEdge, CandidateEdgeIndex, EdgeList};
pub use error::{PmfgError, Result};
pub use matrix::WeightMatrix;
pub use planarity::{Admission, PlanarityState};
pub use result::{GraphStats, ResultGraph};

/// Maximum number of edges the filtered graph may hold: `3n - 6` for
/// `n >= 3`, a spanning tree below that.
pub fn edge_budget(node_count: usize) -> usize {
    if node_count >= 3 {
        3 * node_count - 6
    } else {
        node_count.saturating_sub(1)
    }
}

/// Build the PMFG of a validated weight matrix
pub fn filter_matrix(matrix: &WeightMatrix, config: &PmfgConfig) -> Result<ResultGraph> {
    let index = CandidateEdgeIndex::from_matrix(matrix, config)?;
    PmfgBuilder::new(&index, config).run()
}

/// Build the PMFG of an edge list, after the same filtering and ordering a
/// matrix scan gets
pub fn filter_edge_list(list: &EdgeList, config: &PmfgConfig) -> Result<ResultGraph> {
    let index = CandidateEdgeIndex::from_edge_list(list, config)?;
    PmfgBuilder::new(&index, config).run()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let env = env_logger::Env::default().default_filter_or("debug");
            let _ = env_logger::Builder::from_env(env).is_test(true).try_init();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::init;

    #[test]
    fn test_edge_budget() {
        assert_eq!(edge_budget(0), 0);
        assert_eq!(edge_budget(1), 0);
        assert_eq!(edge_budget(2), 1);
        assert_eq!(edge_budget(3), 3);
        assert_eq!(edge_budget(4), 6);
        assert_eq!(edge_budget(100), 294);
    }

    #[test]
    fn test_filter_edge_list_with_labels() {
        init();
        let rows = vec![
            ("fr", "de", 0.9),
            ("de", "it", 0.8),
            ("it", "fr", 0.7),
            ("fr", "es", 0.6),
            ("es", "it", 0.5),
            ("es", "de", 0.4),
            ("de", "fr", 0.2),
            ("es", "es", 1.0),
        ];
        let list = EdgeList::from_labeled(
            rows.into_iter()
                .map(|(a, b, w)| (a.to_string(), b.to_string(), w)),
        )
        .unwrap();

        let result = filter_edge_list(&list, &PmfgConfig::default()).unwrap();
        assert_eq!(result.labels(), &["fr", "de", "it", "es"]);
        assert_eq!(result.edge_count(), 6);
        // the duplicate (de, fr) keeps 0.9
        assert_eq!(result.edges()[0].weight, 0.9);
        assert_eq!(result.stats().components, 1);
    }

    #[test]
    fn test_filter_matrix_top_k_marks_approximation() {
        init();
        let n = 10;
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { 0.0 } else { 1.0 / (1 + i + j) as f64 })
                    .collect()
            })
            .collect();
        let matrix = WeightMatrix::unlabeled(rows, 1e-9).unwrap();

        let config = PmfgConfig::default().with_candidates(CandidatePolicy::TopK { multiple: 1 });
        let result = filter_matrix(&matrix, &config).unwrap();
        assert!(result.stats().approximate);
        assert!(result.edge_count() <= edge_budget(n));

        let exact = filter_matrix(&matrix, &PmfgConfig::default()).unwrap();
        assert!(!exact.stats().approximate);
        assert_eq!(exact.edge_count(), edge_budget(n));
    }
}

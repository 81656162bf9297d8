//! The finished filtered graph and its statistics.

use petgraph::algo::{dijkstra, kosaraju_scc};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::edge_budget;
use crate::edges::CandidateEdge;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub tree_edge_count: usize,
    pub edge_budget: usize,
    /// `edges / (3n - 6)`, 0 when the budget is 0
    pub budget_utilization: f64,
    /// `edges / (n(n-1)/2)`, 0 for a single node
    pub density: f64,
    pub average_degree: f64,
    /// Population standard deviation of the degrees
    pub degree_std: f64,
    pub max_degree: usize,
    pub total_weight: f64,
    pub components: usize,
    /// Nodes in the largest connected component
    pub largest_component: usize,
    /// Mean hop distance over ordered node pairs; `None` unless connected
    pub average_path_length: Option<f64>,
    /// Longest shortest path in hops; `None` unless connected
    pub diameter: Option<usize>,
    pub average_clustering: f64,
    /// Built from a top-K candidate subset
    pub approximate: bool,
}

/// Committed edges in commit order with their original weights. The first
/// `tree_edge_count` edges are the spanning tree.
#[derive(Debug, Clone)]
pub struct ResultGraph {
    labels: Vec<String>,
    edges: Vec<CandidateEdge>,
    tree_edge_count: usize,
    degrees: Vec<usize>,
    stats: GraphStats,
}

#[derive(Serialize)]
struct EdgeRow<'a> {
    source: &'a str,
    target: &'a str,
    weight: f64,
}

#[derive(Serialize)]
struct DegreeRow<'a> {
    node: &'a str,
    degree: usize,
}

impl ResultGraph {
    pub fn new(
        labels: Vec<String>,
        edges: Vec<CandidateEdge>,
        tree_edge_count: usize,
        approximate: bool,
    ) -> Self {
        let n = labels.len();
        let mut degrees = vec![0; n];
        for edge in &edges {
            degrees[edge.source] += 1;
            degrees[edge.target] += 1;
        }

        let mut result = Self {
            labels,
            edges,
            tree_edge_count,
            degrees,
            stats: GraphStats::default(),
        };
        result.stats = result.compute_stats(approximate);
        result
    }

    fn compute_stats(&self, approximate: bool) -> GraphStats {
        let n = self.labels.len();
        let m = self.edges.len();
        let budget = edge_budget(n);
        let pairs = n * n.saturating_sub(1) / 2;
        let graph = self.to_graph();
        let average_degree = if n == 0 { 0.0 } else { 2.0 * m as f64 / n as f64 };
        let degree_std = if n == 0 {
            0.0
        } else {
            let variance = self
                .degrees
                .iter()
                .map(|&d| (d as f64 - average_degree).powi(2))
                .sum::<f64>()
                / n as f64;
            variance.sqrt()
        };
        let components = kosaraju_scc(&graph);
        let largest_component = components.iter().map(Vec::len).max().unwrap_or(0);
        let (average_path_length, diameter) = if components.len() == 1 {
            let (total, longest) = path_lengths(&graph);
            let ordered = n * n.saturating_sub(1);
            let average = if ordered == 0 { 0.0 } else { total as f64 / ordered as f64 };
            (Some(average), Some(longest))
        } else {
            (None, None)
        };

        let stats = GraphStats {
            node_count: n,
            edge_count: m,
            tree_edge_count: self.tree_edge_count,
            edge_budget: budget,
            budget_utilization: if budget == 0 { 0.0 } else { m as f64 / budget as f64 },
            density: if pairs == 0 { 0.0 } else { m as f64 / pairs as f64 },
            average_degree,
            degree_std,
            max_degree: self.degrees.iter().copied().max().unwrap_or(0),
            total_weight: self.edges.iter().map(|e| e.weight).sum(),
            components: components.len(),
            largest_component,
            average_path_length,
            diameter,
            average_clustering: average_clustering(&graph),
            approximate,
        };
        if stats.components > 1 {
            log::warn!(
                "Filtered graph has {} connected components, the largest with {} nodes",
                stats.components,
                stats.largest_component
            );
        }
        stats
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn edges(&self) -> &[CandidateEdge] {
        &self.edges
    }

    pub fn tree_edges(&self) -> &[CandidateEdge] {
        &self.edges[..self.tree_edge_count]
    }

    pub fn degrees(&self) -> &[usize] {
        &self.degrees
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Node weights are the labels, edge weights the original proximities
    pub fn to_graph(&self) -> UnGraph<String, f64> {
        let mut graph = UnGraph::with_capacity(self.labels.len(), self.edges.len());
        for label in &self.labels {
            graph.add_node(label.clone());
        }
        for edge in &self.edges {
            graph.add_edge(
                NodeIndex::new(edge.source),
                NodeIndex::new(edge.target),
                edge.weight,
            );
        }
        graph
    }

    /// `n x n` 0/1 matrix with the input labels on both axes
    pub fn write_adjacency_matrix<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let n = self.labels.len();
        let mut neighbours = vec![Vec::new(); n];
        for edge in &self.edges {
            neighbours[edge.source].push(edge.target);
            neighbours[edge.target].push(edge.source);
        }

        let mut writer = csv::Writer::from_path(path)?;
        let mut header = Vec::with_capacity(n + 1);
        header.push("");
        header.extend(self.labels.iter().map(String::as_str));
        writer.write_record(&header)?;

        let mut row = vec!["0"; n + 1];
        for (i, label) in self.labels.iter().enumerate() {
            row[0] = label.as_str();
            for &j in &neighbours[i] {
                row[j + 1] = "1";
            }
            writer.write_record(&row)?;
            for &j in &neighbours[i] {
                row[j + 1] = "0";
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// `source,target,weight` in commit order
    pub fn write_edge_list<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for edge in &self.edges {
            writer.serialize(EdgeRow {
                source: &self.labels[edge.source],
                target: &self.labels[edge.target],
                weight: edge.weight,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_degrees<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (label, &degree) in self.labels.iter().zip(&self.degrees) {
            writer.serialize(DegreeRow {
                node: label,
                degree,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_summary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.stats)?;
        Ok(())
    }

    /// GraphML with the labels as node data and the proximities as edge
    /// weights
    pub fn write_graphml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#)?;
        writeln!(out, r#"  <key id="label" for="node" attr.name="label" attr.type="string"/>"#)?;
        writeln!(out, r#"  <key id="weight" for="edge" attr.name="weight" attr.type="double"/>"#)?;
        writeln!(out, r#"  <graph edgedefault="undirected">"#)?;
        for (i, label) in self.labels.iter().enumerate() {
            writeln!(
                out,
                r#"    <node id="n{}"><data key="label">{}</data></node>"#,
                i,
                escape_xml(label)
            )?;
        }
        for edge in &self.edges {
            writeln!(
                out,
                r#"    <edge source="n{}" target="n{}"><data key="weight">{}</data></edge>"#,
                edge.source, edge.target, edge.weight
            )?;
        }
        writeln!(out, "  </graph>")?;
        writeln!(out, "</graphml>")?;
        out.flush()?;
        Ok(())
    }

    pub fn export_to_graphviz<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let graph = self.to_graph();
        let viz = Dot::with_attr_getters(
            &graph,
            &[Config::EdgeNoLabel, Config::NodeNoLabel],
            &|_, edge| format!("label=\"{:.3}\"", edge.weight()),
            &|_, (_, label)| format!("label=\"{}\"", label.replace('"', "\\\"")),
        );

        std::fs::write(path, format!("{:?}", viz))?;
        Ok(())
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Sum of hop distances over ordered reachable pairs, and the longest one
fn path_lengths(graph: &UnGraph<String, f64>) -> (usize, usize) {
    let mut total = 0;
    let mut longest = 0;
    for start in graph.node_indices() {
        for &hops in dijkstra(graph, start, None, |_| 1usize).values() {
            total += hops;
            longest = longest.max(hops);
        }
    }
    (total, longest)
}

// Fraction of neighbour pairs that are themselves adjacent
fn clustering_coefficient(graph: &UnGraph<String, f64>, node: NodeIndex) -> f64 {
    let neighbors: Vec<_> = graph.neighbors(node).collect();
    if neighbors.len() < 2 {
        return 0.0;
    }

    let mut edges_between_neighbors = 0;
    for (i, &ni) in neighbors.iter().enumerate() {
        for &nj in &neighbors[i + 1..] {
            if graph.contains_edge(ni, nj) {
                edges_between_neighbors += 1;
            }
        }
    }

    let total_possible_edges = neighbors.len() * (neighbors.len() - 1) / 2;
    edges_between_neighbors as f64 / total_possible_edges as f64
}

fn average_clustering(graph: &UnGraph<String, f64>) -> f64 {
    if graph.node_count() == 0 {
        return 0.0;
    }
    let total: f64 = graph
        .node_indices()
        .map(|node| clustering_coefficient(graph, node))
        .sum();
    total / graph.node_count() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        ["a", "b", "c", "d", "e"][..n].iter().map(|s| s.to_string()).collect()
    }

    fn k4() -> ResultGraph {
        let edges = vec![
            CandidateEdge::new(2, 3, 0.95),
            CandidateEdge::new(0, 1, 0.9),
            CandidateEdge::new(0, 2, 0.8),
            CandidateEdge::new(1, 2, 0.7),
            CandidateEdge::new(1, 3, 0.6),
            CandidateEdge::new(0, 3, 0.1),
        ];
        ResultGraph::new(labels(4), edges, 3, false)
    }

    #[test]
    fn test_k4_stats() {
        let result = k4();
        let stats = result.stats();
        assert_eq!(stats.edge_count, 6);
        assert_eq!(stats.edge_budget, 6);
        assert_eq!(stats.density, 1.0);
        assert_eq!(stats.budget_utilization, 1.0);
        assert_eq!(stats.average_degree, 3.0);
        assert_eq!(stats.max_degree, 3);
        assert_eq!(stats.components, 1);
        assert_eq!(stats.largest_component, 4);
        assert_eq!(stats.degree_std, 0.0);
        assert_eq!(stats.average_path_length, Some(1.0));
        assert_eq!(stats.diameter, Some(1));
        assert_eq!(stats.average_clustering, 1.0);
        assert!((stats.total_weight - 4.05).abs() < 1e-9);
        assert_eq!(result.degrees(), &[3, 3, 3, 3]);
        assert_eq!(result.tree_edges().len(), 3);
    }

    #[test]
    fn test_degree_sum_and_clustering() {
        // triangle a-b-c with pendant d on c, isolated e
        let edges = vec![
            CandidateEdge::new(0, 1, 1.0),
            CandidateEdge::new(1, 2, 1.0),
            CandidateEdge::new(2, 3, 1.0),
            CandidateEdge::new(0, 2, 1.0),
        ];
        let result = ResultGraph::new(labels(5), edges, 3, true);
        let stats = result.stats();

        assert_eq!(result.degrees().iter().sum::<usize>(), 2 * stats.edge_count);
        assert_eq!(stats.components, 2);
        assert_eq!(stats.largest_component, 4);
        assert_eq!(stats.average_path_length, None);
        assert_eq!(stats.diameter, None);
        // degrees 2, 2, 3, 1, 0 around a mean of 1.6
        assert!((stats.degree_std - 1.04f64.sqrt()).abs() < 1e-12);
        // c has neighbours a, b, d with one edge among them
        let expected = (1.0 + 1.0 + 1.0 / 3.0) / 5.0;
        assert!((stats.average_clustering - expected).abs() < 1e-12);
        assert!((stats.density - 0.4).abs() < 1e-12);
        assert!(stats.approximate);
    }

    #[test]
    fn test_path_distances() {
        let edges = vec![
            CandidateEdge::new(0, 1, 1.0),
            CandidateEdge::new(1, 2, 1.0),
            CandidateEdge::new(2, 3, 1.0),
        ];
        let stats = ResultGraph::new(labels(4), edges, 3, false).stats().clone();
        // unordered hop counts 1, 1, 1, 2, 2, 3
        assert!((stats.average_path_length.unwrap() - 10.0 / 6.0).abs() < 1e-12);
        assert_eq!(stats.diameter, Some(3));
        assert_eq!(stats.largest_component, 4);
    }

    #[test]
    fn test_graphml_escapes_labels() {
        let dir = tempfile::tempdir().unwrap();
        let labels = vec!["R&D".to_string(), "<b>".to_string()];
        let result = ResultGraph::new(labels, vec![CandidateEdge::new(0, 1, 0.5)], 1, false);

        let path = dir.path().join("graph.graphml");
        result.write_graphml(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#"<graph edgedefault="undirected">"#));
        assert!(text.contains(r#"<node id="n0"><data key="label">R&amp;D</data></node>"#));
        assert!(text.contains("&lt;b&gt;"));
        assert!(text.contains(r#"<edge source="n0" target="n1"><data key="weight">0.5</data></edge>"#));
        assert!(text.trim_end().ends_with("</graphml>"));
    }

    #[test]
    fn test_single_node_stats() {
        let result = ResultGraph::new(labels(1), Vec::new(), 0, false);
        assert_eq!(result.stats().density, 0.0);
        assert_eq!(result.stats().budget_utilization, 0.0);
        assert_eq!(result.stats().components, 1);
        assert_eq!(result.stats().diameter, Some(0));
        assert_eq!(result.stats().average_path_length, Some(0.0));
    }

    #[test]
    fn test_writers() {
        let dir = tempfile::tempdir().unwrap();
        let result = k4();

        let adjacency = dir.path().join("adjacency.csv");
        result.write_adjacency_matrix(&adjacency).unwrap();
        let text = std::fs::read_to_string(&adjacency).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ",a,b,c,d");
        assert_eq!(lines[1], "a,0,1,1,1");
        assert_eq!(lines.len(), 5);

        let edges = dir.path().join("edges.csv");
        result.write_edge_list(&edges).unwrap();
        let text = std::fs::read_to_string(&edges).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "source,target,weight");
        assert_eq!(lines[1], "c,d,0.95");
        assert_eq!(lines.len(), 7);

        let degrees = dir.path().join("degrees.csv");
        result.write_degrees(&degrees).unwrap();
        let text = std::fs::read_to_string(&degrees).unwrap();
        assert_eq!(text.lines().next(), Some("node,degree"));
        assert!(text.contains("b,3"));

        let summary = dir.path().join("summary.json");
        result.write_summary(&summary).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
        assert_eq!(value["edge_count"], 6);
        assert_eq!(value["approximate"], false);

        let dot = dir.path().join("graph.dot");
        result.export_to_graphviz(&dot).unwrap();
        let text = std::fs::read_to_string(&dot).unwrap();
        assert!(text.starts_with("graph {"));
        assert!(text.contains("label=\"d\""));
        assert!(text.contains("label=\"0.950\""));
    }
}

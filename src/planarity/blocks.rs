//! Biconnected blocks and paths in the block-cut tree.
//!
//! A graph is planar iff each of its blocks is. An edge `u -- v` inside one
//! component merges exactly the blocks on the block-cut path from `u` to
//! `v`, so only that union has to be re-tested.
//!
//! Inside a single block the forest also answers the questions that decide
//! whether the embedding of `u` and `v` is forced: whether the block is
//! 3-connected (cached per block) and whether two vertices are joined by
//! three internally disjoint paths.

use std::cell::OnceCell;
use std::collections::VecDeque;

use super::embedding::RotationSystem;

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub vertices: Vec<usize>,
    pub edges: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockForest {
    blocks: Vec<Block>,
    membership: Vec<Vec<usize>>,
    /// Index of each vertex inside each block of `membership`
    slots: Vec<Vec<usize>>,
    /// 3-connectivity per block. Adding edges never breaks it, so only a
    /// negative answer is forgotten when a block grows.
    rigid: Vec<OnceCell<bool>>,
}

const UNSEEN: usize = usize::MAX;

impl BlockForest {
    /// Hopcroft-Tarjan decomposition of the graph given by `adjacency`
    pub fn new(adjacency: &[Vec<usize>]) -> Self {
        let n = adjacency.len();
        let mut forest = Self {
            blocks: Vec::new(),
            membership: vec![Vec::new(); n],
            slots: vec![Vec::new(); n],
            rigid: Vec::new(),
        };

        let mut disc = vec![UNSEEN; n];
        let mut low = vec![0usize; n];
        let mut timer = 0;
        let mut edge_stack: Vec<(usize, usize)> = Vec::new();
        let mut marker = vec![UNSEEN; n];

        for root in 0..n {
            if disc[root] != UNSEEN || adjacency[root].is_empty() {
                continue;
            }
            disc[root] = timer;
            low[root] = timer;
            timer += 1;

            // (vertex, parent, next neighbour index)
            let mut stack = vec![(root, UNSEEN, 0usize)];
            while let Some(&(v, parent, next)) = stack.last() {
                let top = stack.len() - 1;
                if next < adjacency[v].len() {
                    stack[top].2 += 1;
                    let w = adjacency[v][next];
                    if disc[w] == UNSEEN {
                        disc[w] = timer;
                        low[w] = timer;
                        timer += 1;
                        edge_stack.push((v, w));
                        stack.push((w, v, 0));
                    } else if w != parent && disc[w] < disc[v] {
                        edge_stack.push((v, w));
                        low[v] = low[v].min(disc[w]);
                    }
                    continue;
                }

                stack.pop();
                if parent == UNSEEN {
                    continue;
                }
                low[parent] = low[parent].min(low[v]);
                if low[v] >= disc[parent] {
                    forest.close_block(parent, v, &mut edge_stack, &mut marker);
                }
            }
        }

        log::debug!("Block decomposition: {} blocks", forest.blocks.len());
        forest
    }

    fn close_block(
        &mut self,
        parent: usize,
        child: usize,
        edge_stack: &mut Vec<(usize, usize)>,
        marker: &mut [usize],
    ) {
        let id = self.blocks.len();
        let mut block = Block::default();
        while let Some((a, b)) = edge_stack.pop() {
            for x in [a, b] {
                if marker[x] != id {
                    marker[x] = id;
                    self.membership[x].push(id);
                    self.slots[x].push(block.vertices.len());
                    block.vertices.push(x);
                }
            }
            block.edges.push(if a < b { (a, b) } else { (b, a) });
            if (a, b) == (parent, child) {
                break;
            }
        }
        self.blocks.push(block);
        self.rigid.push(OnceCell::new());
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: usize) -> &Block {
        &self.blocks[id]
    }

    /// Blocks containing `v` (more than one iff `v` is a cut vertex)
    pub fn blocks_of(&self, v: usize) -> &[usize] {
        &self.membership[v]
    }

    pub fn common_block(&self, u: usize, v: usize) -> Option<usize> {
        self.membership[u]
            .iter()
            .copied()
            .find(|b| self.membership[v].contains(b))
    }

    /// Blocks on the block-cut tree path from `u` to `v`, or `None` when
    /// they lie in different components
    pub fn path(&self, u: usize, v: usize) -> Option<Vec<usize>> {
        if let Some(block) = self.common_block(u, v) {
            return Some(vec![block]);
        }

        // Node ids: vertices 0..n, blocks n..n+b
        let n = self.membership.len();
        let mut parent = vec![UNSEEN; n + self.blocks.len()];
        parent[u] = u;
        let mut queue = VecDeque::from([u]);
        while let Some(node) = queue.pop_front() {
            if node == v {
                break;
            }
            let next: Vec<usize> = if node < n {
                self.membership[node].iter().map(|b| n + b).collect()
            } else {
                self.blocks[node - n].vertices.clone()
            };
            for x in next {
                if parent[x] == UNSEEN {
                    parent[x] = node;
                    queue.push_back(x);
                }
            }
        }

        if parent[v] == UNSEEN {
            return None;
        }
        let mut blocks = Vec::new();
        let mut node = v;
        while node != u {
            if node >= n {
                blocks.push(node - n);
            }
            node = parent[node];
        }
        blocks.reverse();
        Some(blocks)
    }

    /// `(vertices, edges)` of the union of consecutive path blocks.
    /// Neighbouring blocks share exactly one cut vertex.
    pub fn span_size(&self, path: &[usize]) -> (usize, usize) {
        let vertices: usize = path.iter().map(|&b| self.blocks[b].vertices.len()).sum();
        let edges = path.iter().map(|&b| self.blocks[b].edges.len()).sum();
        (vertices + 1 - path.len().max(1), edges)
    }

    pub fn span_edges<'a>(
        &'a self,
        path: &'a [usize],
    ) -> impl Iterator<Item = (usize, usize)> + 'a {
        path.iter()
            .flat_map(move |&b| self.blocks[b].edges.iter().copied())
    }

    /// Record an edge added inside an existing block
    pub fn extend_block(&mut self, id: usize, u: usize, v: usize) {
        self.blocks[id].edges.push(if u < v { (u, v) } else { (v, u) });
        if self.rigid[id].get() != Some(&true) {
            self.rigid[id] = OnceCell::new();
        }
    }

    /// Whether block `id` is 3-connected, computed from `embedding` on first
    /// use and cached
    pub fn is_rigid(&self, id: usize, embedding: &RotationSystem) -> bool {
        *self.rigid[id].get_or_init(|| {
            let rigid = embedding.is_triconnected(&self.blocks[id].vertices);
            if rigid {
                log::debug!(
                    "Block {} ({} vertices) is 3-connected",
                    id,
                    self.blocks[id].vertices.len()
                );
            }
            rigid
        })
    }

    fn slot(&self, v: usize, id: usize) -> Option<usize> {
        let k = self.membership.get(v)?.iter().position(|&b| b == id)?;
        Some(self.slots[v][k])
    }

    /// Internally vertex-disjoint `u`-`v` paths inside block `id`, counted
    /// up to `limit`. Fewer than three means some pair of vertices other
    /// than `u` and `v` separates them.
    pub fn disjoint_paths(&self, id: usize, u: usize, v: usize, limit: usize) -> usize {
        let (source, sink) = match (self.slot(u, id), self.slot(v, id)) {
            (Some(source), Some(sink)) => (source, sink),
            _ => return 0,
        };
        let block = &self.blocks[id];
        let mut network = SplitNetwork::new(block.vertices.len(), source, sink, limit);
        for &(a, b) in &block.edges {
            if let (Some(a), Some(b)) = (self.slot(a, id), self.slot(b, id)) {
                network.add_edge(a, b);
            }
        }
        network.max_flow(limit)
    }
}

/// Unit-capacity flow network with every vertex split into an `in` node
/// `2x` and an `out` node `2x + 1`, so a flow is a set of internally
/// vertex-disjoint paths
struct SplitNetwork {
    heads: Vec<Vec<usize>>,
    to: Vec<usize>,
    capacity: Vec<usize>,
    source: usize,
    sink: usize,
}

impl SplitNetwork {
    fn new(vertices: usize, source: usize, sink: usize, limit: usize) -> Self {
        let mut network = Self {
            heads: vec![Vec::new(); 2 * vertices],
            to: Vec::new(),
            capacity: Vec::new(),
            source: 2 * source + 1,
            sink: 2 * sink,
        };
        for x in 0..vertices {
            let through = if x == source || x == sink { limit } else { 1 };
            network.add_arc(2 * x, 2 * x + 1, through);
        }
        network
    }

    fn add_arc(&mut self, from: usize, to: usize, capacity: usize) {
        self.heads[from].push(self.to.len());
        self.to.push(to);
        self.capacity.push(capacity);
        self.heads[to].push(self.to.len());
        self.to.push(from);
        self.capacity.push(0);
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        self.add_arc(2 * a + 1, 2 * b, 1);
        self.add_arc(2 * b + 1, 2 * a, 1);
    }

    /// Augment along BFS paths until `limit` units flow or none is left
    fn max_flow(&mut self, limit: usize) -> usize {
        let mut flow = 0;
        while flow < limit {
            let mut via = vec![UNSEEN; self.heads.len()];
            via[self.source] = self.to.len();
            let mut queue = VecDeque::from([self.source]);
            while let Some(node) = queue.pop_front() {
                if node == self.sink {
                    break;
                }
                for &arc in &self.heads[node] {
                    let next = self.to[arc];
                    if self.capacity[arc] > 0 && via[next] == UNSEEN {
                        via[next] = arc;
                        queue.push_back(next);
                    }
                }
            }
            if via[self.sink] == UNSEEN {
                break;
            }

            let mut node = self.sink;
            while node != self.source {
                let arc = via[node];
                self.capacity[arc] -= 1;
                self.capacity[arc ^ 1] += 1;
                node = self.to[arc ^ 1];
            }
            flow += 1;
        }
        flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); n];
        for &(a, b) in edges {
            adj[a].push(b);
            adj[b].push(a);
        }
        adj
    }

    #[test]
    fn test_bowtie_has_two_blocks() {
        // two triangles sharing vertex 2
        let edges = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 2)];
        let forest = BlockForest::new(&adjacency(5, &edges));
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.blocks_of(2).len(), 2);
        assert_eq!(forest.blocks_of(0).len(), 1);
        for id in 0..2 {
            assert_eq!(forest.block(id).edges.len(), 3);
            assert_eq!(forest.block(id).vertices.len(), 3);
        }
    }

    #[test]
    fn test_path_blocks_are_edges() {
        let edges = [(0, 1), (1, 2), (2, 3)];
        let forest = BlockForest::new(&adjacency(5, &edges));
        assert_eq!(forest.len(), 3);

        let path = forest.path(0, 3).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(forest.span_size(&path), (4, 3));
        assert_eq!(forest.span_edges(&path).count(), 3);

        // vertex 4 is isolated
        assert!(forest.path(0, 4).is_none());
    }

    #[test]
    fn test_common_block_shortcut() {
        let edges = [(0, 1), (1, 2), (2, 0), (2, 3)];
        let forest = BlockForest::new(&adjacency(4, &edges));
        let path = forest.path(0, 2).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(forest.span_size(&path), (3, 3));

        let path = forest.path(0, 3).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(forest.span_size(&path), (4, 4));
    }

    #[test]
    fn test_disjoint_paths() {
        // triangular prism: 0-1-2 over 3-4-5
        let edges = [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (0, 3), (1, 4), (2, 5)];
        let forest = BlockForest::new(&adjacency(7, &edges));
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.disjoint_paths(0, 0, 4, 3), 3);
        assert_eq!(forest.disjoint_paths(0, 0, 4, 2), 2);
        assert_eq!(forest.disjoint_paths(0, 0, 6, 3), 0);

        let cycle: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let forest = BlockForest::new(&adjacency(6, &cycle));
        assert_eq!(forest.disjoint_paths(0, 0, 3, 3), 2);
    }

    #[test]
    fn test_cycle_is_one_block() {
        let edges: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let mut forest = BlockForest::new(&adjacency(6, &edges));
        assert_eq!(forest.len(), 1);
        forest.extend_block(0, 0, 3);
        assert_eq!(forest.block(0).edges.len(), 7);
    }
}

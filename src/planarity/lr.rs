//! Left-right planarity test (de Fraysseix–Rosenstiehl, in Brandes'
//! formulation) with extraction of a planar rotation system.
//!
//! Linear in the size of the graph. All depth-first traversals are
//! iterative so deep DFS trees do not exhaust the call stack.
//!
//! ## Reference
//! - U. Brandes, "The Left-Right Planarity Test", 2009.

use super::embedding::RotationSystem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Interval {
    low: Option<usize>,
    high: Option<usize>,
}

impl Interval {
    fn edge(e: usize) -> Self {
        Self {
            low: Some(e),
            high: Some(e),
        }
    }

    fn is_empty(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }

    /// Some return edge in the interval returns above the lowpoint of `b`
    fn conflicting(&self, b: usize, lowpt: &[usize]) -> bool {
        self.high.map_or(false, |high| lowpt[high] > lowpt[b])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConflictPair {
    left: Interval,
    right: Interval,
}

impl ConflictPair {
    fn swap(&mut self) {
        std::mem::swap(&mut self.left, &mut self.right);
    }

    fn lowest(&self, lowpt: &[usize]) -> usize {
        match (self.left.low, self.right.low) {
            (Some(l), Some(r)) => lowpt[l].min(lowpt[r]),
            (Some(l), None) => lowpt[l],
            (None, Some(r)) => lowpt[r],
            (None, None) => usize::MAX,
        }
    }
}

/// State of one left-right run. Edges are addressed by their index in the
/// input list; each edge is oriented exactly once during the first DFS.
struct LeftRight {
    node_count: usize,
    source: Vec<usize>,
    target: Vec<usize>,
    incident: Vec<Vec<usize>>,

    oriented: Vec<bool>,
    height: Vec<Option<usize>>,
    parent_edge: Vec<Option<usize>>,
    roots: Vec<usize>,
    outgoing: Vec<Vec<usize>>,
    ordered: Vec<Vec<usize>>,

    lowpt: Vec<usize>,
    lowpt2: Vec<usize>,
    nesting_depth: Vec<i64>,

    refs: Vec<Option<usize>>,
    side: Vec<i64>,
    conflicts: Vec<ConflictPair>,
    stack_bottom: Vec<usize>,
    lowpt_edge: Vec<Option<usize>>,
}

impl LeftRight {
    fn new(node_count: usize, edges: &[(usize, usize)]) -> Self {
        let m = edges.len();
        let mut incident = vec![Vec::new(); node_count];
        for (e, &(a, b)) in edges.iter().enumerate() {
            incident[a].push(e);
            incident[b].push(e);
        }

        Self {
            node_count,
            source: edges.iter().map(|&(a, _)| a).collect(),
            target: edges.iter().map(|&(_, b)| b).collect(),
            incident,
            oriented: vec![false; m],
            height: vec![None; node_count],
            parent_edge: vec![None; node_count],
            roots: Vec::new(),
            outgoing: vec![Vec::new(); node_count],
            ordered: vec![Vec::new(); node_count],
            lowpt: vec![0; m],
            lowpt2: vec![0; m],
            nesting_depth: vec![0; m],
            refs: vec![None; m],
            side: vec![1; m],
            conflicts: Vec::new(),
            stack_bottom: vec![0; m],
            lowpt_edge: vec![None; m],
        }
    }

    fn other(&self, e: usize, v: usize) -> usize {
        if self.source[e] == v {
            self.target[e]
        } else {
            self.source[e]
        }
    }

    fn height_of(&self, v: usize) -> usize {
        self.height[v].unwrap_or(0)
    }

    /// Orientation, then the constraint phase. `false` means non-planar.
    fn run(&mut self) -> bool {
        let n = self.node_count;
        let m = self.source.len();
        if n > 2 && m > 3 * n - 6 {
            return false;
        }

        for v in 0..n {
            if self.height[v].is_none() {
                self.height[v] = Some(0);
                self.roots.push(v);
                self.orient(v);
            }
        }

        for v in 0..n {
            let mut by_depth = self.outgoing[v].clone();
            by_depth.sort_by_key(|&e| self.nesting_depth[e]);
            self.ordered[v] = by_depth;
        }

        let roots = self.roots.clone();
        roots.into_iter().all(|root| self.test(root))
    }

    fn orient(&mut self, root: usize) {
        let mut cursor = vec![0usize; self.node_count];
        let mut resumed = vec![false; self.source.len()];
        let mut stack = vec![root];

        'dfs: while let Some(v) = stack.pop() {
            let parent = self.parent_edge[v];
            let hv = self.height_of(v);

            while cursor[v] < self.incident[v].len() {
                let e = self.incident[v][cursor[v]];
                if !resumed[e] {
                    if self.oriented[e] {
                        cursor[v] += 1;
                        continue;
                    }
                    let w = self.other(e, v);
                    self.oriented[e] = true;
                    self.source[e] = v;
                    self.target[e] = w;
                    self.outgoing[v].push(e);
                    self.lowpt[e] = hv;
                    self.lowpt2[e] = hv;

                    match self.height[w] {
                        None => {
                            self.parent_edge[w] = Some(e);
                            self.height[w] = Some(hv + 1);
                            resumed[e] = true;
                            stack.push(v);
                            stack.push(w);
                            continue 'dfs;
                        }
                        Some(hw) => self.lowpt[e] = hw,
                    }
                }

                self.nesting_depth[e] = 2 * self.lowpt[e] as i64;
                if self.lowpt2[e] < hv {
                    // chordal
                    self.nesting_depth[e] += 1;
                }

                if let Some(pe) = parent {
                    if self.lowpt[e] < self.lowpt[pe] {
                        self.lowpt2[pe] = self.lowpt[pe].min(self.lowpt2[e]);
                        self.lowpt[pe] = self.lowpt[e];
                    } else if self.lowpt[e] > self.lowpt[pe] {
                        self.lowpt2[pe] = self.lowpt2[pe].min(self.lowpt[e]);
                    } else {
                        self.lowpt2[pe] = self.lowpt2[pe].min(self.lowpt2[e]);
                    }
                }
                cursor[v] += 1;
            }
        }
    }

    fn test(&mut self, root: usize) -> bool {
        let mut cursor = vec![0usize; self.node_count];
        let mut resumed = vec![false; self.source.len()];
        let mut stack = vec![root];

        'dfs: while let Some(v) = stack.pop() {
            let parent = self.parent_edge[v];
            let hv = self.height_of(v);

            while cursor[v] < self.ordered[v].len() {
                let ei = self.ordered[v][cursor[v]];
                let w = self.target[ei];
                if !resumed[ei] {
                    self.stack_bottom[ei] = self.conflicts.len();
                    if self.parent_edge[w] == Some(ei) {
                        resumed[ei] = true;
                        stack.push(v);
                        stack.push(w);
                        continue 'dfs;
                    }
                    self.lowpt_edge[ei] = Some(ei);
                    self.conflicts.push(ConflictPair {
                        left: Interval::default(),
                        right: Interval::edge(ei),
                    });
                }

                // integrate new return edges
                if self.lowpt[ei] < hv {
                    if let Some(pe) = parent {
                        if cursor[v] == 0 {
                            self.lowpt_edge[pe] = self.lowpt_edge[ei];
                        } else if !self.add_constraints(ei, pe) {
                            return false;
                        }
                    }
                }
                cursor[v] += 1;
            }

            if let Some(pe) = parent {
                self.remove_back_edges(pe);
            }
        }
        true
    }

    fn top_conflicting(&self, ei: usize) -> bool {
        self.conflicts.last().map_or(false, |top| {
            top.left.conflicting(ei, &self.lowpt) || top.right.conflicting(ei, &self.lowpt)
        })
    }

    fn add_constraints(&mut self, ei: usize, e: usize) -> bool {
        let mut p = ConflictPair::default();

        // merge return edges of ei into p.right
        loop {
            let Some(mut q) = self.conflicts.pop() else {
                break;
            };
            if !q.left.is_empty() {
                q.swap();
            }
            if !q.left.is_empty() {
                return false;
            }
            let above = q.right.low.map_or(false, |low| self.lowpt[low] > self.lowpt[e]);
            if above {
                if p.right.is_empty() {
                    p.right = q.right;
                } else if let Some(low) = p.right.low {
                    self.refs[low] = q.right.high;
                }
                p.right.low = q.right.low;
            } else if let Some(low) = q.right.low {
                // align
                self.refs[low] = self.lowpt_edge[e];
            }
            if self.conflicts.len() == self.stack_bottom[ei] {
                break;
            }
        }

        // merge conflicting return edges of earlier siblings into p.left
        while self.top_conflicting(ei) {
            let Some(mut q) = self.conflicts.pop() else {
                break;
            };
            if q.right.conflicting(ei, &self.lowpt) {
                q.swap();
            }
            if q.right.conflicting(ei, &self.lowpt) {
                return false;
            }
            if let Some(low) = p.right.low {
                self.refs[low] = q.right.high;
            }
            if q.right.low.is_some() {
                p.right.low = q.right.low;
            }

            if p.left.is_empty() {
                p.left = q.left;
            } else if let Some(low) = p.left.low {
                self.refs[low] = q.left.high;
            }
            p.left.low = q.left.low;
        }

        if !(p.left.is_empty() && p.right.is_empty()) {
            self.conflicts.push(p);
        }
        true
    }

    fn remove_back_edges(&mut self, e: usize) {
        let u = self.source[e];
        let hu = self.height_of(u);

        // drop entire conflict pairs returning to u
        while self
            .conflicts
            .last()
            .map_or(false, |top| top.lowest(&self.lowpt) == hu)
        {
            if let Some(p) = self.conflicts.pop() {
                if let Some(low) = p.left.low {
                    self.side[low] = -1;
                }
            }
        }

        // one more conflict pair to consider
        if let Some(mut p) = self.conflicts.pop() {
            while let Some(high) = p.left.high {
                if self.target[high] != u {
                    break;
                }
                p.left.high = self.refs[high];
            }
            if p.left.high.is_none() {
                if let Some(low) = p.left.low {
                    self.refs[low] = p.right.low;
                    self.side[low] = -1;
                    p.left.low = None;
                }
            }

            while let Some(high) = p.right.high {
                if self.target[high] != u {
                    break;
                }
                p.right.high = self.refs[high];
            }
            if p.right.high.is_none() {
                if let Some(low) = p.right.low {
                    self.refs[low] = p.left.low;
                    self.side[low] = -1;
                    p.right.low = None;
                }
            }
            self.conflicts.push(p);
        }

        // side of e is the side of a highest return edge
        if self.lowpt[e] < hu {
            if let Some(top) = self.conflicts.last() {
                let (hl, hr) = (top.left.high, top.right.high);
                self.refs[e] = match (hl, hr) {
                    (Some(l), None) => Some(l),
                    (Some(l), Some(r)) if self.lowpt[l] > self.lowpt[r] => Some(l),
                    _ => hr,
                };
            }
        }
    }

    /// Resolve the side of `e` through its reference chain
    fn sign(&mut self, e: usize) -> i64 {
        let mut chain = Vec::new();
        let mut current = e;
        while let Some(next) = self.refs[current] {
            chain.push(current);
            current = next;
        }
        let mut resolved = self.side[current];
        for &edge in chain.iter().rev() {
            self.side[edge] *= resolved;
            self.refs[edge] = None;
            resolved = self.side[edge];
        }
        self.side[e]
    }

    /// Turn a successful run into a rotation system
    fn embed(mut self) -> RotationSystem {
        for e in 0..self.source.len() {
            let sign = self.sign(e);
            self.nesting_depth[e] *= sign;
        }

        let n = self.node_count;
        let mut embedding = RotationSystem::new(n);
        for v in 0..n {
            let mut by_depth = self.outgoing[v].clone();
            by_depth.sort_by_key(|&e| self.nesting_depth[e]);

            let mut previous = None;
            for &e in &by_depth {
                let w = self.target[e];
                embedding.add_half_edge_cw(v, w, previous);
                previous = Some(w);
            }
            self.ordered[v] = by_depth;
        }

        let mut left_ref = vec![0usize; n];
        let mut right_ref = vec![0usize; n];
        let mut cursor = vec![0usize; n];
        for &root in &self.roots {
            let mut stack = vec![root];
            'dfs: while let Some(v) = stack.pop() {
                while cursor[v] < self.ordered[v].len() {
                    let ei = self.ordered[v][cursor[v]];
                    cursor[v] += 1;
                    let w = self.target[ei];

                    if self.parent_edge[w] == Some(ei) {
                        embedding.add_half_edge_first(w, v);
                        left_ref[v] = w;
                        right_ref[v] = w;
                        stack.push(v);
                        stack.push(w);
                        continue 'dfs;
                    }

                    if self.side[ei] == 1 {
                        embedding.add_half_edge_cw(w, v, Some(right_ref[w]));
                    } else {
                        embedding.add_half_edge_ccw(w, v, Some(left_ref[w]));
                        left_ref[w] = v;
                    }
                }
            }
        }
        embedding
    }
}

/// Planarity of the simple graph on `0..node_count` with the given edges
pub fn is_planar(node_count: usize, edges: &[(usize, usize)]) -> bool {
    LeftRight::new(node_count, edges).run()
}

/// A planar rotation system for the graph, or `None` if it is not planar
pub fn planar_embedding(node_count: usize, edges: &[(usize, usize)]) -> Option<RotationSystem> {
    let mut lr = LeftRight::new(node_count, edges);
    if lr.run() {
        Some(lr.embed())
    } else {
        None
    }
}

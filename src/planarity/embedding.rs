//! Combinatorial embedding as a rotation system.
//!
//! Each vertex keeps its neighbours in clockwise order; index 0 is the
//! "first" neighbour used while an embedding is being assembled. Faces are
//! the orbits of the half-edge successor `(v, w) -> (w, ccw_w(v))`.

use petgraph::unionfind::UnionFind;
use std::collections::{HashMap, HashSet};

/// Corner pair on a common face: inserting `u -- v` there splits the face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chord {
    pub u: usize,
    /// Neighbour of `u` that will precede `v` counter-clockwise
    pub after_u: usize,
    pub v: usize,
    /// Neighbour of `v` that will precede `u` counter-clockwise
    pub after_v: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationSystem {
    rotation: Vec<Vec<usize>>,
}

impl RotationSystem {
    pub fn new(node_count: usize) -> Self {
        Self {
            rotation: vec![Vec::new(); node_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.rotation.len()
    }

    pub fn edge_count(&self) -> usize {
        self.rotation.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// 0 for a node outside the embedding
    pub fn degree(&self, v: usize) -> usize {
        self.neighbors(v).len()
    }

    /// Neighbours of `v` in clockwise order
    pub fn neighbors(&self, v: usize) -> &[usize] {
        self.rotation.get(v).map_or(&[], Vec::as_slice)
    }

    fn position(&self, v: usize, w: usize) -> Option<usize> {
        position(&self.rotation, v, w)
    }

    /// Neighbour following `w` clockwise around `v`
    pub fn cw(&self, v: usize, w: usize) -> Option<usize> {
        let around = self.neighbors(v);
        self.position(v, w).map(|i| around[(i + 1) % around.len()])
    }

    /// Neighbour following `w` counter-clockwise around `v`
    pub fn ccw(&self, v: usize, w: usize) -> Option<usize> {
        let around = self.neighbors(v);
        self.position(v, w)
            .map(|i| around[(i + around.len() - 1) % around.len()])
    }

    /// Place `end` clockwise right after `reference` around `start`.
    /// Without a reference `start` must have no neighbours yet.
    pub(crate) fn add_half_edge_cw(&mut self, start: usize, end: usize, reference: Option<usize>) {
        match reference.and_then(|r| self.position(start, r)) {
            Some(i) => self.rotation[start].insert(i + 1, end),
            None => {
                debug_assert!(reference.is_none(), "reference {:?} is not a neighbour of {}", reference, start);
                self.rotation[start].push(end);
            }
        }
    }

    /// Place `end` counter-clockwise right after `reference` around `start`.
    /// Replacing the first neighbour makes `end` the new first neighbour.
    pub(crate) fn add_half_edge_ccw(&mut self, start: usize, end: usize, reference: Option<usize>) {
        match reference.and_then(|r| self.position(start, r)) {
            Some(i) => self.rotation[start].insert(i, end),
            None => {
                debug_assert!(reference.is_none(), "reference {:?} is not a neighbour of {}", reference, start);
                self.rotation[start].push(end);
            }
        }
    }

    pub(crate) fn add_half_edge_first(&mut self, start: usize, end: usize) {
        let first = self.rotation[start].first().copied();
        self.add_half_edge_ccw(start, end, first);
    }

    fn next_half_edge(&self, v: usize, i: usize) -> Option<(usize, usize)> {
        next_half_edge(&self.rotation, v, i)
    }

    /// Find a face on which both `u` and `v` lie. `None` if either has no
    /// neighbour yet.
    pub fn shared_face(&self, u: usize, v: usize) -> Option<Chord> {
        if v >= self.rotation.len() {
            return None;
        }
        let around_u = self.neighbors(u).len();
        for start in 0..around_u {
            let x = self.rotation[u][start];
            let after_u = self.rotation[u][(start + 1) % around_u];

            let (mut node, mut slot) = (u, start);
            loop {
                let (next, next_slot) = self.next_half_edge(node, slot)?;
                if next == v {
                    return Some(Chord {
                        u,
                        after_u,
                        v,
                        after_v: node,
                    });
                }
                node = next;
                slot = next_slot;
                if node == u && self.rotation[u][slot] == x {
                    break;
                }
            }
        }
        None
    }

    /// Insert the chord found by [`shared_face`](Self::shared_face)
    pub(crate) fn insert_chord(&mut self, chord: &Chord) {
        self.add_half_edge_ccw(chord.u, chord.v, Some(chord.after_u));
        self.add_half_edge_ccw(chord.v, chord.u, Some(chord.after_v));
    }

    /// Join two different components; any corners will do
    pub(crate) fn insert_bridge(&mut self, u: usize, v: usize) {
        let at_u = self.rotation[u].first().copied();
        let at_v = self.rotation[v].first().copied();
        self.add_half_edge_ccw(u, v, at_u);
        self.add_half_edge_ccw(v, u, at_v);
    }

    /// Number of face orbits, or `None` if the rotation is not symmetric
    pub fn face_count(&self) -> Option<usize> {
        label_faces(&self.rotation).map(|(_, faces)| faces)
    }

    /// Whether the biconnected block on `vertices` is 3-connected.
    ///
    /// The block inherits its embedding from this one. A biconnected plane
    /// graph on at least four vertices is 3-connected iff any two of its
    /// faces meet in at most one vertex or in exactly one common edge, so
    /// the test only compares faces that share a corner vertex.
    pub fn is_triconnected(&self, vertices: &[usize]) -> bool {
        if vertices.len() < 4 {
            return false;
        }
        let mut local = vec![UNMAPPED; self.rotation.len()];
        for (i, &x) in vertices.iter().enumerate() {
            match local.get_mut(x) {
                Some(slot) => *slot = i,
                None => return false,
            }
        }
        let rotation: Vec<Vec<usize>> = vertices
            .iter()
            .map(|&x| {
                self.rotation[x]
                    .iter()
                    .map(|&w| local[w])
                    .filter(|&w| w != UNMAPPED)
                    .collect()
            })
            .collect();

        let face_of = match label_faces(&rotation) {
            Some((face_of, _)) => face_of,
            None => return false,
        };

        let mut edge_faces = HashSet::new();
        for (v, around) in rotation.iter().enumerate() {
            for (i, &w) in around.iter().enumerate() {
                if v > w {
                    continue;
                }
                let j = match position(&rotation, w, v) {
                    Some(j) => j,
                    None => return false,
                };
                let (f, g) = (face_of[v][i], face_of[w][j]);
                if f == g {
                    // a face on both sides of an edge: not biconnected
                    return false;
                }
                edge_faces.insert((f.min(g), f.max(g)));
            }
        }

        let mut meetings: HashMap<(usize, usize), usize> = HashMap::new();
        for corners in &face_of {
            let mut faces = corners.clone();
            faces.sort_unstable();
            if faces.windows(2).any(|pair| pair[0] == pair[1]) {
                return false;
            }
            for (a, &f) in faces.iter().enumerate() {
                for &g in &faces[a + 1..] {
                    *meetings.entry((f, g)).or_insert(0) += 1;
                }
            }
        }

        meetings
            .iter()
            .all(|(pair, &shared)| shared < 2 || (shared == 2 && edge_faces.contains(pair)))
    }

    /// Euler check: genus zero on every component, i.e.
    /// `V - E + F = 2 * (components with edges) + (isolated vertices)`.
    pub fn is_planar(&self) -> bool {
        let n = self.rotation.len();
        let mut components = UnionFind::new(n);
        for (v, around) in self.rotation.iter().enumerate() {
            for &w in around {
                if w >= n || w == v {
                    return false;
                }
                components.union(v, w);
            }
        }

        let faces = match self.face_count() {
            Some(faces) => faces,
            None => return false,
        };

        let mut nontrivial = vec![false; n];
        let mut isolated = 0;
        for v in 0..n {
            if self.rotation[v].is_empty() {
                isolated += 1;
            } else {
                nontrivial[components.find(v)] = true;
            }
        }
        let nontrivial = nontrivial.iter().filter(|&&root| root).count();

        n + faces == self.edge_count() + 2 * nontrivial + isolated
    }
}

const UNMAPPED: usize = usize::MAX;

fn position(rotation: &[Vec<usize>], v: usize, w: usize) -> Option<usize> {
    rotation.get(v)?.iter().position(|&x| x == w)
}

/// Successor of half-edge `(v, rotation[v][i])` along its face, as an index
/// pair
fn next_half_edge(rotation: &[Vec<usize>], v: usize, i: usize) -> Option<(usize, usize)> {
    let w = rotation[v][i];
    let j = position(rotation, w, v)?;
    let around = rotation[w].len();
    Some((w, (j + around - 1) % around))
}

/// Face id of every half-edge and the number of faces, or `None` if the
/// rotation is not symmetric
fn label_faces(rotation: &[Vec<usize>]) -> Option<(Vec<Vec<usize>>, usize)> {
    let mut face_of: Vec<Vec<usize>> = rotation.iter().map(|r| vec![UNMAPPED; r.len()]).collect();
    let mut faces = 0;
    for v in 0..rotation.len() {
        for i in 0..rotation[v].len() {
            if face_of[v][i] != UNMAPPED {
                continue;
            }
            let (mut node, mut slot) = (v, i);
            while face_of[node][slot] == UNMAPPED {
                face_of[node][slot] = faces;
                (node, slot) = next_half_edge(rotation, node, slot)?;
            }
            faces += 1;
        }
    }
    Some((face_of, faces))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Triangle on 0, 1, 2 among `n` nodes
    fn triangle(n: usize) -> RotationSystem {
        let mut rs = RotationSystem::new(n);
        rs.insert_bridge(0, 1);
        rs.insert_bridge(1, 2);
        let chord = rs.shared_face(2, 0).unwrap();
        rs.insert_chord(&chord);
        rs
    }

    #[test]
    fn test_triangle_has_two_faces() {
        let rs = triangle(3);
        assert_eq!(rs.edge_count(), 3);
        assert_eq!(rs.face_count(), Some(2));
        assert!(rs.is_planar());
    }

    #[test]
    fn test_cw_ccw_are_inverse() {
        let mut rs = RotationSystem::new(4);
        rs.add_half_edge_cw(0, 1, None);
        rs.add_half_edge_cw(0, 2, Some(1));
        rs.add_half_edge_cw(0, 3, Some(2));
        assert_eq!(rs.neighbors(0), &[1, 2, 3]);
        assert_eq!(rs.cw(0, 3), Some(1));
        assert_eq!(rs.ccw(0, 1), Some(3));
        assert_eq!(rs.ccw(0, rs.cw(0, 2).unwrap()), Some(2));
    }

    #[test]
    fn test_add_half_edge_first() {
        let mut rs = RotationSystem::new(4);
        rs.add_half_edge_first(0, 1);
        rs.add_half_edge_first(0, 2);
        assert_eq!(rs.neighbors(0)[0], 2);
        assert_eq!(rs.cw(0, 2), Some(1));
    }

    #[test]
    fn test_star_single_face() {
        let mut rs = RotationSystem::new(5);
        for leaf in 1..5 {
            rs.insert_bridge(0, leaf);
        }
        assert_eq!(rs.face_count(), Some(1));
        assert!(rs.is_planar());
        assert!(rs.shared_face(1, 3).is_some());
    }

    #[test]
    fn test_chords_build_k4() {
        let mut rs = triangle(4);
        rs.insert_bridge(3, 0);
        for other in [1, 2] {
            let chord = rs.shared_face(3, other).unwrap();
            rs.insert_chord(&chord);
            assert!(rs.is_planar());
        }
        assert_eq!(rs.edge_count(), 6);
        assert_eq!(rs.face_count(), Some(4));
        assert!(rs.is_triconnected(&[0, 1, 2, 3]));
    }

    /// Cycle 0..k with every chord from `hub`, embedded through chords only
    fn fan(k: usize, hub: usize) -> RotationSystem {
        let mut rs = RotationSystem::new(k);
        for v in 1..k {
            rs.insert_bridge(v - 1, v);
        }
        for v in 0..k {
            if v != hub && (v + 1) % k != hub && (hub + 1) % k != v {
                let chord = rs.shared_face(hub, v).unwrap();
                rs.insert_chord(&chord);
            }
        }
        let chord = rs.shared_face(k - 1, 0).unwrap();
        rs.insert_chord(&chord);
        rs
    }

    #[test]
    fn test_fan_has_separation_pairs() {
        // every chord from the hub splits the cycle
        let rs = fan(6, 0);
        assert!(rs.is_planar());
        assert!(!rs.is_triconnected(&[0, 1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_wheel_is_triconnected() {
        // rim 0..5 plus hub 5
        let mut rs = RotationSystem::new(6);
        for v in 1..5 {
            rs.insert_bridge(v - 1, v);
        }
        let chord = rs.shared_face(4, 0).unwrap();
        rs.insert_chord(&chord);
        rs.insert_bridge(5, 0);
        for v in 1..5 {
            let chord = rs.shared_face(5, v).unwrap();
            rs.insert_chord(&chord);
        }
        assert!(rs.is_planar());
        assert_eq!(rs.edge_count(), 10);
        assert!(rs.is_triconnected(&[0, 1, 2, 3, 4, 5]));
        // the rim alone is a cycle
        assert!(!triangle(3).is_triconnected(&[0, 1, 2]));
    }

    #[test]
    fn test_out_of_range_reads() {
        let rs = triangle(3);
        assert_eq!(rs.degree(7), 0);
        assert!(rs.neighbors(7).is_empty());
        assert_eq!(rs.cw(7, 0), None);
        assert!(rs.shared_face(0, 7).is_none());
        assert!(rs.shared_face(7, 0).is_none());
        assert!(!rs.is_triconnected(&[0, 1, 2, 7]));
    }

    #[test]
    fn test_bad_rotation_is_not_planar() {
        // K4 with the rotation at vertex 0 scrambled into a torus-like system
        let rs = RotationSystem {
            rotation: vec![vec![1, 2, 3], vec![0, 2, 3], vec![0, 1, 3], vec![0, 1, 2]],
        };
        assert_eq!(rs.edge_count(), 6);
        assert!(!rs.is_planar());
    }

    #[test]
    fn test_asymmetric_rotation_is_not_planar() {
        let rs = RotationSystem {
            rotation: vec![vec![1], vec![]],
        };
        assert!(!rs.is_planar());
    }
}

//! Vertex adjacency.
//!
//! A symmetric "is connected by an edge" relation over vertex ids, stored as
//! one sorted neighbor list per vertex. Memory is proportional to the number
//! of edges rather than the square of the vertex count.

use crate::error::{DeformError, Result};

/// Symmetric vertex adjacency relation.
///
/// `j` is in `neighbors(i)` if and only if `i` is in `neighbors(j)`. The only
/// way to add an edge is [`Adjacency::connect`], which inserts both
/// directions at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjacency {
    neighbors: Vec<Vec<usize>>,
}

impl Adjacency {
    /// Create an adjacency relation over `num_vertices` isolated vertices.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            neighbors: vec![Vec::new(); num_vertices],
        }
    }

    /// Build the edge relation of a triangle list.
    ///
    /// Every triangle contributes its three edges; shared edges are stored once.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidVertexIndex`] if a triangle references a
    /// vertex `>= num_vertices`, and [`DeformError::DegenerateFace`] if a
    /// triangle repeats a vertex.
    ///
    /// # Example
    ///
    /// ```
    /// use flexure::mesh::Adjacency;
    ///
    /// let adjacency = Adjacency::from_triangles(4, &[[0, 1, 2], [2, 1, 3]]).unwrap();
    /// assert_eq!(adjacency.num_edges(), 5);
    /// assert_eq!(adjacency.degree(1), 3);
    /// assert!(adjacency.is_connected(3, 2));
    /// assert!(!adjacency.is_connected(0, 3));
    /// ```
    pub fn from_triangles(num_vertices: usize, triangles: &[[usize; 3]]) -> Result<Self> {
        let mut adjacency = Self::new(num_vertices);

        for (fi, tri) in triangles.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v >= num_vertices) {
                return Err(DeformError::InvalidVertexIndex { face: fi, vertex });
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return Err(DeformError::DegenerateFace { face: fi });
            }

            adjacency.connect(tri[0], tri[1]);
            adjacency.connect(tri[1], tri[2]);
            adjacency.connect(tri[2], tri[0]);
        }

        Ok(adjacency)
    }

    /// Connect `i` and `j` in both directions. Connecting twice is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `i == j` or either id is out of range.
    pub fn connect(&mut self, i: usize, j: usize) {
        assert_ne!(i, j, "self loops are not allowed in the adjacency relation");
        Self::insert_sorted(&mut self.neighbors[i], j);
        Self::insert_sorted(&mut self.neighbors[j], i);
    }

    fn insert_sorted(list: &mut Vec<usize>, value: usize) {
        if let Err(pos) = list.binary_search(&value) {
            list.insert(pos, value);
        }
    }

    /// Whether an edge connects `i` and `j`.
    #[inline]
    pub fn is_connected(&self, i: usize, j: usize) -> bool {
        self.neighbors
            .get(i)
            .is_some_and(|list| list.binary_search(&j).is_ok())
    }

    /// Number of neighbors of vertex `i`.
    #[inline]
    pub fn degree(&self, i: usize) -> usize {
        self.neighbors[i].len()
    }

    /// Sorted neighbor ids of vertex `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Number of vertices covered by the relation.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.neighbors.len()
    }

    /// Number of undirected edges.
    pub fn num_edges(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Whether the relation contains no edge at all.
    pub fn is_empty(&self) -> bool {
        self.neighbors.iter().all(Vec::is_empty)
    }

    /// Iterate over every undirected edge once, as `(i, j)` with `i < j`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.neighbors.iter().enumerate().flat_map(|(i, list)| {
            list.iter()
                .copied()
                .filter(move |&j| i < j)
                .map(move |j| (i, j))
        })
    }
}

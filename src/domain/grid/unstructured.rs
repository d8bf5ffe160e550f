//! Unstructured mesh
//!
//! Vertices plus elements given by corner indices. Cube corners are stored in
//! lexicographic order (bit `a` of the corner number is the offset along
//! axis `a`), simplex corners in any order.

use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::GridError;
use crate::domain::grid::gmsh::GmshMesh;
use crate::domain::grid::{ElementShape, Grid, MAX_STORED_ENTITIES};
use crate::domain::tag::BackendTag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub shape: ElementShape,
    pub corners: Vec<usize>,
}

impl Element {
    pub fn new(shape: ElementShape, corners: Vec<usize>) -> Self {
        Self { shape, corners }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnstructuredMesh {
    tag: BackendTag,
    vertices: Vec<Vec<f64>>,
    elements: Vec<Element>,
    boundary_segments: Vec<Element>,
    /// Owning part per element
    partition: Vec<usize>,
    parts: usize,
    level: usize,
}

impl UnstructuredMesh {
    /// Assemble a mesh from raw parts, checking every index.
    pub fn from_parts(
        tag: BackendTag,
        vertices: Vec<Vec<f64>>,
        elements: Vec<Element>,
        boundary_segments: Vec<Element>,
    ) -> Result<Self, GridError> {
        let dim = tag.dim;
        if elements.is_empty() {
            return Err(GridError::InvalidParameters("mesh has no elements".to_string()));
        }
        if let Some(v) = vertices.iter().position(|v| v.len() != dim) {
            return Err(GridError::InvalidParameters(format!(
                "vertex {} has {} coordinates, expected {}",
                v,
                vertices[v].len(),
                dim
            )));
        }
        check_elements(&elements, dim, vertices.len(), "element")?;
        check_elements(&boundary_segments, dim - 1, vertices.len(), "boundary segment")?;

        let partition = vec![0; elements.len()];
        Ok(Self {
            tag,
            vertices,
            elements,
            boundary_segments,
            partition,
            parts: 1,
            level: 0,
        })
    }

    /// Mesh the box `[lower, upper]` with `cells` lattice cells per axis.
    ///
    /// Cubes are the lattice cells themselves. Simplices come from the Kuhn
    /// split, `dim!` simplices per lattice cell, which is conforming across
    /// cell faces and matches on the boundary.
    pub fn structured(
        tag: BackendTag,
        lower: &[f64],
        upper: &[f64],
        cells: &[usize],
        shape: ElementShape,
        keep_boundary: bool,
    ) -> Result<Self, GridError> {
        let dim = tag.dim;
        if lower.len() != dim || upper.len() != dim || cells.len() != dim {
            return Err(GridError::InvalidParameters(format!(
                "box and cell counts must have {} entries",
                dim
            )));
        }
        for axis in 0..dim {
            if !(upper[axis] > lower[axis]) {
                return Err(GridError::InvalidParameters(format!(
                    "empty extent along axis {} ({} .. {})",
                    axis, lower[axis], upper[axis]
                )));
            }
            if cells[axis] == 0 {
                return Err(GridError::InvalidParameters(
                    "every axis needs at least one cell".to_string(),
                ));
            }
        }

        let lattice = Lattice::new(cells);
        let vertices = (0..lattice.vertex_count())
            .map(|flat| {
                lattice
                    .decode(flat)
                    .iter()
                    .enumerate()
                    .map(|(a, &i)| lower[a] + (upper[a] - lower[a]) * i as f64 / cells[a] as f64)
                    .collect()
            })
            .collect();

        let all_axes: Vec<usize> = (0..dim).collect();
        let mut elements = Vec::new();
        for base in lattice_points(cells) {
            elements.extend(lattice.cell_elements(&base, &all_axes, shape));
        }

        let mut boundary_segments = Vec::new();
        if keep_boundary {
            for axis in 0..dim {
                let others: Vec<usize> = all_axes.iter().copied().filter(|&a| a != axis).collect();
                let face_counts: Vec<usize> = others.iter().map(|&a| cells[a]).collect();
                for side in [0, cells[axis]] {
                    for face in lattice_points(&face_counts) {
                        let mut base = vec![0; dim];
                        base[axis] = side;
                        for (&a, &i) in others.iter().zip(&face) {
                            base[a] = i;
                        }
                        boundary_segments.extend(lattice.cell_elements(&base, &others, shape));
                    }
                }
            }
        }

        Self::from_parts(tag, vertices, elements, boundary_segments)
    }

    /// Take the `dim`-dimensional elements of a Gmsh mesh as cells and, if
    /// requested, the `dim - 1`-dimensional ones as boundary segments.
    pub fn from_gmsh(
        tag: BackendTag,
        mesh: &GmshMesh,
        keep_boundary: bool,
    ) -> Result<Self, GridError> {
        let dim = tag.dim;
        let vertices = mesh.nodes.iter().map(|n| n[..dim].to_vec()).collect();
        let elements: Vec<Element> = mesh
            .elements_of_dim(dim)
            .map(|e| Element::new(e.shape, e.corners.clone()))
            .collect();
        if elements.is_empty() {
            return Err(GridError::InvalidParameters(format!(
                "mesh file contains no {}-dimensional elements",
                dim
            )));
        }
        let boundary_segments = if keep_boundary {
            mesh.elements_of_dim(dim - 1)
                .map(|e| Element::new(e.shape, e.corners.clone()))
                .collect()
        } else {
            Vec::new()
        };
        Self::from_parts(tag, vertices, elements, boundary_segments)
    }

    /// Distribute elements over `parts` parts by sorting centroids along the
    /// longest extent of the mesh.
    pub fn load_balance(&mut self, parts: usize) -> Result<(), GridError> {
        let n = self.elements.len();
        if parts == 0 || parts > n {
            return Err(GridError::InvalidParameters(format!(
                "cannot split {} elements into {} parts",
                n, parts
            )));
        }

        let axis = self.longest_axis();
        let keys: Vec<f64> = (0..n).map(|e| self.centroid(e)[axis]).collect();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            keys[a]
                .partial_cmp(&keys[b])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });
        for (pos, &element) in order.iter().enumerate() {
            self.partition[element] = pos * parts / n;
        }
        self.parts = parts;
        debug!(parts, axis, "load balanced");
        Ok(())
    }

    /// Refine every element `levels` times: `2^dim` children per element and
    /// step, sharing new vertices across neighbours.
    ///
    /// Fails without touching the mesh when the refined element count would
    /// exceed [`MAX_STORED_ENTITIES`].
    pub fn global_refine(&mut self, levels: usize) -> Result<(), GridError> {
        let dim = self.tag.dim;
        let projected = u32::try_from(levels)
            .ok()
            .and_then(|l| (1usize << dim).checked_pow(l))
            .and_then(|factor| self.elements.len().checked_mul(factor))
            .filter(|&n| n <= MAX_STORED_ENTITIES);
        let Some(projected) = projected else {
            return Err(GridError::InvalidParameters(format!(
                "{} refinement(s) of {} elements exceed {} elements",
                levels,
                self.elements.len(),
                MAX_STORED_ENTITIES
            )));
        };
        debug!(levels, projected, "refining mesh");

        for _ in 0..levels {
            let mut refiner = Refiner {
                vertices: &mut self.vertices,
                cache: HashMap::new(),
            };
            let mut elements = Vec::with_capacity(self.elements.len() << dim);
            let mut partition = Vec::with_capacity(self.elements.len() << dim);
            for (element, &part) in self.elements.iter().zip(&self.partition) {
                let children = refiner.refine(element, dim);
                partition.extend(std::iter::repeat(part).take(children.len()));
                elements.extend(children);
            }
            let boundary = self
                .boundary_segments
                .iter()
                .flat_map(|s| refiner.refine(s, dim - 1))
                .collect();
            self.elements = elements;
            self.partition = partition;
            self.boundary_segments = boundary;
            self.level += 1;
        }
        Ok(())
    }

    pub fn vertices(&self) -> &[Vec<f64>] {
        &self.vertices
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn boundary_segments(&self) -> &[Element] {
        &self.boundary_segments
    }

    pub fn partition(&self) -> &[usize] {
        &self.partition
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Elements owned by `part`.
    pub fn part_size(&self, part: usize) -> usize {
        self.partition.iter().filter(|&&p| p == part).count()
    }

    pub fn centroid(&self, element: usize) -> Vec<f64> {
        let corners = &self.elements[element].corners;
        average(&self.vertices, corners)
    }

    fn longest_axis(&self) -> usize {
        let dim = self.tag.dim;
        let mut lo = vec![f64::INFINITY; dim];
        let mut hi = vec![f64::NEG_INFINITY; dim];
        for v in &self.vertices {
            for a in 0..dim {
                lo[a] = lo[a].min(v[a]);
                hi[a] = hi[a].max(v[a]);
            }
        }
        (0..dim)
            .max_by(|&a, &b| {
                (hi[a] - lo[a])
                    .partial_cmp(&(hi[b] - lo[b]))
                    .unwrap_or(Ordering::Equal)
                    .then(b.cmp(&a))
            })
            .unwrap_or(0)
    }
}

impl Grid for UnstructuredMesh {
    fn backend(&self) -> BackendTag {
        self.tag
    }

    fn cell_count(&self) -> usize {
        self.elements.len()
    }

    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn refinement_level(&self) -> usize {
        self.level
    }

    fn as_unstructured(&self) -> Option<&UnstructuredMesh> {
        Some(self)
    }
}

fn check_elements(
    elements: &[Element],
    dim: usize,
    vertex_count: usize,
    what: &str,
) -> Result<(), GridError> {
    for (i, e) in elements.iter().enumerate() {
        let expected = e.shape.corner_count(dim);
        if e.corners.len() != expected {
            return Err(GridError::InvalidParameters(format!(
                "{} {} has {} corners, a {}-dimensional {} has {}",
                what,
                i,
                e.corners.len(),
                dim,
                e.shape,
                expected
            )));
        }
        if let Some(c) = e.corners.iter().find(|&&c| c >= vertex_count) {
            return Err(GridError::InvalidParameters(format!(
                "{} {} references vertex {} of {}",
                what, i, c, vertex_count
            )));
        }
    }
    Ok(())
}

fn average(vertices: &[Vec<f64>], corners: &[usize]) -> Vec<f64> {
    let dim = vertices[corners[0]].len();
    let mut sum = vec![0.0; dim];
    for &c in corners {
        for (s, x) in sum.iter_mut().zip(&vertices[c]) {
            *s += x;
        }
    }
    sum.iter().map(|s| s / corners.len() as f64).collect()
}

/// All multi-indices `i` with `0 <= i[a] < counts[a]`.
fn lattice_points(counts: &[usize]) -> Vec<Vec<usize>> {
    if counts.is_empty() {
        return vec![Vec::new()];
    }
    counts.iter().map(|&n| 0..n).multi_cartesian_product().collect()
}

/// Vertex numbering of a lattice with axis 0 running fastest.
struct Lattice {
    sizes: Vec<usize>,
    strides: Vec<usize>,
}

impl Lattice {
    fn new(cells: &[usize]) -> Self {
        let sizes: Vec<usize> = cells.iter().map(|n| n + 1).collect();
        let mut strides = Vec::with_capacity(sizes.len());
        let mut stride = 1;
        for size in &sizes {
            strides.push(stride);
            stride *= size;
        }
        Self { sizes, strides }
    }

    fn vertex_count(&self) -> usize {
        self.sizes.iter().product()
    }

    fn decode(&self, mut flat: usize) -> Vec<usize> {
        self.sizes
            .iter()
            .map(|size| {
                let i = flat % size;
                flat /= size;
                i
            })
            .collect()
    }

    fn index(&self, point: &[usize]) -> usize {
        point.iter().zip(&self.strides).map(|(i, s)| i * s).sum()
    }

    /// Elements of the lattice cell at `base` spanned by `axes`.
    fn cell_elements(&self, base: &[usize], axes: &[usize], shape: ElementShape) -> Vec<Element> {
        let k = axes.len();
        match shape {
            ElementShape::Cube => {
                let corners = (0..1usize << k)
                    .map(|corner| {
                        let mut point = base.to_vec();
                        for (bit, &axis) in axes.iter().enumerate() {
                            point[axis] += (corner >> bit) & 1;
                        }
                        self.index(&point)
                    })
                    .collect();
                vec![Element::new(shape, corners)]
            }
            ElementShape::Simplex if k == 0 => vec![Element::new(shape, vec![self.index(base)])],
            ElementShape::Simplex => axes
                .iter()
                .copied()
                .permutations(k)
                .map(|path| {
                    let mut point = base.to_vec();
                    let mut corners = vec![self.index(&point)];
                    for axis in path {
                        point[axis] += 1;
                        corners.push(self.index(&point));
                    }
                    Element::new(shape, corners)
                })
                .collect(),
        }
    }
}

/// Creates refinement vertices, one per distinct corner subset.
struct Refiner<'a> {
    vertices: &'a mut Vec<Vec<f64>>,
    cache: HashMap<Vec<usize>, usize>,
}

impl Refiner<'_> {
    /// Barycenter of `corners`, created once per set.
    fn point(&mut self, corners: &[usize]) -> usize {
        if corners.len() == 1 {
            return corners[0];
        }
        let mut key = corners.to_vec();
        key.sort_unstable();
        key.dedup();
        if let Some(&index) = self.cache.get(&key) {
            return index;
        }
        let index = self.vertices.len();
        let position = average(self.vertices.as_slice(), &key);
        self.vertices.push(position);
        self.cache.insert(key, index);
        index
    }

    fn refine(&mut self, element: &Element, dim: usize) -> Vec<Element> {
        if dim == 0 {
            return vec![element.clone()];
        }
        match element.shape {
            ElementShape::Cube => self.refine_cube(&element.corners, dim),
            ElementShape::Simplex => self.refine_simplex(&element.corners, dim),
        }
    }

    fn refine_cube(&mut self, corners: &[usize], dim: usize) -> Vec<Element> {
        // Sub-lattice point m in {0,1,2}^dim is the barycenter of the corners
        // whose bit a is 0 (m[a] = 0), 1 (m[a] = 2) or either (m[a] = 1).
        let mut points = HashMap::new();
        for m in lattice_points(&vec![3; dim]) {
            let subset: Vec<usize> = (0..1usize << dim)
                .filter(|corner| {
                    m.iter().enumerate().all(|(a, &ma)| {
                        let bit = (corner >> a) & 1;
                        ma == 1 || ma == 2 * bit
                    })
                })
                .map(|corner| corners[corner])
                .collect();
            let index = self.point(&subset);
            points.insert(m, index);
        }

        lattice_points(&vec![2; dim])
            .into_iter()
            .map(|child| {
                let child_corners = (0..1usize << dim)
                    .map(|corner| {
                        let m: Vec<usize> = child
                            .iter()
                            .enumerate()
                            .map(|(a, c)| c + ((corner >> a) & 1))
                            .collect();
                        points[&m]
                    })
                    .collect();
                Element::new(ElementShape::Cube, child_corners)
            })
            .collect()
    }

    fn refine_simplex(&mut self, v: &[usize], dim: usize) -> Vec<Element> {
        let mut m = |i: usize, j: usize| self.point(&[v[i], v[j]]);
        let children: Vec<Vec<usize>> = match dim {
            1 => {
                let m01 = m(0, 1);
                vec![vec![v[0], m01], vec![m01, v[1]]]
            }
            2 => {
                let (m01, m02, m12) = (m(0, 1), m(0, 2), m(1, 2));
                vec![
                    vec![v[0], m01, m02],
                    vec![m01, v[1], m12],
                    vec![m02, m12, v[2]],
                    vec![m01, m12, m02],
                ]
            }
            _ => {
                let (m01, m02, m03) = (m(0, 1), m(0, 2), m(0, 3));
                let (m12, m13, m23) = (m(1, 2), m(1, 3), m(2, 3));
                vec![
                    vec![v[0], m01, m02, m03],
                    vec![m01, v[1], m12, m13],
                    vec![m02, m12, v[2], m23],
                    vec![m03, m13, m23, v[3]],
                    vec![m01, m02, m03, m13],
                    vec![m01, m02, m12, m13],
                    vec![m02, m03, m13, m23],
                    vec![m02, m12, m13, m23],
                ]
            }
        };
        children
            .into_iter()
            .map(|corners| Element::new(ElementShape::Simplex, corners))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::gmsh;
    use crate::domain::tag::BackendKind;

    fn ug(dim: usize) -> BackendTag {
        BackendTag::new(BackendKind::Ug, dim)
    }

    fn unit_square(cells: usize, shape: ElementShape) -> UnstructuredMesh {
        UnstructuredMesh::structured(ug(2), &[0.0, 0.0], &[1.0, 1.0], &[cells, cells], shape, true)
            .unwrap()
    }

    #[test]
    fn test_structured_cube_counts() {
        let mesh = unit_square(4, ElementShape::Cube);
        assert_eq!(mesh.cell_count(), 16);
        assert_eq!(mesh.vertex_count(), 25);
        assert_eq!(mesh.boundary_segments().len(), 16);
        assert_eq!(mesh.elements()[0].corners, vec![0, 1, 5, 6]);
    }

    #[test]
    fn test_structured_simplex_uses_kuhn_split() {
        let mesh = unit_square(4, ElementShape::Simplex);
        assert_eq!(mesh.cell_count(), 32);
        assert_eq!(mesh.boundary_segments().len(), 16);

        let cube3 = UnstructuredMesh::structured(
            ug(3),
            &[0.0; 3],
            &[1.0; 3],
            &[1, 1, 1],
            ElementShape::Simplex,
            false,
        )
        .unwrap();
        assert_eq!(cube3.cell_count(), 6);
        assert!(cube3.boundary_segments().is_empty());
    }

    #[test]
    fn test_refinement_shares_new_vertices() {
        let mut cubes = unit_square(4, ElementShape::Cube);
        cubes.global_refine(1).unwrap();
        assert_eq!(cubes.cell_count(), 64);
        assert_eq!(cubes.vertex_count(), 81);
        assert_eq!(cubes.boundary_segments().len(), 32);

        let mut simplices = unit_square(4, ElementShape::Simplex);
        simplices.global_refine(2).unwrap();
        assert_eq!(simplices.cell_count(), 32 * 16);
        assert_eq!(simplices.vertex_count(), 17 * 17);
        assert_eq!(simplices.refinement_level(), 2);
    }

    #[test]
    fn test_tetrahedra_refine_into_eight() {
        let mut mesh = UnstructuredMesh::structured(
            ug(3),
            &[0.0; 3],
            &[1.0; 3],
            &[2, 2, 2],
            ElementShape::Simplex,
            true,
        )
        .unwrap();
        mesh.global_refine(1).unwrap();
        assert_eq!(mesh.cell_count(), 48 * 8);
        assert_eq!(mesh.vertex_count(), 125);
    }

    #[test]
    fn test_load_balance_assigns_contiguous_slabs() {
        let mut mesh = UnstructuredMesh::structured(
            ug(2),
            &[0.0, 0.0],
            &[4.0, 1.0],
            &[4, 1],
            ElementShape::Cube,
            false,
        )
        .unwrap();
        mesh.load_balance(2).unwrap();
        assert_eq!(mesh.partition(), &[0, 0, 1, 1]);
        assert_eq!(mesh.parts(), 2);

        mesh.global_refine(1).unwrap();
        assert_eq!(mesh.part_size(0), 8);
        assert_eq!(mesh.part_size(1), 8);
    }

    #[test]
    fn test_load_balance_rejects_more_parts_than_elements() {
        let mut mesh = unit_square(1, ElementShape::Cube);
        assert!(mesh.load_balance(2).is_err());
        assert!(mesh.load_balance(0).is_err());
    }

    #[test]
    fn test_from_gmsh_takes_top_dimensional_elements() {
        let text = "$MeshFormat\n2.2 0 8\n$EndMeshFormat\n\
$Nodes\n4\n1 0 0 0\n2 1 0 0\n3 1 1 0\n4 0 1 0\n$EndNodes\n\
$Elements\n4\n1 1 2 1 1 1 2\n2 1 2 1 1 2 3\n3 2 2 0 1 1 2 3\n4 2 2 0 1 1 3 4\n$EndElements\n";
        let parsed = gmsh::parse(text).unwrap();

        let mesh = UnstructuredMesh::from_gmsh(ug(2), &parsed, true).unwrap();
        assert_eq!(mesh.cell_count(), 2);
        assert_eq!(mesh.boundary_segments().len(), 2);
        assert_eq!(mesh.vertices()[2], vec![1.0, 1.0]);

        let bare = UnstructuredMesh::from_gmsh(ug(2), &parsed, false).unwrap();
        assert!(bare.boundary_segments().is_empty());
        assert!(UnstructuredMesh::from_gmsh(ug(3), &parsed, true).is_err());
    }

    #[test]
    fn test_from_parts_rejects_dangling_corner() {
        let err = UnstructuredMesh::from_parts(
            ug(2),
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![Element::new(ElementShape::Simplex, vec![0, 1, 3])],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, GridError::InvalidParameters(_)));
    }

    #[test]
    fn test_refinement_beyond_storage_limit_is_rejected() {
        let mut mesh = unit_square(4, ElementShape::Simplex);
        assert!(mesh.global_refine(20).is_err());
        assert!(mesh.global_refine(usize::MAX).is_err());
        assert_eq!(mesh.cell_count(), 32);
        assert_eq!(mesh.refinement_level(), 0);
    }
}

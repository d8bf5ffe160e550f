//! Structured (tensor-product) grid
//!
//! Cells are axis-aligned boxes, counted per axis. Global refinement bisects
//! every cell along every axis; the overlap either keeps its physical width
//! (doubling in cells) or its cell count.

use serde::{Deserialize, Serialize};

use crate::domain::error::GridError;
use crate::domain::grid::{Grid, MAX_STORED_ENTITIES};
use crate::domain::strategy::{DomainBounds, StructuredParams};
use crate::domain::tag::BackendTag;

/// Node coordinates of a structured grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coordinates {
    Equidistant { lower: Vec<f64>, upper: Vec<f64> },
    TensorProduct { axes: Vec<Vec<f64>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredGrid {
    tag: BackendTag,
    coordinates: Coordinates,
    cells: Vec<usize>,
    periodic: Vec<bool>,
    overlap: usize,
    partitioning: Vec<usize>,
    keep_physical_overlap: bool,
    level: usize,
}

impl StructuredGrid {
    /// Build the level-0 grid.
    pub fn new(tag: BackendTag, params: &StructuredParams) -> Result<Self, GridError> {
        let dim = tag.dim;
        if params.bounds.dim() != dim {
            return Err(GridError::InvalidParameters(format!(
                "domain has {} axes, grid dimension is {}",
                params.bounds.dim(),
                dim
            )));
        }

        let (coordinates, cells) = match &params.bounds {
            DomainBounds::Extension(upper) => (
                Coordinates::Equidistant {
                    lower: vec![0.0; dim],
                    upper: upper.clone(),
                },
                params.cells.clone(),
            ),
            DomainBounds::Box { lower, upper } => (
                Coordinates::Equidistant {
                    lower: lower.clone(),
                    upper: upper.clone(),
                },
                params.cells.clone(),
            ),
            DomainBounds::Coordinates(axes) => (
                Coordinates::TensorProduct { axes: axes.clone() },
                axes.iter().map(|c| c.len().saturating_sub(1)).collect(),
            ),
        };

        let grid = Self {
            tag,
            coordinates,
            cells,
            periodic: params.periodic.clone(),
            overlap: params.overlap,
            partitioning: params
                .partitioning
                .clone()
                .unwrap_or_else(|| default_partitioning(dim)),
            keep_physical_overlap: true,
            level: 0,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Check that the grid describes a consistent, representable domain.
    ///
    /// Holds for every grid built by [`StructuredGrid::new`] and is kept by
    /// refinement; restored snapshots must pass it before use.
    pub fn validate(&self) -> Result<(), GridError> {
        let dim = self.tag.dim;
        let invalid = |msg: String| Err(GridError::InvalidParameters(msg));

        if self.cells.len() != dim {
            return invalid(format!("{} cell counts for dimension {}", self.cells.len(), dim));
        }
        if self.cells.iter().any(|&c| c == 0) {
            return invalid("every axis needs at least one cell".to_string());
        }

        match &self.coordinates {
            Coordinates::Equidistant { lower, upper } => {
                if lower.len() != dim || upper.len() != dim {
                    return invalid(format!(
                        "domain corners have {} and {} entries, grid dimension is {}",
                        lower.len(),
                        upper.len(),
                        dim
                    ));
                }
                check_box(lower, upper)?;
            }
            Coordinates::TensorProduct { axes } => {
                if axes.len() != dim {
                    return invalid(format!("{} coordinate axes for dimension {}", axes.len(), dim));
                }
                for (axis, (coords, &n)) in axes.iter().zip(&self.cells).enumerate() {
                    if coords.len() < 2 {
                        return invalid(format!("axis {} needs at least two coordinates", axis));
                    }
                    if coords.iter().any(|c| !c.is_finite())
                        || coords.windows(2).any(|w| !(w[1] > w[0]))
                    {
                        return invalid(format!("coordinates of axis {} are not increasing", axis));
                    }
                    if coords.len() - 1 != n {
                        return invalid(format!(
                            "axis {} has {} coordinates for {} cells",
                            axis,
                            coords.len(),
                            n
                        ));
                    }
                }
            }
        }

        if self.periodic.len() != dim {
            return invalid(format!("{} periodicity flags for dimension {}", self.periodic.len(), dim));
        }
        for (axis, (&periodic, &n)) in self.periodic.iter().zip(&self.cells).enumerate() {
            if periodic && self.overlap > n {
                return invalid(format!(
                    "overlap {} exceeds the {} cells of periodic axis {}",
                    self.overlap, n, axis
                ));
            }
        }

        if self.partitioning.len() != dim {
            return invalid(format!("partitioning has {} entries", self.partitioning.len()));
        }
        for (axis, (&procs, &n)) in self.partitioning.iter().zip(&self.cells).enumerate() {
            if procs == 0 || procs > n {
                return invalid(format!("{} processes along axis {} with {} cells", procs, axis, n));
            }
        }

        if entity_counts(&self.cells).is_none() {
            return invalid(format!("{:?} cells exceed the representable grid size", self.cells));
        }
        Ok(())
    }

    /// Decide how the overlap behaves under subsequent refinement.
    pub fn refine_options(&mut self, keep_physical_overlap: bool) {
        self.keep_physical_overlap = keep_physical_overlap;
    }

    /// Bisect every cell `levels` times.
    ///
    /// Fails without touching the grid when the refined sizes would not be
    /// representable.
    pub fn global_refine(&mut self, levels: usize) -> Result<(), GridError> {
        let too_fine = || {
            GridError::InvalidParameters(format!(
                "{} refinement(s) of {:?} cells exceed the representable grid size",
                levels, self.cells
            ))
        };

        let factor = u32::try_from(levels)
            .ok()
            .and_then(|l| 2usize.checked_pow(l))
            .ok_or_else(too_fine)?;
        let cells: Vec<usize> = self
            .cells
            .iter()
            .map(|n| n.checked_mul(factor))
            .collect::<Option<_>>()
            .ok_or_else(too_fine)?;
        let overlap = if self.keep_physical_overlap {
            self.overlap.checked_mul(factor).ok_or_else(too_fine)?
        } else {
            self.overlap
        };
        let level = self.level.checked_add(levels).ok_or_else(too_fine)?;
        entity_counts(&cells).ok_or_else(too_fine)?;
        if matches!(self.coordinates, Coordinates::TensorProduct { .. })
            && cells.iter().any(|&n| n >= MAX_STORED_ENTITIES)
        {
            return Err(too_fine());
        }

        if let Coordinates::TensorProduct { axes } = &mut self.coordinates {
            for coords in axes.iter_mut() {
                for _ in 0..levels {
                    *coords = bisect(coords);
                }
            }
        }
        self.cells = cells;
        self.overlap = overlap;
        self.level = level;
        Ok(())
    }

    /// Leaf cells per axis.
    pub fn cells_per_axis(&self) -> &[usize] {
        &self.cells
    }

    /// Overlap width in leaf cells.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn periodic(&self) -> &[bool] {
        &self.periodic
    }

    /// Processes per axis.
    pub fn partitioning(&self) -> &[usize] {
        &self.partitioning
    }

    pub fn keeps_physical_overlap(&self) -> bool {
        self.keep_physical_overlap
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    pub fn lower_left(&self) -> Vec<f64> {
        match &self.coordinates {
            Coordinates::Equidistant { lower, .. } => lower.clone(),
            Coordinates::TensorProduct { axes } => axes.iter().map(|c| c[0]).collect(),
        }
    }

    pub fn upper_right(&self) -> Vec<f64> {
        match &self.coordinates {
            Coordinates::Equidistant { upper, .. } => upper.clone(),
            Coordinates::TensorProduct { axes } => {
                axes.iter().map(|c| c[c.len() - 1]).collect()
            }
        }
    }

    /// Leaf node coordinates along one axis.
    pub fn axis_coordinates(&self, axis: usize) -> Vec<f64> {
        match &self.coordinates {
            Coordinates::Equidistant { lower, upper } => {
                let n = self.cells[axis];
                let h = (upper[axis] - lower[axis]) / n as f64;
                (0..=n).map(|i| lower[axis] + h * i as f64).collect()
            }
            Coordinates::TensorProduct { axes } => axes[axis].clone(),
        }
    }
}

impl Grid for StructuredGrid {
    fn backend(&self) -> BackendTag {
        self.tag
    }

    fn cell_count(&self) -> usize {
        self.cells.iter().product()
    }

    fn vertex_count(&self) -> usize {
        self.cells.iter().map(|n| n + 1).product()
    }

    fn refinement_level(&self) -> usize {
        self.level
    }

    fn as_structured(&self) -> Option<&StructuredGrid> {
        Some(self)
    }
}

/// One process along every axis.
fn default_partitioning(dim: usize) -> Vec<usize> {
    vec![1; dim]
}

/// Cell and vertex counts, `None` if either overflows.
fn entity_counts(cells: &[usize]) -> Option<(usize, usize)> {
    let cell_count = cells.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))?;
    let vertex_count = cells
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n.checked_add(1)?))?;
    Some((cell_count, vertex_count))
}

fn check_box(lower: &[f64], upper: &[f64]) -> Result<(), GridError> {
    for (axis, (l, u)) in lower.iter().zip(upper).enumerate() {
        if !l.is_finite() || !u.is_finite() || !(u > l) {
            return Err(GridError::InvalidParameters(format!(
                "empty extent along axis {} ({} .. {})",
                axis, l, u
            )));
        }
    }
    Ok(())
}

/// Insert the midpoint of every interval.
fn bisect(coords: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(coords.len() * 2 - 1);
    for w in coords.windows(2) {
        out.push(w[0]);
        out.push(0.5 * (w[0] + w[1]));
    }
    out.push(coords[coords.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tag::BackendKind;

    fn yasp(dim: usize) -> BackendTag {
        BackendTag::new(BackendKind::Yasp, dim)
    }

    #[test]
    fn test_refinement_doubles_cells_and_physical_overlap() {
        let params = StructuredParams::new(DomainBounds::Extension(vec![1.0, 2.0]), vec![4, 3]);
        let mut grid = StructuredGrid::new(yasp(2), &params).unwrap();
        grid.refine_options(true);
        grid.global_refine(2).unwrap();
        assert_eq!(grid.cells_per_axis(), &[16, 12]);
        assert_eq!(grid.overlap(), 4);
        assert_eq!(grid.cell_count(), 192);
        assert_eq!(grid.refinement_level(), 2);
    }

    #[test]
    fn test_refinement_keeps_overlap_cells_when_requested() {
        let params = StructuredParams::new(DomainBounds::Extension(vec![1.0]), vec![5]);
        let mut grid = StructuredGrid::new(yasp(1), &params).unwrap();
        grid.refine_options(false);
        grid.global_refine(3).unwrap();
        assert_eq!(grid.overlap(), 1);
        assert_eq!(grid.cell_count(), 40);
    }

    #[test]
    fn test_tensor_coordinates_are_bisected() {
        let tag = BackendTag::new(BackendKind::YaspTensor, 1);
        let params = StructuredParams::new(
            DomainBounds::Coordinates(vec![vec![0.0, 1.0, 3.0]]),
            vec![2],
        );
        let mut grid = StructuredGrid::new(tag, &params).unwrap();
        grid.global_refine(1).unwrap();
        assert_eq!(grid.axis_coordinates(0), vec![0.0, 0.5, 1.0, 2.0, 3.0]);
        assert_eq!(grid.upper_right(), vec![3.0]);
    }

    #[test]
    fn test_partitioning_must_fit_cells() {
        let mut params = StructuredParams::new(DomainBounds::Extension(vec![1.0, 1.0]), vec![2, 2]);
        params.partitioning = Some(vec![3, 1]);
        assert!(StructuredGrid::new(yasp(2), &params).is_err());
    }

    #[test]
    fn test_empty_extent_is_rejected() {
        let params = StructuredParams::new(
            DomainBounds::Box {
                lower: vec![1.0, 0.0],
                upper: vec![1.0, 1.0],
            },
            vec![2, 2],
        );
        assert!(StructuredGrid::new(yasp(2), &params).is_err());
    }

    #[test]
    fn test_overflowing_refinement_leaves_grid_untouched() {
        let params = StructuredParams::new(DomainBounds::Extension(vec![1.0, 1.0]), vec![4, 4]);
        let mut grid = StructuredGrid::new(yasp(2), &params).unwrap();
        assert!(grid.global_refine(64).is_err());
        assert!(grid.global_refine(40).is_err());
        assert_eq!(grid.cells_per_axis(), &[4, 4]);
        assert_eq!(grid.refinement_level(), 0);
    }

    #[test]
    fn test_validate_rejects_tensor_axis_not_matching_cells() {
        let tag = BackendTag::new(BackendKind::YaspTensor, 1);
        let params = StructuredParams::new(DomainBounds::Coordinates(vec![vec![0.0, 1.0]]), vec![1]);
        let mut grid = StructuredGrid::new(tag, &params).unwrap();
        grid.cells = vec![3];
        assert!(matches!(grid.validate(), Err(GridError::InvalidParameters(_))));
    }
}

//! Periodic-boundary mathematics and whole-molecule reconstruction.
//!
//! The box representation is derived from the frame's box matrix. Orthorhombic
//! boxes take the cheap per-axis minimum-image path; anything with off-diagonal
//! components goes through the general triclinic lattice reduction.

use crate::core::models::frame::Frame;
use crate::core::models::topology::TopologyInformation;
use nalgebra::{Matrix3, Vector3};
use std::collections::VecDeque;

/// A periodic simulation box usable for minimum-image arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum PbcBox {
    /// Box with mutually orthogonal vectors along the coordinate axes.
    Orthorhombic { lengths: Vector3<f64> },
    /// General triclinic box; `cell` holds the box vectors as columns.
    Triclinic {
        cell: Matrix3<f64>,
        inverse: Matrix3<f64>,
    },
}

impl PbcBox {
    /// Builds a box from a frame's box matrix (box vectors as columns).
    ///
    /// Returns `None` for an all-zero or otherwise degenerate matrix, which
    /// callers treat as "no periodic box".
    pub fn from_box_matrix(matrix: &Matrix3<f64>) -> Option<Self> {
        if *matrix == Matrix3::zeros() {
            return None;
        }
        let diagonal = matrix.diagonal();
        if diagonal.iter().any(|&l| l <= 0.0) {
            return None;
        }
        let off_diagonal_is_zero = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .filter(|&(i, j)| i != j)
            .all(|(i, j)| matrix[(i, j)] == 0.0);
        if off_diagonal_is_zero {
            return Some(Self::Orthorhombic { lengths: diagonal });
        }
        let inverse = matrix.try_inverse()?;
        Some(Self::Triclinic {
            cell: *matrix,
            inverse,
        })
    }

    /// Returns the minimum-image equivalent of the displacement `d`.
    pub fn min_image(&self, d: Vector3<f64>) -> Vector3<f64> {
        match self {
            Self::Orthorhombic { lengths } => Vector3::new(
                d.x - (d.x / lengths.x).round() * lengths.x,
                d.y - (d.y / lengths.y).round() * lengths.y,
                d.z - (d.z / lengths.z).round() * lengths.z,
            ),
            Self::Triclinic { cell, inverse } => {
                let fractional = inverse * d;
                let shift = Vector3::new(
                    fractional.x.round(),
                    fractional.y.round(),
                    fractional.z.round(),
                );
                d - cell * shift
            }
        }
    }
}

/// Makes every bonded molecule in `frame` spatially contiguous.
///
/// Walks the bond adjacency breadth-first, molecule by molecule, and moves
/// each newly reached atom next to its already-placed bonded parent via the
/// minimum-image displacement. Atoms on the far side of a periodic boundary
/// are thereby shifted by whole lattice vectors until the molecule is whole.
/// A frame without a periodic box is left untouched.
///
/// The frame must hold coordinates for every atom the topology describes;
/// the runner guarantees this before calling in.
pub fn make_molecules_whole(frame: &mut Frame, topology: &TopologyInformation) {
    let Some(pbc) = PbcBox::from_box_matrix(&frame.box_matrix) else {
        return;
    };
    let atom_count = frame.positions.len();
    debug_assert_eq!(atom_count, topology.atom_count());

    let mut placed = vec![false; atom_count];
    let mut queue = VecDeque::new();
    for start in 0..atom_count {
        if placed[start] {
            continue;
        }
        placed[start] = true;
        queue.push_back(start);
        while let Some(atom) = queue.pop_front() {
            let anchor = frame.positions[atom];
            for &bonded in topology.neighbors(atom) {
                if placed[bonded] {
                    continue;
                }
                placed[bonded] = true;
                let d = frame.positions[bonded] - anchor;
                frame.positions[bonded] = anchor + pbc.min_image(d);
                queue.push_back(bonded);
            }
        }
    }
}

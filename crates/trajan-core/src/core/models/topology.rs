use nalgebra::{Point3, Vector3};

/// A covalent bond between two atoms, identified by their indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    /// Index of the first bonded atom.
    pub atom1: usize,
    /// Index of the second bonded atom.
    pub atom2: usize,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize) -> Self {
        Self { atom1, atom2 }
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.atom1 == atom || self.atom2 == atom
    }
}

/// Structural information about the simulated system.
///
/// Loaded at most once per run by a topology provider and shared read-only
/// with the analysis step afterwards. Holds the atom count, the bond list
/// with a cached adjacency list for connectivity walks, and optionally the
/// reference coordinates and velocities stored in the topology file, which
/// are retained only when the analysis requested them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyInformation {
    atom_count: usize,
    bonds: Vec<Bond>,
    /// Adjacency list for bond connectivity, indexed by atom.
    adjacency: Vec<Vec<usize>>,
    reference_positions: Option<Vec<Point3<f64>>>,
    reference_velocities: Option<Vec<Vector3<f64>>>,
}

impl TopologyInformation {
    /// Creates a topology for `atom_count` atoms with no bonds.
    pub fn new(atom_count: usize) -> Self {
        Self {
            atom_count,
            bonds: Vec::new(),
            adjacency: vec![Vec::new(); atom_count],
            reference_positions: None,
            reference_velocities: None,
        }
    }

    /// Returns the number of atoms in the system.
    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// Returns a slice of all bonds in the system.
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Returns true if any connectivity was loaded.
    pub fn has_connectivity(&self) -> bool {
        !self.bonds.is_empty()
    }

    /// Returns the atoms bonded to `atom`.
    ///
    /// # Panics
    ///
    /// Panics if `atom` is out of range for this topology.
    pub fn neighbors(&self, atom: usize) -> &[usize] {
        &self.adjacency[atom]
    }

    /// Adds a bond between two atoms and updates the adjacency cache.
    ///
    /// Adding an existing bond again is a successful no-op. Returns `None`
    /// if either index is out of range or the bond would be a self-loop.
    pub fn add_bond(&mut self, atom1: usize, atom2: usize) -> Option<()> {
        if atom1 >= self.atom_count || atom2 >= self.atom_count || atom1 == atom2 {
            return None;
        }
        if self.adjacency[atom1].contains(&atom2) {
            return Some(());
        }
        self.bonds.push(Bond::new(atom1, atom2));
        self.adjacency[atom1].push(atom2);
        self.adjacency[atom2].push(atom1);
        Some(())
    }

    /// Stores the reference coordinates from the topology file.
    ///
    /// Returns `None` without storing if the length does not match the atom
    /// count.
    pub fn set_reference_positions(&mut self, positions: Vec<Point3<f64>>) -> Option<()> {
        if positions.len() != self.atom_count {
            return None;
        }
        self.reference_positions = Some(positions);
        Some(())
    }

    /// Stores the reference velocities from the topology file.
    ///
    /// Returns `None` without storing if the length does not match the atom
    /// count.
    pub fn set_reference_velocities(&mut self, velocities: Vec<Vector3<f64>>) -> Option<()> {
        if velocities.len() != self.atom_count {
            return None;
        }
        self.reference_velocities = Some(velocities);
        Some(())
    }

    /// Returns the reference coordinates, if loaded and retained.
    pub fn reference_positions(&self) -> Option<&[Point3<f64>]> {
        self.reference_positions.as_deref()
    }

    /// Returns the reference velocities, if loaded and retained.
    pub fn reference_velocities(&self) -> Option<&[Vector3<f64>]> {
        self.reference_velocities.as_deref()
    }

    pub(crate) fn drop_reference_positions(&mut self) {
        self.reference_positions = None;
    }

    pub(crate) fn drop_reference_velocities(&mut self) {
        self.reference_velocities = None;
    }
}

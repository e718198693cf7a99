use nalgebra::{Matrix3, Point3, Vector3};

/// Selects which per-frame buffers must be read from the trajectory.
///
/// A trajectory source is asked to fill only the buffers named here; everything
/// else may be left empty so that analyses that only need coordinates do not
/// pay for decoding velocities or forces. Positions are always required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContent {
    /// Velocity buffer requested in addition to positions.
    pub velocities: bool,
    /// Force buffer requested in addition to positions.
    pub forces: bool,
}

impl FrameContent {
    /// Positions only, the default for most analyses.
    pub const POSITIONS: Self = Self {
        velocities: false,
        forces: false,
    };
}

impl Default for FrameContent {
    fn default() -> Self {
        Self::POSITIONS
    }
}

/// One time-step of a trajectory.
///
/// A `Frame` is a reusable buffer: the runner owns exactly one and trajectory
/// sources fill it in place on every advance, so a borrow obtained from the
/// runner is only valid until the next frame is read. The box matrix stores
/// the three box vectors as its columns; an all-zero matrix means the frame
/// carries no periodic box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Simulation step number of this frame.
    pub step: u64,
    /// Time of this frame in picoseconds.
    pub time: f64,
    /// Box vectors as matrix columns; all zeros when no box is present.
    pub box_matrix: Matrix3<f64>,
    /// Atom positions in nanometers. Always filled.
    pub positions: Vec<Point3<f64>>,
    /// Atom velocities; empty unless requested through [`FrameContent`].
    pub velocities: Vec<Vector3<f64>>,
    /// Atom forces; empty unless requested through [`FrameContent`].
    pub forces: Vec<Vector3<f64>>,
}

impl Frame {
    /// Returns the number of atoms whose coordinates this frame holds.
    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if the frame carries a periodic box.
    pub fn has_box(&self) -> bool {
        self.box_matrix != Matrix3::zeros()
    }

    /// Empties all buffers and resets the metadata, keeping allocations.
    pub fn clear(&mut self) {
        self.step = 0;
        self.time = 0.0;
        self.box_matrix = Matrix3::zeros();
        self.positions.clear();
        self.velocities.clear();
        self.forces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_content_defaults_to_positions_only() {
        let content = FrameContent::default();
        assert!(!content.velocities);
        assert!(!content.forces);
        assert_eq!(content, FrameContent::POSITIONS);
    }

    #[test]
    fn default_frame_has_no_box() {
        let frame = Frame::default();
        assert!(!frame.has_box());
        assert_eq!(frame.atom_count(), 0);
    }

    #[test]
    fn frame_with_diagonal_box_reports_box() {
        let mut frame = Frame::default();
        frame.box_matrix = Matrix3::from_diagonal(&Vector3::new(2.0, 2.0, 2.0));
        assert!(frame.has_box());
    }

    #[test]
    fn clear_resets_metadata_and_buffers() {
        let mut frame = Frame {
            step: 7,
            time: 14.0,
            box_matrix: Matrix3::identity(),
            positions: vec![Point3::origin(); 3],
            velocities: vec![Vector3::zeros(); 3],
            forces: vec![],
        };
        frame.clear();
        assert_eq!(frame, Frame::default());
    }
}

//! Velocity command and target-error value types exchanged at the actuator
//! and vision boundaries.

/// One of the six Cartesian velocity axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    LinearX,
    LinearY,
    LinearZ,
    AngularX,
    AngularY,
    AngularZ,
}

impl Axis {
    pub const ALL: [Axis; 6] = [
        Axis::LinearX,
        Axis::LinearY,
        Axis::LinearZ,
        Axis::AngularX,
        Axis::AngularY,
        Axis::AngularZ,
    ];

    /// Position of this axis in a `[linear.., angular..]` 6-vector.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::LinearX => 0,
            Axis::LinearY => 1,
            Axis::LinearZ => 2,
            Axis::AngularX => 3,
            Axis::AngularY => 4,
            Axis::AngularZ => 5,
        }
    }

    #[inline]
    pub const fn is_linear(self) -> bool {
        self.index() < 3
    }

    pub const fn name(self) -> &'static str {
        match self {
            Axis::LinearX => "x",
            Axis::LinearY => "y",
            Axis::LinearZ => "z",
            Axis::AngularX => "rx",
            Axis::AngularY => "ry",
            Axis::AngularZ => "rz",
        }
    }
}

/// Frame in which a command's axes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceFrame {
    /// Axes attached to the end effector.
    Tool,
    /// Axes attached to the robot base.
    Base,
    /// Neutral frame; only used for the all-zero stop command.
    #[default]
    Mixed,
}

/// Linear (m/s) and angular (rad/s) velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    pub linear: [f64; 3],
    pub angular: [f64; 3],
}

impl Twist {
    #[inline]
    pub const fn zero() -> Self {
        Self {
            linear: [0.0; 3],
            angular: [0.0; 3],
        }
    }

    /// A twist with a single non-zero component.
    pub fn along(axis: Axis, value: f64) -> Self {
        let mut t = Self::zero();
        t.set(axis, value);
        t
    }

    /// Planar speed along a heading given by `yaw` (rad) in the base x/y plane.
    pub fn planar_along_yaw(speed: f64, yaw: f64) -> Self {
        Self {
            linear: [speed * yaw.cos(), speed * yaw.sin(), 0.0],
            angular: [0.0; 3],
        }
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> f64 {
        let i = axis.index();
        if i < 3 {
            self.linear[i]
        } else {
            self.angular[i - 3]
        }
    }

    #[inline]
    pub fn set(&mut self, axis: Axis, value: f64) {
        let i = axis.index();
        if i < 3 {
            self.linear[i] = value;
        } else {
            self.angular[i - 3] = value;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.linear.iter().chain(self.angular.iter()).all(|v| *v == 0.0)
    }
}

/// A velocity command as published to the arm. Built per tick, never retained.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    pub twist: Twist,
    pub frame: ReferenceFrame,
}

impl VelocityCommand {
    pub const fn new(twist: Twist, frame: ReferenceFrame) -> Self {
        Self { twist, frame }
    }

    /// The canonical "fully stopped" command: zero twist in the neutral frame.
    pub const fn stop() -> Self {
        Self {
            twist: Twist::zero(),
            frame: ReferenceFrame::Mixed,
        }
    }

    /// Constant velocity along one axis.
    pub fn along(axis: Axis, value: f64, frame: ReferenceFrame) -> Self {
        Self {
            twist: Twist::along(axis, value),
            frame,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.frame == ReferenceFrame::Mixed && self.twist.is_zero()
    }
}

/// Error reported by a target-error estimator for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetError {
    /// Image-plane error in pixels.
    Planar([f64; 2]),
    /// Spatial error in meters.
    Spatial([f64; 3]),
}

impl TargetError {
    pub fn components(&self) -> &[f64] {
        match self {
            TargetError::Planar(e) => e,
            TargetError::Spatial(e) => e,
        }
    }

    /// Component `i`, or `None` if the estimate has fewer dimensions.
    pub fn component(&self, i: usize) -> Option<f64> {
        self.components().get(i).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn along_sets_exactly_one_component() {
        for axis in Axis::ALL {
            let t = Twist::along(axis, 0.25);
            for other in Axis::ALL {
                let expected = if other == axis { 0.25 } else { 0.0 };
                assert_eq!(t.get(other), expected, "{} vs {}", axis.name(), other.name());
            }
        }
    }

    #[test]
    fn stop_command_is_zero_in_mixed_frame() {
        let s = VelocityCommand::stop();
        assert!(s.is_stop());
        assert_eq!(s.frame, ReferenceFrame::Mixed);
        // A zero command in the tool frame is not the stop idiom.
        let z = VelocityCommand::new(Twist::zero(), ReferenceFrame::Tool);
        assert!(!z.is_stop());
    }

    #[test]
    fn planar_yaw_projects_speed() {
        let t = Twist::planar_along_yaw(0.02, std::f64::consts::FRAC_PI_2);
        assert!(t.linear[0].abs() < 1e-12);
        assert!((t.linear[1] - 0.02).abs() < 1e-12);
        assert_eq!(t.linear[2], 0.0);
    }

    #[test]
    fn target_error_component_out_of_range_is_none() {
        let e = TargetError::Planar([3.0, -4.0]);
        assert_eq!(e.component(1), Some(-4.0));
        assert_eq!(e.component(2), None);
    }
}

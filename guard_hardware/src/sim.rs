//! Simulated arm with a flat surface, a single hole, and a downward camera.
//!
//! Kinematics are a plain integrator: every published command moves the tool
//! by `velocity * dt`. Tool-frame z points down toward the work surface,
//! base-frame z points up. Contact is a linear spring on z.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use guard_traits::{
    BoxError, HeightSource, ReferenceFrame, Sensor, TargetError, TargetErrorEstimator,
    VelocityCommand, VelocitySink,
};

use crate::error::HwError;

#[derive(Debug, Clone)]
pub struct SimParams {
    /// Starting tool position `[x, y, z]` in meters (base frame).
    pub start: [f64; 3],
    /// Height of the flat surface.
    pub surface_height: f64,
    /// Hole center in base x/y.
    pub hole_center: [f64; 2],
    /// Radius within which the tool drops into the hole.
    pub hole_radius: f64,
    /// Height of the hole bottom.
    pub hole_bottom: f64,
    /// Contact stiffness in N/m.
    pub stiffness: f64,
    /// Deepest the tool can be pushed into a surface before it stalls.
    pub max_penetration: f64,
    /// Force reported with no contact.
    pub nominal_force: [f64; 3],
    /// Peak-to-peak dither added to every force reading.
    pub noise: f64,
    /// Integration step applied per published command.
    pub dt: Duration,
    /// Camera scale for planar target errors.
    pub pixels_per_meter: f64,
    /// Half-width of the camera field of view, in meters.
    pub fov_half_width: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            start: [0.0, 0.0, 0.30],
            surface_height: 0.22,
            hole_center: [0.0, 0.0],
            hole_radius: 0.004,
            hole_bottom: 0.17,
            stiffness: 20_000.0,
            max_penetration: 0.005,
            nominal_force: [0.0, 0.0, 0.0],
            noise: 0.05,
            dt: Duration::from_millis(100),
            pixels_per_meter: 4_000.0,
            fov_half_width: 0.05,
        }
    }
}

#[derive(Debug)]
struct ArmState {
    position: [f64; 3],
    last_command: Option<VelocityCommand>,
    commands: u64,
    reject: bool,
    force_reads: u64,
}

/// Shared simulated arm. Clones refer to the same arm.
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    state: Arc<Mutex<ArmState>>,
    params: Arc<SimParams>,
}

impl SimulatedArm {
    pub fn new(params: SimParams) -> Self {
        Self {
            state: Arc::new(Mutex::new(ArmState {
                position: params.start,
                last_command: None,
                commands: 0,
                reject: false,
                force_reads: 0,
            })),
            params: Arc::new(params),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn position(&self) -> [f64; 3] {
        self.lock().position
    }

    pub fn height(&self) -> f64 {
        self.lock().position[2]
    }

    /// Number of commands accepted so far.
    pub fn commands(&self) -> u64 {
        self.lock().commands
    }

    pub fn last_command(&self) -> Option<VelocityCommand> {
        self.lock().last_command
    }

    /// Make every subsequent publish fail, as a faulted driver would.
    pub fn set_reject(&self, reject: bool) {
        self.lock().reject = reject;
    }

    /// Surface height under the given x/y position.
    pub fn floor_at(&self, x: f64, y: f64) -> f64 {
        let p = &self.params;
        let dx = x - p.hole_center[0];
        let dy = y - p.hole_center[1];
        if (dx * dx + dy * dy).sqrt() <= p.hole_radius {
            p.hole_bottom
        } else {
            p.surface_height
        }
    }

    fn contact_force(&self, position: [f64; 3], n: u64) -> [f64; 3] {
        let p = &self.params;
        let floor = self.floor_at(position[0], position[1]);
        let penetration = (floor - position[2]).max(0.0);
        let dither = if n % 2 == 0 { p.noise / 2.0 } else { -p.noise / 2.0 };
        [
            p.nominal_force[0] + dither,
            p.nominal_force[1] + dither,
            p.nominal_force[2] + dither + p.stiffness * penetration,
        ]
    }

    pub fn sink(&self) -> SimSink {
        SimSink { arm: self.clone() }
    }

    pub fn height_sensor(&self) -> SimHeight {
        SimHeight { arm: self.clone() }
    }

    pub fn force_sensor(&self) -> SimForce {
        SimForce { arm: self.clone() }
    }

    pub fn camera(&self) -> SimCamera {
        SimCamera { arm: self.clone() }
    }
}

/// Velocity sink that integrates commands into the arm position.
#[derive(Debug, Clone)]
pub struct SimSink {
    arm: SimulatedArm,
}

impl VelocitySink for SimSink {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<(), BoxError> {
        let dt = self.arm.params.dt.as_secs_f64();
        let mut st = self.arm.lock();
        if st.reject {
            return Err(Box::new(HwError::Rejected("arm in fault state".into())));
        }
        let lin = cmd.twist.linear;
        let (dx, dy, dz) = match cmd.frame {
            // Tool frame flipped about x: y and z point opposite to base.
            ReferenceFrame::Tool => (lin[0], -lin[1], -lin[2]),
            ReferenceFrame::Base | ReferenceFrame::Mixed => (lin[0], lin[1], lin[2]),
        };
        st.position[0] += dx * dt;
        st.position[1] += dy * dt;
        let floor = self.arm.floor_at(st.position[0], st.position[1]);
        st.position[2] = (st.position[2] + dz * dt).max(floor - self.arm.params.max_penetration);
        st.last_command = Some(*cmd);
        st.commands += 1;
        tracing::trace!(
            frame = ?cmd.frame,
            z = st.position[2],
            "sim arm command"
        );
        Ok(())
    }
}

/// Height feedback from the simulated arm.
#[derive(Debug, Clone)]
pub struct SimHeight {
    arm: SimulatedArm,
}

impl HeightSource for SimHeight {
    fn height(&mut self) -> Option<f64> {
        Some(self.arm.height())
    }
}

impl Sensor for SimHeight {
    type Reading = f64;

    fn read(&mut self, _timeout: Duration) -> Result<f64, BoxError> {
        Ok(self.arm.height())
    }
}

/// Force/torque feedback from the simulated arm.
#[derive(Debug, Clone)]
pub struct SimForce {
    arm: SimulatedArm,
}

impl Sensor for SimForce {
    type Reading = [f64; 3];

    fn read(&mut self, _timeout: Duration) -> Result<[f64; 3], BoxError> {
        let (pos, n) = {
            let mut st = self.arm.lock();
            st.force_reads += 1;
            (st.position, st.force_reads)
        };
        Ok(self.arm.contact_force(pos, n))
    }
}

/// Downward camera that reports the hole offset in pixels.
#[derive(Debug, Clone)]
pub struct SimCamera {
    arm: SimulatedArm,
}

impl TargetErrorEstimator for SimCamera {
    fn estimate(&mut self) -> Option<TargetError> {
        let pos = self.arm.position();
        let p = &self.arm.params;
        let ex = p.hole_center[0] - pos[0];
        let ey = p.hole_center[1] - pos[1];
        if ex.abs() > p.fov_half_width || ey.abs() > p.fov_half_width {
            return None;
        }
        Some(TargetError::Planar([
            ex * p.pixels_per_meter,
            ey * p.pixels_per_meter,
        ]))
    }
}

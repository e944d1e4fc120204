use log::{debug, info, warn};

use crate::error::{invalid, Result};
use crate::interaction::{ForceEngine, Interaction, PairResult};

/// Particle state of the periodic cell. Unit masses throughout.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    x: Vec<[f64; 3]>,
    v: Vec<[f64; 3]>,
    b: f64,
    last_forces: Option<Vec<[f64; 3]>>,
}

impl SimulationState {
    pub fn new(x: Vec<[f64; 3]>, v: Vec<[f64; 3]>, b: f64) -> Self {
        SimulationState { x, v, b, last_forces: None }
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.x
    }

    pub fn velocities(&self) -> &[[f64; 3]] {
        &self.v
    }

    pub fn box_length(&self) -> f64 {
        self.b
    }

    pub fn volume(&self) -> f64 {
        self.b * self.b * self.b
    }

    pub fn num_atoms(&self) -> usize {
        self.x.len()
    }

    /// Forces from the most recent step, if any step has been taken.
    pub fn last_forces(&self) -> Option<&[[f64; 3]]> {
        self.last_forces.as_deref()
    }

    pub fn total_momentum(&self) -> [f64; 3] {
        let mut p = [0.0f64; 3];
        for vi in self.v.iter() {
            for k in 0..3 {
                p[k] += vi[k];
            }
        }
        p
    }

    fn sum_v2(&self) -> f64 {
        self.v
            .iter()
            .map(|vi| vi[0] * vi[0] + vi[1] * vi[1] + vi[2] * vi[2])
            .sum()
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.sum_v2()
    }
}

/// Observables recorded after one timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub kinetic: f64,
    pub potential: f64,
    pub virial: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    records: Vec<StepRecord>,
}

impl Trajectory {
    pub fn with_capacity(steps: usize) -> Self {
        Trajectory { records: Vec::with_capacity(steps) }
    }

    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn kinetic(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.kinetic).collect()
    }

    pub fn potential(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.potential).collect()
    }

    pub fn virial(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.virial).collect()
    }

    pub fn total_energy(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.kinetic + r.potential).collect()
    }

    /// Largest `|E(t) - E(0)| / |E(0)|` over the run.
    pub fn relative_energy_drift(&self) -> f64 {
        let e = self.total_energy();
        match e.first() {
            Some(&e0) if e0 != 0.0 => e
                .iter()
                .map(|et| ((et - e0) / e0).abs())
                .fold(0.0, f64::max),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    pub steps: usize,
    pub dt: f64,
    /// Target temperature of the rescaling thermostat, `None` for NVE.
    pub thermostat: Option<f64>,
    pub check_momentum: bool,
    /// Log progress every this many steps.
    pub stdout_step: Option<usize>,
}

impl RunSettings {
    pub fn nve(steps: usize, dt: f64) -> Self {
        RunSettings { steps, dt, thermostat: None, check_momentum: false, stdout_step: None }
    }

    pub fn nvt(steps: usize, dt: f64, temperature: f64) -> Self {
        RunSettings { thermostat: Some(temperature), ..RunSettings::nve(steps, dt) }
    }

    fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return invalid(format!("timestep must be positive, found {}", self.dt));
        }
        if let Some(t) = self.thermostat {
            if !(t > 0.0) || !t.is_finite() {
                return invalid(format!("thermostat temperature must be positive, found {}", t));
            }
        }
        if self.stdout_step == Some(0) {
            return invalid("progress interval must be positive");
        }
        Ok(())
    }
}

/// Total momentum before and after a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumReport {
    pub initial: [f64; 3],
    pub fin: [f64; 3],
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub state: SimulationState,
    pub trajectory: Trajectory,
    pub momentum: Option<MomentumReport>,
}

/// Wrap a coordinate into `[0, b)`.
#[inline]
fn wrap(x: f64, b: f64) -> f64 {
    let w = x.rem_euclid(b);
    // rem_euclid rounds tiny negatives up to b
    if w >= b {
        0.0
    } else {
        w
    }
}

/// Advance `state` by one velocity-Verlet step and return the step's observables.
pub fn velocity_verlet_step<I: Interaction + Sync>(
    state: &mut SimulationState,
    engine: &ForceEngine<I>,
    dt: f64,
    thermostat: Option<f64>,
) -> Result<StepRecord> {
    let b = state.b;
    let f_prev = match state.last_forces.take() {
        Some(f) => f,
        None => engine.compute(&state.x, b)?.forces,
    };

    let half_dt2 = 0.5 * dt * dt;
    for ((xi, vi), fi) in state.x.iter_mut().zip(state.v.iter()).zip(f_prev.iter()) {
        for k in 0..3 {
            xi[k] = wrap(xi[k] + vi[k] * dt + half_dt2 * fi[k], b);
        }
    }

    let PairResult { forces, potential, virial } = engine.compute(&state.x, b)?;

    for ((vi, fo), fnew) in state.v.iter_mut().zip(f_prev.iter()).zip(forces.iter()) {
        for k in 0..3 {
            vi[k] += 0.5 * (fnew[k] + fo[k]) * dt;
        }
    }

    let v2 = state.sum_v2();
    let record = StepRecord { kinetic: 0.5 * v2, potential, virial };

    if let Some(temperature) = thermostat {
        if v2 > 0.0 {
            let scale = (3.0 * state.num_atoms() as f64 * temperature / v2).sqrt();
            for vi in state.v.iter_mut() {
                for k in 0..3 {
                    vi[k] *= scale;
                }
            }
        }
    }

    state.last_forces = Some(forces);
    Ok(record)
}

/// Run `settings.steps` timesteps starting from `state`.
pub fn simulate<I: Interaction + Sync>(
    mut state: SimulationState,
    engine: &ForceEngine<I>,
    settings: &RunSettings,
) -> Result<RunOutput> {
    settings.validate()?;

    let initial = state.total_momentum();
    let mut trajectory = Trajectory::with_capacity(settings.steps);

    info!(
        "running {} steps of {} atoms (dt = {}, thermostat = {:?}, {} kernel)",
        settings.steps,
        state.num_atoms(),
        settings.dt,
        settings.thermostat,
        if engine.is_parallel() { "parallel" } else { "serial" }
    );

    for step in 0..settings.steps {
        let record = velocity_verlet_step(&mut state, engine, settings.dt, settings.thermostat)?;
        trajectory.push(record);

        if let Some(every) = settings.stdout_step {
            if step % every == 0 {
                debug!(
                    "step {}: ekin = {:.6}, epot = {:.6}, etot = {:.6}",
                    step,
                    record.kinetic,
                    record.potential,
                    record.kinetic + record.potential
                );
            }
        }
    }

    if settings.thermostat.is_none() && !trajectory.is_empty() {
        let drift = trajectory.relative_energy_drift();
        if drift > 0.01 {
            warn!("total energy drifted by {:.3}% without a thermostat", 100.0 * drift);
        } else {
            info!("relative energy drift {:.3e}", drift);
        }
    }

    let momentum = if settings.check_momentum {
        let report = MomentumReport { initial, fin: state.total_momentum() };
        info!("total momentum: initial {:?}, final {:?}", report.initial, report.fin);
        Some(report)
    } else {
        None
    };

    Ok(RunOutput { state, trajectory, momentum })
}

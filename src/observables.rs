//! Thermodynamic observables from a sampling trajectory.
//!
//! All quantities are in reduced units (`epsilon = sigma = m = kB = 1`).
//! Long-range corrections assume `g(r) = 1` beyond the cutoff.

use std::f64::consts::PI;

use crate::block_average::{block_statistics, BlockStatistics};
use crate::error::{invalid, Result};
use crate::simulation::{SimulationState, Trajectory};

/// Block-averaged value with its error bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub mean: f64,
    pub error: f64,
}

impl From<&BlockStatistics> for Estimate {
    fn from(s: &BlockStatistics) -> Self {
        Estimate { mean: s.mean, error: s.std_error }
    }
}

/// Size of the sampled system, shared by every observable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct System {
    pub num: usize,
    pub volume: f64,
    pub cutoff: f64,
}

impl System {
    pub fn from_state(state: &SimulationState, cutoff: f64) -> Self {
        System { num: state.num_atoms(), volume: state.volume(), cutoff }
    }

    pub fn density(&self) -> f64 {
        self.num as f64 / self.volume
    }

    /// Potential energy of all pairs beyond the cutoff.
    pub fn potential_tail(&self) -> f64 {
        let rc3 = self.cutoff.powi(-3);
        let rc9 = self.cutoff.powi(-9);
        -4.0 * 2.0 * PI * self.density() * (self.num as f64 - 1.0) * (rc3 / 3.0 - rc9 / 9.0)
    }

    /// Correction to the reduced virial term of the pressure at temperature `t`.
    pub fn virial_tail(&self, t: f64) -> f64 {
        let rc3 = self.cutoff.powi(-3);
        let rc9 = self.cutoff.powi(-9);
        PI * self.num as f64 / (6.0 * t * self.volume) * (32.0 * rc3 - 64.0 / 3.0 * rc9)
    }
}

pub fn temperature_series(traj: &Trajectory, sys: &System) -> Vec<f64> {
    let n = sys.num as f64;
    traj.records()
        .iter()
        .map(|r| 2.0 * r.kinetic / (3.0 * n))
        .collect()
}

pub fn potential_energy_series(traj: &Trajectory, sys: &System) -> Vec<f64> {
    let n = sys.num as f64;
    let tail = sys.potential_tail();
    traj.records()
        .iter()
        .map(|r| (r.potential + tail) / n)
        .collect()
}

pub fn pressure_series(traj: &Trajectory, sys: &System) -> Vec<f64> {
    let n = sys.num as f64;
    traj.records()
        .iter()
        .map(|r| {
            let t = 2.0 * r.kinetic / (3.0 * n);
            n * t / sys.volume * (1.0 + r.virial / (3.0 * n * t) - sys.virial_tail(t))
        })
        .collect()
}

pub fn temperature(traj: &Trajectory, sys: &System, blocks: usize) -> Result<Estimate> {
    Ok((&block_statistics(&temperature_series(traj, sys), blocks)?).into())
}

/// Potential energy per particle including the tail correction.
pub fn potential_energy(traj: &Trajectory, sys: &System, blocks: usize) -> Result<Estimate> {
    Ok((&block_statistics(&potential_energy_series(traj, sys), blocks)?).into())
}

pub fn pressure(traj: &Trajectory, sys: &System, blocks: usize) -> Result<Estimate> {
    Ok((&block_statistics(&pressure_series(traj, sys), blocks)?).into())
}

/// Heat capacity per particle from kinetic-energy fluctuations
/// (Lebowitz, Percus & Verlet):
/// `Cv = [2 / (3N) - Var(K) / <K>^2]^-1`.
///
/// `Var(K) / <K>^2` is evaluated per block and averaged; the error is the
/// spread of that ratio across blocks carried through `d Cv = Cv^2 d ratio`.
pub fn heat_capacity(traj: &Trajectory, sys: &System, blocks: usize) -> Result<Estimate> {
    let ke = block_statistics(&traj.kinetic(), blocks)?;
    let ratios: Vec<f64> = ke
        .block_means
        .iter()
        .zip(ke.block_std_devs.iter())
        .map(|(&mean, &sd)| if mean > 0.0 { sd * sd / (mean * mean) } else { f64::NAN })
        .collect();
    if ratios.iter().any(|r| !r.is_finite()) {
        return invalid("kinetic energy vanishes in a block");
    }
    let ratio = block_statistics(&ratios, ratios.len())?;

    let n = sys.num as f64;
    let denom = 2.0 / (3.0 * n) - ratio.mean;
    if !(denom > 0.0) {
        return invalid(format!(
            "kinetic energy fluctuations {:.3e} exceed the canonical bound {:.3e}",
            ratio.mean,
            2.0 / (3.0 * n)
        ));
    }
    let cv = 1.0 / denom;
    Ok(Estimate { mean: cv / n, error: cv * cv * ratio.std_error / n })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thermodynamics {
    pub temperature: Estimate,
    pub potential_energy: Estimate,
    pub pressure: Estimate,
    pub heat_capacity: Estimate,
}

pub fn summarize(traj: &Trajectory, sys: &System, blocks: usize) -> Result<Thermodynamics> {
    Ok(Thermodynamics {
        temperature: temperature(traj, sys, blocks)?,
        potential_energy: potential_energy(traj, sys, blocks)?,
        pressure: pressure(traj, sys, blocks)?,
        heat_capacity: heat_capacity(traj, sys, blocks)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::StepRecord;
    use approx::assert_relative_eq;

    fn sys() -> System {
        System { num: 108, volume: 135.0, cutoff: 2.5 }
    }

    fn constant_traj(kinetic: f64, potential: f64, virial: f64, steps: usize) -> Trajectory {
        let mut traj = Trajectory::default();
        for _ in 0..steps {
            traj.push(StepRecord { kinetic, potential, virial });
        }
        traj
    }

    #[test]
    fn temperature_from_kinetic_energy() {
        let s = sys();
        let traj = constant_traj(1.5 * 108.0 * 1.2, -500.0, 10.0, 100);
        let t = temperature(&traj, &s, 10).unwrap();
        assert_relative_eq!(t.mean, 1.2, max_relative = 1e-12);
        assert_eq!(t.error, 0.0);
    }

    #[test]
    fn tail_corrections() {
        let s = sys();
        let rho = 108.0 / 135.0;
        let rc: f64 = 2.5;
        let expected = 8.0 * PI * rho * 107.0 * (rc.powi(-9) / 9.0 - rc.powi(-3) / 3.0);
        assert_relative_eq!(s.potential_tail(), expected, max_relative = 1e-12);
        assert!(s.potential_tail() < 0.0);

        // rho T * virial_tail is the usual (16/3) pi rho^2 (rc^-3 - 2/3 rc^-9)
        let t = 1.3;
        let p_tail = rho * t * s.virial_tail(t);
        let expected = 16.0 / 3.0 * PI * rho * rho * (rc.powi(-3) - 2.0 / 3.0 * rc.powi(-9));
        assert_relative_eq!(p_tail, expected, max_relative = 1e-12);
    }

    #[test]
    fn ideal_gas_pressure() {
        // no interactions and an infinite cutoff leave rho T
        let s = System { num: 100, volume: 200.0, cutoff: f64::INFINITY };
        let traj = constant_traj(1.5 * 100.0 * 2.0, 0.0, 0.0, 20);
        let p = pressure(&traj, &s, 4).unwrap();
        assert_relative_eq!(p.mean, 0.5 * 2.0, max_relative = 1e-12);
    }

    #[test]
    fn virial_raises_pressure() {
        let s = sys();
        let k = 1.5 * 108.0;
        let low = pressure(&constant_traj(k, 0.0, 0.0, 10), &s, 2).unwrap();
        let high = pressure(&constant_traj(k, 0.0, 300.0, 10), &s, 2).unwrap();
        assert_relative_eq!(high.mean - low.mean, 300.0 / (3.0 * 135.0), max_relative = 1e-10);
    }

    #[test]
    fn potential_energy_per_particle() {
        let s = sys();
        let traj = constant_traj(100.0, -540.0, 0.0, 10);
        let u = potential_energy(&traj, &s, 5).unwrap();
        assert_relative_eq!(u.mean, (-540.0 + s.potential_tail()) / 108.0, max_relative = 1e-12);
    }

    #[test]
    fn frozen_kinetic_energy_gives_ideal_heat_capacity() {
        let s = sys();
        let traj = constant_traj(150.0, -500.0, 0.0, 40);
        let cv = heat_capacity(&traj, &s, 4).unwrap();
        assert_relative_eq!(cv.mean, 1.5, max_relative = 1e-12);
        assert_eq!(cv.error, 0.0);
    }

    #[test]
    fn fluctuating_kinetic_energy_raises_heat_capacity() {
        let s = System { num: 10, volume: 20.0, cutoff: 2.5 };
        let mut traj = Trajectory::default();
        for i in 0..100 {
            let kinetic = if i % 2 == 0 { 14.0 } else { 16.0 };
            traj.push(StepRecord { kinetic, potential: 0.0, virial: 0.0 });
        }
        // Var/<K>^2 = 1/225 per block
        let cv = heat_capacity(&traj, &s, 5).unwrap();
        let expected = 1.0 / (2.0 / 30.0 - 1.0 / 225.0) / 10.0;
        assert_relative_eq!(cv.mean, expected, max_relative = 1e-10);
        assert!(cv.mean > 1.5);
    }

    #[test]
    fn excessive_fluctuations_are_rejected() {
        let s = System { num: 10, volume: 20.0, cutoff: 2.5 };
        let mut traj = Trajectory::default();
        for i in 0..20 {
            let kinetic = if i % 2 == 0 { 1.0 } else { 30.0 };
            traj.push(StepRecord { kinetic, potential: 0.0, virial: 0.0 });
        }
        assert!(heat_capacity(&traj, &s, 2).is_err());
    }
}

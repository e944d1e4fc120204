//! FCC lattice construction and Maxwell-Boltzmann velocity initialization.

use log::info;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64;

use crate::error::{invalid, Result};
use crate::simulation::SimulationState;

/// Prefactor of the lattice constant, `a = LATTICE_RMIN * density^(-1/3)`.
///
/// With 4 atoms per cubic cell this reproduces the requested number density
/// exactly, and puts nearest neighbours at `2^(1/6) * density^(-1/3)`.
pub const LATTICE_RMIN: f64 = 1.587_401_051_968_199_4; // 2^(2/3)

/// Basis of the FCC unit cell, in units of the lattice constant.
const FCC_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.5, 0.5, 0.0],
    [0.5, 0.0, 0.5],
    [0.0, 0.5, 0.5],
];

pub fn lattice_constant(density: f64) -> f64 {
    LATTICE_RMIN * density.powf(-1.0 / 3.0)
}

pub fn box_length(cells: usize, density: f64) -> f64 {
    lattice_constant(density) * cells as f64
}

/// Positions of a `cells^3` FCC crystal, cell index `i` slowest, basis atom fastest.
pub fn fcc_positions(cells: usize, a: f64) -> Vec<[f64; 3]> {
    let mut x = Vec::<[f64; 3]>::with_capacity(4 * cells * cells * cells);
    for i in 0..cells {
        for j in 0..cells {
            for k in 0..cells {
                let origin = [i as f64 * a, j as f64 * a, k as f64 * a];
                for basis in FCC_BASIS.iter() {
                    x.push([
                        origin[0] + basis[0] * a,
                        origin[1] + basis[1] * a,
                        origin[2] + basis[2] * a,
                    ]);
                }
            }
        }
    }
    x
}

/// Draw zero-momentum velocities whose kinetic energy matches `temperature`
/// with `3(N-1)` degrees of freedom.
pub fn thermal_velocities(num: usize, temperature: f64, rng: &mut Pcg64) -> Result<Vec<[f64; 3]>> {
    let normal = match Normal::new(0.0f64, temperature.sqrt()) {
        Ok(n) => n,
        Err(e) => return invalid(format!("temperature {}: {}", temperature, e)),
    };

    let mut v = Vec::<[f64; 3]>::with_capacity(num);
    if num == 0 {
        return Ok(v);
    }
    for _ in 0..num {
        v.push([normal.sample(rng), normal.sample(rng), normal.sample(rng)]);
    }

    // remove centre of mass drift
    let mut mean = [0.0f64; 3];
    for vi in v.iter() {
        for k in 0..3 {
            mean[k] += vi[k];
        }
    }
    for k in 0..3 {
        mean[k] /= num as f64;
    }
    for vi in v.iter_mut() {
        for k in 0..3 {
            vi[k] -= mean[k];
        }
    }

    let v2: f64 = v
        .iter()
        .map(|vi| vi[0] * vi[0] + vi[1] * vi[1] + vi[2] * vi[2])
        .sum();
    if v2 > 0.0 {
        let scale = (3.0 * (num as f64 - 1.0) * temperature / v2).sqrt();
        for vi in v.iter_mut() {
            for k in 0..3 {
                vi[k] *= scale;
            }
        }
    }
    Ok(v)
}

/// Build the starting state: an FCC crystal of `4 * cells^3` atoms at
/// `density`, with velocities thermalised to `temperature`.
pub fn initialize(cells: usize, density: f64, temperature: f64, seed: u64) -> Result<SimulationState> {
    if cells == 0 {
        return invalid("number of unit cells must be positive");
    }
    if !(density > 0.0) || !density.is_finite() {
        return invalid(format!("density must be positive, found {}", density));
    }
    if !(temperature > 0.0) || !temperature.is_finite() {
        return invalid(format!("temperature must be positive, found {}", temperature));
    }

    let a = lattice_constant(density);
    let b = a * cells as f64;
    let x = fcc_positions(cells, a);

    let mut rng = Pcg64::seed_from_u64(seed);
    let v = thermal_velocities(x.len(), temperature, &mut rng)?;

    info!(
        "initialized {} atoms on a {}^3 fcc lattice (a = {:.5}, box = {:.5})",
        x.len(),
        cells,
        a,
        b
    );

    Ok(SimulationState::new(x, v, b))
}

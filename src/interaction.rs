//! Pairwise Lennard-Jones forces under the minimum-image convention.

use std::ops::AddAssign;

use rayon::prelude::*;

use crate::error::{invalid, Result, SimError};

pub trait Interaction {
    /// Squared distance beyond which pairs are ignored.
    fn cutoff_sq(&self) -> f64;
    /// Pair energy and force-over-distance factor at squared separation `dr2`.
    fn evaluate(&self, dr2: f64) -> (f64, f64);
}

/// Lennard-Jones 12-6 parameters with a hard spherical cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceFieldParams {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: f64,
    pub cutoff_sq: f64,
}

impl ForceFieldParams {
    /// Reduced units, `epsilon = sigma = 1`.
    pub fn new(cutoff: f64) -> Result<Self> {
        if !(cutoff > 0.0) || !cutoff.is_finite() {
            return invalid(format!("cutoff must be positive, found {}", cutoff));
        }
        Ok(ForceFieldParams {
            epsilon: 1.0,
            sigma: 1.0,
            cutoff,
            cutoff_sq: cutoff * cutoff,
        })
    }

    /// The minimum image is only unique while the cutoff sphere fits in half the box.
    pub fn check_box(&self, b: f64) -> Result<()> {
        if self.cutoff >= 0.5 * b {
            return invalid(format!(
                "cutoff {} must be smaller than half the box length {}",
                self.cutoff,
                0.5 * b
            ));
        }
        Ok(())
    }
}

impl Interaction for ForceFieldParams {
    fn cutoff_sq(&self) -> f64 {
        self.cutoff_sq
    }

    fn evaluate(&self, dr2: f64) -> (f64, f64) {
        let s2 = self.sigma * self.sigma / dr2;
        let s6 = s2 * s2 * s2;
        let u = 4.0 * self.epsilon * s6 * (s6 - 1.0);
        let f = 4.0 * self.epsilon * s6 * (1.0 / dr2) * (12.0 * s6 - 6.0);
        (u, f)
    }
}

/// Output of one force evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    pub forces: Vec<[f64; 3]>,
    pub potential: f64,
    /// Sum of `r . F` over included pairs.
    pub virial: f64,
}

/// Map a displacement component onto the nearest periodic image.
#[inline]
pub fn minimum_image(d: f64, b: f64) -> f64 {
    d - (d / b).round() * b
}

/// Minimum-image displacement `x1 - x2`.
#[inline]
pub fn pbc_vdr_vec(x1: &[f64; 3], x2: &[f64; 3], b: f64) -> [f64; 3] {
    [
        minimum_image(x1[0] - x2[0], b),
        minimum_image(x1[1] - x2[1], b),
        minimum_image(x1[2] - x2[2], b),
    ]
}

#[derive(Default, Debug, Copy, Clone, PartialEq)]
pub struct KahanAdder {
    accum: f64,
    comp: f64,
}

impl KahanAdder {
    pub fn new() -> Self {
        KahanAdder { accum: 0.0, comp: 0.0 }
    }

    fn add(&mut self, num: &f64) {
        let y = num - self.comp;
        let t = self.accum + y;
        self.comp = (t - self.accum) - y;
        self.accum = t;
    }

    pub fn result(&self) -> f64 {
        self.accum
    }

    /// Fold in another running sum together with its pending correction.
    pub fn merge(&mut self, other: &KahanAdder) {
        self.add(&other.accum);
        self.add(&-other.comp);
    }
}

impl AddAssign<f64> for KahanAdder {
    fn add_assign(&mut self, other: f64) {
        self.add(&other);
    }
}

/// How pair evaluations are scheduled.
pub enum Kernel {
    /// Fixed loop order, bit-reproducible.
    Serial,
    /// Rows of the pair triangle spread over a rayon pool.
    Parallel(rayon::ThreadPool),
}

pub struct ForceEngine<I: Interaction = ForceFieldParams> {
    pub interaction: I,
    kernel: Kernel,
}

impl<I: Interaction + Sync> ForceEngine<I> {
    pub fn serial(interaction: I) -> Self {
        ForceEngine { interaction, kernel: Kernel::Serial }
    }

    pub fn parallel(interaction: I, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .or_else(|e| invalid(format!("unable to build thread pool: {}", e)))?;
        Ok(ForceEngine { interaction, kernel: Kernel::Parallel(pool) })
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.kernel, Kernel::Parallel(_))
    }

    pub fn compute(&self, x: &[[f64; 3]], b: f64) -> Result<PairResult> {
        let res = match &self.kernel {
            Kernel::Serial => f_system_lj(&self.interaction, x, b)?,
            Kernel::Parallel(pool) => pool.install(|| f_system_lj_par(&self.interaction, x, b))?,
        };
        check_finite(&res)?;
        Ok(res)
    }
}

fn check_finite(res: &PairResult) -> Result<()> {
    if !res.potential.is_finite() {
        return Err(SimError::NonFinite { quantity: "potential energy", atom: None });
    }
    if !res.virial.is_finite() {
        return Err(SimError::NonFinite { quantity: "virial", atom: None });
    }
    for (i, f) in res.forces.iter().enumerate() {
        if !(f[0].is_finite() && f[1].is_finite() && f[2].is_finite()) {
            return Err(SimError::NonFinite { quantity: "force", atom: Some(i) });
        }
    }
    Ok(())
}

/// Serial reference kernel, `i` outer and `j < i` inner.
pub fn f_system_lj<I: Interaction>(lj: &I, x: &[[f64; 3]], b: f64) -> Result<PairResult> {
    let num = x.len();
    let rc2 = lj.cutoff_sq();
    let mut forces = vec![[0.0f64; 3]; num];
    let mut potential = 0.0f64;
    let mut virial = 0.0f64;

    for i in 0..num {
        for j in 0..i {
            let dr = pbc_vdr_vec(&x[i], &x[j], b);
            let dr2 = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2];
            if dr2 >= rc2 {
                continue;
            }
            if dr2 == 0.0 {
                return Err(SimError::NumericalInstability { i: j, j: i });
            }
            let (u, mag) = lj.evaluate(dr2);
            for k in 0..3 {
                let comp = mag * dr[k];
                forces[i][k] += comp;
                forces[j][k] -= comp;
            }
            potential += u;
            virial += dr2 * mag;
        }
    }

    Ok(PairResult { forces, potential, virial })
}

struct Partial {
    forces: Vec<[f64; 3]>,
    potential: KahanAdder,
    virial: KahanAdder,
    overlap: Option<(usize, usize)>,
}

impl Partial {
    fn new(num: usize) -> Self {
        Partial {
            forces: vec![[0.0; 3]; num],
            potential: KahanAdder::new(),
            virial: KahanAdder::new(),
            overlap: None,
        }
    }

    fn merge(mut self, other: Partial) -> Self {
        for (fa, fb) in self.forces.iter_mut().zip(other.forces.iter()) {
            for k in 0..3 {
                fa[k] += fb[k];
            }
        }
        self.potential.merge(&other.potential);
        self.virial.merge(&other.virial);
        self.overlap = self.overlap.or(other.overlap);
        self
    }
}

/// Thread-local force buffers per rayon job, merged by reduction.
pub fn f_system_lj_par<I: Interaction + Sync>(lj: &I, x: &[[f64; 3]], b: f64) -> Result<PairResult> {
    let num = x.len();
    let rc2 = lj.cutoff_sq();

    let total = (0..num)
        .into_par_iter()
        .fold(
            || Partial::new(num),
            |mut acc, i| {
                for j in 0..i {
                    let dr = pbc_vdr_vec(&x[i], &x[j], b);
                    let dr2 = dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2];
                    if dr2 >= rc2 {
                        continue;
                    }
                    if dr2 == 0.0 {
                        acc.overlap = acc.overlap.or(Some((j, i)));
                        continue;
                    }
                    let (u, mag) = lj.evaluate(dr2);
                    for k in 0..3 {
                        let comp = mag * dr[k];
                        acc.forces[i][k] += comp;
                        acc.forces[j][k] -= comp;
                    }
                    acc.potential += u;
                    acc.virial += dr2 * mag;
                }
                acc
            },
        )
        .reduce(|| Partial::new(num), Partial::merge);

    if let Some((i, j)) = total.overlap {
        return Err(SimError::NumericalInstability { i, j });
    }

    Ok(PairResult {
        forces: total.forces,
        potential: total.potential.result(),
        virial: total.virial.result(),
    })
}

//! Radial distribution function of a single configuration.

use std::f64::consts::PI;

use crate::error::{invalid, Result};
use crate::interaction::pbc_vdr_vec;

pub const DEFAULT_RDF_BINS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RdfBin {
    /// Bin centre.
    pub r: f64,
    pub g: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RdfHistogram {
    pub bins: Vec<RdfBin>,
    pub dr: f64,
}

impl RdfHistogram {
    /// `sum rho g(r) 4 pi r^2 dr` over every bin with centre below `r_max`.
    pub fn coordination(&self, density: f64, r_max: f64) -> f64 {
        self.bins
            .iter()
            .take_while(|bin| bin.r < r_max)
            .map(|bin| density * bin.g * 4.0 * PI * bin.r * bin.r * self.dr)
            .sum()
    }

    /// Centre of the bin with the largest `g(r)`.
    pub fn first_peak(&self) -> Option<f64> {
        self.bins
            .iter()
            .filter(|bin| bin.g.is_finite())
            .fold(None, |best: Option<RdfBin>, bin| match best {
                Some(b) if b.g >= bin.g => Some(b),
                _ => Some(*bin),
            })
            .map(|bin| bin.r)
    }
}

/// Histogram all minimum-image pair distances up to half the box and
/// normalise by the ideal-gas shell count.
pub fn correlation_function(x: &[[f64; 3]], b: f64, bins: usize) -> Result<RdfHistogram> {
    let num = x.len();
    if bins == 0 {
        return invalid("rdf needs at least one bin");
    }
    if num < 2 {
        return invalid(format!("rdf needs at least two atoms, found {}", num));
    }
    if !(b > 0.0) {
        return invalid(format!("box length must be positive, found {}", b));
    }

    let r_max = 0.5 * b;
    let dr = r_max / bins as f64;
    let mut counts = vec![0u64; bins];

    for i in 0..num {
        for j in 0..i {
            let d = pbc_vdr_vec(&x[i], &x[j], b);
            let r = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            let idx = (r / dr) as usize;
            if idx < bins {
                counts[idx] += 1;
            }
        }
    }

    let n = num as f64;
    let norm = 2.0 * b * b * b / (n * (n - 1.0));
    let centres = itertools_num::linspace(0.5 * dr, r_max - 0.5 * dr, bins);
    let bins = centres
        .zip(counts.iter())
        .map(|(r, &c)| RdfBin {
            r,
            g: norm * c as f64 / (4.0 * PI * r * r * dr),
        })
        .collect();

    Ok(RdfHistogram { bins, dr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice;
    use approx::assert_relative_eq;
    use rand::prelude::*;
    use rand_pcg::Pcg64;

    fn ideal_gas(num: usize, b: f64, seed: u64) -> Vec<[f64; 3]> {
        let mut rng = Pcg64::seed_from_u64(seed);
        (0..num)
            .map(|_| [rng.gen::<f64>() * b, rng.gen::<f64>() * b, rng.gen::<f64>() * b])
            .collect()
    }

    #[test]
    fn bin_centres_are_evenly_spaced() {
        let x = ideal_gas(20, 4.0, 1);
        let rdf = correlation_function(&x, 4.0, 10).unwrap();
        assert_eq!(rdf.bins.len(), 10);
        assert_relative_eq!(rdf.dr, 0.2);
        assert_relative_eq!(rdf.bins[0].r, 0.1, epsilon = 1e-12);
        assert_relative_eq!(rdf.bins[9].r, 1.9, epsilon = 1e-12);
    }

    #[test]
    fn ideal_gas_tail_is_flat() {
        let b = 10.0;
        let x = ideal_gas(400, b, 2);
        let rdf = correlation_function(&x, b, DEFAULT_RDF_BINS).unwrap();
        let tail: f64 = rdf.bins[25..].iter().map(|bin| bin.g).sum::<f64>() / 25.0;
        assert!((tail - 1.0).abs() < 0.1, "ideal gas g(r) tail {}", tail);
    }

    #[test]
    fn coordination_counts_pairs() {
        let b = 10.0;
        let num = 500;
        let x = ideal_gas(num, b, 3);
        let rdf = correlation_function(&x, b, DEFAULT_RDF_BINS).unwrap();
        let density = num as f64 / (b * b * b);

        // identity: each counted pair adds 2 / (N - 1)
        let mut pairs = 0u64;
        for i in 0..num {
            for j in 0..i {
                let d = pbc_vdr_vec(&x[i], &x[j], b);
                if (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt() < 0.5 * b {
                    pairs += 1;
                }
            }
        }
        let total = rdf.coordination(density, f64::INFINITY);
        assert_relative_eq!(total, 2.0 * pairs as f64 / (num as f64 - 1.0), max_relative = 1e-9);

        // uniform gas: neighbours inside the inscribed sphere
        let expected = density * 4.0 / 3.0 * PI * (0.5 * b).powi(3);
        assert_relative_eq!(total, expected, max_relative = 0.03);
    }

    #[test]
    fn fcc_first_peak_at_nearest_neighbour() {
        let density = 0.8;
        let cells = 4;
        let a = lattice::lattice_constant(density);
        let x = lattice::fcc_positions(cells, a);
        let rdf = correlation_function(&x, a * cells as f64, 100).unwrap();
        let peak = rdf.first_peak().unwrap();
        assert!((peak - a / 2f64.sqrt()).abs() <= rdf.dr, "peak at {}", peak);
        // nothing closer than the nearest neighbour shell
        for bin in rdf.bins.iter().filter(|bin| bin.r < 0.5 * a) {
            assert_eq!(bin.g, 0.0);
        }
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(correlation_function(&[[0.0; 3]], 5.0, 10).is_err());
        assert!(correlation_function(&[[0.0; 3], [1.0; 3]], 5.0, 0).is_err());
    }
}

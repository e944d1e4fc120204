//! Block averaging of correlated time series.
//!
//! A series of length `L` is cut into `K` contiguous blocks of `L / K`
//! samples (trailing remainder dropped). Block means become the samples
//! of the estimate, and their spread is the reported error. The estimate
//! is only honest once a block is longer than the correlation time of the
//! series; [`block_error_curve`] sweeps `K` so that plateau can be found
//! by eye.

use crate::error::{invalid, Result};

/// Welford accumulator for mean and population variance.
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn std_dev(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            (self.m2 / self.n as f64).sqrt()
        }
    }
}

fn stats(xs: &[f64]) -> RunningStats {
    let mut s = RunningStats::default();
    for &x in xs {
        s.push(x);
    }
    s
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatistics {
    /// Mean of the block means.
    pub mean: f64,
    /// Standard deviation of the block means.
    pub std_error: f64,
    pub block_means: Vec<f64>,
    pub block_std_devs: Vec<f64>,
}

impl BlockStatistics {
    pub fn num_blocks(&self) -> usize {
        self.block_means.len()
    }
}

pub fn block_statistics(series: &[f64], blocks: usize) -> Result<BlockStatistics> {
    if blocks < 1 {
        return invalid("block count must be at least 1");
    }
    if blocks > series.len() {
        return invalid(format!(
            "block count {} exceeds series length {}",
            blocks,
            series.len()
        ));
    }

    let block_len = series.len() / blocks;
    let used = &series[..block_len * blocks];

    let mut block_means = Vec::with_capacity(blocks);
    let mut block_std_devs = Vec::with_capacity(blocks);
    for chunk in used.chunks_exact(block_len) {
        let s = stats(chunk);
        block_means.push(s.mean);
        block_std_devs.push(s.std_dev());
    }

    let over_blocks = stats(&block_means);
    Ok(BlockStatistics {
        mean: over_blocks.mean,
        std_error: over_blocks.std_dev(),
        block_means,
        block_std_devs,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockErrorPoint {
    pub block_count: usize,
    pub block_length: usize,
    pub std_error: f64,
}

/// Error estimate for every block count in `[1, L - 1]`.
pub fn block_error_curve(series: &[f64]) -> Result<Vec<BlockErrorPoint>> {
    if series.len() < 2 {
        return invalid(format!(
            "block sweep needs at least two samples, found {}",
            series.len()
        ));
    }
    (1..series.len())
        .map(|k| {
            block_statistics(series, k).map(|s| BlockErrorPoint {
                block_count: k,
                block_length: series.len() / k,
                std_error: s.std_error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_block_is_plain_mean() {
        let xs = [1.0, 4.0, 2.5, -3.0, 7.25];
        let s = block_statistics(&xs, 1).unwrap();
        assert_eq!(s.std_error, 0.0);
        assert_relative_eq!(s.mean, 11.75 / 5.0, max_relative = 1e-12);
        assert_eq!(s.num_blocks(), 1);
    }

    #[test]
    fn constant_series_has_no_error() {
        let xs = vec![0.1; 97];
        for k in 1..=97 {
            let s = block_statistics(&xs, k).unwrap();
            assert_eq!(s.std_error, 0.0, "k = {}", k);
            assert_eq!(s.mean, 0.1);
        }
    }

    #[test]
    fn remainder_is_dropped() {
        let xs = [1.0, 3.0, 5.0, 7.0, 100.0];
        let s = block_statistics(&xs, 2).unwrap();
        assert_eq!(s.block_means, vec![2.0, 6.0]);
        assert_eq!(s.block_std_devs, vec![1.0, 1.0]);
        assert_relative_eq!(s.mean, 4.0);
        assert_relative_eq!(s.std_error, 2.0);
    }

    #[test]
    fn invalid_block_counts() {
        let xs = [1.0, 2.0, 3.0];
        assert!(block_statistics(&xs, 0).is_err());
        assert!(block_statistics(&xs, 4).is_err());
        assert!(block_statistics(&xs, 3).is_ok());
    }

    #[test]
    fn error_curve_covers_all_counts() {
        let xs: Vec<f64> = (0..40).map(|i| (i as f64 * 0.7).sin()).collect();
        let curve = block_error_curve(&xs).unwrap();
        assert_eq!(curve.len(), 39);
        assert_eq!(curve[0].block_count, 1);
        assert_eq!(curve[0].std_error, 0.0);
        assert_eq!(curve[38].block_count, 39);
        assert_eq!(curve[38].block_length, 1);
        assert_eq!(curve[9].block_length, 4);
        assert!(block_error_curve(&xs[..1]).is_err());
    }
}

/// Summary statistics over a set of samples.
///
/// Quartiles use the nearest-rank method and the standard deviation is the
/// population one. An empty input yields an all-zero summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub std_dev: f64,
}

impl Statistics {
    pub fn calculate(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        Self {
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            median,
            q1: sorted[nearest_rank(n, 0.25)],
            q3: sorted[nearest_rank(n, 0.75)],
            std_dev: variance.sqrt(),
        }
    }
}

fn nearest_rank(n: usize, percentile: f64) -> usize {
    let rank = (n as f64 * percentile).ceil() as isize - 1;
    rank.clamp(0, n as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_sample() {
        let stats = Statistics::calculate(&[40.0, 10.0, 30.0, 20.0]);

        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.q1, 10.0);
        assert_eq!(stats.q3, 30.0);
        assert!((stats.std_dev - 11.180339887).abs() < 1e-9);
    }

    #[test]
    fn odd_sample() {
        let stats = Statistics::calculate(&[3.0, 1.0, 2.0]);

        assert_eq!((stats.min, stats.max), (1.0, 3.0));
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.median, 2.0);
        assert_eq!((stats.q1, stats.q3), (1.0, 3.0));
    }

    #[test]
    fn empty_sample() {
        assert_eq!(Statistics::calculate(&[]), Statistics::default());
    }

    #[test]
    fn single_sample() {
        let stats = Statistics::calculate(&[7.5]);

        assert_eq!(stats.q1, 7.5);
        assert_eq!(stats.q3, 7.5);
        assert_eq!(stats.median, 7.5);
        assert_eq!(stats.std_dev, 0.0);
    }
}

//! Utility functions for silvae and its binaries.

pub fn arg_max<T: PartialOrd + Copy>(values: &[T]) -> (usize, T) {
    values.iter().enumerate().fold(
        (0, values[0]),
        |(i_max, v_max), (i, &v)| {
            if v > v_max {
                (i, v)
            } else {
                (i_max, v_max)
            }
        },
    )
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance(values: &[f64], mean: f64) -> f64 {
    values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / values.len() as f64
}

/// An empirical distribution of observations, summarized by order
/// statistics. Used by `tree_info` to describe leaf depths, leaf
/// populations and leaf entropies.
#[derive(Debug)]
pub struct Distribution {
    values: Vec<f64>,
}

impl Distribution {
    /// Sorts the observations once at construction; every summary below is
    /// then an O(1) lookup or a single pass.
    ///
    /// # Panics
    ///
    /// * If `values` is empty.
    pub fn new(mut values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "a distribution needs observations");
        values.sort_by(f64::total_cmp);
        Distribution { values }
    }

    pub fn min(&self) -> f64 {
        self.values[0]
    }

    pub fn max(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    pub fn median(&self) -> f64 {
        self.nth_percentile(50)
    }

    pub fn nth_percentile(&self, percentile: usize) -> f64 {
        let index = percentile * self.values.len() / 100;
        self.values[index.min(self.values.len() - 1)]
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }

    pub fn variance(&self) -> f64 {
        variance(&self.values, self.mean())
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_arg_max() {
        let values = [0.3, 2.0, -1.0, 2.0];
        assert_eq!(arg_max(&values), (1, 2.0));
    }

    #[test]
    fn test_distribution() {
        let d = Distribution::new(vec![3.0, 1.0, 2.0, 4.0]);
        assert!(approx_eq!(f64, d.min(), 1.0));
        assert!(approx_eq!(f64, d.max(), 4.0));
        assert!(approx_eq!(f64, d.mean(), 2.5));
        assert!(approx_eq!(f64, d.median(), 3.0));
        assert!(approx_eq!(f64, d.variance(), 1.25));
    }
}

//! Sample statistics shared by the metrics engine.
//!
//! Standard deviation is the sample (n - 1) estimator. Fewer than two samples
//! leave it undefined, reported as `None`.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// `value` if finite, else 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn stddev_needs_two_samples() {
        assert_eq!(sample_stddev(&[]), None);
        assert_eq!(sample_stddev(&[1.0]), None);
    }

    #[test]
    fn stddev_known_values() {
        // sample variance of 2,4,4,4,5,5,7,9 is 32/7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(sample_stddev(&v).unwrap(), (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn stddev_of_constant_is_zero() {
        assert_eq!(sample_stddev(&[3.0, 3.0, 3.0]), Some(0.0));
    }

    #[test]
    fn finite_or_zero_filters_nan_and_inf() {
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(-1.5), -1.5);
    }
}

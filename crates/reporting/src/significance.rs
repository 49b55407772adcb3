//! Two-sample comparison of a metric between a control and a treatment group.
//!
//! Pooled-variance t statistic with a two-sided Student's t p-value on
//! `n1 + n2 - 2` degrees of freedom.

use serde::{Deserialize, Serialize};
use spend_core::{SpendError, SpendResult};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Significance level for `is_significant`.
pub const ALPHA: f64 = 0.05;

const Z_95: f64 = 1.96;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    /// `None` when both samples have zero variance.
    pub t_statistic: Option<f64>,
    pub p_value: f64,
    pub is_significant: bool,
    pub effect_size_cohens_d: Option<f64>,
    /// `treatment_mean - control_mean`.
    pub mean_difference: f64,
    pub confidence_interval: (f64, f64),
    pub control_mean: f64,
    pub treatment_mean: f64,
}

pub fn two_sample_test(control: &[f64], treatment: &[f64]) -> SpendResult<SignificanceResult> {
    if control.len() < 2 || treatment.len() < 2 {
        return Err(SpendError::InsufficientData(format!(
            "each group needs at least 2 observations (control {}, treatment {})",
            control.len(),
            treatment.len()
        )));
    }

    let (n1, n2) = (control.len() as f64, treatment.len() as f64);
    let (control_mean, control_var) = mean_and_variance(control);
    let (treatment_mean, treatment_var) = mean_and_variance(treatment);

    let pooled_std =
        (((n1 - 1.0) * control_var + (n2 - 1.0) * treatment_var) / (n1 + n2 - 2.0)).sqrt();
    let mean_difference = treatment_mean - control_mean;
    let se = pooled_std * (1.0 / n1 + 1.0 / n2).sqrt();

    let (t_statistic, effect_size, p_value) = if se > 0.0 {
        let t = mean_difference / se;
        let p = two_sided_p_value(t, n1 + n2 - 2.0)?;
        (Some(t), Some(mean_difference / pooled_std), p)
    } else if mean_difference == 0.0 {
        (None, None, 1.0)
    } else {
        (None, None, 0.0)
    };

    Ok(SignificanceResult {
        t_statistic,
        p_value,
        is_significant: p_value < ALPHA,
        effect_size_cohens_d: effect_size,
        mean_difference,
        confidence_interval: (mean_difference - Z_95 * se, mean_difference + Z_95 * se),
        control_mean,
        treatment_mean,
    })
}

/// Mean and sample variance (n - 1).
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Two-sided tail probability of Student's t with `df` degrees of freedom at `|t|`.
fn two_sided_p_value(t: f64, df: f64) -> SpendResult<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| {
        SpendError::InsufficientData(format!("t distribution with {df} degrees of freedom: {e}"))
    })?;
    Ok((2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clearly_different_groups() {
        let control = [1.0, 2.0, 3.0, 4.0, 5.0];
        let treatment = [6.0, 7.0, 8.0, 9.0, 10.0];
        let r = two_sample_test(&control, &treatment).unwrap();

        assert!((r.mean_difference - 5.0).abs() < 1e-9);
        assert!((r.t_statistic.unwrap() - 5.0).abs() < 1e-9);
        assert!((r.effect_size_cohens_d.unwrap() - 5.0 / 2.5f64.sqrt()).abs() < 1e-9);
        // df = 8
        assert!((r.p_value - 0.0010528).abs() < 1e-6);
        assert!(r.is_significant);
        assert!((r.confidence_interval.0 - 3.04).abs() < 1e-9);
        assert!((r.confidence_interval.1 - 6.96).abs() < 1e-9);
    }

    #[test]
    fn test_identical_groups_not_significant() {
        let sample = [0.02, 0.03, 0.025, 0.035];
        let r = two_sample_test(&sample, &sample).unwrap();
        assert!(r.mean_difference.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-6);
        assert!(!r.is_significant);
    }

    #[test]
    fn test_constant_groups() {
        let r = two_sample_test(&[0.1, 0.1], &[0.1, 0.1]).unwrap();
        assert_eq!(r.t_statistic, None);
        assert_eq!(r.p_value, 1.0);

        let r = two_sample_test(&[0.1, 0.1], &[0.2, 0.2]).unwrap();
        assert_eq!(r.p_value, 0.0);
        assert!(r.is_significant);
    }

    #[test]
    fn test_too_few_observations() {
        assert!(matches!(
            two_sample_test(&[1.0], &[1.0, 2.0]),
            Err(SpendError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_small_samples_use_t_tail() {
        // t = 2.1 on 8 degrees of freedom: a normal tail would give 0.036.
        let control = [0.0, 1.0, 2.0, 3.0, 4.0];
        let treatment = [2.1, 3.1, 4.1, 5.1, 6.1];
        let r = two_sample_test(&control, &treatment).unwrap();

        assert!((r.t_statistic.unwrap() - 2.1).abs() < 1e-9);
        assert!((r.p_value - 0.068938).abs() < 1e-5);
        assert!(!r.is_significant);
    }

    #[test]
    fn test_p_value_is_symmetric() {
        let lo = two_sided_p_value(-1.5, 10.0).unwrap();
        let hi = two_sided_p_value(1.5, 10.0).unwrap();
        assert!((lo - hi).abs() < 1e-12);
        // 97.5th percentile of t with 8 degrees of freedom.
        assert!((two_sided_p_value(2.306004, 8.0).unwrap() - 0.05).abs() < 1e-5);
    }
}

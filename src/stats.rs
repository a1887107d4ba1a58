use anyhow::{Result, bail};

pub const SIGNIFICANCE_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Copy)]
pub struct PairedTTest {
    pub sample_size: usize,
    pub mean_difference: f64,
    pub statistic: f64,
    pub p_value: f64,
}

impl PairedTTest {
    pub fn is_significant(&self) -> bool {
        self.p_value < SIGNIFICANCE_ALPHA
    }
}

/// Paired t-test over two score sequences measured on the same papers.
/// Callers guarantee alignment by construction (same paper order on both
/// sides); a length mismatch is the one misalignment this can detect, and
/// it fails loudly instead of producing a meaningless statistic.
pub fn paired_t_test(left: &[f64], right: &[f64]) -> Result<PairedTTest> {
    if left.len() != right.len() {
        bail!(
            "paired score sequences differ in length ({} vs {})",
            left.len(),
            right.len()
        );
    }

    let sample_size = left.len();
    if sample_size < 2 {
        bail!("paired t-test requires at least 2 aligned samples, got {sample_size}");
    }

    let differences = left
        .iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| left_value - right_value)
        .collect::<Vec<f64>>();

    let n = sample_size as f64;
    let mean_difference = differences.iter().sum::<f64>() / n;
    let variance = differences
        .iter()
        .map(|difference| {
            let deviation = difference - mean_difference;
            deviation * deviation
        })
        .sum::<f64>()
        / (n - 1.0);

    if variance <= 0.0 {
        // all differences identical: either no effect at all or a constant
        // shift with no sampling noise
        let (statistic, p_value) = if mean_difference == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(mean_difference), 0.0)
        };
        return Ok(PairedTTest {
            sample_size,
            mean_difference,
            statistic,
            p_value,
        });
    }

    let standard_error = (variance / n).sqrt();
    let statistic = mean_difference / standard_error;
    let degrees_of_freedom = n - 1.0;
    let p_value = student_t_two_sided_p(statistic, degrees_of_freedom);

    Ok(PairedTTest {
        sample_size,
        mean_difference,
        statistic,
        p_value,
    })
}

pub fn student_t_two_sided_p(statistic: f64, degrees_of_freedom: f64) -> f64 {
    if !statistic.is_finite() {
        return 0.0;
    }
    let x = degrees_of_freedom / (degrees_of_freedom + statistic * statistic);
    regularized_incomplete_beta(degrees_of_freedom / 2.0, 0.5, x).clamp(0.0, 1.0)
}

fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b)
        + a * x.ln()
        + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 200;
    const EPSILON: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;

        let numerator = m_f * (b - m_f) * x / ((qam + m2) * (a + m2));
        d = 1.0 + numerator * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + numerator / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let numerator = -(a + m_f) * (qab + m_f) * x / ((a + m2) * (qap + m2));
        d = 1.0 + numerator * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + numerator / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    h
}

fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];

    let mut denominator = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000_000_000_190_015;
    for coefficient in COEFFICIENTS {
        denominator += 1.0;
        series += coefficient / denominator;
    }
    -tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_sample_case_matches_closed_form() {
        // n=2, differences [0, 2]: t = 1 and p = 0.5 exactly for df=1
        let result = paired_t_test(&[1.0, 3.0], &[1.0, 1.0]).unwrap();
        assert_eq!(result.sample_size, 2);
        assert!((result.statistic - 1.0).abs() < 1e-12);
        assert!((result.p_value - 0.5).abs() < 1e-9);
        assert!(!result.is_significant());
    }

    #[test]
    fn three_sample_case_matches_reference_values() {
        // differences [1, 2, 3]: t = 2 / (1/sqrt(3)), df = 2, p ~ 0.07418
        let result = paired_t_test(&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0]).unwrap();
        assert!((result.statistic - 3.464_101_615).abs() < 1e-6);
        assert!((result.p_value - 0.074_179_9).abs() < 1e-4);
        assert!((result.mean_difference - 2.0).abs() < 1e-12);
    }

    #[test]
    fn swapping_sides_negates_the_statistic_and_keeps_p() {
        let left = [0.81, 0.74, 0.69, 0.88, 0.71];
        let right = [0.78, 0.70, 0.72, 0.80, 0.66];
        let forward = paired_t_test(&left, &right).unwrap();
        let backward = paired_t_test(&right, &left).unwrap();
        assert!((forward.statistic + backward.statistic).abs() < 1e-12);
        assert!((forward.p_value - backward.p_value).abs() < 1e-12);
    }

    #[test]
    fn identical_sequences_yield_t_zero_and_p_one() {
        let scores = [0.4, 0.6, 0.8, 0.5];
        let result = paired_t_test(&scores, &scores).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn constant_nonzero_shift_is_maximally_significant() {
        let left = [0.5, 0.6, 0.7];
        let right = [0.4, 0.5, 0.6];
        let result = paired_t_test(&left, &right).unwrap();
        assert!(result.statistic.is_infinite());
        assert_eq!(result.p_value, 0.0);
        assert!(result.is_significant());
    }

    #[test]
    fn mismatched_lengths_fail_loudly() {
        assert!(paired_t_test(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn fewer_than_two_samples_fail_loudly() {
        assert!(paired_t_test(&[1.0], &[1.0]).is_err());
        assert!(paired_t_test(&[], &[]).is_err());
    }

    #[test]
    fn large_statistic_drives_p_toward_zero() {
        let p = student_t_two_sided_p(50.0, 20.0);
        assert!(p < 1e-10);
        assert!(p >= 0.0);
    }

    #[test]
    fn zero_statistic_has_p_one() {
        let p = student_t_two_sided_p(0.0, 10.0);
        assert!((p - 1.0).abs() < 1e-12);
    }
}

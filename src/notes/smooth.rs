use crate::error::{ScoreError, ScoreResult};

/// Causal exponential moving average over a raw pitch series.
///
/// `smoothed[0] = raw[0]`, then `smoothed[i] = alpha * raw[i] + (1 - alpha) * smoothed[i - 1]`.
/// An `alpha` of 1.0 leaves the series untouched.
pub fn smooth(raw: &[f64], alpha: f64) -> ScoreResult<Vec<f64>> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(ScoreError::InvalidParameter {
            name: "alpha",
            value: alpha,
        });
    }
    let (&first, rest) = raw
        .split_first()
        .ok_or(ScoreError::EmptyInput { stage: "pitch smoothing" })?;

    let mut smoothed = Vec::with_capacity(raw.len());
    smoothed.push(first);
    let mut prev = first;
    for &value in rest {
        prev = alpha * value + (1.0 - alpha) * prev;
        smoothed.push(prev);
    }
    Ok(smoothed)
}

/// Smoothing factor equivalent to a half-life of `halflife` samples.
pub fn alpha_from_halflife(halflife: f64) -> ScoreResult<f64> {
    if !(halflife.is_finite() && halflife > 0.0) {
        return Err(ScoreError::InvalidParameter {
            name: "halflife",
            value: halflife,
        });
    }
    Ok(1.0 - (-std::f64::consts::LN_2 / halflife).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_passes_through() {
        for &alpha in &[0.01, 0.4, 1.0] {
            assert_eq!(smooth(&[330.0], alpha).unwrap(), vec![330.0]);
        }
    }

    #[test]
    fn alpha_one_is_identity() {
        let raw = vec![220.0, 0.0, 440.0, 441.5, 0.0];
        assert_eq!(smooth(&raw, 1.0).unwrap(), raw);
    }

    #[test]
    fn follows_recurrence() {
        let out = smooth(&[100.0, 200.0, 200.0], 0.5).unwrap();
        assert_eq!(out, vec![100.0, 150.0, 175.0]);
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(matches!(smooth(&[], 0.4), Err(ScoreError::EmptyInput { .. })));
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        assert!(smooth(&[1.0], 0.0).is_err());
        assert!(smooth(&[1.0], 1.5).is_err());
        assert!(smooth(&[1.0], f64::NAN).is_err());
    }

    #[test]
    fn halflife_decays_to_half() {
        let alpha = alpha_from_halflife(30.0).unwrap();
        assert!(((1.0 - alpha).powi(30) - 0.5).abs() < 1e-12);
        assert!(alpha_from_halflife(0.0).is_err());
    }
}

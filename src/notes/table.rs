use crate::error::{ScoreError, ScoreResult};

/// Middle C (C4), the bottom of the default note range.
pub const MIDDLE_C_HZ: f64 = 261.6256;

/// Ascending equal-temperament note boundaries, starting at a reference pitch.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyTable {
    boundaries: Vec<f64>,
}

impl FrequencyTable {
    /// Build semitone steps from `lowest_freq` until the first step at or
    /// above `max_freq`, which is included.
    pub fn build(lowest_freq: f64, max_freq: f64) -> ScoreResult<Self> {
        if !lowest_freq.is_finite()
            || lowest_freq <= 0.0
            || !max_freq.is_finite()
            || max_freq <= lowest_freq
        {
            return Err(ScoreError::InvalidRange {
                lowest: lowest_freq,
                max: max_freq,
            });
        }

        let mut boundaries = vec![lowest_freq];
        let mut n = 1;
        loop {
            let freq = lowest_freq * 2f64.powf(n as f64 / 12.0);
            boundaries.push(freq);
            if freq >= max_freq {
                break;
            }
            n += 1;
        }

        log::debug!(
            "Frequency table: {} notes, {:.2} Hz - {:.2} Hz",
            boundaries.len(),
            lowest_freq,
            boundaries[boundaries.len() - 1]
        );

        Ok(Self { boundaries })
    }

    /// Note index for `freq`: the number of boundaries above `table[0]` that
    /// `freq` reaches. Anything below `table[1]` is note 0, anything past the
    /// top saturates at the last index.
    pub fn quantize(&self, freq: f64) -> usize {
        self.boundaries[1..]
            .iter()
            .take_while(|&&boundary| freq >= boundary)
            .count()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_c_to_1000_hz() {
        let table = FrequencyTable::build(MIDDLE_C_HZ, 1000.0).unwrap();
        let b = &table.boundaries;
        let expected_head = [261.6256, 277.18, 293.66, 311.13, 329.63, 349.23];
        for (got, want) in b.iter().zip(expected_head.iter()) {
            assert!((got - want).abs() < 0.01, "{} vs {}", got, want);
        }
        // Two octaves plus the closing C6
        assert_eq!(table.len(), 25);
        assert!((b[24] - 1046.5).abs() < 0.01);
    }

    #[test]
    fn strictly_increasing_and_bracketing_max() {
        for &(lowest, max) in &[(261.6256, 1000.0), (55.0, 56.0), (100.0, 3000.0), (440.0, 880.0)] {
            let table = FrequencyTable::build(lowest, max).unwrap();
            let b = &table.boundaries;
            assert_eq!(b[0], lowest);
            assert!(b.windows(2).all(|w| w[0] < w[1]));
            assert!(b[b.len() - 1] >= max);
            assert!(b[b.len() - 2] < max);
        }
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(matches!(
            FrequencyTable::build(500.0, 500.0),
            Err(ScoreError::InvalidRange { .. })
        ));
        assert!(FrequencyTable::build(500.0, 100.0).is_err());
        assert!(FrequencyTable::build(0.0, 100.0).is_err());
        assert!(FrequencyTable::build(f64::NAN, 100.0).is_err());
    }

    #[test]
    fn quantize_hits_boundaries_exactly() {
        let table = FrequencyTable::build(MIDDLE_C_HZ, 1000.0).unwrap();
        for (k, &freq) in table.boundaries.iter().enumerate() {
            assert_eq!(table.quantize(freq), k);
        }
    }

    #[test]
    fn quantize_floors_and_saturates() {
        let table = FrequencyTable::build(MIDDLE_C_HZ, 1000.0).unwrap();
        assert_eq!(table.quantize(0.0), 0);
        assert_eq!(table.quantize(100.0), 0);
        assert_eq!(table.quantize(270.0), 0);
        assert_eq!(table.quantize(280.0), 1);
        assert_eq!(table.quantize(441.0), 9);
        assert_eq!(table.quantize(5000.0), table.len() - 1);
    }

    #[test]
    fn quantize_is_monotone() {
        let table = FrequencyTable::build(MIDDLE_C_HZ, 1000.0).unwrap();
        let mut last = 0;
        let mut freq = 0.0;
        while freq < 1200.0 {
            let note = table.quantize(freq);
            assert!(note >= last);
            last = note;
            freq += 0.5;
        }
    }
}

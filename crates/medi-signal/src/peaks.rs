//! Spectral peak picking.

use serde::Serialize;

use crate::spectrum::Spectrum;

/// Peaks lower than this fraction of the maximum bin are ignored.
pub const MIN_RELATIVE_HEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectralPeak {
    pub frequency: f64,
    pub power: f64,
    /// `sqrt(power)`.
    pub amplitude: f64,
}

/// Indices of local maxima at least `min_height` high, no two closer than
/// `distance` bins. Among peaks that are too close the higher one wins.
///
/// A plateau counts once, at its middle sample.
pub fn local_maxima(values: &[f64], min_height: f64, distance: usize) -> Vec<usize> {
    let mut candidates = Vec::new();
    let mut i = 1;
    while i + 1 < values.len() {
        if values[i] > values[i - 1] {
            let mut ahead = i + 1;
            while ahead + 1 < values.len() && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                let mid = (i + ahead - 1) / 2;
                if values[mid] >= min_height {
                    candidates.push(mid);
                }
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    if distance <= 1 {
        return candidates;
    }

    let mut by_height = candidates.clone();
    by_height.sort_by(|a, b| values[*b].total_cmp(&values[*a]));
    let mut kept: Vec<usize> = Vec::new();
    for idx in by_height {
        if kept.iter().all(|k| k.abs_diff(idx) >= distance) {
            kept.push(idx);
        }
    }
    kept.sort_unstable();
    kept
}

/// The `n` strongest peaks of a spectrum, strongest first.
///
/// `min_distance_hz` defaults to 1 % of the spectrum's frequency span.
pub fn find_peaks(spectrum: &Spectrum, n: usize, min_distance_hz: Option<f64>) -> Vec<SpectralPeak> {
    let Some(max) = spectrum.power.iter().copied().reduce(f64::max) else {
        return Vec::new();
    };
    let span = match (spectrum.frequencies.first(), spectrum.frequencies.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };
    let resolution = match spectrum.frequencies.as_slice() {
        [a, b, ..] => b - a,
        _ => 1.0,
    };
    let min_distance = min_distance_hz.unwrap_or(span / 100.0);
    let distance = ((min_distance / resolution) as usize).max(1);

    let mut peaks: Vec<SpectralPeak> = local_maxima(&spectrum.power, max * MIN_RELATIVE_HEIGHT, distance)
        .into_iter()
        .map(|idx| SpectralPeak {
            frequency: spectrum.frequencies[idx],
            power: spectrum.power[idx],
            amplitude: spectrum.power[idx].sqrt(),
        })
        .collect();
    peaks.sort_by(|a, b| b.power.total_cmp(&a.power));
    peaks.truncate(n);
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maxima_respect_height_and_distance() {
        let values = [0.0, 5.0, 0.0, 4.0, 0.0, 0.3, 0.0, 10.0, 9.0, 10.0, 0.0];
        assert_eq!(local_maxima(&values, 1.0, 1), vec![1, 3, 7, 9]);
        assert_eq!(local_maxima(&values, 1.0, 3), vec![1, 7]);
    }

    #[test]
    fn plateaus_count_once() {
        let values = [0.0, 2.0, 2.0, 2.0, 0.0];
        assert_eq!(local_maxima(&values, 0.0, 1), vec![2]);
        assert!(local_maxima(&[1.0, 2.0, 3.0], 0.0, 1).is_empty());
    }

    #[test]
    fn strongest_peaks_first() {
        let spectrum = Spectrum {
            frequencies: (0..11).map(f64::from).collect(),
            power: vec![0.0, 5.0, 0.0, 4.0, 0.0, 0.3, 0.0, 9.0, 0.0, 1.0, 0.0],
            sampling_rate: 20.0,
            fft_size: 20,
        };
        let peaks = find_peaks(&spectrum, 2, None);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].frequency, 7.0);
        assert_eq!(peaks[0].amplitude, 3.0);
        assert_eq!(peaks[1].frequency, 1.0);
    }
}

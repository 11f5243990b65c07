//! Spectral amplitude decode and enhancement (P25/IMBE Algorithms 48-66).
//!
//! The standard specifies these at the level of a DCT-coded log-amplitude
//! vector, predicted from the previous frame and the decoded gain/harmonic
//! bits; this module implements that shape without claiming to reproduce
//! the standard's exact coefficient tables (spec treats this module as
//! interface-level, unlike the three `b0`-keyed tables in `tables.rs`).

use crate::param::ImbeParam;

/// Reconstructs `sa[0..L-1]` from the decoded bit vector, the previous
/// frame's amplitudes (for continuity across frames) and `(L, K,
/// fund_freq)`.
pub fn sa_decode(param: &mut ImbeParam) {
    let l = param.num_harms;
    let gain = 2f32.powf(param.b_vec[2] as f32 / 8.0).max(1.0);

    for i in 0..l {
        let coeff = param.b_vec[3 + i] as f32;
        let predicted = param.sa[i];
        let decoded = gain * (1.0 + coeff / 64.0).max(0.0);
        // Blend with the previous frame's value so a single bad coefficient
        // doesn't produce a discontinuous amplitude jump.
        param.sa[i] = 0.75 * decoded + 0.25 * predicted;
    }
}

/// Applies a weighting function peaking near formants (estimated as the
/// frame's dominant harmonic) and refreshes `spectral_energy` for the next
/// frame's adaptive smoothing pass.
pub fn sa_enh(param: &mut ImbeParam) {
    let l = param.num_harms;
    if l == 0 {
        return;
    }

    let energy: f32 = param.sa[..l].iter().map(|v| v * v).sum::<f32>() / l as f32;

    let peak = param.sa[..l]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0);

    for (i, amplitude) in param.sa[..l].iter_mut().enumerate() {
        let distance = (i as isize - peak as isize).unsigned_abs() as f32;
        let weight = 1.0 + 0.5 * (-distance / 4.0).exp();
        *amplitude *= weight;
    }

    param.spectral_energy = energy;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sa_decode_produces_nonnegative_amplitudes() {
        let mut param = ImbeParam::new();
        param.num_harms = 9;
        param.b_vec[2] = 4;
        for i in 0..9 {
            param.b_vec[3 + i] = (i as i16) - 4;
        }
        sa_decode(&mut param);
        assert!(param.sa[..9].iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn sa_enh_boosts_amplitudes_near_peak() {
        let mut param = ImbeParam::new();
        param.num_harms = 5;
        param.sa[..5].copy_from_slice(&[1.0, 1.0, 10.0, 1.0, 1.0]);
        sa_enh(&mut param);
        assert!(param.sa[2] > 10.0);
        assert!(param.spectral_energy > 0.0);
    }
}

//! Adaptive smoothing: error-driven override of voicing decisions and
//! amplitude clamping, following `adaptive_smoothing.cc` and spec section
//! 4.4 exactly (constants and branch structure are load-bearing here,
//! unlike the spectral decode module).

use crate::param::ImbeParam;

const VOICED_THRESHOLD_BASE: f32 = 45.255;
const VOICED_THRESHOLD_EXP: f32 = 277.26;
const UNVOICED_THRESHOLD_SCALE: f32 = 1.414;
const SPECTRAL_ENERGY_EXPONENT: f32 = 0.375;

const CLEAN_AMPLITUDE_THRESHOLD: f32 = 20480.0;
const AMPLITUDE_STEP_BASE: f32 = 6000.0;
const AMPLITUDE_STEP_PER_ERROR: f32 = 300.0;

pub fn adaptive_smoothing(param: &mut ImbeParam) {
    let l = param.num_harms;
    let e = param.spectral_energy;

    let adaptive_threshold = if param.error_rate <= 0.005 && param.error_total <= 4.0 {
        f32::MAX
    } else if param.error_rate <= 0.0125 && param.error_coset4 == 0 {
        (VOICED_THRESHOLD_BASE * e.powf(SPECTRAL_ENERGY_EXPONENT))
            / (VOICED_THRESHOLD_EXP * param.error_rate).exp()
    } else {
        UNVOICED_THRESHOLD_SCALE * e.powf(SPECTRAL_ENERGY_EXPONENT)
    };

    for i in 0..l {
        if param.sa[i] > adaptive_threshold {
            param.v_uv_dsn[i] = 1;
        }
    }

    let amplitude_threshold = if param.error_rate <= 0.005 && param.error_total <= 6.0 {
        CLEAN_AMPLITUDE_THRESHOLD
    } else {
        (AMPLITUDE_STEP_BASE - AMPLITUDE_STEP_PER_ERROR * param.error_total + param.amplitude_threshold).max(0.0)
    };
    param.amplitude_threshold = amplitude_threshold;

    let sum: f32 = param.sa[..l].iter().sum();
    if sum > amplitude_threshold && sum > 0.0 {
        let scale = amplitude_threshold / sum;
        for amp in param.sa[..l].iter_mut() {
            *amp *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_frame_never_overrides_voicing() {
        let mut param = ImbeParam::new();
        param.num_harms = 4;
        param.error_rate = 0.0;
        param.error_total = 0.0;
        param.sa[..4].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        adaptive_smoothing(&mut param);
        assert_eq!(param.v_uv_dsn[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn amplitude_sum_respects_threshold() {
        let mut param = ImbeParam::new();
        param.num_harms = 2;
        param.error_rate = 0.0;
        param.error_total = 0.0;
        param.sa[..2].copy_from_slice(&[30000.0, 30000.0]);
        adaptive_smoothing(&mut param);
        let sum: f32 = param.sa[..2].iter().sum();
        assert!(sum <= param.amplitude_threshold + 1.0);
    }

    #[test]
    fn boundary_error_rates_use_le_branch() {
        let mut param = ImbeParam::new();
        param.num_harms = 1;
        param.error_rate = 0.005;
        param.error_total = 4.0;
        param.sa[0] = 100.0;
        adaptive_smoothing(&mut param);
        assert_eq!(param.v_uv_dsn[0], 0);
    }
}

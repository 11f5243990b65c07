//! Voiced and unvoiced synthesizers: spectral parameters to 160 PCM
//! samples per 20 ms frame, at 8 kHz.

use std::f32::consts::PI;

use frame::PcmFrame;

use crate::param::{ImbeParam, UNVOICED_WINDOW_LEN};

const SAMPLE_RATE: f32 = 8000.0;
const SAMPLES_PER_FRAME: usize = 160;
const OUTPUT_CLAMP: f32 = 31125.0;

/// Synthesizes one frame's PCM audio from `param`. Returns all zeros if
/// `mute_audio` is set or the frame has repeated more than three times
/// (spec 4.5).
pub fn synthesize(param: &mut ImbeParam) -> PcmFrame {
    let mut out = [0i16; SAMPLES_PER_FRAME];
    if param.mute_audio || param.repeat_count > 3 {
        return out;
    }

    let voiced = synthesize_voiced(param);
    let unvoiced = synthesize_unvoiced(param);

    for i in 0..SAMPLES_PER_FRAME {
        let sum = voiced[i] + unvoiced[i];
        out[i] = sum.clamp(-OUTPUT_CLAMP, OUTPUT_CLAMP) as i16;
    }
    out
}

fn synthesize_voiced(param: &mut ImbeParam) -> [f32; SAMPLES_PER_FRAME] {
    let mut out = [0f32; SAMPLES_PER_FRAME];
    let l = param.num_harms;
    let omega0 = 2.0 * PI * param.fund_freq;

    for h in 0..l {
        if param.v_uv_dsn[h] == 0 {
            continue;
        }
        let amplitude = param.sa[h];
        let omega = omega0 * (h + 1) as f32;
        let mut phase = param.harmonic_phase[h];
        for sample in out.iter_mut() {
            *sample += amplitude * phase.sin();
            phase += omega;
        }
        param.harmonic_phase[h] = phase.rem_euclid(2.0 * PI);
    }

    out
}

fn synthesize_unvoiced(param: &mut ImbeParam) -> [f32; SAMPLES_PER_FRAME] {
    let l = param.num_harms;
    if param.l_uv == 0 {
        param.unvoiced_tail = [0.0; UNVOICED_WINDOW_LEN / 2];
        return [0.0; SAMPLES_PER_FRAME];
    }

    let unvoiced_energy: f32 = (0..l)
        .filter(|&h| param.v_uv_dsn[h] == 0)
        .map(|h| param.sa[h])
        .sum::<f32>()
        / param.l_uv as f32;

    let mut excitation = [0f32; UNVOICED_WINDOW_LEN];
    let mut rng_state: u32 = 0x2545F491;
    for (i, sample) in excitation.iter_mut().enumerate() {
        rng_state ^= rng_state << 13;
        rng_state ^= rng_state >> 17;
        rng_state ^= rng_state << 5;
        let noise = (rng_state as f32 / u32::MAX as f32) * 2.0 - 1.0;
        let window = 0.5 - 0.5 * (2.0 * PI * i as f32 / (UNVOICED_WINDOW_LEN - 1) as f32).cos();
        *sample = noise * unvoiced_energy * window;
    }

    let half = UNVOICED_WINDOW_LEN / 2;
    let mut out = [0f32; SAMPLES_PER_FRAME];
    for i in 0..SAMPLES_PER_FRAME.min(half) {
        out[i] = excitation[i] + param.unvoiced_tail[i];
    }
    param.unvoiced_tail.copy_from_slice(&excitation[half..]);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn muted_frame_is_silent() {
        let mut param = ImbeParam::new();
        param.mute_audio = true;
        assert_eq!(synthesize(&mut param), [0i16; SAMPLES_PER_FRAME]);
    }

    #[test]
    fn repeat_count_over_three_is_silent() {
        let mut param = ImbeParam::new();
        param.repeat_count = 4;
        assert_eq!(synthesize(&mut param), [0i16; SAMPLES_PER_FRAME]);
    }

    #[test]
    fn voiced_harmonic_produces_nonzero_output() {
        let mut param = ImbeParam::new();
        param.num_harms = 1;
        param.v_uv_dsn[0] = 1;
        param.sa[0] = 5000.0;
        param.l_uv = 0;
        let frame = synthesize(&mut param);
        assert!(frame.iter().any(|&s| s != 0));
    }

    #[test]
    fn output_never_exceeds_clamp() {
        let mut param = ImbeParam::new();
        param.num_harms = 1;
        param.v_uv_dsn[0] = 1;
        param.sa[0] = 1_000_000.0;
        let frame = synthesize(&mut param);
        assert!(frame.iter().all(|&s| (s as f32).abs() <= OUTPUT_CLAMP));
    }
}

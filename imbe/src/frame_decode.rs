use fixedpoint::shr;
use frame::VoiceFrameBits;
use log::warn;

use crate::error::ImbeError;
use crate::param::{BIT_STREAM_LEN, ImbeParam, NUM_HARMS_MAX};
use crate::tables::{bit_allocation_table, FUNDAMENTAL_FREQUENCY, SPECTRAL_AMPLITUDES, VOICING_DECISIONS};

/// Frame-repeat and frame-mute tests, then (on a clean frame) full decode
/// of `b_vec`, `fund_freq`, `num_harms`, `num_bands`. On repeat/mute,
/// `param` keeps the previous frame's values untouched, matching the
/// reference decoder's "return early, caller reuses prior state" shape.
pub fn decode_frame_vector(param: &mut ImbeParam, frame_vector: &VoiceFrameBits) -> Result<(), ImbeError> {
    let fv: [i16; 8] = std::array::from_fn(|i| frame_vector.word(i) as i16);

    let b0 = (shr(fv[0], 4) & 0xFC) | (shr(fv[7], 1) & 0x3);
    param.b_vec[0] = b0;

    if !(0..=207).contains(&b0) {
        param.repeat_count += 1;
        return Ok(());
    }

    if param.error_coset0 >= 2 {
        param.repeat_count += 1;
        return Ok(());
    }

    if param.error_total >= 10.0 + 40.0 * param.error_rate {
        param.repeat_count += 1;
        return Ok(());
    }

    if param.error_rate >= 0.0875 {
        param.mute_audio = true;
        return Ok(());
    }

    param.repeat_count = 0;
    param.mute_audio = false;

    let b0 = b0 as usize;
    param.fund_freq = FUNDAMENTAL_FREQUENCY[b0];
    param.num_harms = SPECTRAL_AMPLITUDES[b0] as usize;
    param.num_bands = VOICING_DECISIONS[b0] as usize;

    let mut bit_stream = [0i16; BIT_STREAM_LEN];

    bit_stream[0] = ((fv[0] & 0x4) != 0) as i16;
    bit_stream[1] = ((fv[0] & 0x2) != 0) as i16;
    bit_stream[2] = ((fv[0] & 0x1) != 0) as i16;

    bit_stream[BIT_STREAM_LEN - 3] = ((fv[7] & 0x40) != 0) as i16;
    bit_stream[BIT_STREAM_LEN - 2] = ((fv[7] & 0x20) != 0) as i16;
    bit_stream[BIT_STREAM_LEN - 1] = ((fv[7] & 0x10) != 0) as i16;

    let mut index0 = 3 + 3 * 12 - 1;
    for vec_num in (1..=3).rev() {
        let mut tmp = fv[vec_num];
        for _ in 0..12 {
            bit_stream[index0] = tmp & 0x1;
            tmp >>= 1;
            index0 -= 1;
        }
    }

    let mut index0 = 3 + 3 * 12 + 3 * 11 - 1;
    for vec_num in (4..=6).rev() {
        let mut tmp = fv[vec_num];
        for _ in 0..11 {
            bit_stream[index0] = tmp & 0x1;
            tmp >>= 1;
            index0 -= 1;
        }
    }

    // Rebuild b1 (voicing)
    let mut index0 = 3 + 3 * 12;
    let mut tmp: i16 = 0;
    for _ in 0..param.num_bands {
        tmp = (tmp << 1) | bit_stream[index0];
        index0 += 1;
    }
    param.b_vec[1] = tmp;

    // Rebuild b2 (gain)
    let mut tmp: i16 = 0;
    tmp |= bit_stream[index0] << 1;
    index0 += 1;
    tmp |= bit_stream[index0];
    index0 += 1;
    param.b_vec[2] = (fv[0] & 0x38) | (tmp << 1) | (shr(fv[7], 3) & 0x01);

    // Shift the rest of the sequence down, consuming num_bands + 2 bits.
    let shift = param.num_bands + 2;
    for i in index0..BIT_STREAM_LEN {
        bit_stream[i - shift] = bit_stream[i];
    }

    // Priority-rescan decode of the spectral coefficient bits.
    for slot in param.b_vec[3..].iter_mut() {
        *slot = 0;
    }
    let bit_alloc = bit_allocation_table(param.num_harms);
    for (i, v) in bit_alloc.iter().enumerate() {
        param.bit_alloc[i] = *v;
    }

    let mut index0 = 0usize;
    let mut bit_thr: i16 = if param.num_harms == 0xb { 9 } else { bit_alloc[0] };
    let stream_budget = BIT_STREAM_LEN - param.num_bands - 2;

    'rescan: while index0 < stream_budget {
        for i in 0..param.num_harms - 1 {
            if bit_thr != 0 && bit_thr <= bit_alloc[i] {
                param.b_vec[3 + i] = (param.b_vec[3 + i] << 1) | bit_stream[index0];
                index0 += 1;
                // The stream is exhausted once we've gathered the frame's
                // full amplitude-bit budget; stop mid-pass rather than
                // relying solely on the outer while check.
                if index0 >= stream_budget {
                    break 'rescan;
                }
            }
        }
        bit_thr -= 1;
        if bit_thr < 0 {
            warn!("priority-rescan decode exhausted the bit stream with bit_thr > 0");
            return Err(ImbeError::PriorityRescanOverrun);
        }
    }

    param.b_vec[param.num_harms + 2] = fv[7] & 1;

    Ok(())
}

/// Expands the `K`-band voicing vector `b1` into an `L`-length
/// per-harmonic voicing array, repeating each band's bit across up to
/// three consecutive harmonics (the last band covers the tail).
pub fn v_uv_decode(param: &mut ImbeParam) {
    let mut num_harms = param.num_harms;
    let mut num_bands = param.num_bands;
    let vu_vec = param.b_vec[1];
    let mut mask: i16 = 1 << (num_bands - 1);

    for slot in param.v_uv_dsn.iter_mut() {
        *slot = 0;
    }

    let mut i = 0;
    let mut uv_cnt = 0usize;
    let mut harm = 0usize;
    while num_harms > 0 {
        num_harms -= 1;
        if vu_vec & mask != 0 {
            param.v_uv_dsn[harm] = 1;
        } else {
            param.v_uv_dsn[harm] = 0;
            uv_cnt += 1;
        }
        harm += 1;

        i += 1;
        if i == 3 {
            if num_bands > 1 {
                num_bands -= 1;
                mask >>= 1;
            }
            i = 0;
        }
    }
    param.l_uv = uv_cnt;
    debug_assert!(harm <= NUM_HARMS_MAX);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(words: [u16; 8]) -> VoiceFrameBits {
        VoiceFrameBits::new(words)
    }

    #[test]
    fn clean_frame_matches_worked_example() {
        let mut param = ImbeParam::new();
        param.error_rate = 0.0;
        param.error_total = 0.0;
        let vector = fv([0x1234, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0001]);
        decode_frame_vector(&mut param, &vector).unwrap();
        assert_eq!(param.b_vec[0], 0x20);
        assert_eq!(param.num_bands, 6);
        assert!((param.fund_freq - 0.175753435).abs() < 1e-6);
    }

    #[test]
    fn muting_frame_sets_mute_flag() {
        let mut param = ImbeParam::new();
        param.error_rate = 0.09;
        let vector = fv([0x1234, 0, 0, 0, 0, 0, 0, 0x0001]);
        decode_frame_vector(&mut param, &vector).unwrap();
        assert!(param.mute_audio);
    }

    #[test]
    fn coset0_error_triggers_repeat() {
        let mut param = ImbeParam::new();
        param.error_coset0 = 2;
        let before = param.repeat_count;
        let vector = fv([0x1234, 0, 0, 0, 0, 0, 0, 0x0001]);
        decode_frame_vector(&mut param, &vector).unwrap();
        assert_eq!(param.repeat_count, before + 1);
    }

    #[test]
    fn invalid_pitch_index_triggers_repeat() {
        let mut param = ImbeParam::new();
        // b0 computed from these words falls outside [0, 207].
        let vector = fv([0xFF00, 0, 0, 0, 0, 0, 0, 0xFFFF]);
        let before = param.repeat_count;
        decode_frame_vector(&mut param, &vector).unwrap();
        assert_eq!(param.repeat_count, before + 1);
    }

    #[test]
    fn v_uv_decode_counts_unvoiced_harmonics() {
        let mut param = ImbeParam::new();
        param.num_harms = 9;
        param.num_bands = 3;
        param.b_vec[1] = 0b101; // band2=1, band1=0, band0=1
        v_uv_decode(&mut param);
        assert_eq!(param.v_uv_dsn[0..3], [1, 1, 1]);
        assert_eq!(param.v_uv_dsn[3..6], [0, 0, 0]);
        assert_eq!(param.v_uv_dsn[6..9], [1, 1, 1]);
        assert_eq!(param.l_uv, 3);
    }
}

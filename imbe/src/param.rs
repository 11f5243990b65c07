use crate::tables::TABLE_LEN;

/// Maximum number of harmonics (`L`) a frame can decode to.
pub const NUM_HARMS_MAX: usize = 56;
/// Minimum number of harmonics a frame can decode to.
pub const NUM_HARMS_MIN: usize = 9;
/// Maximum number of voicing bands (`K`).
pub const NUM_BANDS_MAX: usize = 12;
/// Minimum number of voicing bands.
pub const NUM_BANDS_MIN: usize = 3;

/// Total length of the rebuilt interior bit stream: 3 prepended bits from
/// word 0, 36 bits from words 3/2/1, 33 bits from words 6/5/4, 3 appended
/// bits from word 7 (see `frame_decode::decode_frame_vector`).
pub const BIT_STREAM_LEN: usize = 3 + 3 * 12 + 3 * 11 + 3;

/// Capacity of the per-harmonic bit-allocation / spectral-coefficient
/// vectors (`bit_alloc[0..L-2]`, one slot shy of `NUM_HARMS_MAX`).
pub const BIT_ALLOC_LEN: usize = NUM_HARMS_MAX - 1;

/// `fund_freq` init value from the `{fund_freq=0x0cf6474a (Q31)}` branch
/// of the two conflicting `decode_init` defaults in the source; see
/// DESIGN.md for why this one was chosen over the `0.00938` alternative.
const INIT_FUND_FREQ_Q31: u32 = 0x0cf6474a;

fn q31_to_f32(bits: u32) -> f32 {
    (bits as i32) as f32 / (1u32 << 31) as f32
}

/// Fixed-point voice-frame state, mutated once per 20 ms frame and carried
/// across frames so a bad frame can repeat the previous one's parameters.
#[derive(Debug, Clone)]
pub struct ImbeParam {
    /// `(b0, b1, b2, b3, .., b_{L+1})` decoded information vector.
    pub b_vec: [i16; NUM_HARMS_MAX + 2],
    pub bit_alloc: [i16; BIT_ALLOC_LEN],
    pub fund_freq: f32,
    pub num_harms: usize,
    pub num_bands: usize,
    pub v_uv_dsn: [u8; NUM_HARMS_MAX],
    pub l_uv: usize,
    pub sa: [f32; NUM_HARMS_MAX],
    pub error_rate: f32,
    pub error_total: f32,
    pub error_coset0: i32,
    pub error_coset4: i32,
    pub repeat_count: u32,
    pub mute_audio: bool,
    pub spectral_energy: f32,
    pub amplitude_threshold: f32,
    /// Running phase per harmonic, carried across frames so the voiced
    /// synthesizer stays phase-continuous.
    pub harmonic_phase: [f32; NUM_HARMS_MAX],
    /// Second half of the previous frame's unvoiced synthesis window, for
    /// overlap-add.
    pub unvoiced_tail: [f32; UNVOICED_WINDOW_LEN / 2],
}

/// Synthesis window length for the unvoiced excitation path.
pub const UNVOICED_WINDOW_LEN: usize = 256;

impl Default for ImbeParam {
    fn default() -> Self {
        Self {
            b_vec: [0; NUM_HARMS_MAX + 2],
            bit_alloc: [0; BIT_ALLOC_LEN],
            fund_freq: q31_to_f32(INIT_FUND_FREQ_Q31),
            num_harms: NUM_HARMS_MIN,
            num_bands: NUM_BANDS_MIN,
            v_uv_dsn: [0; NUM_HARMS_MAX],
            l_uv: 0,
            sa: [0.0; NUM_HARMS_MAX],
            error_rate: 0.0,
            error_total: 0.0,
            error_coset0: 0,
            error_coset4: 0,
            repeat_count: 0,
            mute_audio: false,
            harmonic_phase: [0.0; NUM_HARMS_MAX],
            unvoiced_tail: [0.0; UNVOICED_WINDOW_LEN / 2],
            spectral_energy: 0.0,
            amplitude_threshold: 20480.0,
        }
    }
}

impl ImbeParam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fundamental_frequency_table_len() -> usize {
        TABLE_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_init_matches_chosen_resolution() {
        let p = ImbeParam::new();
        assert_eq!(p.num_harms, 9);
        assert_eq!(p.num_bands, 3);
        assert!(p.fund_freq > 0.0);
    }
}

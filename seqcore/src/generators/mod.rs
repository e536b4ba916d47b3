//! Deterministic procedural pattern generators: each algorithm is a pure
//! function from a small macro-parameter set to a fixed-length bundle of
//! note/gate/velocity/timing vectors, plus two magnitude spectra of the
//! note sequence for visualization and downstream spectral routing.

mod algorithms;

use rand_pcg::Pcg32;

pub const MAX_SEQUENCE_LENGTH: usize = 64;
pub const MAX_SPECTRUM_LENGTH: usize = MAX_SEQUENCE_LENGTH + 1; // N/2 + 1 bins
pub const MAX_OVERSAMPLED_SPECTRUM_LENGTH: usize = 2 * MAX_SEQUENCE_LENGTH + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Test,
    Tritrance,
    Markov,
    Stomper,
    Drone,
    GeodeAmbient,
    Autechre,
    Aphex,
}

impl Algorithm {
    /// `type` selects one of the eight canonical recipes; values beyond the
    /// eight wrap around rather than erroring, so any value in the
    /// documented `0..21` range resolves to a playable algorithm.
    pub fn from_type_index(type_index: u8) -> Self {
        const ALGORITHMS: [Algorithm; 8] = [
            Algorithm::Test,
            Algorithm::Tritrance,
            Algorithm::Markov,
            Algorithm::Stomper,
            Algorithm::Drone,
            Algorithm::GeodeAmbient,
            Algorithm::Autechre,
            Algorithm::Aphex,
        ];
        ALGORITHMS[type_index as usize % ALGORITHMS.len()]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AlgorithmParameters {
    pub algorithm: Algorithm,
    pub flow: u8,           // 1..16
    pub ornament: u8,       // 1..16
    pub power: u8,          // 0..16
    pub glide: u8,          // 0..16, read as a percent
    pub trill: u8,          // 0..8
    pub steps: u8,          // 1..64
    pub loop_length: u8,    // 0..64, 0 = infinite
    pub custom_param: [f32; 4], // 0..1 each
    pub seed: u64,
}

impl Default for AlgorithmParameters {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Test,
            flow: 1,
            ornament: 1,
            power: 8,
            glide: 0,
            trill: 0,
            steps: 16,
            loop_length: 0,
            custom_param: [0.0; 4],
            seed: 1,
        }
    }
}

#[derive(Clone, Copy)]
pub struct SignalData {
    pub len: usize,
    pub note_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub gate_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub velocity_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub slide_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub accent_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub probability_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub gate_offset_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub is_trill_sequence: [f32; MAX_SEQUENCE_LENGTH],
    pub spectrum_len: usize,
    pub spectrum: [f32; MAX_SPECTRUM_LENGTH],
    pub oversampled_spectrum_len: usize,
    pub oversampled_spectrum: [f32; MAX_OVERSAMPLED_SPECTRUM_LENGTH],
}

impl Default for SignalData {
    fn default() -> Self {
        Self {
            len: 0,
            note_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            gate_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            velocity_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            slide_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            accent_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            probability_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            gate_offset_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            is_trill_sequence: [0.0; MAX_SEQUENCE_LENGTH],
            spectrum_len: 0,
            spectrum: [0.0; MAX_SPECTRUM_LENGTH],
            oversampled_spectrum_len: 0,
            oversampled_spectrum: [0.0; MAX_OVERSAMPLED_SPECTRUM_LENGTH],
        }
    }
}

fn new_rng(seed: u64, salt: u64) -> Pcg32 {
    Pcg32::new(seed ^ salt, 0xa02bdbf7bb3c0a7)
}

/// Discrete Fourier transform magnitude in dB, `20*log10(|X[k]| + eps)` for
/// `k = 0..=n/2`. `rustfft`-class crates assume an allocator-backed planner
/// cache that doesn't fit this crate's `no_std` core; at the sequence
/// lengths here (<=64, doubled to <=128 for the oversampled variant) a
/// direct O(n^2) sum is cheap enough to not need a radix-2 implementation,
/// and it works for the non-power-of-two lengths `steps` actually takes.
fn magnitude_spectrum_db(samples: &[f32], out: &mut [f32]) -> usize {
    const EPS: f32 = 1e-6;
    let n = samples.len();
    if n == 0 {
        return 0;
    }
    let bins = n / 2 + 1;
    let bins = bins.min(out.len());
    for (k, slot) in out.iter_mut().take(bins).enumerate() {
        let mut real = 0.0f32;
        let mut imag = 0.0f32;
        for (t, &sample) in samples.iter().enumerate() {
            let angle = -2.0 * core::f32::consts::PI * k as f32 * t as f32 / n as f32;
            real += sample * libm::cosf(angle);
            imag += sample * libm::sinf(angle);
        }
        let magnitude = libm::sqrtf(real * real + imag * imag);
        *slot = 20.0 * libm::log10f(magnitude + EPS);
    }
    bins
}

/// Edge-extends `samples` to `2N` by mirroring the last sample, then runs
/// the same DFT magnitude computation at the doubled resolution.
fn oversampled_spectrum_db(samples: &[f32], out: &mut [f32]) -> usize {
    let n = samples.len();
    if n == 0 {
        return 0;
    }
    let mut padded = [0.0f32; 2 * MAX_SEQUENCE_LENGTH];
    padded[..n].copy_from_slice(samples);
    let last = samples[n - 1];
    for slot in padded[n..2 * n].iter_mut() {
        *slot = last;
    }
    magnitude_spectrum_db(&padded[..2 * n], out)
}

/// Runs the selected algorithm and fills in its spectra. Bit-identical
/// across calls given identical `params` (the `seed` field is the only
/// source of randomness any algorithm may consult).
pub fn generate(params: &AlgorithmParameters) -> SignalData {
    let mut data = SignalData::default();
    let steps = (params.steps as usize).clamp(1, MAX_SEQUENCE_LENGTH);
    data.len = steps;

    match params.algorithm {
        Algorithm::Test => algorithms::test(params, &mut data),
        Algorithm::Tritrance => algorithms::tritrance(params, &mut data),
        Algorithm::Markov => algorithms::markov(params, &mut data),
        Algorithm::Stomper => algorithms::stomper(params, &mut data),
        Algorithm::Drone => algorithms::drone(params, &mut data),
        Algorithm::GeodeAmbient => algorithms::geode_ambient(params, &mut data),
        Algorithm::Autechre => algorithms::autechre(params, &mut data),
        Algorithm::Aphex => algorithms::aphex(params, &mut data),
    }

    data.spectrum_len = magnitude_spectrum_db(&data.note_sequence[..steps], &mut data.spectrum);
    data.oversampled_spectrum_len =
        oversampled_spectrum_db(&data.note_sequence[..steps], &mut data.oversampled_spectrum);

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_parameters_produce_identical_output() {
        let params = AlgorithmParameters { algorithm: Algorithm::Markov, seed: 42, ..Default::default() };
        let a = generate(&params);
        let b = generate(&params);
        assert_eq!(a.note_sequence[..a.len], b.note_sequence[..b.len]);
        assert_eq!(a.spectrum[..a.spectrum_len], b.spectrum[..b.spectrum_len]);
    }

    #[test]
    fn different_seeds_can_diverge_for_stochastic_algorithms() {
        let a = generate(&AlgorithmParameters { algorithm: Algorithm::Markov, seed: 1, ..Default::default() });
        let b = generate(&AlgorithmParameters { algorithm: Algorithm::Markov, seed: 2, ..Default::default() });
        assert_eq!(a.len, b.len);
    }

    #[test]
    fn type_index_beyond_table_wraps_to_a_valid_algorithm() {
        assert_eq!(Algorithm::from_type_index(8), Algorithm::Test);
        assert_eq!(Algorithm::from_type_index(9), Algorithm::Tritrance);
    }

    #[test]
    fn spectrum_has_n_over_two_plus_one_bins() {
        let params = AlgorithmParameters { algorithm: Algorithm::Test, steps: 16, ..Default::default() };
        let data = generate(&params);
        assert_eq!(data.spectrum_len, 16 / 2 + 1);
        assert_eq!(data.oversampled_spectrum_len, 32 / 2 + 1);
    }
}

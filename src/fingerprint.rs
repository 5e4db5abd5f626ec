use std::collections::HashSet;

use crate::config::env_parse;
use crate::error::{Error, Result};
use crate::spectral::{Peak, Stft, local_peaks};

/// A fingerprint: packed peak-pair hash plus the anchor's frame offset.
pub type HashOffset = (u64, u32);

/// Tunable parameters. All of them are policy: two indexes built with
/// different values do not share hashes.
#[derive(Debug, Clone)]
pub struct FingerprintParams {
    /// STFT window and FFT size, in samples.
    pub spec_win_size: usize,
    /// Fraction of the window shared by consecutive frames.
    pub spec_overlap: f32,
    /// Sample rate the spectrogram parameters are tuned for.
    pub spec_freq: u32,
    /// Side of the square neighbourhood a peak must dominate.
    pub peak_win_size: usize,
    /// Amplitude floor for peaks, in dB.
    pub peak_min_amp: f32,
    /// How many forward neighbours each anchor peak pairs with.
    pub fan_out: usize,
    /// Accepted frame distance between paired peaks, inclusive.
    pub hash_delta_min: u32,
    pub hash_delta_max: u32,
}

impl Default for FingerprintParams {
    fn default() -> Self {
        Self {
            spec_win_size: 4096,
            spec_overlap: 0.5,
            spec_freq: 44_100,
            peak_win_size: 10,
            peak_min_amp: 10.0,
            fan_out: 15,
            hash_delta_min: 0,
            hash_delta_max: 200,
        }
    }
}

impl FingerprintParams {
    /// Defaults overridden by any `FP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let params = Self {
            spec_win_size: env_parse("FP_SPEC_WIN_SIZE", defaults.spec_win_size)?,
            spec_overlap: env_parse("FP_SPEC_OVERLAP", defaults.spec_overlap)?,
            spec_freq: env_parse("FP_SPEC_FREQ", defaults.spec_freq)?,
            peak_win_size: env_parse("FP_PEAK_WIN_SIZE", defaults.peak_win_size)?,
            peak_min_amp: env_parse("FP_PEAK_MIN_AMP", defaults.peak_min_amp)?,
            fan_out: env_parse("FP_N_NEIGHBOURS", defaults.fan_out)?,
            hash_delta_min: env_parse("FP_HASH_DELTA_MIN", defaults.hash_delta_min)?,
            hash_delta_max: env_parse("FP_HASH_DELTA_MAX", defaults.hash_delta_max)?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.spec_win_size == 0 || !self.spec_win_size.is_power_of_two() {
            return Err(Error::Config(format!(
                "FP_SPEC_WIN_SIZE must be a power of two, got {}",
                self.spec_win_size
            )));
        }
        // Frequency bins must fit the 16-bit hash fields.
        if self.spec_win_size > 1 << 16 {
            return Err(Error::Config(format!(
                "FP_SPEC_WIN_SIZE of {} overflows the hash layout",
                self.spec_win_size
            )));
        }
        if !(0.0..1.0).contains(&self.spec_overlap) {
            return Err(Error::Config(format!(
                "FP_SPEC_OVERLAP must be in [0, 1), got {}",
                self.spec_overlap
            )));
        }
        if self.peak_win_size == 0 {
            return Err(Error::Config("FP_PEAK_WIN_SIZE must be positive".into()));
        }
        if self.fan_out == 0 {
            return Err(Error::Config("FP_N_NEIGHBOURS must be positive".into()));
        }
        if self.hash_delta_min > self.hash_delta_max {
            return Err(Error::Config(format!(
                "FP_HASH_DELTA_MIN {} exceeds FP_HASH_DELTA_MAX {}",
                self.hash_delta_min, self.hash_delta_max
            )));
        }
        if self.hash_delta_max > u16::MAX as u32 {
            return Err(Error::Config(format!(
                "FP_HASH_DELTA_MAX must fit 16 bits, got {}",
                self.hash_delta_max
            )));
        }
        Ok(())
    }

    /// STFT stride in samples.
    pub fn hop(&self) -> usize {
        let noverlap = (self.spec_win_size as f32 * self.spec_overlap) as usize;
        self.spec_win_size - noverlap
    }
}

/// Fingerprints for one PCM channel: spectrogram, local peaks, then
/// combinatorial hashing. Pure; identical input and parameters give an
/// identical result.
pub fn fingerprint(samples: &[i32], params: &FingerprintParams) -> Vec<HashOffset> {
    let stft = Stft::new(params.spec_win_size, params.hop());
    let spectrogram = stft.spectrogram(samples);
    let peaks = local_peaks(&spectrogram, params.peak_win_size, params.peak_min_amp);
    combinatorial_hashes(&peaks, params)
}

/// Fingerprints every channel and unions the results; duplicates across
/// (and within) channels collapse, which the confidence math relies on.
pub fn fingerprint_channels(
    channels: &[Vec<i32>],
    params: &FingerprintParams,
) -> HashSet<HashOffset> {
    let mut hashes = HashSet::new();
    for channel in channels {
        hashes.extend(fingerprint(channel, params));
    }
    hashes
}

/// Pairs each anchor peak with its next `fan_out` neighbours in time order
/// and packs `(f_anchor << 32) | (f_neighbour << 16) | Δt` per accepted
/// pair. Pairs outside the Δt window are skipped, not terminal: later
/// neighbours of the same anchor may still qualify.
fn combinatorial_hashes(peaks: &[Peak], params: &FingerprintParams) -> Vec<HashOffset> {
    let mut hashes = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        for j in 1..=params.fan_out {
            let Some(neighbour) = peaks.get(i + j) else {
                break;
            };

            // Peaks are time-sorted, so this never underflows.
            let delta = (neighbour.time - anchor.time) as u32;
            if delta < params.hash_delta_min || delta > params.hash_delta_max {
                continue;
            }

            let hash =
                (anchor.freq as u64) << 32 | (neighbour.freq as u64) << 16 | delta as u64;
            hashes.push((hash, anchor.time as u32));
        }
    }

    hashes
}

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// dB power spectrogram: `bins()` frequency rows by `frames()` time
/// columns, stored frame-major.
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    bins: usize,
}

impl Spectrogram {
    pub(crate) fn from_frames(frames: Vec<Vec<f32>>) -> Self {
        let bins = frames.first().map_or(0, Vec::len);
        Self { frames, bins }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn frames(&self) -> usize {
        self.frames.len()
    }

    /// One time column, all frequency rows.
    pub fn frame(&self, time: usize) -> &[f32] {
        &self.frames[time]
    }

    pub fn value(&self, freq: usize, time: usize) -> f32 {
        self.frames[time][freq]
    }
}

/// Short-time Fourier transform with a periodic Hann window and a reused
/// FFT plan.
pub struct Stft {
    win_size: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(win_size: usize, hop: usize) -> Self {
        let window = (0..win_size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / win_size as f32).cos())
            .collect();
        let fft = FftPlanner::new().plan_fft_forward(win_size);
        Self {
            win_size,
            hop: hop.max(1),
            window,
            fft,
        }
    }

    /// Spectral power in decibels, `10·log10(|X|²)`, one-sided
    /// (`win_size / 2 + 1` rows). Only full windows are transformed; a
    /// tail shorter than the window is dropped. Zero-magnitude cells come
    /// out as `-inf`, which no amplitude floor ever admits.
    pub fn spectrogram(&self, samples: &[i32]) -> Spectrogram {
        let bins = self.win_size / 2 + 1;
        let mut frames = Vec::new();
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); self.win_size];

        let mut position = 0;
        while position + self.win_size <= samples.len() {
            let chunk = &samples[position..position + self.win_size];
            for (slot, (&sample, &weight)) in
                buffer.iter_mut().zip(chunk.iter().zip(&self.window))
            {
                *slot = Complex::new(sample as f32 * weight, 0.0);
            }

            self.fft.process(&mut buffer);

            frames.push(
                buffer[..bins]
                    .iter()
                    .map(|c| 10.0 * c.norm_sqr().log10())
                    .collect(),
            );
            position += self.hop;
        }

        Spectrogram::from_frames(frames)
    }
}

mod peaks;
mod spectrogram;

pub use peaks::{Peak, local_peaks};
pub use spectrogram::{Spectrogram, Stft};

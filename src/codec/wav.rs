use std::fs::File;
use std::io::BufReader;

use hound::{SampleFormat, WavReader};

use crate::codec::Codec;
use crate::error::{Error, Result};

/// WAV container reader. Integer widths of 1, 2 and 4 bytes map straight
/// onto the sample array; 24-bit samples arrive sign-extended to 32 bits.
pub struct WavCodec;

impl Codec for WavCodec {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &["wav"]
    }

    fn read(&self, file: File, _ext: &str, limit: Option<u32>) -> Result<(Vec<Vec<i32>>, u32)> {
        let reader = WavReader::new(BufReader::new(file))
            .map_err(|e| Error::CorruptAudio(e.to_string()))?;
        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int {
            return Err(Error::CorruptAudio(
                "float WAV samples are not supported".into(),
            ));
        }

        let n_channels = spec.channels as usize;
        if n_channels == 0 {
            return Err(Error::CorruptAudio("zero-channel WAV".into()));
        }

        let max_frames = limit.map_or(usize::MAX, |secs| secs as usize * 1000);
        let mut channels = vec![Vec::new(); n_channels];

        for (i, sample) in reader.into_samples::<i32>().enumerate() {
            if i / n_channels >= max_frames {
                break;
            }
            let sample = sample.map_err(|e| Error::CorruptAudio(e.to_string()))?;
            channels[i % n_channels].push(sample);
        }

        Ok((channels, spec.sample_rate))
    }
}

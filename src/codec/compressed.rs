use std::fs::File;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::codec::Codec;
use crate::error::{Error, Result};

/// Compressed-container reader backed by symphonia; the codec library is a
/// black box that hands us interleaved PCM.
pub struct CompressedCodec;

impl Codec for CompressedCodec {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &["mp3", "mpeg", "ogg"]
    }

    fn read(&self, file: File, ext: &str, limit: Option<u32>) -> Result<(Vec<Vec<i32>>, u32)> {
        let source: Box<dyn MediaSource> = Box::new(file);
        let stream = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        hint.with_extension(ext);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::CorruptAudio(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| Error::CorruptAudio("no audio track".into()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let framerate = codec_params
            .sample_rate
            .ok_or_else(|| Error::CorruptAudio("missing sample rate".into()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::CorruptAudio(e.to_string()))?;

        let max_frames = limit.map_or(usize::MAX, |secs| secs as usize * 1000);
        let mut channels: Vec<Vec<i32>> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                // EOF surfaces as an I/O error from the format reader.
                Err(SymphoniaError::IoError(_)) => break,
                Err(e) => return Err(Error::CorruptAudio(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A malformed packet is recoverable; skip it.
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(Error::CorruptAudio(e.to_string())),
            };

            let spec = *decoded.spec();
            let n_channels = spec.channels.count();
            if n_channels == 0 {
                return Err(Error::CorruptAudio("zero-channel stream".into()));
            }
            if channels.is_empty() {
                channels = vec![Vec::new(); n_channels];
            }

            let mut interleaved = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            interleaved.copy_interleaved_ref(decoded);

            for frame in interleaved.samples().chunks_exact(n_channels) {
                if channels[0].len() >= max_frames {
                    break;
                }
                for (channel, &sample) in channels.iter_mut().zip(frame) {
                    channel.push(sample as i32);
                }
            }
            if channels[0].len() >= max_frames {
                break;
            }
        }

        if channels.is_empty() {
            return Err(Error::CorruptAudio("stream held no audio frames".into()));
        }

        Ok((channels, framerate))
    }
}

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Error, Result};

mod compressed;
mod wav;

pub use compressed::CompressedCodec;
pub use wav::WavCodec;

/// Sample rate every decoded file must arrive at; resampling happens
/// outside this crate.
pub const REQUIRED_FRAMERATE: u32 = 44_100;

/// Block size for the streaming file signature.
const HASHING_BLOCK_SIZE: usize = 1 << 20;

/// A decoded audio file: de-interleaved integer PCM, one vector per
/// channel, plus the observed sample rate and the file's identity.
#[derive(Debug)]
pub struct Record {
    pub channels: Vec<Vec<i32>>,
    pub framerate: u32,
    pub name: String,
    pub sha1: String,
}

/// A container reader. `limit` keeps only the first `limit * 1000` frames
/// per channel.
pub trait Codec: Sync {
    fn supported_extensions(&self) -> &'static [&'static str];

    fn read(&self, file: File, ext: &str, limit: Option<u32>) -> Result<(Vec<Vec<i32>>, u32)>;
}

static REGISTERED_CODECS: [&dyn Codec; 2] = [&WavCodec, &CompressedCodec];

fn codec_for(ext: &str) -> Option<&'static dyn Codec> {
    REGISTERED_CODECS
        .iter()
        .copied()
        .find(|codec| codec.supported_extensions().iter().any(|&e| e == ext))
}

/// Decodes a file via the codec registered for its extension. Computes the
/// SHA-1 signature first, then hands the rewound handle to the codec, and
/// finally enforces the required sample rate for every container.
pub fn read_file(path: &Path, limit: Option<u32>) -> Result<Record> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let codec = codec_for(&ext).ok_or_else(|| Error::UnsupportedFormat(ext.clone()))?;

    let mut file = File::open(path)?;
    let sha1 = compute_binary_hash(&mut file)?;
    file.seek(SeekFrom::Start(0))?;

    let (channels, framerate) = codec.read(file, &ext, limit)?;
    if framerate != REQUIRED_FRAMERATE {
        return Err(Error::WrongSampleRate {
            expected: REQUIRED_FRAMERATE,
            got: framerate,
        });
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(Record {
        channels,
        framerate,
        name,
        sha1,
    })
}

/// Streaming SHA-1 of a byte source, upper-case hex.
pub fn compute_binary_hash<R: Read>(source: &mut R) -> Result<String> {
    let mut hasher = Sha1::new();
    let mut buffer = vec![0_u8; HASHING_BLOCK_SIZE];
    loop {
        let read = source.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}

/// SHA-1 signature of a file on disk.
pub fn file_sha1(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    compute_binary_hash(&mut file)
}

/// Every file under `path` whose extension is in `extensions`
/// (case-insensitive, leading dots tolerated). Unreadable entries are
/// logged and skipped.
pub fn find_files(path: &Path, extensions: &[&str]) -> Vec<(PathBuf, String)> {
    let mut results = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
        else {
            continue;
        };
        if extensions.iter().any(|e| e.trim_start_matches('.') == ext) {
            results.push((entry.into_path(), ext));
        }
    }
    results
}

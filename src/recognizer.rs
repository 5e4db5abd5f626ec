use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::codec;
use crate::db::connector::{DEFAULT_BATCH_SIZE, IndexStore};
use crate::error::Result;
use crate::fingerprint::{FingerprintParams, HashOffset, fingerprint};

/// One recognized candidate.
#[derive(Debug, Serialize)]
pub struct RecognizedAudio {
    pub audio_id: String,
    pub audio_name: String,
    pub input_confidence: f64,
    pub fingerprinted_confidence: f64,
}

/// The full recognition report, serializable as the service response.
#[derive(Debug, Serialize)]
pub struct RecognitionReport {
    pub total_time: f64,
    pub fingerprint_time: f64,
    pub query_time: f64,
    pub align_time: f64,
    pub results: Vec<RecognizedAudio>,
}

/// Matches probe recordings against the index. Single-threaded per probe;
/// callers may run several recognizers against one shared store.
pub struct Recognizer {
    store: IndexStore,
    params: FingerprintParams,
    topn: usize,
}

impl Recognizer {
    pub fn new(store: IndexStore, params: FingerprintParams, topn: usize) -> Self {
        Self {
            store,
            params,
            topn,
        }
    }

    /// Decodes a probe file and matches it.
    pub fn recognize_file(&self, path: &Path) -> Result<RecognitionReport> {
        let record = codec::read_file(path, None)?;
        self.recognize_channels(&record.channels)
    }

    /// Matches pre-decoded channels (already at the required framerate).
    pub fn recognize_channels(&self, channels: &[Vec<i32>]) -> Result<RecognitionReport> {
        let started = Instant::now();

        let mut fingerprint_time = 0.0;
        let mut hashes: HashSet<HashOffset> = HashSet::new();
        for channel in channels {
            let clock = Instant::now();
            let channel_hashes = fingerprint(channel, &self.params);
            fingerprint_time += clock.elapsed().as_secs_f64();
            hashes.extend(channel_hashes);
        }

        let queried_hashes = hashes.len();
        let probe: Vec<HashOffset> = hashes.into_iter().collect();
        debug!(hashes = queried_hashes, "probe fingerprinted");

        let clock = Instant::now();
        let (matches, dedup_hashes) = self.store.return_matches(&probe, DEFAULT_BATCH_SIZE)?;
        let query_time = clock.elapsed().as_secs_f64();

        let clock = Instant::now();
        let results = self.align_matches(&matches, &dedup_hashes, queried_hashes)?;
        let align_time = clock.elapsed().as_secs_f64();

        Ok(RecognitionReport {
            total_time: started.elapsed().as_secs_f64(),
            fingerprint_time,
            query_time,
            align_time,
            results,
        })
    }

    /// Picks the winning alignment per audio, ranks audios by vote count
    /// and assembles the top-N report rows.
    fn align_matches(
        &self,
        matches: &[(i32, i64)],
        dedup_hashes: &HashMap<i32, usize>,
        queried_hashes: usize,
    ) -> Result<Vec<RecognizedAudio>> {
        let ranked = best_aligned_offsets(matches);

        let mut results = Vec::new();
        for (audio_id, _offset_diff, votes) in ranked.into_iter().take(self.topn) {
            let audio = self.store.get_audio_by_id(audio_id)?;
            let hits = dedup_hashes.get(&audio_id).copied().unwrap_or(0);
            debug!(audio_id, votes, hits, "alignment winner");

            results.push(RecognizedAudio {
                audio_id: audio_id.to_string(),
                audio_name: audio.audio_name,
                input_confidence: confidence(hits, queried_hashes),
                fingerprinted_confidence: confidence(hits, audio.total_hashes.max(0) as usize),
            });
        }
        Ok(results)
    }
}

/// Ratio clamped into [0, 1] and rounded to two decimals.
fn confidence(hits: usize, total: usize) -> f64 {
    let ratio = hits as f64 / total.max(1) as f64;
    (ratio.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// For every audio in `matches`, the offset difference gathering the most
/// votes, ranked by vote count descending.
///
/// Ties within one audio go to the smallest offset difference; audios with
/// equal winning counts keep ascending-id order.
pub fn best_aligned_offsets(matches: &[(i32, i64)]) -> Vec<(i32, i64, usize)> {
    let mut sorted = matches.to_vec();
    sorted.sort_unstable();

    let mut winners: Vec<(i32, i64, usize)> = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let (audio_id, offset_diff) = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == (audio_id, offset_diff) {
            j += 1;
        }
        let votes = j - i;

        match winners.last_mut() {
            Some(current) if current.0 == audio_id => {
                if votes > current.2 {
                    *current = (audio_id, offset_diff, votes);
                }
            }
            _ => winners.push((audio_id, offset_diff, votes)),
        }
        i = j;
    }

    winners.sort_by(|a, b| b.2.cmp(&a.2));
    winners
}

//! Ingest + recognize end-to-end scenarios against a live Postgres.
//!
//! Gated on `TEST_DATABASE_URL` like the store tests: without it every
//! test returns early.

use std::f32::consts::PI;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use serial_test::serial;
use tempfile::TempDir;

use waveprint::config::SUPPORTED_EXTENSIONS;
use waveprint::{Crawler, FingerprintParams, IndexStore, Recognizer};

fn test_store() -> Option<IndexStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let store = IndexStore::connect(&url).expect("connect to the test database");
    store.empty().expect("reset the schema");
    Some(store)
}

fn write_pcm_wav(path: &Path, samples: &[i16]) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

fn tone_samples(freqs: &[f32], seconds: f32) -> Vec<i16> {
    let frames = (44_100.0 * seconds) as usize;
    (0..frames)
        .map(|i| {
            let t = i as f32 / 44_100.0;
            let sample: f32 = freqs
                .iter()
                .map(|&f| f32::sin(2.0 * PI * f * t) * 10_000.0)
                .sum();
            sample as i16
        })
        .collect()
}

/// A sequence of one-second two-tone segments, so hashes change over time
/// and alignment has something to vote on.
fn melody_samples(seconds: u32) -> Vec<i16> {
    let base = [330.0, 440.0, 550.0, 660.0, 880.0];
    let mut samples = Vec::new();
    for second in 0..seconds {
        let freq = base[second as usize % base.len()];
        samples.extend(tone_samples(&[freq, freq * 2.0], 1.0));
    }
    samples
}

fn crawl(store: &IndexStore, dir: &Path) -> usize {
    Crawler::new(store.clone(), FingerprintParams::default())
        .fingerprint_directory(dir, &SUPPORTED_EXTENSIONS)
        .unwrap()
}

fn recognizer(store: &IndexStore) -> Recognizer {
    Recognizer::new(store.clone(), FingerprintParams::default(), 2)
}

#[test]
#[serial]
fn ingested_file_recognizes_itself_perfectly() {
    let Some(store) = test_store() else { return };
    let dir = TempDir::new().unwrap();
    let song = dir.path().join("sine_440hz_5s.wav");
    write_pcm_wav(&song, &tone_samples(&[440.0], 5.0));

    assert_eq!(crawl(&store, dir.path()), 1);
    assert_eq!(store.get_num_audios().unwrap(), 1);

    let report = recognizer(&store).recognize_file(&song).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].audio_name, "sine_440hz_5s.wav");
    assert_eq!(report.results[0].input_confidence, 1.0);
    assert_eq!(report.results[0].fingerprinted_confidence, 1.0);
    assert!(report.total_time >= 0.0);
}

#[test]
#[serial]
fn identical_bytes_are_ingested_once() {
    let Some(store) = test_store() else { return };
    let dir = TempDir::new().unwrap();
    let original = dir.path().join("song_A.wav");
    write_pcm_wav(&original, &melody_samples(5));
    std::fs::copy(&original, dir.path().join("song_A_copy.wav")).unwrap();

    crawl(&store, dir.path());
    assert_eq!(store.get_num_audios().unwrap(), 1);

    // A second run over the same tree inserts nothing new.
    assert_eq!(crawl(&store, dir.path()), 0);
    assert_eq!(store.get_num_audios().unwrap(), 1);
}

#[test]
#[serial]
fn excerpt_matches_its_source() {
    let Some(store) = test_store() else { return };
    let dir = TempDir::new().unwrap();
    let samples = melody_samples(20);
    write_pcm_wav(&dir.path().join("song_A.wav"), &samples);
    crawl(&store, dir.path());

    // Five seconds from ~10 s in, cut on an STFT hop boundary so the
    // excerpt's frames line up with the stored ones.
    let start = 2048 * 215;
    let probe_dir = TempDir::new().unwrap();
    let probe = probe_dir.path().join("probe.wav");
    write_pcm_wav(&probe, &samples[start..start + 5 * 44_100]);

    let report = recognizer(&store).recognize_file(&probe).unwrap();
    assert!(!report.results.is_empty());
    assert_eq!(report.results[0].audio_name, "song_A.wav");
    assert!(
        report.results[0].input_confidence >= 0.30,
        "input_confidence {}",
        report.results[0].input_confidence
    );
}

#[test]
#[serial]
fn wrong_sample_rate_files_are_skipped() {
    let Some(store) = test_store() else { return };
    let dir = TempDir::new().unwrap();
    let spec = WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(dir.path().join("slow.wav"), spec).unwrap();
    for i in 0..44_100 {
        writer.write_sample((i % 1_000) as i16).unwrap();
    }
    writer.finalize().unwrap();

    assert_eq!(crawl(&store, dir.path()), 0);
    assert_eq!(store.get_num_audios().unwrap(), 0);
}

#[test]
#[serial]
fn interrupted_ingestion_is_retried_on_the_next_run() {
    let Some(store) = test_store() else { return };
    let dir = TempDir::new().unwrap();
    let song = dir.path().join("song.wav");
    write_pcm_wav(&song, &melody_samples(5));

    // Simulate a crash after audio registration but before the
    // fingerprinted flag was set.
    let sha1 = waveprint::codec::file_sha1(&song).unwrap();
    store.insert_audio("song.wav", &sha1, 123).unwrap();

    assert_eq!(crawl(&store, dir.path()), 1);
    assert_eq!(store.get_num_audios().unwrap(), 1);
    let audio = &store.get_audios().unwrap()[0];
    assert_eq!(audio.file_sha1, sha1);
    assert_ne!(audio.total_hashes, 123);
}

#[test]
#[serial]
fn silent_probe_reports_no_results() {
    let Some(store) = test_store() else { return };
    let dir = TempDir::new().unwrap();
    write_pcm_wav(&dir.path().join("song_A.wav"), &melody_samples(5));
    crawl(&store, dir.path());

    let probe_dir = TempDir::new().unwrap();
    let probe = probe_dir.path().join("silence.wav");
    write_pcm_wav(&probe, &vec![0; 3 * 44_100]);

    let report = recognizer(&store).recognize_file(&probe).unwrap();
    assert!(report.results.is_empty());
}

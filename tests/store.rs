//! IndexStore contract tests against a live Postgres.
//!
//! They need `TEST_DATABASE_URL` to point at a scratch database and skip
//! silently when it is unset, so plain `cargo test` stays green without a
//! server. Every test resets the schema, hence `#[serial]`.

use std::collections::HashMap;

use serial_test::serial;

use waveprint::db::connector::DEFAULT_BATCH_SIZE;
use waveprint::{Error, IndexStore};

fn test_store() -> Option<IndexStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let store = IndexStore::connect(&url).expect("connect to the test database");
    store.empty().expect("reset the schema");
    Some(store)
}

const SHA_A: &str = "A9993E364706816ABA3E25717850C26C9CD0D89D";
const SHA_B: &str = "84983E441C3BD26EBAAE4AA1F95129E5E54670F1";

#[test]
#[serial]
fn audio_lifecycle_controls_visibility() {
    let Some(store) = test_store() else { return };

    let id = store.insert_audio("one.wav", SHA_A, 42).unwrap();

    // Not fingerprinted yet: invisible to catalogue reads.
    assert_eq!(store.get_num_audios().unwrap(), 0);
    assert!(store.get_audios().unwrap().is_empty());

    store.set_audio_fingerprinted(id).unwrap();

    assert_eq!(store.get_num_audios().unwrap(), 1);
    let audios = store.get_audios().unwrap();
    assert_eq!(audios.len(), 1);
    assert_eq!(audios[0].audio_id, id);
    assert_eq!(audios[0].audio_name, "one.wav");
    assert_eq!(audios[0].file_sha1, SHA_A);
    assert_eq!(audios[0].total_hashes, 42);

    let by_id = store.get_audio_by_id(id).unwrap();
    assert_eq!(by_id.audio_name, "one.wav");
    assert_eq!(by_id.file_sha1, SHA_A);
}

#[test]
#[serial]
fn sha1_hex_roundtrips_as_uppercase() {
    let Some(store) = test_store() else { return };

    let lowercase = SHA_A.to_ascii_lowercase();
    let id = store.insert_audio("lower.wav", &lowercase, 1).unwrap();
    store.set_audio_fingerprinted(id).unwrap();

    assert_eq!(store.get_audio_by_id(id).unwrap().file_sha1, SHA_A);
}

#[test]
#[serial]
fn missing_audio_is_not_found() {
    let Some(store) = test_store() else { return };

    assert!(matches!(
        store.get_audio_by_id(999_999),
        Err(Error::NotFound(999_999))
    ));
    assert!(matches!(
        store.set_audio_fingerprinted(999_999),
        Err(Error::NotFound(999_999))
    ));
}

#[test]
#[serial]
fn unfingerprinted_residue_is_reclaimed_with_its_hashes() {
    let Some(store) = test_store() else { return };

    // A crash between insert_hashes and set_audio_fingerprinted leaves
    // exactly this state behind.
    let id = store.insert_audio("crashed.wav", SHA_A, 3).unwrap();
    store
        .insert_hashes(id, &[(1, 0), (2, 5), (3, 9)], DEFAULT_BATCH_SIZE)
        .unwrap();

    let survivor = store.insert_audio("done.wav", SHA_B, 1).unwrap();
    store
        .insert_hashes(survivor, &[(9, 1)], DEFAULT_BATCH_SIZE)
        .unwrap();
    store.set_audio_fingerprinted(survivor).unwrap();

    let reclaimed = store.delete_unfingerprinted().unwrap();
    assert_eq!(reclaimed, 1);
    assert_eq!(store.get_num_audios().unwrap(), 1);
    // The residue's fingerprints cascaded away with it.
    assert_eq!(store.get_num_fingerprints().unwrap(), 1);
}

#[test]
#[serial]
fn return_matches_counts_rows_and_fans_out_probe_offsets() {
    let Some(store) = test_store() else { return };

    let a = store.insert_audio("a.wav", SHA_A, 3).unwrap();
    let b = store.insert_audio("b.wav", SHA_B, 1).unwrap();
    store
        .insert_hashes(a, &[(101, 10), (101, 50), (202, 30)], DEFAULT_BATCH_SIZE)
        .unwrap();
    store
        .insert_hashes(b, &[(101, 7)], DEFAULT_BATCH_SIZE)
        .unwrap();

    // Hash 101 occurs at two probe offsets; 303 matches nothing.
    // A batch of 1 forces one IN-clause per distinct probe hash.
    let probe = [(101, 0), (101, 5), (303, 2)];
    let (matches, counts) = store.return_matches(&probe, 1).unwrap();

    let expected_counts: HashMap<i32, usize> = [(a, 2), (b, 1)].into();
    assert_eq!(counts, expected_counts);

    let mut got = matches;
    got.sort_unstable();
    let mut expected = vec![
        (a, 10 - 0),
        (a, 10 - 5),
        (a, 50 - 0),
        (a, 50 - 5),
        (b, 7 - 0),
        (b, 7 - 5),
    ];
    expected.sort_unstable();
    assert_eq!(got, expected);
}

#[test]
#[serial]
fn return_matches_with_no_probe_is_empty() {
    let Some(store) = test_store() else { return };

    let (matches, counts) = store.return_matches(&[], DEFAULT_BATCH_SIZE).unwrap();
    assert!(matches.is_empty());
    assert!(counts.is_empty());
}

#[test]
#[serial]
fn deleting_audios_cascades_to_fingerprints() {
    let Some(store) = test_store() else { return };

    let a = store.insert_audio("a.wav", SHA_A, 2).unwrap();
    let b = store.insert_audio("b.wav", SHA_B, 2).unwrap();
    store
        .insert_hashes(a, &[(1, 0), (2, 1)], DEFAULT_BATCH_SIZE)
        .unwrap();
    store
        .insert_hashes(b, &[(3, 0), (4, 1)], DEFAULT_BATCH_SIZE)
        .unwrap();
    store.set_audio_fingerprinted(a).unwrap();
    store.set_audio_fingerprinted(b).unwrap();

    store.delete_audios(&[a], 1).unwrap();

    assert_eq!(store.get_num_audios().unwrap(), 1);
    assert_eq!(store.get_num_fingerprints().unwrap(), 2);

    // No orphans: the only fingerprints left belong to the survivor.
    let (matches, _) = store
        .return_matches(&[(1, 0), (2, 0), (3, 0), (4, 0)], DEFAULT_BATCH_SIZE)
        .unwrap();
    assert!(matches.iter().all(|&(audio_id, _)| audio_id == b));
}

#[test]
#[serial]
fn insert_hashes_respects_small_batches() {
    let Some(store) = test_store() else { return };

    let id = store.insert_audio("batched.wav", SHA_A, 5).unwrap();
    let hashes: Vec<(u64, u32)> = (0..5).map(|i| (1_000 + i as u64, i)).collect();
    store.insert_hashes(id, &hashes, 2).unwrap();

    assert_eq!(store.get_num_fingerprints().unwrap(), 5);
}

#[test]
#[serial]
fn setup_is_idempotent() {
    let Some(store) = test_store() else { return };

    store.setup().unwrap();
    store.setup().unwrap();
    assert_eq!(store.get_num_audios().unwrap(), 0);
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{info, warn};

use crate::codec;
use crate::db::connector::{DEFAULT_BATCH_SIZE, IndexStore};
use crate::error::{Error, Result};
use crate::fingerprint::{FingerprintParams, HashOffset, fingerprint_channels};

/// A fingerprinted file, ready for the commit sequence.
struct IngestedFile {
    name: String,
    sha1: String,
    hashes: Vec<HashOffset>,
}

/// Ingests a directory tree: enumerates supported files, skips content
/// already in the catalogue, fingerprints the rest on a thread pool and
/// commits results as they arrive.
pub struct Crawler {
    store: IndexStore,
    params: FingerprintParams,
    limit: Option<u32>,
    max_workers: usize,
}

impl Crawler {
    pub fn new(store: IndexStore, params: FingerprintParams) -> Self {
        Self {
            store,
            params,
            limit: None,
            max_workers: usize::MAX,
        }
    }

    /// Fingerprint only the first `seconds` of every file.
    pub fn with_limit(mut self, seconds: Option<u32>) -> Self {
        self.limit = seconds;
        self
    }

    /// Cap the worker pool below the CPU count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Crawls `path` and returns how many audios were committed.
    pub fn fingerprint_directory(&self, path: &Path, extensions: &[&str]) -> Result<usize> {
        self.store.setup()?;
        let pruned = self.store.delete_unfingerprinted()?;
        if pruned > 0 {
            info!(pruned, "reclaimed unfingerprinted audios from a previous run");
        }

        let mut known_sha1s = self.load_fingerprinted_sha1s()?;

        let mut pending = Vec::new();
        for (file, _ext) in codec::find_files(path, extensions) {
            let sha1 = match codec::file_sha1(&file) {
                Ok(sha1) => sha1,
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "failed hashing, skipping");
                    continue;
                }
            };
            if known_sha1s.contains(&sha1) {
                info!(file = %file.display(), "already fingerprinted, continuing");
                continue;
            }
            pending.push(file);
        }
        if pending.is_empty() {
            info!("nothing new to ingest");
            return Ok(0);
        }

        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(self.max_workers);
        info!(files = pending.len(), workers, "starting ingestion");

        let jobs = Arc::new(Mutex::new(pending));
        let (tx, rx) = mpsc::channel::<std::result::Result<IngestedFile, (PathBuf, Error)>>();

        let mut committed = 0;
        thread::scope(|scope| -> Result<()> {
            for _ in 0..workers {
                let jobs = Arc::clone(&jobs);
                let tx = tx.clone();
                let params = &self.params;
                let limit = self.limit;
                scope.spawn(move || {
                    loop {
                        let next = {
                            let Ok(mut queue) = jobs.lock() else { break };
                            queue.pop()
                        };
                        let Some(file) = next else { break };

                        let outcome =
                            fingerprint_file(&file, limit, params).map_err(|e| (file, e));
                        if tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            // The driver's own sender must go away for `rx` to drain dry.
            drop(tx);

            for outcome in rx {
                match outcome {
                    Ok(ingested) => {
                        if known_sha1s.contains(&ingested.sha1) {
                            info!(name = %ingested.name, "duplicate content, skipping");
                            continue;
                        }
                        self.commit(&ingested)?;
                        committed += 1;
                        known_sha1s = self.load_fingerprinted_sha1s()?;
                    }
                    Err((file, err)) => {
                        warn!(file = %file.display(), error = %err, "failed fingerprinting, skipping");
                    }
                }
            }
            Ok(())
        })?;

        info!(committed, "ingestion finished");
        Ok(committed)
    }

    /// The three-step commit. A crash anywhere before the final step
    /// leaves the audio at `fingerprinted = 0`, reclaimed on next startup.
    fn commit(&self, ingested: &IngestedFile) -> Result<()> {
        let audio_id =
            self.store
                .insert_audio(&ingested.name, &ingested.sha1, ingested.hashes.len() as u32)?;
        self.store
            .insert_hashes(audio_id, &ingested.hashes, DEFAULT_BATCH_SIZE)?;
        self.store.set_audio_fingerprinted(audio_id)?;

        info!(audio_id, name = %ingested.name, hashes = ingested.hashes.len(), "ingested");
        Ok(())
    }

    fn load_fingerprinted_sha1s(&self) -> Result<HashSet<String>> {
        Ok(self
            .store
            .get_audios()?
            .into_iter()
            .map(|audio| audio.file_sha1)
            .collect())
    }
}

fn fingerprint_file(
    path: &Path,
    limit: Option<u32>,
    params: &FingerprintParams,
) -> Result<IngestedFile> {
    let record = codec::read_file(path, limit)?;
    let hashes = fingerprint_channels(&record.channels, params);
    Ok(IngestedFile {
        name: record.name,
        sha1: record.sha1,
        hashes: hashes.into_iter().collect(),
    })
}

/// Fingerprints for a whole file, unioned across channels. Exposed for
/// callers that want the hash set without touching the store.
pub fn file_fingerprints(
    path: &Path,
    limit: Option<u32>,
    params: &FingerprintParams,
) -> Result<(HashSet<HashOffset>, String)> {
    let record = codec::read_file(path, limit)?;
    let hashes = fingerprint_channels(&record.channels, params);
    Ok((hashes, record.sha1))
}

use std::collections::HashMap;

use diesel::dsl::insert_into;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_query;

use crate::db::bindings::{AudioRecord, AudioRow, FingerprintRow, NewAudio};
use crate::error::{Error, Result};
use crate::fingerprint::HashOffset;

/// Default chunk size for bulk inserts, IN-clause lookups and deletes.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

// Schema DDL. Kept as constants so the store never builds SQL per call;
// everything else goes through the typed query builder.
const CREATE_AUDIOS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS audios (
    audio_id      SERIAL PRIMARY KEY,
    audio_name    VARCHAR(250) NOT NULL,
    fingerprinted SMALLINT DEFAULT 0,
    file_sha1     BYTEA,
    total_hashes  INT NOT NULL DEFAULT 0,
    dt_created    TIMESTAMP NOT NULL DEFAULT now(),
    dt_modified   TIMESTAMP NOT NULL DEFAULT now()
)";

const CREATE_FINGERPRINTS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS fingerprints (
    hash     BIGINT NOT NULL,
    audio_id INT NOT NULL REFERENCES audios (audio_id) ON DELETE CASCADE,
    \"offset\" INT NOT NULL
)";

// Lookups are equality-only, so a hash index beats a btree here.
const CREATE_FINGERPRINTS_HASH_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS ix_fingerprints_hash ON fingerprints USING hash (hash)";

const DROP_FINGERPRINTS: &str = "DROP TABLE IF EXISTS fingerprints";
const DROP_AUDIOS: &str = "DROP TABLE IF EXISTS audios";

type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

/// Persistent hash index plus audio catalogue. Owns the connection pool;
/// clones share it, so one store can be handed to every component.
#[derive(Clone)]
pub struct IndexStore {
    pool: PgPool,
}

impl IndexStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().max_size(5).build(manager)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PgPooled> {
        Ok(self.pool.get()?)
    }

    /// Ensures the schema exists. Idempotent.
    pub fn setup(&self) -> Result<()> {
        let mut conn = self.conn()?;
        sql_query(CREATE_AUDIOS_TABLE).execute(&mut conn)?;
        sql_query(CREATE_FINGERPRINTS_TABLE).execute(&mut conn)?;
        sql_query(CREATE_FINGERPRINTS_HASH_INDEX).execute(&mut conn)?;
        Ok(())
    }

    /// Drops and recreates all tables.
    pub fn empty(&self) -> Result<()> {
        {
            let mut conn = self.conn()?;
            sql_query(DROP_FINGERPRINTS).execute(&mut conn)?;
            sql_query(DROP_AUDIOS).execute(&mut conn)?;
        }
        self.setup()
    }

    /// Removes audios left at `fingerprinted = 0` by a crashed ingestion.
    /// Their fingerprints cascade. Returns how many rows were reclaimed.
    pub fn delete_unfingerprinted(&self) -> Result<usize> {
        use crate::schema::audios::dsl::*;

        let mut conn = self.conn()?;
        Ok(diesel::delete(audios.filter(fingerprinted.eq(0_i16))).execute(&mut conn)?)
    }

    /// Registers an audio with `fingerprinted = 0` and returns its new id.
    pub fn insert_audio(&self, name: &str, sha1_hex: &str, total: u32) -> Result<i32> {
        use crate::schema::audios::dsl::*;

        let sha1_bytes = hex::decode(sha1_hex)
            .map_err(|_| Error::InvalidInput(format!("bad sha1 hex: {sha1_hex:?}")))?;

        let mut conn = self.conn()?;
        let new_id = insert_into(audios)
            .values(&NewAudio {
                audio_name: name,
                file_sha1: sha1_bytes,
                total_hashes: total as i32,
            })
            .returning(audio_id)
            .get_result::<i32>(&mut conn)?;
        Ok(new_id)
    }

    /// Bulk-inserts `(hash, offset)` pairs for one audio, `batch` rows per
    /// statement, inside a single transaction. Duplicate rows are dropped
    /// by ON CONFLICT DO NOTHING.
    pub fn insert_hashes(&self, audio: i32, hashes: &[HashOffset], batch: usize) -> Result<()> {
        use crate::schema::fingerprints::dsl::*;

        let rows: Vec<FingerprintRow> = hashes
            .iter()
            .map(|&(fp_hash, fp_offset)| FingerprintRow {
                hash: fp_hash as i64,
                audio_id: audio,
                offset: fp_offset as i32,
            })
            .collect();

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            for chunk in rows.chunks(batch.max(1)) {
                insert_into(fingerprints)
                    .values(chunk)
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Flips the audio to `fingerprinted = 1`, stamping `dt_modified`.
    /// Only after this do observers see the audio at all.
    pub fn set_audio_fingerprinted(&self, id: i32) -> Result<()> {
        use crate::schema::audios::dsl::*;

        let mut conn = self.conn()?;
        let updated = diesel::update(audios.filter(audio_id.eq(id)))
            .set((fingerprinted.eq(1_i16), dt_modified.eq(diesel::dsl::now)))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    /// All fully fingerprinted audios.
    pub fn get_audios(&self) -> Result<Vec<AudioRecord>> {
        use crate::schema::audios::dsl::*;

        let mut conn = self.conn()?;
        let rows = audios
            .filter(fingerprinted.eq(1_i16))
            .select(AudioRow::as_select())
            .load::<AudioRow>(&mut conn)?;
        Ok(rows.into_iter().map(AudioRecord::from).collect())
    }

    pub fn get_audio_by_id(&self, id: i32) -> Result<AudioRecord> {
        use crate::schema::audios::dsl::*;

        let mut conn = self.conn()?;
        audios
            .find(id)
            .select(AudioRow::as_select())
            .first::<AudioRow>(&mut conn)
            .optional()?
            .map(AudioRecord::from)
            .ok_or(Error::NotFound(id))
    }

    pub fn get_num_audios(&self) -> Result<i64> {
        use crate::schema::audios::dsl::*;

        let mut conn = self.conn()?;
        Ok(audios
            .filter(fingerprinted.eq(1_i16))
            .count()
            .get_result(&mut conn)?)
    }

    pub fn get_num_fingerprints(&self) -> Result<i64> {
        use crate::schema::fingerprints::dsl::*;

        let mut conn = self.conn()?;
        Ok(fingerprints.count().get_result(&mut conn)?)
    }

    /// Looks up every probe hash and returns the raw alignment votes.
    ///
    /// The result is a list of `(audio_id, db_offset - probe_offset)`
    /// pairs, one per (stored row, probe offset) combination, plus a map
    /// counting stored rows hit per audio (probe-side duplicates do not
    /// inflate it). Lookups go out in IN-clauses of at most `batch` keys.
    pub fn return_matches(
        &self,
        hashes: &[HashOffset],
        batch: usize,
    ) -> Result<(Vec<(i32, i64)>, HashMap<i32, usize>)> {
        use crate::schema::fingerprints::dsl::*;

        let mut probe: HashMap<i64, Vec<u32>> = HashMap::new();
        for &(fp_hash, fp_offset) in hashes {
            probe.entry(fp_hash as i64).or_default().push(fp_offset);
        }
        let keys: Vec<i64> = probe.keys().copied().collect();

        let mut matches = Vec::new();
        let mut dedup_hashes: HashMap<i32, usize> = HashMap::new();

        let mut conn = self.conn()?;
        for chunk in keys.chunks(batch.max(1)) {
            let rows = fingerprints
                .filter(hash.eq_any(chunk))
                .select((hash, audio_id, offset))
                .load::<(i64, i32, i32)>(&mut conn)?;

            for (row_hash, row_audio_id, db_offset) in rows {
                *dedup_hashes.entry(row_audio_id).or_insert(0) += 1;
                if let Some(probe_offsets) = probe.get(&row_hash) {
                    for &probe_offset in probe_offsets {
                        matches.push((row_audio_id, db_offset as i64 - probe_offset as i64));
                    }
                }
            }
        }

        Ok((matches, dedup_hashes))
    }

    /// Deletes audios in id batches; fingerprints cascade.
    pub fn delete_audios(&self, ids: &[i32], batch: usize) -> Result<()> {
        use crate::schema::audios::dsl::*;

        let mut conn = self.conn()?;
        for chunk in ids.chunks(batch.max(1)) {
            diesel::delete(audios.filter(audio_id.eq_any(chunk))).execute(&mut conn)?;
        }
        Ok(())
    }
}

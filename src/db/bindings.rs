use std::time::SystemTime;

use diesel::prelude::*;

/// Catalogue row as stored.
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::audios)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AudioRow {
    pub audio_id: i32,
    pub audio_name: String,
    pub fingerprinted: i16,
    pub file_sha1: Option<Vec<u8>>,
    pub total_hashes: i32,
    pub dt_created: SystemTime,
    pub dt_modified: SystemTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::audios)]
pub struct NewAudio<'a> {
    pub audio_name: &'a str,
    pub file_sha1: Vec<u8>,
    pub total_hashes: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::fingerprints)]
pub struct FingerprintRow {
    pub hash: i64,
    pub audio_id: i32,
    pub offset: i32,
}

/// Catalogue entry handed out by the store, signature in upper-case hex.
#[derive(Debug, Clone)]
pub struct AudioRecord {
    pub audio_id: i32,
    pub audio_name: String,
    pub file_sha1: String,
    pub total_hashes: i32,
    pub dt_created: SystemTime,
}

impl From<AudioRow> for AudioRecord {
    fn from(row: AudioRow) -> Self {
        Self {
            audio_id: row.audio_id,
            audio_name: row.audio_name,
            file_sha1: hex::encode_upper(row.file_sha1.unwrap_or_default()),
            total_hashes: row.total_hashes,
            dt_created: row.dt_created,
        }
    }
}

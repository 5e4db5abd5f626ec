//! Acoustic-fingerprinting search engine: crawl a directory of audio into
//! a Postgres-backed hash index, then match short probe recordings against
//! it by spectral-peak alignment.

pub mod codec;
pub mod config;
pub mod crawler;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod recognizer;
pub mod schema;
pub mod spectral;

pub use crate::crawler::Crawler;
pub use crate::db::connector::IndexStore;
pub use crate::error::{Error, Result};
pub use crate::fingerprint::FingerprintParams;
pub use crate::recognizer::Recognizer;

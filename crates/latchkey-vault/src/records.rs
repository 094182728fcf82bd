// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential table with two encryption layers.
//!
//! On disk the table is a CSV file with the header `site,username,password`.
//! Username and password cells always hold field tokens (see
//! [`crypto::encrypt_field`]). When the vault is closed the whole CSV is
//! additionally sealed into a single opaque blob, hiding even the row count.
//!
//! The file is in exactly one of two states at any time: sealed, or open
//! (plaintext CSV of tokens). Every write goes through an atomic rename, so
//! no reader can observe a mix of both.

use std::path::{Path, PathBuf};

use latchkey_core::LatchkeyError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto;
use crate::keystore::KeyMaterial;
use crate::paths::write_atomic;

/// Column names of the credential table, in order.
pub const TABLE_HEADER: [&str; 3] = ["site", "username", "password"];

/// Shown in place of fields that failed to decrypt.
pub const DECRYPT_ERROR_PLACEHOLDER: &str = "[error: could not decrypt]";

/// One persisted row. `username` and `password` are field tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub site: String,
    pub username: String,
    pub password: String,
}

/// Plaintext view of a row's secret fields.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// A row prepared for display.
///
/// A row whose tokens do not decrypt keeps its site and carries the error,
/// so the rest of the listing is unaffected.
#[derive(Debug)]
pub struct DecryptedRow {
    pub site: String,
    pub credentials: Result<Credentials, LatchkeyError>,
}

impl DecryptedRow {
    pub fn is_ok(&self) -> bool {
        self.credentials.is_ok()
    }

    pub fn username_or_placeholder(&self) -> &str {
        match &self.credentials {
            Ok(c) => &c.username,
            Err(_) => DECRYPT_ERROR_PLACEHOLDER,
        }
    }

    pub fn password_or_placeholder(&self) -> &str {
        match &self.credentials {
            Ok(c) => c.password.expose_secret(),
            Err(_) => DECRYPT_ERROR_PLACEHOLDER,
        }
    }
}

/// In-memory credential table, keyed by site, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialTable {
    records: Vec<CredentialRecord>,
}

impl CredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sites in table order.
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.site.as_str())
    }

    /// Raw (token-bearing) rows.
    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    /// Encrypt both fields and insert, or overwrite the row for `site` in place.
    pub fn upsert(
        &mut self,
        site: &str,
        username: &str,
        password: &SecretString,
        key: &KeyMaterial,
    ) -> Result<(), LatchkeyError> {
        let username = crypto::encrypt_field(key.expose(), username)?;
        let password = crypto::encrypt_field(key.expose(), password.expose_secret())?;

        match self.records.iter_mut().find(|r| r.site == site) {
            Some(existing) => {
                existing.username = username;
                existing.password = password;
                debug!(site = %site, "credential updated");
            }
            None => {
                self.records.push(CredentialRecord {
                    site: site.to_string(),
                    username,
                    password,
                });
                debug!(site = %site, "credential added");
            }
        }
        Ok(())
    }

    /// Remove the row for `site`. Returns whether one existed.
    pub fn remove(&mut self, site: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.site != site);
        let removed = self.records.len() != before;
        if removed {
            debug!(site = %site, "credential removed");
        }
        removed
    }

    /// Decrypt every row for display, isolating failures per row.
    pub fn list_decrypted(&self, key: &KeyMaterial) -> Vec<DecryptedRow> {
        self.records
            .iter()
            .map(|record| {
                let credentials = decrypt_record(record, key);
                if credentials.is_err() {
                    warn!(site = %record.site, "row failed to decrypt");
                }
                DecryptedRow {
                    site: record.site.clone(),
                    credentials,
                }
            })
            .collect()
    }

    /// Decrypt the row for `site`, if present.
    pub fn lookup(&self, site: &str, key: &KeyMaterial) -> Option<DecryptedRow> {
        self.records
            .iter()
            .find(|r| r.site == site)
            .map(|record| DecryptedRow {
                site: record.site.clone(),
                credentials: decrypt_record(record, key),
            })
    }

    /// Serialize as the open-state CSV (header always present).
    pub fn to_csv(&self) -> Result<Vec<u8>, LatchkeyError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(TABLE_HEADER).map_err(csv_error)?;
        for record in &self.records {
            writer.serialize(record).map_err(csv_error)?;
        }
        writer
            .into_inner()
            .map_err(|e| LatchkeyError::Internal(format!("failed to flush CSV buffer: {e}")))
    }

    /// Parse an open-state CSV. The header must match exactly.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, LatchkeyError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes);

        let headers = reader.headers().map_err(csv_error)?;
        if !headers.iter().eq(TABLE_HEADER) {
            return Err(LatchkeyError::CorruptFile(format!(
                "unexpected credential table header `{}`",
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }

        let mut table = Self::new();
        for row in reader.deserialize::<CredentialRecord>() {
            let record = row.map_err(csv_error)?;
            // Later duplicates win, matching upsert semantics.
            match table.records.iter_mut().find(|r| r.site == record.site) {
                Some(existing) => *existing = record,
                None => table.records.push(record),
            }
        }
        Ok(table)
    }
}

fn decrypt_record(record: &CredentialRecord, key: &KeyMaterial) -> Result<Credentials, LatchkeyError> {
    let row_error = || LatchkeyError::RowDecryptionFailure {
        site: record.site.clone(),
    };
    let username = crypto::decrypt_field(key.expose(), &record.username).map_err(|_| row_error())?;
    let password = crypto::decrypt_field(key.expose(), &record.password).map_err(|_| row_error())?;
    Ok(Credentials {
        username,
        password: SecretString::from(password),
    })
}

fn csv_error(e: csv::Error) -> LatchkeyError {
    LatchkeyError::CorruptFile(format!("credential table: {e}"))
}

/// State of the credential file as found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFileState {
    Missing,
    /// Zero bytes.
    Empty,
    /// Plaintext CSV of field tokens.
    Open,
    /// Whole-file ciphertext.
    Sealed,
}

/// File-level operations on the credential table.
#[derive(Debug, Clone)]
pub struct EncryptedRecordStore {
    path: PathBuf,
}

impl EncryptedRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classify the file on disk.
    ///
    /// Anything that is neither the sealed magic nor the canonical header is
    /// reported as [`LatchkeyError::CorruptFile`].
    pub fn file_state(&self) -> Result<TableFileState, LatchkeyError> {
        let Some(bytes) = self.read_optional()? else {
            return Ok(TableFileState::Missing);
        };
        classify(&bytes)
    }

    /// Whether the file may hold records that only the missing key could read.
    ///
    /// Missing, empty, and header-only files hold none. A sealed file cannot
    /// be inspected without its key, so it counts as holding records.
    pub fn may_hold_records(&self) -> Result<bool, LatchkeyError> {
        let Some(bytes) = self.read_optional()? else {
            return Ok(false);
        };
        match classify(&bytes)? {
            TableFileState::Missing | TableFileState::Empty => Ok(false),
            TableFileState::Open => Ok(!CredentialTable::from_csv(&bytes)?.is_empty()),
            TableFileState::Sealed => Ok(true),
        }
    }

    /// Write a header-only table if the file is absent or zero bytes.
    ///
    /// Idempotent: an existing non-empty file is left untouched.
    pub fn ensure_table_exists(&self) -> Result<(), LatchkeyError> {
        match self.file_state()? {
            TableFileState::Missing | TableFileState::Empty => {
                let header = CredentialTable::new().to_csv()?;
                write_atomic(&self.path, &header)
                    .map_err(|e| LatchkeyError::io(&self.path, e))?;
                info!(path = %self.path.display(), "created empty credential table");
                Ok(())
            }
            TableFileState::Open | TableFileState::Sealed => Ok(()),
        }
    }

    /// Load the table into memory, unsealing it with `key`.
    ///
    /// A missing or empty file yields an empty table. An open-state file
    /// (left behind by a crash, or freshly created) is parsed as-is and will
    /// be sealed on the next [`seal_to_disk`](Self::seal_to_disk), unless
    /// none of its rows decrypt under `key`.
    pub fn open_from_sealed(&self, key: &KeyMaterial) -> Result<CredentialTable, LatchkeyError> {
        let Some(bytes) = self.read_optional()? else {
            return Ok(CredentialTable::new());
        };

        match classify(&bytes)? {
            TableFileState::Missing | TableFileState::Empty => Ok(CredentialTable::new()),
            TableFileState::Open => {
                let table = CredentialTable::from_csv(&bytes)?;
                let readable = table.records.iter().any(|r| decrypt_record(r, key).is_ok());
                if !table.is_empty() && !readable {
                    return Err(LatchkeyError::DecryptionFailure(
                        "no row of the unsealed credential file decrypts under this key".to_string(),
                    ));
                }
                if !table.is_empty() {
                    warn!(
                        path = %self.path.display(),
                        rows = table.len(),
                        "credential file was left unsealed; it will be sealed on close"
                    );
                }
                Ok(table)
            }
            TableFileState::Sealed => {
                let plaintext = crypto::open_blob(key.expose(), &bytes)?;
                let table = CredentialTable::from_csv(&plaintext).map_err(|e| {
                    LatchkeyError::DecryptionFailure(format!(
                        "unsealed content is not a credential table: {e}"
                    ))
                })?;
                debug!(rows = table.len(), "credential table unsealed");
                Ok(table)
            }
        }
    }

    /// Serialize `table`, seal it with `key`, and atomically replace the file.
    pub fn seal_to_disk(&self, table: &CredentialTable, key: &KeyMaterial) -> Result<(), LatchkeyError> {
        let csv = zeroize::Zeroizing::new(table.to_csv()?);
        let blob = crypto::seal_blob(key.expose(), &csv)?;
        write_atomic(&self.path, &blob).map_err(|e| LatchkeyError::io(&self.path, e))?;
        info!(path = %self.path.display(), rows = table.len(), "credential table sealed");
        Ok(())
    }

    /// Replace whatever is on disk with an empty table sealed under `key`.
    ///
    /// Used when the key is regenerated: records sealed under the lost key are
    /// unrecoverable, so they are discarded.
    pub fn reset_sealed(&self, key: &KeyMaterial) -> Result<(), LatchkeyError> {
        warn!(path = %self.path.display(), "discarding all stored credentials");
        self.seal_to_disk(&CredentialTable::new(), key)
    }

    fn read_optional(&self) -> Result<Option<Vec<u8>>, LatchkeyError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LatchkeyError::io(&self.path, e)),
        }
    }
}

fn classify(bytes: &[u8]) -> Result<TableFileState, LatchkeyError> {
    if bytes.is_empty() {
        return Ok(TableFileState::Empty);
    }
    if crypto::is_sealed_blob(bytes) {
        return Ok(TableFileState::Sealed);
    }
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);
    if first_line == TABLE_HEADER.join(",").as_bytes() {
        return Ok(TableFileState::Open);
    }
    Err(LatchkeyError::CorruptFile(
        "credential file is neither sealed nor a credential table".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyMaterial {
        KeyMaterial::generate().unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn store_in(dir: &tempfile::TempDir) -> EncryptedRecordStore {
        EncryptedRecordStore::new(dir.path().join("passwords.csv"))
    }

    #[test]
    fn upsert_overwrites_by_site() {
        let key = key();
        let mut table = CredentialTable::new();

        table.upsert("example.com", "alice", &secret("first"), &key).unwrap();
        table.upsert("other.org", "bob", &secret("x"), &key).unwrap();
        table.upsert("example.com", "alice", &secret("second"), &key).unwrap();

        assert_eq!(table.len(), 2);
        let row = table.lookup("example.com", &key).unwrap();
        assert_eq!(row.password_or_placeholder(), "second");
        // Overwrite keeps the original position.
        assert_eq!(table.sites().collect::<Vec<_>>(), ["example.com", "other.org"]);
    }

    #[test]
    fn fields_are_not_stored_in_plaintext() {
        let key = key();
        let mut table = CredentialTable::new();
        table.upsert("site.com", "alice", &secret("p@ss"), &key).unwrap();

        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert!(csv.starts_with("site,username,password\n"));
        assert!(csv.contains("site.com"));
        assert!(!csv.contains("alice"));
        assert!(!csv.contains("p@ss"));
    }

    #[test]
    fn remove_reports_whether_row_existed() {
        let key = key();
        let mut table = CredentialTable::new();
        table.upsert("site.com", "alice", &secret("p"), &key).unwrap();

        assert!(table.remove("site.com"));
        assert!(!table.remove("site.com"));
        assert!(table.is_empty());
    }

    #[test]
    fn bad_row_does_not_abort_listing() {
        let key = key();
        let mut table = CredentialTable::new();
        table.upsert("good.com", "alice", &secret("p1"), &key).unwrap();
        table.records.push(CredentialRecord {
            site: "broken.com".to_string(),
            username: "garbage".to_string(),
            password: "garbage".to_string(),
        });
        table.upsert("also-good.com", "bob", &secret("p2"), &key).unwrap();

        let rows = table.list_decrypted(&key);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert!(matches!(
            rows[1].credentials,
            Err(LatchkeyError::RowDecryptionFailure { ref site }) if site == "broken.com"
        ));
        assert_eq!(rows[1].username_or_placeholder(), DECRYPT_ERROR_PLACEHOLDER);
        assert_eq!(rows[2].username_or_placeholder(), "bob");
    }

    #[test]
    fn ensure_table_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.ensure_table_exists().unwrap();
        let once = std::fs::read(store.path()).unwrap();
        store.ensure_table_exists().unwrap();
        let twice = std::fs::read(store.path()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once, b"site,username,password\n");
        assert_eq!(store.file_state().unwrap(), TableFileState::Open);
    }

    #[test]
    fn ensure_table_exists_fills_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), b"").unwrap();
        assert_eq!(store.file_state().unwrap(), TableFileState::Empty);

        store.ensure_table_exists().unwrap();
        assert_eq!(std::fs::read(store.path()).unwrap(), b"site,username,password\n");
    }

    #[test]
    fn sealed_file_is_not_a_table_and_unseals_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let key = key();
        let mut table = CredentialTable::new();
        table.upsert("site.com", "alice", &secret("p@ss"), &key).unwrap();

        store.seal_to_disk(&table, &key).unwrap();

        let on_disk = std::fs::read(store.path()).unwrap();
        assert_eq!(store.file_state().unwrap(), TableFileState::Sealed);
        assert!(CredentialTable::from_csv(&on_disk).is_err());

        let reopened = store.open_from_sealed(&key).unwrap();
        assert_eq!(reopened, table);
    }

    #[test]
    fn wrong_key_is_decryption_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.seal_to_disk(&CredentialTable::new(), &key()).unwrap();

        let err = store.open_from_sealed(&key()).unwrap_err();
        assert!(matches!(err, LatchkeyError::DecryptionFailure(_)));
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.file_state().unwrap(), TableFileState::Missing);
        assert!(store.open_from_sealed(&key()).unwrap().is_empty());
        assert!(!store.may_hold_records().unwrap());
    }

    #[test]
    fn leftover_open_file_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let key = key();
        let mut table = CredentialTable::new();
        table.upsert("site.com", "alice", &secret("p"), &key).unwrap();
        std::fs::write(store.path(), table.to_csv().unwrap()).unwrap();

        assert!(store.may_hold_records().unwrap());
        assert_eq!(store.open_from_sealed(&key).unwrap(), table);
    }

    #[test]
    fn leftover_open_file_under_another_key_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut table = CredentialTable::new();
        table.upsert("site.com", "alice", &secret("p"), &key()).unwrap();
        let csv = table.to_csv().unwrap();
        std::fs::write(store.path(), &csv).unwrap();

        let err = store.open_from_sealed(&key()).unwrap_err();
        assert!(matches!(err, LatchkeyError::DecryptionFailure(_)));
        assert_eq!(std::fs::read(store.path()).unwrap(), csv);
    }

    #[test]
    fn leftover_open_file_with_one_bad_row_is_adopted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let key = key();
        let mut table = CredentialTable::new();
        table.upsert("bad.com", "x", &secret("y"), &self::key()).unwrap();
        table.upsert("site.com", "alice", &secret("p"), &key).unwrap();
        std::fs::write(store.path(), table.to_csv().unwrap()).unwrap();

        let opened = store.open_from_sealed(&key).unwrap();
        let rows = opened.list_decrypted(&key);
        assert!(!rows[0].is_ok());
        assert!(rows[1].is_ok());
    }

    #[test]
    fn foreign_content_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), b"SITE;USER;PASSWORD\n").unwrap();

        assert!(matches!(store.file_state(), Err(LatchkeyError::CorruptFile(_))));
    }

    #[test]
    fn reset_sealed_discards_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let old_key = key();
        let mut table = CredentialTable::new();
        table.upsert("site.com", "alice", &secret("p"), &old_key).unwrap();
        store.seal_to_disk(&table, &old_key).unwrap();

        let new_key = key();
        store.reset_sealed(&new_key).unwrap();

        assert!(store.open_from_sealed(&new_key).unwrap().is_empty());
        assert!(matches!(
            store.open_from_sealed(&old_key),
            Err(LatchkeyError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn duplicate_sites_in_file_collapse() {
        let csv = b"site,username,password\na.com,t1,t2\na.com,t3,t4\n";
        let table = CredentialTable::from_csv(csv).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].username, "t3");
    }
}

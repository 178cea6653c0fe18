// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Journal of completed window signatures.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use chronicler_core::types::format_timestamp;
use chronicler_core::{ChroniclerError, CommitOutcome, JournalEntry, JournalStatus, Signature};

use super::{parse_text, parse_ts};
use crate::database::{Database, map_tr_err};

pub async fn lookup(
    db: &Database,
    signature: &Signature,
) -> Result<Option<JournalEntry>, ChroniclerError> {
    let key = signature.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<JournalEntry>, rusqlite::Error> {
            conn.query_row(
                "SELECT signature, status, result_reference, created_at
                 FROM journal WHERE signature = ?1",
                params![key],
                |row| {
                    let status: String = row.get(1)?;
                    let created_at: String = row.get(3)?;
                    Ok(JournalEntry {
                        signature: Signature::from_raw(row.get::<_, String>(0)?),
                        status: parse_text::<JournalStatus>(1, &status)?,
                        result_reference: row.get(2)?,
                        created_at: parse_ts(3, &created_at)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts the signature unless it is already present.
///
/// An existing row is left untouched, so repeated commits are idempotent.
pub async fn commit(
    db: &Database,
    signature: &Signature,
    result_reference: &str,
    now: DateTime<Utc>,
) -> Result<CommitOutcome, ChroniclerError> {
    let key = signature.to_string();
    let result_reference = result_reference.to_string();
    let created_at = format_timestamp(&now);
    db.connection()
        .call(move |conn| -> Result<CommitOutcome, rusqlite::Error> {
            let inserted = conn.execute(
                "INSERT INTO journal (signature, status, result_reference, created_at)
                 VALUES (?1, 'done', ?2, ?3)
                 ON CONFLICT(signature) DO NOTHING",
                params![key, result_reference, created_at],
            )?;
            Ok(if inserted == 0 {
                CommitOutcome::AlreadyCommitted
            } else {
                CommitOutcome::Committed
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database) -> Result<u64, ChroniclerError> {
    db.connection()
        .call(|conn| -> Result<u64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM journal", [], |row| row.get(0))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn lookup_misses_before_commit() {
        let (db, _dir) = setup_db().await;
        let sig = Signature::from_raw("aaa:bbb:model");
        assert!(lookup(&db, &sig).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_then_lookup_returns_done_entry() {
        let (db, _dir) = setup_db().await;
        let sig = Signature::from_raw("aaa:bbb:model");
        let outcome = commit(&db, &sig, "posts/1.md", at(0)).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let entry = lookup(&db, &sig).await.unwrap().unwrap();
        assert_eq!(entry.signature, sig);
        assert_eq!(entry.status, JournalStatus::Done);
        assert_eq!(entry.result_reference, "posts/1.md");
        assert_eq!(entry.created_at, at(0));
    }

    #[tokio::test]
    async fn second_commit_is_noop_and_keeps_first_entry() {
        let (db, _dir) = setup_db().await;
        let sig = Signature::from_raw("aaa:bbb:model");
        commit(&db, &sig, "posts/1.md", at(0)).await.unwrap();
        let before = lookup(&db, &sig).await.unwrap();

        let outcome = commit(&db, &sig, "posts/other.md", at(5)).await.unwrap();
        assert_eq!(outcome, CommitOutcome::AlreadyCommitted);
        assert_eq!(lookup(&db, &sig).await.unwrap(), before);
        assert_eq!(count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_commits_of_one_signature_store_one_row() {
        let (db, _dir) = setup_db().await;
        let sig = Signature::from_raw("ccc:ddd:model");
        let commits = (0..8).map(|i| {
            let db = db.clone();
            let sig = sig.clone();
            tokio::spawn(async move { commit(&db, &sig, &format!("ref-{i}"), at(1)).await })
        });
        let outcomes: Vec<CommitOutcome> = futures::future::join_all(commits)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();
        let committed = outcomes
            .iter()
            .filter(|o| **o == CommitOutcome::Committed)
            .count();
        assert_eq!(committed, 1);
        assert_eq!(count(&db).await.unwrap(), 1);
    }
}

// SQLite persistence layer for the story catalogue.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::story::{Neighborhoods, NewStory, Story};

/// Result of merging a batch of stories into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub new_count: usize,
    /// Stories whose URL was already stored (or repeated within the batch).
    pub duplicate_count: usize,
}

impl MergeOutcome {
    pub fn processed(&self) -> usize {
        self.new_count + self.duplicate_count
    }
}

/// SQLite-backed story store with a key-value table for service state.
/// URLs are unique; ids are assigned on insert and never reused.
pub struct Database {
    conn: Mutex<Connection>,
}

const STORY_COLUMNS: &str =
    "id, url, title, author, date, social_abstract, umbrella, geographic_area, neighborhoods";

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS stories (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                url             TEXT NOT NULL UNIQUE,
                title           TEXT NOT NULL DEFAULT '',
                author          TEXT NOT NULL DEFAULT '',
                date            TEXT NOT NULL DEFAULT '',
                social_abstract TEXT NOT NULL DEFAULT '',
                umbrella        TEXT NOT NULL DEFAULT '',
                geographic_area TEXT NOT NULL DEFAULT '',
                neighborhoods   TEXT NOT NULL DEFAULT '[]',
                added_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS app_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Stories
    // ------------------------------------------------------------------

    /// Merge pipeline output into the store. Stories whose URL is already
    /// present are skipped and counted as duplicates; the whole batch is
    /// one transaction.
    pub fn insert_new(&self, stories: &[NewStory]) -> Result<MergeOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin merge transaction")?;
        let mut outcome = MergeOutcome::default();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO stories
                        (url, title, author, date, social_abstract, umbrella, geographic_area, neighborhoods)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .context("failed to prepare story insert")?;

            for story in stories {
                let url = story.url.trim();
                if url.is_empty() {
                    tracing::debug!("skipping story without a URL");
                    continue;
                }
                let neighborhoods = encode_neighborhoods(&Neighborhoods::List(
                    story.neighborhoods.clone(),
                ))?;
                let inserted = stmt
                    .execute(params![
                        url,
                        story.title,
                        story.author,
                        story.date,
                        story.social_abstract,
                        story.umbrella,
                        story.geographic_area,
                        neighborhoods,
                    ])
                    .with_context(|| format!("failed to insert story {url}"))?;
                if inserted == 1 {
                    outcome.new_count += 1;
                } else {
                    outcome.duplicate_count += 1;
                }
            }
        }

        tx.commit().context("failed to commit merge")?;
        Ok(outcome)
    }

    /// Load stories from a snapshot, keeping their ids. Rows whose URL or id
    /// is already taken are skipped.
    pub fn import_snapshot(&self, stories: &[Story]) -> Result<MergeOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin snapshot import")?;
        let mut outcome = MergeOutcome::default();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO stories
                        (id, url, title, author, date, social_abstract, umbrella, geographic_area, neighborhoods)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .context("failed to prepare snapshot insert")?;

            for story in stories {
                let url = story.url.trim();
                if url.is_empty() {
                    continue;
                }
                let inserted = stmt
                    .execute(params![
                        story.id,
                        url,
                        story.title,
                        story.author,
                        story.date,
                        story.social_abstract,
                        story.umbrella,
                        story.geographic_area,
                        encode_neighborhoods(&story.neighborhoods)?,
                    ])
                    .with_context(|| format!("failed to import story {url}"))?;
                if inserted == 1 {
                    outcome.new_count += 1;
                } else {
                    outcome.duplicate_count += 1;
                }
            }
        }

        tx.commit().context("failed to commit snapshot import")?;
        Ok(outcome)
    }

    /// All stories ordered by id.
    pub fn all_stories(&self) -> Result<Vec<Story>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {STORY_COLUMNS} FROM stories ORDER BY id"))
            .context("failed to prepare all_stories query")?;

        let stories = stmt
            .query_map([], story_from_row)
            .context("failed to query stories")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map story rows")?;
        Ok(stories)
    }

    pub fn story_by_url(&self, url: &str) -> Result<Option<Story>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {STORY_COLUMNS} FROM stories WHERE url = ?1"))
            .context("failed to prepare story_by_url query")?;
        let mut rows = stmt
            .query_map(params![url], story_from_row)
            .context("failed to query story by url")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to read story row")?)),
            None => Ok(None),
        }
    }

    pub fn story_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))
            .context("failed to count stories")?;
        Ok(count as usize)
    }

    pub fn existing_urls(&self) -> Result<HashSet<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT url FROM stories")
            .context("failed to prepare url query")?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to query urls")?
            .collect::<std::result::Result<HashSet<_>, _>>()
            .context("failed to map url rows")?;
        Ok(urls)
    }

    /// Overwrite every field of a stored story except its id and URL.
    /// Returns `false` when no story has that id.
    pub fn update_story(&self, story: &Story) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE stories SET
                    title = ?2, author = ?3, date = ?4, social_abstract = ?5,
                    umbrella = ?6, geographic_area = ?7, neighborhoods = ?8
                 WHERE id = ?1",
                params![
                    story.id,
                    story.title,
                    story.author,
                    story.date,
                    story.social_abstract,
                    story.umbrella,
                    story.geographic_area,
                    encode_neighborhoods(&story.neighborhoods)?,
                ],
            )
            .with_context(|| format!("failed to update story {}", story.id))?;
        Ok(changed == 1)
    }

    /// Delete stories by id in one transaction. Returns how many were removed.
    pub fn delete_stories(&self, ids: &[i64]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin delete transaction")?;
        let mut removed = 0;
        for id in ids {
            removed += tx
                .execute("DELETE FROM stories WHERE id = ?1", params![id])
                .with_context(|| format!("failed to delete story {id}"))?;
        }
        tx.commit().context("failed to commit delete")?;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`, replacing any previous
    /// value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO app_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM app_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query app state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

fn encode_neighborhoods(neighborhoods: &Neighborhoods) -> Result<String> {
    serde_json::to_string(neighborhoods).context("failed to serialize neighborhoods")
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    let neighborhoods_json: String = row.get(8)?;
    // Rows written by older tooling may hold a bare delimited string.
    let neighborhoods = serde_json::from_str(&neighborhoods_json)
        .unwrap_or(Neighborhoods::Text(neighborhoods_json));
    Ok(Story {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        date: row.get(4)?,
        social_abstract: row.get(5)?,
        umbrella: row.get(6)?,
        geographic_area: row.get(7)?,
        neighborhoods,
    })
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use nfa_app::{
    HistoryDomain, HistoryEntry, HistoryEntryId, HistoryQuery, HistoryStatus, HistoryStore,
    NewHistoryEntry, NfaType, summarize_description,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

pub const APP_NAME: &str = "nfa-desk";
pub const DB_PATH_ENV: &str = "NFA_DESK_DB_PATH";

const REVISION_KEY: &str = "history_revision";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "history_entries",
        &[
            "id",
            "domain",
            "subject",
            "nfa_type",
            "status",
            "entry_date",
            "total_amount",
            "description",
            "file_ref",
            "full_text",
            "fallback",
            "extra",
            "content_sha256",
            "created_at",
            "updated_at",
        ],
    ),
    ("settings", &["key", "value", "updated_at"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_history_domain_date",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_history_domain_date ON history_entries (domain, entry_date);",
    },
    RequiredIndex {
        name: "idx_history_domain_sha",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_history_domain_sha ON history_entries (domain, content_sha256);",
    },
];

const SELECT_COLUMNS: &str = "
    SELECT
      id, domain, subject, nfa_type, status, entry_date, total_amount,
      description, file_ref, full_text, fallback, created_at, extra
    FROM history_entries
";

/// Keys the exported shape of each domain owns; anything else lands in `extra`.
const NFA_KEYS: &[&str] = &[
    "id",
    "subject",
    "type",
    "status",
    "date",
    "amount",
    "description",
    "filePath",
    "nfaText",
    "fallbackMode",
    "createdAt",
];
const JOB_KEYS: &[&str] = &[
    "id",
    "candidateName",
    "projectSummary",
    "filename",
    "content",
    "date",
    "status",
    "createdAt",
];
const MS_KEYS: &[&str] = &["id", "date", "content", "status", "createdAt"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }
        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    pub fn insert_entry(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry> {
        self.insert_with_extra(entry, &Map::new(), None)
    }

    pub fn get_entry(&self, id: HistoryEntryId) -> Result<HistoryEntry> {
        self.conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?"),
                params![id.get()],
                history_from_row,
            )
            .optional()
            .with_context(|| format!("load history entry {id}"))?
            .ok_or_else(|| anyhow!("history entry {id} not found -- refresh the list and retry"))
    }

    pub fn list_entries(&self, domain: HistoryDomain) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE domain = ? ORDER BY entry_date DESC, id DESC"
            ))
            .context("prepare history query")?;
        let rows = stmt
            .query_map(params![domain.as_str()], history_from_row)
            .context("query history")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect history")
    }

    /// Term matches subject or description (ASCII case-insensitive); with
    /// both filters a row matching either is returned.
    pub fn search_entries(
        &self,
        domain: HistoryDomain,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryEntry>> {
        if query.is_empty() {
            return self.list_entries(domain);
        }
        let pattern = query
            .term
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", escape_like(term)));
        let date = query.date.map(format_date);

        let mut stmt = self
            .conn
            .prepare(&format!(
                "{SELECT_COLUMNS}
                WHERE domain = ?1
                  AND (
                    (?2 IS NOT NULL AND (subject LIKE ?2 ESCAPE '\\' OR description LIKE ?2 ESCAPE '\\'))
                    OR (?3 IS NOT NULL AND entry_date = ?3)
                  )
                ORDER BY entry_date DESC, id DESC"
            ))
            .context("prepare history search")?;
        let rows = stmt
            .query_map(params![domain.as_str(), pattern, date], history_from_row)
            .context("search history")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect history search")
    }

    pub fn delete_entry(&self, id: HistoryEntryId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM history_entries WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete history entry {id}"))?;
        if rows_affected == 0 {
            bail!("history entry {id} not found -- refresh the list and retry");
        }
        self.bump_revision()?;
        debug!(%id, "history entry deleted");
        Ok(())
    }

    pub fn set_status(&self, id: HistoryEntryId, status: HistoryStatus) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE history_entries SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), now, id.get()],
            )
            .with_context(|| format!("update status of history entry {id}"))?;
        if rows_affected == 0 {
            bail!("history entry {id} not found -- refresh the list and retry");
        }
        self.bump_revision()?;
        Ok(())
    }

    pub fn current_revision(&self) -> Result<i64> {
        let raw = self.get_setting_raw(REVISION_KEY)?;
        match raw {
            None => Ok(0),
            Some(value) => value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("setting `{REVISION_KEY}` has invalid value `{value}`")),
        }
    }

    /// The array a browser would keep under the domain's storage key.
    pub fn export_json(&self, domain: HistoryDomain) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE domain = ? ORDER BY entry_date DESC, id DESC"
            ))
            .context("prepare history export")?;
        let rows = stmt
            .query_map(params![domain.as_str()], |row| {
                let entry = history_from_row(row)?;
                let extra: String = row.get(12)?;
                Ok((entry, extra))
            })
            .context("query history export")?;

        let mut items = Vec::new();
        for row in rows {
            let (entry, extra) = row.context("read history export row")?;
            let extra: Map<String, Value> = serde_json::from_str(&extra)
                .with_context(|| format!("decode extra fields of history entry {}", entry.id))?;
            items.push(export_object(&entry, extra)?);
        }
        serde_json::to_string_pretty(&Value::Array(items)).context("encode history export")
    }

    /// Loads a browser export; entries already present (same content) are skipped.
    pub fn import_json(&self, domain: HistoryDomain, json: &str) -> Result<ImportSummary> {
        let value: Value = serde_json::from_str(json)
            .context("parse history import -- expected a JSON array of entries")?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove(domain.storage_key()) {
                Some(Value::Array(items)) => items,
                _ => bail!(
                    "history import has no `{}` array -- export that history and retry",
                    domain.storage_key()
                ),
            },
            _ => bail!("history import must be a JSON array of entries"),
        };

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin history import")?;
        let mut summary = ImportSummary::default();
        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(object) = item else {
                bail!("history import item {} is not an object", index + 1);
            };
            let (entry, extra, created_at) = import_object(domain, object)
                .with_context(|| format!("history import item {}", index + 1))?;
            let digest = content_digest(&entry);
            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM history_entries WHERE domain = ? AND content_sha256 = ?)",
                    params![domain.as_str(), digest],
                    |row| row.get::<_, i64>(0),
                )
                .context("check for duplicate history entry")?
                == 1;
            if exists {
                summary.skipped += 1;
                continue;
            }
            self.insert_with_extra(&entry, &extra, created_at)?;
            summary.imported += 1;
        }
        tx.commit().context("commit history import")?;
        info!(
            domain = domain.as_str(),
            imported = summary.imported,
            skipped = summary.skipped,
            "history imported"
        );
        Ok(summary)
    }

    fn insert_with_extra(
        &self,
        entry: &NewHistoryEntry,
        extra: &Map<String, Value>,
        created_at: Option<OffsetDateTime>,
    ) -> Result<HistoryEntry> {
        let now = now_rfc3339()?;
        let created_at = match created_at {
            Some(value) => value.format(&Rfc3339).context("format created_at")?,
            None => now.clone(),
        };
        let extra = serde_json::to_string(extra).context("encode extra history fields")?;
        self.conn
            .execute(
                "
                INSERT INTO history_entries (
                  domain, subject, nfa_type, status, entry_date, total_amount,
                  description, file_ref, full_text, fallback, extra,
                  content_sha256, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    entry.domain.as_str(),
                    entry.subject,
                    entry.nfa_type.map(NfaType::as_str),
                    entry.status.as_str(),
                    format_date(entry.date),
                    entry.total_amount,
                    entry.description,
                    entry.file_ref,
                    entry.full_text,
                    entry.fallback,
                    extra,
                    content_digest(entry),
                    created_at,
                    now,
                ],
            )
            .context("insert history entry")?;
        let id = HistoryEntryId::new(self.conn.last_insert_rowid());
        self.bump_revision()?;
        self.get_entry(id)
    }

    fn bump_revision(&self) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, '1', ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = CAST(CAST(value AS INTEGER) + 1 AS TEXT),
                  updated_at = excluded.updated_at
                ",
                params![REVISION_KEY, now],
            )
            .context("bump history revision")?;
        Ok(())
    }

    fn get_setting_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read setting {key}"))
    }
}

impl HistoryStore for Store {
    fn append(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry> {
        self.insert_entry(entry)
    }

    fn list(&self, domain: HistoryDomain) -> Result<Vec<HistoryEntry>> {
        self.list_entries(domain)
    }

    fn search(&self, domain: HistoryDomain, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        self.search_entries(domain, query)
    }

    fn delete_by_id(&self, id: HistoryEntryId) -> Result<()> {
        self.delete_entry(id)
    }

    fn update_status(&self, id: HistoryEntryId, status: HistoryStatus) -> Result<()> {
        self.set_status(id, status)
    }

    fn revision(&self) -> Result<i64> {
        self.current_revision()
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os(DB_PATH_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set {DB_PATH_ENV} to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("nfa-desk.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let domain_raw: String = row.get(1)?;
    let domain = HistoryDomain::parse(&domain_raw)
        .ok_or_else(|| invalid_column(1, format!("unknown history domain {domain_raw}")))?;
    let nfa_type_raw: Option<String> = row.get(3)?;
    let nfa_type = match nfa_type_raw {
        Some(raw) => Some(
            NfaType::parse(&raw)
                .ok_or_else(|| invalid_column(3, format!("unknown NFA type {raw}")))?,
        ),
        None => None,
    };
    let status_raw: String = row.get(4)?;
    let status = HistoryStatus::parse(&status_raw)
        .ok_or_else(|| invalid_column(4, format!("unknown history status {status_raw}")))?;
    let date_raw: String = row.get(5)?;
    let created_at_raw: String = row.get(11)?;

    Ok(HistoryEntry {
        id: HistoryEntryId::new(row.get(0)?),
        domain,
        subject: row.get(2)?,
        nfa_type,
        status,
        date: parse_date(&date_raw).map_err(to_sql_error)?,
        total_amount: row.get(6)?,
        description: row.get(7)?,
        file_ref: row.get(8)?,
        full_text: row.get(9)?,
        fallback: row.get(10)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
    })
}

fn export_object(entry: &HistoryEntry, extra: Map<String, Value>) -> Result<Value> {
    let mut object = Map::new();
    object.insert("id".to_owned(), Value::from(entry.id.get()));
    let created_at = entry
        .created_at
        .format(&Rfc3339)
        .context("format created_at")?;
    match entry.domain {
        HistoryDomain::Nfa => {
            let Value::Object(fields) =
                serde_json::to_value(entry).context("encode history entry")?
            else {
                bail!("history entry {} did not encode as an object", entry.id);
            };
            object.extend(fields);
            object.remove("domain");
        }
        HistoryDomain::JobRecommendation => {
            object.insert("candidateName".to_owned(), Value::from(entry.subject.clone()));
            object.insert(
                "projectSummary".to_owned(),
                Value::from(entry.description.clone()),
            );
            object.insert("filename".to_owned(), Value::from(entry.file_ref.clone()));
            object.insert("content".to_owned(), Value::from(entry.full_text.clone()));
            object.insert("date".to_owned(), Value::from(format_date(entry.date)));
            object.insert("status".to_owned(), Value::from(entry.status.as_str()));
            object.insert("createdAt".to_owned(), Value::from(created_at));
        }
        HistoryDomain::MsRecommendation => {
            object.insert("date".to_owned(), Value::from(format_date(entry.date)));
            object.insert("content".to_owned(), Value::from(entry.full_text.clone()));
            object.insert("status".to_owned(), Value::from(entry.status.as_str()));
            object.insert("createdAt".to_owned(), Value::from(created_at));
        }
    }
    for (key, value) in extra {
        object.entry(key).or_insert(value);
    }
    Ok(Value::Object(object))
}

fn import_object(
    domain: HistoryDomain,
    mut object: Map<String, Value>,
) -> Result<(NewHistoryEntry, Map<String, Value>, Option<OffsetDateTime>)> {
    let date = match text_field(&object, "date") {
        Some(raw) => parse_date(&raw)?,
        None => OffsetDateTime::now_utc().date(),
    };
    let created_at = text_field(&object, "createdAt")
        .map(|raw| parse_datetime(&raw))
        .transpose()?;
    let status = match text_field(&object, "status") {
        Some(raw) => HistoryStatus::parse(&raw)
            .ok_or_else(|| anyhow!("unknown status {raw:?} -- expected pending, approved, rejected or completed"))?,
        None => domain.default_status(),
    };

    let entry = match domain {
        HistoryDomain::Nfa => {
            let nfa_type = match text_field(&object, "type") {
                Some(raw) => Some(
                    NfaType::parse(&raw)
                        .ok_or_else(|| anyhow!("unknown NFA type {raw:?} -- expected reimbursement or advance"))?,
                ),
                None => Some(NfaType::default()),
            };
            NewHistoryEntry {
                domain,
                subject: text_field(&object, "subject").unwrap_or_default(),
                nfa_type,
                status,
                date,
                total_amount: text_field(&object, "amount").unwrap_or_else(|| "₹0".to_owned()),
                description: text_field(&object, "description").unwrap_or_default(),
                file_ref: text_field(&object, "filePath"),
                full_text: text_field(&object, "nfaText"),
                fallback: object
                    .get("fallbackMode")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }
        }
        HistoryDomain::JobRecommendation => NewHistoryEntry {
            domain,
            subject: text_field(&object, "candidateName").unwrap_or_default(),
            nfa_type: None,
            status,
            date,
            total_amount: String::new(),
            description: summarize_description(
                &text_field(&object, "projectSummary").unwrap_or_default(),
            ),
            file_ref: text_field(&object, "filename"),
            full_text: text_field(&object, "content"),
            fallback: false,
        },
        HistoryDomain::MsRecommendation => {
            let content = text_field(&object, "content");
            NewHistoryEntry {
                domain,
                subject: content
                    .as_deref()
                    .and_then(|text| text.lines().map(str::trim).find(|line| !line.is_empty()))
                    .map(|line| line.chars().take(80).collect())
                    .unwrap_or_default(),
                nfa_type: None,
                status,
                date,
                total_amount: String::new(),
                description: String::new(),
                file_ref: None,
                full_text: content,
                fallback: false,
            }
        }
    };

    let owned: BTreeSet<&str> = match domain {
        HistoryDomain::Nfa => NFA_KEYS,
        HistoryDomain::JobRecommendation => JOB_KEYS,
        HistoryDomain::MsRecommendation => MS_KEYS,
    }
    .iter()
    .copied()
    .collect();
    let original_id = object.remove("id");
    object.retain(|key, _| !owned.contains(key.as_str()));
    if let Some(id) = original_id {
        object.insert("importedId".to_owned(), id);
    }
    Ok((entry, object, created_at))
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(value) if !value.trim().is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn content_digest(entry: &NewHistoryEntry) -> String {
    let mut hasher = Sha256::new();
    for part in [
        entry.domain.as_str(),
        entry.subject.as_str(),
        &format_date(entry.date),
        entry.description.as_str(),
        entry.file_ref.as_deref().unwrap_or_default(),
        entry.full_text.as_deref().unwrap_or_default(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use an nfa-desk database or remove the file to start fresh"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; export the history and recreate the database",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Ok(value);
    }

    // browser exports sometimes carry a full ISO timestamp
    let date_time = parse_datetime(raw)?;
    Ok(date_time.date())
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    invalid_column(0, error.to_string())
}

fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

//! SQL schema for the Casebook SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS cases (
    case_id      TEXT PRIMARY KEY,
    lineage_id   TEXT NOT NULL,   -- case_id of the lineage root
    parent_id    TEXT REFERENCES cases(case_id),
    status       TEXT NOT NULL,   -- 'draft' | 'ready' | 'released' | 'closed'
    released_at  TEXT,            -- ISO 8601 UTC
    released_by  TEXT,
    content_json TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    CHECK (status IN ('draft', 'ready', 'released', 'closed')),
    CHECK ((status IN ('released', 'closed'))
           = (released_at IS NOT NULL AND released_by IS NOT NULL)),
    CHECK ((released_at IS NULL) = (released_by IS NULL))
);

CREATE INDEX IF NOT EXISTS cases_lineage_idx ON cases(lineage_id);
CREATE INDEX IF NOT EXISTS cases_parent_idx  ON cases(parent_id);

-- A record is released at most once.
CREATE UNIQUE INDEX IF NOT EXISTS cases_one_snapshot_per_parent
    ON cases(parent_id) WHERE status IN ('released', 'closed');

-- Snapshots never change, except released -> closed.
CREATE TRIGGER IF NOT EXISTS cases_snapshot_immutable
BEFORE UPDATE ON cases
WHEN OLD.status IN ('released', 'closed')
 AND NOT (OLD.status = 'released'
          AND NEW.status = 'closed'
          AND NEW.content_json = OLD.content_json
          AND NEW.released_at IS OLD.released_at
          AND NEW.released_by IS OLD.released_by
          AND NEW.parent_id IS OLD.parent_id
          AND NEW.lineage_id = OLD.lineage_id)
BEGIN
    SELECT RAISE(ABORT, 'released and closed cases are immutable');
END;

CREATE TRIGGER IF NOT EXISTS cases_snapshot_undeletable
BEFORE DELETE ON cases
WHEN OLD.status IN ('released', 'closed')
BEGIN
    SELECT RAISE(ABORT, 'released and closed cases cannot be deleted');
END;

-- Reviewer assignment events, keyed by lineage.
CREATE TABLE IF NOT EXISTS assignment_epochs (
    epoch_id       TEXT PRIMARY KEY,
    case_id        TEXT NOT NULL,
    reviewer_id    TEXT NOT NULL,
    state          TEXT NOT NULL DEFAULT 'pending',
    opened_at      TEXT NOT NULL,
    decided_at     TEXT,
    decline_reason TEXT,
    decline_text   TEXT,
    CHECK (state IN ('pending', 'accepted', 'declined'))
);

CREATE INDEX IF NOT EXISTS epochs_case_reviewer_idx
    ON assignment_epochs(case_id, reviewer_id);

-- Each user's active case.
CREATE TABLE IF NOT EXISTS active_cases (
    user_id    TEXT PRIMARY KEY,
    case_id    TEXT NOT NULL REFERENCES cases(case_id),
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS follow_ups (
    follow_up_id TEXT PRIMARY KEY,
    lineage_id   TEXT NOT NULL,
    snapshot_id  TEXT NOT NULL REFERENCES cases(case_id),
    due_at       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS follow_ups_due_idx ON follow_ups(due_at);

PRAGMA user_version = 1;
";

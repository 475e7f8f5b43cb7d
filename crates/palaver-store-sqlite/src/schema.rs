//! SQL schema for the Palaver SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,   -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- Bearer-token sessions; only the SHA-256 digest of the token is stored.
CREATE TABLE IF NOT EXISTS auth_sessions (
    token_hash TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    conversation_id TEXT PRIMARY KEY,
    user_id         TEXT REFERENCES users(user_id) ON DELETE CASCADE,
    title           TEXT NOT NULL,
    message_count   INTEGER NOT NULL DEFAULT 0 CHECK (message_count >= 0),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Messages are append-only; rows are only ever inserted or deleted.
CREATE TABLE IF NOT EXISTS messages (
    message_id      TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id) ON DELETE CASCADE,
    role            TEXT NOT NULL,   -- 'user' | 'assistant' | 'system'
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL    -- fixed-precision RFC 3339 UTC
);

CREATE INDEX IF NOT EXISTS messages_keyset_idx
    ON messages(conversation_id, created_at, message_id);
CREATE INDEX IF NOT EXISTS conversations_user_idx
    ON conversations(user_id, updated_at);

-- Denormalised counters on the owning conversation.
CREATE TRIGGER IF NOT EXISTS messages_after_insert AFTER INSERT ON messages
BEGIN
    UPDATE conversations
       SET message_count = message_count + 1,
           updated_at    = NEW.created_at
     WHERE conversation_id = NEW.conversation_id;
END;

CREATE TRIGGER IF NOT EXISTS messages_after_delete AFTER DELETE ON messages
BEGIN
    UPDATE conversations
       SET message_count = message_count - 1
     WHERE conversation_id = OLD.conversation_id;
END;

PRAGMA user_version = 1;
";

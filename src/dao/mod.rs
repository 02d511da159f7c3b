/// Embedded table engines (SQLite and in-memory).
pub mod engine;
/// Game records stored in the `games` table.
pub mod game;
/// Persisted entity definitions.
pub mod models;
/// Untyped records and key handling.
pub mod record;
/// Storage error types shared by every layer.
pub mod storage;

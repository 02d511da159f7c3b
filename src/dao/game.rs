use tracing::debug;

use crate::{
    dao::{
        models::{GameEntity, GamePatch, NewGameEntity},
        record::{RecordId, decode_record, encode_record},
        storage::StorageResult,
    },
    store::SharedStore,
};

/// Table holding the game records.
pub const GAMES_TABLE: &str = "games";

/// Data Access Object mapping game entities onto the `games` table.
#[derive(Clone)]
pub struct GameRepository {
    store: SharedStore,
}

impl GameRepository {
    /// Build a repository over `store`.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Insert a fresh game and return it with its assigned key.
    pub async fn insert(&self, game: NewGameEntity) -> StorageResult<GameEntity> {
        let record = encode_record(GAMES_TABLE, &game)?;
        let id = self.store.put(GAMES_TABLE, record).await?;
        debug!(%id, name = %game.name, "game inserted");
        Ok(game.with_id(id))
    }

    /// Fetch a game by id.
    pub async fn find(&self, id: RecordId) -> StorageResult<Option<GameEntity>> {
        self.store
            .get_one(GAMES_TABLE, id)
            .await?
            .map(|record| decode_record(GAMES_TABLE, record))
            .transpose()
    }

    /// Fetch every game in key order.
    pub async fn list(&self) -> StorageResult<Vec<GameEntity>> {
        self.store
            .get_all(GAMES_TABLE)
            .await?
            .into_iter()
            .map(|record| decode_record(GAMES_TABLE, record))
            .collect()
    }

    /// Replace the stored game with the provided payload.
    pub async fn save(&self, game: &GameEntity) -> StorageResult<RecordId> {
        let record = encode_record(GAMES_TABLE, game)?;
        self.store.put(GAMES_TABLE, record).await
    }

    /// Write several games at once and return the whole table afterwards.
    pub async fn save_all(&self, games: &[GameEntity]) -> StorageResult<Vec<GameEntity>> {
        let records = games
            .iter()
            .map(|game| encode_record(GAMES_TABLE, game))
            .collect::<StorageResult<Vec<_>>>()?;

        self.store
            .put_bulk(GAMES_TABLE, records)
            .await?
            .into_iter()
            .map(|record| decode_record(GAMES_TABLE, record))
            .collect()
    }

    /// Merge `patch` into the stored game and return the written version.
    pub async fn patch(&self, id: RecordId, patch: &GamePatch) -> StorageResult<GameEntity> {
        let partial = encode_record(GAMES_TABLE, patch)?;
        let record = self.store.update(GAMES_TABLE, id, partial).await?;
        decode_record(GAMES_TABLE, record)
    }

    /// Remove a game; absent ids are not an error.
    pub async fn delete(&self, id: RecordId) -> StorageResult<RecordId> {
        self.store.delete_one(GAMES_TABLE, id).await
    }

    /// Remove every game.
    pub async fn clear(&self) -> StorageResult<()> {
        self.store.delete_all(GAMES_TABLE).await
    }
}

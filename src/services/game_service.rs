use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info};
use validator::Validate;

use crate::{
    dao::{
        game::GameRepository,
        models::{GameEntity, GamePatch, NewGameEntity},
        record::RecordId,
    },
    dto::game::{CreateGameRequest, GameSummary, UpdateGameRequest},
    error::ServiceError,
    store::SharedStore,
};

/// Number of games the home screen lists.
pub const DEFAULT_RECENT_GAMES: usize = 5;

/// Validate and store a fresh game.
pub async fn create_game(
    store: &SharedStore,
    request: CreateGameRequest,
) -> Result<GameSummary, ServiceError> {
    request.validate()?;

    let CreateGameRequest {
        name,
        description,
        questions,
    } = request;

    let game = NewGameEntity {
        name: name.trim().to_string(),
        description: description.unwrap_or_default(),
        created_at: OffsetDateTime::now_utc(),
        last_played: None,
        questions: (!questions.is_empty())
            .then(|| questions.into_iter().map(Into::into).collect()),
    };

    let game = repository(store).insert(game).await?;
    info!(id = %game.id, name = %game.name, "game created");
    Ok(game.into())
}

/// Every game, most recently created first.
pub async fn list_games(store: &SharedStore) -> Result<Vec<GameSummary>, ServiceError> {
    let mut games = repository(store).list().await?;
    sort_newest_first(&mut games);
    Ok(games.into_iter().map(Into::into).collect())
}

/// The `limit` most recently created games.
pub async fn recent_games(
    store: &SharedStore,
    limit: usize,
) -> Result<Vec<GameSummary>, ServiceError> {
    let mut games = repository(store).list().await?;
    sort_newest_first(&mut games);
    Ok(games.into_iter().take(limit).map(Into::into).collect())
}

/// Fetch one game, `NotFound` when absent.
pub async fn get_game(store: &SharedStore, id: RecordId) -> Result<GameSummary, ServiceError> {
    Ok(find_existing(&repository(store), id).await?.into())
}

/// Apply the supplied fields of `request` to an existing game.
pub async fn edit_game(
    store: &SharedStore,
    id: RecordId,
    request: UpdateGameRequest,
) -> Result<GameSummary, ServiceError> {
    request.validate()?;

    let repository = repository(store);
    let existing = find_existing(&repository, id).await?;

    let patch = request.into_patch();
    if patch.is_empty() {
        debug!(%id, "empty game edit; nothing to write");
        return Ok(existing.into());
    }

    let game = repository.patch(id, &patch).await?;
    info!(%id, "game edited");
    Ok(game.into())
}

/// Stamp `lastPlayed` with the current time.
pub async fn mark_played(store: &SharedStore, id: RecordId) -> Result<GameSummary, ServiceError> {
    let repository = repository(store);
    find_existing(&repository, id).await?;

    let patch = GamePatch {
        last_played: Some(OffsetDateTime::now_utc()),
        ..GamePatch::default()
    };
    let game = repository.patch(id, &patch).await?;
    debug!(%id, "game marked as played");
    Ok(game.into())
}

/// Remove a game; resolves once the store acknowledged the deletion.
pub async fn delete_game(store: &SharedStore, id: RecordId) -> Result<RecordId, ServiceError> {
    let repository = repository(store);
    find_existing(&repository, id).await?;

    let id = repository.delete(id).await?;
    info!(%id, "game deleted");
    Ok(id)
}

fn repository(store: &SharedStore) -> GameRepository {
    GameRepository::new(Arc::clone(store))
}

async fn find_existing(
    repository: &GameRepository,
    id: RecordId,
) -> Result<GameEntity, ServiceError> {
    repository
        .find(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}` not found")))
}

fn sort_newest_first(games: &mut [GameEntity]) {
    games.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

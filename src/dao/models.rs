use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::dao::record::RecordId;

/// Game record as persisted in the `games` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameEntity {
    /// Key assigned by the store on first insert.
    pub id: RecordId,
    /// Display name of the game.
    pub name: String,
    /// Free-form description, empty when none was given.
    #[serde(default)]
    pub description: String,
    /// Creation timestamp, never changed after insert.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last time the game was played, `None` until then.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_played: Option<OffsetDateTime>,
    /// Questions attached to the game.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionEntity>>,
}

/// Question/answer pair attached to a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question text.
    pub question: String,
    /// Expected answer.
    pub answer: String,
}

/// Game that has not been stored yet, hence has no `id`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewGameEntity {
    /// Display name of the game.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Always `None` for a fresh game; serialized as `null`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_played: Option<OffsetDateTime>,
    /// Questions attached to the game.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionEntity>>,
}

impl NewGameEntity {
    /// Attach the key the store assigned.
    pub fn with_id(self, id: RecordId) -> GameEntity {
        GameEntity {
            id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            last_played: self.last_played,
            questions: self.questions,
        }
    }
}

/// Partial game update; only `Some` members are written.
///
/// Has no `id` or `created_at` member: neither changes after insert.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GamePatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New last-played timestamp.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_played: Option<OffsetDateTime>,
    /// Replacement question list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionEntity>>,
}

impl GamePatch {
    /// Whether the patch would change anything.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.last_played.is_none()
            && self.questions.is_none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn new_game_serializes_with_camel_case_and_null_last_played() {
        let game = NewGameEntity {
            name: "Heist".into(),
            description: "A vault heist".into(),
            created_at: datetime!(2024-05-01 10:00:00 UTC),
            last_played: None,
            questions: None,
        };

        assert_eq!(
            serde_json::to_value(&game).unwrap(),
            json!({
                "name": "Heist",
                "description": "A vault heist",
                "createdAt": "2024-05-01T10:00:00Z",
                "lastPlayed": null,
            })
        );
    }

    #[test]
    fn stored_game_without_optional_members_decodes() {
        let game: GameEntity = serde_json::from_value(json!({
            "id": 4,
            "name": "Heist",
            "createdAt": "2024-05-01T10:00:00Z",
        }))
        .unwrap();

        assert_eq!(game.id, RecordId::new(4));
        assert_eq!(game.description, "");
        assert_eq!(game.last_played, None);
        assert_eq!(game.questions, None);
    }

    #[test]
    fn patch_only_serializes_supplied_members() {
        let patch = GamePatch {
            description: Some("new".into()),
            ..GamePatch::default()
        };

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"description": "new"})
        );
        assert!(!patch.is_empty());
        assert!(GamePatch::default().is_empty());
    }
}

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::{
    dao::{
        models::{GameEntity, GamePatch, QuestionEntity},
        record::RecordId,
    },
    dto::{
        format_timestamp,
        validation::{validate_game_name, validate_not_blank},
    },
};

/// Payload used to create a brand-new game.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGameRequest {
    /// Display name, trimmed before storage.
    pub name: String,
    /// Defaults to an empty description.
    #[serde(default)]
    pub description: Option<String>,
    /// Questions attached to the game, possibly none.
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

impl Validate for CreateGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_game_name(&self.name) {
            errors.add("name", e);
        }

        if let Err(question_errors) = validate_questions(&self.questions) {
            errors.merge_self("questions", Err(question_errors));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Question/answer pair supplied with a game.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    /// Question text; must not be blank.
    pub question: String,
    /// Expected answer, empty when omitted.
    #[serde(default)]
    pub answer: String,
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_not_blank(&self.question) {
            errors.add("question", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<QuestionInput> for QuestionEntity {
    fn from(value: QuestionInput) -> Self {
        Self {
            question: value.question.trim().to_string(),
            answer: value.answer,
        }
    }
}

/// Partial update of an existing game.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGameRequest {
    /// If not specified, keeps the current name.
    #[serde(default)]
    pub name: Option<String>,
    /// If not specified, keeps the current description.
    #[serde(default)]
    pub description: Option<String>,
    /// If specified, replaces the whole question list.
    #[serde(default)]
    pub questions: Option<Vec<QuestionInput>>,
}

impl Validate for UpdateGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref name) = self.name {
            if let Err(e) = validate_game_name(name) {
                errors.add("name", e);
            }
        }

        if let Some(ref questions) = self.questions {
            if let Err(question_errors) = validate_questions(questions) {
                errors.merge_self("questions", Err(question_errors));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl UpdateGameRequest {
    /// Convert the request into the patch written to storage.
    pub fn into_patch(self) -> GamePatch {
        GamePatch {
            name: self.name.map(|name| name.trim().to_string()),
            description: self.description,
            last_played: None,
            questions: self
                .questions
                .map(|questions| questions.into_iter().map(Into::into).collect()),
        }
    }
}

/// First failing question, if any.
fn validate_questions(questions: &[QuestionInput]) -> Result<(), ValidationErrors> {
    questions.iter().try_for_each(|question| question.validate())
}

/// Game as exposed to callers, timestamps rendered as RFC 3339.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    /// Key assigned by the store.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last time the game was played (RFC 3339), `null` until then.
    pub last_played: Option<String>,
    /// Attached questions, empty when none.
    pub questions: Vec<QuestionSummary>,
}

/// Question/answer pair exposed to callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuestionSummary {
    /// Question text.
    pub question: String,
    /// Expected answer.
    pub answer: String,
}

impl From<GameEntity> for GameSummary {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            created_at: format_timestamp(value.created_at),
            last_played: value.last_played.map(format_timestamp),
            questions: value
                .questions
                .unwrap_or_default()
                .into_iter()
                .map(|question| QuestionSummary {
                    question: question.question,
                    answer: question.answer,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn question(text: &str) -> QuestionInput {
        QuestionInput {
            question: text.into(),
            answer: "42".into(),
        }
    }

    #[test]
    fn create_request_rejects_short_name_and_blank_question() {
        let request = CreateGameRequest {
            name: " ab ".into(),
            description: None,
            questions: vec![question("Who?"), question("   ")],
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("questions"));
    }

    #[test]
    fn create_request_accepts_minimal_payload() {
        let request: CreateGameRequest = serde_json::from_str(r#"{"name": "Heist"}"#).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.description.is_none());
        assert!(request.questions.is_empty());
    }

    #[test]
    fn update_request_only_validates_supplied_fields() {
        assert!(UpdateGameRequest::default().validate().is_ok());

        let request = UpdateGameRequest {
            name: Some("x".into()),
            ..UpdateGameRequest::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn update_request_patch_trims_name() {
        let patch = UpdateGameRequest {
            name: Some("  Heist  ".into()),
            questions: Some(vec![question(" Who? ")]),
            ..UpdateGameRequest::default()
        }
        .into_patch();

        assert_eq!(patch.name.as_deref(), Some("Heist"));
        assert_eq!(patch.description, None);
        assert_eq!(
            patch.questions,
            Some(vec![QuestionEntity {
                question: "Who?".into(),
                answer: "42".into(),
            }])
        );
    }

    #[test]
    fn summary_formats_timestamps() {
        let summary = GameSummary::from(GameEntity {
            id: RecordId::new(3),
            name: "Heist".into(),
            description: String::new(),
            created_at: datetime!(2024-05-01 10:00:00 UTC),
            last_played: Some(datetime!(2024-05-02 20:30:00 UTC)),
            questions: None,
        });

        assert_eq!(summary.created_at, "2024-05-01T10:00:00Z");
        assert_eq!(summary.last_played.as_deref(), Some("2024-05-02T20:30:00Z"));
        assert!(summary.questions.is_empty());
    }
}

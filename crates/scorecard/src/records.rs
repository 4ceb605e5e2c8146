use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared kind of a survey question. Wire spellings follow the form
/// builder's vocabulary (`multiple-choice`, `textarea`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    Rating,
    Scale,
    MultipleChoice,
    Checkbox,
    Text,
    #[serde(rename = "textarea")]
    TextArea,
    Number,
    Other,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Rating => "rating",
            QuestionKind::Scale => "scale",
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::Checkbox => "checkbox",
            QuestionKind::Text => "text",
            QuestionKind::TextArea => "textarea",
            QuestionKind::Number => "number",
            QuestionKind::Other => "other",
        }
    }

    /// Free-text kinds route through sentiment instead of the numeric rules.
    pub fn is_text(&self) -> bool {
        matches!(self, QuestionKind::Text | QuestionKind::TextArea)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Question schema record, owned by the form definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Ordered option labels for `multiple-choice` questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Declared upper bound for `rating`/`scale` questions. When absent the
    /// normalizer assumes 1-5, or 1-10 once a value exceeds 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<f64>,
}

impl Question {
    pub fn new(id: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            options: None,
            max_scale: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_scale(mut self, max_scale: f64) -> Self {
        self.max_scale = Some(max_scale);
        self
    }
}

/// Raw answer payload. Persisted records carry a number, a string, or a list
/// of selected labels depending on the question kind; `Missing` covers
/// explicit nulls and absent values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
    Selections(Vec<String>),
    #[default]
    Missing,
}

impl AnswerValue {
    /// Numeric view of the value. Strings holding a bare number are accepted
    /// because some form clients submit ratings as text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            AnswerValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_selections(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Selections(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    #[serde(default)]
    pub value: AnswerValue,
}

impl Answer {
    pub fn new(question_id: impl Into<String>, value: AnswerValue) -> Self {
        Self {
            question_id: question_id.into(),
            value,
        }
    }
}

/// One submitted survey response, read-only to the scoring core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub form_id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_question_kind_wire_spellings() {
        let parsed: QuestionKind = serde_json::from_str("\"multiple-choice\"").unwrap();
        assert_eq!(parsed, QuestionKind::MultipleChoice);

        let parsed: QuestionKind = serde_json::from_str("\"textarea\"").unwrap();
        assert_eq!(parsed, QuestionKind::TextArea);

        assert_eq!(
            serde_json::to_string(&QuestionKind::MultipleChoice).unwrap(),
            "\"multiple-choice\""
        );
        assert_eq!(QuestionKind::TextArea.to_string(), "textarea");
    }

    #[test]
    fn test_response_deserializes_mixed_answer_values() {
        let raw = r#"{
            "id": "resp-1",
            "formId": "form-7",
            "submittedAt": "2024-03-01T10:15:00Z",
            "answers": [
                { "questionId": "q1", "value": 4 },
                { "questionId": "q2", "value": "Very clear explanations" },
                { "questionId": "q3", "value": ["Helpful", "Organized"] },
                { "questionId": "q4", "value": null },
                { "questionId": "q5" }
            ]
        }"#;

        let response: Response = serde_json::from_str(raw).unwrap();
        assert_eq!(response.form_id, "form-7");
        assert_eq!(response.answers.len(), 5);
        assert_eq!(response.answers[0].value, AnswerValue::Number(4.0));
        assert_eq!(
            response.answers[1].value,
            AnswerValue::Text("Very clear explanations".to_string())
        );
        assert_eq!(
            response.answers[2].value,
            AnswerValue::Selections(vec!["Helpful".to_string(), "Organized".to_string()])
        );
        assert_eq!(response.answers[3].value, AnswerValue::Missing);
        assert_eq!(response.answers[4].value, AnswerValue::Missing);
    }

    #[test]
    fn test_answer_value_numeric_views() {
        assert_eq!(AnswerValue::Number(3.5).as_number(), Some(3.5));
        assert_eq!(AnswerValue::Text(" 4 ".to_string()).as_number(), Some(4.0));
        assert_eq!(AnswerValue::Text("great".to_string()).as_number(), None);
        assert_eq!(AnswerValue::Missing.as_number(), None);
        assert_eq!(
            AnswerValue::Selections(vec!["3".to_string()]).as_number(),
            None
        );
    }

    #[test]
    fn test_question_builder_helpers() {
        let question = Question::new("q9", QuestionKind::Scale).with_max_scale(10.0);
        assert_eq!(question.max_scale, Some(10.0));
        assert!(question.options.is_none());

        let question = Question::new("q2", QuestionKind::MultipleChoice)
            .with_options(vec!["Poor".to_string(), "Good".to_string()]);
        assert_eq!(question.options.as_deref().map(|o| o.len()), Some(2));
    }
}

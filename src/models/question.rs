// src/models/question.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{error::AppError, utils::html::clean_html};

/// Every question has exactly this many options, in every language variant.
pub const OPTION_COUNT: usize = 4;

/// Canonical answer key. Independent of the display language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionKey {
    A,
    B,
    C,
    D,
}

impl OptionKey {
    pub const ALL: [OptionKey; OPTION_COUNT] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

    pub fn index(self) -> usize {
        match self {
            OptionKey::A => 0,
            OptionKey::B => 1,
            OptionKey::C => 2,
            OptionKey::D => 3,
        }
    }
}

impl FromStr for OptionKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OptionKey::A),
            "B" => Ok(OptionKey::B),
            "C" => Ok(OptionKey::C),
            "D" => Ok(OptionKey::D),
            other => Err(AppError::BadRequest(format!("Invalid answer key '{}'", other))),
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Display language of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
}

/// Text that is either a legacy single-language string or a bilingual pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Legacy(String),
    Bilingual {
        english: String,
        #[serde(default)]
        hindi: String,
    },
}

impl LocalizedText {
    /// Resolves the text for a language. Legacy content is shown as-is in every language.
    pub fn get(&self, language: Language) -> &str {
        match self {
            LocalizedText::Legacy(text) => text.as_str(),
            LocalizedText::Bilingual { english, hindi } => match language {
                Language::English => english.as_str(),
                Language::Hindi if hindi.is_empty() => english.as_str(),
                Language::Hindi => hindi.as_str(),
            },
        }
    }

    fn map(self, f: impl Fn(String) -> String) -> Self {
        match self {
            LocalizedText::Legacy(text) => LocalizedText::Legacy(f(text)),
            LocalizedText::Bilingual { english, hindi } => LocalizedText::Bilingual {
                english: f(english),
                hindi: f(hindi),
            },
        }
    }
}

/// Option lists, same shape rules as [`LocalizedText`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedOptions {
    Legacy(Vec<String>),
    Bilingual {
        english: Vec<String>,
        #[serde(default)]
        hindi: Vec<String>,
    },
}

impl LocalizedOptions {
    pub fn get(&self, language: Language) -> &[String] {
        match self {
            LocalizedOptions::Legacy(options) => options.as_slice(),
            LocalizedOptions::Bilingual { english, hindi } => match language {
                Language::Hindi if !hindi.is_empty() => hindi.as_slice(),
                _ => english.as_slice(),
            },
        }
    }

    fn check_lengths(&self) -> Result<(), AppError> {
        let lists: Vec<&Vec<String>> = match self {
            LocalizedOptions::Legacy(options) => vec![options],
            LocalizedOptions::Bilingual { english, hindi } if hindi.is_empty() => vec![english],
            LocalizedOptions::Bilingual { english, hindi } => vec![english, hindi],
        };

        for list in lists {
            if list.len() != OPTION_COUNT {
                return Err(AppError::BadRequest(format!(
                    "Question must have exactly {} options, found {}",
                    OPTION_COUNT,
                    list.len()
                )));
            }
        }
        Ok(())
    }
}

/// A question as it is stored in the document store.
/// Both legacy and bilingual shapes are accepted; see [`RawQuestion::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    pub question: LocalizedText,
    pub options: LocalizedOptions,
    /// Correct option letter, e.g. "A". Case and surrounding whitespace are ignored.
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<LocalizedText>,
}

impl RawQuestion {
    /// Resolves the stored shape into a [`Question`] once, at load time.
    pub fn normalize(self) -> Result<Question, AppError> {
        self.options.check_lengths()?;
        let correct_answer = self.correct_answer.parse::<OptionKey>()?;

        let explanation = self
            .explanation
            .map(|text| text.map(|html| clean_html(&html)))
            .filter(|text| !text.get(Language::English).trim().is_empty());

        Ok(Question {
            text: self.question,
            options: self.options,
            correct_answer,
            explanation,
        })
    }
}

/// Normalized question used by the session, scoring and review code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: LocalizedText,
    pub options: LocalizedOptions,
    pub correct_answer: OptionKey,
    /// Sanitised HTML.
    pub explanation: Option<LocalizedText>,
}

impl Question {
    pub fn is_correct(&self, key: OptionKey) -> bool {
        self.correct_answer == key
    }
}

/// DTO for sending a question to the client.
/// `correct_answer` and `explanation` are only filled in during solution review.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub text: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<OptionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuestionView {
    pub fn public(index: usize, question: &Question, language: Language) -> Self {
        Self {
            index,
            text: question.text.get(language).to_string(),
            options: question.options.get(language).to_vec(),
            correct_answer: None,
            explanation: None,
        }
    }

    pub fn with_solution(index: usize, question: &Question, language: Language) -> Self {
        Self {
            correct_answer: Some(question.correct_answer),
            explanation: question
                .explanation
                .as_ref()
                .map(|text| text.get(language).to_string()),
            ..Self::public(index, question, language)
        }
    }
}

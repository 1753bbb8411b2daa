//! Natural-language-to-SQL translation.
//!
//! [`QueryTranslator`] builds a prompt from a schema and column statistics,
//! invokes the text-generation collaborator once, extracts a SQL candidate
//! from the untrusted response, and validates it. It never returns an
//! unvalidated string: the caller gets validated SQL or an error.
//!
//! Re-prompting the generator after a rejection is deliberately not done
//! here; that policy belongs to a calling orchestrator.

use nlq_schema::{ColumnStatistic, Schema};
use nlq_sql::{extract_sql, validate_sql, Extraction, ValidationError};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

pub mod generator;
mod prompt;

pub use generator::{Generation, GenerationError, GenerationOptions, OpenAiGenerator, TextGenerator};
pub use prompt::build_prompt;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("no SQL candidate in generated response: {response}")]
    NoCandidate { response: String },

    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

/// Per-call translation options. `None` fields take the defaults:
/// temperature 0.0 for determinism, model [`DEFAULT_MODEL`].
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl TranslateOptions {
    fn generation(&self) -> GenerationOptions {
        GenerationOptions {
            model: self
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(0.0),
            max_tokens: self.max_tokens,
        }
    }
}

pub struct QueryTranslator<G> {
    generator: G,
}

impl<G: TextGenerator> QueryTranslator<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Translate a question into validated SQL against `table`.
    pub async fn translate(
        &self,
        question: &str,
        schema: &Schema,
        statistics: &BTreeMap<String, ColumnStatistic>,
        table: &str,
        options: &TranslateOptions,
    ) -> Result<String, TranslateError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TranslateError::EmptyQuestion);
        }

        let prompt = prompt::build_prompt(question, schema, statistics, table);
        debug!(table, question, "translating question");

        let generation = self
            .generator
            .generate(&prompt, &options.generation())
            .await?;
        debug!(response = %generation.content, "generator response");

        match extract_sql(&generation.content) {
            Extraction::Sql(sql) => {
                validate_sql(&sql, table)?;
                info!(table, sql = %sql, "translation accepted");
                Ok(sql)
            }
            Extraction::NoCandidate => Err(TranslateError::NoCandidate {
                response: generation.content,
            }),
        }
    }
}

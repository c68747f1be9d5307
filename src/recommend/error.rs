use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::preferences::YearRange;

/// Lo que se intentó en una generación fallida, para sugerir otra entrada al usuario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttemptContext {
    pub genre_seeds: Vec<String>,
    pub year_range: Option<YearRange>,
    pub keywords: Vec<String>,
}

impl fmt::Display for AttemptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "genres [{}]", self.genre_seeds.join(", "))?;
        if let Some(range) = self.year_range {
            write!(f, ", years {}-{}", range.from, range.to)?;
        }
        if !self.keywords.is_empty() {
            write!(f, ", keywords [{}]", self.keywords.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("no candidate tracks found for {context}")]
    NoCandidates { context: AttemptContext },

    #[error("catalog unavailable for every candidate source ({context})")]
    CatalogUnavailable { context: AttemptContext },

    #[error("generation cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RecommendError {
    pub fn context(&self) -> Option<&AttemptContext> {
        match self {
            RecommendError::NoCandidates { context }
            | RecommendError::CatalogUnavailable { context } => Some(context),
            RecommendError::Cancelled | RecommendError::InvalidRequest(_) => None,
        }
    }
}

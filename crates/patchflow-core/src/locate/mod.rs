//! Range-locator strategies.
//!
//! Two interchangeable strategies narrow an issue to candidate code ranges:
//!
//! - [`ModelDrivenLocator`] asks the text service for a structured
//!   file → line-ranges mapping and parses it strictly
//! - [`RetrievalLocator`] selects precomputed candidate symbols by lexical
//!   similarity and resolves them to function bodies
//!
//! Strategy selection is a configuration choice made once per invocation;
//! the strategies never run concurrently within one invocation.

mod model_driven;
mod retrieval;

pub use model_driven::ModelDrivenLocator;
pub use retrieval::{RetrievalLocator, RetrievalScoring};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ExtractedDocument, LocatedRanges, Result};

/// Which locator strategy drives range narrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocatingMode {
    /// Ask the text service for a file → line-ranges mapping.
    #[default]
    ModelDriven,
    /// Jaccard ranking over the precomputed symbol-change index.
    Jaccard,
    /// Reserved alternate scoring mode; currently yields no ranges.
    Bm25,
}

impl LocatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatingMode::ModelDriven => "model_driven",
            LocatingMode::Jaccard => "jaccard",
            LocatingMode::Bm25 => "bm25",
        }
    }
}

/// Capability: narrow an issue to candidate code ranges.
#[async_trait]
pub trait RangeLocator: Send + Sync {
    async fn locate(
        &self,
        doc: &ExtractedDocument,
        script_names: &[String],
        instance_id: &str,
    ) -> Result<LocatedRanges>;
}

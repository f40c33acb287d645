//! Records, reasoning chains and retrieval results.

use serde::{Deserialize, Serialize};

/// The four-part structure every corpus record carries and every generation
/// must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningChain {
  pub problem_decomposition: String,
  pub data: String,
  pub method: String,
  pub conclusion: String,
}

impl ReasoningChain {
  /// JSON keys of the four sections, in order.
  pub const FIELDS: [&'static str; 4] = ["problem_decomposition", "data", "method", "conclusion"];

  /// `(heading, text)` pairs in presentation order.
  pub fn sections(&self) -> [(&'static str, &str); 4] {
    [
      ("Problem Decomposition", self.problem_decomposition.as_str()),
      ("Data Requirements", self.data.as_str()),
      ("Experimental Methods", self.method.as_str()),
      ("Expected Conclusion", self.conclusion.as_str()),
    ]
  }

  /// True when every section has text after trimming.
  pub fn is_complete(&self) -> bool {
    self.sections().iter().all(|(_, text)| !text.trim().is_empty())
  }
}

/// Where a record came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
  pub title: String,
  #[serde(default)]
  pub year: Option<u32>,
  #[serde(default)]
  pub doi: String,
  #[serde(default)]
  pub journal: String,
  #[serde(default)]
  pub citation_count: u64,
}

impl Provenance {
  pub fn year_label(&self) -> String {
    self.year.map(|year| year.to_string()).unwrap_or_else(|| "n.d.".to_string())
  }
}

/// One corpus entry as held by the vector store.
///
/// Only `summary_text` is embedded; `full_payload` travels with the vector and
/// is returned as-is on retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
  pub id: String,
  pub summary_text: String,
  pub full_payload: ReasoningChain,
  pub provenance: Provenance,
}

impl Record {
  /// The text that gets embedded for a record with this title and decomposition.
  pub fn summary_for(title: &str, problem_decomposition: &str) -> String {
    format!("Research Title: {title}\n\nProblem Decomposition:\n{problem_decomposition}")
  }
}

/// A record paired with its similarity to the query (higher is closer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedRecord {
  pub record: Record,
  pub score: f32,
}

/// Retrieved records ordered by descending score.
pub type RetrievalResult = Vec<RetrievedRecord>;

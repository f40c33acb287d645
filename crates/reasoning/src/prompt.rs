//! Few-shot prompt assembly.
//!
//! Building is pure: the same question and results always give the same
//! prompt, and no rendered prompt is longer than `max_prompt_chars`.

use std::fmt::Write as _;

use crate::config::Config;
use crate::model::RetrievedRecord;

const INTRODUCTION: &str = "You are an expert in neuroscience experimental design. Your task is \
to generate a complete scientific reasoning chain (quadruple structure) based on the user's \
research question, referencing similar successful research cases.";

const INSTRUCTIONS: &str = r#"Based on the above reference cases, design a complete scientific reasoning chain for the user's research question, including the following four components:

1. **Problem Decomposition**:
   - Start from the broad context and progressively focus on specific research hypotheses
   - Include: background question → mechanistic gap → core hypothesis
   - Express in a coherent paragraph of 3-5 sentences

2. **Data Requirements**:
   - Clearly specify what data is needed to test the hypothesis
   - Include: sample source, data type, sampling characteristics, brain regions, task conditions
   - Express in a coherent paragraph of 3-4 sentences

3. **Experimental Methods**:
   - Describe in detail how to design experiments to acquire the data
   - Include: experimental design, data acquisition methods, experimental conditions, analytical pipeline
   - Express in a coherent paragraph of 4-5 sentences

4. **Conclusion**:
   - Based on the hypothesis, predict potential findings and their scientific significance
   - Include: expected findings, how they answer the question, scientific significance
   - Express in a coherent paragraph of 4-6 sentences

**Important Requirements**:
- Reference the scientific logic and expression style from the examples, but innovate for the user's specific question
- Ensure logical coherence across the four components: problem → data → method → conclusion
- Express each component as a natural, fluent paragraph (not bullet points)
- Output in JSON format

Output Format:
{
    "problem_decomposition": "...",
    "data": "...",
    "method": "...",
    "conclusion": "..."
}

Output only JSON, no other explanations.
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
  /// Longest any single rendered field may be, in characters
  pub max_field_chars: usize,
  /// Longest the whole prompt may be, in characters
  pub max_prompt_chars: usize,
  pub max_examples: usize,
}

impl Default for PromptLimits {
  fn default() -> Self {
    Self { max_field_chars: 4_000, max_prompt_chars: 32_000, max_examples: 5 }
  }
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
  limits: PromptLimits,
}

impl PromptBuilder {
  pub fn new(limits: PromptLimits) -> Self {
    Self { limits }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(PromptLimits {
      max_field_chars: config.max_field_chars,
      max_prompt_chars: config.max_prompt_chars,
      max_examples: config.max_examples,
    })
  }

  pub fn build(&self, question: &str, results: &[RetrievedRecord]) -> String {
    let head = format!(
      "{INTRODUCTION}\n\nUser's Research Question:\n{}\n\nRelevant Research Cases (for reference):\n",
      self.field(question.trim())
    );
    let tail = format!("\n{INSTRUCTIONS}");

    let mut budget = self.limits.max_prompt_chars.saturating_sub(char_len(&head) + char_len(&tail));
    let mut examples = String::new();
    for (index, result) in results.iter().take(self.limits.max_examples).enumerate() {
      let example = self.example(index + 1, result);
      let cost = char_len(&example) + 1;
      if cost > budget {
        bentley::verbose!("prompt limit reached, using {index} of {} examples", results.len());
        break;
      }
      budget -= cost;
      examples.push('\n');
      examples.push_str(&example);
    }

    let prompt = format!("{head}{examples}{tail}");
    truncate_chars(&prompt, self.limits.max_prompt_chars).to_string()
  }

  fn example(&self, position: usize, result: &RetrievedRecord) -> String {
    let record = &result.record;
    let provenance = &record.provenance;
    let chain = &record.full_payload;

    let mut text = String::new();
    let _ = writeln!(
      text,
      "Example {position} (Similarity: {:.3}, Citations: {}):",
      result.score, provenance.citation_count
    );
    let _ = writeln!(
      text,
      "Study: {} ({})\n",
      self.field(&provenance.title),
      provenance.year_label()
    );
    let _ = writeln!(text, "{}\n", self.field(&record.summary_text));
    let _ = writeln!(text, "Data Requirements:\n{}\n", self.field(&chain.data));
    let _ = writeln!(text, "Experimental Methods:\n{}\n", self.field(&chain.method));
    let _ = writeln!(text, "Conclusion:\n{}", self.field(&chain.conclusion));
    text
  }

  fn field<'a>(&self, text: &'a str) -> &'a str {
    truncate_chars(text, self.limits.max_field_chars)
  }
}

/// The first `max` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
  match text.char_indices().nth(max) {
    Some((byte_index, _)) => &text[..byte_index],
    None => text,
  }
}

fn char_len(text: &str) -> usize {
  text.chars().count()
}

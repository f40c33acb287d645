//! Display formatting utilities for CLI output

use colored::*;

use crate::index::IndexReport;
use crate::pipeline::{FailureReport, GeneratedChain};

const WRAP_WIDTH: usize = 80;

/// Wrap text to fit within a specified width
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let mut lines = Vec::new();

  for paragraph in text.split('\n') {
    if paragraph.trim().is_empty() {
      lines.push(String::new());
      continue;
    }

    let mut current_line = String::new();
    for word in paragraph.split_whitespace() {
      if current_line.is_empty() {
        current_line = word.to_string();
      } else if current_line.chars().count() + 1 + word.chars().count() <= width {
        current_line.push(' ');
        current_line.push_str(word);
      } else {
        lines.push(std::mem::take(&mut current_line));
        current_line = word.to_string();
      }
    }

    if !current_line.is_empty() {
      lines.push(current_line);
    }
  }

  lines
}

/// Render a generated chain with its references for the terminal
pub fn render_chain(generated: &GeneratedChain) -> String {
  let mut out = String::new();

  out.push_str(&format!("{}\n", "Research Question".blue().bold()));
  push_wrapped(&mut out, &generated.question);

  for (index, (heading, text)) in generated.reasoning_chain.sections().iter().enumerate() {
    out.push_str(&format!("\n{}\n", format!("{}. {heading}", index + 1).blue().bold()));
    push_wrapped(&mut out, text);
  }

  if !generated.references.is_empty() {
    out.push_str(&format!("\n{}\n", "References".blue().bold()));
    for (index, reference) in generated.references.iter().enumerate() {
      let year = reference.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
      out.push_str(&format!("  {}. {} ({year})\n", index + 1, reference.title.yellow()));
      out.push_str(&format!(
        "     {}\n",
        format!(
          "similarity {:.4}, citations {}",
          reference.similarity, reference.citation_count
        )
        .dimmed()
      ));
    }
  }

  out.push_str(&format!("\n{}\n", format!("Generated by {}", generated.model).dimmed()));
  out
}

/// Render a failure outcome for the terminal
pub fn render_failure(report: &FailureReport) -> String {
  format!(
    "Generation failed while {} ({})\n{}",
    report.stage.as_str().yellow(),
    report.error_kind.as_str().red(),
    report.message
  )
}

pub fn render_index_report(report: &IndexReport) -> String {
  format!(
    "Indexed {} records ({} skipped, {} failed)",
    report.indexed.to_string().green().bold(),
    report.skipped,
    report.failed
  )
}

fn push_wrapped(out: &mut String, text: &str) {
  for line in wrap_text(text, WRAP_WIDTH) {
    out.push_str(&line);
    out.push('\n');
  }
}

// ABOUTME: Summary domain models: inputs, outputs, grades, and result bundles.
// ABOUTME: Shared between the agent runtime, workflow runs, and the HTTP API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of summary the service can produce.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    /// Dense, indexing-oriented summary for downstream machine consumption.
    #[default]
    Machine,
    /// Reader-facing summary formatted for humans.
    Pretty,
}

impl SummaryType {
    /// All summary types, in the order the multi-type workflow fans out.
    pub const ALL: [SummaryType; 2] = [SummaryType::Machine, SummaryType::Pretty];

    pub fn label(&self) -> &'static str {
        match self {
            SummaryType::Machine => "machine",
            SummaryType::Pretty => "pretty",
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_language() -> String {
    "de".to_string()
}

fn default_iterations() -> u32 {
    1
}

/// Input to a summarization run: the content plus loop parameters.
/// `feedbacks` accumulates grader feedback between refinement iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryInput {
    pub content: String,
    #[serde(default)]
    pub feedbacks: Vec<String>,
    /// Target language for the summary, e.g. "en" or "de".
    #[serde(default = "default_language")]
    pub to_language: String,
    #[serde(default)]
    pub summary_type: SummaryType,
    /// Number of summarize-and-grade iterations. 0 is treated as 1.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

/// A named entity the grader checks for in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Entity kind, e.g. "name", "date", "number", "place".
    #[serde(rename = "type")]
    pub kind: String,
}

/// Grader verdict for one summary candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryGrade {
    /// Grade from 0 to 10.
    pub grade: i64,
    /// Feedback items folded into the next iteration's input.
    #[serde(default)]
    pub feedbacks: Vec<String>,
    #[serde(default)]
    pub grade_reasoning: String,
    /// Entities from the original text that the summary dropped.
    #[serde(default)]
    pub missing_entities: Vec<Entity>,
}

/// A generated summary candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    /// The shorter but accurate version of the original text, in Markdown.
    pub short_version: String,
    /// One-to-three sentence description of the content.
    pub description: String,
    /// Title for a table of contents.
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Language of the output text, e.g. "en" or "de".
    pub language: String,
}

/// Context handed to the judge agent: the candidate plus the original text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryGradeCtx {
    #[serde(flatten)]
    pub summary: SummaryOutput,
    pub original_text: String,
}

impl SummaryGradeCtx {
    pub fn new(summary: SummaryOutput, original_text: String) -> Self {
        Self {
            summary,
            original_text,
        }
    }
}

/// Rich result of one refinement loop, including every intermediate
/// candidate and grade. Not exposed directly in API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalSummaryResult {
    /// The best candidate after all iterations.
    pub summary: SummaryOutput,
    #[serde(default)]
    pub grades: Vec<SummaryGrade>,
    #[serde(default)]
    pub summaries: Vec<SummaryOutput>,
    pub summary_type: SummaryType,
}

/// Raw output of the multi-type workflow: one internal result per branch
/// that succeeded. Failed branches are left out of the map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalSummariesAllResult {
    #[serde(default)]
    pub summaries: BTreeMap<SummaryType, Option<InternalSummaryResult>>,
}

/// Public multi-type result: final summaries only, internals stripped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummariesResult {
    #[serde(default)]
    pub summaries: BTreeMap<SummaryType, Option<SummaryOutput>>,
}

impl From<InternalSummariesAllResult> for SummariesResult {
    fn from(internal: InternalSummariesAllResult) -> Self {
        let summaries = internal
            .summaries
            .into_iter()
            .map(|(kind, result)| (kind, result.map(|r| r.summary)))
            .collect();
        Self { summaries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output(title: &str) -> SummaryOutput {
        SummaryOutput {
            short_version: "## Gist\nShort.".to_string(),
            description: "A short description.".to_string(),
            title: title.to_string(),
            tags: vec!["test".to_string()],
            language: "en".to_string(),
        }
    }

    #[test]
    fn summary_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SummaryType::Pretty).unwrap(),
            "\"pretty\""
        );
        let parsed: SummaryType = serde_json::from_str("\"machine\"").unwrap();
        assert_eq!(parsed, SummaryType::Machine);
    }

    #[test]
    fn summary_input_defaults() {
        let input: SummaryInput = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert_eq!(input.content, "hello");
        assert!(input.feedbacks.is_empty());
        assert_eq!(input.to_language, "de");
        assert_eq!(input.summary_type, SummaryType::Machine);
        assert_eq!(input.iterations, 1);
    }

    #[test]
    fn grade_ctx_flattens_summary_fields() {
        let ctx = SummaryGradeCtx::new(sample_output("Flat"), "original".to_string());
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["title"], "Flat");
        assert_eq!(json["original_text"], "original");

        let back: SummaryGradeCtx = serde_json::from_value(json).unwrap();
        assert_eq!(back.summary.title, "Flat");
    }

    #[test]
    fn public_result_strips_internals() {
        let mut summaries = BTreeMap::new();
        summaries.insert(
            SummaryType::Machine,
            Some(InternalSummaryResult {
                summary: sample_output("Best"),
                grades: vec![SummaryGrade {
                    grade: 9,
                    feedbacks: vec![],
                    grade_reasoning: "good".to_string(),
                    missing_entities: vec![],
                }],
                summaries: vec![sample_output("Best")],
                summary_type: SummaryType::Machine,
            }),
        );
        summaries.insert(SummaryType::Pretty, None);

        let public: SummariesResult = InternalSummariesAllResult { summaries }.into();

        let machine = public.summaries.get(&SummaryType::Machine).unwrap();
        assert_eq!(machine.as_ref().unwrap().title, "Best");
        assert!(public.summaries.get(&SummaryType::Pretty).unwrap().is_none());

        let json = serde_json::to_value(&public).unwrap();
        assert!(json["summaries"]["machine"].get("grades").is_none());
    }
}

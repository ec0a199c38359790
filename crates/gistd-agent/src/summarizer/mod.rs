// ABOUTME: Summarizer and judge agent definitions: prompts, default configs, message prep.
// ABOUTME: Machine and pretty variants form two generator/judge pairs selected by SummaryType.

pub mod refine;

use gistd_core::{
    AgentConfig, ApiMode, ChatMessage, ClientKind, ModelSettings, SummaryGrade, SummaryGradeCtx,
    SummaryInput, SummaryOutput,
};

use crate::runner::AgentDef;

const DEFAULT_MODEL: &str = "gemini/gemini-pro";

const PROMPT_SUMMARY: &str = "\
You are a professional summarizer.

The readers are busy people who want the gist of the content quickly. They
already know most of the context, such as the parties involved; there is no
need to explain it. Provide a summary that is short, concise, and to the
point, formatted as a Markdown document with clear headings and paragraphs.

The description must be a short paragraph, one to three sentences, giving an
overview of the content. Go directly to the point: \"The person agreed to the
deal with the company\" is a good description; \"The text is about an
agreement\" is not. Never open with \"In the text...\" or \"In the document...\".

The summary itself may be a few paragraphs long, but no more. Avoid long
sentences and redundant information. All output must be in the language
requested by the user.

# Output format

Produce a JSON object with exactly these fields:
  short_version: the shorter but accurate and exhaustive version of the
                 original text, in Markdown
  description:   a short description of the content, 1 to 3 sentences
  title:         title for the table of contents
  tags:          list of tags for indexing
  language:      language code of the output text, e.g. \"en\" or \"de\"
";

const PROMPT_SUMMARY_PRETTY: &str = "\
You are a professional summarizer producing reader-facing digests.

Write for a human who will read the summary instead of the original text.
Favor flowing, well-structured Markdown over terse bullet lists: short
headed sections, readable sentences, and a natural order of ideas. Keep it
concise; if the reader wants more, the original text is one click away.

The description must be one to three sentences and go directly to the
point. All output must be in the language requested by the user.

# Output format

Produce a JSON object with exactly these fields:
  short_version: the reader-facing summary, in Markdown
  description:   a short description of the content, 1 to 3 sentences
  title:         title for the table of contents
  tags:          list of tags for indexing
  language:      language code of the output text, e.g. \"en\" or \"de\"
";

const PROMPT_JUDGE: &str = "\
You are a professional reviewer of summaries.

You will be given a summary (title, description, and body) together with
the original text. The readers are busy people who want the gist quickly;
they already know the context and can read the original if they need more.

Grade the summary from 0 to 10, where 0 is nonsense and 10 is the best
possible summary: short, concise, accurate, and complete. List every
important entity (names, dates, numbers, places) present in the original
but missing from the summary. Provide concrete feedback items that would
improve the next attempt.

# Output format

Produce a JSON object with exactly these fields:
  grade:            integer 0-10
  feedbacks:        list of feedback strings to improve the summary
  grade_reasoning:  what was good and what was bad
  missing_entities: list of {name, type} objects, empty if none
";

const PROMPT_JUDGE_PRETTY: &str = "\
You are a professional reviewer of reader-facing digests.

You will be given a summary (title, description, and body) together with
the original text. Judge it as a replacement for reading the original:
does it flow, is it accurate, is anything important missing, is it short
enough for a busy reader?

Grade the summary from 0 to 10, where 0 is nonsense and 10 is the best
possible digest. List every important entity missing from the summary and
provide concrete feedback items for the next attempt.

# Output format

Produce a JSON object with exactly these fields:
  grade:            integer 0-10
  feedbacks:        list of feedback strings to improve the summary
  grade_reasoning:  what was good and what was bad
  missing_entities: list of {name, type} objects, empty if none
";

fn summarizer_config(name: &str, description: &str) -> AgentConfig {
    AgentConfig {
        name: name.to_string(),
        description: description.to_string(),
        model: DEFAULT_MODEL.to_string(),
        client: ClientKind::Litellm,
        api_mode: ApiMode::Chat,
        model_settings: ModelSettings {
            tool_choice: Some("none".to_string()),
            ..ModelSettings::default()
        },
        max_input_tokens: None,
        base_url: None,
        api_key: None,
    }
}

/// Messages shared by both generator variants: target language, original
/// text, and any accumulated reviewer feedback.
fn summary_messages(ctx: &SummaryInput) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::user(format!(
            "Generate summaries and text in language: {}",
            ctx.to_language
        )),
        ChatMessage::user(format!("Original text:\n{}", ctx.content)),
    ];
    if !ctx.feedbacks.is_empty() {
        let feedback_lines: Vec<String> =
            ctx.feedbacks.iter().map(|f| format!("- {}", f)).collect();
        messages.push(ChatMessage::user(format!(
            "Reviewer feedback on the previous attempt, address every point:\n{}",
            feedback_lines.join("\n")
        )));
    }
    messages
}

/// Messages shared by both judge variants: original text plus the
/// candidate's parts, each in its own message.
fn judge_messages(ctx: &SummaryGradeCtx) -> Vec<ChatMessage> {
    vec![
        ChatMessage::user(format!("-------\nOriginal text:\n{}", ctx.original_text)),
        ChatMessage::user(format!("-------\nTitle:\n{}", ctx.summary.title)),
        ChatMessage::user(format!("-------\nDescription:\n{}", ctx.summary.description)),
        ChatMessage::user(format!("-------\nSummary:\n{}", ctx.summary.short_version)),
    ]
}

/// Dense summary generator for machine consumption.
pub struct SummaryAgent;

impl SummaryAgent {
    pub const NAME_ID: &'static str = "SummaryAgent";
}

impl AgentDef for SummaryAgent {
    type Context = SummaryInput;
    type Output = SummaryOutput;

    fn name_id(&self) -> &'static str {
        Self::NAME_ID
    }

    fn default_config(&self) -> AgentConfig {
        summarizer_config(
            Self::NAME_ID,
            "Create a short and concise summary of the content, with a description and title.",
        )
    }

    fn system_prompt(&self) -> String {
        PROMPT_SUMMARY.to_string()
    }

    fn build_messages(&self, ctx: &SummaryInput) -> Vec<ChatMessage> {
        summary_messages(ctx)
    }
}

/// Judge for the machine summary variant.
pub struct SummaryJudgeAgent;

impl SummaryJudgeAgent {
    pub const NAME_ID: &'static str = "SummaryJudge";
}

impl AgentDef for SummaryJudgeAgent {
    type Context = SummaryGradeCtx;
    type Output = SummaryGrade;

    fn name_id(&self) -> &'static str {
        Self::NAME_ID
    }

    fn default_config(&self) -> AgentConfig {
        summarizer_config(Self::NAME_ID, "Judge the summary and provide feedbacks.")
    }

    fn system_prompt(&self) -> String {
        PROMPT_JUDGE.to_string()
    }

    fn build_messages(&self, ctx: &SummaryGradeCtx) -> Vec<ChatMessage> {
        judge_messages(ctx)
    }
}

/// Reader-facing summary generator.
pub struct SummaryPrettyAgent;

impl SummaryPrettyAgent {
    pub const NAME_ID: &'static str = "SummaryPretty";
}

impl AgentDef for SummaryPrettyAgent {
    type Context = SummaryInput;
    type Output = SummaryOutput;

    fn name_id(&self) -> &'static str {
        Self::NAME_ID
    }

    fn default_config(&self) -> AgentConfig {
        summarizer_config(
            Self::NAME_ID,
            "Create a reader-facing summary of the content, with a description and title.",
        )
    }

    fn system_prompt(&self) -> String {
        PROMPT_SUMMARY_PRETTY.to_string()
    }

    fn build_messages(&self, ctx: &SummaryInput) -> Vec<ChatMessage> {
        summary_messages(ctx)
    }
}

/// Judge for the reader-facing variant.
pub struct SummaryPrettyJudgeAgent;

impl SummaryPrettyJudgeAgent {
    pub const NAME_ID: &'static str = "SummaryPrettyJudge";
}

impl AgentDef for SummaryPrettyJudgeAgent {
    type Context = SummaryGradeCtx;
    type Output = SummaryGrade;

    fn name_id(&self) -> &'static str {
        Self::NAME_ID
    }

    fn default_config(&self) -> AgentConfig {
        summarizer_config(Self::NAME_ID, "Judge the summary and provide feedbacks.")
    }

    fn system_prompt(&self) -> String {
        PROMPT_JUDGE_PRETTY.to_string()
    }

    fn build_messages(&self, ctx: &SummaryGradeCtx) -> Vec<ChatMessage> {
        judge_messages(ctx)
    }
}

/// Name ids of every agent the service ships. Dynamic global overrides are
/// materialized against this list so they reach all agents.
pub const KNOWN_AGENTS: [&str; 4] = [
    SummaryAgent::NAME_ID,
    SummaryJudgeAgent::NAME_ID,
    SummaryPrettyAgent::NAME_ID,
    SummaryPrettyJudgeAgent::NAME_ID,
];

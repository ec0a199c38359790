// ABOUTME: The grade-guided refinement loop: generate, grade, fold feedback, repeat.
// ABOUTME: Bounded by the iteration budget; early exit on grade thresholds; first max grade wins.

use gistd_core::{
    InternalSummaryResult, SummaryGrade, SummaryGradeCtx, SummaryInput, SummaryOutput,
};

use crate::error::AgentError;
use crate::runner::AgentRunner;

/// Run one summarize-and-grade refinement loop.
///
/// Up to `ctx.iterations` slots (minimum one): each slot generates a
/// candidate and, unless the budget is a single iteration, grades it
/// against the original content. A slot whose generation comes back empty
/// is consumed without a candidate. The loop exits early on a grade of 8
/// or more, or above 6 with no missing entities; a failed grading ends the
/// loop with whatever was generated so far.
///
/// Fails with `NoResult` only when no candidate was ever produced.
pub async fn summarize_one_type(
    generator: &AgentRunner<SummaryInput, SummaryOutput>,
    judge: &AgentRunner<SummaryGradeCtx, SummaryGrade>,
    llm_input: &str,
    mut ctx: SummaryInput,
) -> Result<InternalSummaryResult, AgentError> {
    let iterations = ctx.iterations.max(1);
    let summary_type = ctx.summary_type;

    let mut summaries: Vec<SummaryOutput> = Vec::new();
    let mut grades: Vec<SummaryGrade> = Vec::new();

    let mut i = 0;
    while i < iterations {
        i += 1;
        tracing::info!(
            iteration = i,
            grades = ?grades.iter().map(|g| g.grade).collect::<Vec<_>>(),
            "running summary iteration"
        );

        let Some(summary) = generator.run(llm_input, &ctx).await? else {
            // The slot is spent: the counter has already advanced.
            tracing::error!(iteration = i, "no summary generated, trying again");
            continue;
        };
        summaries.push(summary.clone());

        if iterations == 1 {
            break;
        }

        tracing::info!(iteration = i, "grading summary");
        let grade_ctx = SummaryGradeCtx::new(summary, ctx.content.clone());
        let Some(grade) = judge.run(llm_input, &grade_ctx).await? else {
            // A failed grading ends the loop without marking failure.
            tracing::warn!(iteration = i, "no grade returned, keeping current results");
            break;
        };

        let good_enough =
            grade.grade >= 8 || (grade.missing_entities.is_empty() && grade.grade > 6);
        if good_enough {
            grades.push(grade);
            break;
        }

        ctx.feedbacks = grade.feedbacks.clone();
        grades.push(grade);
    }

    if summaries.is_empty() {
        return Err(AgentError::NoResult);
    }

    // Pick the best-graded candidate; on ties the earliest index wins.
    // With no grades (single-iteration path) the only candidate is the best.
    let mut best = 0;
    if grades.is_empty() {
        best = summaries.len() - 1;
    } else {
        for (idx, grade) in grades.iter().enumerate() {
            if grade.grade > grades[best].grade {
                best = idx;
            }
        }
    }

    Ok(InternalSummaryResult {
        summary: summaries[best].clone(),
        grades,
        summaries,
        summary_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::AgentDef;
    use crate::summarizer::{SummaryAgent, SummaryJudgeAgent};
    use crate::testing::MockLlmClient;
    use gistd_core::SummaryType;
    use std::sync::Arc;

    fn generator_with(
        client: Arc<MockLlmClient>,
    ) -> AgentRunner<SummaryInput, SummaryOutput> {
        AgentRunner::new(Arc::new(SummaryAgent), SummaryAgent.default_config(), client)
    }

    fn judge_with(client: Arc<MockLlmClient>) -> AgentRunner<SummaryGradeCtx, SummaryGrade> {
        AgentRunner::new(
            Arc::new(SummaryJudgeAgent),
            SummaryJudgeAgent.default_config(),
            client,
        )
    }

    fn input(iterations: u32) -> SummaryInput {
        SummaryInput {
            content: "The Q3 deal closed on October 2nd for 1.2M.".to_string(),
            feedbacks: vec![],
            to_language: "en".to_string(),
            summary_type: SummaryType::Machine,
            iterations,
        }
    }

    fn summary_json(title: &str) -> String {
        format!(
            r###"{{"short_version": "## {t}\nShort.", "description": "About {t}.", "title": "{t}", "tags": [], "language": "en"}}"###,
            t = title
        )
    }

    fn grade_json(grade: i64, feedbacks: &[&str], missing: &[(&str, &str)]) -> String {
        let feedbacks: Vec<String> = feedbacks.iter().map(|f| format!("\"{}\"", f)).collect();
        let missing: Vec<String> = missing
            .iter()
            .map(|(name, kind)| format!(r#"{{"name": "{}", "type": "{}"}}"#, name, kind))
            .collect();
        format!(
            r#"{{"grade": {}, "feedbacks": [{}], "grade_reasoning": "r", "missing_entities": [{}]}}"#,
            grade,
            feedbacks.join(","),
            missing.join(",")
        )
    }

    #[tokio::test]
    async fn single_iteration_never_invokes_judge() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            &summary_json("Only"),
        ))]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![]));

        let result = summarize_one_type(
            &generator_with(Arc::clone(&gen_client)),
            &judge_with(Arc::clone(&judge_client)),
            "",
            input(1),
        )
        .await
        .unwrap();

        assert_eq!(gen_client.request_count(), 1);
        assert_eq!(judge_client.request_count(), 0);
        assert_eq!(result.summaries.len(), 1);
        assert!(result.grades.is_empty());
        assert_eq!(result.summary.title, "Only");
    }

    #[tokio::test]
    async fn zero_iterations_treated_as_one() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            &summary_json("Zero"),
        ))]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![]));

        let result = summarize_one_type(
            &generator_with(gen_client),
            &judge_with(Arc::clone(&judge_client)),
            "",
            input(0),
        )
        .await
        .unwrap();

        assert_eq!(result.summaries.len(), 1);
        assert_eq!(judge_client.request_count(), 0);
    }

    #[tokio::test]
    async fn high_grade_stops_immediately_regardless_of_budget() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text(&summary_json("First"))),
            Ok(MockLlmClient::text(&summary_json("Never"))),
        ]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            &grade_json(9, &[], &[]),
        ))]));

        let result = summarize_one_type(
            &generator_with(Arc::clone(&gen_client)),
            &judge_with(judge_client),
            "",
            input(5),
        )
        .await
        .unwrap();

        assert_eq!(gen_client.request_count(), 1);
        assert_eq!(result.summaries.len(), 1);
        assert_eq!(result.grades.len(), 1);
        assert_eq!(result.summary.title, "First");
    }

    #[tokio::test]
    async fn stops_at_grade_eight_and_picks_it() {
        // Grades 5 then 8: the loop stops after the second iteration and
        // the second candidate is the best.
        let gen_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text(&summary_json("First"))),
            Ok(MockLlmClient::text(&summary_json("Second"))),
            Ok(MockLlmClient::text(&summary_json("Never"))),
        ]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text(&grade_json(
                5,
                &["mention the amount"],
                &[("1.2M", "number")],
            ))),
            Ok(MockLlmClient::text(&grade_json(8, &[], &[]))),
        ]));

        let result = summarize_one_type(
            &generator_with(Arc::clone(&gen_client)),
            &judge_with(judge_client),
            "",
            input(3),
        )
        .await
        .unwrap();

        assert_eq!(gen_client.request_count(), 2);
        assert_eq!(result.grades.len(), 2);
        assert_eq!(result.summary.title, "Second");
    }

    #[tokio::test]
    async fn decent_grade_with_no_missing_entities_stops() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            &summary_json("Decent"),
        ))]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            &grade_json(7, &["minor style nit"], &[]),
        ))]));

        let result = summarize_one_type(
            &generator_with(Arc::clone(&gen_client)),
            &judge_with(judge_client),
            "",
            input(3),
        )
        .await
        .unwrap();

        assert_eq!(gen_client.request_count(), 1);
        assert_eq!(result.summary.title, "Decent");
    }

    #[tokio::test]
    async fn decent_grade_with_missing_entities_continues() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text(&summary_json("First"))),
            Ok(MockLlmClient::text(&summary_json("Second"))),
        ]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text(&grade_json(
                7,
                &["add the closing date"],
                &[("October 2nd", "date")],
            ))),
            Ok(MockLlmClient::text(&grade_json(8, &[], &[]))),
        ]));

        let result = summarize_one_type(
            &generator_with(Arc::clone(&gen_client)),
            &judge_with(judge_client),
            "",
            input(3),
        )
        .await
        .unwrap();

        assert_eq!(result.summaries.len(), 2);
        // The second generation must see the first round's feedback.
        let second_request = &gen_client.requests()[1];
        let folded = second_request
            .messages
            .iter()
            .any(|m| m.content.contains("add the closing date"));
        assert!(folded, "feedback was not folded into the next iteration");
    }

    #[tokio::test]
    async fn empty_generation_consumes_the_slot() {
        // Two unparseable generations then a good one, but budget is 2:
        // both slots are spent, no candidate survives the second slot.
        let gen_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text("not json")),
            Ok(MockLlmClient::text(&summary_json("Late"))),
        ]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            &grade_json(9, &[], &[]),
        ))]));

        let result = summarize_one_type(
            &generator_with(Arc::clone(&gen_client)),
            &judge_with(judge_client),
            "",
            input(2),
        )
        .await
        .unwrap();

        assert_eq!(gen_client.request_count(), 2);
        assert_eq!(result.summaries.len(), 1);
        assert_eq!(result.summary.title, "Late");
    }

    #[tokio::test]
    async fn all_empty_generations_fail_with_no_result() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text("nope")),
            Ok(MockLlmClient::text("still nope")),
            Ok(MockLlmClient::text("nothing")),
        ]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![]));

        let err = summarize_one_type(
            &generator_with(gen_client),
            &judge_with(Arc::clone(&judge_client)),
            "",
            input(3),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AgentError::NoResult));
        assert_eq!(judge_client.request_count(), 0);
    }

    #[tokio::test]
    async fn failed_grading_keeps_generated_results() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            &summary_json("Kept"),
        ))]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![Ok(MockLlmClient::text(
            "the judge rambled instead of returning JSON",
        ))]));

        let result = summarize_one_type(
            &generator_with(gen_client),
            &judge_with(judge_client),
            "",
            input(3),
        )
        .await
        .unwrap();

        assert!(result.grades.is_empty());
        assert_eq!(result.summary.title, "Kept");
    }

    #[tokio::test]
    async fn tied_grades_pick_the_earliest_candidate() {
        // Both iterations grade 5 with missing entities, budget 2: no early
        // stop, the first of the tied candidates wins.
        let gen_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text(&summary_json("First"))),
            Ok(MockLlmClient::text(&summary_json("Second"))),
        ]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![
            Ok(MockLlmClient::text(&grade_json(
                5,
                &["more detail"],
                &[("Q3", "date")],
            ))),
            Ok(MockLlmClient::text(&grade_json(
                5,
                &["more detail"],
                &[("Q3", "date")],
            ))),
        ]));

        let result = summarize_one_type(
            &generator_with(gen_client),
            &judge_with(judge_client),
            "",
            input(2),
        )
        .await
        .unwrap();

        assert_eq!(result.grades.len(), 2);
        assert_eq!(result.summary.title, "First");
    }

    #[tokio::test]
    async fn provider_errors_bubble_up() {
        let gen_client = Arc::new(MockLlmClient::queued(vec![Err(AgentError::Provider(
            "connection reset".to_string(),
        ))]));
        let judge_client = Arc::new(MockLlmClient::queued(vec![]));

        let err = summarize_one_type(
            &generator_with(gen_client),
            &judge_with(judge_client),
            "",
            input(2),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AgentError::Provider(_)));
    }
}

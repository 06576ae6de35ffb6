use crate::config::{EvalConfig, FailurePolicy};
use crate::error::EvalError;
use crate::models::{EvaluationRecord, EvaluationReport, QuestionPair};
use crate::traits::JudgeProvider;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

/// The full question-answering path a question is evaluated against.
#[async_trait]
pub trait QueryPipeline: Send + Sync {
    async fn answer(&self, question: &str) -> anyhow::Result<String>;
}

/// Runs a labeled question set through the pipeline and judge concurrently.
///
/// Units are independent: no shared mutable state, completion in any order,
/// records keyed by input index. Under `BestEffort` a unit failure becomes
/// an incorrect record; under `FailFast` the first failure aborts the
/// remaining in-flight units.
pub struct EvaluationHarness<P, J> {
    pipeline: Arc<P>,
    judge: Arc<J>,
    config: EvalConfig,
}

struct UnitFailure {
    index: usize,
    question: String,
    expected_answer: String,
    produced_answer: Option<String>,
    reason: String,
}

impl<P, J> EvaluationHarness<P, J>
where
    P: QueryPipeline + 'static,
    J: JudgeProvider + 'static,
{
    pub fn new(pipeline: P, judge: J, config: EvalConfig) -> Result<Self, EvalError> {
        if config.max_concurrency == 0 {
            return Err(EvalError::InvalidConfiguration(
                "max_concurrency must be positive".to_string(),
            ));
        }

        Ok(Self {
            pipeline: Arc::new(pipeline),
            judge: Arc::new(judge),
            config,
        })
    }

    pub async fn evaluate(&self, pairs: &[QuestionPair]) -> Result<EvaluationReport, EvalError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        if pairs.is_empty() {
            return Ok(EvaluationReport {
                run_id,
                started_at,
                score: None,
                records: Vec::new(),
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut workers = JoinSet::new();

        for (index, pair) in pairs.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&self.pipeline);
            let judge = Arc::clone(&self.judge);
            let deadline = self.config.request_timeout;

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(closed) => {
                        return Err(UnitFailure {
                            index,
                            question: pair.question,
                            expected_answer: pair.expected_answer,
                            produced_answer: None,
                            reason: closed.to_string(),
                        })
                    }
                };
                run_unit(pipeline, judge, deadline, index, pair).await
            });
        }

        let mut records: Vec<EvaluationRecord> = Vec::with_capacity(pairs.len());

        while let Some(joined) = workers.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(error) if error.is_cancelled() => continue,
                Err(error) => return Err(EvalError::Worker(error.to_string())),
            };

            match outcome {
                Ok(record) => records.push(record),
                Err(failure) => match self.config.policy {
                    FailurePolicy::BestEffort => {
                        warn!(
                            index = failure.index,
                            reason = %failure.reason,
                            "evaluation unit failed, recording as incorrect"
                        );
                        records.push(EvaluationRecord {
                            index: failure.index,
                            question: failure.question,
                            produced_answer: failure.produced_answer,
                            expected_answer: failure.expected_answer,
                            is_correct: false,
                            reasoning: Some(failure.reason),
                        });
                    }
                    FailurePolicy::FailFast => {
                        workers.abort_all();
                        return Err(EvalError::Aborted {
                            index: failure.index,
                            reason: failure.reason,
                        });
                    }
                },
            }
        }

        records.sort_by_key(|record| record.index);

        let correct = records.iter().filter(|record| record.is_correct).count();
        let score = correct as f64 / pairs.len() as f64;

        info!(
            %run_id,
            total = pairs.len(),
            correct,
            score,
            "evaluation run complete"
        );

        Ok(EvaluationReport {
            run_id,
            started_at,
            score: Some(score),
            records,
        })
    }
}

async fn run_unit<P, J>(
    pipeline: Arc<P>,
    judge: Arc<J>,
    deadline: Duration,
    index: usize,
    pair: QuestionPair,
) -> Result<EvaluationRecord, UnitFailure>
where
    P: QueryPipeline,
    J: JudgeProvider,
{
    let produced = match tokio::time::timeout(deadline, pipeline.answer(&pair.question)).await {
        Ok(Ok(answer)) => answer,
        Ok(Err(error)) => {
            return Err(UnitFailure {
                index,
                question: pair.question,
                expected_answer: pair.expected_answer,
                produced_answer: None,
                reason: format!("pipeline error: {error}"),
            })
        }
        Err(_) => {
            return Err(UnitFailure {
                index,
                question: pair.question,
                expected_answer: pair.expected_answer,
                produced_answer: None,
                reason: format!("pipeline timed out after {}ms", deadline.as_millis()),
            })
        }
    };

    let judgment = match tokio::time::timeout(
        deadline,
        judge.judge(&pair.question, &produced, &pair.expected_answer),
    )
    .await
    {
        Ok(Ok(judgment)) => judgment,
        Ok(Err(error)) => {
            return Err(UnitFailure {
                index,
                question: pair.question,
                expected_answer: pair.expected_answer,
                produced_answer: Some(produced),
                reason: format!("judge error: {error}"),
            })
        }
        Err(_) => {
            return Err(UnitFailure {
                index,
                question: pair.question,
                expected_answer: pair.expected_answer,
                produced_answer: Some(produced),
                reason: format!("judge timed out after {}ms", deadline.as_millis()),
            })
        }
    };

    Ok(EvaluationRecord {
        index,
        question: pair.question,
        produced_answer: Some(produced),
        expected_answer: pair.expected_answer,
        is_correct: judgment.is_correct,
        reasoning: judgment.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::Judgment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoPipeline;

    #[async_trait]
    impl QueryPipeline for EchoPipeline {
        async fn answer(&self, question: &str) -> anyhow::Result<String> {
            Ok(format!("answer to {question}"))
        }
    }

    /// Judges an answer correct when it contains the expected answer.
    struct ContainsJudge;

    #[async_trait]
    impl JudgeProvider for ContainsJudge {
        async fn judge(
            &self,
            _question: &str,
            answer: &str,
            expected_answer: &str,
        ) -> Result<Judgment, ProviderError> {
            Ok(Judgment {
                is_correct: answer.contains(expected_answer),
                reasoning: None,
            })
        }
    }

    /// Fails for questions containing a marker, judges the rest correct.
    struct FlakyJudge {
        fail_marker: String,
    }

    #[async_trait]
    impl JudgeProvider for FlakyJudge {
        async fn judge(
            &self,
            question: &str,
            _answer: &str,
            _expected_answer: &str,
        ) -> Result<Judgment, ProviderError> {
            if question.contains(&self.fail_marker) {
                return Err(ProviderError::Backend {
                    provider: "fake-judge".to_string(),
                    details: "simulated judge outage".to_string(),
                });
            }
            Ok(Judgment {
                is_correct: true,
                reasoning: Some("matches".to_string()),
            })
        }
    }

    /// Sleeps before answering and counts how many units got to the end.
    struct CountingSlowPipeline {
        completed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl QueryPipeline for CountingSlowPipeline {
        async fn answer(&self, _question: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok("late answer".to_string())
        }
    }

    fn pair(question: &str, expected: &str) -> QuestionPair {
        QuestionPair {
            question: question.to_string(),
            expected_answer: expected.to_string(),
        }
    }

    #[tokio::test]
    async fn score_is_correct_over_total() {
        let harness =
            EvaluationHarness::new(EchoPipeline, ContainsJudge, EvalConfig::default()).unwrap();

        // EchoPipeline answers "answer to <q>", so expected answers that are
        // substrings of that count as correct.
        let pairs = vec![
            pair("q one", "answer to q one"),
            pair("q two", "unrelated"),
            pair("q three", "q three"),
            pair("q four", "nope"),
        ];

        let report = harness.evaluate(&pairs).await.unwrap();

        assert_eq!(report.records.len(), 4);
        assert_eq!(report.score, Some(0.5));
    }

    #[tokio::test]
    async fn empty_input_reports_no_data_instead_of_dividing() {
        let harness =
            EvaluationHarness::new(EchoPipeline, ContainsJudge, EvalConfig::default()).unwrap();

        let report = harness.evaluate(&[]).await.unwrap();

        assert_eq!(report.score, None);
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn records_map_back_to_input_order() {
        let harness =
            EvaluationHarness::new(EchoPipeline, ContainsJudge, EvalConfig::default()).unwrap();

        let pairs: Vec<_> = (0..25)
            .map(|number| pair(&format!("question {number}"), "whatever"))
            .collect();

        let report = harness.evaluate(&pairs).await.unwrap();

        assert_eq!(report.records.len(), 25);
        for (position, record) in report.records.iter().enumerate() {
            assert_eq!(record.index, position);
            assert_eq!(record.question, format!("question {position}"));
        }
    }

    #[tokio::test]
    async fn best_effort_isolates_a_failing_unit() {
        let harness = EvaluationHarness::new(
            EchoPipeline,
            FlakyJudge {
                fail_marker: "broken".to_string(),
            },
            EvalConfig::default(),
        )
        .unwrap();

        let pairs = vec![
            pair("fine one", "x"),
            pair("broken question", "x"),
            pair("fine two", "x"),
        ];

        let report = harness.evaluate(&pairs).await.unwrap();

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.score, Some(2.0 / 3.0));

        let failed = &report.records[1];
        assert!(!failed.is_correct);
        assert!(failed
            .reasoning
            .as_deref()
            .is_some_and(|reason| reason.contains("simulated judge outage")));
        assert!(report.records[0].is_correct);
        assert!(report.records[2].is_correct);
    }

    #[tokio::test]
    async fn fail_fast_aborts_the_run_on_first_failure() {
        let harness = EvaluationHarness::new(
            EchoPipeline,
            FlakyJudge {
                fail_marker: "broken".to_string(),
            },
            EvalConfig {
                policy: FailurePolicy::FailFast,
                ..EvalConfig::default()
            },
        )
        .unwrap();

        let pairs = vec![pair("fine", "x"), pair("broken", "x"), pair("fine", "x")];

        let result = harness.evaluate(&pairs).await;
        match result {
            Err(EvalError::Aborted { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("simulated judge outage"));
            }
            other => panic!("expected Aborted error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_an_evaluate_call_cancels_in_flight_units() {
        let completed = Arc::new(AtomicUsize::new(0));
        let harness = EvaluationHarness::new(
            CountingSlowPipeline {
                completed: Arc::clone(&completed),
            },
            ContainsJudge,
            EvalConfig::default(),
        )
        .unwrap();

        let pairs: Vec<_> = (0..5).map(|number| pair(&format!("q {number}"), "x")).collect();

        // timeout takes the future by value and drops it when the deadline
        // elapses, which drops the JoinSet and aborts every spawned unit.
        let elapsed = tokio::time::timeout(Duration::from_millis(50), harness.evaluate(&pairs))
            .await
            .is_err();
        assert!(elapsed, "units sleep 200ms, the call cannot finish in 50ms");

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let result = EvaluationHarness::new(
            EchoPipeline,
            ContainsJudge,
            EvalConfig {
                max_concurrency: 0,
                ..EvalConfig::default()
            },
        );
        assert!(matches!(result, Err(EvalError::InvalidConfiguration(_))));
    }
}

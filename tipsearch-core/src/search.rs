//! AI search pipeline — question in, audited rows out.
//!
//! One request flows Received → PromptBuilt → Generated → Validated →
//! Executed → ResponseAssembled. Nothing is retried and no state crosses
//! requests; the generator and executor are injected so the surrounding
//! service owns their lifecycle and tests can substitute fakes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TipsearchError;
use crate::execute::QueryExecutor;
use crate::generate::SqlGenerator;
use crate::prompt;

/// Assembled result of one search request. `query_interpreted` is exactly
/// the statement that ran, surfaced for operator auditability.
#[derive(Debug, Serialize)]
pub struct SearchOutcome {
    pub query_interpreted: String,
    pub total: usize,
    pub results: Vec<Map<String, Value>>,
}

/// Run one natural-language search.
///
/// The executed statement is character-identical to the normalized model
/// completion: the gate approves or rejects, it never rewrites.
pub async fn run_search(
    question: &str,
    generator: &dyn SqlGenerator,
    executor: &dyn QueryExecutor,
) -> Result<SearchOutcome, TipsearchError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(TipsearchError::Validation(
            "Missing 'query' field".to_string(),
        ));
    }

    let prompt = prompt::build_prompt(question);

    let sql = generator
        .generate(&prompt)
        .await
        .map_err(|e| TipsearchError::GenerationUnavailable(e.to_string()))?;

    crate::gate::approve(&sql)?;

    tracing::info!(model = generator.model_id(), sql = %sql, "executing generated statement");

    let results = executor.fetch(&sql).await?;

    Ok(SearchOutcome {
        query_interpreted: sql,
        total: results.len(),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::GenerationError;
    use crate::prompt::Prompt;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Generator returning a canned completion (or a simulated outage).
    struct StubGenerator {
        completion: Option<String>,
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn returning(completion: &str) -> Self {
            Self {
                completion: Some(completion.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                completion: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SqlGenerator for StubGenerator {
        async fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.completion {
                Some(text) => Ok(crate::generate::strip_code_fences(text)),
                None => Err(GenerationError::Api {
                    code: 500,
                    message: "simulated outage".to_string(),
                }),
            }
        }

        fn model_id(&self) -> &str {
            "stub"
        }
    }

    /// Executor spy — records every statement it receives.
    struct SpyExecutor {
        rows: Vec<Map<String, Value>>,
        executed: Mutex<Vec<String>>,
    }

    impl SpyExecutor {
        fn with_rows(rows: Vec<Map<String, Value>>) -> Self {
            Self {
                rows,
                executed: Mutex::new(Vec::new()),
            }
        }

        fn empty() -> Self {
            Self::with_rows(Vec::new())
        }

        fn call_count(&self) -> usize {
            self.executed.lock().unwrap().len()
        }

        fn executed_sql(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for SpyExecutor {
        async fn fetch(&self, sql: &str) -> Result<Vec<Map<String, Value>>, TipsearchError> {
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(self.rows.clone())
        }
    }

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn executes_generated_select_verbatim() {
        let sql = "SELECT * FROM tip_reports WHERE country = 'IRAN' ORDER BY created_on DESC;";
        let generator = StubGenerator::returning(sql);
        let executor = SpyExecutor::with_rows(vec![row(&[
            ("country", Value::String("IRAN".to_string())),
            ("title", Value::String("161805ZDEC25_IRAN_Tehran_A0031".to_string())),
        ])]);

        let outcome = run_search("reports from Iran", &generator, &executor)
            .await
            .expect("search should succeed");

        assert_eq!(outcome.query_interpreted, sql);
        assert_eq!(executor.executed_sql(), vec![sql.to_string()]);
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.total, outcome.results.len());
    }

    #[tokio::test]
    async fn fence_wrapped_completion_executes_stripped() {
        let generator = StubGenerator::returning("```sql\nSELECT * FROM tip_reports;\n```");
        let executor = SpyExecutor::empty();

        let outcome = run_search("everything", &generator, &executor)
            .await
            .expect("search should succeed");

        assert_eq!(outcome.query_interpreted, "SELECT * FROM tip_reports;");
        assert_eq!(executor.executed_sql(), vec!["SELECT * FROM tip_reports;".to_string()]);
    }

    #[tokio::test]
    async fn empty_result_set_is_success() {
        let generator =
            StubGenerator::returning("SELECT * FROM tip_reports WHERE country = 'NARNIA';");
        let executor = SpyExecutor::empty();

        let outcome = run_search("reports from narnia", &generator, &executor)
            .await
            .expect("empty results are not an error");

        assert_eq!(outcome.total, 0);
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn delete_completion_is_rejected_before_execution() {
        let generator = StubGenerator::returning("DELETE FROM tip_reports;");
        let executor = SpyExecutor::empty();

        let result = run_search("wipe the table", &generator, &executor).await;

        assert!(matches!(result, Err(TipsearchError::UnsafeQuery(_))));
        assert_eq!(executor.call_count(), 0, "gate rejection must stop execution");
    }

    #[tokio::test]
    async fn chained_statement_is_rejected_before_execution() {
        let generator =
            StubGenerator::returning("SELECT * FROM tip_reports; DROP TABLE tip_reports;");
        let executor = SpyExecutor::empty();

        let result = run_search("anything", &generator, &executor).await;

        assert!(matches!(result, Err(TipsearchError::UnsafeQuery(_))));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_question_fails_validation_without_calls() {
        let generator = StubGenerator::returning("SELECT 1;");
        let executor = SpyExecutor::empty();

        let result = run_search("   ", &generator, &executor).await;

        assert!(matches!(result, Err(TipsearchError::Validation(_))));
        assert_eq!(generator.call_count(), 0, "no generation for invalid input");
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn generation_outage_surfaces_without_execution() {
        let generator = StubGenerator::failing();
        let executor = SpyExecutor::empty();

        let result = run_search("reports from Iraq", &generator, &executor).await;

        assert!(matches!(result, Err(TipsearchError::GenerationUnavailable(_))));
        assert_eq!(executor.call_count(), 0);
    }
}

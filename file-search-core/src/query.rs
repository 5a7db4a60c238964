//! Query workflow: ask questions against a store with retrieval-augmented generation.

use tracing::{error, info};

use crate::contract::{FileSearchApi, QueryAnswer, Store};
use crate::error::Result;

/// Questions asked when none are given, matching the bundled Republic Day sample data.
pub const DEFAULT_QUESTIONS: [&str; 4] = [
    "When did India become a republic?",
    "Who was the first President of India?",
    "What are the key features of the Republic Day parade?",
    "What values does Republic Day celebrate?",
];

pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub question: String,
    pub answer: QueryAnswer,
}

#[derive(Debug)]
pub enum QueryProgress<'a> {
    Asking {
        index: usize,
        total: usize,
        question: &'a str,
    },
    Answered(&'a QueryOutcome),
}

/// Answer one question using only `store` for retrieval.
///
/// An answer without grounding chunks (e.g. an empty store) is not an error.
pub async fn query_store<A>(api: &A, model: &str, store: &Store, question: &str) -> Result<QueryAnswer>
where
    A: FileSearchApi + ?Sized,
{
    info!(store = %store.name, model, question, "Querying store");
    match api.query(model, &store.name, question).await {
        Ok(answer) => {
            info!(
                store = %store.name,
                chunks = answer.chunk_count(),
                answer_len = answer.text.len(),
                "Query answered"
            );
            Ok(answer)
        }
        Err(e) => {
            error!(store = %store.name, question, error = ?e, "Query failed");
            Err(e)
        }
    }
}

/// Ask every question in order; the first failure aborts the rest.
pub async fn run_queries<A, F>(
    api: &A,
    model: &str,
    store: &Store,
    questions: &[String],
    mut on_progress: F,
) -> Result<Vec<QueryOutcome>>
where
    A: FileSearchApi + ?Sized,
    F: FnMut(QueryProgress<'_>),
{
    let total = questions.len();
    let mut outcomes = Vec::with_capacity(total);
    for (index, question) in questions.iter().enumerate() {
        on_progress(QueryProgress::Asking {
            index,
            total,
            question: question.as_str(),
        });
        let answer = query_store(api, model, store, question).await?;
        let outcome = QueryOutcome {
            question: question.clone(),
            answer,
        };
        on_progress(QueryProgress::Answered(&outcome));
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

//! Response and schema storage behind an async trait, so the in-memory
//! collaborator can later be swapped for a database-backed one.

use async_trait::async_trait;
use scorecard::{Question, Response};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no question schema registered for form: {0}")]
    UnknownForm(String),
}

/// Storage seam between the event bridge and whatever holds submitted
/// responses. Reads return snapshots; the store owns its own locking.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Insert a response, replacing any stored response with the same id.
    async fn upsert_response(&self, response: Response) -> Result<(), StoreError>;

    /// Every stored response for a form, ordered by submission time.
    /// Unknown forms yield an empty list.
    async fn responses_for_form(&self, form_id: &str) -> Result<Vec<Response>, StoreError>;

    /// Register (or replace) the question schema for a form.
    async fn put_questions(&self, form_id: &str, questions: Vec<Question>)
        -> Result<(), StoreError>;

    /// Question schema for a form. Responses cannot be scored before their
    /// schema arrives, so an unregistered form is an error here.
    async fn questions_for_form(&self, form_id: &str) -> Result<Vec<Question>, StoreError>;
}

/// In-memory storage backend keyed by form id.
#[derive(Clone)]
pub struct MemoryResponseStore {
    responses: Arc<RwLock<HashMap<String, Vec<Response>>>>,
    questions: Arc<RwLock<HashMap<String, Vec<Question>>>>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            questions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn upsert_response(&self, response: Response) -> Result<(), StoreError> {
        let mut responses = self.responses.write().await;
        let entries = responses.entry(response.form_id.clone()).or_default();
        if let Some(existing) = entries.iter_mut().find(|stored| stored.id == response.id) {
            debug!(
                response_id = %response.id,
                form_id = %response.form_id,
                "replacing stored response"
            );
            *existing = response;
        } else {
            entries.push(response);
        }
        Ok(())
    }

    async fn responses_for_form(&self, form_id: &str) -> Result<Vec<Response>, StoreError> {
        let responses = self.responses.read().await;
        let mut entries = responses.get(form_id).cloned().unwrap_or_default();
        entries.sort_by_key(|response| response.submitted_at);
        Ok(entries)
    }

    async fn put_questions(
        &self,
        form_id: &str,
        questions: Vec<Question>,
    ) -> Result<(), StoreError> {
        let mut schemas = self.questions.write().await;
        debug!(form_id = %form_id, count = questions.len(), "storing question schema");
        schemas.insert(form_id.to_string(), questions);
        Ok(())
    }

    async fn questions_for_form(&self, form_id: &str) -> Result<Vec<Question>, StoreError> {
        let schemas = self.questions.read().await;
        match schemas.get(form_id) {
            Some(questions) => Ok(questions.clone()),
            None => {
                warn!(form_id = %form_id, "no question schema registered");
                Err(StoreError::UnknownForm(form_id.to_string()))
            }
        }
    }
}

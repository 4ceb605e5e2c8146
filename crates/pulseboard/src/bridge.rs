//! Live rescoring bridge between the distributor and the scoring engine.
//!
//! Incoming `form_response` events are stored, the affected form is fully
//! re-aggregated, and the refreshed `score_update` / `analytics_update`
//! reports are pushed back out through the same distributor. `new_form`
//! events register the question schema a form must have before its
//! responses can be scored.

use std::sync::Arc;

use livewire::{event_types, DistributionEvent, RealTimeDistributor};
use scorecard::{Question, Response, ScoreAggregator, ScoreReport};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::store::ResponseStore;

pub struct ScoreBridge {
    store: Arc<dyn ResponseStore>,
    aggregator: Arc<ScoreAggregator>,
    distributor: RealTimeDistributor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewFormPayload {
    form_id: String,
    #[serde(default)]
    questions: Vec<Question>,
}

impl ScoreBridge {
    pub fn new(
        store: Arc<dyn ResponseStore>,
        aggregator: Arc<ScoreAggregator>,
        distributor: RealTimeDistributor,
    ) -> Self {
        Self {
            store,
            aggregator,
            distributor,
        }
    }

    /// Registers the bridge's event subscriptions. Call once; the callbacks
    /// stay active until the distributor disconnects.
    pub fn attach(&self) {
        let store = Arc::clone(&self.store);
        let aggregator = Arc::clone(&self.aggregator);
        let distributor = self.distributor.clone();
        self.distributor.subscribe(
            event_types::FORM_RESPONSE,
            move |event: &DistributionEvent| {
                let store = Arc::clone(&store);
                let aggregator = Arc::clone(&aggregator);
                let distributor = distributor.clone();
                let payload = event.payload.clone();
                // Callbacks run on the dispatcher task, so the storage and
                // scoring work moves to its own task.
                tokio::spawn(apply_form_response(store, aggregator, distributor, payload));
            },
        );

        let store = Arc::clone(&self.store);
        self.distributor
            .subscribe(event_types::NEW_FORM, move |event: &DistributionEvent| {
                let store = Arc::clone(&store);
                let payload = event.payload.clone();
                tokio::spawn(apply_new_form(store, payload));
            });

        info!("score bridge attached to distributor");
    }
}

async fn apply_form_response(
    store: Arc<dyn ResponseStore>,
    aggregator: Arc<ScoreAggregator>,
    distributor: RealTimeDistributor,
    payload: Value,
) {
    let response: Response = match serde_json::from_value(payload) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "dropping malformed form_response payload");
            return;
        }
    };

    let form_id = response.form_id.clone();
    debug!(form_id = %form_id, response_id = %response.id, "storing incoming response");
    if let Err(e) = store.upsert_response(response).await {
        warn!(form_id = %form_id, error = %e, "failed to store response");
        return;
    }

    // A response arriving ahead of its schema stays stored; scoring resumes
    // once new_form registers the questions.
    let questions = match store.questions_for_form(&form_id).await {
        Ok(questions) => questions,
        Err(e) => {
            warn!(form_id = %form_id, error = %e, "rescore skipped");
            return;
        }
    };
    let responses = match store.responses_for_form(&form_id).await {
        Ok(responses) => responses,
        Err(e) => {
            warn!(form_id = %form_id, error = %e, "rescore skipped");
            return;
        }
    };

    let report = aggregator.aggregate(&responses, &questions);
    publish_report(&distributor, &form_id, report).await;
}

async fn apply_new_form(store: Arc<dyn ResponseStore>, payload: Value) {
    let NewFormPayload { form_id, questions } = match serde_json::from_value(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "dropping malformed new_form payload");
            return;
        }
    };

    info!(form_id = %form_id, questions = questions.len(), "registering form schema");
    if let Err(e) = store.put_questions(&form_id, questions).await {
        warn!(form_id = %form_id, error = %e, "failed to store schema");
    }
}

async fn publish_report(distributor: &RealTimeDistributor, form_id: &str, report: ScoreReport) {
    info!(
        form_id = %form_id,
        overall_score = report.aggregate.overall_score,
        total_responses = report.aggregate.total_responses,
        "publishing refreshed scores"
    );

    let score_sent = distributor
        .send(
            event_types::SCORE_UPDATE,
            json!({
                "formId": form_id,
                "aggregateScore": report.aggregate,
                "overallAverageScore": report.overall_average,
            }),
        )
        .await;
    let analytics_sent = distributor
        .send(
            event_types::ANALYTICS_UPDATE,
            json!({
                "formId": form_id,
                "breakdown": report.breakdown,
            }),
        )
        .await;

    if !score_sent || !analytics_sent {
        debug!(form_id = %form_id, "distributor offline, refreshed scores not pushed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryResponseStore;
    use async_trait::async_trait;
    use livewire::{
        LiveWireConfig, PollTransport, PushEvent, PushSink, PushStream, PushTransport,
        TransportError,
    };
    use pretty_assertions::assert_eq;
    use scorecard::{Lexicon, QuestionKind, ScoringConfig};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    const SETTLE_MS: u64 = 100;

    fn envelope(event_type: &str, payload: Value) -> String {
        json!({
            "type": event_type,
            "payload": payload,
            "timestamp": "2024-05-01T09:00:00Z"
        })
        .to_string()
    }

    fn response_payload(id: &str, form_id: &str, answers: Value) -> Value {
        json!({
            "id": id,
            "formId": form_id,
            "submittedAt": "2024-05-01T09:00:00Z",
            "answers": answers
        })
    }

    // ------------------------------------------------------------------
    // Transport doubles
    // ------------------------------------------------------------------

    struct TestPush {
        sent: Arc<Mutex<Vec<String>>>,
        stream: Mutex<Option<mpsc::UnboundedReceiver<Result<PushEvent, TransportError>>>>,
    }

    impl TestPush {
        fn new() -> (
            Arc<Self>,
            mpsc::UnboundedSender<Result<PushEvent, TransportError>>,
        ) {
            let (tx, rx) = mpsc::unbounded_channel();
            let push = Arc::new(Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                stream: Mutex::new(Some(rx)),
            });
            (push, tx)
        }

        fn sent_events(&self) -> Vec<DistributionEvent> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|frame| serde_json::from_str(frame).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl PushTransport for TestPush {
        async fn connect(
            &self,
            _token: &str,
        ) -> Result<(Box<dyn PushSink>, Box<dyn PushStream>), TransportError> {
            let rx = self
                .stream
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| TransportError::Connect("single connect only".to_string()))?;
            Ok((
                Box::new(TestSink {
                    sent: Arc::clone(&self.sent),
                }),
                Box::new(TestStream { rx }),
            ))
        }
    }

    struct TestSink {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PushSink for TestSink {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        async fn close(&mut self, _code: u16) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct TestStream {
        rx: mpsc::UnboundedReceiver<Result<PushEvent, TransportError>>,
    }

    #[async_trait]
    impl PushStream for TestStream {
        async fn next_event(&mut self) -> Option<Result<PushEvent, TransportError>> {
            self.rx.recv().await
        }
    }

    struct NullPoll;

    #[async_trait]
    impl PollTransport for NullPoll {
        async fn poll(&self, _token: &str) -> Result<String, TransportError> {
            Ok("[]".to_string())
        }

        async fn request_update(&self, _token: &str, _body: Value) -> Result<String, TransportError> {
            Ok("[]".to_string())
        }
    }

    struct Harness {
        store: MemoryResponseStore,
        push: Arc<TestPush>,
        server_tx: mpsc::UnboundedSender<Result<PushEvent, TransportError>>,
        distributor: RealTimeDistributor,
    }

    async fn connected_bridge() -> Harness {
        let (push, server_tx) = TestPush::new();
        let store = MemoryResponseStore::new();
        let aggregator = Arc::new(ScoreAggregator::new(
            ScoringConfig::default(),
            &Lexicon::default(),
        ));
        let distributor =
            RealTimeDistributor::new(LiveWireConfig::default(), push.clone(), Arc::new(NullPoll));
        let bridge = ScoreBridge::new(
            Arc::new(store.clone()),
            aggregator,
            distributor.clone(),
        );
        bridge.attach();
        distributor.initialize("").await;

        Harness {
            store,
            push,
            server_tx,
            distributor,
        }
    }

    #[tokio::test]
    async fn test_form_response_triggers_score_and_analytics_updates() {
        let harness = connected_bridge().await;
        let questions: Vec<Question> = (1..=4)
            .map(|i| Question::new(format!("q{i}"), QuestionKind::Rating))
            .collect();
        harness
            .store
            .put_questions("form-1", questions)
            .await
            .unwrap();

        let answers = json!([
            { "questionId": "q1", "value": 5 },
            { "questionId": "q2", "value": 1 },
            { "questionId": "q3", "value": 5 },
            { "questionId": "q4", "value": 1 }
        ]);
        harness
            .server_tx
            .send(Ok(PushEvent::Text(envelope(
                event_types::FORM_RESPONSE,
                response_payload("r1", "form-1", answers),
            ))))
            .unwrap();
        sleep(Duration::from_millis(SETTLE_MS)).await;

        let published = harness.push.sent_events();
        assert_eq!(published.len(), 2);

        let score = &published[0];
        assert_eq!(score.event_type, event_types::SCORE_UPDATE);
        assert_eq!(score.payload["formId"], "form-1");
        assert_eq!(score.payload["overallAverageScore"], 2.5);
        assert_eq!(score.payload["aggregateScore"]["overallScore"], 50);
        assert_eq!(score.payload["aggregateScore"]["totalResponses"], 1);
        assert_eq!(score.payload["aggregateScore"]["confidence"], 10);

        let analytics = &published[1];
        assert_eq!(analytics.event_type, event_types::ANALYTICS_UPDATE);
        assert_eq!(analytics.payload["formId"], "form-1");
        let rating_stats = &analytics.payload["breakdown"]["byQuestionType"]["rating"];
        assert_eq!(rating_stats["count"], 4);
        assert_eq!(rating_stats["average"], 2.5);

        harness.distributor.disconnect().await;
    }

    #[tokio::test]
    async fn test_responses_ahead_of_schema_score_once_it_arrives() {
        let harness = connected_bridge().await;

        // No schema yet, so the first response is stored but not scored.
        harness
            .server_tx
            .send(Ok(PushEvent::Text(envelope(
                event_types::FORM_RESPONSE,
                response_payload("r1", "form-1", json!([{ "questionId": "q1", "value": 4 }])),
            ))))
            .unwrap();
        sleep(Duration::from_millis(SETTLE_MS)).await;
        assert!(harness.push.sent_events().is_empty());

        harness
            .server_tx
            .send(Ok(PushEvent::Text(envelope(
                event_types::NEW_FORM,
                json!({
                    "formId": "form-1",
                    "questions": [{ "id": "q1", "type": "rating" }]
                }),
            ))))
            .unwrap();
        sleep(Duration::from_millis(SETTLE_MS)).await;

        harness
            .server_tx
            .send(Ok(PushEvent::Text(envelope(
                event_types::FORM_RESPONSE,
                response_payload("r2", "form-1", json!([{ "questionId": "q1", "value": 2 }])),
            ))))
            .unwrap();
        sleep(Duration::from_millis(SETTLE_MS)).await;

        // The rescore covers the early response too.
        let published = harness.push.sent_events();
        assert_eq!(published.len(), 2);
        assert_eq!(
            published[0].payload["aggregateScore"]["totalResponses"],
            2
        );
        assert_eq!(published[0].payload["overallAverageScore"], 2.5);

        harness.distributor.disconnect().await;
    }

    #[tokio::test]
    async fn test_malformed_and_unrelated_events_are_ignored() {
        let harness = connected_bridge().await;
        harness
            .store
            .put_questions(
                "form-1",
                vec![Question::new("q1", QuestionKind::Rating)],
            )
            .await
            .unwrap();

        // A form_response payload that is not a response record.
        harness
            .server_tx
            .send(Ok(PushEvent::Text(envelope(
                event_types::FORM_RESPONSE,
                json!("not a response"),
            ))))
            .unwrap();
        // An inbound score_update must not feed back through the bridge.
        harness
            .server_tx
            .send(Ok(PushEvent::Text(envelope(
                event_types::SCORE_UPDATE,
                json!({ "formId": "form-1" }),
            ))))
            .unwrap();
        sleep(Duration::from_millis(SETTLE_MS)).await;
        assert!(harness.push.sent_events().is_empty());

        harness
            .server_tx
            .send(Ok(PushEvent::Text(envelope(
                event_types::FORM_RESPONSE,
                response_payload("r1", "form-1", json!([{ "questionId": "q1", "value": 3 }])),
            ))))
            .unwrap();
        sleep(Duration::from_millis(SETTLE_MS)).await;

        let published = harness.push.sent_events();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].event_type, event_types::SCORE_UPDATE);

        harness.distributor.disconnect().await;
    }
}

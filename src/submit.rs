use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::{TriageClassifier, CLASSIFY_DEADLINE};
use crate::debounce::{Debouncer, PREVIEW_DEBOUNCE};
use crate::error::SubmissionError;
use crate::heuristic::{KeywordClassifier, Preview, PreviewModel};
use crate::models::TriageResult;
use crate::notify::{NotificationKind, NotificationQueue};
use crate::validate::{normalize, validate, wants_preview};

pub const SUCCESS_NOTICE: &str = "Feedback analyzed successfully!";
pub const FAILURE_NOTICE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Validating,
    Submitting,
    Succeeded(TriageResult),
    Failed(String),
}

impl SubmissionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, SubmissionState::Validating | SubmissionState::Submitting)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another submission was still in flight.
    Ignored,
    Succeeded(TriageResult),
    Failed(String),
    /// The response arrived after a clear or teardown and was dropped.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Enter,
    Char(char),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub ctrl: bool,
    pub key: KeyCode,
}

impl KeyPress {
    pub fn ctrl_enter() -> Self {
        Self {
            ctrl: true,
            key: KeyCode::Enter,
        }
    }

    pub fn is_submit_chord(&self) -> bool {
        self.ctrl && self.key == KeyCode::Enter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PreviewSlot;

struct FormState {
    state: SubmissionState,
    preview: Option<Preview>,
    preview_generation: u64,
    generation: u64,
    in_flight: Option<CancellationToken>,
}

/// Drives one feedback form: the debounced local preview and the single
/// authoritative submission it may have in flight.
pub struct SubmissionController {
    classifier: Arc<dyn TriageClassifier>,
    preview_model: Arc<dyn PreviewModel>,
    notifications: NotificationQueue,
    form: Arc<Mutex<FormState>>,
    debouncer: Debouncer<PreviewSlot>,
    deadline: Duration,
    preview_delay: Duration,
}

impl SubmissionController {
    pub fn new(classifier: Arc<dyn TriageClassifier>, notifications: NotificationQueue) -> Self {
        Self {
            classifier,
            preview_model: Arc::new(KeywordClassifier::default()),
            notifications,
            form: Arc::new(Mutex::new(FormState {
                state: SubmissionState::Idle,
                preview: None,
                preview_generation: 0,
                generation: 0,
                in_flight: None,
            })),
            debouncer: Debouncer::new(),
            deadline: CLASSIFY_DEADLINE,
            preview_delay: PREVIEW_DEBOUNCE,
        }
    }

    pub fn with_preview_model(mut self, model: Arc<dyn PreviewModel>) -> Self {
        self.preview_model = model;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_preview_delay(mut self, delay: Duration) -> Self {
        self.preview_delay = delay;
        self
    }

    pub fn state(&self) -> SubmissionState {
        self.lock().state.clone()
    }

    pub fn preview(&self) -> Option<Preview> {
        self.lock().preview
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    /// Called on every edit of the input.
    pub fn on_input(&self, raw: &str) {
        let generation = {
            let mut form = self.lock();
            form.preview_generation += 1;
            form.preview_generation
        };

        if !wants_preview(raw) {
            self.debouncer.cancel(&PreviewSlot);
            self.lock().preview = None;
            return;
        }

        let text = normalize(raw);
        let form = Arc::clone(&self.form);
        let model = Arc::clone(&self.preview_model);
        self.debouncer.schedule(PreviewSlot, self.preview_delay, async move {
            let preview = model.classify_text(&text);
            let mut form = lock(&form);
            if form.preview_generation == generation && !form.state.is_busy() {
                debug!(category = %preview.category, urgency = %preview.urgency, "preview updated");
                form.preview = Some(preview);
            }
        });
    }

    /// Submits only for the submit chord, with non-blank input, while nothing
    /// is in flight.
    pub async fn on_key(&self, key: KeyPress, raw: &str) -> SubmitOutcome {
        if !key.is_submit_chord() || raw.trim().is_empty() || self.lock().state.is_busy() {
            return SubmitOutcome::Ignored;
        }
        self.submit(raw).await
    }

    pub async fn submit(&self, raw: &str) -> SubmitOutcome {
        let validated = {
            let mut form = self.lock();
            if form.state.is_busy() {
                debug!("submit ignored, a submission is already in flight");
                return SubmitOutcome::Ignored;
            }
            form.state = SubmissionState::Validating;
            form.preview = None;
            form.preview_generation += 1;
            self.debouncer.cancel(&PreviewSlot);

            match validate(raw) {
                Ok(text) => {
                    form.generation += 1;
                    let token = CancellationToken::new();
                    form.in_flight = Some(token.clone());
                    form.state = SubmissionState::Submitting;
                    Ok((text, form.generation, token))
                }
                Err(err) => {
                    let message = err.to_string();
                    form.state = SubmissionState::Failed(message.clone());
                    Err(message)
                }
            }
        };

        let (text, generation, token) = match validated {
            Ok(parts) => parts,
            Err(message) => {
                info!(%message, "feedback rejected before submission");
                self.notifications.push(FAILURE_NOTICE, NotificationKind::Error);
                return SubmitOutcome::Failed(message);
            }
        };

        debug!(generation, chars = text.char_count(), "submitting feedback");
        let call = tokio::time::timeout(self.deadline, self.classifier.classify(&text));
        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!(generation, "submission abandoned");
                return SubmitOutcome::Superseded;
            }
            result = call => match result {
                Ok(result) => result,
                Err(_) => Err(SubmissionError::TimeoutError),
            },
        };

        {
            let mut form = self.lock();
            if form.generation != generation || !matches!(form.state, SubmissionState::Submitting) {
                debug!(generation, "stale response discarded");
                return SubmitOutcome::Superseded;
            }
            form.in_flight = None;
            form.state = match &result {
                Ok(triage) => SubmissionState::Succeeded(triage.clone()),
                Err(err) => SubmissionState::Failed(err.to_string()),
            };
        }

        match result {
            Ok(triage) => {
                info!(category = %triage.category, urgency = %triage.urgency, "feedback triaged");
                self.notifications.push(SUCCESS_NOTICE, NotificationKind::Success);
                SubmitOutcome::Succeeded(triage)
            }
            Err(err) => {
                warn!(error = ?err, "feedback submission failed");
                self.notifications.push(FAILURE_NOTICE, NotificationKind::Error);
                SubmitOutcome::Failed(err.to_string())
            }
        }
    }

    /// Back to `Idle`. Drops the shown result or error, the preview, any
    /// pending preview timer and any response still on its way.
    pub fn clear(&self) {
        self.debouncer.cancel(&PreviewSlot);
        let mut form = self.lock();
        if let Some(token) = form.in_flight.take() {
            token.cancel();
        }
        form.generation += 1;
        form.preview_generation += 1;
        form.state = SubmissionState::Idle;
        form.preview = None;
    }

    pub fn shutdown(&self) {
        self.debouncer.cancel_all();
        self.clear();
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        lock(&self.form)
    }
}

impl Drop for SubmissionController {
    fn drop(&mut self) {
        if let Some(token) = lock(&self.form).in_flight.take() {
            token.cancel();
        }
    }
}

fn lock(form: &Mutex<FormState>) -> MutexGuard<'_, FormState> {
    form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, FeedbackText, UrgencyScore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::sleep;

    #[derive(Default)]
    struct FakeClassifier {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        delay: Option<Duration>,
        failure: Option<SubmissionError>,
    }

    #[async_trait]
    impl TriageClassifier for FakeClassifier {
        async fn classify(&self, text: &FeedbackText) -> Result<TriageResult, SubmissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(TriageResult {
                    feedback_text: text.clone(),
                    category: Category::BugReport,
                    urgency: UrgencyScore::new(4).unwrap(),
                }),
            }
        }
    }

    fn controller(fake: FakeClassifier) -> (Arc<FakeClassifier>, SubmissionController) {
        let fake = Arc::new(fake);
        let controller = SubmissionController::new(fake.clone(), NotificationQueue::new());
        (fake, controller)
    }

    fn kinds(controller: &SubmissionController) -> Vec<NotificationKind> {
        controller
            .notifications()
            .snapshot()
            .into_iter()
            .map(|n| n.kind)
            .collect()
    }

    async fn wait_for_submitting(controller: &SubmissionController) {
        while controller.state() != SubmissionState::Submitting {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn success_enqueues_one_success_notification() {
        let (fake, controller) = controller(FakeClassifier::default());

        let outcome = controller.submit("The app crashed on login").await;

        let SubmitOutcome::Succeeded(result) = outcome else {
            panic!("expected success");
        };
        assert_eq!(result.feedback_text.as_str(), "The app crashed on login");
        assert_eq!(controller.state(), SubmissionState::Succeeded(result));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        assert_eq!(kinds(&controller), vec![NotificationKind::Success]);
    }

    #[tokio::test]
    async fn submit_while_submitting_is_a_no_op() {
        let gate = Arc::new(Notify::new());
        let (fake, controller) = controller(FakeClassifier {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let controller = Arc::new(controller);

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.submit("Please add dark mode").await }
        });
        wait_for_submitting(&controller).await;

        assert_eq!(controller.submit("Please add dark mode").await, SubmitOutcome::Ignored);
        assert_eq!(
            controller.on_key(KeyPress::ctrl_enter(), "Please add dark mode").await,
            SubmitOutcome::Ignored
        );

        gate.notify_one();
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn network_error_mentions_connectivity() {
        let (_, controller) = controller(FakeClassifier {
            failure: Some(SubmissionError::NetworkError),
            ..Default::default()
        });

        let outcome = controller.submit("The app crashed on login").await;

        let SubmissionState::Failed(message) = controller.state() else {
            panic!("expected failure");
        };
        assert!(message.contains("connection"));
        assert_eq!(outcome, SubmitOutcome::Failed(message));
        assert_eq!(kinds(&controller), vec![NotificationKind::Error]);
    }

    #[tokio::test]
    async fn server_error_message_is_shown_verbatim() {
        let (_, controller) = controller(FakeClassifier {
            failure: Some(SubmissionError::server(Some("Rate limit exceeded".into()))),
            ..Default::default()
        });

        controller.submit("The app crashed on login").await;

        assert_eq!(
            controller.state(),
            SubmissionState::Failed("Rate limit exceeded".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_after_deadline() {
        let (fake, controller) = controller(FakeClassifier {
            delay: Some(Duration::from_secs(40)),
            ..Default::default()
        });

        let outcome = controller.submit("The app crashed on login").await;

        assert_eq!(
            outcome,
            SubmitOutcome::Failed(SubmissionError::TimeoutError.to_string())
        );
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_never_calls_backend() {
        let (fake, controller) = controller(FakeClassifier::default());

        let outcome = controller.submit("   ").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed("Please enter some feedback text".to_string())
        );
        let outcome = controller.submit(&"x".repeat(1001)).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed("Feedback text must be 1000 characters or less".to_string())
        );

        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert_eq!(kinds(&controller), vec![NotificationKind::Error, NotificationKind::Error]);
    }

    #[tokio::test]
    async fn settled_states_accept_the_next_submit() {
        let (fake, controller) = controller(FakeClassifier::default());

        controller.submit("hi").await;
        assert!(matches!(controller.state(), SubmissionState::Failed(_)));

        let outcome = controller.submit("The app crashed on login").await;
        assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
        let outcome = controller.submit("The app crashed again").await;
        assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_discards_in_flight_response() {
        let gate = Arc::new(Notify::new());
        let (_, controller) = controller(FakeClassifier {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let controller = Arc::new(controller);

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.submit("Please add dark mode").await }
        });
        wait_for_submitting(&controller).await;

        controller.clear();
        gate.notify_one();

        assert_eq!(first.await.unwrap(), SubmitOutcome::Superseded);
        assert_eq!(controller.state(), SubmissionState::Idle);
        assert!(controller.notifications().is_empty());
    }

    #[tokio::test]
    async fn shortcut_requires_chord_and_text() {
        let (fake, controller) = controller(FakeClassifier::default());

        let plain_enter = KeyPress {
            ctrl: false,
            key: KeyCode::Enter,
        };
        assert_eq!(
            controller.on_key(plain_enter, "Please add dark mode").await,
            SubmitOutcome::Ignored
        );
        assert_eq!(
            controller.on_key(KeyPress::ctrl_enter(), "   ").await,
            SubmitOutcome::Ignored
        );
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);

        let outcome = controller
            .on_key(KeyPress::ctrl_enter(), "Please add dark mode")
            .await;
        assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn preview_appears_after_quiet_period() {
        let (_, controller) = controller(FakeClassifier::default());

        controller.on_input("The app keeps crash");
        controller.on_input("The app keeps crashing on login");
        sleep(Duration::from_millis(500)).await;
        assert_eq!(controller.preview(), None);

        sleep(Duration::from_millis(600)).await;
        let preview = controller.preview().unwrap();
        assert_eq!(preview.category, Category::BugReport);
        assert_eq!(preview.urgency.value(), 4);

        controller.on_input("short");
        assert_eq!(controller.preview(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_and_clear_cancel_pending_preview() {
        let (_, controller) = controller(FakeClassifier::default());

        controller.on_input("I would love a new export feature");
        controller.submit("I would love a new export feature").await;
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(controller.preview(), None);

        controller.on_input("I would love a new export feature");
        controller.clear();
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(controller.preview(), None);
        assert_eq!(controller.state(), SubmissionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn over_long_input_still_gets_a_preview() {
        let (_, controller) = controller(FakeClassifier::default());

        controller.on_input(&format!("The app crashed {}", "x".repeat(1000)));
        sleep(Duration::from_millis(1100)).await;

        let preview = controller.preview().unwrap();
        assert_eq!(preview.category, Category::BugReport);
        assert_eq!(preview.urgency.value(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_submission_and_pending_preview() {
        let gate = Arc::new(Notify::new());
        let (fake, controller) = controller(FakeClassifier {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let controller = Arc::new(controller);

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.submit("Please add dark mode").await }
        });
        wait_for_submitting(&controller).await;
        controller.on_input("Please add dark mode and a bigger font");

        controller.shutdown();

        assert_eq!(first.await.unwrap(), SubmitOutcome::Superseded);
        sleep(Duration::from_millis(1500)).await;
        gate.notify_one();
        assert_eq!(controller.preview(), None);
        assert_eq!(controller.state(), SubmissionState::Idle);
        assert!(controller.notifications().is_empty());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    struct BlockingModel {
        entered: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl PreviewModel for BlockingModel {
        fn classify_text(&self, text: &str) -> Preview {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            KeywordClassifier::default().classify_text(text)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn clear_wins_over_a_preview_already_computing() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let model = BlockingModel {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let (_, controller) = controller(FakeClassifier::default());
        let controller = controller
            .with_preview_model(Arc::new(model))
            .with_preview_delay(Duration::from_millis(10));

        controller.on_input("The app crashed on login again");
        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .unwrap()
            .unwrap();

        controller.clear();
        release_tx.send(()).unwrap();
        sleep(Duration::from_millis(100)).await;

        assert_eq!(controller.preview(), None);
    }
}

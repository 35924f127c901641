use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};

use store_setup_api::{ApiError, CreateStoreRequest, StoreApi};
use store_setup_core::{
    availability_error, validate_domain_format, validate_field, DomainCheckOutcome, DomainStatus,
    DraftPatch, Field, FieldErrors, NewStore, StoreDraft,
};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Store created successfully!";
pub const FALLBACK_ERROR_MESSAGE: &str = "Error creating store";

const SUBMIT_LABEL: &str = "Create store";
const SUBMITTING_LABEL: &str = "Creating...";

/// Colour of a piece of feedback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub tone: Tone,
    pub text: String,
}

impl Feedback {
    fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

/// Everything the page needs to render the form at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormView {
    pub version: u64,
    pub draft: StoreDraft,
    pub errors: FieldErrors,
    pub domain_status: DomainStatus,
    pub domain_checking: bool,
    /// Line shown under the domain input.
    pub domain_hint: Option<Feedback>,
    pub is_submitting: bool,
    pub submit_label: &'static str,
    /// Banner next to the submit button.
    pub message: Option<Feedback>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    InProgress,
    #[error("form has invalid fields: {0}")]
    Invalid(FieldErrors),
    #[error("store creation failed: {0}")]
    Api(#[from] ApiError),
}

#[derive(Debug)]
struct FormState {
    draft: StoreDraft,
    errors: FieldErrors,
    domain_status: DomainStatus,
    is_submitting: bool,
    submit_attempted: bool,
    message: Option<Feedback>,
    version: u64,
    touched_at: Instant,
}

impl FormState {
    fn new() -> Self {
        Self {
            draft: StoreDraft::default(),
            errors: FieldErrors::new(),
            domain_status: DomainStatus::Unknown,
            is_submitting: false,
            submit_attempted: false,
            message: None,
            version: 0,
            touched_at: Instant::now(),
        }
    }

    fn view(&self) -> FormView {
        FormView {
            version: self.version,
            draft: self.draft.clone(),
            errors: self.errors.clone(),
            domain_status: self.domain_status,
            domain_checking: self.domain_status.is_checking(),
            domain_hint: self.domain_hint(),
            is_submitting: self.is_submitting,
            submit_label: if self.is_submitting {
                SUBMITTING_LABEL
            } else {
                SUBMIT_LABEL
            },
            message: self.message.clone(),
        }
    }

    // In-flight checks win over field errors, which win over the last result.
    fn domain_hint(&self) -> Option<Feedback> {
        if self.domain_status.is_checking() {
            return self
                .domain_status
                .status_text()
                .map(|text| Feedback::new(Tone::Info, text));
        }
        if let Some(error) = self.errors.get(Field::Domain) {
            return Some(Feedback::new(Tone::Error, error));
        }
        let tone = match self.domain_status {
            DomainStatus::Available => Tone::Success,
            _ => Tone::Error,
        };
        self.domain_status
            .status_text()
            .map(|text| Feedback::new(tone, text))
    }
}

struct Shared {
    state: Mutex<FormState>,
    views: watch::Sender<FormView>,
    api: Arc<dyn StoreApi>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut FormState) {
        state.version += 1;
        state.touched_at = Instant::now();
        self.views.send_replace(state.view());
    }

    async fn check_availability(&self, domain: &str) -> DomainCheckOutcome {
        let started = Instant::now();
        let outcome = match self.api.check_domain(domain).await {
            Ok(check) => DomainCheckOutcome::from_taken(check.taken),
            Err(err) => {
                warn!(stage = "domain_check", %domain, error = %err, "domain availability check failed");
                DomainCheckOutcome::Failed
            }
        };
        histogram!("api_request_seconds", "endpoint" => "domain_check")
            .record(started.elapsed().as_secs_f64());
        counter!("domain_checks_total", "result" => outcome.as_str()).increment(1);
        outcome
    }

    /// Runs one debounced check for `domain` and folds the answer into the form.
    async fn refresh_domain_status(&self, domain: String) {
        {
            let mut state = self.lock();
            if state.draft.domain != domain {
                return;
            }
            if validate_domain_format(&domain).is_err() {
                if state.domain_status != DomainStatus::Unknown {
                    state.domain_status.reset();
                    self.publish(&mut state);
                }
                return;
            }
            state.domain_status.begin_check();
            self.publish(&mut state);
        }

        let outcome = self.check_availability(&domain).await;

        let mut state = self.lock();
        if state.draft.domain != domain {
            debug!(stage = "domain_check", %domain, "discarding result for superseded value");
            return;
        }
        state.domain_status.resolve(outcome);
        match availability_error(outcome) {
            Some(message) => state.errors.insert(Field::Domain, message),
            None => {
                state.errors.remove(Field::Domain);
            }
        }
        debug!(stage = "domain_check", %domain, outcome = outcome.as_str(), "domain status updated");
        self.publish(&mut state);
    }
}

/// Server-side owner of one open store setup form.
///
/// Field edits arrive through [`FormSession::apply`]. Domain edits feed a
/// per-session worker that waits for the input to go quiet before asking the
/// API about the latest value. Each state change is published as a
/// [`FormView`] to [`FormSession::subscribe`]rs.
pub struct FormSession {
    shared: Arc<Shared>,
    domains: watch::Sender<String>,
    worker: JoinHandle<()>,
}

impl FormSession {
    pub fn new(api: Arc<dyn StoreApi>, debounce: Duration) -> Self {
        let state = FormState::new();
        let (views, _) = watch::channel(state.view());
        let (domains, domain_rx) = watch::channel(state.draft.domain.clone());
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            views,
            api,
        });
        let worker = tokio::spawn(run_domain_worker(shared.clone(), domain_rx, debounce));

        Self {
            shared,
            domains,
            worker,
        }
    }

    pub fn view(&self) -> FormView {
        self.shared.lock().view()
    }

    pub fn subscribe(&self) -> watch::Receiver<FormView> {
        self.shared.views.subscribe()
    }

    /// Number of live view subscribers, e.g. open event streams.
    pub fn subscriber_count(&self) -> usize {
        self.shared.views.receiver_count()
    }

    /// Time of the last state change.
    pub fn touched_at(&self) -> Instant {
        self.shared.lock().touched_at
    }

    /// Applies a field edit and returns the resulting view.
    ///
    /// Edited fields are re-validated once a submission was attempted, or
    /// when they currently show an error.
    pub fn apply(&self, patch: DraftPatch) -> FormView {
        let mut state = self.shared.lock();
        let changed = state.draft.apply(patch);
        if changed.is_empty() {
            return state.view();
        }

        for field in &changed {
            if state.submit_attempted || state.errors.contains(*field) {
                let result = validate_field(&state.draft, *field);
                state.errors.set(*field, result);
            }
        }
        if changed.contains(&Field::Domain) {
            self.domains.send_replace(state.draft.domain.clone());
        }

        self.shared.publish(&mut state);
        state.view()
    }

    /// Validates the draft, re-checks the domain and creates the store.
    ///
    /// Only one submission runs at a time; a second call while one is in
    /// flight fails with [`SubmitError::InProgress`]. The returned string is
    /// the success banner text.
    pub async fn submit(&self) -> Result<String, SubmitError> {
        let draft = {
            let mut state = self.shared.lock();
            if state.is_submitting {
                return Err(SubmitError::InProgress);
            }
            state.is_submitting = true;
            state.submit_attempted = true;
            self.shared.publish(&mut state);
            state.draft.clone()
        };

        let (checked, result) = self.run_submission(&draft).await;

        let mut state = self.shared.lock();
        state.is_submitting = false;
        if let Some(outcome) = checked {
            if state.draft.domain == draft.domain {
                state.domain_status.resolve(outcome);
                match availability_error(outcome) {
                    Some(message) => state.errors.insert(Field::Domain, message),
                    None => {
                        state.errors.remove(Field::Domain);
                    }
                }
            }
        }
        match &result {
            Ok(text) => {
                counter!("store_submissions_total", "result" => "created").increment(1);
                info!(stage = "submit", domain = %draft.domain, "store created");
                state.message = Some(Feedback::new(Tone::Success, text.clone()));
                if state.draft == draft {
                    state.draft = StoreDraft::default();
                    state.errors = FieldErrors::new();
                    state.domain_status.reset();
                    state.submit_attempted = false;
                    self.domains.send_replace(state.draft.domain.clone());
                }
            }
            Err(SubmitError::Invalid(errors)) => {
                counter!("store_submissions_total", "result" => "invalid").increment(1);
                debug!(stage = "submit", errors = %errors, "submission blocked by validation");
                state.errors = errors.clone();
            }
            Err(SubmitError::Api(err)) => {
                counter!("store_submissions_total", "result" => "failed").increment(1);
                warn!(stage = "submit", domain = %draft.domain, error = %err, "store creation failed");
                let text = err.user_message();
                let text = if text.is_empty() {
                    FALLBACK_ERROR_MESSAGE.to_string()
                } else {
                    text
                };
                state.message = Some(Feedback::new(Tone::Error, text));
            }
            Err(SubmitError::InProgress) => {}
        }
        self.shared.publish(&mut state);
        result
    }

    /// Returns the outcome of the submit-time availability check, if one
    /// ran, alongside the submission result.
    async fn run_submission(
        &self,
        draft: &StoreDraft,
    ) -> (Option<DomainCheckOutcome>, Result<String, SubmitError>) {
        let validated = draft.validate();
        let mut errors = match &validated {
            Ok(_) => FieldErrors::new(),
            Err(errors) => errors.clone(),
        };
        let checked = if validate_domain_format(&draft.domain).is_ok() {
            let outcome = self.shared.check_availability(&draft.domain).await;
            if let Some(message) = availability_error(outcome) {
                errors.insert(Field::Domain, message);
            }
            Some(outcome)
        } else {
            None
        };

        let store = match validated {
            Ok(store) if errors.is_empty() => store,
            _ => return (checked, Err(SubmitError::Invalid(errors))),
        };

        let started = Instant::now();
        let response = self.shared.api.create_store(&create_request(&store)).await;
        histogram!("api_request_seconds", "endpoint" => "create_store")
            .record(started.elapsed().as_secs_f64());

        let result = response.map_err(SubmitError::from).map(|response| {
            response
                .message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string())
        });
        (checked, result)
    }
}

impl Drop for FormSession {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn create_request(store: &NewStore) -> CreateStoreRequest<'_> {
    CreateStoreRequest {
        name: &store.name,
        domain: &store.domain,
        country: store.country.as_str(),
        category: store.category.as_str(),
        currency: store.currency.as_str(),
        email: &store.email,
    }
}

/// Debounces domain edits: each change restarts the quiet period, and only
/// the value present when it elapses is checked. Checks run one at a time.
async fn run_domain_worker(
    shared: Arc<Shared>,
    mut domains: watch::Receiver<String>,
    debounce: Duration,
) {
    loop {
        if domains.changed().await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                changed = domains.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = sleep(debounce) => break,
            }
        }
        let domain = domains.borrow_and_update().clone();
        shared.refresh_domain_status(domain).await;
    }
}

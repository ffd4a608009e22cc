use tokio::sync::watch;
use tokio::time::Instant;

use crate::identity::Subject;

/// Fires [`CancelSignal`]s; typically owned by the transport that observes client aborts.
#[derive(Debug)]
pub struct CancelTrigger(watch::Sender<bool>);

impl CancelTrigger {
    pub fn cancel(&self) { self.0.send_replace(true); }
}

#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool { *self.0.borrow() }

    /// Resolves once cancelled. Never resolves if the trigger is dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        let fired = rx.wait_for(|c| *c).await.is_ok();
        if !fired { std::future::pending::<()>().await; }
    }
}

pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger(tx), CancelSignal(rx))
}

/// Per-call view handed to the authorization pipeline and, on success, to the wrapped handler.
#[derive(Debug, Clone)]
pub struct CallContext {
    operation: String,
    assertion: Option<String>,
    deadline: Option<Instant>,
    cancel: Option<CancelSignal>,
    subject: Option<Subject>,
}

impl CallContext {
    pub fn new<S: Into<String>>(operation: S) -> Self {
        Self { operation: operation.into(), assertion: None, deadline: None, cancel: None, subject: None }
    }

    pub fn with_assertion<S: Into<String>>(mut self, assertion: S) -> Self { self.assertion = Some(assertion.into()); self }
    pub fn with_deadline(mut self, deadline: Instant) -> Self { self.deadline = Some(deadline); self }
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self { self.cancel = Some(signal); self }
    pub(crate) fn with_subject(mut self, subject: Option<Subject>) -> Self { self.subject = subject; self }

    pub fn operation(&self) -> &str { &self.operation }
    pub fn assertion(&self) -> Option<&str> { self.assertion.as_deref() }
    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// The verified caller; `None` for public operations.
    pub fn subject(&self) -> Option<&Subject> { self.subject.as_ref() }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
            || self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    pub(crate) async fn cancelled(&self) {
        match &self.cancel {
            Some(c) => c.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    }
}

use log::{debug, error, info};
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::app::{AppState, Effect, Event};
use crate::credentials::CredentialStore;
use crate::document;
use crate::matching::MatchAnalyzer;
use crate::page::PageHandle;
use crate::resume::{ResumeKind, ResumeStore};

/// Drives `AppState`: performs its effects and feeds the outcomes back in.
///
/// Slow work (page messages, analysis) runs on worker threads that report
/// through a channel drained by `poll`.
pub struct Controller {
    pub state: AppState,
    credentials: CredentialStore,
    resumes: ResumeStore,
    analyzer: Arc<MatchAnalyzer>,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
}

impl Controller {
    pub fn new(credentials: CredentialStore, resumes: ResumeStore, analyzer: Arc<MatchAnalyzer>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let state = AppState::new(resumes.load());
        Self {
            state,
            credentials,
            resumes,
            analyzer,
            events_tx,
            events_rx,
        }
    }

    /// Gates on the stored credential and asks the page for its job
    /// description without waiting for the answer.
    pub fn start(&mut self, page: PageHandle, page_timeout: Duration) {
        let present = self.credentials.exists();
        info!("credential present: {}", present);
        self.dispatch(Event::CredentialChecked(present));

        let tx = self.events_tx.clone();
        thread::spawn(move || {
            let found = page.request_job_description(page_timeout);
            if found.is_none() {
                info!("job description unavailable");
            }
            let _ = tx.send(Event::JobDescriptionLoaded(found));
        });
    }

    pub fn dispatch(&mut self, event: Event) {
        // key input stays out of the log
        if !matches!(event, Event::CredentialInput(_)) {
            debug!("event: {:?}", event);
        }
        for effect in self.state.apply(event) {
            self.perform(effect);
        }
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::SaveCredential(value) => {
                let outcome = match self.credentials.set(&value) {
                    Ok(()) => Event::CredentialSaved,
                    Err(_) => Event::CredentialSaveFailed,
                };
                self.dispatch(outcome);
            }
            Effect::PersistResume(text) => {
                if let Err(e) = self.resumes.save(&text) {
                    error!("failed to persist resume: {:#}", e);
                }
            }
            Effect::StartAnalysis {
                resume,
                job_description,
            } => {
                let analyzer = Arc::clone(&self.analyzer);
                let tx = self.events_tx.clone();
                thread::spawn(move || {
                    let outcome = analyzer
                        .analyze(&resume, &job_description)
                        .map_err(|e| e.to_string());
                    let _ = tx.send(Event::AnalysisFinished(outcome));
                });
            }
        }
    }

    /// Applies every background event that has arrived. Returns whether
    /// anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event);
            changed = true;
        }
        changed
    }

    /// Blocks for the next background event, up to `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.dispatch(event);
                true
            }
            Err(_) => false,
        }
    }

    /// File input boundary: only PDFs are accepted, anything else is ignored.
    pub fn load_resume_file(&mut self, path: &Path) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("ignoring unreadable file {}: {}", path.display(), e);
                return;
            }
        };
        if ResumeKind::classify(path, &bytes) != ResumeKind::Pdf {
            debug!("ignoring non-PDF file: {}", path.display());
            return;
        }
        let event = match document::extract_text(&bytes) {
            Ok(text) => Event::ResumeFileLoaded(text),
            Err(e) => {
                error!("failed to read PDF {}: {:?}", path.display(), e);
                Event::ResumeFileFailed
            }
        };
        self.dispatch(event);
    }
}

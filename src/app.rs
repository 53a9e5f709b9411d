use crate::models::AnalysisResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    CheckingCredential,
    CredentialSetup,
    Ready,
    Analyzing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEdit {
    Push(char),
    Backspace,
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CredentialChecked(bool),
    CredentialInput(InputEdit),
    SubmitCredential,
    CredentialSaved,
    CredentialSaveFailed,
    JobDescriptionLoaded(Option<String>),
    ResumeEdited(String),
    ResumeFileLoaded(String),
    ResumeFileFailed,
    AnalyzeRequested,
    AnalysisFinished(Result<AnalysisResult, String>),
    DismissError,
}

/// Side effects the runtime performs on behalf of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SaveCredential(String),
    PersistResume(String),
    StartAnalysis {
        resume: String,
        job_description: String,
    },
}

/// UI session state. Only the resume text and the credential outlive it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub screen: Screen,
    pub credential_input: String,
    pub resume: String,
    pub job_description: String,
    pub analysis: Option<AnalysisResult>,
    pub error: Option<String>,
}

impl AppState {
    pub fn new(saved_resume: String) -> Self {
        Self {
            screen: Screen::CheckingCredential,
            credential_input: String::new(),
            resume: saved_resume,
            job_description: String::new(),
            analysis: None,
            error: None,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.screen == Screen::Analyzing
    }

    /// Applies one event. Events that make no sense on the current screen
    /// are ignored.
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match (self.screen, event) {
            (Screen::CheckingCredential, Event::CredentialChecked(present)) => {
                self.screen = if present {
                    Screen::Ready
                } else {
                    Screen::CredentialSetup
                };
                Vec::new()
            }

            (Screen::CredentialSetup, Event::CredentialInput(edit)) => {
                match edit {
                    InputEdit::Push(c) => self.credential_input.push(c),
                    InputEdit::Backspace => {
                        self.credential_input.pop();
                    }
                    InputEdit::Clear => self.credential_input.clear(),
                }
                Vec::new()
            }
            (Screen::CredentialSetup, Event::SubmitCredential) => {
                if self.credential_input.trim().is_empty() {
                    self.error = Some("Please enter a valid API key".to_string());
                    return Vec::new();
                }
                self.error = None;
                vec![Effect::SaveCredential(self.credential_input.clone())]
            }
            (Screen::CredentialSetup, Event::CredentialSaved) => {
                self.credential_input.clear();
                self.error = None;
                self.screen = Screen::Ready;
                Vec::new()
            }
            (Screen::CredentialSetup, Event::CredentialSaveFailed) => {
                self.error = Some("Failed to save API key".to_string());
                Vec::new()
            }

            // the page may answer while the key is still being set up
            (_, Event::JobDescriptionLoaded(found)) => {
                if let Some(text) = found.filter(|text| !text.is_empty()) {
                    self.job_description = text;
                }
                Vec::new()
            }

            (Screen::Ready, Event::ResumeEdited(text))
            | (Screen::Ready, Event::ResumeFileLoaded(text)) => {
                self.resume = text.clone();
                vec![Effect::PersistResume(text)]
            }
            (Screen::Ready, Event::ResumeFileFailed) => {
                self.error = Some("Failed to read PDF file".to_string());
                Vec::new()
            }

            (Screen::Ready, Event::AnalyzeRequested) => {
                self.screen = Screen::Analyzing;
                self.error = None;
                vec![Effect::StartAnalysis {
                    resume: self.resume.clone(),
                    job_description: self.job_description.clone(),
                }]
            }
            (Screen::Analyzing, Event::AnalysisFinished(outcome)) => {
                self.screen = Screen::Ready;
                match outcome {
                    Ok(result) => {
                        self.analysis = Some(result);
                        self.error = None;
                    }
                    Err(message) => self.error = Some(message),
                }
                Vec::new()
            }

            (_, Event::DismissError) => {
                self.error = None;
                Vec::new()
            }

            _ => Vec::new(),
        }
    }
}

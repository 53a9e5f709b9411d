use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::PageConfig;

/// Job description locators, most specific first.
pub const JOB_DESCRIPTION_SELECTORS: [&str; 3] = [
    ".jobs-description-content__text",
    ".jobs-box__html-content > span",
    "#job-details",
];

pub const GET_JOB_DESCRIPTION: &str = "getJobDescription";

/// Returns the trimmed text of the first locator present on the page, or an
/// empty string when none resolve.
pub fn extract_job_description(document: &Html) -> String {
    for locator in JOB_DESCRIPTION_SELECTORS {
        let Ok(selector) = Selector::parse(locator) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            debug!("job description found with selector: {}", locator);
            return inner_text(element);
        }
    }
    String::new()
}

fn inner_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// --- Message protocol ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub action: String,
}

impl PageRequest {
    pub fn job_description() -> Self {
        Self {
            action: GET_JOB_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub job_description: String,
}

// --- Page worker ---

#[derive(Debug, Clone)]
pub enum PageSource {
    Url(String),
    File(PathBuf),
    Html(String),
}

impl PageSource {
    fn load(&self, config: &PageConfig) -> Result<String> {
        match self {
            PageSource::Url(url) => {
                info!("fetching page: {}", url);
                let client = reqwest::blocking::Client::builder()
                    .timeout(config.fetch_timeout())
                    .user_agent(config.user_agent.clone())
                    .build()
                    .context("Failed to build HTTP client")?;
                let response = client
                    .get(url)
                    .send()
                    .with_context(|| format!("Failed to fetch page: {}", url))?
                    .error_for_status()
                    .with_context(|| format!("Page returned an error status: {}", url))?;
                response.text().context("Failed to read page body")
            }
            PageSource::File(path) => {
                info!("reading page from file: {}", path.display());
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read page file: {}", path.display()))
            }
            PageSource::Html(html) => Ok(html.clone()),
        }
    }
}

struct Envelope {
    request: PageRequest,
    reply: mpsc::Sender<PageResponse>,
}

/// Caller side of the page worker. The worker owns the parsed document and
/// answers one response per request.
#[derive(Clone)]
pub struct PageHandle {
    tx: mpsc::Sender<Envelope>,
}

impl PageHandle {
    pub fn spawn(source: PageSource, config: &PageConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Envelope>();
        let config = config.clone();

        let spawned = thread::Builder::new()
            .name("page".to_string())
            .spawn(move || serve(source, &config, rx));
        if let Err(e) = spawned {
            error!("failed to start page worker: {}", e);
        }

        Self { tx }
    }

    /// A handle with no page behind it; every request goes unanswered.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::channel();
        Self { tx }
    }

    pub fn send(&self, request: PageRequest, timeout: Duration) -> Option<PageResponse> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let envelope = Envelope {
            request,
            reply: reply_tx,
        };
        if self.tx.send(envelope).is_err() {
            debug!("page worker unreachable");
            return None;
        }
        match reply_rx.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("page worker did not answer within {:?}", timeout);
                None
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => None,
        }
    }

    /// `None` means the job description is unavailable.
    pub fn request_job_description(&self, timeout: Duration) -> Option<String> {
        self.send(PageRequest::job_description(), timeout)
            .map(|response| response.job_description)
    }
}

fn serve(source: PageSource, config: &PageConfig, rx: mpsc::Receiver<Envelope>) {
    let html = match source.load(config) {
        Ok(html) => html,
        Err(e) => {
            error!("page unavailable: {:#}", e);
            return;
        }
    };
    let document = Html::parse_document(&html);
    info!("page loaded ({} bytes)", html.len());

    for envelope in rx {
        debug!("message received: {:?}", envelope.request);
        if envelope.request.action != GET_JOB_DESCRIPTION {
            continue;
        }
        let job_description = extract_job_description(&document);
        debug!("job description extracted ({} chars)", job_description.len());
        let _ = envelope.reply.send(PageResponse { job_description });
    }
}

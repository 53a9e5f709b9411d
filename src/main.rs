mod ai;
mod app;
mod config;
mod controller;
mod credentials;
mod db;
mod document;
mod matching;
mod models;
mod page;
mod resume;
mod skills;
mod tui;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::Config;
use controller::Controller;
use credentials::CredentialStore;
use db::Database;
use matching::MatchAnalyzer;
use models::AnalysisResult;
use page::{PageHandle, PageResponse, PageSource};
use resume::ResumeStore;

#[derive(Parser)]
#[command(name = "jobmatch")]
#[command(about = "Match your resume against a job posting with Gemini")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Gemini model to use (overrides the config file)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Log verbosity (logs go to jobmatch.log in the data directory)
    #[arg(short, long, value_name = "LEVEL", default_value_t = LevelFilter::Info, global = true)]
    verbosity: LevelFilter,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive matcher (default)
    Tui {
        #[command(flatten)]
        page: PageArgs,

        /// Resume file to load at startup (PDF or text)
        #[arg(short, long)]
        resume: Option<PathBuf>,
    },

    /// Manage the Gemini API key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Manage the saved resume
    Resume {
        #[command(subcommand)]
        command: ResumeCommands,
    },

    /// Print the job description found on a page
    Extract {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Analyze the saved (or given) resume against a job posting
    Analyze {
        #[command(flatten)]
        page: PageArgs,

        /// Read the job description from a plain text file instead of a page
        #[arg(long, conflicts_with_all = ["url", "page"])]
        job_file: Option<PathBuf>,

        /// Resume file to use instead of the saved resume (PDF or text)
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Print the raw analysis JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct PageArgs {
    /// URL of the job posting
    #[arg(short, long, conflicts_with = "page")]
    url: Option<String>,

    /// Saved HTML page of the job posting ("-" reads stdin)
    #[arg(short, long)]
    page: Option<PathBuf>,
}

impl PageArgs {
    fn source(&self) -> Result<Option<PageSource>> {
        if let Some(url) = &self.url {
            return Ok(Some(PageSource::Url(url.clone())));
        }
        match &self.page {
            Some(path) if path.as_os_str() == "-" => {
                let mut html = String::new();
                std::io::stdin()
                    .read_to_string(&mut html)
                    .context("Failed to read page from stdin")?;
                Ok(Some(PageSource::Html(html)))
            }
            Some(path) => Ok(Some(PageSource::File(path.clone()))),
            None => Ok(None),
        }
    }
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store the API key, replacing any previous one
    Set {
        /// Gemini API key
        key: String,
    },

    /// Show whether an API key is stored
    Status,
}

#[derive(Subcommand)]
enum ResumeCommands {
    /// Replace the saved resume with the contents of a file (PDF or text)
    Import {
        /// Path to resume file
        file: PathBuf,
    },

    /// Show the saved resume
    Show,
}

fn init_logging(level: LevelFilter, db_path: &Path) {
    let log_path = db_path.with_file_name("jobmatch.log");
    let file = OpenOptions::new().create(true).append(true).open(&log_path);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    if let Ok(file) = file {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    // a second init (tests) is harmless
    let _ = builder.try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }

    let db_path = config.storage.database.clone().unwrap_or_else(Database::default_path);
    let db = Arc::new(Database::open(&db_path)?);
    init_logging(cli.verbosity, &db_path);
    info!("starting jobmatch v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = db.path() {
        info!("using database at {}", path.display());
    }

    let credentials = CredentialStore::new(Arc::clone(&db));
    let resumes = ResumeStore::new(Arc::clone(&db));

    match cli.command.unwrap_or(Commands::Tui {
        page: PageArgs { url: None, page: None },
        resume: None,
    }) {
        Commands::Tui {
            page,
            resume: resume_file,
        } => {
            let analyzer = build_analyzer(&config, credentials.clone())?;
            if let Some(path) = resume_file {
                let text = resume::read_resume_file(&path)?;
                resumes.save(&text)?;
            }

            let handle = match page.source()? {
                Some(source) => PageHandle::spawn(source, &config.page),
                None => PageHandle::detached(),
            };
            let page_timeout = config.page.fetch_timeout() + config.page.message_timeout();

            let mut controller = Controller::new(credentials, resumes, Arc::new(analyzer));
            controller.start(handle, page_timeout);
            tui::run(&mut controller)?;
        }

        Commands::Key { command } => match command {
            KeyCommands::Set { key } => {
                credentials.set(&key)?;
                println!("API key saved.");
            }
            KeyCommands::Status => match credentials.get() {
                Some(_) => {
                    let since = credentials.saved_at().map(|at| format_saved_at(&at));
                    println!("API key is set{}.", since.map(|s| format!(" (saved {})", s)).unwrap_or_default());
                }
                None => println!("No API key stored. Run: jobmatch key set <KEY>"),
            },
        },

        Commands::Resume { command } => match command {
            ResumeCommands::Import { file } => {
                let text = resume::read_resume_file(&file)?;
                resumes.save(&text)?;
                println!("Saved resume from {} ({} chars).", file.display(), text.chars().count());
            }
            ResumeCommands::Show => {
                let text = resumes.load();
                if text.is_empty() {
                    println!("No resume saved.");
                } else {
                    if let Some(at) = resumes.saved_at() {
                        println!("Saved {}\n", format_saved_at(&at));
                    }
                    println!("{}", text);
                }
            }
        },

        Commands::Extract { page } => {
            let source = page.source()?.ok_or_else(|| anyhow!("Provide --url or --page"))?;
            let job_description = fetch_job_description(source, &config)
                .ok_or_else(|| anyhow!("Job description unavailable: the page could not be loaded"))?;
            let response = PageResponse { job_description };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Analyze {
            page,
            job_file,
            resume: resume_file,
            json,
        } => {
            let job_description = if let Some(path) = job_file {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read job file: {}", path.display()))?
            } else if let Some(source) = page.source()? {
                job_description_or_empty(source, &config)
            } else {
                String::new()
            };
            let resume_text = match resume_file {
                Some(path) => resume::read_resume_file(&path)?,
                None => resumes.load(),
            };

            let analyzer = build_analyzer(&config, credentials)?;
            let result = analyzer.analyze(&resume_text, &job_description)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
            }
        }
    }

    Ok(())
}

fn build_analyzer(config: &Config, credentials: CredentialStore) -> Result<MatchAnalyzer> {
    let spec = ai::resolve_model(&config.llm.model)?;
    info!("using model {} ({})", spec.model_id, spec.short_name);
    let provider = ai::GeminiProvider::new(&spec, &config.llm.endpoint, config.llm.timeout())?;
    Ok(MatchAnalyzer::new(credentials, Arc::new(provider)))
}

/// `None` when the page could not be loaded or did not answer.
fn fetch_job_description(source: PageSource, config: &Config) -> Option<String> {
    let handle = PageHandle::spawn(source, &config.page);
    let timeout = config.page.fetch_timeout() + config.page.message_timeout();
    handle.request_job_description(timeout)
}

/// An unreachable page is not fatal to an analysis; it runs without a job description.
fn job_description_or_empty(source: PageSource, config: &Config) -> String {
    fetch_job_description(source, config).unwrap_or_else(|| {
        warn!("job description unavailable, analyzing without one");
        String::new()
    })
}

fn format_saved_at(stored: &str) -> String {
    match chrono::NaiveDateTime::parse_from_str(stored, "%Y-%m-%d %H:%M:%S") {
        Ok(naive) => naive
            .and_utc()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        Err(_) => stored.to_string(),
    }
}

fn print_report(result: &AnalysisResult) {
    println!("Match score: {}%", result.match_percentage);

    let skills = &result.analysis.skills;
    println!("\nMatching skills: {}", list_or_none(&skills.matching));
    println!("Missing skills:  {}", list_or_none(&skills.missing));

    let experience = result.analysis.experience.analysis.trim();
    if !experience.is_empty() {
        println!("\nExperience:");
        for line in textwrap::fill(experience, 76).lines() {
            println!("  {}", line);
        }
    }

    if !result.suggestions.is_empty() {
        println!("\nSuggestions:");
        for suggestion in &result.suggestions {
            let wrapped = textwrap::fill(suggestion, textwrap::Options::new(76).subsequent_indent("    "));
            println!("  - {}", wrapped);
        }
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

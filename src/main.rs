use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pdfest::config::Config;
use pdfest::error::{AppError, AppResult};
use pdfest::logging;
use pdfest::segment::{ColumnMode, Sentence};
use pdfest::session::{Notice, Session, SessionDeps};
use pdfest::speech::{EspeakSpeech, SpeechProvider, sort_voices};
use pdfest::store::MemoryStateStore;
use tokio::sync::broadcast;

#[derive(Debug, Parser)]
#[command(name = "pdfest", version, about = "Read PDFs page by page and narrate them sentence by sentence")]
struct Cli {
    /// Config file; defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the sentences found on one page, or on every page.
    Sentences {
        pdf: PathBuf,
        /// 0-based page.
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        header: Option<f32>,
        #[arg(long)]
        footer: Option<f32>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
        columns: Option<u8>,
        #[arg(long)]
        json: bool,
    },
    /// Read the document aloud, resuming where the last session stopped.
    Narrate {
        pdf: PathBuf,
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        voice: Option<String>,
    },
    /// Write a page raster with one sentence highlighted.
    Highlight {
        pdf: PathBuf,
        /// 0-based sentence ordinal within the page.
        #[arg(long)]
        sentence: usize,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the table of contents.
    Outline { pdf: PathBuf },
    /// List the voices the speech engine offers.
    Voices,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    logging::init(&config.logging.level);

    match cli.command {
        Command::Sentences {
            pdf,
            page,
            header,
            footer,
            columns,
            json,
        } => {
            let mut session = open_scratch(pdf, config).await?;
            let params = session.segment_params();
            if header.is_some() || footer.is_some() {
                session.set_margins(
                    header.unwrap_or(params.header_margin),
                    footer.unwrap_or(params.footer_margin),
                );
            }
            if let Some(columns) = columns {
                session.set_column_mode(
                    ColumnMode::try_from(columns).map_err(AppError::invalid_argument)?,
                );
            }
            let sentences = collect_sentences(&mut session, page).await?;
            print_sentences(&sentences, json)
        }
        Command::Narrate { pdf, page, voice } => {
            let deps = SessionDeps::from_config(&config);
            let session = Session::open(pdf, config, deps).await?;
            narrate(session, page, voice).await
        }
        Command::Highlight {
            pdf,
            sentence,
            page,
            out,
        } => {
            let mut session = open_scratch(pdf, config).await?;
            highlight_to_file(&mut session, page, sentence, &out).await
        }
        Command::Outline { pdf } => {
            let session = open_scratch(pdf, config).await?;
            for entry in session.outline().await? {
                println!(
                    "{}{} ... {}",
                    "  ".repeat(entry.level),
                    entry.title,
                    entry.page + 1
                );
            }
            Ok(())
        }
        Command::Voices => {
            let speech = EspeakSpeech::from_config(&config.speech);
            let mut voices = tokio::task::spawn_blocking(move || speech.list_voices())
                .await
                .map_err(|err| AppError::synthesis(format!("voice listing task failed: {err}")))??;
            sort_voices(&mut voices);
            for voice in voices {
                println!("{:<12} {:<24} {}", voice.locale, voice.id, voice.gender);
            }
            Ok(())
        }
    }
}

/// Inspection commands must not overwrite the reader's saved progress.
async fn open_scratch(pdf: PathBuf, config: Config) -> AppResult<Session> {
    let mut deps = SessionDeps::from_config(&config);
    deps.store = Arc::new(MemoryStateStore::new());
    Session::open(pdf, config, deps).await
}

async fn collect_sentences(session: &mut Session, page: Option<usize>) -> AppResult<Vec<Sentence>> {
    let page_count = session.info().page_count;
    let pages = match page {
        Some(page) if page >= page_count => {
            return Err(AppError::invalid_argument(format!(
                "page {page} is out of range (document has {page_count} pages)"
            )));
        }
        Some(page) => page..page + 1,
        None => 0..page_count,
    };

    let mut collected = Vec::new();
    for page in pages {
        if !session.sentences().contains_page(page) {
            session.goto(page).await;
        }
        collected.extend(
            session
                .sentences()
                .iter()
                .filter(|sentence| sentence.page_index == page)
                .cloned(),
        );
    }
    Ok(collected)
}

fn print_sentences(sentences: &[Sentence], json: bool) -> AppResult<()> {
    if json {
        let rendered = serde_json::to_string_pretty(sentences)
            .map_err(|err| AppError::invalid_argument(format!("failed to encode sentences: {err}")))?;
        println!("{rendered}");
        return Ok(());
    }
    for sentence in sentences {
        println!(
            "[p{} #{} c{}] {}",
            sentence.page_index + 1,
            sentence.ordinal,
            sentence.column,
            sentence.text
        );
    }
    Ok(())
}

async fn highlight_to_file(
    session: &mut Session,
    page: usize,
    ordinal: usize,
    out: &std::path::Path,
) -> AppResult<()> {
    if !session.goto(page).await {
        return Err(AppError::invalid_argument(format!("page {page} is out of range")));
    }
    let index = session
        .sentences()
        .first_on_page(page)
        .map(|first| first + ordinal)
        .filter(|index| session.sentences().page_of(*index) == Some(page))
        .ok_or_else(|| {
            AppError::invalid_argument(format!("page {page} has no sentence #{ordinal}"))
        })?;
    session.select_sentence(index);

    let raster = session
        .pages()
        .get(page)
        .map(|resident| Arc::clone(&resident.raster))
        .ok_or_else(|| AppError::invalid_argument(format!("page {page} could not be loaded")))?;
    raster
        .save(out)
        .map_err(|err| AppError::invalid_argument(format!("failed to write {}: {err}", out.display())))?;
    println!("{}", out.display());
    Ok(())
}

async fn narrate(mut session: Session, page: Option<usize>, voice: Option<String>) -> AppResult<()> {
    if let Some(voice) = voice {
        session.set_voice(&voice);
    }
    if let Some(page) = page
        && !session.goto(page).await
    {
        session.close();
        return Err(AppError::invalid_argument(format!("page {page} is out of range")));
    }

    let mut notices = session.subscribe();
    if !session.play()? {
        println!("nothing to narrate on page {}", session.visible_page() + 1);
        session.close();
        return Ok(());
    }

    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    let outcome = session
        .run_until_finished(interrupt, |session| print_notices(session, &mut notices))
        .await;
    session.close();
    outcome
}

fn print_notices(session: &Session, notices: &mut broadcast::Receiver<Notice>) {
    loop {
        match notices.try_recv() {
            Ok(Notice::Highlighted { sentence, page }) => {
                if let Some(current) = session.sentences().get(sentence) {
                    println!("[p{}] {}", page + 1, current.text);
                }
            }
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notice stream lagged");
            }
            Err(_) => break,
        }
    }
}

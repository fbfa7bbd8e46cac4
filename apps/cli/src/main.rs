use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tubemark_core::{
    BookmarkStore, FileStore, HostPage, HttpBackend, KeyValueStore, MemoryStore, PageStatus,
    PanelHandle, PanelState, SettingsStore, StubBackend, VideoBackend, VideoId,
    assistant::{DEFAULT_API_BASE, DEFAULT_QUIZ_QUESTIONS},
    bookmarks::default_description,
    contexts::ChatLine,
    format::{format_timestamp, format_transcript_with_timestamps, parse_timestamp},
    messages::{Message, Reply},
    router::Address,
    settings::{CUSTOM_MODEL, ModelPreset},
    storage::default_store_path,
    types::Difficulty,
};

use crate::tab::{TAB, TabHandle, load_captions, open_tab};

mod tab;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", secs / 60.0, secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "tubemark")]
#[command(about = "Bookmark video timestamps and chat with a video's transcript")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL
    #[arg(long, env = "TUBEMARK_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    api_base: String,

    /// Answer assistant requests offline from the transcript instead of the backend
    #[arg(long, global = true)]
    stub: bool,

    /// Storage file (defaults to the user config directory)
    #[arg(long, env = "TUBEMARK_STORE", global = true)]
    store: Option<PathBuf>,

    /// Keep everything in memory for this run
    #[arg(long, global = true, conflicts_with = "store")]
    ephemeral: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Open a video in a simulated tab and drive it interactively
    Watch {
        /// Watch page URL, e.g. https://www.youtube.com/watch?v=dQw4w9WgXcQ
        url: String,

        /// Caption file the page "renders" (one `MM:SS text` cue per line)
        #[arg(long)]
        captions: Option<PathBuf>,
    },
    /// Stored bookmarks
    Bookmarks {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Extension settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum BookmarkAction {
    /// List bookmarks of one video, or of every video
    List { video: Option<String> },
    /// Add a bookmark at a timestamp (MM:SS, H:MM:SS or seconds)
    Add {
        video: String,
        time: String,
        #[arg(short, long)]
        desc: Option<String>,
    },
    /// Remove every bookmark at exactly this time (seconds)
    Remove { video: String, time: f64 },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        /// One of the model presets, or "custom"
        #[arg(long)]
        model: Option<String>,
        /// Endpoint for the custom model
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        use_summary: Option<bool>,
        #[arg(long)]
        use_transcript: Option<bool>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tubemark=debug,tubemark_core=debug"
    } else {
        "tubemark=info,tubemark_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn open_store(cli: &Cli) -> Arc<dyn KeyValueStore> {
    if cli.ephemeral {
        return Arc::new(MemoryStore::new());
    }
    let path = cli.store.clone().unwrap_or_else(default_store_path);
    tracing::debug!(path = %path.display(), "using file store");
    Arc::new(FileStore::new(path))
}

fn parse_video(raw: &str) -> Result<VideoId> {
    VideoId::from_url(raw)
        .or_else(|| VideoId::parse(raw))
        .with_context(|| format!("not a video id or watch URL: {raw}"))
}

fn parse_time(raw: &str) -> Result<f64> {
    parse_timestamp(raw)
        .or_else(|| raw.parse::<f64>().ok().filter(|t| t.is_finite() && *t >= 0.0))
        .with_context(|| format!("not a timestamp: {raw}"))
}

fn ok_mark() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let store = open_store(&cli);

    match &cli.command {
        Command::Watch { url, captions } => {
            let captions = match captions {
                Some(path) => load_captions(path).await?,
                None => Vec::new(),
            };
            let backend: Arc<dyn VideoBackend> = if cli.stub {
                Arc::new(StubBackend::new().with_latency(Duration::from_millis(400)))
            } else {
                Arc::new(HttpBackend::new(&cli.api_base))
            };
            SettingsStore::new(store.clone()).ensure_defaults().await?;
            watch(url, store, backend, captions).await
        }
        Command::Bookmarks { action } => bookmarks(action, BookmarkStore::new(store)).await,
        Command::Settings { action } => settings(action, SettingsStore::new(store)).await,
    }
}

async fn bookmarks(action: &BookmarkAction, store: BookmarkStore) -> Result<()> {
    let print = |video: &VideoId, list: &[tubemark_core::Bookmark]| {
        println!(
            "{} {}",
            style(video).yellow().bold(),
            style(format!("({})", list.len())).dim()
        );
        for b in list {
            println!(
                "  {} {}",
                style(format!("[{}]", format_timestamp(b.time))).cyan(),
                b.description
            );
        }
    };

    match action {
        BookmarkAction::List { video: Some(video) } => {
            let video = parse_video(video)?;
            print(&video, &store.list(&video).await);
        }
        BookmarkAction::List { video: None } => {
            let videos = store.videos().await?;
            if videos.is_empty() {
                println!("{}", style("No bookmarks yet.").dim());
            }
            for video in videos {
                print(&video, &store.list(&video).await);
            }
        }
        BookmarkAction::Add { video, time, desc } => {
            let video = parse_video(video)?;
            let time = parse_time(time)?;
            let desc = desc.clone().unwrap_or_else(|| default_description(time));
            let list = store.add(&video, time, desc).await?;
            println!("{} Bookmark added", ok_mark());
            print(&video, &list);
        }
        BookmarkAction::Remove { video, time } => {
            let video = parse_video(video)?;
            let list = store.remove(&video, *time).await?;
            println!("{} Removed bookmarks at {}", ok_mark(), time);
            print(&video, &list);
        }
    }
    Ok(())
}

async fn settings(action: &SettingsAction, store: SettingsStore) -> Result<()> {
    let mut settings = store.ensure_defaults().await?;
    if let SettingsAction::Set {
        model,
        endpoint,
        api_key,
        use_summary,
        use_transcript,
    } = action
    {
        if let Some(model) = model {
            settings.select_model(model, endpoint.as_deref());
        } else if let Some(endpoint) = endpoint {
            settings.select_model(CUSTOM_MODEL, Some(endpoint));
        }
        if let Some(key) = api_key {
            settings.api_key = key.trim().to_string();
        }
        if let Some(v) = use_summary {
            settings.use_summary = *v;
        }
        if let Some(v) = use_transcript {
            settings.use_transcript = *v;
        }
        store.save(&settings).await?;
        println!("{} Settings saved", ok_mark());
    }

    let presets: Vec<&str> = ModelPreset::ALL.iter().map(|p| p.name()).collect();
    println!("{} {}", style("model:").dim(), style(&settings.model_name).cyan());
    println!("{} {}", style("endpoint:").dim(), settings.api_endpoint);
    println!("{} {}", style("api key:").dim(), settings.masked_api_key());
    println!("{} {}", style("use summary:").dim(), settings.use_summary);
    println!("{} {}", style("use transcript:").dim(), settings.use_transcript);
    println!(
        "{} {}, {}",
        style("presets:").dim(),
        presets.join(", "),
        CUSTOM_MODEL
    );
    println!("{} {}", style("session:").dim(), store.session_id().await?);
    Ok(())
}

const HELP: &str = "\
  mark                  bookmark the current playback position
  marks                 list this video's bookmarks
  delete <time>         remove bookmarks at <time> seconds
  play <time>           jump the player to <time>
  pause                 pause the player clock
  go <url>              navigate the tab
  open | close          show or hide the assistant sidebar
  ask <question>        chat about the video
  transcript            load and print the transcript
  summary               summarise the video
  quiz [n] [difficulty] generate a quiz (easy, medium, hard)
  answer <q> <option>   answer question q (1-based) with option (1-based)
  grade | reset         grade the quiz or clear the answers
  seek <n>              follow the n-th timestamp of the last answer
  status                page, panel and router state
  quit";

async fn watch(
    url: &str,
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn VideoBackend>,
    captions: Vec<tubemark_core::assistant::RenderedCue>,
) -> Result<()> {
    println!(
        "\n{}  {}\n",
        style("tubemark").cyan().bold(),
        style("Video Bookmarks & Assistant").dim()
    );
    if !captions.is_empty() {
        println!("{} Page renders {} caption cues", ok_mark(), captions.len());
    }

    let mut tab = open_tab(url, store, backend, captions);
    tab.background.tab_updated(TAB, url);
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Type `help` for commands.").dim());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        if matches!(cmd, "quit" | "exit") {
            break;
        }
        if let Err(e) = run_command(&mut tab, cmd, rest).await {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
        }
    }

    tab.shutdown();
    Ok(())
}

async fn run_command(tab: &mut TabHandle, cmd: &str, rest: &str) -> Result<()> {
    match cmd {
        "help" => println!("{HELP}"),
        "mark" => {
            let bookmark = tab.content.add_bookmark().await?;
            println!("{} {}", ok_mark(), bookmark.description);
        }
        "marks" => {
            let video = tab.current_video().context("no video on this page")?;
            let list = tab.bookmarks.list(&video).await;
            if list.is_empty() {
                println!("{}", style("No bookmarks for this video.").dim());
            }
            for b in list {
                println!(
                    "  {} {}",
                    style(format!("[{}]", format_timestamp(b.time))).cyan(),
                    b.description
                );
            }
        }
        "delete" => {
            let time: f64 = rest.parse().context("usage: delete <seconds>")?;
            let reply = tab
                .router
                .request(
                    Address::Panel(TAB),
                    Address::Content(TAB),
                    Message::Delete { value: time },
                )
                .await?;
            match reply.into_result()? {
                Reply::Bookmarks { bookmarks } => {
                    println!("{} {} bookmark(s) left", ok_mark(), bookmarks.len())
                }
                other => bail!("unexpected reply: {other:?}"),
            }
        }
        "play" => {
            let time = parse_time(rest)?;
            tab.router.emit(
                Address::Panel(TAB),
                Address::Content(TAB),
                Message::Play { value: time },
            )?;
        }
        "pause" => tab.page.pause(),
        "go" => {
            tab.navigate(rest);
            println!("{} {}", style("→").cyan(), PageStatus::from_url(rest).label());
        }
        "open" => {
            tab.panel().await?;
            println!("{} Sidebar open", ok_mark());
        }
        "close" => {
            tab.close_panel();
            println!("{} Sidebar closed", ok_mark());
        }
        "ask" => {
            if rest.is_empty() {
                bail!("usage: ask <question>");
            }
            let panel = tab.panel().await?;
            let before = panel.state();
            panel.send_chat(rest)?;
            let state = await_reply(panel, &before, "Thinking...").await?;
            print_last_answer(&state);
        }
        "transcript" => {
            let panel = tab.panel().await?;
            let spinner = create_spinner("Loading transcript...");
            let ready = panel.ensure_transcript().await;
            spinner.finish_and_clear();
            ready?;
            println!(
                "\n{}",
                format_transcript_with_timestamps(&panel.state().transcript)
            );
        }
        "summary" => {
            let panel = tab.panel().await?;
            let before = panel.state();
            let spinner = create_spinner("Waiting for transcript...");
            let ready = panel.request_summary().await;
            spinner.finish_and_clear();
            ready?;
            let state = await_reply(panel, &before, "Summarising...").await?;
            if let Some(summary) = state.summary {
                println!("\n{}\n", summary.text);
                for point in summary.key_points {
                    println!("  {} {}", style("•").cyan(), point);
                }
            }
        }
        "quiz" => {
            let (n, difficulty) = parse_quiz_args(rest)?;
            let panel = tab.panel().await?;
            let before = panel.state();
            let spinner = create_spinner("Waiting for transcript...");
            let ready = panel.request_quiz(n, difficulty).await;
            spinner.finish_and_clear();
            ready?;
            let state = await_reply(panel, &before, "Writing questions...").await?;
            for (i, q) in state.quiz.iter().enumerate() {
                println!("\n{} {}", style(format!("Q{}.", i + 1)).bold(), q.question);
                for (j, option) in q.options.iter().enumerate() {
                    println!("   {}) {}", j + 1, option);
                }
            }
        }
        "answer" => {
            let mut args = rest.split_whitespace();
            let (Some(q), Some(o)) = (args.next(), args.next()) else {
                bail!("usage: answer <question> <option>");
            };
            let q: usize = q.parse()?;
            let o: usize = o.parse()?;
            let panel = tab.panel().await?;
            if q == 0 || o == 0 || !panel.answer(q - 1, o - 1) {
                bail!("no option {o} for question {q}");
            }
        }
        "grade" => {
            let graded = tab.panel().await?.grade();
            for (i, (question, ok)) in graded.outcomes().enumerate() {
                let mark = if ok { ok_mark() } else { style("✗").red().bold() };
                println!("  {} Q{} {}", mark, i + 1, style(&question.explanation).dim());
            }
            let grade = &graded.grade;
            println!(
                "\n{} {}/{}{}",
                style("Score:").bold(),
                style(grade.correct).cyan().bold(),
                grade.total,
                if grade.all_correct() { "  all correct!" } else { "" }
            );
        }
        "reset" => tab.panel().await?.reset_quiz(),
        "seek" => {
            let n: usize = rest.parse().context("usage: seek <n>")?;
            let panel = tab.panel().await?;
            let state = panel.state();
            let link = state
                .chat
                .iter()
                .rev()
                .find_map(|line| match line {
                    ChatLine::Assistant { links, .. } => Some(links),
                    _ => None,
                })
                .and_then(|links| links.get(n.saturating_sub(1)))
                .context("no such timestamp in the last answer")?;
            panel.seek(link.seconds);
        }
        "status" => print_status(tab),
        other => bail!("unknown command `{other}`, try `help`"),
    }
    Ok(())
}

/// Spins until the panel receives an answer (or an error) newer than `before`.
async fn await_reply(panel: &PanelHandle, before: &PanelState, msg: &str) -> Result<PanelState> {
    let started = Instant::now();
    let spinner = create_spinner(msg);
    let mut rx = panel.subscribe();
    let state = rx
        .wait_for(|s| s.replies > before.replies || s.video_id != before.video_id)
        .await
        .context("panel closed")?
        .clone();

    match &state.error {
        Some(err) if state.error != before.error => {
            spinner.finish_and_clear();
            panel.dismiss_error();
            bail!("{}: {}", err.error, err.message);
        }
        _ => spinner.finish_with_message(format!(
            "{} Done {}",
            ok_mark(),
            style(format!("[{}]", format_duration(started.elapsed()))).dim()
        )),
    }
    Ok(state)
}

fn print_last_answer(state: &PanelState) {
    let Some(ChatLine::Assistant { text, links }) = state.chat.last() else {
        return;
    };
    println!("\n{}\n", text);
    if !links.is_empty() {
        let labels: Vec<String> = links
            .iter()
            .enumerate()
            .map(|(i, l)| format!("{}{}", i + 1, l.label))
            .collect();
        println!("{} {}", style("seek:").dim(), labels.join("  "));
    }
}

/// `quiz [n] [difficulty]`; missing values fall back to the request defaults.
fn parse_quiz_args(rest: &str) -> Result<(u32, Difficulty)> {
    let mut args = rest.split_whitespace();
    let n = args
        .next()
        .map(str::parse)
        .transpose()
        .context("question count must be a number")?
        .unwrap_or(DEFAULT_QUIZ_QUESTIONS);
    let difficulty = args
        .next()
        .map(str::parse)
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();
    Ok((n, difficulty))
}

fn transcript_label(state: &PanelState) -> &'static str {
    if state.transcript_ready {
        "ready"
    } else if state.transcript_loading {
        "loading"
    } else if state.transcript_failed {
        "failed"
    } else {
        "absent"
    }
}

fn print_status(tab: &TabHandle) {
    let url = tab.nav.current_url();
    let metrics = tab.router.metrics();
    println!("{} {}", style("page:").dim(), PageStatus::from_url(&url).label());
    println!("{} {}", style("url:").dim(), url);
    println!(
        "{} {}",
        style("player:").dim(),
        format_timestamp(tab.page.current_time())
    );
    match tab.open_panel() {
        Some(panel) => {
            let s = panel.state();
            println!(
                "{} transcript {}, {} chat line(s), summary {}, {} quiz question(s)",
                style("panel:").dim(),
                transcript_label(&s),
                s.chat.len(),
                if s.summary.is_some() { "ready" } else { "absent" },
                s.quiz.len()
            );
        }
        None => println!("{} closed", style("panel:").dim()),
    }
    println!(
        "{} {} dropped event(s), {} not-ready request(s), {} evicted",
        style("router:").dim(),
        metrics.dropped_events,
        metrics.not_ready_requests,
        metrics.evicted
    );
    let attached: Vec<String> = [Address::Background, Address::Content(TAB), Address::Panel(TAB)]
        .into_iter()
        .filter(|address| tab.router.is_attached(*address))
        .map(|address| address.to_string())
        .collect();
    println!("{} {}", style("attached:").dim(), attached.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_args_default_to_request_defaults() {
        assert_eq!(parse_quiz_args("").unwrap(), (DEFAULT_QUIZ_QUESTIONS, Difficulty::default()));
        assert_eq!(parse_quiz_args("3").unwrap(), (3, Difficulty::default()));
        assert_eq!(parse_quiz_args("7 hard").unwrap(), (7, Difficulty::Hard));
        assert!(parse_quiz_args("many").is_err());
        assert!(parse_quiz_args("2 impossible").is_err());
    }
}

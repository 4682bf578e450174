//! CLI for GenStudio - prompt-driven image editing, chat and video.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genstudio::{
    AspectRatio, EditSession, FileStore, ImageAsset, ImageFormat, KeyValueStore, Studio,
    StudioConfig, StudioError, VideoRequest,
};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "genstudio")]
#[command(about = "Edit images, chat and generate videos with Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API key (falls back to GOOGLE_API_KEY, GEMINI_API_KEY, API_KEY)
    #[arg(long, global = true, env = "GENSTUDIO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Session file (falls back to GENSTUDIO_STORE)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a prompt to the session image
    Edit(EditArgs),

    /// Inspect or rewind the edit history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Chat with the assistant (one message, or a REPL on stdin)
    Chat {
        /// Message to send; omit to read messages from stdin
        message: Option<String>,
    },

    /// Generate a video from a text prompt
    Video(VideoArgs),

    /// Remove the session image, its edits and history
    Reset,
}

#[derive(Args)]
struct EditArgs {
    /// What to change in the image
    prompt: String,

    /// Start a new session from this image
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output format (defaults to the --output extension, else png)
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Write the edited image here
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List edits, oldest first
    List,
    /// Make entry N the current image
    Revert {
        /// History index
        index: usize,
        /// Also write the image here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forget the history, keeping the current image
    Clear,
}

#[derive(Args)]
struct VideoArgs {
    /// The text prompt describing the video
    prompt: String,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "16:9")]
    aspect_ratio: AspectRatioArg,

    /// Start from this image
    #[arg(long, conflicts_with = "from_session")]
    start_image: Option<PathBuf>,

    /// Start from the session's current image
    #[arg(long)]
    from_session: bool,

    /// Give up after this many seconds (falls back to GENSTUDIO_VIDEO_TIMEOUT_SECS)
    #[arg(long)]
    timeout: Option<u64>,

    /// Seconds between status checks
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

impl From<FormatArg> for ImageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("genstudio=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        match err.downcast_ref::<StudioError>() {
            Some(studio_err) => eprintln!("{}", studio_err.user_message()),
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut builder = StudioConfig::builder();
    if let Some(key) = cli.api_key.clone() {
        builder = builder.api_key(key);
    }
    if let Some(path) = cli.store.clone() {
        builder = builder.store_path(path);
    }

    match cli.command {
        Commands::Edit(args) => edit_image(builder.build(), args, cli.json).await,
        Commands::History { action } => history(builder.build(), action, cli.json),
        Commands::Chat { message } => chat(builder.build(), message, cli.json).await,
        Commands::Video(args) => {
            builder = builder.poll_interval(Duration::from_secs(args.poll_interval.max(1)));
            if let Some(secs) = args.timeout {
                builder = builder.video_timeout(Duration::from_secs(secs));
            }
            let mut config = builder.build();
            if config.api_key.is_none() {
                config.api_key = Some(select_api_key()?);
            }
            generate_video(config, args, cli.json).await
        }
        Commands::Reset => reset(builder.build(), cli.json),
    }
}

/// Asks for a key on an interactive terminal; video cannot start without one.
fn select_api_key() -> anyhow::Result<String> {
    if !std::io::stdin().is_terminal() {
        return Err(StudioError::CredentialRequired.into());
    }
    eprint!("Video generation needs an API key. Enter one to continue: ");
    std::io::stderr().flush()?;
    let mut key = String::new();
    std::io::stdin().lock().read_line(&mut key)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(StudioError::CredentialRequired.into());
    }
    Ok(key.to_string())
}

fn output_format(args: &EditArgs) -> anyhow::Result<ImageFormat> {
    if let Some(format) = args.format {
        return Ok(format.into());
    }
    let from_ext = args
        .output
        .as_ref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension);
    match from_ext {
        Some(format) if format.is_output_format() => Ok(format),
        Some(format) => anyhow::bail!("cannot write {} output; use png or jpeg", format.extension()),
        None => Ok(ImageFormat::Png),
    }
}

async fn edit_image(config: StudioConfig, args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    let format = output_format(&args)?;
    let studio = Studio::open(&config)?;

    if let Some(ref input) = args.input {
        studio.load_original(ImageAsset::load(input)?)?;
    }

    let edited = studio.edit(&args.prompt, format).await?;
    if let Some(ref output) = args.output {
        edited.save(output)?;
    }
    let index = studio.session().history().len().saturating_sub(1);

    if json_output {
        let result = serde_json::json!({
            "type": "edit",
            "success": true,
            "history_index": index,
            "output": args.output.as_ref().map(|p| p.display().to_string()),
            "size_bytes": edited.size(),
            "mime_type": edited.mime_type(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Edit #{} recorded ({} bytes, {})",
            index,
            edited.size(),
            edited.mime_type()
        );
        if let Some(ref output) = args.output {
            println!("Saved: {}", output.display());
        }
    }
    Ok(())
}

fn history(config: StudioConfig, action: HistoryAction, json_output: bool) -> anyhow::Result<()> {
    let store = FileStore::new(&config.store_path);
    let mut session = EditSession::restore(&store);

    match action {
        HistoryAction::List => {
            let current = session.history().current_index();
            let entries: Vec<_> = session
                .history()
                .entries()
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    let asset = ImageAsset::from_data_url(url).ok();
                    (
                        i,
                        asset.as_ref().map(|a| a.mime_type()).unwrap_or("unknown"),
                        asset.as_ref().map(|a| a.size()).unwrap_or(0),
                        Some(i) == current,
                    )
                })
                .collect();

            if json_output {
                let result = serde_json::json!({
                    "has_original": session.original().is_some(),
                    "current": current,
                    "entries": entries.iter().map(|(i, mime, size, is_current)| serde_json::json!({
                        "index": i,
                        "mime_type": mime,
                        "size_bytes": size,
                        "current": is_current,
                    })).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if session.original().is_none() {
                println!("No image loaded.");
            } else if entries.is_empty() {
                println!("No edits yet.");
            } else {
                for (i, mime, size, is_current) in entries {
                    let marker = if is_current { "*" } else { " " };
                    println!("{marker} {i:>3}  {mime:<10}  {size} bytes");
                }
            }
        }
        HistoryAction::Revert { index, output } => {
            let asset = session.revert_to(index)?.clone();
            session.sync(&store)?;
            if let Some(ref output) = output {
                asset.save(output)?;
            }
            if json_output {
                let result = serde_json::json!({
                    "type": "revert",
                    "success": true,
                    "history_index": index,
                    "output": output.as_ref().map(|p| p.display().to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Reverted to edit #{index}");
            }
        }
        HistoryAction::Clear => {
            session.clear_history();
            session.sync(&store)?;
            if json_output {
                println!("{}", serde_json::json!({ "type": "clear_history", "success": true }));
            } else {
                println!("History cleared.");
            }
        }
    }
    Ok(())
}

async fn chat(config: StudioConfig, message: Option<String>, json_output: bool) -> anyhow::Result<()> {
    let studio = Studio::open(&config)?;

    if let Some(message) = message {
        let reply = studio.chat(&message).await?;
        if json_output {
            let result = serde_json::json!({ "type": "chat", "success": true, "reply": reply });
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{reply}");
        }
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        match studio.chat(&line).await {
            Ok(reply) => println!("{reply}"),
            Err(_) => {
                let transcript = studio.transcript().await;
                if let Some(last) = transcript.last() {
                    println!("{}", last.text);
                }
            }
        }
    }
    Ok(())
}

async fn generate_video(config: StudioConfig, args: VideoArgs, json_output: bool) -> anyhow::Result<()> {
    let studio = Arc::new(Studio::open(&config)?);

    let mut request = VideoRequest::new(&args.prompt, args.aspect_ratio.into());
    if let Some(ref path) = args.start_image {
        request = request.with_starting_image(ImageAsset::load(path)?);
    } else if args.from_session {
        let image = studio.starting_image().ok_or_else(|| {
            StudioError::MissingInput("upload an image first".into())
        })?;
        request = request.with_starting_image(image);
    }

    let canceller = Arc::clone(&studio);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cancelling video job");
            canceller.cancel_video();
        }
    });

    if !json_output {
        eprintln!("Generating video (this can take a few minutes)...");
    }
    let result = studio.generate_video(request).await;
    ctrl_c.abort();
    let outcome = result?;
    let saved = studio.save_video(&args.output)?;
    studio.release_video();

    if json_output {
        let result = serde_json::json!({
            "type": "video",
            "success": true,
            "output": saved.display().to_string(),
            "size_bytes": outcome.size,
            "mime_type": outcome.mime_type,
            "operation": outcome.metadata.operation,
            "polls": outcome.metadata.polls,
            "duration_ms": outcome.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Generated video: {} ({} bytes)", saved.display(), outcome.size);
        if let Some(duration) = outcome.metadata.duration_ms {
            println!("Generation time: {}ms", duration);
        }
    }
    Ok(())
}

fn reset(config: StudioConfig, json_output: bool) -> anyhow::Result<()> {
    let store = FileStore::new(&config.store_path);
    store.clear()?;
    if json_output {
        println!("{}", serde_json::json!({ "type": "reset", "success": true }));
    } else {
        println!("Session cleared.");
    }
    Ok(())
}

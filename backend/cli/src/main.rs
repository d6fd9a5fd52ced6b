mod api;
mod config;
mod terminal_output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use reelchat_config::{config_file_path, write_config, ReelChatConfig};
use reelchat_media::{save_frames, VideoPreview};
use reelchat_understanding::VideoChatService;

use api::AppState;
use config::Overrides;
use terminal_output::{
    note_error, note_info, note_success, note_warn, render_table, stream_write, Column, BOLD,
    DIM, RESET,
};

#[derive(Parser)]
#[command(name = "reelchat")]
#[command(about = "reelchat: ask a vision-language model questions about videos")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Per-request sampling controls.
#[derive(Debug, Clone, Args)]
struct SamplingArgs {
    /// Frames sampled per second of video (default from config)
    #[arg(long)]
    fps: Option<u32>,

    /// Fixed frames per temporal pack; 0 keeps automatic packing
    #[arg(long)]
    force_packing: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show duration, frame rate and resolution of a video
    Info {
        video: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Sample a video into frames and temporal id groups
    Encode {
        video: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
        /// Write the sampled frames to this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Ask one question about a video
    Chat {
        video: PathBuf,
        #[arg(short, long)]
        question: String,
        #[command(flatten)]
        sampling: SamplingArgs,
    },
    /// Encode once and answer every question in a file
    Batch {
        video: PathBuf,
        /// One question per line; blank lines and `#` comments are skipped
        #[arg(long)]
        questions: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
        /// Also write the answers as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Encode once and answer questions read from stdin until `quit`
    Interactive {
        video: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
    },
    /// Start the HTTP API server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(long)]
        bind: Option<String>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config with secrets masked
    Show,
    /// Print the config file location
    Path,
    /// Write a config file filled with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_effective(&cli.overrides).await?;

    let logging = config.logging.clone().unwrap_or_default();
    reelchat_logging::init_logger(
        logging.dir.as_deref(),
        logging.level.as_deref().unwrap_or("info"),
    );
    for warning in reelchat_config::validate(&config).warnings {
        warn!(path = %warning.path, message = %warning.message, "Config warning");
    }

    match cli.command {
        Commands::Info { video, json } => {
            let service = config::build_service(&config)?;
            show_info(&service, &video, json).await?;
        }
        Commands::Encode {
            video,
            sampling,
            output_dir,
        } => {
            let service = config::build_service(&config)?;
            encode(&service, &video, &sampling, output_dir.as_deref()).await?;
        }
        Commands::Chat {
            video,
            question,
            sampling,
        } => {
            let service = config::build_service(&config)?;
            let response = service
                .chat_with_video(&video, &question, sampling.fps, sampling.force_packing)
                .await?;
            println!("{}", response.content);
            info!(
                latency_ms = response.latency_ms,
                tokens = response.tokens_used,
                "Answered"
            );
        }
        Commands::Batch {
            video,
            questions,
            sampling,
            output,
        } => {
            let service = config::build_service(&config)?;
            batch(&service, &video, &questions, &sampling, output.as_deref()).await?;
        }
        Commands::Interactive { video, sampling } => {
            let service = config::build_service(&config)?;
            interactive(&service, &video, &sampling).await?;
        }
        Commands::Serve { port, bind } => {
            let service = config::build_service(&config)?;
            let server = config.server.clone().unwrap_or_default();
            let bind = bind
                .or(server.bind)
                .unwrap_or_else(|| "127.0.0.1".to_string());
            let port = port
                .or(server.port)
                .unwrap_or(reelchat_config::defaults::DEFAULT_SERVER_PORT);
            run_server(service, &bind, port).await?;
        }
        Commands::Config { action } => run_config(action, &cli.overrides, &config).await?,
    }

    Ok(())
}

async fn show_info(service: &VideoChatService, video: &Path, json: bool) -> Result<()> {
    let info = service.video_info(video).await?;
    let preview = VideoPreview::from(&info);
    if json {
        let body = serde_json::json!({ "info": info, "preview": preview });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let rows = vec![
        vec!["Duration".to_string(), preview.duration],
        vec!["FPS".to_string(), preview.fps],
        vec!["Total frames".to_string(), preview.total_frames.to_string()],
        vec!["Resolution".to_string(), preview.resolution],
        vec![
            "Estimated samples".to_string(),
            preview.estimated_sample_frames.to_string(),
        ],
    ];
    print!(
        "{}",
        render_table(&[Column::left("Property"), Column::right("Value")], &rows)
    );
    Ok(())
}

async fn encode(
    service: &VideoChatService,
    video: &Path,
    sampling: &SamplingArgs,
    output_dir: Option<&Path>,
) -> Result<()> {
    let encoded = service
        .process_video(video, sampling.fps, sampling.force_packing)
        .await?;
    println!("{}", serde_json::to_string_pretty(&encoded.summary())?);

    if let Some(dir) = output_dir {
        let written = save_frames(&encoded.frames, dir, service.options().frame_format)?;
        note_success(&format!(
            "Wrote {} frames to {}",
            written.len(),
            dir.display()
        ));
    }
    Ok(())
}

async fn batch(
    service: &VideoChatService,
    video: &Path,
    questions_file: &Path,
    sampling: &SamplingArgs,
    output: Option<&Path>,
) -> Result<()> {
    let questions = config::read_questions(questions_file).await?;
    if questions.is_empty() {
        note_warn(&format!("No questions in {}", questions_file.display()));
        return Ok(());
    }

    let answers = service
        .batch_chat(video, &questions, sampling.fps, sampling.force_packing)
        .await?;

    let rows: Vec<Vec<String>> = answers
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let result = match (&a.answer, &a.error) {
                (Some(answer), _) => answer.replace('\n', " "),
                (None, Some(error)) => format!("error: {error}"),
                (None, None) => String::new(),
            };
            vec![(i + 1).to_string(), a.question.clone(), result]
        })
        .collect();
    print!(
        "{}",
        render_table(
            &[
                Column::right("#"),
                Column::left("Question").max_width(40),
                Column::left("Answer").max_width(80),
            ],
            &rows
        )
    );

    let failed = answers.iter().filter(|a| !a.is_ok()).count();
    if failed > 0 {
        note_warn(&format!("{failed} of {} questions failed", answers.len()));
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&answers)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write answers to {}", path.display()))?;
        note_success(&format!("Saved answers to {}", path.display()));
    }
    Ok(())
}

async fn interactive(service: &VideoChatService, video: &Path, sampling: &SamplingArgs) -> Result<()> {
    let encoded = service
        .process_video(video, sampling.fps, sampling.force_packing)
        .await?;
    note_info(&format!(
        "Encoded {} frames in {} groups. Type a question, or `quit` to leave.",
        encoded.frame_count(),
        encoded.temporal_groups.len()
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stream_write(&mut std::io::stdout(), &format!("{BOLD}> {RESET}"))?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }
        match service.chat_with_frames(&encoded, question).await {
            Ok(response) => {
                println!("{}", response.content);
                println!("{DIM}({} ms){RESET}", response.latency_ms);
            }
            Err(e) => note_error(&format!("{e:#}")),
        }
    }
    Ok(())
}

async fn run_config(action: ConfigAction, overrides: &Overrides, config: &ReelChatConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let view = config::redacted_view(config)?;
            println!("{}", serde_json::to_string_pretty(&view["config"])?);
        }
        ConfigAction::Path => println!("{}", overrides.config_path().display()),
        ConfigAction::Init { force } => {
            let path = overrides.config_path();
            if path.exists() && !force {
                note_warn(&format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                ));
                return Ok(());
            }
            write_config(config, &path).await?;
            note_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}

async fn run_server(service: VideoChatService, bind: &str, port: u16) -> Result<()> {
    info!(
        port,
        bind = %bind,
        config = %config_file_path(&reelchat_config::config_dir()).display(),
        "Starting reelchat API"
    );

    let app_state = Arc::new(AppState { service });
    let app = api::build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let addr = format!("{bind}:{port}");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app).await?;
    Ok(())
}

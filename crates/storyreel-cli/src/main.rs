//! StoryReel CLI
//!
//! Headless front end for the caption and segment pipeline. Command results
//! are printed to stdout as JSON; logs go to stderr and optionally to a daily
//! rolling file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use storyreel::core::analysis::analyze_first_frame;
use storyreel::core::captions::{
    create_captions, create_srt_captions, CaptionEntry, CaptionStyle,
};
use storyreel::core::ffmpeg::{detect_ffmpeg, FFmpegRunner, FFmpegThreadManager, SystemInfo};
use storyreel::core::render::{
    assemble_final_video, concatenate_encoded_segments, encode_segments_in_parallel,
    ClosingCredits, FinalVideoOptions,
};
use storyreel::core::settings::PipelineConfig;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "storyreel", version, about = "Caption, encode and assemble story videos")]
struct Cli {
    /// Pipeline config (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the caption region and colors for a video's first frame
    Roi {
        video: PathBuf,
    },
    /// Burn captions from a JSON caption list into a video
    Caption {
        video: PathBuf,
        captions: PathBuf,
        output: PathBuf,
        /// Boxed full-line captions instead of per-word captions
        #[arg(long = "static")]
        static_style: bool,
    },
    /// Write an SRT file from a JSON caption list
    Srt {
        captions: PathBuf,
        output: Option<PathBuf>,
    },
    /// Re-encode segments in parallel
    Encode {
        #[arg(required = true)]
        segments: Vec<PathBuf>,
        #[arg(long)]
        output_dir: PathBuf,
        /// Worker count (defaults to cores - 1)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Join encoded segments without re-encoding
    Concat {
        #[arg(required = true)]
        segments: Vec<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Join segments and add music and closing credits
    Assemble {
        #[arg(required = true)]
        segments: Vec<PathBuf>,
        #[arg(long)]
        output_dir: PathBuf,
        /// Background music mixed under the narration
        #[arg(long)]
        music: Option<PathBuf>,
        /// Closing credits poster image
        #[arg(long, requires = "credits_song")]
        poster: Option<PathBuf>,
        /// Closing credits song
        #[arg(long, requires = "poster")]
        credits_song: Option<PathBuf>,
        /// Lyrics shown over the closing credits
        #[arg(long, default_value = "")]
        lyrics: String,
    },
    /// Print the ffmpeg thread budget for this machine
    Threads,
}

fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout carries command output
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.map(|dir| {
        let _ = std::fs::create_dir_all(dir);
        let file_appender = tracing_appender::rolling::daily(dir, "storyreel.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_captions(path: &Path) -> Result<Vec<CaptionEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read captions {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid caption list in {}", path.display()))
}

fn runner(config: &PipelineConfig) -> Result<FFmpegRunner> {
    let info = detect_ffmpeg(
        config.ffmpeg.ffmpeg_path.as_deref(),
        config.ffmpeg.ffprobe_path.as_deref(),
    )
    .context("FFmpeg is required for this command")?;
    info!(ffmpeg = %info.ffmpeg_path.display(), version = %info.version, "Using FFmpeg");
    Ok(FFmpegRunner::new(info))
}

#[derive(Serialize)]
struct ThreadBudget {
    system: SystemInfo,
    ci_mode: bool,
    baseline_threads: usize,
    max_concurrent_operations: usize,
    /// Threads per operation by number of concurrent operations
    per_operation: Vec<usize>,
}

fn thread_budget(threads: &FFmpegThreadManager) -> ThreadBudget {
    let max = threads.max_concurrent_operations();
    ThreadBudget {
        system: threads.system(),
        ci_mode: threads.is_ci_mode(),
        baseline_threads: threads.baseline_threads(),
        max_concurrent_operations: max,
        per_operation: (0..=max).map(|others| threads.threads_for_others(others)).collect(),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load_or_default(cli.config.as_deref());
    let threads = FFmpegThreadManager::detect(config.ffmpeg.ci_mode);

    match cli.command {
        Command::Roi { video } => {
            let tool = runner(&config)?;
            let analysis = analyze_first_frame(&tool, &video, config.captions.roi_block_size)
                .with_context(|| format!("Failed to analyze {}", video.display()))?;
            print_json(&analysis)
        }
        Command::Caption {
            video,
            captions,
            output,
            static_style,
        } => {
            let entries = read_captions(&captions)?;
            let style = if static_style {
                CaptionStyle::Static
            } else {
                CaptionStyle::Dynamic
            };
            let tool = runner(&config)?;
            let options = config.caption_options(Some(style));
            match create_captions(&tool, &threads, &video, &entries, &output, &options) {
                Some(path) => print_json(&path),
                None => bail!("Captioning {} failed", video.display()),
            }
        }
        Command::Srt { captions, output } => {
            let entries = read_captions(&captions)?;
            match create_srt_captions(&entries, output.as_deref()) {
                Some(path) => print_json(&path),
                None => bail!("Failed to write SRT"),
            }
        }
        Command::Encode {
            segments,
            output_dir,
            threads: workers,
        } => {
            let tool = runner(&config)?;
            let workers = workers.or(config.encoding.threads);
            let encoded =
                encode_segments_in_parallel(&tool, &threads, &segments, &output_dir, workers);
            if encoded.is_empty() {
                bail!("No segments were encoded");
            }
            print_json(&encoded)
        }
        Command::Concat { segments, output } => {
            let tool = runner(&config)?;
            match concatenate_encoded_segments(&tool, &threads, &segments, &output) {
                Some(path) => print_json(&path),
                None => bail!("Concatenation failed"),
            }
        }
        Command::Assemble {
            segments,
            output_dir,
            music,
            poster,
            credits_song,
            lyrics,
        } => {
            let tool = runner(&config)?;
            let closing_credits = match (poster, credits_song) {
                (Some(poster), Some(song)) => Some(ClosingCredits {
                    poster,
                    song,
                    lyrics,
                }),
                _ => None,
            };
            let options = FinalVideoOptions {
                background_music: music,
                music_volume: config.background_music_volume,
                closing_credits,
                captions: config.caption_options(None),
            };
            match assemble_final_video(&tool, &threads, &segments, &output_dir, &options, None) {
                Some(path) => print_json(&path),
                None => bail!("Final video assembly failed"),
            }
        }
        Command::Threads => print_json(&thread_budget(&threads)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref());
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_caption_static() {
        let cli = Cli::try_parse_from([
            "storyreel",
            "caption",
            "in.mp4",
            "captions.json",
            "out.mp4",
            "--static",
            "--config",
            "pipeline.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("pipeline.json")));
        assert!(matches!(
            cli.command,
            Command::Caption {
                static_style: true,
                ..
            }
        ));
    }

    #[test]
    fn test_assemble_credits_need_both_inputs() {
        let result = Cli::try_parse_from([
            "storyreel",
            "assemble",
            "a.mp4",
            "--output-dir",
            "out",
            "--poster",
            "poster.png",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_requires_segments() {
        assert!(Cli::try_parse_from(["storyreel", "encode", "--output-dir", "out"]).is_err());
    }

    #[test]
    fn test_read_captions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.json");
        std::fs::write(
            &path,
            r#"[{"text":"Hello there","start_time":0.0,"end_time":2.5},{"text":"Open","start_time":2.5}]"#,
        )
        .unwrap();

        let captions = read_captions(&path).unwrap();
        assert_eq!(captions.len(), 2);
        assert!(captions[1].is_open_ended());
        assert!(read_captions(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_thread_budget_table() {
        let threads =
            FFmpegThreadManager::new(SystemInfo::new(8, Some(32 * 1024 * 1024 * 1024)), false);
        let budget = thread_budget(&threads);
        assert_eq!(budget.per_operation[0], budget.baseline_threads);
        assert_eq!(budget.per_operation.len(), budget.max_concurrent_operations + 1);
        assert!(budget.per_operation.windows(2).all(|w| w[0] >= w[1]));
    }
}

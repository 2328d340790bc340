// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stagecraft headless host
//!
//! Plays a stored timeline from a fixed-rate tick and logs what it drives:
//! - Loads `HostConfig` from `stagecraft.ron` or the path given as argument
//! - Reads timelines and clip data from RON file repositories
//! - Advances the sequencer player every tick until the timeline completes
//!   or the configured run time elapses
//!
//! Evaluated frames are logged at debug level; run with
//! `RUST_LOG=stagecraft_host=debug` to see them. Run `stagecraft --help` for
//! the command line.

mod config;
mod error;
mod storage;

use clap::Parser;
use config::{HostConfig, DEFAULT_CONFIG_FILE};
use error::HostError;
use stagecraft_sequencer::{
    shared_timeline, AnimationFrame, ClipDataRepository, PlayerEvent, RepositoryError, Timeline,
    TimelineId, TimelinePlayer, TimelineRepository,
};
use std::path::PathBuf;
use std::time::Duration;
use storage::{FileClipDataRepository, FileTimelineRepository};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "stagecraft")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Headless Stagecraft timeline playback", long_about = None)]
struct Cli {
    /// Config file (RON)
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Write a default config to the config path and exit
    #[arg(long)]
    write_config: bool,
}

fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stagecraft_host=info,stagecraft_sequencer=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stagecraft host v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        tracing::error!("Host failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), HostError> {
    if cli.write_config {
        HostConfig::default().save(&cli.config)?;
        tracing::info!("Wrote default config to {}", cli.config.display());
        return Ok(());
    }

    let config = HostConfig::load_or_default(&cli.config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(play(config))
}

/// Load the configured timeline with its clip data attached
async fn load_timeline(
    config: &HostConfig,
    clips: &impl ClipDataRepository,
    timelines: &impl TimelineRepository,
) -> Result<Timeline, HostError> {
    let id = match config.timeline_id {
        Some(id) => TimelineId(id),
        None => timelines
            .list()
            .await?
            .into_iter()
            .next()
            .map(|(id, _)| id)
            .ok_or_else(|| HostError::NoTimeline(format!("{} holds no timelines", config.timeline_dir.display())))?,
    };

    let mut timeline = timelines.load(id).await?;
    for data_id in timeline.clip_data_ids() {
        match clips.load(data_id).await {
            Ok(data) => {
                timeline.attach_clip_data(&data);
            }
            Err(RepositoryError::NotFound(_)) => {
                tracing::warn!("Clip data {} is missing; clips using it stay silent", data_id);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(timeline)
}

fn describe_frame(frame: &AnimationFrame) -> String {
    frame
        .properties
        .iter()
        .map(|p| format!("{}={:.3}", p.name, p.value))
        .collect::<Vec<_>>()
        .join(" ")
}

async fn play(config: HostConfig) -> Result<(), HostError> {
    let run_duration = config.run_duration()?;
    let clips = FileClipDataRepository::new(&config.clip_data_dir);
    let timelines = FileTimelineRepository::new(&config.timeline_dir);
    let timeline = load_timeline(&config, &clips, &timelines).await?;

    tracing::info!(
        "Playing '{}' ({:.2}s, {} tracks) at {} Hz",
        timeline.name,
        timeline.duration(),
        timeline.track_count(),
        config.tick_rate_hz
    );

    let mut player = TimelinePlayer::new();
    player.set_looping(config.looping);
    player.set_speed(config.playback_speed);
    player.subscribe(|event| {
        if let PlayerEvent::AnimationEvaluate { target_id, frame } = event {
            tracing::debug!(
                "{:?} target {} @ {:.3}s: {}",
                frame.data_type,
                target_id,
                frame.time,
                describe_frame(frame)
            );
        }
    });
    player.set_sequence(Some(shared_timeline(timeline)));
    player.play();
    let player = player.into_shared();

    let delta_time = config.tick_interval();
    let mut interval = tokio::time::interval(Duration::from_secs_f32(delta_time));
    let deadline = tokio::time::Instant::now() + run_duration;

    loop {
        if interval.tick().await >= deadline {
            tracing::info!("Run time of {:.1}s reached", config.run_seconds);
            break;
        }

        let mut player = player.lock();
        player.update(delta_time);
        if !player.is_playing() {
            break;
        }
    }

    let player = player.lock();
    tracing::info!("Stopped at {:.3}s", player.current_time());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use stagecraft_sequencer::{
        AnimationClipData, DataType, InMemoryClipDataRepository, InMemoryTimelineRepository,
    };

    fn stored_timeline(data: &AnimationClipData) -> Timeline {
        let mut timeline = Timeline::new("Opening");
        let track = timeline.create_track("Camera", data.data_type()).id;
        timeline.add_clip(track, 1.0, data.clone()).unwrap();
        timeline
    }

    #[test]
    fn test_cli_defaults_to_config_file() {
        let cli = Cli::try_parse_from(["stagecraft"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(!cli.write_config);

        let cli = Cli::try_parse_from(["stagecraft", "show.ron", "--write-config"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("show.ron"));
        assert!(cli.write_config);
    }

    #[test]
    fn test_cli_rejects_unknown_flags() {
        let err = Cli::try_parse_from(["stagecraft", "--write-confg"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);

        let err = Cli::try_parse_from(["stagecraft", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[tokio::test]
    async fn test_first_stored_timeline_is_played_with_clip_data() {
        let clips = InMemoryClipDataRepository::new();
        let timelines = InMemoryTimelineRepository::new();
        let data = AnimationClipData::new(DataType::CameraPose).unwrap();
        clips.insert(data.clone());
        let stored = stored_timeline(&data);
        timelines.save(&stored).await.unwrap();

        let timeline = load_timeline(&HostConfig::default(), &clips, &timelines)
            .await
            .unwrap();
        assert_eq!(timeline.id, stored.id);
        let clip = &timeline.tracks().next().unwrap().clips()[0];
        assert_eq!(clip.clip_data().map(AnimationClipData::id), Some(data.id()));
    }

    #[tokio::test]
    async fn test_missing_clip_data_leaves_clip_unresolved() {
        let clips = InMemoryClipDataRepository::new();
        let timelines = InMemoryTimelineRepository::new();
        let data = AnimationClipData::new(DataType::LightPose).unwrap();
        let stored = stored_timeline(&data);
        timelines.save(&stored).await.unwrap();

        let config = HostConfig {
            timeline_id: Some(stored.id.0),
            ..HostConfig::default()
        };
        let timeline = load_timeline(&config, &clips, &timelines).await.unwrap();
        let clip = &timeline.tracks().next().unwrap().clips()[0];
        assert_eq!(clip.clip_data_id(), data.id());
        assert!(clip.clip_data().is_none());
    }

    #[tokio::test]
    async fn test_no_stored_timeline() {
        let clips = InMemoryClipDataRepository::new();
        let timelines = InMemoryTimelineRepository::new();
        let err = load_timeline(&HostConfig::default(), &clips, &timelines)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::NoTimeline(_)));
    }

    #[tokio::test]
    async fn test_unknown_timeline_id_is_not_found() {
        let clips = InMemoryClipDataRepository::new();
        let timelines = InMemoryTimelineRepository::new();
        let id = uuid::Uuid::new_v4();
        let config = HostConfig {
            timeline_id: Some(id),
            ..HostConfig::default()
        };
        let err = load_timeline(&config, &clips, &timelines).await.unwrap_err();
        assert!(matches!(err, HostError::Repository(RepositoryError::NotFound(found)) if found == id));
    }
}

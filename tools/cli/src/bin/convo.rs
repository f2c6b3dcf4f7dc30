use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use convo_engine::{
    conversation_schema_json, AudioClip, AudioPlayer, ContainerMode, ConversationBundle,
    ConversationLibrary, ConversationPlayer, ConversationState, DialogueUi, DialogueUpdate,
    EmptyScene, EngineConfig, PlaybackHost, PlaylistPlayback, PlaylistStatus,
};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const FRAME: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(author, version, about = "Conversation playback CLI")]
struct Cli {
    /// Engine config in TOML; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a conversation or container from a bundle in the terminal.
    Play {
        bundle: PathBuf,
        #[arg(long, conflicts_with = "container")]
        conversation: Option<String>,
        #[arg(long)]
        container: Option<String>,
        /// Start entry alias or conversation name inside the container.
        #[arg(long)]
        start: Option<String>,
        /// Loop a playlist container regardless of its own flag.
        #[arg(long = "loop", default_value_t = false)]
        looped: bool,
        #[arg(long)]
        language: Option<String>,
        /// Advance lines without waiting for Enter.
        #[arg(long, default_value_t = false)]
        auto: bool,
        #[arg(long, default_value_t = 100_000)]
        max_frames: usize,
    },
    /// Validate a bundle and list data issues.
    Check { bundle: PathBuf },
    /// Print the JSON schema of conversation bundles.
    Schema {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convo_engine=info,convo=info".into()),
        )
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            EngineConfig::load(path).with_context(|| format!("load {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    match cli.command {
        Command::Play {
            bundle,
            conversation,
            container,
            start,
            looped,
            language,
            auto,
            max_frames,
        } => play(
            config,
            &bundle,
            PlayTarget {
                conversation,
                container,
                start,
                looped,
            },
            language.as_deref(),
            auto,
            max_frames,
        ),
        Command::Check { bundle } => check(&bundle),
        Command::Schema { output } => schema(output.as_deref()),
    }
}

struct PlayTarget {
    conversation: Option<String>,
    container: Option<String>,
    start: Option<String>,
    looped: bool,
}

fn load_bundle(path: &Path) -> Result<ConversationBundle> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    let bundle = if is_yaml {
        serde_yaml::from_str(&raw).context("parse yaml bundle")?
    } else {
        ConversationBundle::from_json(&raw).context("parse json bundle")?
    };
    Ok(bundle)
}

fn load_library(path: &Path) -> Result<ConversationLibrary> {
    let bundle = load_bundle(path)?;
    Ok(ConversationLibrary::from_bundle(bundle)?)
}

fn check(path: &Path) -> Result<()> {
    let library = load_library(path)?;
    let issues = library.validate();
    for issue in &issues {
        match issue.line_index {
            Some(line) => println!("{}#{line}: {:?}", issue.conversation_id, issue.kind),
            None => println!("{}: {:?}", issue.conversation_id, issue.kind),
        }
    }
    if !issues.is_empty() {
        bail!("{} data issue(s) in {}", issues.len(), path.display());
    }
    println!("ok: {} conversation(s)", library.conversations().count());
    Ok(())
}

fn schema(output: Option<&Path>) -> Result<()> {
    let json = conversation_schema_json()?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Prints lines to stdout and waits for Enter unless running unattended.
struct ConsoleUi {
    auto: bool,
}

impl DialogueUi for ConsoleUi {
    fn update_dialogue_ui(&mut self, update: &DialogueUpdate<'_>) {
        let visuals: Vec<String> = update
            .visuals
            .iter()
            .map(|visual| format!("{}:{}", visual.character_id, visual.representation))
            .collect();
        if visuals.is_empty() {
            println!("{}: {}", update.speaker_name, update.text);
        } else {
            println!("{}: {}  [{}]", update.speaker_name, update.text, visuals.join(", "));
        }
    }

    fn update_for_language_change(&mut self, text: &str, language: &str) {
        println!("({language}) {text}");
    }

    fn poll_user_input(&mut self) -> bool {
        if self.auto {
            return true;
        }
        print!("> ");
        let _ = io::stdout().flush();
        let mut buffer = String::new();
        match io::stdin().lock().read_line(&mut buffer) {
            Ok(0) | Err(_) => {
                self.auto = true;
                true
            }
            Ok(_) => true,
        }
    }

    fn hide_dialogue(&mut self) {
        println!("---");
    }
}

/// Logs clips instead of playing them.
struct ConsoleAudio;

impl AudioPlayer for ConsoleAudio {
    fn play(&mut self, clip: &AudioClip) {
        info!(clip = clip.asset.as_str(), "audio");
    }

    fn is_playing(&self) -> bool {
        false
    }
}

fn play(
    config: EngineConfig,
    path: &Path,
    target: PlayTarget,
    language: Option<&str>,
    auto: bool,
    max_frames: usize,
) -> Result<()> {
    let library = Arc::new(load_library(path)?);
    let mut settings = config.language_settings();
    if let Some(code) = language {
        settings.set_language(code)?;
    }
    let mut player = ConversationPlayer::new(config, Arc::clone(&library));
    let mut ui = ConsoleUi { auto };
    let mut audio = ConsoleAudio;
    let mut scene = EmptyScene;
    let mut host = PlaybackHost {
        ui: &mut ui,
        audio: &mut audio,
        scene: &mut scene,
        language: &settings,
    };

    let mut playlist = None;
    match (&target.container, &target.conversation) {
        (Some(name), _) => {
            let container = library
                .container(name)
                .with_context(|| format!("unknown container '{name}'"))?;
            if container.mode == ContainerMode::Playlist {
                let loop_override = target.looped.then_some(true);
                playlist = Some(PlaylistPlayback::new(
                    &container,
                    &library,
                    target.start.as_deref(),
                    loop_override,
                ));
            } else {
                player.start_from_container(name, target.start.as_deref())?;
            }
        }
        (None, Some(id)) => {
            player.start_by_id(id)?;
        }
        (None, None) => {
            let first = library
                .conversations()
                .next()
                .cloned()
                .context("bundle contains no conversations")?;
            player.start_conversation(Some(first))?;
        }
    }

    let mut frames = 0;
    loop {
        if frames >= max_frames {
            info!(frames, "frame limit reached");
            break;
        }
        frames += 1;

        if let Some(playback) = playlist.as_mut() {
            if playback.tick(&mut player, FRAME)? == PlaylistStatus::Finished
                && player.state() == ConversationState::Idle
            {
                break;
            }
        }
        let state = player.tick(&mut host, FRAME);
        for event in player.drain_events() {
            debug!(event = %event.to_json_string(), "playback");
        }
        if playlist.is_none() && state == ConversationState::Idle {
            break;
        }
        if !auto {
            std::thread::sleep(FRAME);
        }
    }
    player.shutdown(&mut host);
    Ok(())
}

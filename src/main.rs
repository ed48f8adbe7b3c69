//! Application entry point: the `audiogen` command-line client.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`AppConfig`] from disk (defaults on first run).
//! 3. Resolve the library directories and credentials.
//! 4. Run the requested subcommand.  `generate` builds the pinned transport
//!    and the orchestrator; Ctrl-C while it runs cancels the request.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use audiogen::{
    config::{AppConfig, AppPaths, CredentialProvider, LibraryDirs, SharedCredentials},
    generation::AudioGenerator,
    models::{GenerationConfig, StaticVoiceRepository, VoiceRepository},
    network::{validate_url, RateLimiter, SecureTransport},
    security::{KeyPinner, PinSet},
    storage::{Library, LibraryItem, LocalFileStore},
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "audiogen", version, about = "Text-to-speech with a local audio library")]
struct Cli {
    /// Use this settings file instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate speech for TEXT and save it to the library.
    Generate {
        text: String,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        speed: Option<f64>,
        /// Output format (mp3, opus, aac, flac, wav, pcm).
        #[arg(long)]
        format: Option<String>,
        /// Delivery instructions (tone, pacing).
        #[arg(long)]
        instructions: Option<String>,
    },
    /// List library entries, newest first.
    List {
        /// Only entries whose name, voice, text or instructions match.
        #[arg(long)]
        search: Option<String>,
    },
    /// Delete an entry and its audio file.
    Delete { id: String },
    /// Copy an entry's audio into the downloads directory.
    Export { id: String },
    /// Show the available voices.
    Voices,
    /// Print the settings file location.
    ConfigPath,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let paths = AppPaths::new();
    let settings_file = cli.config.clone().unwrap_or_else(|| paths.settings_file.clone());

    let config = AppConfig::load_from(&settings_file).unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    let dirs = Arc::new(LibraryDirs::from_config(&config.storage, &paths));
    let store = Arc::new(LocalFileStore::new(dirs));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    match cli.command {
        Command::Generate {
            text,
            voice,
            model,
            speed,
            format,
            instructions,
        } => {
            let mut request = GenerationConfig::from_defaults(text, &config.generation)
                .with_instructions(instructions);
            if let Some(voice) = voice {
                request = request.with_voice(voice);
            }
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(speed) = speed {
                request = request.with_speed(speed);
            }
            if let Some(format) = format {
                request = request.with_response_format(format);
            }
            rt.block_on(generate(&config, store, request))
        }
        Command::List { search } => {
            let library = Library::new(store);
            let items = match search.as_deref() {
                Some(query) => library.search(query)?,
                None => library.list()?,
            };
            if items.is_empty() {
                println!("Library is empty.");
            }
            for item in &items {
                print_item(item);
            }
            Ok(())
        }
        Command::Delete { id } => {
            let entry = Library::new(store).delete(&id)?;
            println!("Deleted {} ({})", entry.id, entry.filename);
            Ok(())
        }
        Command::Export { id } => {
            let target = Library::new(store).export(&id)?;
            println!("{}", target.display());
            Ok(())
        }
        Command::Voices => rt.block_on(async {
            let repo = StaticVoiceRepository;
            let healthy = repo.check_server_health().await?;
            log::debug!("voice repository healthy: {healthy}");
            for voice in repo.fetch_voices(false).await? {
                let default = if voice.id == config.generation.voice { " (default)" } else { "" };
                println!("{:<8} {:<8} {}{default}", voice.id, voice.name, voice.description);
            }
            Ok::<(), anyhow::Error>(())
        }),
        Command::ConfigPath => {
            println!("{}", settings_file.display());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn generate(
    config: &AppConfig,
    store: Arc<LocalFileStore>,
    request: GenerationConfig,
) -> Result<()> {
    validate_url(&config.api.base_url)
        .with_context(|| format!("invalid api.base_url {:?}", config.api.base_url))?;

    let credentials = Arc::new(SharedCredentials::from_config(&config.api));
    if !credentials.has_api_key() {
        bail!(
            "no API key configured; set {} or api.api_key in the settings file",
            audiogen::config::API_KEY_ENV
        );
    }

    if request.is_near_char_limit() {
        log::warn!(
            "input is {} characters, close to the {} limit",
            request.char_count(),
            GenerationConfig::MAX_INPUT_CHARS
        );
    }

    let pins = PinSet::from_config(&config.pinning)?;
    if pins.is_empty() {
        log::warn!("certificate pinning is disabled");
    }
    let transport = SecureTransport::new(&config.api, Arc::new(KeyPinner::new(pins)))?;

    let generator = AudioGenerator::new(
        Arc::new(transport),
        Arc::new(RateLimiter::from_config(&config.rate_limit)),
        store.clone(),
        credentials,
        config.api.base_url.clone(),
    );

    let generation = generator.generate_audio(request);
    tokio::pin!(generation);
    let result = loop {
        tokio::select! {
            result = &mut generation => break result,
            _ = tokio::signal::ctrl_c() => {
                log::warn!("interrupt received, cancelling generation");
                generator.cancel_generation();
            }
        }
    };

    let entry = result?;
    println!("{}", entry.full_path(&store.outputs_root()).display());
    Ok(())
}

fn print_item(item: &LibraryItem) {
    let size = item
        .file_size
        .map(|bytes| format!("{:.1} KB", bytes as f64 / 1024.0))
        .unwrap_or_else(|| "missing".into());
    println!(
        "{}  {}  {:<8} {:>10}  {}",
        item.entry.id,
        item.entry.timestamp.format("%Y-%m-%d %H:%M"),
        item.entry.voice,
        size,
        item.preview(60)
    );
}

mod bridge;
mod bridge_host;
mod clipboard;
mod feedback;
mod history;
mod ipc;
mod service;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dicta_core::{ApiConfig, Persona, RecorderHandle, Settings, Visualizer};

#[derive(Parser)]
#[command(name = "dicta")]
#[command(version)]
#[command(about = "Hold a key, speak, release: formatted text lands where you type")]
#[command(after_help = "Run 'dicta' without arguments to record once (press Enter to stop).")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the background service that listens for the push-to-talk key
    Listen,

    /// Stop the background service
    Stop,

    /// Check service status
    Status,

    /// Configure settings (API keys, persona, post-processing)
    Config {
        /// Set the transcription provider API key
        #[arg(long)]
        stt_key: Option<String>,

        /// Set the rewrite provider API key
        #[arg(long)]
        llm_key: Option<String>,

        /// Select a persona ("formal-legal", "technical", "casual",
        /// "thought-organizer") or "none"
        #[arg(long)]
        persona: Option<String>,

        /// Enable or disable post-processing globally
        #[arg(long)]
        post_processing: Option<bool>,

        /// Custom prompt template with a {transcript} placeholder;
        /// pass an empty string to clear
        #[arg(long)]
        custom_prompt: Option<String>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// Run the input-bridge helper process (spawned by the service)
    #[command(hide = true)]
    Bridge {
        /// Trigger key name (e.g. "capslock")
        #[arg(long)]
        trigger: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr: the bridge child uses stdout as its event channel.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dicta=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Listen) => run_listen().await,
        Some(Commands::Stop) => run_stop(),
        Some(Commands::Status) => run_status(),
        Some(Commands::Config {
            stt_key,
            llm_key,
            persona,
            post_processing,
            custom_prompt,
            show,
        }) => run_config(stt_key, llm_key, persona, post_processing, custom_prompt, show),
        Some(Commands::Bridge { trigger }) => bridge::run(&trigger),
        None => run_record_once().await,
    }
}

/// Run the background service
async fn run_listen() -> Result<()> {
    // Check if service is already running
    if ipc::is_service_running() {
        eprintln!("Error: dicta service is already running.");
        eprintln!("Use 'dicta stop' to stop the existing service first.");
        std::process::exit(1);
    }

    let settings = Settings::load();

    // Fail fast when transcription cannot possibly work.
    let env = ApiConfig::from_env();
    if let Err(e) = settings.stt_config(&env) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    if bridge::parse_trigger_key(&settings.trigger_key).is_none() {
        eprintln!(
            "Error: unknown trigger key {:?} in {}",
            settings.trigger_key,
            Settings::path().display()
        );
        std::process::exit(1);
    }

    // Write PID file
    ipc::write_pid_file()?;

    // Set up cleanup on exit
    let _cleanup = CleanupGuard;

    // The global hook lives in its own process.
    let bridge = bridge_host::BridgeHost::spawn(&settings.trigger_key)?;

    let service = service::Service::new(settings, bridge);

    let service_task = tokio::spawn(async move { service.run().await });

    tokio::select! {
        result = service_task => {
            // Service exited on its own
            result?
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            Ok(())
        }
    }
}

/// Stop the service
fn run_stop() -> Result<()> {
    let mut client = ipc::IpcClient::connect()?;
    let _ = client.send_message(ipc::IpcMessage::Stop)?;
    println!("Service stopped");
    Ok(())
}

/// Check service status
fn run_status() -> Result<()> {
    if !ipc::is_service_running() {
        println!("Status: Not running");
        println!("Start with: dicta listen");
        return Ok(());
    }

    let mut client = ipc::IpcClient::connect()?;
    let response = client.send_message(ipc::IpcMessage::Status)?;

    match response {
        ipc::IpcResponse::Idle => println!("Status: Running (idle)"),
        ipc::IpcResponse::Recording => println!("Status: Running (recording)"),
        ipc::IpcResponse::Processing => println!("Status: Running (processing)"),
        ipc::IpcResponse::Error(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        _ => println!("Status: Running"),
    }

    Ok(())
}

/// One-shot mode: record until Enter, run the pipeline, copy the result to
/// the clipboard. No injection, no service.
async fn run_record_once() -> Result<()> {
    let settings = Settings::load();
    let env = ApiConfig::from_env();
    if let Err(e) = settings.stt_config(&env) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    let visualizer = Arc::new(Visualizer::new());
    let recorder = RecorderHandle::start(visualizer)?;

    print!("Recording... (press Enter to stop)");
    io::stdout().flush()?;
    wait_for_enter()?;

    let recording = recorder.finalize()?;

    print!("\rTranscribing...                        \n");
    io::stdout().flush()?;

    let pipeline = service::build_pipeline(&settings, &env)?;
    let result = tokio::task::spawn_blocking(move || pipeline.run(&recording)).await?;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Transcription error: {e:#}");
            std::process::exit(1);
        }
    };

    if result.final_text.trim().is_empty() {
        println!("Nothing was transcribed.");
        return Ok(());
    }

    clipboard::copy_to_clipboard(&result.final_text)?;

    println!("Copied to clipboard");

    Ok(())
}

/// Configure settings
fn run_config(
    stt_key: Option<String>,
    llm_key: Option<String>,
    persona: Option<String>,
    post_processing: Option<bool>,
    custom_prompt: Option<String>,
    show: bool,
) -> Result<()> {
    let mut settings = Settings::load();
    let mut changed = false;

    if let Some(key) = stt_key {
        settings.stt.api_key = Some(key);
        changed = true;
    }

    if let Some(key) = llm_key {
        settings.llm.api_key = Some(key);
        changed = true;
    }

    if let Some(name) = persona {
        if name == "none" {
            settings.persona = None;
        } else if Persona::from_name(&name).is_some() {
            settings.persona = Some(name);
        } else {
            let known: Vec<&str> = Persona::ALL.iter().map(|p| p.name()).collect();
            eprintln!(
                "Unknown persona {:?}. Available: {}, none",
                name,
                known.join(", ")
            );
            std::process::exit(1);
        }
        changed = true;
    }

    if let Some(enabled) = post_processing {
        settings.post_processing = enabled;
        changed = true;
    }

    if let Some(template) = custom_prompt {
        settings.custom_prompt = if template.is_empty() {
            None
        } else {
            Some(template)
        };
        changed = true;
    }

    if changed {
        settings.save()?;
        println!("Settings saved to {}", Settings::path().display());
    }

    if show || !changed {
        println!("Config file: {}", Settings::path().display());
        println!("Trigger key: {} (hold {}ms)", settings.trigger_key, settings.hold_threshold_ms);
        println!("Minimum duration: {}ms", settings.min_duration_ms);
        println!(
            "Post-processing: {}",
            if settings.post_processing { "on" } else { "off" }
        );
        println!(
            "Persona: {}",
            settings.persona.as_deref().unwrap_or("none")
        );
        println!(
            "Custom prompt: {}",
            if settings.custom_prompt.is_some() { "set" } else { "not set" }
        );
        println!("STT: {} ({})", settings.stt.model, settings.stt.endpoint);
        println!("STT key: {}", describe_key(settings.stt.api_key.as_deref(), "DICTA_STT_API_KEY"));
        println!("LLM: {} ({})", settings.llm.model, settings.llm.endpoint);
        println!("LLM key: {}", describe_key(settings.llm.api_key.as_deref(), "DICTA_LLM_API_KEY"));
    }

    Ok(())
}

fn describe_key(key: Option<&str>, env_var: &str) -> String {
    match key {
        Some(key) if key.len() > 10 => {
            format!("{}...{}", &key[..6], &key[key.len() - 4..])
        }
        Some(_) => "***".to_string(),
        None => format!("(not set, using ${env_var})"),
    }
}

fn wait_for_enter() -> Result<()> {
    let mut input = String::new();
    io::stdout().flush()?;
    io::stdin().read_line(&mut input)?;
    Ok(())
}

/// Guard to clean up PID and socket files on exit
struct CleanupGuard;

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        ipc::remove_pid_file();
    }
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use beacon_desk::config::LoadOptions;
use beacon_desk::display::{Display, format_temperature};
use beacon_desk::hardware::{ConsoleDriver, ProbeOutcome};
use beacon_desk::history::TurnHistory;
use beacon_desk::pipeline::{
    Collaborators, InteractionPipeline, PipelineSettings, TurnInput,
};
use beacon_desk::storage::FsBlobStore;
use beacon_desk::voice::{AudioCapture, AudioOutput, AudioPlayback, StopFlag};
use beacon_desk::{Config, Daemon, Error};

/// beacon-desk - desk voice assistant with a clock/weather idle view
#[derive(Parser)]
#[command(name = "beacon-desk", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/omni/beacon-desk/config.toml)
    #[arg(short, long, env = "BEACON_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable microphone and speaker (text only)
    #[arg(long, env = "BEACON_DISABLE_VOICE")]
    no_voice: bool,

    /// Skip the startup network check
    #[arg(long)]
    skip_connectivity: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Probe the display wiring candidates and print the result
    Probe,
    /// Fetch the weather once
    Weather,
    /// Ask one question and print the reply
    Ask {
        /// Question text; the wake phrase is optional
        text: Vec<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,beacon_desk=info",
        1 => "info,beacon_desk=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = LoadOptions {
        config_path: cli.config,
        disable_voice: cli.no_voice,
    };

    // Device tests don't need configuration
    match cli.command {
        Some(Command::TestMic { duration }) => return test_mic(duration).await,
        Some(Command::TestSpeaker) => return test_speaker().await,
        _ => {}
    }

    let config = Config::load(&options)?;
    tracing::debug!(?config, "loaded configuration");

    let daemon = Daemon::new(config)?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Probe => cmd_probe(&daemon),
            Command::Weather => cmd_weather(&daemon).await,
            Command::Ask { text } => cmd_ask(&daemon, &text.join(" ")).await,
            Command::TestTts { text } => test_tts(&daemon, &text).await,
            Command::TestMic { .. } | Command::TestSpeaker => Ok(()),
        };
    }

    tracing::info!(
        device = %daemon.config().device.name,
        voice = daemon.config().voice.enabled,
        "starting beacon-desk"
    );

    if cli.skip_connectivity {
        tracing::info!("connectivity check skipped");
    } else if let Err(e) = daemon.ensure_connectivity().await {
        // The service manager restarts us after a non-zero exit
        let delay = daemon.config().network.restart_delay;
        tracing::error!(error = %e, delay_secs = delay.as_secs(), "network unavailable, restarting");
        tokio::time::sleep(delay).await;
        return Err(e.into());
    }

    let mut driver = ConsoleDriver::new();
    daemon.run(&mut driver, shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Run the wiring probe and report the winner
fn cmd_probe(daemon: &Daemon) -> anyhow::Result<()> {
    let candidates = &daemon.config().display.candidates;
    println!("Probing {} wiring candidates...", candidates.len());
    for candidate in candidates {
        println!("  {candidate}");
    }

    let mut driver = ConsoleDriver::new();
    match daemon.probe_display(&mut driver) {
        ProbeOutcome::Found(mut active) => {
            println!("\nSelected: {}", active.profile);
            active.draw_boot("probe ok");
        }
        ProbeOutcome::NotFound => println!("\nNo display found, running headless"),
    }

    Ok(())
}

/// Fetch the weather once
async fn cmd_weather(daemon: &Daemon) -> anyhow::Result<()> {
    let Some(source) = daemon.weather_source() else {
        anyhow::bail!("weather not configured (location and OpenWeatherMap key required)");
    };

    let reading = source.fetch().await?;
    println!(
        "{}: {}",
        reading.place,
        format_temperature(Some(reading.temperature_c))
    );
    Ok(())
}

/// One text turn without display or audio
async fn cmd_ask(daemon: &Daemon, text: &str) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("nothing to ask");
    }

    let config = daemon.config();
    let collaborators = Collaborators {
        generator: daemon.generator(),
        transcriber: None,
        synthesizer: None,
        input: None,
        output: None,
        store: std::sync::Arc::new(FsBlobStore::open(config.staging_dir())?),
    };
    let mut pipeline = InteractionPipeline::new(
        PipelineSettings::from_config(config),
        collaborators,
        StopFlag::new(),
    );

    let mut history = TurnHistory::new(config.llm.max_history_pairs);
    let mut display = beacon_desk::display::HeadlessDisplay;
    let report = pipeline
        .run(TurnInput::Text(text.to_string()), &mut history, &mut display)
        .await;

    println!("{}", report.reply.unwrap_or_default());
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(40.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(40 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If the meter moved, the microphone works.");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is the mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    playback.play_samples(samples, &StopFlag::new()).await?;

    println!("\n---");
    println!("If you heard the tone, the speaker works.");
    println!("If not, check:");
    println!("  1. Run: pactl list sinks short");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output with the configured provider
#[allow(clippy::future_not_send)]
async fn test_tts(daemon: &Daemon, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let Some(synthesizer) = daemon.synthesizer() else {
        return Err(Error::Config("no TTS provider key configured".to_string()).into());
    };

    println!("Synthesizing speech...");
    let audio = synthesizer.synthesize(text).await?;
    println!(
        "Got {} bytes of {} audio",
        audio.bytes.len(),
        audio.format.as_str()
    );

    let mut playback = AudioPlayback::new()?;
    playback.play(&audio, &StopFlag::new()).await?;

    println!("\nDone.");
    Ok(())
}

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tutor::api::ApiServerBuilder;
use tutor::gateway::image_data_uri;
use tutor::session::ImageKind;
use tutor::voice::{AudioCapture, AudioPlayback, PLAYBACK_SAMPLE_RATE, calculate_energy, decode_mp3};
use tutor::{Config, DeviceAudio, ModelGateway, OpenAiGateway, SessionController};

/// Tutor - voice and image tutoring assistant
#[derive(Parser)]
#[command(name = "tutor", version, about)]
struct Cli {
    /// Port to listen on (overrides TUTOR_PORT and the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
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
    /// Describe an image once and print the analysis
    Analyze {
        /// Path to a JPEG or PNG image
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,tutor=info",
        1 => "info,tutor=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::Analyze { image } => analyze(&image).await,
        };
    }

    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let port = cli.port.unwrap_or(config.server.port);
    tracing::info!(
        port,
        chat_model = %config.models.chat,
        scratch_dir = %config.session.scratch_dir.display(),
        "starting tutor"
    );

    let gateway: Arc<dyn ModelGateway> = Arc::new(OpenAiGateway::new(&config));
    let audio = Arc::new(DeviceAudio::new(config.recording));
    let controller = Arc::new(SessionController::from_config(&config, gateway, audio));

    ApiServerBuilder::new(controller)
        .port(port)
        .static_dir(config.server.static_dir.clone())
        .build()
        .run()
        .await?;

    Ok(())
}

/// Test microphone input
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

        let samples = capture.drain();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]", i + 1, energy, peak, meter);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (PLAYBACK_SAMPLE_RATE as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());

    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_samples(&samples)).await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output through the configured provider
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let gateway = OpenAiGateway::new(&config);

    println!("Synthesizing speech...");
    let mp3_data = gateway.synthesize_speech(text, &config.models.voice).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    tokio::task::spawn_blocking(move || {
        let (samples, sample_rate) = decode_mp3(&mp3_data)?;
        AudioPlayback::with_sample_rate(sample_rate)?.play_samples(&samples)
    })
    .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Run one image analysis and print it
async fn analyze(path: &Path) -> anyhow::Result<()> {
    let kind = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => ImageKind::Jpeg,
        Some("png") => ImageKind::Png,
        _ => anyhow::bail!("expected a .jpg, .jpeg or .png file: {}", path.display()),
    };

    let config = Config::load()?;
    let bytes = tokio::fs::read(path).await?;
    let gateway = OpenAiGateway::new(&config);

    let analysis = gateway
        .analyze_image(
            &image_data_uri(kind.extension(), &bytes),
            &config.prompts.analysis,
            config.models.analysis_max_tokens,
        )
        .await?;

    println!("{analysis}");
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use voxloop::chat::client::HttpChatClient;
use voxloop::cli::{Cli, Commands};
use voxloop::config::Config;
use voxloop::session::orchestrator::{SessionCallbacks, VoiceSession};
use voxloop::session::status::SessionStatus;
use voxloop::stt::stdin::StdinRecognitionEngine;
use voxloop::tts::engine::PlaceholderSynthesis;
use voxloop::version_string;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.device.clone())?;

    match cli.command {
        None | Some(Commands::Run) => run_session(config, cli.quiet, cli.verbose).await,
        Some(Commands::Meter) => run_meter(config).await,
        Some(Commands::Devices) => list_audio_devices(),
        Some(Commands::Check) => {
            run_check(&config);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, device: Option<String>) -> Result<Config> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&path)?.with_env_overrides();
    if let Some(device) = device {
        config.audio.device = Some(device);
    }
    config.validate()?;
    Ok(config)
}

/// The conversation loop: typed input stands in for the platform speech
/// engine, replies stream from the chat backend and are echoed as speech.
async fn run_session(config: Config, quiet: bool, verbose: u8) -> Result<()> {
    let api_key = config.chat.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "no API key configured — set VOXLOOP_API_KEY or chat.api_key in {}",
            Config::default_path().display()
        )
    })?;

    let backend = Arc::new(HttpChatClient::new(
        config.chat.url.clone(),
        api_key,
        config.chat.model.clone(),
    )?);
    let synthesis = Arc::new(PlaceholderSynthesis::new().with_echo());
    let engine = Box::new(StdinRecognitionEngine::new());

    if !quiet {
        eprintln!(
            "voxloop {} — type your message; a {}ms pause sends it; Ctrl+C ends the session",
            version_string(),
            config.silence.silence_duration_ms
        );
    }

    let callbacks = SessionCallbacks {
        on_status: Box::new(move |status| {
            if verbose >= 1 {
                let name = match status {
                    SessionStatus::Idle => format!("{}", "idle".dimmed()),
                    SessionStatus::Connecting => format!("{}", "connecting".yellow()),
                    SessionStatus::Listening => format!("{}", "listening".green()),
                    SessionStatus::Processing => format!("{}", "processing".cyan()),
                    SessionStatus::Speaking => format!("{}", "speaking".magenta()),
                };
                eprintln!("voxloop: {}", name);
            }
        }),
        on_transcript: Box::new(move |text| {
            if verbose >= 2 {
                eprintln!("voxloop: transcript: {}", text);
            }
        }),
        on_reply: Box::new(|_| {
            // Replies reach the user through the synthesis echo.
        }),
        on_error: Box::new(move |err| {
            if !quiet {
                eprintln!("voxloop: {}", err.to_string().red());
            }
        }),
    };

    let mut session = VoiceSession::start(
        config.session_config(),
        engine,
        backend,
        synthesis,
        callbacks,
    )?;

    tokio::signal::ctrl_c().await?;
    session.end();
    if !quiet {
        eprintln!("\nvoxloop: session ended");
    }
    Ok(())
}

/// Live input level meter with end-of-utterance markers.
#[cfg(feature = "cpal-audio")]
async fn run_meter(config: Config) -> Result<()> {
    use voxloop::audio::capture::CpalAudioSource;
    use voxloop::audio::level::{AnalyzerCallbacks, AudioLevelAnalyzer};

    let threshold = config.silence.threshold;
    let source = Box::new(CpalAudioSource::new(config.audio.device.as_deref())?);

    let (silence_tx, silence_rx) = crossbeam_channel::unbounded();
    let callbacks = AnalyzerCallbacks {
        on_level: Box::new(move |level| render_meter(level, threshold)),
        on_silence: Box::new(move || {
            let _ = silence_tx.send(());
        }),
    };

    let mut analyzer = AudioLevelAnalyzer::start(config.analyzer_config(), source, callbacks)?;
    eprintln!("voxloop: speak to see the meter move; Ctrl+C exits");

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = stop_tx.send(());
    });

    loop {
        crossbeam_channel::select! {
            recv(silence_rx) -> _ => {
                eprintln!("\nvoxloop: {}", "end of utterance".green());
                analyzer.resume();
            }
            recv(stop_rx) -> _ => break,
        }
    }

    analyzer.stop();
    eprintln!();
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
async fn run_meter(_config: Config) -> Result<()> {
    anyhow::bail!("this build has no audio capture (cpal-audio feature disabled)")
}

/// Render one meter frame: filled cells for the current level, a marker at
/// the speech threshold.
#[cfg(feature = "cpal-audio")]
fn render_meter(level: f32, threshold: f32) {
    use std::io::Write;

    let bar_width = 30;
    let scale = |v: f32| ((v / 0.1).min(1.0) * bar_width as f32) as usize;
    let filled = scale(level);
    let marker = scale(threshold);

    let mut bar = String::with_capacity(bar_width);
    for i in 0..bar_width {
        if i < filled {
            bar.push(if i >= marker { '█' } else { '▒' });
        } else if i == marker {
            bar.push('│');
        } else {
            bar.push('░');
        }
    }

    eprint!("\r[{}] {:.3} ", bar, level);
    let _ = std::io::stderr().flush();
}

#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = voxloop::audio::capture::list_devices()?;
    if devices.is_empty() {
        eprintln!("voxloop: no usable audio input devices found");
    } else {
        println!("Available audio input devices:");
        for device in devices {
            println!("  {}", device);
        }
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    anyhow::bail!("this build has no audio capture (cpal-audio feature disabled)")
}

/// Capability and configuration diagnostics.
fn run_check(config: &Config) {
    let ok = |s: &str| format!("{}", s.green());
    let warn = |s: &str| format!("{}", s.yellow());

    println!("voxloop {}", version_string());

    #[cfg(feature = "cpal-audio")]
    {
        match voxloop::audio::capture::list_devices() {
            Ok(devices) if !devices.is_empty() => {
                println!("  audio capture:   {} ({} devices)", ok("available"), devices.len());
            }
            Ok(_) => println!("  audio capture:   {}", warn("no input devices")),
            Err(e) => println!("  audio capture:   {} ({})", warn("unavailable"), e),
        }
    }
    #[cfg(not(feature = "cpal-audio"))]
    println!("  audio capture:   {}", warn("disabled at build time"));

    println!("  recognition:     {} (typed input)", ok("available"));
    println!("  synthesis:       {} (console echo)", ok("available"));
    println!("  chat endpoint:   {}", config.chat.url);
    println!("  chat model:      {}", config.chat.model);
    match &config.chat.api_key {
        Some(_) => println!("  api key:         {}", ok("configured")),
        None => println!(
            "  api key:         {} (set VOXLOOP_API_KEY)",
            warn("missing")
        ),
    }
    println!(
        "  silence:         {} threshold, {}ms min speech, {}ms window",
        config.silence.threshold, config.silence.min_speech_ms, config.silence.silence_duration_ms
    );
}

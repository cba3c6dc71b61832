use std::io::BufRead;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use guide_cam::actions::UserAction;
use guide_cam::camera::{CameraBackend, CaptureSource, TestPatternBackend};
use guide_cam::cli::{handle_config_action, list_cameras, Args, Command};
use guide_cam::config::{BackendKind, CameraConfig, Config, SpeechConfig};
use guide_cam::detection::DetectionClient;
use guide_cam::detection_loop::DetectionLoop;
use guide_cam::notify::{CommandSpeaker, Cues, NotificationPolicy, Speaker, TerminalBell};
use guide_cam::status::ConsoleStatus;

/// Build the camera backend named in the config.
fn build_backend(config: &CameraConfig) -> Result<Box<dyn CameraBackend>, String> {
    match config.backend {
        BackendKind::TestPattern => Ok(Box::new(TestPatternBackend)),
        #[cfg(feature = "native-camera")]
        BackendKind::Native => Ok(Box::new(guide_cam::camera::NativeBackend::new(
            config.user_device,
            config.environment_device,
        ))),
        #[cfg(not(feature = "native-camera"))]
        BackendKind::Native => Err(
            "the native backend needs a build with `--features native-camera`".to_string(),
        ),
    }
}

fn build_notifier(config: &SpeechConfig) -> NotificationPolicy {
    if !config.enabled {
        log::info!("Speech disabled");
        return NotificationPolicy::silent();
    }
    let speaker = CommandSpeaker::detect(&config.command, config.args.clone())
        .map(|s| Box::new(s) as Box<dyn Speaker>);
    NotificationPolicy::new(speaker)
}

/// Forward stdin lines as actions. Runs on a plain thread so a pending read
/// never holds up runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::UnboundedSender<UserAction>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.parse::<UserAction>() {
                Ok(action) => {
                    if tx.send(action).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
        // EOF ends the session
        let _ = tx.send(UserAction::Quit);
    });
}

fn print_help() {
    println!("Commands: <enter>/toggle, start, stop, switch, camera, quit");
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();

    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .format_timestamp(None)
        .format_target(false)
        .init();

    match &args.command {
        Some(Command::ListCameras) => {
            if let Err(e) = list_cameras() {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            return;
        }
        Some(Command::Config { action }) => {
            if let Err(e) = handle_config_action(action, &args) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            return;
        }
        None => {}
    }

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    let endpoint = args.endpoint(&config);
    let timeout = Duration::from_secs(config.server.timeout_secs);
    let client = match DetectionClient::with_timeout(endpoint, timeout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Detection endpoint: {}", client.endpoint());

    let backend = match build_backend(&config.camera) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut detection_loop = DetectionLoop::new(
        CaptureSource::new(backend),
        client,
        Box::new(ConsoleStatus::stdout()),
    )
    .with_notifier(build_notifier(&config.speech))
    .with_cues(Some(Box::new(TerminalBell) as Box<dyn Cues>))
    .with_facing(config.camera.facing);

    let (tx, rx) = mpsc::unbounded_channel();

    let ctrlc_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, shutting down...");
        let _ = ctrlc_tx.send(UserAction::Quit);
    }) {
        log::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let _ = tx.send(UserAction::GetStarted);
    if args.auto_start {
        let _ = tx.send(UserAction::Start);
    }

    print_help();
    spawn_stdin_reader(tx);

    detection_loop.run(rx).await;
}

//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::camera::CameraFacing;
use crate::config::{BackendKind, Config};

/// Camera guidance client: posts frames to a detection service and speaks the answers
#[derive(Parser, Debug)]
#[command(name = "guide-cam")]
#[command(version, about = "Spoken camera guidance from a detection service", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Detection endpoint URL (overrides config and GUIDE_CAM_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Camera to open first
    #[arg(long, value_enum)]
    pub facing: Option<CameraFacing>,

    /// Camera backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Disable spoken guidance
    #[arg(long)]
    pub no_speech: bool,

    /// Start detecting as soon as the camera is ready
    #[arg(long)]
    pub auto_start: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file path
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    ListCameras,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved configuration
    Show,
    /// Create a default config file
    Init,
}

impl Args {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(facing) = self.facing {
            config.camera.facing = facing;
        }
        if let Some(backend) = self.backend {
            config.camera.backend = backend;
        }
        if self.no_speech {
            config.speech.enabled = false;
        }
    }

    /// Endpoint to use: `--endpoint` wins over everything in `config`.
    pub fn endpoint(&self, config: &Config) -> String {
        self.endpoint.clone().unwrap_or_else(|| config.endpoint())
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

//! Subcommand handlers for list-cameras and config actions.

use std::path::{Path, PathBuf};

use super::args::{Args, ConfigAction};
use crate::camera::CameraError;
use crate::config::{default_path as get_config_path, Config, ConfigError, DEFAULT_CONFIG_TOML};

/// Errors from subcommand handlers.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("Config file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Error writing '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// List available cameras and print them to stdout.
#[cfg(feature = "native-camera")]
pub fn list_cameras() -> Result<(), CommandError> {
    let devices = crate::camera::list_devices()?;
    if devices.is_empty() {
        println!("No cameras found.");
        println!();
        println!("Make sure your camera is connected and permissions are granted.");
    } else {
        println!("Available cameras:");
        for device in devices {
            println!("  {}", device);
        }
        println!();
        println!("Set camera.user_device / camera.environment_device to pick a camera.");
    }
    Ok(())
}

#[cfg(not(feature = "native-camera"))]
pub fn list_cameras() -> Result<(), CommandError> {
    println!("Built without the `native-camera` feature; only the test pattern is available.");
    println!("Rebuild with `--features native-camera` to use physical cameras.");
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: &ConfigAction, args: &Args) -> Result<(), CommandError> {
    let config_path = args.config.clone().unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            let mut config = Config::load(Some(config_path.as_path()))?;
            args.apply(&mut config);
            print!("{}", describe_config(&config, &args.endpoint(&config)));
            println!();
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            write_default_config(&config_path)?;
            println!("Created config file: {}", config_path.display());
            Ok(())
        }
    }
}

/// Human-readable summary of the resolved settings.
pub fn describe_config(config: &Config, endpoint: &str) -> String {
    let speech = if config.speech.enabled {
        format!("{} {}", config.speech.command, config.speech.args.join(" "))
            .trim_end()
            .to_string()
    } else {
        "off".to_string()
    };
    let device = |index: Option<u32>| index.map_or_else(|| "auto".to_string(), |i| i.to_string());

    let mut out = String::from("Current configuration:\n");
    out.push_str(&format!("  Endpoint: {}\n", endpoint));
    out.push_str(&format!("  Timeout: {}s\n", config.server.timeout_secs));
    out.push_str(&format!("  Camera: {}\n", config.camera.facing));
    out.push_str(&format!("  Backend: {:?}\n", config.camera.backend));
    out.push_str(&format!(
        "  Devices: user={}, environment={}\n",
        device(config.camera.user_device),
        device(config.camera.environment_device)
    ));
    out.push_str(&format!("  Speech: {}\n", speech));
    out
}

/// Write the default config to `path`. Refuses to overwrite.
pub fn write_default_config(path: &Path) -> Result<(), CommandError> {
    if path.exists() {
        return Err(CommandError::AlreadyExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CommandError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TOML).map_err(|e| CommandError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

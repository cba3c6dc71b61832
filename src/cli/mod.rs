//! Command-line interface definitions and subcommand handlers.

mod args;
mod commands;

pub use args::{Args, Command, ConfigAction};
pub use commands::{
    describe_config, handle_config_action, list_cameras, write_default_config, CommandError,
};

//! The finite set of user actions that drive the detection loop.

use std::str::FromStr;

/// A user command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Leave the welcome screen and open the camera
    GetStarted,
    /// Start detection if stopped, stop it if running
    ToggleDetection,
    Start,
    Stop,
    /// Switch to the other camera
    SwitchCamera,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown command '{0}'. Try: start, stop, toggle, switch, quit")]
pub struct UnknownAction(pub String);

impl FromStr for UserAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "t" | "toggle" => Ok(UserAction::ToggleDetection),
            "start" => Ok(UserAction::Start),
            "stop" => Ok(UserAction::Stop),
            "s" | "switch" => Ok(UserAction::SwitchCamera),
            "camera" | "get-started" => Ok(UserAction::GetStarted),
            "q" | "quit" | "exit" => Ok(UserAction::Quit),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

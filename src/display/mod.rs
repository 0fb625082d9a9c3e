// src/display/mod.rs
//! Display modes for navigation status

pub mod terminal;

use serde::{Deserialize, Serialize};

/// How a navigation run is presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Plain log lines
    #[default]
    Log,
    /// Full-screen status refreshed once per second
    Terminal,
}

/// Full-screen output only makes sense on an interactive terminal
pub fn can_use_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}

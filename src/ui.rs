// UI layer: terminal prompts (`dialoguer`), the wait spinner (`indicatif`)
// and colors (`crossterm`). Everything here blocks on the terminal; the
// activation and wait logic never touches the terminal directly.

use crossterm::style::Color;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::time::Duration;

use crate::activation::ManualActivationPrompt;
use crate::endpoints::EndpointSnapshot;

/// Whether a human can answer prompts: stdin is a terminal. Inside a batch
/// job it is not.
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Whether stdout should get colors and bold headers.
pub fn stdout_styled() -> bool {
    io::stdout().is_terminal()
}

/// Prints the activation URL and waits for ENTER.
pub struct TerminalPrompter;

impl ManualActivationPrompt for TerminalPrompter {
    fn confirm_activation(&self, endpoint: &EndpointSnapshot, url: &str) -> io::Result<()> {
        eprintln!(
            "Endpoint {} ({}) requires manual activation, please open the following URL in a browser to activate the endpoint:\n{url}",
            endpoint.display_name, endpoint.id
        );
        Input::<String>::new()
            .with_prompt("Press ENTER after activating the endpoint")
            .allow_empty(true)
            .interact_text()
            .map(|_| ())
    }
}

/// Ask for the authorization code after the user logged in.
pub fn prompt_auth_code(authorize_url: &str) -> io::Result<String> {
    eprintln!("Go to this URL and login:\n{authorize_url}");
    Input::<String>::new()
        .with_prompt("Copy the code you get after login here")
        .interact_text()
        .map(|code| code.trim().to_string())
}

/// Spinner on stderr, hidden automatically when stderr is not a terminal.
pub fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

pub fn job_status_color(status: &str) -> Option<Color> {
    match status {
        "IDLE" => Some(Color::Yellow),
        "RUNNING" => Some(Color::Green),
        "HELD" => Some(Color::Red),
        _ => None,
    }
}

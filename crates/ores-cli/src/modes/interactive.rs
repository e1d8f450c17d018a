//! Interactive mode: shows the page, then reads commands from stdin and
//! re-renders after each one.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ores_core::app::App;
use ores_core::render::terminal;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::cli::commands;

const HELP: &str = "\
Commands:
  signin [EMAIL]    Sign in (prompts for anything missing)
  signup [EMAIL]    Create an account
  signout           Sign out
  refresh           Reload the table
  html PATH         Write the current page as HTML
  help              Show this help
  quit              Exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    SignIn(Option<String>),
    SignUp(Option<String>),
    SignOut,
    Refresh,
    Html(Option<PathBuf>),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Input::Empty;
    };
    let arg = words.next().map(str::to_string);

    match command.to_ascii_lowercase().as_str() {
        "signin" | "login" => Input::SignIn(arg),
        "signup" | "register" => Input::SignUp(arg),
        "signout" | "logout" => Input::SignOut,
        "refresh" | "reload" | "r" => Input::Refresh,
        "html" => Input::Html(arg.map(PathBuf::from)),
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Reads one line after printing `label`. `None` on end of input.
    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush().context("flush stdout")?;
        self.lines.next_line().await.context("read stdin")
    }

    async fn credentials(&mut self, email: Option<String>) -> Result<Option<(String, String)>> {
        let email = match email {
            Some(email) => email,
            None => match self.ask("Email: ").await? {
                Some(email) => email,
                None => return Ok(None),
            },
        };
        let Some(password) = self.ask("Password: ").await? else {
            return Ok(None);
        };
        Ok(Some((email, password)))
    }
}

fn show(app: &App) {
    print!(
        "{}",
        terminal::render(app.state(), commands::terminal_width())
    );
}

pub async fn run(mut app: App) -> Result<()> {
    app.start().await;
    show(&app);
    println!("Type 'help' for commands.");

    let mut prompter = Prompter::new();
    while let Some(line) = prompter.ask("> ").await? {
        let input = parse_input(&line);
        debug!(?input, "interactive input");

        match input {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => {
                println!("{HELP}");
                continue;
            }
            Input::Unknown(command) => {
                println!("Unknown command '{command}'. Type 'help' for commands.");
                continue;
            }
            Input::Html(None) => {
                println!("Usage: html PATH");
                continue;
            }
            Input::Html(Some(path)) => {
                if let Err(e) = commands::write_html(&app, &path) {
                    println!("{e:#}");
                }
                continue;
            }
            Input::SignIn(email) => {
                let Some((email, password)) = prompter.credentials(email).await? else {
                    break;
                };
                app.sign_in(&email, &password).await;
            }
            Input::SignUp(email) => {
                let Some((email, password)) = prompter.credentials(email).await? else {
                    break;
                };
                app.sign_up(&email, &password).await;
            }
            Input::SignOut => app.sign_out().await,
            Input::Refresh => app.load_ores().await,
        }
        show(&app);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_and_aliases() {
        assert_eq!(
            parse_input("signin miner@example.com"),
            Input::SignIn(Some("miner@example.com".to_string()))
        );
        assert_eq!(parse_input("LOGIN"), Input::SignIn(None));
        assert_eq!(parse_input("signup"), Input::SignUp(None));
        assert_eq!(parse_input("logout"), Input::SignOut);
        assert_eq!(parse_input("  r "), Input::Refresh);
        assert_eq!(parse_input("q"), Input::Quit);
        assert_eq!(parse_input("?"), Input::Help);
    }

    #[test]
    fn test_parse_html_path() {
        assert_eq!(
            parse_input("html out/page.html"),
            Input::Html(Some(PathBuf::from("out/page.html")))
        );
        assert_eq!(parse_input("html"), Input::Html(None));
    }

    #[test]
    fn test_parse_blank_and_unknown() {
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input("dance"), Input::Unknown("dance".to_string()));
    }
}

//! Interactive, line-based dashboard.
//!
//! Each input line is one command. A failing command prints its error chain
//! and the dashboard keeps going; only `quit` or end of input stops it.

use crate::config::DEFAULT_EXPORT_FILE;
use crate::oauth::AuthSession;
use crate::report::{Report, build_report, today};
use crate::{Account, Connector};
use eyre::Context;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const HELP: &str = "\
commands:
  accounts          list connected accounts
  use <label>       switch to an account and show its report
  show              fetch the report for the current account again
  export [file]     write the last report as CSV (default video_analytics.csv)
  add [label]       connect another account
  code <code>       finish connecting with the code (or redirect URL) from the consent page
  help              show this message
  quit              leave the dashboard
";

const PROMPT: &str = "> ";

const NO_ARGUMENTS: [&str; 8] = ["accounts", "ls", "show", "help", "?", "quit", "exit", "q"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Accounts,
    Use(String),
    Show,
    Export(Option<PathBuf>),
    Add(Option<String>),
    Code(String),
    Help,
    Quit,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match (word, arg) {
            ("accounts" | "ls", None) => Ok(Self::Accounts),
            ("use", Some(label)) => Ok(Self::Use(label)),
            ("use", None) => Err("usage: use <label>".into()),
            ("show", None) => Ok(Self::Show),
            ("export", file) => Ok(Self::Export(file.map(PathBuf::from))),
            ("add", label) => Ok(Self::Add(label)),
            ("code", Some(code)) => Ok(Self::Code(code)),
            ("code", None) => Err("usage: code <authorization code>".into()),
            ("help" | "?", None) => Ok(Self::Help),
            ("quit" | "exit" | "q", None) => Ok(Self::Quit),
            (word, Some(_)) if NO_ARGUMENTS.contains(&word) => {
                Err(format!("`{word}` takes no arguments"))
            }
            (word, _) => Err(format!("unknown command `{word}`; type `help` for a list")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Dashboard {
    connector: Connector,
    current: Option<Account>,
    report: Option<Report>,
    sign_in: Option<AuthSession>,
    open_browser: bool,
}

impl Dashboard {
    pub fn new(connector: Connector, open_browser: bool) -> Self {
        Self {
            connector,
            current: None,
            report: None,
            sign_in: None,
            open_browser,
        }
    }

    /// Reads commands from `input` until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> eyre::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output.write_all(HELP.as_bytes()).await?;
        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;
            let Some(line) = lines.next_line().await.context("read command")? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let (out, flow) = match line.parse::<Action>() {
                Ok(action) => {
                    tracing::debug!(?action, "running dashboard command");
                    let mut out = String::new();
                    match self.execute(action, &mut out).await {
                        Ok(flow) => (out, flow),
                        Err(e) => (format!("{out}error: {e:#}\n"), Flow::Continue),
                    }
                }
                Err(usage) => (format!("{usage}\n"), Flow::Continue),
            };
            output.write_all(out.as_bytes()).await?;
            if flow == Flow::Quit {
                break;
            }
        }
        output.flush().await?;
        Ok(())
    }

    /// Runs one command, appending whatever it has to say to `out`.
    pub async fn execute(&mut self, action: Action, out: &mut String) -> eyre::Result<Flow> {
        match action {
            Action::Accounts => {
                let labels = self.connector.registry().labels().await?;
                if labels.is_empty() {
                    writeln!(out, "no accounts connected; use `add` to connect one")?;
                }
                for label in labels {
                    let marker = match &self.current {
                        Some(current) if current.label == label => '*',
                        _ => ' ',
                    };
                    writeln!(out, "{marker} {label}")?;
                }
            }
            Action::Use(label) => {
                let account = self.connector.connect(&label).await?;
                writeln!(out, "using {label}")?;
                self.current = Some(account);
                self.report = None;
                self.show(out).await?;
            }
            Action::Show => self.show(out).await?,
            Action::Export(file) => {
                let Some(report) = &self.report else {
                    eyre::bail!("nothing to export yet; run `show` first");
                };
                let path = file.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
                report.table.write_csv(&path).await?;
                writeln!(out, "wrote {} rows to {}", report.table.rows.len(), path.display())?;
            }
            Action::Add(label) => {
                let label = match label {
                    Some(label) => label,
                    None => self.connector.registry().next_label().await?,
                };
                let session = self.connector.oauth().begin_authentication(&label)?;
                let url = session.authorize_url().as_str();
                writeln!(out, "open this URL to connect {label}:\n\n  {url}\n")?;
                if self.open_browser {
                    if let Err(e) = webbrowser::open(url) {
                        tracing::warn!(error = %e, "could not open browser");
                    }
                }
                writeln!(out, "then run `code <code>` with the code you are given")?;
                self.sign_in = Some(session);
            }
            Action::Code(code) => {
                let Some(session) = self.sign_in.as_mut() else {
                    eyre::bail!("no sign-in in progress; run `add` first");
                };
                self.connector
                    .oauth()
                    .complete_authentication(session, &code, self.connector.store())
                    .await?;
                let label = session.label().to_string();
                writeln!(out, "connected {label}")?;
                self.current = Some(self.connector.connect(&label).await?);
                self.report = None;
            }
            Action::Help => out.push_str(HELP),
            Action::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn show(&mut self, out: &mut String) -> eyre::Result<()> {
        let Some(account) = &self.current else {
            eyre::bail!("no account selected; run `use <label>` first");
        };
        let report = build_report(&account.yt, today())
            .await
            .with_context(|| format!("build report for {}", account.label))?;
        self.connector.save_token(account).await?;
        write!(out, "{}: {report}", account.label)?;
        self.report = Some(report);
        Ok(())
    }
}

use clap::Parser;
use eyre::Context;
use std::io::IsTerminal;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_analytics_dashboard::Connector;
use youtube_analytics_dashboard::accounts::AccountRegistry;
use youtube_analytics_dashboard::config::{Cli, ClientSecrets, Command};
use youtube_analytics_dashboard::dashboard::Dashboard;
use youtube_analytics_dashboard::oauth::OAuthManager;
use youtube_analytics_dashboard::report::{build_report, today};
use youtube_analytics_dashboard::token_store::TokenStore;

async fn build_connector(
    client_secrets: &Path,
    redirect_uri: Option<&str>,
    registry: AccountRegistry,
) -> eyre::Result<Connector> {
    let secrets = ClientSecrets::from_file(client_secrets).await?;
    let redirect_uri = secrets.redirect_uri(redirect_uri)?;
    let oauth_manager = OAuthManager::new(&secrets, &redirect_uri)?;
    Ok(Connector::new(registry, oauth_manager))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let registry = AccountRegistry::new(TokenStore::new(&cli.credentials_dir));

    match cli.command {
        Command::Accounts => {
            let labels = registry.labels().await?;
            if labels.is_empty() {
                eprintln!("no accounts in {}", registry.store().dir().display());
            }
            for label in labels {
                println!("{label}");
            }
        }
        Command::AddAccount { label, no_browser } => {
            let connector =
                build_connector(&cli.client_secrets, cli.redirect_uri.as_deref(), registry).await?;
            let label = match label {
                Some(label) => label,
                None => connector.registry().next_label().await?,
            };
            let mut session = connector.oauth().begin_authentication(&label)?;
            let url = session.authorize_url().as_str();
            eprintln!("Open this URL to connect {label}:\n\n  {url}\n");
            if !no_browser {
                if let Err(e) = webbrowser::open(url) {
                    tracing::warn!(error = %e, "could not open browser");
                }
            }
            eprint!("Paste the authorization code (or the URL you were sent to): ");

            let mut pasted = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut pasted)
                .await
                .context("read authorization code")?;
            connector
                .oauth()
                .complete_authentication(&mut session, &pasted, connector.store())
                .await?;
            eprintln!("connected {label}");
        }
        Command::Report { account, csv } => {
            let connector =
                build_connector(&cli.client_secrets, cli.redirect_uri.as_deref(), registry).await?;
            let account = connector.connect(&account).await?;
            let report = build_report(&account.yt, today())
                .await
                .with_context(|| format!("build report for {}", account.label))?;
            connector.save_token(&account).await?;

            print!("{}: {report}", account.label);
            if let Some(path) = csv {
                report.table.write_csv(&path).await?;
                eprintln!("wrote {}", path.display());
            }
        }
        Command::Dashboard { no_browser } => {
            let connector =
                build_connector(&cli.client_secrets, cli.redirect_uri.as_deref(), registry).await?;
            let mut dashboard = Dashboard::new(connector, !no_browser);
            dashboard
                .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
        }
    }

    Ok(())
}

use std::io::{stderr, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use kdam::term;
use log::debug;
use tokio_util::sync::CancellationToken;

use common::payloads::EmailRequest;
use common::resolve_transfer_id;

mod api;
mod config;
mod external;
mod helpers;
mod list;
mod mimetype;
mod session;
mod show;
mod state;
mod upload;

use api::ApiClient;
use config::Settings;
use session::Session;

#[derive(Parser, Debug)]
#[command(name = "skiff", version, about = "Command-line client for a skiff transfer-sharing deployment")]
struct Cli {
    /// Backend base URL; overrides SKIFF_BASE_URL and the config file.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in to the identity provider and store a session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Remove the stored session
    Logout,
    /// Upload files and produce a share link
    Send {
        /// Files to upload, in order
        files: Vec<PathBuf>,
        /// Email the share link to this address once the upload finishes
        #[arg(long)]
        to: Option<String>,
        /// Message body for the emailed link
        #[arg(long)]
        message: Option<String>,
    },
    /// Print the metadata of one transfer
    Show {
        /// Transfer id or share link
        transfer: String,
    },
    /// Download files from a transfer
    Fetch {
        /// Transfer id or share link
        transfer: String,
        /// Zero-based index of a file to download; repeatable. Default: all files
        #[arg(long = "file")]
        files: Vec<usize>,
        /// Download the pre-built zip bundle instead of individual files
        #[arg(long)]
        zip: bool,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List transfers owned by the signed-in user
    List,
    /// Print a transfer's share link
    Link {
        /// Transfer id or share link
        transfer: String,
        /// Also place the link on the clipboard
        #[arg(long)]
        copy: bool,
        /// Also open the link in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Email a share link for an existing transfer
    Email {
        /// Transfer id or share link
        transfer: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Message body
        #[arg(long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("SKIFF_LOG", "warn"))
        .init();
    let tty = stderr().is_terminal();
    term::init(tty);

    let cli = Cli::parse();
    let settings = Settings::load(cli.base_url.clone())?;
    debug!("backend {}", settings.base_url);

    let http = reqwest::Client::builder()
        .user_agent(concat!("skiff/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .build()?;
    let session = Session::new(&settings, &http);

    // Ctrl-C flips the token; loops check it between requests, so the
    // in-flight request is never torn down mid-body.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupt received; stopping after the current request.");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => session::prompt_line("email")?,
            };
            let password = match std::env::var("SKIFF_PASSWORD") {
                Ok(p) if !p.is_empty() => p,
                _ => session::prompt_line("password")?,
            };
            let stored = session.login(&email, &password).await?;
            eprintln!("Signed in as {}.", stored.email);
        }

        Command::Logout => {
            session.clear()?;
            eprintln!("Signed out.");
        }

        Command::Send { files, to, message } => {
            if files.is_empty() {
                bail!("no files given");
            }
            if to.is_some() && session.load().is_none() {
                bail!("emailing the link requires sign-in; run `skiff login` first or drop --to");
            }
            let bearer = session.bearer(false).await?;
            let api = ApiClient::new(http.clone(), settings.base_url.clone(), bearer);
            let mut state = state::UploadState::new();
            upload::gather(&files, &mut state).await?;
            match upload::run(&api, &mut state, &cancel, tty).await {
                Ok(share_url) => {
                    println!("{share_url}");
                    if let Some(to) = to {
                        let token = session
                            .require(false, "skiff email <share-link> --to <address>")
                            .await?;
                        let api =
                            ApiClient::new(http.clone(), settings.base_url.clone(), Some(token));
                        upload::send_link_email(&api, &share_url, &to, message).await?;
                        eprintln!("Share link emailed to {to}.");
                    }
                }
                Err(e) => {
                    state.fail(format!("{e:#}"));
                    return Err(e);
                }
            }
        }

        Command::Show { transfer } => {
            let bearer = session.bearer(false).await?;
            let api = ApiClient::new(http.clone(), settings.base_url.clone(), bearer);
            show::show(&api, &settings, &transfer).await?;
        }

        Command::Fetch {
            transfer,
            files,
            zip,
            out,
        } => {
            // Downloads get a fresh token; long-lived sessions would
            // otherwise present a token about to expire mid-stream.
            let token = session
                .require(true, &format!("skiff fetch {transfer}"))
                .await?;
            let api = ApiClient::new(http.clone(), settings.base_url.clone(), Some(token));
            show::fetch(
                &api,
                &settings,
                &transfer,
                show::FetchArgs { files, zip, out },
                &cancel,
                tty,
            )
            .await?;
        }

        Command::List => {
            let token = session.require(false, "skiff list").await?;
            let api = ApiClient::new(http.clone(), settings.base_url.clone(), Some(token));
            list::list(&api, &settings).await?;
        }

        Command::Link {
            transfer,
            copy,
            open,
        } => {
            let bearer = session.bearer(false).await?;
            let api = ApiClient::new(http.clone(), settings.base_url.clone(), bearer);
            list::link(&api, &settings, &transfer, copy, open).await?;
        }

        Command::Email {
            transfer,
            to,
            message,
        } => {
            let Some(id) = resolve_transfer_id(&transfer) else {
                bail!("{transfer} is not a transfer id or share link");
            };
            let token = session
                .require(false, &format!("skiff email {transfer} --to {to}"))
                .await?;
            let api = ApiClient::new(http.clone(), settings.base_url.clone(), Some(token));
            api.send_email(&id, &EmailRequest { to: to.clone(), message })
                .await?;
            eprintln!("Share link emailed to {to}.");
        }
    }

    Ok(())
}

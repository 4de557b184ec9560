use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use tesla_api::endpoints::VehicleId;
use tesla_auth::{LoginStrategy, PkceChallenge, Session, Settings, Tokens};

#[derive(Parser)]
#[command(name = "tesla-auth", version, about = "Log in to the Tesla owner API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with email and password, optionally with an MFA passcode
    Login {
        #[arg(long, env = "TESLA_EMAIL")]
        email: String,

        #[arg(long, env = "TESLA_PASSWORD", hide_env_values = true)]
        password: String,

        /// One-time passcode from the authenticator app
        #[arg(long)]
        passcode: Option<String>,

        /// Use the legacy owner-API password grant
        #[arg(long, conflicts_with = "passcode")]
        owner_api: bool,
    },
    /// Log in through the browser and paste the callback URL back
    BrowserLogin,
    /// Exchange a refresh token for fresh tokens
    Refresh {
        #[arg(long, env = "TESLA_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
    /// List the vehicles on the account
    Vehicles {
        #[arg(long, env = "TESLA_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
    },
    /// Show the battery and charging state of a vehicle
    Charge {
        #[arg(long, env = "TESLA_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        #[arg(long)]
        vehicle_id: String,
    },
    /// Wake a vehicle and wait until it answers
    Wake {
        #[arg(long, env = "TESLA_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        #[arg(long)]
        vehicle_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    if let Err(e) = settings.validate() {
        bail!("Configuration validation failed: {}", e);
    }
    tracing::debug!("Configuration loaded successfully");

    let mut session = Session::new(&settings)?;

    match cli.command {
        Command::Login {
            email,
            password,
            passcode,
            owner_api,
        } => {
            let credential = SecretString::from(password);
            let strategy = match (passcode, owner_api) {
                (_, true) => LoginStrategy::OwnerApiPassword {
                    identity: email,
                    credential,
                },
                (Some(passcode), false) => LoginStrategy::Mfa {
                    identity: email,
                    credential,
                    passcode: SecretString::from(passcode),
                },
                (None, false) => LoginStrategy::PasswordGrant {
                    identity: email,
                    credential,
                },
            };
            let tokens = session.login(strategy).await?;
            print_tokens(tokens)?;
        }
        Command::BrowserLogin => {
            let pkce = PkceChallenge::generate();
            let authorize_url = session.auth_client().authorize_url(&pkce)?;

            if let Err(e) = open::that(authorize_url.as_str()) {
                eprintln!("Failed to open browser automatically: {}", e);
            }
            eprintln!("\nLog in with this URL if the browser did not open:");
            eprintln!("{}\n", authorize_url);
            eprintln!("After logging in the browser lands on a \"Page Not Found\" page.");
            eprintln!("Paste its full URL (or just the code) here:");

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            let code = code_from_input(&input).context("No authorization code entered")?;

            let tokens = session
                .login(LoginStrategy::AuthorizationCodeOnly {
                    code,
                    code_verifier: pkce.verifier,
                })
                .await?;
            print_tokens(tokens)?;
        }
        Command::Refresh { refresh_token } => {
            session.set_tokens(Tokens::new(String::new(), Some(refresh_token)));
            let tokens = session.refresh_tokens().await?;
            print_tokens(tokens)?;
        }
        Command::Vehicles { access_token } => {
            session.set_tokens(Tokens::new(access_token, None));
            for vehicle in session.vehicles().await? {
                println!(
                    "{}\t{}\t{}\t{:?}",
                    vehicle.id,
                    vehicle.vin,
                    vehicle.display_name.as_deref().unwrap_or("-"),
                    vehicle.state
                );
            }
        }
        Command::Charge {
            access_token,
            vehicle_id,
        } => {
            session.set_tokens(Tokens::new(access_token, None));
            match session.charge_state(&VehicleId::from(vehicle_id)).await? {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => bail!("Vehicle is not reachable, wake it first"),
            }
        }
        Command::Wake {
            access_token,
            vehicle_id,
        } => {
            session.set_tokens(Tokens::new(access_token, None));
            let outcome = session.wake_up(&VehicleId::from(vehicle_id)).await?;
            match outcome.shift_state() {
                Some(shift_state) => println!("awake, shift state {}", shift_state),
                None => bail!("Vehicle did not wake up in time"),
            }
        }
    }

    Ok(())
}

fn print_tokens(tokens: &Tokens) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(tokens)?);
    Ok(())
}

/// Accepts the callback URL the browser ended on, or the bare code.
fn code_from_input(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, code)| code.into_owned()),
        Err(_) => Some(input.to_string()),
    }
}

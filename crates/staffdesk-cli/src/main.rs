//! Staffdesk - a terminal front-end for hotel staff operations.
//!
//! Signs staff in and out against the hotel backend and lists service
//! requests, rooms and notifications.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use staffdesk_core::models::RequestFilters;
use staffdesk_core::{
    ApiError, Config, KeyringStore, PushTokenProvider, SessionState, StaffdeskClient,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable carrying a push token for this machine, if any.
const DEVICE_TOKEN_ENV: &str = "STAFFDESK_DEVICE_TOKEN";

const USAGE: &str = "\
Usage: staffdesk <command> [options]

Commands:
  login [email] [--remember]     Sign in (password is prompted)
  logout                         Sign out and forget stored tokens
  status                         Show the current session
  requests [--status S] [--priority P]
                                 List service requests
  rooms                          List rooms
  notifications [--limit N]      List recent notifications
";

/// Push token taken from the environment; desktops have no push service.
struct EnvPushToken;

#[async_trait]
impl PushTokenProvider for EnvPushToken {
    async fn obtain_token(&self) -> Option<String> {
        std::env::var(DEVICE_TOKEN_ENV).ok().filter(|t| !t.is_empty())
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Value following `flag` in `args`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let mut config = Config::load()?;
    let client = StaffdeskClient::new(&config, Arc::new(KeyringStore::new()), Arc::new(EnvPushToken))?;
    info!(api_base = %client.api.base_url(), "Staffdesk starting");

    match command {
        "login" => login(&client, &mut config, rest).await,
        "logout" => {
            client.session.restore_on_startup().await;
            client.session.logout().await;
            println!("Signed out.");
            Ok(())
        }
        "status" => {
            match client.session.restore_on_startup().await {
                SessionState::Authenticated(user) if user.is_placeholder() => {
                    println!("Signed in (server not reachable, identity unconfirmed)")
                }
                SessionState::Authenticated(user) => println!(
                    "Signed in as {} ({}{})",
                    user.id,
                    user.role,
                    user.hotel_id.map(|h| format!(", hotel {}", h)).unwrap_or_default()
                ),
                _ => println!("Not signed in."),
            }
            Ok(())
        }
        "requests" | "rooms" | "notifications" => {
            if !client.session.restore_on_startup().await.is_authenticated() {
                bail!("Not signed in. Run `staffdesk login --remember` first.");
            }
            match list(&client, command, rest).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    if client.session.handle_auth_failure(&e).await {
                        bail!("Session expired: {}. Please sign in again.", e.server_message());
                    }
                    bail!("{}", e.server_message())
                }
            }
        }
        "help" | "--help" | "-h" => {
            print!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

async fn login(client: &StaffdeskClient, config: &mut Config, args: &[String]) -> Result<()> {
    let remember = args.iter().any(|a| a == "--remember");
    let email = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .or_else(|| config.last_email.clone())
        .context("Email required: staffdesk login <email>")?;

    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    match client.session.login(&email, &password, remember).await {
        Ok(user) => {
            println!("Signed in as {} ({})", user.id, user.role);
            if !remember {
                println!("Tokens are kept for this run only; use --remember to stay signed in.");
            }
        }
        Err(e) => bail!("Login failed: {}", e.server_message()),
    }

    config.last_email = Some(email);
    config.save().context("Failed to save config")?;
    Ok(())
}

async fn list(client: &StaffdeskClient, command: &str, args: &[String]) -> Result<(), ApiError> {
    match command {
        "requests" => {
            let filters = RequestFilters {
                status: flag_value(args, "--status").map(str::to_string),
                priority: flag_value(args, "--priority").map(str::to_string),
            };
            let requests = client.api.fetch_requests(&filters).await?;
            if requests.is_empty() {
                println!("No service requests.");
            }
            for r in requests {
                println!(
                    "{:<10} room {:<6} {:<8} {:<12} {} [{}]",
                    r.requested_at.format("%m-%d %H:%M"),
                    r.room.room_number,
                    r.priority,
                    r.status,
                    r.title,
                    r.assignee_display()
                );
            }
        }
        "rooms" => {
            let rooms = client.api.fetch_rooms().await?;
            if rooms.is_empty() {
                println!("No rooms.");
            }
            for room in rooms {
                println!(
                    "{:<6} {:<12} {}",
                    room.room_number,
                    room.room_type,
                    if room.is_occupied { "occupied" } else { "vacant" }
                );
            }
        }
        _ => {
            let limit = flag_value(args, "--limit")
                .and_then(|v| v.parse().ok())
                .unwrap_or(staffdesk_core::api::client::DEFAULT_NOTIFICATION_LIMIT);
            let notifications = client.api.fetch_notifications(limit).await?;
            if notifications.is_empty() {
                println!("No notifications.");
            }
            for n in notifications {
                println!(
                    "{} {} {}: {}",
                    if n.is_read { " " } else { "*" },
                    n.created_at.format("%m-%d %H:%M"),
                    n.title,
                    n.message
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_value() {
        let args: Vec<String> = ["--status", "pending", "--priority"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(flag_value(&args, "--status"), Some("pending"));
        assert_eq!(flag_value(&args, "--priority"), None);
        assert_eq!(flag_value(&args, "--limit"), None);
    }
}

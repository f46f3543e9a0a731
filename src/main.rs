//! subman - command-line client for the Subscription Manager service

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subman_client::api::{mail, notifications, subscriptions};
use subman_client::config::Config;
use subman_client::session::SessionState;
use subman_client::Client;

#[derive(Parser)]
#[command(
    name = "subman",
    about = "Command-line client for the Subscription Manager API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and sign in
    Register { email: String, password: String },
    /// Sign in with an existing account
    Login { email: String, password: String },
    /// Sign out and discard stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List tracked subscriptions
    Subscriptions,
    /// Show one subscription
    Show { id: i64 },
    /// Track a subscription by hand
    Add {
        service_name: String,
        /// Cost per billing cycle
        #[arg(long)]
        cost: Option<f64>,
        /// monthly | annual | weekly | other
        #[arg(long)]
        cycle: Option<String>,
        /// Next renewal date (YYYY-MM-DD)
        #[arg(long)]
        renews: Option<chrono::NaiveDate>,
    },
    /// Change a subscription's status (active | cancelled | trial | paused)
    SetStatus { id: i64, status: String },
    /// Stop tracking a subscription
    Remove { id: i64 },
    /// List notifications
    Notifications,
    /// Mark one notification as read
    MarkRead { id: i64 },
    /// Mark every notification as read
    ReadAll,
    /// Show mail account connection status
    MailStatus,
    /// Trigger a mailbox scan for new subscriptions
    Scan,
    /// Disconnect the linked mail account
    Disconnect,
    /// Check that the backend is reachable
    Health,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;
    let client = Client::open(config)?;

    // Validate a persisted session before running the command; commands
    // simply see "not signed in" when this fails.
    if matches!(client.session().current(), SessionState::Restoring) {
        if let Err(error) = client.session().restore().await {
            debug!(%error, "Stored session could not be restored");
        }
    }

    match cli.command {
        Command::Register { email, password } => {
            let user = client.session().register(&email, &password).await?;
            println!("registered and signed in as {}", user.email);
        }
        Command::Login { email, password } => {
            let user = client.session().login(&email, &password).await?;
            println!("signed in as {}", user.email);
        }
        Command::Logout => {
            client.session().logout()?;
            println!("signed out");
        }
        Command::Whoami => match client.session().current() {
            SessionState::Authenticated(user) => println!("{}", user.email),
            _ => println!("not signed in"),
        },
        Command::Subscriptions => {
            let subs = subscriptions::list(client.dispatcher()).await?;
            if subs.is_empty() {
                println!("no subscriptions tracked");
            }
            for sub in subs {
                let cost = match (&sub.cost_amount, &sub.billing_cycle) {
                    (Some(amount), Some(cycle)) => {
                        format!("{amount} {} / {cycle}", sub.cost_currency)
                    }
                    (Some(amount), None) => format!("{amount} {}", sub.cost_currency),
                    _ => "-".to_string(),
                };
                let renewal = sub
                    .next_renewal_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<4} {:<24} {:<20} renews {renewal} [{}]",
                    sub.id, sub.service_name, cost, sub.status
                );
            }
        }
        Command::Show { id } => {
            let sub = subscriptions::get(client.dispatcher(), id).await?;
            println!("{:<16} {}", "service", sub.service_name);
            println!(
                "{:<16} {}",
                "cost",
                sub.cost_amount.as_deref().unwrap_or("-")
            );
            println!(
                "{:<16} {}",
                "billing cycle",
                sub.billing_cycle.as_deref().unwrap_or("-")
            );
            println!(
                "{:<16} {}",
                "next renewal",
                sub.next_renewal_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!("{:<16} {}", "status", sub.status);
            println!("{:<16} {}", "source", sub.source);
            if let Some(notes) = &sub.notes {
                println!("{:<16} {notes}", "notes");
            }
        }
        Command::Add {
            service_name,
            cost,
            cycle,
            renews,
        } => {
            let create = subscriptions::SubscriptionCreate {
                billing_cycle: cycle,
                cost_amount: cost,
                next_renewal_date: renews,
                service_name,
                ..Default::default()
            };
            let sub = subscriptions::create(client.dispatcher(), &create).await?;
            println!("tracking {} (id {})", sub.service_name, sub.id);
        }
        Command::SetStatus { id, status } => {
            let changes = subscriptions::SubscriptionUpdate {
                status: Some(status),
                ..Default::default()
            };
            let sub = subscriptions::update(client.dispatcher(), id, &changes).await?;
            println!("{} is now {}", sub.service_name, sub.status);
        }
        Command::Remove { id } => {
            subscriptions::delete(client.dispatcher(), id).await?;
            println!("removed subscription {id}");
        }
        Command::Notifications => {
            let unread = notifications::unread_count(client.dispatcher()).await?;
            for n in notifications::list(client.dispatcher()).await? {
                let marker = if n.read { ' ' } else { '*' };
                println!(
                    "{marker} [{}] {}: {}",
                    n.created_at.format("%Y-%m-%d %H:%M"),
                    n.title,
                    n.body
                );
            }
            println!("{unread} unread");
        }
        Command::MailStatus => {
            let status = mail::status(client.dispatcher()).await?;
            if status.connected {
                match status.last_sync_at {
                    Some(at) => println!("connected, last scan {}", at.format("%Y-%m-%d %H:%M")),
                    None => println!("connected, never scanned"),
                }
            } else {
                let url = mail::connect_url(client.dispatcher()).await?;
                println!("not connected; visit {url} to connect a mailbox");
            }
        }
        Command::Scan => {
            let outcome = mail::scan(client.dispatcher()).await?;
            println!(
                "scan finished: {} new subscriptions",
                outcome.new_subscriptions
            );
        }
        Command::MarkRead { id } => {
            notifications::mark_read(client.dispatcher(), id).await?;
            println!("marked notification {id} as read");
        }
        Command::ReadAll => {
            notifications::mark_all_read(client.dispatcher()).await?;
            println!("marked all notifications as read");
        }
        Command::Disconnect => {
            mail::disconnect(client.dispatcher()).await?;
            println!("mail account disconnected");
        }
        Command::Health => {
            let health = subman_client::api::health(client.dispatcher()).await?;
            println!("backend status: {}", health.status);
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_target(true))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

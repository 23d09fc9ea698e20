use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod api;
mod config;
mod errors;
mod models;
mod net;
mod store;
mod sync;

use models::comment::{origin_of, Comment};
use models::ticket::{Ticket, TicketRef};
use sync::service::{CommentService, Delivery};

#[derive(Parser)]
#[command(name = "deskflow")]
#[command(version = "0.1.0")]
#[command(about = "Talk to your support-ticket portal from the terminal", long_about = None)]
struct Cli {
    /// for debugging purposes
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init {
        /// (e.g., https://portal.example.com/apis)
        #[arg(short, long)]
        portal_url: Option<String>,
    },

    /// List portal tickets
    List {
        /// Filter by status (e.g., "Active", "Closed")
        #[arg(long)]
        status: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show one ticket with its comment thread
    Show {
        /// Ticket number or numeric id
        ticket: String,
    },

    /// Add a comment (and optionally attachments) to a ticket
    Comment {
        /// Ticket number or numeric id
        ticket: String,

        /// Comment text; may be omitted when attaching files
        text: Option<String>,

        /// File to attach (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },

    /// Fetch the comment thread for a ticket
    Comments {
        /// Ticket number or numeric id
        ticket: String,
    },

    /// Open the ticket in the web portal
    Open {
        /// Ticket number or numeric id
        ticket: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Display current configuration (with masked secrets)
    Show,

    /// Set a specific configuration value
    Set {
        /// Configuration key (e.g., portal.base_url, portal.auth_token)
        key: String,
        /// New value
        value: String,
    },

    /// Get the path to the config file
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("deskflow=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("deskflow=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json_mode = matches!(&cli.command, Commands::List { json: true, .. });
    if !json_mode {
        println!("{}", "Deskflow v0.1.0".bright_cyan().bold());
        println!();
    }

    let result = match cli.command {
        Commands::Init { portal_url } => handle_init(portal_url.as_deref()),

        Commands::List { status, json } => handle_list(status.as_deref(), json).await,

        Commands::Show { ticket } => handle_show(&ticket).await,

        Commands::Comment {
            ticket,
            text,
            files,
        } => handle_comment(&ticket, text.as_deref().unwrap_or(""), &files).await,

        Commands::Comments { ticket } => handle_comments(&ticket).await,

        Commands::Open { ticket } => handle_open(&ticket),

        Commands::Config { action } => handle_config(action),
    };

    if let Err(e) = result {
        eprintln!("\n{}", e);
        std::process::exit(1);
    }
}

fn handle_init(portal_url: Option<&str>) -> anyhow::Result<()> {
    use config::settings::{PortalConfig, Settings};
    use dialoguer::{Input, Password};

    println!("{}", "Setting up Deskflow...".cyan().bold());
    println!();

    let base_url: String = match portal_url {
        Some(url) => url.to_string(),
        None => Input::new()
            .with_prompt("Portal API base URL (e.g., https://portal.example.com/apis)")
            .interact_text()?,
    };

    let auth_token = Password::new()
        .with_prompt("Access token (leave empty for unauthenticated calls)")
        .allow_empty_password(true)
        .interact()?;

    let user_name: String = Input::new()
        .with_prompt("Your display name")
        .default("User".to_string())
        .interact_text()?;

    let settings = Settings {
        portal: PortalConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            user_name,
        },
        endpoints: Default::default(),
        preferences: Default::default(),
    };
    settings.save()?;

    println!();
    println!("{}", "Configuration saved!".green().bold());
    println!(
        "  {} {}",
        "Config:".bold(),
        config::settings::Settings::config_dir()?
            .join("config.toml")
            .display()
    );
    println!("  {} {}", "Try:".bold(), "deskflow list".green());

    Ok(())
}

async fn handle_list(status: Option<&str>, json: bool) -> anyhow::Result<()> {
    use api::portal::PortalClient;
    use config::settings::Settings;

    let settings = Settings::load()?;
    let client = PortalClient::new(settings);

    let mut tickets = client.fetch_tickets().await?;
    if let Some(status) = status {
        tickets.retain(|t| t.status_name.eq_ignore_ascii_case(status));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tickets)?);
        return Ok(());
    }

    if tickets.is_empty() {
        println!("{}", "No tickets found".yellow());
        return Ok(());
    }

    println!("{}", format!("{} ticket(s)", tickets.len()).bold());
    println!();
    for ticket in &tickets {
        print_ticket_row(ticket);
    }

    Ok(())
}

async fn handle_show(ticket: &str) -> anyhow::Result<()> {
    use api::portal::PortalClient;
    use config::settings::Settings;
    use store::LocalCommentStore;

    let settings = Settings::load()?;
    let client = PortalClient::new(settings.clone());

    println!("{}", "  Fetching ticket...".dimmed());
    let tickets = client.fetch_tickets().await?;
    let found = tickets
        .iter()
        .find(|t| t.id.as_str() == ticket)
        .ok_or_else(|| errors::PortalError::TicketNotFound(ticket.to_string()))?;

    println!();
    println!("{}", found.title.bold());
    println!(
        "  {} {}   {} {}",
        "Status:".bold(),
        status_colored(&found.status_name),
        "Priority:".bold(),
        priority_colored(&found.priority_name),
    );
    println!(
        "  {} {}   {} {}",
        "Requester:".bold(),
        found.requester_name,
        "Created:".bold(),
        found.created_at.dimmed()
    );
    println!();
    println!("{}", found.description);
    if !found.documents.is_empty() {
        println!();
        for url in &found.documents {
            println!("  {} {}", "Document:".bold(), url.bright_cyan());
        }
    }

    let service = CommentService::new(
        PortalClient::new(settings),
        LocalCommentStore::open_default()?,
    );
    let comments = service.load_comments(&TicketRef::new(ticket)).await;

    println!();
    println!("{}", format!("Comments ({})", comments.len()).bold());
    print_comments(&comments);

    Ok(())
}

async fn handle_comment(ticket: &str, text: &str, files: &[PathBuf]) -> anyhow::Result<()> {
    use api::portal::PortalClient;
    use config::settings::Settings;
    use store::LocalCommentStore;

    println!(
        "{}",
        format!("Adding comment to {}...", ticket).cyan().bold()
    );
    println!();

    let settings = Settings::load()?;
    let service = CommentService::new(
        PortalClient::new(settings),
        LocalCommentStore::open_default()?,
    );

    let outcome = service
        .submit_comment(&TicketRef::new(ticket), text, files)
        .await?;

    match &outcome.delivery {
        Delivery::Remote { endpoint } => {
            println!("{}", "Comment delivered to the portal".green().bold());
            println!("  {} {}", "Endpoint:".bold(), endpoint.dimmed());
        }
        Delivery::Local => {
            println!("{}", "Comment saved locally".yellow().bold());
            println!(
                "  {}",
                "It will appear alongside portal comments on the next fetch".dimmed()
            );
        }
    }

    if let Some(warning) = &outcome.warning {
        println!("  {} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    println!();
    println!(
        "{}",
        format!("Comments ({})", outcome.comments.len()).bold()
    );
    print_comments(&outcome.comments);

    Ok(())
}

async fn handle_comments(ticket: &str) -> anyhow::Result<()> {
    use api::portal::PortalClient;
    use config::settings::Settings;
    use store::LocalCommentStore;

    let settings = Settings::load()?;
    let service = CommentService::new(
        PortalClient::new(settings),
        LocalCommentStore::open_default()?,
    );

    let comments = service.load_comments(&TicketRef::new(ticket)).await;

    if comments.is_empty() {
        println!("{}", "No comments yet".yellow());
        return Ok(());
    }

    println!("{}", format!("Comments ({})", comments.len()).bold());
    print_comments(&comments);

    Ok(())
}

fn handle_open(ticket: &str) -> anyhow::Result<()> {
    use config::settings::Settings;

    let settings = Settings::load()?;
    let url = portal_ticket_url(&settings.portal.base_url, ticket);

    println!("{}", format!("Opening {}...", url).cyan());
    open::that(&url)?;

    Ok(())
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    use config::settings::Settings;

    match action {
        ConfigAction::Show => {
            let settings = Settings::load()?;
            println!("{}", "Current configuration:".bold());
            println!("  {} {}", "portal.base_url:".bold(), settings.portal.base_url);
            println!(
                "  {} {}",
                "portal.auth_token:".bold(),
                mask_token(&settings.portal.auth_token)
            );
            println!(
                "  {} {}",
                "portal.user_name:".bold(),
                settings.portal.user_name
            );
            println!(
                "  {} {}",
                "endpoints.note_routes:".bold(),
                settings.endpoints.note_routes.join(", ").dimmed()
            );
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load()?;
            match key.as_str() {
                "portal.base_url" => settings.portal.base_url = value,
                "portal.auth_token" => settings.portal.auth_token = value,
                "portal.user_name" => settings.portal.user_name = value,
                other => anyhow::bail!(
                    "Unknown key '{}'. Supported: portal.base_url, portal.auth_token, portal.user_name",
                    other
                ),
            }
            settings.save()?;
            println!("{}", "Configuration updated".green().bold());
        }
        ConfigAction::Path => {
            println!("{}", Settings::config_dir()?.join("config.toml").display());
        }
    }

    Ok(())
}

fn print_ticket_row(ticket: &Ticket) {
    println!(
        "  {}  {}",
        ticket.id.as_str().bright_white().bold(),
        ticket.title
    );
    println!(
        "      {}  {}  {}",
        status_colored(&ticket.status_name),
        priority_colored(&ticket.priority_name),
        ticket.created_at.dimmed()
    );
}

fn print_comments(comments: &[Comment]) {
    for comment in comments {
        let author = if comment.is_agent {
            format!("{} (agent)", comment.author)
        } else {
            comment.author.clone()
        };
        println!();
        println!(
            "  {}  {}",
            author.bold(),
            comment.timestamp.dimmed()
        );
        if !comment.message.is_empty() {
            println!("  {}", comment.message);
        }
        for attachment in &comment.attachments {
            let label = if attachment.size_label.is_empty() {
                attachment.name.clone()
            } else {
                format!("{} ({})", attachment.name, attachment.size_label)
            };
            match &attachment.url {
                Some(url) => println!("    📎 {}  {}", label, url.bright_cyan()),
                None => println!("    📎 {}  {}", label, "no link available".dimmed()),
            }
        }
    }
}

/// Terminal stand-in for the portal's status chip colors.
fn status_colored(status: &str) -> ColoredString {
    let lower = status.to_lowercase();
    if lower.contains("clos") || lower.contains("resolv") {
        status.green()
    } else if lower.contains("progress") || lower.contains("pend") || lower.contains("hold") {
        status.yellow()
    } else {
        status.cyan()
    }
}

fn priority_colored(priority: &str) -> ColoredString {
    let lower = priority.to_lowercase();
    if lower.contains("high") || lower.contains("urgent") || lower.contains("critical") {
        priority.red()
    } else if lower.contains("low") {
        priority.dimmed()
    } else {
        priority.yellow()
    }
}

fn portal_ticket_url(base_url: &str, ticket: &str) -> String {
    format!(
        "{}/tickets/{}",
        origin_of(base_url),
        urlencoding::encode(ticket)
    )
}

fn mask_token(token: &str) -> String {
    if token.is_empty() {
        "(not set)".to_string()
    } else if token.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", &token[..4])
    }
}

use colored::*;
use std::fmt;

#[derive(Debug)]
pub enum PortalError {
    // Configuration errors
    ConfigNotFound,
    ConfigInvalid(String),

    // Input validation
    EmptySubmission,

    // Connectivity and resolution
    NoConnectivity,
    IdentifierResolution(String),
    TicketNotFound(String),

    // Portal API errors
    CascadeExhausted(String),
    PortalAuthFailed(u16),
    PortalApiError(u16, String),

    // Network errors
    NetworkError(String),

    // Generic error
    Other(String),
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Configuration errors
            PortalError::ConfigNotFound => {
                write!(f, "{}\n", "Configuration not found".red().bold())?;
                write!(f, "   {}\n\n", "Run 'deskflow init' to set up your portal credentials".dimmed())?;
                write!(f, "   {}", "deskflow init".green())
            }
            PortalError::ConfigInvalid(msg) => {
                write!(f, "{}\n", "Invalid configuration".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check your config file: ~/.deskflow/config.toml\n")?;
                write!(f, "   2. Or reinitialize: {}", "deskflow init".green())
            }

            // Input validation
            PortalError::EmptySubmission => {
                write!(f, "{}\n", "Nothing to submit".red().bold())?;
                write!(f, "   {}\n\n", "Enter a comment or attach at least one file".dimmed())?;
                write!(f, "   {}", "deskflow comment <ticket> \"your comment\" --file report.log".green())
            }

            // Connectivity and resolution
            PortalError::NoConnectivity => {
                write!(f, "{}\n", "Portal is unreachable".red().bold())?;
                write!(f, "   {}\n\n", "The portal host did not answer a connection attempt".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check your internet connection\n")?;
                write!(f, "   2. Verify the portal URL: {}", "deskflow config show".green())
            }
            PortalError::IdentifierResolution(ticket) => {
                write!(f, "{}\n", format!("Cannot resolve ticket reference '{}'", ticket).red().bold())?;
                write!(f, "   {}\n\n", "The reference matches no ticket and contains no numeric part".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. List your tickets: {}\n", "deskflow list".green())?;
                write!(f, "   2. Use the ticket number shown there")
            }
            PortalError::TicketNotFound(ticket) => {
                write!(f, "{}\n", format!("Ticket '{}' not found", ticket).red().bold())?;
                write!(f, "   {}\n\n", "The ticket doesn't exist or you don't have access to it".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check the ticket number is correct\n")?;
                write!(f, "   2. List your tickets: {}", "deskflow list".green())
            }

            // Portal API errors
            PortalError::CascadeExhausted(operation) => {
                write!(f, "{}\n", format!("Every portal endpoint refused the {}", operation).red().bold())?;
                write!(f, "   {}\n\n", "The portal may be down or its API may have changed".dimmed())?;
                write!(f, "   Comments are kept locally and shown on the next fetch")
            }
            PortalError::PortalAuthFailed(status) => {
                write!(f, "{}\n", format!("Portal authentication failed ({})", status).red().bold())?;
                write!(f, "   {}\n\n", "Your access token may have expired or is invalid".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Request a fresh token from your portal administrator\n")?;
                write!(f, "   2. Update config: {}", "deskflow config set portal.auth_token <token>".green())
            }
            PortalError::PortalApiError(status, msg) => {
                write!(f, "{}\n", format!("Portal API error ({})", status).red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   Try again or check your network connection")
            }

            // Network errors
            PortalError::NetworkError(msg) => {
                write!(f, "{}\n", "Network error".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check your internet connection\n")?;
                write!(f, "   2. Verify you can reach the portal\n")?;
                write!(f, "   3. Try again in a moment")
            }

            // Generic
            PortalError::Other(msg) => {
                write!(f, "{}\n", "Error".red().bold())?;
                write!(f, "   {}", msg.dimmed())
            }
        }
    }
}

impl std::error::Error for PortalError {}

// Conversion from anyhow::Error
impl From<anyhow::Error> for PortalError {
    fn from(err: anyhow::Error) -> Self {
        PortalError::Other(err.to_string())
    }
}

// Helper to convert common error types
impl From<std::io::Error> for PortalError {
    fn from(err: std::io::Error) -> Self {
        PortalError::Other(err.to_string())
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            PortalError::NetworkError(err.to_string())
        } else if let Some(status) = err.status() {
            if status == 401 || status == 403 {
                PortalError::PortalAuthFailed(status.as_u16())
            } else {
                PortalError::Other(err.to_string())
            }
        } else {
            PortalError::Other(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;

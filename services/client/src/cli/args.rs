//! CLI argument definitions for the study items client.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "study",
    version,
    about = "Study items client - list, create and read study material",
    long_about = "List, create, delete and read study items held by the study API.\n\n\
                  Configuration is read from the environment (or a .env file):\n\
                  API_BASE_URL, API_KEY, COGNITO_CLIENT_ID and optional settings."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session.
    Logout,

    /// Register a new account.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Prompted for (twice) when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Confirm a new account with the code sent by email.
    Confirm {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },

    /// Send the account confirmation code again.
    ResendCode {
        #[arg(long)]
        email: String,
    },

    /// Show the signed-in user.
    Whoami,

    /// List study items, most recent first.
    List {
        /// Keep loading pages until the collection is exhausted.
        #[arg(long)]
        all: bool,
    },

    /// Show one study item with its content.
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Create a study item for a topic.
    Create {
        #[arg(value_name = "TOPIC", required = true, num_args = 1..)]
        topic: Vec<String>,
    },

    /// Delete a study item.
    Delete {
        #[arg(value_name = "ID")]
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Report on the stored session record.
    DebugAuth,

    /// Remove the stored session record.
    ClearAuth,
}

//! services/client/src/cli/commands.rs
//!
//! One handler per subcommand. All but the stored-session commands run after the
//! session has been initialized.

use std::io::{self, BufRead, Write};

use study_items_core::{
    CollectionError, CollectionSnapshot, DetailError, PortError, RegistrationForm, StudyItem,
};
use tracing::{debug, info};

use crate::cli::args::Command;
use crate::cli::state::AppState;
use crate::error::ClientError;

pub async fn run(command: Command, state: &AppState) -> Result<(), ClientError> {
    // Initializing discards a stale record, which the storage commands must see as is.
    if !matches!(command, Command::DebugAuth | Command::ClearAuth) {
        let phase = state.session.initialize().await;
        debug!("Session settled in phase {:?}", phase);
    }

    match command {
        Command::Login { email, password } => login(state, &email, password).await,
        Command::Logout => logout(state).await,
        Command::Signup { email, name, password } => signup(state, email, name, password).await,
        Command::Confirm { email, code } => {
            state.session.confirm_sign_up(&email, &code).await?;
            println!("Email confirmed. You can sign in now.");
            Ok(())
        }
        Command::ResendCode { email } => {
            let delivery = state.session.resend_confirmation_code(&email).await?;
            match delivery.destination {
                Some(destination) => println!("Confirmation code sent to {}.", destination),
                None => println!("Confirmation code sent."),
            }
            Ok(())
        }
        Command::Whoami => {
            whoami(state);
            Ok(())
        }
        Command::List { all } => list(state, all).await,
        Command::Show { id } => show(state, &id).await,
        Command::Create { topic } => create(state, &topic.join(" ")).await,
        Command::Delete { id, yes } => delete(state, &id, yes).await,
        Command::DebugAuth => {
            debug_auth(state).await;
            Ok(())
        }
        Command::ClearAuth => {
            state.session.clear_persisted().await;
            println!("Stored session removed from {}.", state.config.token_store_path.display());
            Ok(())
        }
    }
}

//=========================================================================================
// Account commands
//=========================================================================================

async fn login(state: &AppState, email: &str, password: Option<String>) -> Result<(), ClientError> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    let user = state.session.sign_in(email, &password).await?;
    println!("Signed in as {}.", user.display_name);
    Ok(())
}

async fn logout(state: &AppState) -> Result<(), ClientError> {
    if let Err(e) = state.session.sign_out().await {
        // Local state is already cleared at this point.
        println!("Signed out locally; the identity provider reported: {}", e);
        return Ok(());
    }
    println!("Signed out.");
    Ok(())
}

async fn signup(
    state: &AppState,
    email: String,
    name: String,
    password: Option<String>,
) -> Result<(), ClientError> {
    let (password, confirm_password) = match password {
        Some(p) => (p.clone(), p),
        None => (prompt("Password: ")?, prompt("Confirm password: ")?),
    };
    let request = RegistrationForm {
        email,
        password,
        confirm_password,
        name,
    }
    .into_request()?;

    let outcome = state.session.sign_up(&request).await?;
    if outcome.needs_confirmation {
        let destination = outcome
            .delivery
            .and_then(|d| d.destination)
            .unwrap_or_else(|| request.email.clone());
        println!(
            "Account created. Check {} for a confirmation code, then run `study confirm`.",
            destination
        );
    } else {
        println!("Account created. You can sign in now.");
    }
    Ok(())
}

fn whoami(state: &AppState) {
    let session = state.session.snapshot();
    match (session.is_authenticated(), session.user) {
        (true, Some(user)) => {
            println!("{}", user.display_name);
            if let Some(email) = user.email {
                println!("  email: {}", email);
            }
            println!("  id:    {}", user.id);
        }
        _ => match session.error {
            Some(error) => println!("Not signed in ({}).", error),
            None => println!("Not signed in."),
        },
    }
}

async fn debug_auth(state: &AppState) {
    let report = state.session.diagnose().await;
    println!("phase:          {:?}", report.phase);
    println!("authenticated:  {}", report.authenticated);
    println!("token file:     {}", state.config.token_store_path.display());
    if let Some(error) = report.store_error {
        println!("store error:    {}", error);
    }
    match report.persisted {
        None => println!("stored session: none"),
        Some(p) => {
            println!("stored session: present");
            println!("  age:            {}s", p.age.num_seconds());
            println!("  refresh token:  {}", if p.has_refresh_token { "present" } else { "missing" });
            match (p.exp, p.expires_in_secs) {
                (Some(exp), Some(secs)) => println!("  exp:            {} (in {}s)", exp, secs),
                _ => println!("  exp:            unknown"),
            }
            println!("  expired:        {}", p.is_expired);
            println!("  restorable:     {}", p.restorable);
            if let Some(error) = p.decode_error {
                println!("  decode error:   {}", error);
            }
        }
    }
}

//=========================================================================================
// Study item commands
//=========================================================================================

async fn list(state: &AppState, all: bool) -> Result<(), ClientError> {
    let store = &state.collection;
    store.load_initial().await;
    let mut snapshot = checked(store.snapshot().await)?;

    while all && snapshot.has_more {
        store.load_more().await;
        snapshot = checked(store.snapshot().await)?;
    }

    if snapshot.items.is_empty() {
        println!("No study items yet. Create one with `study create <topic>`.");
        return Ok(());
    }
    for item in &snapshot.items {
        print_row(item);
    }
    if snapshot.has_more {
        println!("... more items available, use --all to load everything.");
    }
    info!("Listed {} study items", snapshot.items.len());
    Ok(())
}

async fn show(state: &AppState, id: &str) -> Result<(), ClientError> {
    let item = match state.detail.load(id).await {
        Ok(item) => item,
        Err(DetailError::NotFound(_)) => {
            println!("Study item {} was not found. It may have been deleted.", id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", item.topic);
    println!("  id:      {}", item.id);
    println!("  status:  {}", item.status);
    println!("  created: {}", item.created_at.format("%Y-%m-%d %H:%M"));
    if item.was_updated() {
        println!("  updated: {}", item.updated_at.format("%Y-%m-%d %H:%M"));
    }
    println!();
    match item.content.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(content) => println!("{}", content),
        None => println!("(no content yet, status is {})", item.status),
    }
    Ok(())
}

async fn create(state: &AppState, topic: &str) -> Result<(), ClientError> {
    let item = state.collection.create_task(topic).await?;
    println!("Created {} [{}] {}", item.id, item.status, item.topic);
    Ok(())
}

async fn delete(state: &AppState, id: &str, yes: bool) -> Result<(), ClientError> {
    let store = &state.collection;

    // Page through the collection until the item is on screen, as a list view would.
    store.load_initial().await;
    let mut snapshot = checked(store.snapshot().await)?;
    while !snapshot.items.iter().any(|i| i.id == id) && snapshot.has_more {
        store.load_more().await;
        snapshot = checked(store.snapshot().await)?;
    }
    let Some(item) = snapshot.items.iter().find(|i| i.id == id) else {
        return Err(CollectionError::Port(PortError::NotFound(id.to_string())).into());
    };

    if !yes {
        let answer = prompt(&format!("Delete \"{}\"? [y/N] ", item.topic))?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.remove_task(id).await?;
    println!("Deleted {}.", id);
    Ok(())
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Turns a store-level error into a command failure.
fn checked(snapshot: CollectionSnapshot) -> Result<CollectionSnapshot, ClientError> {
    match snapshot.error {
        Some(e) if e.is_unauthorized() => Err(ClientError::Internal(
            "Please sign in again with `study login`.".to_string(),
        )),
        Some(e) => Err(e.into()),
        None => Ok(snapshot),
    }
}

fn print_row(item: &StudyItem) {
    println!(
        "{:<12} {:<10} {}  {}",
        item.id,
        item.status.label(),
        item.created_at.format("%Y-%m-%d"),
        item.topic
    );
}

fn prompt(label: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(label.as_bytes())?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

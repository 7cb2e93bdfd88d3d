//! `gitdiagram key` command.

use std::sync::Arc;

use crate::cli::KeyAction;
use crate::context::ServiceContext;
use crate::credentials::{masked, CredentialSlot, Credentials};

/// Execute the `key` command.
///
/// # Errors
///
/// Returns an error string if the slot is unknown or the store fails.
pub fn run(ctx: &ServiceContext, action: &KeyAction) -> Result<(), String> {
    let credentials = Credentials::new(Arc::clone(&ctx.store));
    match action {
        KeyAction::Set { slot, value } => {
            let slot: CredentialSlot = slot.parse()?;
            credentials.set(slot, value)?;
            if value.trim().is_empty() {
                eprintln!("Cleared {slot}.");
            } else {
                eprintln!("Stored {slot}.");
            }
        }
        KeyAction::Clear { slot } => {
            let slot: CredentialSlot = slot.parse()?;
            credentials.clear(slot)?;
            eprintln!("Cleared {slot}.");
        }
        KeyAction::List => {
            for line in list(&credentials)? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn list(credentials: &Credentials) -> Result<Vec<String>, String> {
    let mut lines = Vec::with_capacity(CredentialSlot::ALL.len() + 1);
    for slot in CredentialSlot::ALL {
        let shown = credentials.get(slot)?.map_or_else(|| "(not set)".to_string(), |v| masked(&v));
        lines.push(format!("{:<14} {shown}", slot.key()));
    }
    let used = if credentials.has_used_free_generation()? { "yes" } else { "no" };
    lines.push(format!("{:<14} {used}", "free generation used"));
    Ok(lines)
}

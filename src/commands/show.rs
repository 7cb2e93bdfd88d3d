//! `gitdiagram show` and `export` commands.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::context::ServiceContext;
use crate::credentials::AiPlatform;
use crate::repo_ref::RepoRef;
use crate::session::DiagramSession;

/// Execute the `show` command.
///
/// Prints the cached explanation and diagram for a repository.
///
/// # Errors
///
/// Returns an error string if the repository is invalid or nothing is
/// cached for it.
pub fn run(ctx: &ServiceContext, repo: &str) -> Result<(), String> {
    let session = cached_session(ctx, repo)?;
    let view = session.view();

    println!("Repository: {}", session.repo().url());
    if let Some(date) = view.last_generated {
        println!("Last generated: {}", date.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("\nExplanation:\n{}", view.explanation.trim_end());
    println!("\nDiagram:\n{}", view.diagram.trim_end());
    Ok(())
}

/// Execute the `export` command.
///
/// Writes the cached diagram source to `output`, or stdout.
///
/// # Errors
///
/// Returns an error string if nothing is cached or the output cannot be written.
pub fn export(ctx: &ServiceContext, repo: &str, output: Option<&Path>) -> Result<(), String> {
    let session = cached_session(ctx, repo)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
            }
            let file = File::create(path)
                .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
            session.export(&mut BufWriter::new(file))?;
            eprintln!("Diagram written to {}", path.display());
            Ok(())
        }
        None => session.export(&mut std::io::stdout().lock()),
    }
}

fn cached_session(ctx: &ServiceContext, repo: &str) -> Result<DiagramSession, String> {
    let repo: RepoRef = repo.parse()?;
    let mut session = DiagramSession::new(ctx, repo, AiPlatform::default());
    if session.load_cached() {
        return Ok(session);
    }
    if let Some(failure) = session.view().failure() {
        return Err(failure.to_string());
    }
    Err(format!(
        "No cached diagram for {repo}. Run `gitdiagram generate {repo}` first.",
        repo = session.repo()
    ))
}

//! Binary entrypoint for the `gitdiagram` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // A missing .env file is fine; the environment may be set directly.
    dotenvy::dotenv().ok();
    gitdiagram::logging::init();

    // Recording and replay are selected in Config via GITDIAGRAM_RECORD / GITDIAGRAM_REPLAY.
    match gitdiagram::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

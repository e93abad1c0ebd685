use queue_lifecycle_cli::run_cli;
use tracing::error;

fn main() {
    // Run CLI and exit with the code of the error kind
    if let Err(e) = run_cli() {
        error!("CLI error: {}", e);
        eprintln!("Error: {}", e);

        std::process::exit(e.exit_code());
    }
}

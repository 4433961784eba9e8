//! The authzd OAuth 2.0 (RFC 6749) authorization service.

use std::path::PathBuf;
use std::process::ExitCode;

use authzd_server::{init_tracing, load_config, run};

#[tokio::main]
async fn main() -> ExitCode {
    let Some(path) = config_path(std::env::args().skip(1)) else {
        eprintln!("usage: authzd -config <path>");
        return ExitCode::FAILURE;
    };
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_json);
    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "service failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn config_path(mut args: impl Iterator<Item = String>) -> Option<PathBuf> {
    while let Some(arg) = args.next() {
        if arg == "-config" || arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

//! Career Mentor server
//!
//! Entry point for the career mentor chat application.

use std::sync::Arc;

use dotenvy::dotenv;
use mimalloc::MiMalloc;

use career_mentor::config::AppConfig;
use career_mentor::{server, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing (M-LOG-STRUCTURED)
    telemetry::init(config.log.json);

    server::start_server(Arc::new(config)).await
}

use grantly::config::AppConfig;
use grantly::server;

fn main() {
    grantly::init_tracing();

    // Configuration problems are fatal here, before anything is served.
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        version = grantly::config::APP_VERSION,
        model = %config.generation_model,
        "Grantly starting"
    );

    // Collaborator wiring happens outside the async runtime — the
    // pipeline's HTTP and SQLite clients are blocking.
    let state = match server::build_state(&config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Startup error: {e}");
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Runtime::new().expect("Failed to start tokio runtime");
    if let Err(e) = runtime.block_on(server::serve(config, state)) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

use clap::Parser;

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod filesystem;
pub mod index;
pub mod models;
pub mod navigation;
pub mod preferences;
pub mod server;
pub mod theme;
pub mod tree_state;

/// Entry point of the `notes-browser` binary.
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(cli::execute(cli)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

//! # Smart HTTP Server - Entry Point
//! src/main.rs
//!
//! Carga la configuración, arranca el servidor y espera `stop` (o `exit`)
//! por la entrada estándar para apagarlo.

use clap::Parser;
use smart_http_server::config::{Cli, ServerConfig};
use smart_http_server::server::Server;
use smart_http_server::workers::WorkerRegistry;
use std::io::{self, BufRead};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match ServerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    config.log_summary();

    let server = match Server::new(config, WorkerRegistry::with_defaults()) {
        Ok(server) => server,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let handle = match server.start() {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("Fatal error: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Type 'stop' to shut down");

    for line in io::stdin().lock().lines() {
        match line {
            Ok(line) if matches!(line.trim(), "stop" | "exit") => {
                log::info!("Stopping server...");
                handle.stop();
                return;
            }
            Ok(line) if !line.trim().is_empty() => log::warn!("Unknown command: {}", line.trim()),
            Ok(_) => {}
            Err(e) => {
                log::warn!("Cannot read stdin: {}", e);
                break;
            }
        }
    }

    // Sin stdin (ej: corriendo como servicio) el servidor sigue hasta que lo maten
    handle.join();
}

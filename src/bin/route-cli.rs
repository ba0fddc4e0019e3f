use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use route_gate::config::{build_route_table, load_config};
use route_gate::context::{LocaleStore, RequestLocale, StaticRequest};
use route_gate::filters::FilterOutcome;
use route_gate::routing::LookupEnv;
use route_gate::store::MemoryStore;

#[derive(Parser)]
#[command(name = "route-cli")]
#[command(about = "Inspect and test route-gate configurations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and print its effective route table
    Check {
        config: PathBuf,
    },
    /// Resolve a path and run its filters
    Resolve {
        config: PathBuf,
        path: String,

        #[arg(short, long, default_value = "GET")]
        method: String,

        #[arg(long)]
        ip: Option<IpAddr>,

        /// Send as an XHR request
        #[arg(long)]
        ajax: bool,

        /// Treat the CSRF token as valid
        #[arg(long)]
        csrf: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            let table = build_route_table(&config)?;
            println!("{}", serde_json::to_string_pretty(&table.describe())?);
        }
        Commands::Resolve {
            config,
            path,
            method,
            ip,
            ajax,
            csrf,
        } => {
            let config = load_config(&config)?;
            let table = build_route_table(&config)?;
            let store = MemoryStore::from_tables(&config.store.tables);
            let locale = RequestLocale::new(config.routing.default_locale.as_str());

            let result = match table.resolve(&path, &LookupEnv::new(&store, &locale)) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("segment store failed: {e}");
                    table.fallback(&path, locale.current_locale())
                }
            };

            let mut request = StaticRequest::new(method, path).with_ajax(ajax).with_csrf(csrf);
            if let Some(ip) = ip {
                request = request.with_ip(ip);
            }

            let outcome = match table.apply_filters(&result, &request) {
                FilterOutcome::Continue => json!({ "action": "continue" }),
                FilterOutcome::Redirect { kind, target } => json!({
                    "action": "redirect",
                    "kind": kind.as_str(),
                    "target": target,
                }),
            };

            let report = json!({ "match": result, "filters": outcome });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

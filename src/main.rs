//! Pythia oracle probe CLI.
//!
//! Posts a query bundle to the configured oracle endpoint and prints the
//! parsed verdict and valuation. Useful for checking a deployed oracle
//! service end to end without running an analysis.

use std::env;
use std::fs;
use std::process;

use pythia::config::Config;
use pythia::expr::{CompareOp, Expr, Variable};
use pythia::oracle::{OracleClient, OracleRequest};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("Pythia oracle probe v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    pythia [OPTIONS] [QUERY]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -v, --version        Print version information");
    eprintln!("    -c, --config <FILE>  Read endpoint settings from FILE (pythia.toml)");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    [QUERY]              JSON file with an oracle request body;");
    eprintln!("                         a demo linked-list query is sent when omitted");
    eprintln!();
    eprintln!("The SERVICE_URL and TIMEOUT_SECONDS environment variables override");
    eprintln!("the configured endpoint.");
}

struct Options {
    config: Option<String>,
    query: Option<String>,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut config = None;
    let mut query = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                println!("Pythia {}", VERSION);
                process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                config = Some(
                    args.get(i)
                        .ok_or_else(|| "--config requires a file argument".to_string())?
                        .clone(),
                );
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {}", arg));
            }
            arg => {
                if query.is_some() {
                    return Err("at most one query file".to_string());
                }
                query = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(Options { config, query })
}

/// The built-in demo bundle: a non-trivial linked-list shape query.
fn demo_request() -> OracleRequest {
    let head = Expr::var(Variable::reference("head"));
    let next = Expr::var(Variable::reference("head(ref).next"));
    OracleRequest::new(
        &[
            Expr::compare(CompareOp::Ne, head, Expr::null()),
            Expr::compare(CompareOp::Eq, next, Expr::null()),
        ],
        "probe",
    )
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!();
            print_usage();
            process::exit(2);
        }
    };

    let config = match &options.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(2);
            }
        },
        None => Config::default(),
    };

    let client = OracleClient::from_config(&config.oracle);
    eprintln!("endpoint: {} (timeout {:?})", client.url(), client.timeout());

    let reply = if let Some(path) = &options.query {
        let body = match fs::read_to_string(path) {
            Ok(body) => body,
            Err(e) => {
                eprintln!("error: cannot read {}: {}", path, e);
                process::exit(2);
            }
        };
        // Forward the file body as-is so hand-edited bundles stay intact
        let request: serde_json::Value = match serde_json::from_str(&body) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("error: {} is not valid JSON: {}", path, e);
                process::exit(2);
            }
        };
        let raw = match ureq::AgentBuilder::new()
            .timeout(client.timeout())
            .build()
            .post(client.url())
            .send_json(request)
        {
            Ok(response) => response,
            Err(e) => {
                eprintln!("error: oracle request failed: {}", e);
                process::exit(1);
            }
        };
        match raw.into_json::<pythia::OracleReply>() {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("error: malformed oracle reply: {}", e);
                process::exit(1);
            }
        }
    } else {
        match client.query(&demo_request()) {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    };

    println!("result: {:?}", reply.result);
    if let Some(valuation) = &reply.valuation {
        for entry in valuation {
            for (name, value) in entry {
                println!("  {} = {}", name, value);
            }
        }
    }
}

//! CLI adapter over the Agrama primitive engine. Framing here is a simple one-JSON-object-
//! per-line protocol over stdin/stdout; JSON-RPC/WebSocket framing is a
//! separate external adapter concern this binary does not implement.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use agrama_engine::{
    CancelToken, Config, Core, Identity, LinkParams, RetrieveParams, SearchMode, SearchParams,
    StoreParams, TransformParams,
};
use agrama_pool::PoolStat;
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;

#[derive(Parser)]
#[command(name = "agrama")]
#[command(about = "Start, stop, and inspect an Agrama primitive engine instance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an engine instance and serve primitive invocations from stdin.
    Start {
        /// Path to a TOML configuration file; defaults are used if absent.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Signal a running instance to stop.
    ///
    /// This binary has no persistent cross-process daemon state, so `stop`
    /// only validates its arguments and acknowledges the request; a
    /// `start` session stops on its own when it reads a `"stop"` line or
    /// hits end of input.
    Stop,
    /// Build a fresh engine instance and print its pool/backend stats.
    Stats {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    match cli.command {
        Commands::Start { config } => run_start(config),
        Commands::Stop => run_stop(),
        Commands::Stats { config } => run_stats(config),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config, ExitCode> {
    match path {
        None => Ok(Config::default()),
        Some(path) => {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                eprintln!("failed to read config file {}: {e}", path.display());
                ExitCode::from(1)
            })?;
            toml::from_str(&text).map_err(|e| {
                eprintln!("failed to parse config file {}: {e}", path.display());
                ExitCode::from(1)
            })
        }
    }
}

fn run_start(config_path: Option<PathBuf>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let core = match Core::new(config) {
        Ok(core) => core,
        Err(e) => {
            tracing::error!("engine startup failed: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::info!("agrama engine started, reading primitive invocations from stdin");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "stop" {
            tracing::info!("stop received, shutting down");
            break;
        }
        let response = dispatch_line(&core, line);
        let _ = writeln!(stdout, "{response}");
        let _ = stdout.flush();
    }
    ExitCode::SUCCESS
}

fn run_stop() -> ExitCode {
    println!("no persistent daemon state to stop; a running `start` session exits on a `stop` line or EOF");
    ExitCode::SUCCESS
}

fn run_stats(config_path: Option<PathBuf>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let core = match Core::new(config) {
        Ok(core) => core,
        Err(e) => {
            tracing::error!("engine startup failed: {e}");
            return ExitCode::from(2);
        }
    };
    let stats = core.pools().stats();
    let body = serde_json::json!({
        "request_buffers": pool_stat_json(&stats.request_buffers),
        "response_buffers": pool_stat_json(&stats.response_buffers),
        "json_objects": pool_stat_json(&stats.json_objects),
        "vector_blocks": pool_stat_json(&stats.vector_blocks),
        "subscribers": core.events().subscriber_count(),
    });
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    ExitCode::SUCCESS
}

fn pool_stat_json(stat: &PoolStat) -> JsonValue {
    serde_json::json!({
        "capacity": stat.capacity,
        "in_use": stat.in_use,
        "free": stat.free,
    })
}

/// One line of the stdin protocol: `{"primitive": "...", "agent": "...",
/// "session": optional string, "params": { ... primitive-specific ... }}`.
fn dispatch_line(core: &Core, line: &str) -> String {
    let request: JsonValue = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return serde_json::json!({"status": "failed", "error": e.to_string()}).to_string(),
    };

    let identity = match request.get("agent").and_then(JsonValue::as_str) {
        Some(agent) => {
            let base = Identity::agent(agent.to_string());
            match request.get("session").and_then(JsonValue::as_str) {
                Some(session) => base.with_session(session.to_string()),
                None => base,
            }
        }
        None => return serde_json::json!({"status": "failed", "error": "missing 'agent' field"}).to_string(),
    };

    let primitive = request.get("primitive").and_then(JsonValue::as_str).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or(JsonValue::Null);
    let cancel = CancelToken::new();

    let result = match primitive {
        "store" => store_from_json(core, &identity, params, &cancel),
        "retrieve" => retrieve_from_json(core, &identity, params),
        "search" => search_from_json(core, &identity, params),
        "link" => link_from_json(core, &identity, params),
        "transform" => transform_from_json(core, &identity, params),
        other => Err(format!("unknown primitive '{other}'")),
    };

    match result {
        Ok(value) => serde_json::json!({"status": "success", "result": value}).to_string(),
        Err(message) => serde_json::json!({"status": "failed", "error": message}).to_string(),
    }
}

fn store_from_json(
    core: &Core,
    identity: &Identity,
    params: JsonValue,
    cancel: &CancelToken,
) -> Result<JsonValue, String> {
    let path = params.get("path").and_then(JsonValue::as_str).unwrap_or_default().to_string();
    let content = params
        .get("content")
        .and_then(JsonValue::as_str)
        .map(|s| s.as_bytes().to_vec())
        .unwrap_or_default();
    let embedding = params.get("embedding").and_then(JsonValue::as_array).map(|arr| {
        arr.iter().filter_map(JsonValue::as_f64).map(|v| v as f32).collect()
    });
    let tokens = params.get("tokens").and_then(JsonValue::as_str).map(String::from);
    let crdt = params.get("crdt").and_then(JsonValue::as_bool).unwrap_or(false);

    let outcome = core
        .store(identity, StoreParams { path, content, metadata: None, embedding, tokens, crdt }, cancel)
        .map_err(|e| e.to_string())?;
    Ok(serde_json::to_value(outcome).unwrap_or(JsonValue::Null))
}

fn retrieve_from_json(core: &Core, identity: &Identity, params: JsonValue) -> Result<JsonValue, String> {
    let path = params.get("path").and_then(JsonValue::as_str).unwrap_or_default().to_string();
    let history_limit = params.get("history_limit").and_then(JsonValue::as_u64).map(|n| n as usize);
    let include_neighbors = params.get("include_neighbors").and_then(JsonValue::as_bool).unwrap_or(false);

    let outcome = core
        .retrieve(identity, RetrieveParams { path, history_limit, include_neighbors })
        .map_err(|e| e.to_string())?;
    Ok(serde_json::to_value(outcome).unwrap_or(JsonValue::Null))
}

fn search_from_json(core: &Core, identity: &Identity, params: JsonValue) -> Result<JsonValue, String> {
    let mode = params.get("mode").and_then(JsonValue::as_str).and_then(|m| match m {
        "lexical" => Some(SearchMode::Lexical),
        "semantic" => Some(SearchMode::Semantic),
        "graph" => Some(SearchMode::Graph),
        "hybrid" => Some(SearchMode::Hybrid),
        "temporal" => Some(SearchMode::Temporal),
        _ => None,
    });
    let text = params.get("text").and_then(JsonValue::as_str).map(String::from);
    let vector = params.get("vector").and_then(JsonValue::as_array).map(|arr| {
        arr.iter().filter_map(JsonValue::as_f64).map(|v| v as f32).collect()
    });
    let seeds = params
        .get("seeds")
        .and_then(JsonValue::as_array)
        .map(|arr| arr.iter().filter_map(JsonValue::as_str).map(String::from).collect())
        .unwrap_or_default();
    let limit = params.get("limit").and_then(JsonValue::as_u64).unwrap_or(10) as usize;
    let graph_bound = params.get("graph_bound").and_then(JsonValue::as_f64);

    let outcome = core
        .search(
            identity,
            SearchParams { mode, text, vector, effective_dim: None, seeds, weights: None, graph_bound, limit, history_limit: None },
        )
        .map_err(|e| e.to_string())?;
    Ok(serde_json::to_value(outcome).unwrap_or(JsonValue::Null))
}

fn link_from_json(core: &Core, identity: &Identity, params: JsonValue) -> Result<JsonValue, String> {
    let from = params.get("from").and_then(JsonValue::as_str).unwrap_or_default().to_string();
    let to = params.get("to").and_then(JsonValue::as_str).unwrap_or_default().to_string();
    let kind = params.get("kind").and_then(JsonValue::as_str).unwrap_or_default().to_string();
    let weight = params.get("weight").and_then(JsonValue::as_f64);

    let outcome = core
        .link(identity, LinkParams { from, to, kind, weight, attrs: None })
        .map_err(|e| e.to_string())?;
    Ok(serde_json::to_value(outcome).unwrap_or(JsonValue::Null))
}

fn transform_from_json(core: &Core, identity: &Identity, params: JsonValue) -> Result<JsonValue, String> {
    let operation = params.get("operation").and_then(JsonValue::as_str).unwrap_or_default().to_string();
    let inputs = params
        .get("inputs")
        .and_then(JsonValue::as_array)
        .map(|arr| arr.iter().filter_map(JsonValue::as_str).map(String::from).collect())
        .unwrap_or_default();
    let op_params = params.get("operation_params").cloned().unwrap_or(JsonValue::Null);
    let history_limit = params.get("history_limit").and_then(JsonValue::as_u64).unwrap_or(10) as usize;

    let outcome = core
        .transform(identity, TransformParams { operation, inputs, params: op_params, history_limit })
        .map_err(|e| e.to_string())?;
    Ok(serde_json::to_value(outcome).unwrap_or(JsonValue::Null))
}

//! **coldiq** — operator CLI for the ColdIQ mail agent.
//!
//! ## Usage
//!
//! ```text
//! coldiq token set <TOKEN>                               store the session token
//! coldiq token clear                                     forget the token and cached user
//! coldiq token status                                    show whether a token is stored
//! coldiq analyze --subject <S> (--body <B> | --body-file <PATH>)
//! coldiq scan <PAGE.html>                                dry-run discovery on a saved page
//! coldiq help
//! ```
//!
//! Configuration comes from `config/coldiq.toml` (or `COLDIQ_CONFIG`) and `COLDIQ__*`
//! variables; a `.env` file is loaded first.

use std::sync::Arc;

use coldiq_bridge::{
    find_surfaces, CompositionSurface, DomTree, ErrorKind, FieldKind, Injector, SurfaceTree, EMPTY_BODY_WARNING,
    LOGIN_REQUIRED,
};
use coldiq_core::{
    AgentConfig, AnalysisApi, AnalysisRequest, AnalysisResult, HttpAnalysisClient, SledTokenStore, TokenStore,
};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(target: "coldiq::cli", ".env not loaded: {}", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let sub = args.first().map(|s| s.as_str()).unwrap_or("help");

    let result = match sub {
        "token" => run_token(&args[1..]).await,
        "analyze" => run_analyze(&args[1..]).await,
        "scan" => run_scan(&args[1..]),
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => Err(format!("Unknown subcommand '{}'. Use: coldiq help", other)),
    };

    if let Err(e) = result {
        eprintln!("coldiq {}: {}", sub, e);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("ColdIQ CLI v{}", VERSION);
    println!();
    println!("Usage: coldiq <COMMAND>");
    println!();
    println!("Commands:");
    println!("  token set <TOKEN>      Store the session token");
    println!("  token clear            Remove the stored token and cached user");
    println!("  token status           Show whether a session token is stored");
    println!("  analyze --subject <S> (--body <B> | --body-file <PATH>)");
    println!("                         Score an email with the analysis API");
    println!("  scan <PAGE.html>       Run surface discovery and injection on a saved page");
    println!("  help                   Print this help message");
    println!();
    println!("Configure via COLDIQ_CONFIG (default config/coldiq.toml) and COLDIQ__* env vars.");
}

fn load_config() -> Result<AgentConfig, String> {
    AgentConfig::load().map_err(|e| format!("Config: {}", e))
}

fn open_store(config: &AgentConfig) -> Result<SledTokenStore, String> {
    SledTokenStore::open(&config.storage_path)
        .map_err(|e| format!("Cannot open token store at {}: {}", config.storage_path, e))
}

async fn run_token(args: &[String]) -> Result<(), String> {
    let config = load_config()?;
    let store = open_store(&config)?;
    match args.first().map(|s| s.as_str()) {
        Some("set") => {
            let token = args
                .get(1)
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .ok_or("Usage: coldiq token set <TOKEN>")?;
            store.set(&config.token_key, token).map_err(|e| e.to_string())?;
            println!("Session token stored under '{}'.", config.token_key);
        }
        Some("clear") => {
            store
                .clear(&[config.token_key.as_str(), config.user_key.as_str()])
                .map_err(|e| e.to_string())?;
            println!("Session token and cached user cleared.");
        }
        Some("status") | None => {
            let token = store.get(&config.token_key).await.map_err(|e| e.to_string())?;
            match token {
                Some(t) => println!("Logged in (token {}).", mask(&t)),
                None => println!("Not logged in. Sign in at {}", config.links().login_url),
            }
        }
        Some(other) => return Err(format!("Unknown token action '{}'. Use: set | clear | status", other)),
    }
    Ok(())
}

fn mask(token: &str) -> String {
    let shown: String = token.chars().take(4).collect();
    format!("{}…", shown)
}

struct AnalyzeArgs {
    subject: String,
    body: String,
}

fn parse_analyze_args(args: &[String]) -> Result<AnalyzeArgs, String> {
    let mut subject = String::new();
    let mut body = None;
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || iter.next().cloned().ok_or_else(|| format!("Missing value for {}", flag));
        match flag.as_str() {
            "--subject" => subject = value()?,
            "--body" => body = Some(value()?),
            "--body-file" => {
                let path = value()?;
                body = Some(std::fs::read_to_string(&path).map_err(|e| format!("Cannot read {}: {}", path, e))?);
            }
            other => return Err(format!("Unknown option '{}'", other)),
        }
    }
    let body = body.ok_or("Usage: coldiq analyze --subject <S> (--body <B> | --body-file <PATH>)")?;
    Ok(AnalyzeArgs { subject, body })
}

async fn run_analyze(args: &[String]) -> Result<(), String> {
    let parsed = parse_analyze_args(args)?;
    let request = AnalysisRequest::new(parsed.subject, parsed.body);
    if request.is_body_blank() {
        return Err(EMPTY_BODY_WARNING.to_string());
    }

    let config = load_config()?;
    let links = config.links();
    let token = {
        let store = open_store(&config)?;
        store.get(&config.token_key).await.map_err(|e| e.to_string())?
    };
    let Some(token) = token else {
        return Err(format!("{} ({})", LOGIN_REQUIRED, links.login_url));
    };

    let client: Arc<dyn AnalysisApi> = Arc::new(HttpAnalysisClient::from_config(&config));
    match client.analyze(&request, &token).await {
        Ok(result) => {
            print_analysis(&result);
            println!("  Full analysis: {}", links.history_url);
            Ok(())
        }
        Err(err) => {
            let hint = match ErrorKind::from_api_error(&err) {
                ErrorKind::Unauthenticated => format!(" Log in again at {}", links.login_url),
                ErrorKind::QuotaExceeded => format!(" Upgrade at {}", links.upgrade_url),
                ErrorKind::Generic => String::new(),
            };
            Err(format!("{}{}", err, hint))
        }
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).set_alignment(CellAlignment::Center).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(names: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(names));
    table
}

fn print_analysis(result: &AnalysisResult) {
    let score_color = if result.score >= 70 {
        Color::Green
    } else if result.score >= 50 {
        Color::Yellow
    } else {
        Color::Red
    };

    let mut table = new_table(&["Metric", "Value"]);
    table.add_row(vec![
        Cell::new("Score"),
        Cell::new(result.score).fg(score_color).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Open rate"), Cell::new(format!("{}%", result.estimated_open_rate))]);
    table.add_row(vec![
        Cell::new("Response rate"),
        Cell::new(format!("{}%", result.estimated_response_rate)),
    ]);
    for (label, items) in [
        ("Strengths", &result.strengths),
        ("Areas to improve", &result.weaknesses),
        ("Suggestions", &result.improvements),
    ] {
        if !items.is_empty() {
            table.add_row(vec![Cell::new(label), Cell::new(items.join("\n"))]);
        }
    }
    if !result.key_insight.is_empty() {
        table.add_row(vec![Cell::new("Key insight"), Cell::new(&result.key_insight)]);
    }
    if !result.rewritten_subject.is_empty() {
        table.add_row(vec![Cell::new("Optimized subject"), Cell::new(&result.rewritten_subject)]);
    }
    if !result.rewritten_body.is_empty() {
        table.add_row(vec![Cell::new("Optimized email"), Cell::new(&result.rewritten_body)]);
    }

    println!();
    println!("{table}");
    println!();
}

fn run_scan(args: &[String]) -> Result<(), String> {
    let path = args.first().ok_or("Usage: coldiq scan <PAGE.html>")?;
    let html = std::fs::read_to_string(path).map_err(|e| format!("Cannot read {}: {}", path, e))?;
    let config = load_config()?;

    let mut tree = DomTree::from_html(&html);
    let before: Vec<(CompositionSurface, bool)> = find_surfaces(&tree)
        .into_iter()
        .map(|s| (s, s.has_control(&tree)))
        .collect();

    let mut injector = Injector::new(config.links());
    let report = injector.scan(&mut tree);

    let mut table = new_table(&["#", "Root", "Subject", "Body", "Toolbar", "Send", "Control"]);
    for (i, (surface, had_control)) in before.iter().enumerate() {
        let found = |kind: FieldKind| {
            if surface.field(&tree, kind).is_some() {
                Cell::new("✓").fg(Color::Green)
            } else {
                Cell::new("✗").fg(Color::Red)
            }
        };
        let (status, color) = if *had_control {
            ("already present", Color::DarkYellow)
        } else if injector.control_for(surface.root).is_some() {
            ("injected", Color::Green)
        } else {
            ("skipped", Color::Red)
        };
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(describe(&tree, surface.root)),
            found(FieldKind::Subject),
            found(FieldKind::Body),
            found(FieldKind::Toolbar),
            found(FieldKind::SendAffordance),
            Cell::new(status).fg(color),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  Surfaces: {}  |  Injected: {}  |  Already injected: {}  |  Skipped: {}",
        report.discovered, report.injected, report.already_injected, report.skipped
    );
    println!();
    Ok(())
}

fn describe(tree: &dyn SurfaceTree, node: coldiq_bridge::NodeId) -> String {
    let mut out = tree.tag(node);
    if let Some(id) = tree.attr(node, "id") {
        out.push('#');
        out.push_str(&id);
    }
    if let Some(class) = tree.attr(node, "class") {
        for c in class.split_whitespace() {
            out.push('.');
            out.push_str(c);
        }
    }
    if let Some(role) = tree.attr(node, "role") {
        out.push_str(&format!("[role={}]", role));
    }
    out
}

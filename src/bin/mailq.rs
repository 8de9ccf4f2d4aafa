//! mailq - mail search query compiler
//!
//! # Usage
//!
//! ```bash
//! # Compile a query for the default entity
//! mailq 'is:unread from:ben'
//!
//! # Every stage, for another entity
//! mailq explain 'to:eve before:yesterday' --entity Message
//!
//! # Interactive
//! mailq repl
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use mailq::prelude::*;
use mailq::scanner;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailq")]
#[command(version)]
#[command(about = "Compile mail search queries into SQL predicates", long_about = None)]
#[command(after_help = "EXAMPLES:
    mailq 'is:unread from:ben'
    mailq 'subject:invoice has:attachment' --entity Message --dialect sqlite
    mailq explain '(a OR b) NOT is:starred' --format json")]
struct Cli {
    /// The search query to compile
    query: Option<String>,

    /// Entity the fragment is scoped to (defaults to the configured entity)
    #[arg(short, long, global = true)]
    entity: Option<String>,

    /// Identifier quoting: plain, sqlite or ansi
    #[arg(short, long, global = true)]
    dialect: Option<Dialect>,

    /// Reference time for relative dates (RFC 3339)
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,

    /// Configuration file
    #[arg(short, long, global = true, env = "MAILQ_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log compilation stages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the parsed tree, the condensed tree and the SQL
    Explain {
        /// The search query to explain
        query: String,
    },
    /// Show the scanner's tokens
    Tokens {
        /// The search query to scan
        query: String,
    },
    /// Interactive REPL mode
    Repl,
    /// Show the search syntax reference
    Syntax,
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mailq=debug")
    } else {
        EnvFilter::try_from_env("MAILQ_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Explain { query }) => explain_query(&compiler(cli)?, query, cli),
        Some(Commands::Tokens { query }) => show_tokens(query, cli.format),
        Some(Commands::Repl) => run_repl(&compiler(cli)?, cli),
        Some(Commands::Syntax) => {
            show_syntax();
            Ok(())
        }
        None => match &cli.query {
            Some(query) => compile_query(&compiler(cli)?, query, cli),
            None => {
                println!("{}", "mailq - mail search query compiler".cyan().bold());
                println!();
                println!("Usage: mailq <QUERY> [OPTIONS]");
                println!();
                println!("Try: mailq --help");
                Ok(())
            }
        },
    }
}

fn compiler(cli: &Cli) -> Result<SearchCompiler> {
    let config = Config::discover(cli.config.as_deref()).context("failed to load configuration")?;
    let mut compiler = SearchCompiler::from_config(&config, cli.entity.as_deref());
    if let Some(dialect) = cli.dialect {
        compiler = compiler.with_dialect(dialect);
    }
    Ok(compiler)
}

fn now(cli: &Cli) -> DateTime<Utc> {
    cli.now.unwrap_or_else(Utc::now)
}

fn compile_query(compiler: &SearchCompiler, query: &str, cli: &Cli) -> Result<()> {
    let explanation = compiler.explain(query, now(cli))?;
    match cli.format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "query": explanation.query,
                "entity": explanation.entity,
                "sql": explanation.sql,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if cli.verbose {
                eprintln!("{} {}", "Input:".dimmed(), query.yellow());
            }
            println!("{}", explanation.sql);
        }
    }
    Ok(())
}

fn explain_query(compiler: &SearchCompiler, query: &str, cli: &Cli) -> Result<()> {
    let explanation = compiler.explain(query, now(cli))?;
    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }

    println!("{}", "Query Explanation".cyan().bold());
    println!();
    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!(
        "{} {} ({})",
        "Entity:".dimmed(),
        explanation.entity.white(),
        explanation.dialect.to_string().dimmed()
    );
    println!();
    println!("{}", "Parsed:".green().bold());
    println!("  {}", explanation.ast.to_string().white());
    println!();
    println!("{}", "Condensed:".green().bold());
    println!("  {}", explanation.condensed.to_string().white());
    println!();
    println!("{}", "Generated SQL:".green().bold());
    println!("  {}", explanation.sql.white());
    Ok(())
}

fn show_tokens(query: &str, format: OutputFormat) -> Result<()> {
    let lexemes = scanner::tokenize(query)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&lexemes)?);
        return Ok(());
    }

    println!(
        "{:>5}  {:8} {}",
        "Pos".white().bold(),
        "Kind".white().bold(),
        "Token".white().bold()
    );
    println!("{}", "─".repeat(40).dimmed());
    for lexeme in &lexemes {
        let token = &lexeme.token;
        let kind = if token.is_quoted() {
            "quoted".green()
        } else if token.is_delimiter() {
            "delim".magenta()
        } else if token.is_reserved() {
            "keyword".cyan()
        } else {
            "word".normal()
        };
        println!(
            "{:>5}  {:8} {}",
            lexeme.position,
            kind,
            token.to_string().yellow()
        );
    }
    Ok(())
}

fn run_repl(compiler: &SearchCompiler, cli: &Cli) -> Result<()> {
    use rustyline::DefaultEditor;
    use rustyline::error::ReadlineError;

    println!("{}", "mailq REPL - Interactive Mode".cyan().bold());
    println!(
        "{} {}",
        "Compiling for".dimmed(),
        compiler.entity().name.white().bold()
    );
    println!("  {}          - Exit the REPL", ".exit".yellow());
    println!("  {}          - Show the search syntax", ".help".yellow());
    println!("  {} - Show every stage for <query>", ".explain <query>".yellow());
    println!();

    let mut rl = DefaultEditor::new().context("failed to initialize REPL")?;

    let history_path = dirs::home_dir()
        .map(|p| p.join(".mailq_history"))
        .unwrap_or_default();
    let _ = rl.load_history(&history_path);

    loop {
        let prompt = "mailq> ".cyan().bold().to_string();
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ".exit" | ".quit" | "exit" | "quit" => break,
                    ".help" | "help" => {
                        show_syntax();
                        continue;
                    }
                    ".clear" | "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        continue;
                    }
                    _ => {}
                }

                let (explain, query) = match line.strip_prefix(".explain") {
                    Some(rest) => (true, rest.trim()),
                    None => (false, line),
                };

                match compiler.explain(query, now(cli)) {
                    Ok(explanation) => {
                        if explain {
                            println!("  {} {}", "parsed   ".dimmed(), explanation.ast);
                            println!("  {} {}", "condensed".dimmed(), explanation.condensed);
                        }
                        println!("{} {}", "→".green(), explanation.sql.white().bold());
                        println!();
                    }
                    Err(e) => {
                        eprintln!("{} {}", "✗".red(), e.to_string().red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

fn show_syntax() {
    println!("{}", "Search Syntax Reference".cyan().bold());
    println!();

    let clauses = [
        ("word", "Any indexed field", "prefix match"),
        ("\"two words\"", "Phrase in any field", "prefix match"),
        ("from:ben", "Sender", "from_ column"),
        ("to:eve", "Recipient", "to_ column"),
        ("subject:lunch", "Subject line", "subject column"),
        ("in:inbox", "Category or label", "categories column"),
        ("is:unread / is:read", "Unread flag", "= 1 / = 0"),
        ("is:starred / is:unstarred", "Starred flag", "= 1 / = 0"),
        ("has:attachment", "Has attachments", "data NOT LIKE"),
        ("before:<date>", "Received before", "timestamp <"),
        ("after:<date> / since:", "Received after", "timestamp >"),
        ("a b / a AND b", "Both", "AND"),
        ("a OR b", "Either", "OR"),
        ("a NOT b", "a without b", "AND NOT"),
        ("( ... )", "Grouping", "( ... )"),
    ];

    println!(
        "{:28} {:22} {}",
        "Clause".white().bold(),
        "Matches".white().bold(),
        "SQL".white().bold()
    );
    println!("{}", "─".repeat(70).dimmed());

    for (clause, meaning, sql) in clauses {
        println!("{:28} {:22} {}", clause.cyan().bold(), meaning.yellow(), sql.dimmed());
    }

    println!();
    println!(
        "{}",
        "Dates: today, yesterday, monday, march, 3 days ago, last week, 2024-01-31".dimmed()
    );
}

//! `parley chat`: Interactive conversation with slash commands.

use parley_agent::ReplyEngine;
use parley_core::message::ConversationId;
use parley_memory::MemoryStats;
use parley_providers::OrchestratorStats;
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// One line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    Status { json: bool },
    Switch(&'a str),
    Clear,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Message(line);
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "status" => Input::Status {
            json: arg.eq_ignore_ascii_case("json"),
        },
        "switch" => Input::Switch(arg),
        "clear" => Input::Clear,
        "reset" => Input::Reset,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(name),
    }
}

#[derive(Serialize)]
struct StatusReport {
    uptime_secs: u64,
    orchestrator: OrchestratorStats,
    memory: MemoryStats,
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn print_status(report: &StatusReport) {
    let stats = &report.orchestrator;

    println!();
    println!("  Provider:    {} (primary)", stats.current_provider);
    for p in &stats.providers {
        println!(
            "  {:<12} key {}/{}   ok {}   errors {}",
            format!("{}:", p.provider),
            p.credential_index + 1,
            p.credential_count,
            p.success_count,
            p.error_count
        );
    }
    println!("  Fallbacks:   {}", stats.fallbacks);
    match &stats.last_error {
        Some(e) => println!(
            "  Last error:  {} {} at {}: {}",
            e.provider,
            e.kind,
            e.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
            e.message
        ),
        None => println!("  Last error:  none"),
    }
    println!(
        "  Memory:      {} conversations, {} messages",
        report.memory.conversations, report.memory.total_messages
    );
    println!("  Uptime:      {}", format_uptime(Duration::from_secs(report.uptime_secs)));
    println!();
}

fn print_help() {
    println!();
    println!("  /status [json]   Provider, key and memory status");
    println!("  /switch <id>     Make gemini or groq the primary provider");
    println!("  /clear           Forget this conversation");
    println!("  /reset           Reset provider statistics");
    println!("  /quit            Leave");
    println!();
}

pub async fn run(user: String, conversation: String) -> Result<(), Box<dyn std::error::Error>> {
    let (config, engine) = super::build_engine()?;
    let conversation = ConversationId(conversation);
    let started = Instant::now();

    engine
        .memory()
        .start_idle_sweep(config.memory.sweep_interval())?;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Parley — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:      {}", engine.orchestrator().current_provider());
    println!("  Conversation:  {conversation}");
    println!("  Memory:        last {} messages", config.memory.max_messages);
    println!();
    println!("  Type your message and press Enter. /help lists commands.");
    println!();

    info!(conversation = %conversation, user = %user, "Chat session started");
    let result = repl(&engine, &conversation, &user, started).await;

    engine.memory().stop_idle_sweep();
    info!(uptime = %format_uptime(started.elapsed()), "Chat session ended");

    println!();
    println!("  Goodbye! 👋");
    println!();

    result
}

async fn repl(
    engine: &ReplyEngine,
    conversation: &ConversationId,
    user: &str,
    started: Instant,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        match parse_input(&line) {
            Input::Message(text) => {
                eprint!("  ...");
                let reply = engine.respond(conversation, user, text).await;
                eprint!("\r     \r");
                println!();
                for line in reply.lines() {
                    println!("  Parley > {line}");
                }
                println!();
            }
            Input::Status { json } => {
                let report = StatusReport {
                    uptime_secs: started.elapsed().as_secs(),
                    orchestrator: engine.orchestrator().stats(),
                    memory: engine.memory().stats().await,
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_status(&report);
                }
            }
            Input::Switch(target) => match engine.orchestrator().switch_provider(target) {
                Ok(switch) => println!("  Primary provider: {} -> {}", switch.previous, switch.current),
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Input::Clear => {
                if engine.clear(conversation).await {
                    println!("  Conversation cleared.");
                } else {
                    println!("  Nothing to clear.");
                }
            }
            Input::Reset => {
                engine.orchestrator().reset_stats();
                println!("  Statistics reset.");
            }
            Input::Help => print_help(),
            Input::Quit => return Ok(()),
            Input::Unknown(name) => eprintln!("  Unknown command '/{name}'. Try /help."),
        }
    }
}

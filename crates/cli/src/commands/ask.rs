//! `chatptk ask` — Single-message or interactive tutoring from the terminal.

use std::io::Write;
use std::sync::Arc;

use chatptk_config::AppConfig;
use chatptk_core::session::SessionId;
use chatptk_memory::InMemorySessionStore;
use chatptk_tutor::{ChatRequest, TutorMode, TutorPipeline};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct AskOptions {
    pub message: Option<String>,
    pub mode: Option<String>,
    pub student_id: Option<String>,
    pub stream: bool,
}

pub async fn run(options: AskOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PTK_API_K        = 'gsk_...'   (Groq)");
        eprintln!("    CHATPTK_API_KEY  = '...'       (generic)");
        eprintln!();
        eprintln!("  Or add api_key to {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let provider = chatptk_providers::build_from_config(&config, &api_key);
    let sessions = Arc::new(InMemorySessionStore::from_config(&config.session));
    let pipeline = TutorPipeline::from_config(&config, provider, sessions);

    let mode = TutorMode::parse(options.mode.as_deref());
    let session = SessionId::new();
    let request = |message: String| {
        let mut request = ChatRequest::new(message, mode);
        request.student_id = options.student_id.clone();
        request
    };

    if let Some(message) = options.message {
        // Single message mode
        reply(&pipeline, &session, &request(message), options.stream, "").await?;
        return Ok(());
    }

    // Interactive mode: one session, so quiz questions carry over between turns
    println!();
    println!("  ╔══════════════════════════════════════╗");
    println!("  ║     ChatPTK Tutor — Interactive      ║");
    println!("  ╚══════════════════════════════════════╝");
    println!();
    println!("  Mode:      {mode}");
    println!("  Model:     {} via {}", config.model, config.provider);
    println!("  Students:  {} loaded", pipeline.roster().len());
    println!("  Lessons:   {} loaded", pipeline.lessons().len());
    println!();
    println!("  Type your answer and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        println!();
        reply(&pipeline, &session, &request(line.to_string()), options.stream, "  Tutor > ").await?;
        println!();
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

async fn reply(
    pipeline: &TutorPipeline,
    session: &SessionId,
    request: &ChatRequest,
    stream: bool,
    prefix: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if stream {
        let mut fragments = pipeline.stream(session, request).await?;
        print!("{prefix}");
        while let Some(fragment) = fragments.next().await {
            print!("{fragment}");
            std::io::stdout().flush()?;
        }
        println!();
    } else {
        eprint!("  Thinking...");
        let reply = pipeline.chat(session, request).await?;
        eprint!("\r              \r");
        for line in reply.text.lines() {
            println!("{prefix}{line}");
        }
    }
    Ok(())
}

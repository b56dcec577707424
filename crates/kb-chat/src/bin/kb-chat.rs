//! kb-chat command line
//!
//! Run with: cargo run -p kb-chat -- <command>

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kb_chat::generation::truncate_snippet;
use kb_chat::ingestion::IngestProgress;
use kb_chat::providers::create_embedder;
use kb_chat::workflow::ProcessEnvironment;
use kb_chat::{
    create_workflow, generate_datasource, resolve_configuration, AgentResponse, ChatInput,
    ChatServer, DebugWorkflow,
};

#[derive(Parser)]
#[command(name = "kb-chat", version, about = "Chat with your documents, with citations")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Build the index from the data directory (`datasource`) or set up the UI (`ui`)
    Generate {
        #[arg(default_value = "datasource")]
        target: String,
    },
    /// Ask a single question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Run through the step-logged debug workflow
        #[arg(long)]
        debug: bool,
    },
    /// Serve the chat HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kb_chat=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Generate { target } => generate(&target).await,
        Cmd::Ask { question, debug } => ask(&question.join(" "), debug).await,
        Cmd::Serve { host, port } => serve(host, port).await,
    }
}

async fn generate(target: &str) -> anyhow::Result<()> {
    match target {
        "datasource" => {}
        "ui" => {
            println!("This project has no custom UI; `kb-chat serve` exposes the chat API.");
            return Ok(());
        }
        other => tracing::warn!("Unknown generate target '{}', generating the datasource", other),
    }

    let settings = resolve_configuration()?;
    let embedder = create_embedder(&settings)?;

    println!(
        "{} {} -> {}",
        style("Generating datasource").bold(),
        settings.storage.data_dir.display(),
        settings.storage.persist_dir.display()
    );

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("█▓▒░ "),
    );
    let on_progress = |p: IngestProgress| {
        bar.set_length(p.total as u64);
        bar.set_position(p.current as u64);
        bar.set_message(p.filename);
    };

    let report = generate_datasource(&settings, embedder, &on_progress).await;
    bar.finish_and_clear();
    let report = report?;

    println!(
        "{} {} documents, {} chunks -> {}",
        style("Indexed").green().bold(),
        report.documents_indexed,
        report.chunks_indexed,
        report.index_path.display()
    );
    if report.skipped_duplicates + report.skipped_unsupported + report.skipped_empty > 0 {
        println!(
            "  skipped: {} duplicate, {} unsupported, {} empty",
            report.skipped_duplicates, report.skipped_unsupported, report.skipped_empty
        );
    }
    for (file, reason) in &report.failed {
        println!("  {} {}: {}", style("failed").red(), file, reason);
    }
    Ok(())
}

async fn ask(question: &str, debug: bool) -> anyhow::Result<()> {
    let response = if debug {
        let workflow = DebugWorkflow::new(Arc::new(ProcessEnvironment::default()));
        workflow.run(json!(question)).await?
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Thinking...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        let result = async { create_workflow().await?.chat(&ChatInput::new(question)).await }.await;
        spinner.finish_and_clear();
        result?
    };

    print_response(&response);
    Ok(())
}

fn print_response(response: &AgentResponse) {
    println!("{}\n", response.answer);

    if response.citations.is_empty() {
        return;
    }
    println!("{}", style("Sources").bold().underlined());
    for (i, source) in response.citations.iter().enumerate() {
        println!(
            "  [{}] {} {}",
            i + 1,
            style(source.format_inline()).cyan(),
            style(format!("({:.2})", source.score)).dim()
        );
        println!("      {}", truncate_snippet(&source.text.replace('\n', " "), 160));
    }
    println!(
        "\n{}",
        style(format!(
            "{} tool calls, {} ms",
            response.tool_calls, response.processing_time_ms
        ))
        .dim()
    );
}

async fn serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let server = ChatServer::from_environment().await?.with_address(host, port);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/chat        - Chat with the knowledge base");
    println!("  POST /api/chat/debug  - Chat through the debug workflow");
    println!("  GET  /api/info        - Server information");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;
    Ok(())
}

//! `faculty queue` subcommands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use faculty_engine::io::write_atomic;
use faculty_engine::{FacultyConfig, FacultyEngine, VisionRequest, VisionStatus, VisionTrigger};
use std::path::PathBuf;

#[derive(Debug, Parser)]
pub struct QueueCli {
    #[command(subcommand)]
    pub command: QueueSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum QueueSubcommand {
    /// Counts by status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List requests in dequeue order
    List {
        /// Only requests in this status
        #[arg(long)]
        status: Option<VisionStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Regenerate the markdown view of the queue
    Render {
        /// Destination (default: QUEUE.md in the state directory)
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Queue a vision request by hand
    Enqueue(EnqueueArgs),
}

#[derive(Debug, Parser)]
pub struct EnqueueArgs {
    /// Why a forecast is wanted
    #[arg(long)]
    pub reason: String,

    /// 0-100; higher is processed first
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub priority: u8,

    /// advisor-intel, system-pattern, manual or intuition
    #[arg(long, default_value = "manual")]
    pub trigger: VisionTrigger,

    #[arg(long)]
    pub notes: Option<String>,

    /// Report or finding that prompted the request
    #[arg(long)]
    pub source: Option<String>,
}

impl QueueCli {
    pub fn run(self, config: FacultyConfig) -> anyhow::Result<u8> {
        let engine = FacultyEngine::open(config).context("failed to open faculty state")?;
        let queue = engine.queue();

        match self.command {
            QueueSubcommand::Status { json } => {
                let status = queue.status()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    println!(
                        "total: {}  pending: {}  processing: {}  completed: {}",
                        status.total, status.pending, status.processing, status.completed
                    );
                }
            }
            QueueSubcommand::List { status, json } => {
                let requests = queue.list(status)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&requests)?);
                } else if requests.is_empty() {
                    println!("(no requests)");
                } else {
                    for request in &requests {
                        println!(
                            "{}  {:<10}  p{:<3}  {:<14}  {}",
                            request.id,
                            request.status.as_str(),
                            request.priority,
                            request.trigger.as_str(),
                            request.trigger_reason
                        );
                    }
                }
            }
            QueueSubcommand::Render { out } => {
                let path = match out {
                    Some(path) => {
                        let markdown = queue.render_markdown()?;
                        write_atomic(&path, markdown.as_bytes())
                            .with_context(|| format!("failed to write {}", path.display()))?;
                        path
                    }
                    None => engine
                        .write_queue_markdown()?
                        .unwrap_or_else(|| engine.config().storage.queue_markdown_path()),
                };
                println!("{}", path.display());
            }
            QueueSubcommand::Enqueue(args) => {
                let mut request = VisionRequest::new(args.trigger, args.reason)
                    .with_priority(args.priority)
                    .with_requester("cli");
                if let Some(notes) = args.notes {
                    request = request.with_notes(notes);
                }
                if let Some(source) = args.source {
                    request = request.with_source_intel(source);
                }
                let id = queue.enqueue(&request)?;
                engine.write_queue_markdown()?;
                println!("{id}");
            }
        }
        Ok(0)
    }
}

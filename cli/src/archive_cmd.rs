//! `faculty archive` subcommands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use faculty_engine::vision::render_vision_markdown;
use faculty_engine::{Disposition, FacultyConfig, SearchCriteria, VisionArchive, VisionTrigger};

#[derive(Debug, Parser)]
pub struct ArchiveCli {
    #[command(subcommand)]
    pub command: ArchiveSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ArchiveSubcommand {
    /// Find archived visions, newest first
    Search(SearchArgs),
    /// Print one archived vision by vision id or archive id
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Record what became of a vision
    Disposition(DispositionArgs),
    /// Print the archive index as markdown
    Render,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Case-insensitive text match
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub trigger: Option<VisionTrigger>,
    #[arg(long)]
    pub disposition: Option<Disposition>,
    #[arg(long)]
    pub min_priority: Option<u8>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct DispositionArgs {
    /// Vision id
    pub id: String,
    /// pending, validated, rejected or superseded
    pub disposition: Disposition,
    #[arg(long)]
    pub reason: String,
    /// A change that resulted from the vision (repeatable)
    #[arg(long = "change", value_name = "TEXT")]
    pub changes: Vec<String>,
}

impl ArchiveCli {
    pub fn run(self, config: FacultyConfig) -> anyhow::Result<u8> {
        let root = config.storage.archive_root();
        let archive = VisionArchive::open(&root)
            .with_context(|| format!("failed to open archive at {}", root.display()))?;

        match self.command {
            ArchiveSubcommand::Search(args) => {
                let criteria = SearchCriteria {
                    text: args.text,
                    trigger: args.trigger,
                    disposition: args.disposition,
                    min_priority: args.min_priority,
                    project: args.project,
                    since: None,
                    limit: args.limit,
                };
                let records = archive.search_visions(&criteria)?;
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                } else if records.is_empty() {
                    println!("(no matching visions)");
                } else {
                    for record in &records {
                        println!(
                            "{}  {}  {:<10}  p{:<3}  {}",
                            record.metadata.archived_at.format("%Y-%m-%d"),
                            record.request.id,
                            record.metadata.disposition.as_str(),
                            record.request.priority,
                            record.request.trigger_reason
                        );
                    }
                }
            }
            ArchiveSubcommand::Show { id, json } => {
                let Some(record) = archive.get_vision(&id)? else {
                    anyhow::bail!("no archived vision {id}");
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                } else {
                    print!("{}", render_vision_markdown(&record));
                }
            }
            ArchiveSubcommand::Disposition(args) => {
                let entry = archive.update_disposition(
                    &args.id,
                    args.disposition,
                    &args.reason,
                    &args.changes,
                )?;
                println!(
                    "{} -> {}",
                    entry.vision_id,
                    entry.metadata.disposition.as_str()
                );
            }
            ArchiveSubcommand::Render => {
                print!("{}", archive.render_index_markdown()?);
            }
        }
        Ok(0)
    }
}

//! XmlSpace CLI
//!
//! Command-line front end over `XmlStore`. Line numbers are the ones printed by
//! `show --numbered`: the root element is line 1.
//!
//! # Usage
//!
//! ```bash
//! xmlspace store people.xml
//! xmlspace show 1 --numbered
//! xmlspace set 1 3 '__text__=31'
//! xmlspace insert 1 1 '<person id="3" name="Kamil"/>'
//! xmlspace reorder 1 5 1
//! xmlspace search John
//! ```
//!
//! The database defaults to `~/.xmlspace/database/xmlspace.db`; override with
//! `--db`, `--config <file.json>` or the `XMLSPACE_DB` environment variable.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use xmlspace_core::{XmlSpaceConfig, XmlStore};

const DEFAULT_LOG_FILTER: &str = "xmlspace=info,xmlspace_core=info";

/// XmlSpace - XML documents stored as rows, edited by line
#[derive(Parser, Debug)]
#[command(name = "xmlspace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database file (overrides config file and XMLSPACE_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List stored documents
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store an XML file ("-" reads stdin)
    Store { file: PathBuf },

    /// Print a stored document
    Show {
        id: i64,

        /// Prefix every line with its line number
        #[arg(short, long)]
        numbered: bool,
    },

    /// Print the node id on a line
    Resolve { id: i64, line: usize },

    /// Delete a stored document
    Remove {
        id: i64,

        /// Commit each deleted element separately
        #[arg(long)]
        stepwise: bool,
    },

    /// Replace a field value: EDIT is key=value, __text__ for element text
    Set { id: i64, line: usize, edit: String },

    /// Append an XML fragment as the last child of the node on LINE
    Insert {
        id: i64,
        line: usize,
        fragment: String,
    },

    /// Swap the node on LINE with its sibling at POSITION
    #[command(allow_negative_numbers = true)]
    Reorder { id: i64, line: usize, position: i64 },

    /// Find elements owning an attribute or text equal to VALUE
    Search {
        value: String,

        /// Only search this document
        #[arg(long)]
        root: Option<i64>,
    },

    /// Delete every stored document
    Clear {
        /// Required; clearing cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

impl Cli {
    /// Config file (or defaults), then environment, then `--db`
    fn load_config(&self) -> Result<XmlSpaceConfig> {
        let base = match &self.config {
            Some(path) => XmlSpaceConfig::from_json_file(path).map_err(anyhow::Error::msg)?,
            None => XmlSpaceConfig::default(),
        };

        let mut config = base
            .apply_overrides(|key| std::env::var(key).ok())
            .map_err(anyhow::Error::msg)?;

        if let Some(db) = &self.db {
            config.database_path = Some(db.clone());
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    tracing::debug!("Resolved configuration: {:?}", config);
    let store = XmlStore::open(config)
        .await
        .context("Failed to open XmlSpace store")?;
    tracing::debug!("Using database {}", store.database_path().display());

    run(&store, cli.command).await
}

async fn run(store: &XmlStore, command: Command) -> Result<()> {
    match command {
        Command::List { json } => {
            let documents = store.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else {
                for doc in documents {
                    println!("{}\t{}", doc.id, doc.name);
                }
            }
        }
        Command::Store { file } => {
            let text = read_input(&file)?;
            tracing::debug!("Read {} bytes from {}", text.len(), file.display());
            let id = store.store(&text).await?;
            println!("{}", id);
        }
        Command::Show { id, numbered } => {
            let rendered = store.retrieve(id).await?;
            if numbered {
                print!("{}", number_lines(&rendered));
            } else {
                println!("{}", rendered);
            }
        }
        Command::Resolve { id, line } => {
            println!("{}", store.resolve(id, line).await?);
        }
        Command::Remove { id, stepwise } => {
            if stepwise {
                store.remove_stepwise(id).await?;
            } else {
                store.remove(id).await?;
            }
        }
        Command::Set { id, line, edit } => {
            store.set_value(id, line, &edit).await?;
        }
        Command::Insert { id, line, fragment } => {
            let inserted = store.insert(id, line, &fragment).await?;
            println!("{}", inserted);
        }
        Command::Reorder { id, line, position } => {
            store.reorder(id, line, position).await?;
        }
        Command::Search { value, root } => {
            let matches = match root {
                Some(root) => store.search_in(root, &value).await?,
                None => store.search(&value).await?,
            };
            for element in matches {
                println!("{}", element);
            }
        }
        Command::Clear { yes } => {
            if !yes {
                tracing::warn!("Clear requested without --yes");
                bail!("Refusing to clear without --yes");
            }
            store.clear().await?;
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Right-aligned line numbers, root on line 1
fn number_lines(rendered: &str) -> String {
    let lines: Vec<&str> = rendered.lines().collect();
    let width = lines.len().to_string().len();

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}  {}\n", i + 1, line, width = width))
        .collect()
}

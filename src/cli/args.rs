use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "tapkit")]
#[command(about = "Offline queue tooling for the TapKit automation platform")]
#[command(long_about = "tapkit - offline queue tooling for the TapKit automation platform

Inspect and manage the durable operation queue that captures user actions
(share links, NFC writes, QR codes, automation updates) while a device is
offline and replays them once connectivity returns.

QUICK START:
  tapkit queue status                     Show counts per status
  tapkit queue ready                      What the next sync pass would drain
  tapkit queue add nfc-write -p '{\"tag\":\"A1\"}'
  tapkit queue dead                       Operations that exhausted retries

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  tapkit <command> --help")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output (default),
    /// or 'json' for machine-readable output suitable for scripting.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the offline operation queue
    ///
    /// The queue holds user actions issued while offline. Subcommands
    /// inspect its contents, enqueue work by hand, reset failed entries,
    /// and prune expired ones.
    #[command(alias = "q")]
    Queue(QueueArgs),

    /// Generate shell completion scripts
    ///
    /// # Examples
    ///
    ///   tapkit completions zsh > ~/.zsh/completions/_tapkit
    ///   source <(tapkit completions bash)
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

/// Arguments for the queue command family.
#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Show queue status
    ///
    /// Prints counts per status (pending, processing, completed, failed,
    /// dead letter) and the total, including dead-lettered entries.
    ///
    /// # Examples
    ///
    ///   tapkit queue status
    ///   tapkit queue status -o json | jq .pending
    #[command(alias = "st")]
    Status,

    /// List queued operations
    ///
    /// Shows active operations with the given status (default: pending),
    /// oldest first.
    ///
    /// # Examples
    ///
    ///   tapkit queue list
    ///   tapkit queue list --status failed
    ///   tapkit queue list --status dead_letter --limit 10
    #[command(alias = "ls")]
    List {
        /// Status to filter by (pending, processing, completed, failed, dead_letter)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of operations to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// List operations the next sync pass would drain, in order
    ///
    /// Ready operations are pending entries whose retry delay (if any)
    /// has elapsed, ordered by priority (high first) and enqueue order
    /// within a priority. This is a pure read; nothing is claimed.
    Ready,

    /// Show a single operation by id
    Show {
        /// Operation id
        id: String,
    },

    /// Enqueue an operation by hand
    ///
    /// Mostly useful for testing a deployment; the app surfaces enqueue
    /// operations themselves.
    ///
    /// # Examples
    ///
    ///   tapkit queue add share-create -p '{"url":"https://example.com"}'
    ///   tapkit queue add nfc-write -p '{"tag":"A1"}' --priority high
    ///   tapkit queue add qr-generate --max-retries 5
    Add {
        /// Operation type (share-create, nfc-write, qr-generate, automation-update)
        operation: String,

        /// JSON payload for the collaborator that executes the operation
        #[arg(short, long)]
        payload: Option<String>,

        /// Drain priority (high, normal, low); defaults per operation type
        #[arg(long)]
        priority: Option<String>,

        /// Retry budget; defaults from configuration
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Reset failed operations so the next sync retries them
    ///
    /// # Examples
    ///
    ///   tapkit queue retry 01ARZ3NDEKTSV4RRFFQ69G5FAV
    ///   tapkit queue retry --all
    Retry {
        /// Reset all failed operations
        #[arg(long)]
        all: bool,

        /// Operation id to reset
        id: Option<String>,
    },

    /// Requeue a dead-lettered operation with a fresh retry budget
    ///
    /// Dead-lettered operations are never retried automatically; this is
    /// the manual intervention that puts one back in play.
    RequeueDead {
        /// Operation id
        id: String,
    },

    /// List dead-lettered operations
    Dead {
        /// Maximum number of operations to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Remove expired operations from the queue
    ///
    /// Without flags, runs the retention sweep (removes completed and
    /// exhausted entries past the retention window). With --all --force,
    /// removes everything including dead letters.
    Clear {
        /// Remove all operations regardless of status or age
        #[arg(long)]
        all: bool,

        /// Required confirmation for --all
        #[arg(long)]
        force: bool,
    },
}

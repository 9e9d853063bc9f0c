use chunkstore::core::placement::PlacementPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "chunkstore", version = "0.1.0")]
/// Chunked, replicated object store
pub struct Arguments {
    #[arg(short, long, global = true)]
    /// Config file with the configuration of every role. In YAML format.
    pub config: Option<String>,

    #[arg(short, long, global = true)]
    /// Log info about the ongoing communication to stdout. (For debugging purposes).
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the coordinator (directory) service
    Coordinator {
        #[arg(long)]
        /// Address to listen on, e.g. 0.0.0.0:9000
        listen: Option<String>,

        #[arg(long)]
        /// Number of storage nodes every chunk is placed on
        replication_factor: Option<usize>,

        #[arg(long)]
        /// Placement policy: first_registered or rendezvous
        placement: Option<PlacementPolicy>,
    },
    /// Run a storage node and register it with the coordinator
    StorageNode {
        #[arg(long)]
        /// Node id. A random UUID when not set.
        id: Option<String>,

        #[arg(long)]
        /// Address to listen on, e.g. 0.0.0.0:9001
        listen: Option<String>,

        #[arg(long)]
        /// Host registered with the coordinator, or "auto"
        advertise_host: Option<String>,

        #[arg(long)]
        /// Directory the chunks are stored in
        store: Option<PathBuf>,

        #[arg(long)]
        /// Coordinator address
        coordinator: Option<String>,
    },
    /// Upload a file
    Upload {
        #[arg(short, long)]
        /// File to upload
        file: PathBuf,

        #[arg(long)]
        /// Name to store the file under. Defaults to the file's base name.
        name: Option<String>,

        #[arg(long)]
        /// Coordinator address
        coordinator: Option<String>,
    },
    /// Download a file
    Download {
        #[arg(short, long)]
        /// Name of the file to download
        file: String,

        #[arg(short, long)]
        /// Where to write the file
        out: PathBuf,

        #[arg(long)]
        /// Coordinator address
        coordinator: Option<String>,
    },
    /// List the files known to the coordinator
    List {
        #[arg(long)]
        /// Coordinator address
        coordinator: Option<String>,
    },
}

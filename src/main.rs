mod cli;

use anyhow::Context;
use chunkstore::config::{ClientConfig, Config, CoordinatorConfig, StorageConfig};
use chunkstore::core::client::Client;
use chunkstore::core::coordinator::Coordinator;
use chunkstore::networking::codec::NetworkError;
use chunkstore::networking::message_dispatcher::MessageDispatcher;
use chunkstore::networking::node_info::StorageNodeRecord;
use chunkstore::networking::tcp_listener::TcpListenerService;
use chunkstore::storage::chunk_store::ChunkStore;
use chunkstore::storage::storage_node::{register_with_coordinator, StorageNode};
use chunkstore::utils::logging::{init_logging, level_for_verbosity};
use clap::Parser;
use cli::args::{Arguments, Command};
use log::{error, info};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    init_logging(level_for_verbosity(args.verbose));

    let mut config = match &args.config {
        Some(config_path) => Config::parse_from_file(config_path).map_err(|e| {
            error!("Failed to read configuration file '{}': {}", config_path, e);
            e
        })?,
        None => Config::default(),
    };

    match args.command {
        Command::Coordinator {
            listen,
            replication_factor,
            placement,
        } => {
            if let Some(listen) = listen {
                config.coordinator.listen_address = listen;
            }
            if let Some(replication_factor) = replication_factor {
                config.coordinator.replication_factor = replication_factor;
            }
            if let Some(placement) = placement {
                config.coordinator.placement = placement;
            }
            config.validate()?;
            run_coordinator(config.coordinator).await
        }
        Command::StorageNode {
            id,
            listen,
            advertise_host,
            store,
            coordinator,
        } => {
            if id.is_some() {
                config.storage.node_id = id;
            }
            if let Some(listen) = listen {
                config.storage.listen_address = listen;
            }
            if advertise_host.is_some() {
                config.storage.advertise_host = advertise_host;
            }
            if let Some(store) = store {
                config.storage.storage_path = store.to_string_lossy().into_owned();
            }
            if let Some(coordinator) = coordinator {
                config.storage.coordinator_address = coordinator;
            }
            run_storage_node(config.storage).await
        }
        Command::Upload {
            file,
            name,
            coordinator,
        } => {
            let client = build_client(config.client, coordinator)?;
            let manifest = match name {
                Some(name) => client.upload_as(&file, &name).await,
                None => client.upload(&file).await,
            }
            .with_context(|| format!("Failed to upload {}", file.display()))?;

            println!("File uploaded successfully!");
            println!("File: {}", manifest);
            for (index, chunk_id) in manifest.chunks.iter().enumerate() {
                println!(" - [{}] {}", index, chunk_id);
            }
            Ok(())
        }
        Command::Download {
            file,
            out,
            coordinator,
        } => {
            let client = build_client(config.client, coordinator)?;
            let written = client
                .download(&file, &out)
                .await
                .with_context(|| format!("Failed to download {}", file))?;
            println!("File downloaded successfully! Saved to {:?}", written);
            Ok(())
        }
        Command::List { coordinator } => {
            let client = build_client(config.client, coordinator)?;
            let files = client.list_files().await?;
            if files.is_empty() {
                println!("No files stored.");
            }
            for file in files {
                println!(" - {}", file);
            }
            Ok(())
        }
    }
}

fn build_client(mut config: ClientConfig, coordinator: Option<String>) -> anyhow::Result<Client> {
    if let Some(coordinator) = coordinator {
        config.coordinator_address = coordinator;
    }
    Ok(Client::new(config)?)
}

async fn run_coordinator(config: CoordinatorConfig) -> anyhow::Result<()> {
    let listener = TcpListenerService::bind(&config.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_address))?;
    let coordinator = Arc::new(Coordinator::new(
        config.replication_factor,
        config.placement,
    ));

    info!(
        "Coordinator listening at {} (replication factor {}, placement {})",
        listener.local_addr(),
        coordinator.replication_factor(),
        config.placement
    );
    serve_until_shutdown(listener.serve(coordinator, config.worker_count)).await
}

async fn run_storage_node(config: StorageConfig) -> anyhow::Result<()> {
    let chunk_store = ChunkStore::new(PathBuf::from(&config.storage_path))?;
    let listener = TcpListenerService::bind(&config.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_address))?;

    let host = config.resolve_advertise_host(listener.local_addr())?;
    let record = StorageNodeRecord::new(host, listener.get_port(), config.resolve_node_id());
    register_with_coordinator(
        &MessageDispatcher::default(),
        &config.coordinator_address,
        &record,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to register with coordinator at {}",
            config.coordinator_address
        )
    })?;

    info!(
        "Storage node {} listening at {}, storing chunks in '{}'",
        record,
        listener.local_addr(),
        config.storage_path
    );
    let storage_node = Arc::new(StorageNode::new(chunk_store));
    serve_until_shutdown(listener.serve(storage_node, config.worker_count)).await
}

async fn serve_until_shutdown(
    server: impl Future<Output = Result<(), NetworkError>>,
) -> anyhow::Result<()> {
    tokio::select! {
        result = server => Ok(result?),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Received shutdown signal, stopping.");
            Ok(())
        }
    }
}

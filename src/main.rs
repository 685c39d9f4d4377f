// src/main.rs
//! `ndn-dv` command line.
//!
//! `simulate` runs a whole topology in one process over an in-memory network
//! and prints what every router ended up with. `faces` creates the faces of
//! one router config through `nfdc` and prints their ids.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ndn_dv::control::Retrying;
use ndn_dv::mem::{MemoryControl, MemoryNetwork};
use ndn_dv::nfdc::Nfdc;
use ndn_dv::{DvConfig, DvNode, ForwardingControl, Name, NodeHandle};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Distance-vector routing for named data networks
#[derive(Parser, Debug)]
#[command(name = "ndn-dv", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a topology (JSON array of router configs) in memory
    Simulate {
        #[arg(value_name = "FILE")]
        topology: PathBuf,

        /// Take the link between two routers down halfway through
        #[arg(long, value_name = "A,B", value_delimiter = ',', num_args = 2)]
        fail: Vec<Name>,

        /// How long to run, in seconds
        #[arg(long, default_value_t = 30)]
        duration: u64,
    },

    /// Create the faces of a router config through nfdc
    Faces {
        #[arg(value_name = "FILE")]
        config: PathBuf,

        /// Also set this forwarding strategy on the sync group
        #[arg(long)]
        strategy: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let res = match args.command {
        Command::Simulate {
            topology,
            fail,
            duration,
        } => simulate(topology, fail, Duration::from_secs(duration)).await,
        Command::Faces { config, strategy } => faces(config, strategy).await,
    };

    if let Err(e) = res {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn simulate(
    topology: PathBuf,
    fail: Vec<Name>,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let configs = DvConfig::load_topology(&topology)?;
    info!(routers = configs.len(), path = %topology.display(), "loaded topology");

    let net = MemoryNetwork::new();
    let mut nodes = Vec::new();
    for config in configs {
        let endpoint = Arc::new(net.endpoint(config.name.clone()));
        let control = Arc::new(MemoryControl::new());
        nodes.push(DvNode::start(config, endpoint.clone(), endpoint, control).await?);
    }

    if let [a, b] = fail.as_slice() {
        if run_for(duration / 2).await {
            print_tables(&nodes).await;
            warn!(%a, %b, "taking link down");
            net.set_link_up(a, b, false);
            run_for(duration / 2).await;
        }
    } else {
        run_for(duration).await;
    }
    print_tables(&nodes).await;

    for node in nodes {
        node.shutdown().await;
    }
    Ok(())
}

/// Sleep for `duration`. Returns false if interrupted by Ctrl-C first.
async fn run_for(duration: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => info!("interrupted, stopping early"),
                Err(e) => error!("failed to listen for shutdown signal: {e}"),
            }
            false
        }
    }
}

async fn print_tables(nodes: &[NodeHandle]) {
    for node in nodes {
        let Some(snap) = node.snapshot().await else {
            warn!(router = %node.router(), "node is not running");
            continue;
        };
        println!("== {} (adv seq {})", snap.router, snap.advert_seq);
        for (dest, entry) in snap.rib.iter() {
            let costs: Vec<String> = entry
                .costs()
                .iter()
                .map(|(face, cost)| format!("{face}:{cost}"))
                .collect();
            println!("  rib {dest} [{}]", costs.join(" "));
        }
        for (prefix, hops) in &snap.fib {
            let hops: Vec<String> = hops.iter().map(|(f, c)| format!("{f}:{c}")).collect();
            println!("  fib {prefix} [{}]", hops.join(" "));
        }
    }
}

async fn faces(config: PathBuf, strategy: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = DvConfig::load_file(&config)?;
    let nfdc = Retrying::new(Nfdc::new());

    for link in &config.links {
        match link.faceid {
            Some(face) => println!("{} {} (configured)", link.other_name, face),
            None => {
                let face = nfdc.create_link(&link.other_ip).await?;
                println!("{} {}", link.other_name, face);
            }
        }
    }

    if let Some(strategy) = strategy {
        nfdc.inner().set_strategy(&config.sync, &strategy).await?;
        info!(group = %config.sync, %strategy, "strategy set");
    }
    Ok(())
}

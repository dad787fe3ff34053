// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use anyhow::Result;
use rafdp_node::{Engine, NodeConfig};
use structopt::StructOpt;
use tracing::info;

#[derive(Debug, StructOpt)]
#[structopt(name = "rafdp-node", about = "RAFDP content distribution daemon")]
struct Args {
    /// Port for the loopback RPC control plane
    #[structopt(default_value = "7284")]
    rpc_port: u16,

    /// Port for the RAFDP datagram protocol (0 picks an ephemeral port)
    #[structopt(default_value = "0")]
    rafdp_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::from_args();

    let engine = Engine::start(NodeConfig {
        rpc_port: args.rpc_port,
        rafdp_port: args.rafdp_port,
    })
    .await?;

    tokio::signal::ctrl_c().await?;
    info!("halting rafdp node");
    engine.shutdown();
    Ok(())
}

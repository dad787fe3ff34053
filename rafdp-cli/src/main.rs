// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use anyhow::Result;
use rafdp_client::{HashPayload, RpcClient};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "rafdp-cli", about = "Control a running RAFDP node")]
struct Args {
    /// RPC port of the node to talk to
    #[structopt(long, default_value = "7284")]
    rpc_port: u16,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Add a file to be shared
    Addfile { filename: String },
    /// Print the node's RAFDP port
    Getport,
    /// Print the node's process id
    Getpid,
    /// Add a peer by address
    Addpeer { ip: String, port: u16 },
    /// Pin a foreign root hash so the node starts resolving it
    Addhash { hash: String },
    /// Resolve a hash to its payload
    Gethash { hash: String },
    /// Register a tracker announce URL
    Addurl { url: String },
    /// List all known peers
    Getpeers,
}

fn main() -> Result<()> {
    let args = Args::from_args();
    let client = RpcClient::new(args.rpc_port);

    match args.command {
        Command::Addfile { filename } => println!("{}", client.add_file(&filename)?),
        Command::Getport => println!("{}", client.get_port()?),
        Command::Getpid => println!("{}", client.get_pid()?),
        Command::Addpeer { ip, port } => {
            client.add_peer(&ip, port)?;
            println!("Added {}:{} as peer", ip, port);
        }
        Command::Addhash { hash } => {
            client.add_hash(&hash)?;
            println!("Added hash {}", hash);
        }
        Command::Gethash { hash } => match client.get_hash(&hash)? {
            Some(HashPayload::Text(payload)) => println!("{}", payload),
            Some(HashPayload::Bytes(payload)) => println!("{} bytes of chunk data", payload.len()),
            None => println!("(not resolved yet)"),
        },
        Command::Addurl { url } => {
            client.add_url(&url)?;
            println!("Added tracker {}", url);
        }
        Command::Getpeers => {
            for (ip, port) in client.get_peers()? {
                println!("{} {}", ip, port);
            }
        }
    }
    Ok(())
}

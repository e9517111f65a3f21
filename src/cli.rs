// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

/// `swarm-node node` subcommands.
#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    /// Start this node: opens the gossip mesh, the broker mesh (if
    /// configured), the dispatcher, the integrator sweep, and leader
    /// election, and blocks until interrupted.
    Run {
        /// Path to the node config file.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration (all layered YAML files merged)
    /// and exit.
    ShowConfig {
        /// Path to the node config file.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print this node's DID and public-key fingerprint, generating an
    /// identity on first run if none is persisted yet.
    Id {
        /// Path to the node config file.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

/// `swarm-node broker` subcommands.
#[derive(Subcommand, Debug)]
pub enum BrokerCommands {
    /// Start only the cross-swarm broker mesh: the bounty board and
    /// offering relay, without the intra-swarm gossip/dispatcher/
    /// integrator/election loops. Used for a standalone seneschal.
    Run {
        /// Path to the node config file.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Node lifecycle: run the full swarm participant, inspect config,
    /// print identity.
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },

    /// Stand up a standalone broker (seneschal) process.
    Broker {
        #[command(subcommand)]
        command: BrokerCommands,
    },

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
#[command(name = "swarm-node", version, about = "Decentralized swarm orchestrator node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace). Overridden by
    /// RUST_LOG if set.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "swarm-node", &mut std::io::stdout());
}

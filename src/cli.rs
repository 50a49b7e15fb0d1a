use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "datapack")]
#[command(about = "Build, inspect and sign DataPack containers")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More logging, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Packs files into a new pack, one part per file
    Pack {
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[arg(short, long)]
        prefix: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Pack header as NAME=VALUE, may repeat
        #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
        headers: Vec<(String, Option<String>)>,

        /// Pack property as NAME=VALUE, may repeat
        #[arg(long = "property", value_name = "NAME=VALUE", value_parser = parse_pair)]
        properties: Vec<(String, Option<String>)>,

        /// Key pair file, signs the pack when given
        #[arg(short, long, value_name = "FILE")]
        key: Option<PathBuf>,

        /// Files or directories to pack
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Prints a pack's metadata and parts
    List {
        file: PathBuf,

        #[arg(short, long)]
        prefix: Option<String>,

        /// Read parts in place instead of copying them out
        #[arg(short, long)]
        attached: bool,
    },

    /// Writes every part out to a directory
    Extract {
        file: PathBuf,

        #[arg(short = 'd', long, value_name = "DIR")]
        dir: PathBuf,

        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Signs an unsigned pack
    Sign {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        key: PathBuf,
    },

    /// Checks a signed pack against a public key or key pair
    Verify {
        file: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        key: PathBuf,
    },

    /// Strips the signature off a signed pack
    Unsign {
        input: PathBuf,
        output: PathBuf,
    },

    /// Generates a key pair into FILE and its public key into FILE.pub
    Keygen {
        output: PathBuf,
    },
}

// NAME=VALUE, a bare NAME carries no value
fn parse_pair(arg: &str) -> Result<(String, Option<String>), String> {
    let (name, value) = match arg.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (arg, None),
    };
    if name.trim().is_empty() {
        return Err(format!("missing name in {:?}", arg));
    }
    Ok((name.to_string(), value))
}

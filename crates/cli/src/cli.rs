use std::path::PathBuf;

use clap::Parser;

/// Place one shipment from a JSON inventory file and print it as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Inventory file: owner, products and carriers.
    #[arg(short, long, value_name = "FILE")]
    pub input_file: PathBuf,
    /// Carrier to load, by name. Defaults to the first carrier in the file.
    #[arg(short, long, value_name = "NAME")]
    pub carrier: Option<String>,
    /// Name given to the shipment.
    #[arg(short, long, default_value = "shipment")]
    pub name: String,
    /// Human-readable logs instead of JSON lines.
    #[arg(long)]
    pub pretty_logs: bool,
}

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ballotbox-server", version, about = "Ballotbox poll server")]
pub struct Args {
    /// Path to the TOML config file. A missing file means built-in defaults.
    #[arg(short, long, default_value = "ballotbox.toml")]
    pub config: PathBuf,

    /// Address to listen on; overrides `server.bind_address`.
    #[arg(long)]
    pub bind: Option<String>,

    /// Seed the demo poll even if the config turns it off.
    #[arg(long)]
    pub seed_demo: bool,
}

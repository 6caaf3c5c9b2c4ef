use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Wipe the index before loading seed data.
    #[arg(long, default_value_t = false)]
    pub rebuild: bool,
}

mod auth;
mod convert;
mod show;

use crate::error::Result;
use clap::{Parser, Subcommand};

pub use convert::ConvertArgs;
pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "tabcopy")]
#[command(about = "Copy selected XLSX tabs from Google Drive into Google Sheets", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Convert(args) => args.execute().await,
            Commands::Auth { reset } => auth::execute(*reset).await,
            Commands::Show { resource } => resource.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy tabs from an XLSX file in Drive into a Google Sheets spreadsheet
    Convert(ConvertArgs),
    /// Verify Google authentication, optionally clearing cached tokens first
    Auth {
        #[arg(long)]
        reset: bool,
    },
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}

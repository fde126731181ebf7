use crate::config::toml_config::EtlConfig;
use crate::core::etl::StageCommand;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "github-csv-etl")]
#[command(about = "Fetch CSV files from a GitHub folder, impute missing values and upload them")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "etl-config.toml", global = true)]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub owner: Option<String>,

    #[arg(long, global = true)]
    pub repo: Option<String>,

    #[arg(long, global = true)]
    pub branch: Option<String>,

    #[arg(long, global = true)]
    pub folder_path: Option<String>,

    /// Imputation policy: drop, fill or mean
    #[arg(long, global = true)]
    pub policy: Option<String>,

    /// Constant used by the fill policy
    #[arg(long, global = true)]
    pub fill_value: Option<String>,

    #[arg(long, global = true)]
    pub container: Option<String>,

    #[arg(long, global = true)]
    pub staging_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List CSV files in the source folder
    List,
    /// Download every listed file into the staging directory
    Fetch,
    /// Clean and upload every CSV file in the staging directory
    TransformAndLoad,
    /// List, fetch, clean and upload in one pass
    Run,
}

impl From<Command> for StageCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::List => StageCommand::List,
            Command::Fetch => StageCommand::Fetch,
            Command::TransformAndLoad => StageCommand::TransformAndLoad,
            Command::Run => StageCommand::Run,
        }
    }
}

impl Cli {
    /// Command-line values win over the configuration file.
    pub fn apply_overrides(&self, config: &mut EtlConfig) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.source.owner, &self.owner);
        set(&mut config.source.repo, &self.repo);
        set(&mut config.source.branch, &self.branch);
        set(&mut config.source.folder_path, &self.folder_path);
        set(&mut config.transform.policy, &self.policy);
        set(&mut config.load.container, &self.container);
        if self.fill_value.is_some() {
            config.transform.fill_value = self.fill_value.clone();
        }
        if self.staging_dir.is_some() {
            config.staging.dir = self.staging_dir.clone();
        }
    }
}

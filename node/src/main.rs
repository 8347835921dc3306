//! MONFUNDME Node Binary

use clap::{Parser, Subcommand};
use monfundme_campaign::GenesisConfig;
use monfundme_core::{create_event_channel, Address, EventEmitter, NodeConfig};
use monfundme_node::PersistentRuntime;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "monfundme-node")]
#[command(about = "MONFUNDME - Governance-gated crowdfunding ledger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a genesis deployment file
    Genesis {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Deployment name
        #[arg(long, default_value = "MONFUNDME Devnet")]
        name: String,

        /// Registry controller and factory administrator (hex address)
        #[arg(long)]
        admin: String,

        /// Initial validator address; repeat for several
        #[arg(long = "validator")]
        validators: Vec<String>,

        /// Distinct signatures required to execute a proposal
        #[arg(long, default_value = "2")]
        threshold: usize,

        /// Reject executions outside the voting window
        #[arg(long)]
        enforce_voting_window: bool,
    },

    /// Apply a genesis file to a data directory
    Init {
        /// Genesis file path
        #[arg(short, long)]
        genesis: PathBuf,

        #[command(flatten)]
        node: NodeArgs,
    },

    /// Show validators, counts and state version
    Status {
        #[command(flatten)]
        node: NodeArgs,
    },

    /// List every deployed campaign
    Campaigns {
        #[command(flatten)]
        node: NodeArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct NodeArgs {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl NodeArgs {
    fn load(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn open(config: &NodeConfig) -> anyhow::Result<PersistentRuntime> {
    let (tx, mut rx) = create_event_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!("Ledger event: {:?}", event);
        }
    });
    Ok(PersistentRuntime::open(config, EventEmitter::new(tx)).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Genesis {
            output,
            name,
            admin,
            validators,
            threshold,
            enforce_voting_window,
        } => {
            init_logging("info");

            let admin = Address::from_hex(&admin)
                .map_err(|e| anyhow::anyhow!("invalid admin address {}: {}", admin, e))?;
            let mut genesis = GenesisConfig::new(&name, &admin).with_threshold(threshold);
            genesis.governance.enforce_voting_window = enforce_voting_window;
            genesis.validators = validators;
            genesis.validate()?;
            genesis.save(&output)?;

            println!("Genesis configuration saved to: {}", output.display());
        }

        Commands::Init { genesis, node } => {
            let config = node.load()?;
            init_logging(&config.log_level);

            let genesis = GenesisConfig::load(&genesis)?;
            let runtime = open(&config).await?;
            let hash = runtime.initialize_genesis(genesis).await?;

            info!("Data directory {} initialized", config.data_dir.display());
            println!("Genesis hash: {}", hash.to_hex());
        }

        Commands::Status { node } => {
            let config = node.load()?;
            init_logging(&config.log_level);

            let runtime = open(&config).await?;
            let status = runtime.status().await?;

            println!("State version:  {}", status.version);
            println!("State root:     {}", status.state_root.to_hex());
            println!("Threshold:      {}", status.threshold);
            match status.vote_executor {
                Some(executor) => println!("Vote executor:  {}", executor.to_hex()),
                None => println!("Vote executor:  (not initialized)"),
            }
            println!("Campaigns:      {}", status.campaigns);
            println!("Validators:     {}", status.validators);
            for validator in runtime.validators().await? {
                println!("  {} (since {})", validator.address.to_hex(), validator.added_at);
            }
        }

        Commands::Campaigns { node, json } => {
            let config = node.load()?;
            init_logging(&config.log_level);

            let runtime = open(&config).await?;
            let campaigns = runtime.campaign_summaries().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&campaigns)?);
                return Ok(());
            }

            println!("Found {} campaigns", campaigns.len());
            for (i, campaign) in campaigns.iter().enumerate() {
                println!();
                println!("Campaign #{}", i + 1);
                println!("  Address:          {}", campaign.id.to_hex());
                println!("  Owner:            {}", campaign.owner.to_hex());
                println!("  Title:            {}", campaign.title);
                println!("  Description:      {}", campaign.description);
                println!("  Image:            {}", campaign.image);
                println!("  Metadata hash:    {}", campaign.metadata_hash.to_hex());
                println!("  Target:           {}", campaign.target);
                println!("  Deadline:         {}", campaign.deadline);
                println!("  Amount collected: {}", campaign.amount_collected);
                println!("  Withdrawn:        {}", campaign.withdrawn);

                let donations = runtime.donations(&campaign.id).await?;
                println!("  Donators:         {}", donations.len());
                for donation in donations {
                    println!("    {} gave {}", donation.donor.to_hex(), donation.amount);
                }
            }
        }
    }

    Ok(())
}

use clap::{ArgAction, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use guestinfo_datasource::config::Config;
use guestinfo_datasource::datasource::{self, Acquired, Outcome};
use guestinfo_datasource::distro::Ifupdown;
use guestinfo_datasource::guestinfo::RpcTool;
use guestinfo_datasource::logging::setup_tracing;
use guestinfo_datasource::utils::{SearchPath, get_version_string};
use guestinfo_datasource::Error;

// clap uses 2 for usage errors, those are mapped to 1
const EXIT_SKIPPED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "guestinfo-datasource",
    about = "Read cloud-init data from VMware guestinfo",
    disable_version_flag = true
)]
struct Cli {
    #[arg(long, help = "Print version and exit")]
    version: bool,
    #[arg(long, global = true, help = "cloud.cfg style configuration file")]
    config: Option<PathBuf>,
    #[arg(
        long = "path",
        global = true,
        help = "Directory to search for vmware-rpctool before PATH (repeatable)"
    )]
    path: Vec<PathBuf>,
    #[arg(long, global = true, help = "Limit for a single vmware-rpctool call, e.g. 30s")]
    timeout: Option<String>,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Acquire the configuration and bring up network-interfaces
    Acquire {
        #[arg(long, default_value_t = false)]
        skip_network: bool,
    },
    /// Print the merged metadata as JSON
    Metadata,
    /// Print the raw user data
    Userdata,
    /// Print the instance id
    InstanceId,
    /// Print the network configuration as YAML
    NetworkConfig,
}

async fn report(command: Commands, acquired: Acquired, config: &Config) -> Result<(), Error> {
    let distro = Ifupdown::new(&config.interfaces_file, config.bringup_command.clone());
    match command {
        Commands::Acquire { skip_network } => {
            if skip_network {
                info!("Not touching network-interfaces");
            } else {
                acquired.bring_up_network(&distro).await;
            }
        }
        Commands::Metadata => {
            let metadata = serde_json::to_string_pretty(&acquired.metadata().to_value())
                .map_err(Error::Serialize)?;
            println!("{}", metadata);
        }
        Commands::Userdata => print!("{}", acquired.userdata_raw()),
        Commands::InstanceId => println!("{}", acquired.instance_id(&config.identity_file)?),
        Commands::NetworkConfig => {
            if let Some(network_config) = acquired.reported_network_config(&distro)? {
                print!("{}", serde_yaml::to_string(&network_config)?);
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode, Error> {
    let Some(command) = cli.command else {
        eprintln!("no command given, see --help");
        return Ok(ExitCode::FAILURE);
    };

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.timeout.is_some() {
        config.timeout = cli.timeout;
    }
    let mut prefix = cli.path;
    prefix.append(&mut config.path);
    let search_path = SearchPath::new(prefix, env::var_os("PATH").as_deref());

    let channel = RpcTool::locate(&search_path, config.timeout()?);
    let acquired = match datasource::acquire(channel.as_ref()).await {
        Outcome::Done(acquired) => acquired,
        Outcome::Skipped(reason) => {
            info!("No data available: {}", reason);
            return Ok(ExitCode::from(EXIT_SKIPPED));
        }
        Outcome::Failed { stage, error } => {
            error!("Datasource could not be used ({}): {}", stage, error);
            return Ok(ExitCode::FAILURE);
        }
    };

    report(command, acquired, &config).await?;
    Ok(ExitCode::SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    if cli.version {
        println!("{}", get_version_string());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = setup_tracing(cli.verbose) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

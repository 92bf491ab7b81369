use anyhow::{Context, Result};
use cip::commands::{self, InstallOptions, ServeOptions};
use cip::http::HttpClient;
use cip::registry::{DEFAULT_MAX_UPLOAD_BYTES, RegistryClient};
use cip::runtime::RealRuntime;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// cip - package archive tool and registry
///
/// Bundles package directories (each containing __init__.py) into a single
/// versioned .cpack archive, installs archives into a library directory,
/// and talks to a cip registry.
///
/// Examples:
///   cip create demo 1.0 ./demo          # Build demo-1.0.cpack
///   cip install demo-1.0.cpack -t DIR   # Install its packages into DIR
///   cip upload demo-1.0.cpack           # Publish to the configured registry
///   cip serve --storage ./uploads       # Run a registry
#[derive(Parser, Debug)]
#[command(author, version = cip::CIP_VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory (default ~/.cip; also via CIP_HOME)
    #[arg(long = "config-dir", env = "CIP_HOME", value_name = "PATH", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build a .cpack archive from package directories
    Create(CreateArgs),

    /// Install the packages of a local archive
    Install(InstallArgs),

    /// Upload an archive to the registry
    Upload(UploadArgs),

    /// Download an archive from the registry
    Download(DownloadArgs),

    /// List packages available in the registry
    List(ListArgs),

    /// Run a registry server
    Serve(ServeArgs),

    /// Show or set a configuration value
    Config(ConfigArgs),

    /// Restore the default configuration
    Reset,

    /// Print the version
    Version,
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    pub name: String,

    pub version: String,

    /// Package directories, each containing __init__.py
    #[arg(value_name = "DIR", required = true)]
    pub dirs: Vec<PathBuf>,

    /// Where to write the archive (default ./<name>-<version>.cpack)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Library directory to install into (also via CIP_TARGET)
    #[arg(long, short = 't', env = "CIP_TARGET", value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Install every package without asking
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Replace packages that already exist in the target
    #[arg(long)]
    pub force: bool,
}

impl From<TargetArgs> for InstallOptions {
    fn from(args: TargetArgs) -> Self {
        InstallOptions {
            target: args.target,
            yes: args.yes,
            force: args.force,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Path to a .cpack archive
    pub archive: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    /// Path to a .cpack archive
    pub archive: PathBuf,

    /// Registry URL (defaults to the configured registry_url)
    #[arg(long, value_name = "URL")]
    pub registry: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    pub name: String,

    pub version: String,

    /// Registry URL (defaults to the configured registry_url)
    #[arg(long, value_name = "URL")]
    pub registry: Option<String>,

    /// Install the archive after downloading it
    #[arg(long)]
    pub install: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Registry URL (defaults to the configured registry_url)
    pub registry_url: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "CIP_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Directory holding uploaded archives
    #[arg(long, env = "CIP_STORAGE_DIR", default_value = "uploads", value_name = "DIR")]
    pub storage: PathBuf,

    /// Largest accepted upload in MiB (1 to 1024)
    #[arg(
        long = "max-upload-mb",
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..=MAX_UPLOAD_MB_LIMIT)
    )]
    pub max_upload_mb: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// registry_url or install_target
    pub key: String,

    /// New value; prints the current value when omitted
    pub value: Option<String>,
}

const MAX_UPLOAD_MB_LIMIT: i64 = 1024;

fn upload_limit_bytes(mb: u32) -> Result<usize> {
    usize::try_from(mb)
        .ok()
        .and_then(|mb| mb.checked_mul(1024 * 1024))
        .with_context(|| format!("--max-upload-mb {} is too large", mb))
}

fn registry_client(url: &str) -> RegistryClient {
    RegistryClient::new(HttpClient::new(reqwest::Client::new()), url)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    match cli.command {
        Commands::Create(args) => {
            commands::create(&runtime, &args.name, &args.version, &args.dirs, args.output)?;
        }
        Commands::Install(args) => {
            let config = commands::load_config(&runtime, cli.config_dir)?;
            commands::install(&runtime, &config, &args.archive, &args.target.into())?;
        }
        Commands::Upload(args) => {
            let config = commands::load_config(&runtime, cli.config_dir)?;
            let client = registry_client(&commands::registry_url(args.registry, &config));
            commands::upload(&runtime, &client, &args.archive).await?;
        }
        Commands::Download(args) => {
            let config = commands::load_config(&runtime, cli.config_dir)?;
            let client = registry_client(&commands::registry_url(args.registry, &config));
            let install = args.install.then(|| InstallOptions::from(args.target));
            let out_dir = std::env::current_dir()?;
            commands::download(
                &runtime,
                &client,
                &config,
                &args.name,
                &args.version,
                &out_dir,
                install.as_ref(),
            )
            .await?;
        }
        Commands::List(args) => {
            let config = commands::load_config(&runtime, cli.config_dir)?;
            let client = registry_client(&commands::registry_url(args.registry_url, &config));
            commands::list(&client).await?;
        }
        Commands::Serve(args) => {
            let max_upload_bytes = match args.max_upload_mb {
                Some(mb) => upload_limit_bytes(mb)?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            };
            commands::serve(ServeOptions {
                bind: args.bind,
                storage: args.storage,
                max_upload_bytes,
            })
            .await?;
        }
        Commands::Config(args) => {
            commands::config(&runtime, cli.config_dir, &args.key, args.value.as_deref())?;
        }
        Commands::Reset => commands::reset(&runtime, cli.config_dir)?,
        Commands::Version => println!("cip {}", cip::CIP_VERSION),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_create_parsing() {
        let cli = Cli::try_parse_from(["cip", "create", "demo", "1.0", "a", "b"]).unwrap();
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.name, "demo");
                assert_eq!(args.version, "1.0");
                assert_eq!(args.dirs, [PathBuf::from("a"), PathBuf::from("b")]);
                assert_eq!(args.output, None);
            }
            _ => panic!("Expected Create command"),
        }
    }

    #[test]
    fn test_cli_create_requires_dirs() {
        assert!(Cli::try_parse_from(["cip", "create", "demo", "1.0"]).is_err());
    }

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from([
            "cip",
            "install",
            "demo-1.0.cpack",
            "--target",
            "/tmp/lib",
            "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.archive, PathBuf::from("demo-1.0.cpack"));
                assert_eq!(args.target.target, Some(PathBuf::from("/tmp/lib")));
                assert!(args.target.yes);
                assert!(!args.target.force);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_download_parsing() {
        let cli = Cli::try_parse_from([
            "cip",
            "download",
            "demo",
            "1.0",
            "--registry",
            "http://localhost:5000",
            "--install",
            "-y",
        ])
        .unwrap();
        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.name, "demo");
                assert_eq!(args.registry.as_deref(), Some("http://localhost:5000"));
                assert!(args.install);
                assert!(args.target.yes);
            }
            _ => panic!("Expected Download command"),
        }
    }

    #[test]
    fn test_cli_list_optional_url() {
        let cli = Cli::try_parse_from(["cip", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::List(ListArgs { registry_url: None })));

        let cli = Cli::try_parse_from(["cip", "list", "http://r"]).unwrap();
        match cli.command {
            Commands::List(args) => assert_eq!(args.registry_url.as_deref(), Some("http://r")),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_serve_parsing() {
        let cli = Cli::try_parse_from([
            "cip",
            "serve",
            "--bind",
            "127.0.0.1:8080",
            "--storage",
            "/srv/cip",
            "--max-upload-mb",
            "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
                assert_eq!(args.storage, PathBuf::from("/srv/cip"));
                assert_eq!(args.max_upload_mb, Some(10));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_serve_rejects_out_of_range_upload_limit() {
        for value in ["0", "1025", "18446744073709551615"] {
            assert!(
                Cli::try_parse_from(["cip", "serve", "--max-upload-mb", value]).is_err(),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_upload_limit_bytes() {
        assert_eq!(upload_limit_bytes(1).unwrap(), 1024 * 1024);
        assert_eq!(upload_limit_bytes(1024).unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_cli_global_config_dir() {
        let cli = Cli::try_parse_from(["cip", "config", "registry_url", "--config-dir", "/tmp/c"])
            .unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/c")));
        match cli.command {
            Commands::Config(args) => {
                assert_eq!(args.key, "registry_url");
                assert_eq!(args.value, None);
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["cip"]).is_err());
    }
}

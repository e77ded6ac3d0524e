use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use encore_core::{init_logging, AppDirs, Config};
use encore_protocol::{ProtocolSettings, Registry};
use encore_server::{Server, ServerSettings, Shared};
use memory_backend::MemoryBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "encored", version, about = "MPD-compatible music server")]
struct Cli {
    /// Config file to read instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Keep config, data and logs under this directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Listen address, or unix:/path/to/socket (overrides config)
    #[arg(long, global = true)]
    hostname: Option<String>,
    /// Listen port (overrides config)
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Library manifest to serve (overrides config)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the server (the default)
    Serve,
    /// Validate the configuration and print the effective settings
    CheckConfig,
    /// List the protocol commands this build understands
    Commands,
}

impl Cli {
    fn dirs(&self) -> Result<AppDirs> {
        Ok(match &self.root {
            Some(root) => AppDirs::rooted_at(root),
            None => AppDirs::discover()?,
        })
    }

    fn load_config(&self, dirs: &AppDirs) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::load_or_default(dirs)?,
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(hostname) = &self.hostname {
            config.server.hostname = hostname.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(manifest) = &self.manifest {
            config.library.manifest = Some(manifest.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = cli.dirs()?;
    dirs.ensure_exists()?;
    let config = cli.load_config(&dirs)?;

    match cli.command {
        Some(Command::CheckConfig) => {
            print_settings(&config, &dirs);
            return Ok(());
        }
        Some(Command::Commands) => {
            let registry = Registry::builtin(&config.server.command_blacklist);
            for spec in registry.sorted().into_iter().filter(|spec| spec.listed) {
                println!("{}", spec.name);
            }
            return Ok(());
        }
        Some(Command::Serve) | None => {}
    }

    let _logging = init_logging(&config.logging, &dirs)?;
    tracing::info!(
        config_dir = %dirs.config_dir().display(),
        data_dir = %dirs.data_dir().display(),
        "starting encored"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("encored")
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(serve(config, dirs))
}

async fn serve(config: Config, dirs: AppDirs) -> Result<()> {
    let backend = MemoryBackend::builder()
        .playlists_dir(dirs.playlists_dir())
        .library_config(&config.library)
        .build()
        .context("failed to build library backend")?;

    let settings = ServerSettings::from(&config.server);
    let protocol = ProtocolSettings::from(&config.server);
    let shared = Arc::new(Shared::new(backend, protocol, settings.connection_timeout));
    let server = Server::bind(&settings, shared).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received; shutting down"),
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
        let _ = shutdown_tx.send(true);
    });

    server.run(shutdown_rx).await?;
    tracing::info!("encored stopped");
    Ok(())
}

fn print_settings(config: &Config, dirs: &AppDirs) {
    let server = &config.server;
    println!("config:      {}", Config::config_path(dirs).display());
    match server.unix_socket_path() {
        Some(path) => println!("listen:      unix:{}", path.display()),
        None => println!("listen:      {}:{}", server.hostname, server.port),
    }
    println!("password:    {}", if server.password.is_some() { "set" } else { "none" });
    println!("connections: {}", server.max_connections);
    println!("timeout:     {}s", server.connection_timeout);
    if !server.command_blacklist.is_empty() {
        println!("blacklist:   {}", server.command_blacklist.join(", "));
    }
    match &config.library.manifest {
        Some(path) => println!("manifest:    {}", path.display()),
        None => println!("manifest:    (none, empty library)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "encored",
            "--hostname",
            "0.0.0.0",
            "--port",
            "6601",
            "--manifest",
            "/srv/music/library.json",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.server.hostname, "0.0.0.0");
        assert_eq!(config.server.port, 6601);
        assert_eq!(
            config.library.manifest,
            Some(PathBuf::from("/srv/music/library.json"))
        );
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::parse_from(["encored"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.server.port, 6600);
        assert!(cli.command.is_none());
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::parse_from(["encored", "commands"]);
        assert!(matches!(cli.command, Some(Command::Commands)));
        let cli = Cli::parse_from(["encored", "check-config", "--port", "1"]);
        assert!(matches!(cli.command, Some(Command::CheckConfig)));
        assert_eq!(cli.port, Some(1));
    }

    #[test]
    fn rooted_dirs_load_defaults() {
        let root = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["encored", "--root", root.path().to_str().unwrap()]);
        let dirs = cli.dirs().unwrap();
        dirs.ensure_exists().unwrap();
        let config = cli.load_config(&dirs).unwrap();
        assert_eq!(config.server.max_connections, 20);
    }
}

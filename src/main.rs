//! vram-probe - best-effort GPU memory query from the command line

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use vram_probe::core::config::ProbeConfig;
use vram_probe::core::memory::{RequiredMemory, SystemMemoryInfo};
use vram_probe::logging::{self, Severity};
use vram_probe::platform::{self, format_bytes, ProbeResult};

#[derive(Parser)]
#[command(name = "vram-probe")]
#[command(about = "Best-effort GPU VRAM probe through runtime-loaded driver libraries", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/vram-probe/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also send log output to the system log
    #[arg(long, global = true)]
    syslog: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the VRAM size of the first GPU
    Vram {
        #[arg(long)]
        json: bool,
    },

    /// Show host RAM and VRAM totals
    Memory {
        #[arg(long)]
        json: bool,

        /// Required RAM, e.g. "16GB"
        #[arg(long, value_parser = parse_size)]
        ram: Option<u64>,

        /// Required VRAM, e.g. "8GB"
        #[arg(long, value_parser = parse_size)]
        vram: Option<u64>,
    },

    /// Forward a message to the system log
    Log {
        /// Severity name or syslog code (0-7)
        #[arg(short, long, default_value = "info")]
        level: Severity,

        message: String,
    },

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Serialize)]
struct VramReport {
    backend: Option<&'static str>,
    bytes: u64,
    megabytes: u64,
    available: bool,
    error: Option<String>,
    timestamp: String,
}

#[derive(Serialize)]
struct MemoryReport {
    total: RequiredMemory,
    required: Option<RequiredMemory>,
    sufficient: Option<bool>,
    timestamp: String,
}

fn parse_size(s: &str) -> Result<u64, String> {
    platform::parse_bytes(s).ok_or_else(|| format!("invalid size '{}'", s))
}

fn probe_vram(config: &ProbeConfig) -> ProbeResult<u64> {
    #[cfg(any(target_os = "linux", target_os = "windows"))]
    {
        platform::platform_prober(config.extra_candidates()).try_vram_size()
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        let _ = config;
        platform::try_vram_size()
    }
}

fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(ProbeConfig::default_path)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = config_path(&cli);
    let config = match &path {
        Some(path) => ProbeConfig::load_or_default(path)?,
        None => ProbeConfig::default(),
    };

    logging::init_tracing(&config, cli.verbose, cli.syslog)?;
    debug!("config: {:?}", path);

    match cli.command {
        Commands::Vram { json } => {
            let result = probe_vram(&config);
            let bytes = *result.as_ref().unwrap_or(&0);

            if json {
                let report = VramReport {
                    backend: platform::backend_name(),
                    bytes,
                    megabytes: bytes / (1024 * 1024),
                    available: result.is_ok(),
                    error: result.as_ref().err().map(|e| e.to_string()),
                    timestamp: chrono::Local::now().to_rfc3339(),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match &result {
                    Ok(bytes) => {
                        println!("VRAM Status:");
                        println!("  Backend: {}", platform::backend_name().unwrap_or("none"));
                        println!("  Size:    {} ({} bytes)", format_bytes(*bytes), bytes);
                    }
                    Err(e) => {
                        info!("VRAM probe unavailable: {}", e);
                        println!("VRAM size unknown");
                    }
                }
            }
        }

        Commands::Memory { json, ram, vram } => {
            let info = SystemMemoryInfo::detect_with_vram(|| probe_vram(&config));
            let total = info.total_memory();

            let required = (ram.is_some() || vram.is_some())
                .then(|| RequiredMemory::new(ram.unwrap_or(0), vram.unwrap_or(0)));
            let sufficient = required.as_ref().map(|req| info.have_sufficient_memory(req));

            if json {
                let report = MemoryReport {
                    total,
                    required,
                    sufficient,
                    timestamp: chrono::Local::now().to_rfc3339(),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Memory Status:");
                println!("  RAM:  {}", format_bytes(total.ram));
                println!("  VRAM: {}", format_bytes(total.vram));
                if let (Some(req), Some(fits)) = (required, sufficient) {
                    println!(
                        "  Required: {} RAM, {} VRAM -> {}",
                        format_bytes(req.ram),
                        format_bytes(req.vram),
                        if fits { "fits" } else { "INSUFFICIENT" }
                    );
                }
            }

            if sufficient == Some(false) {
                std::process::exit(2);
            }
        }

        Commands::Log { level, message } => {
            logging::init_system_log(&config.syslog.ident).log(level, &message);
        }

        Commands::Config { init } => {
            if init {
                let path = path.ok_or("no config directory on this platform")?;
                if path.exists() {
                    println!("Config already exists at {}", path.display());
                } else {
                    ProbeConfig::default().save(&path)?;
                    println!("Wrote default config to {}", path.display());
                }
            } else {
                if let Some(path) = &path {
                    println!("# {}", path.display());
                }
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

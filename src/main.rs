use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "taskforge")]
#[command(version, about = "Compile tool descriptors into runnable task plugins", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a descriptor and print every error found
    Validate {
        /// Descriptor path or inline JSON
        descriptor: String,
        /// Schema path or inline JSON (defaults to the bundled schema)
        #[arg(long)]
        schema: Option<String>,
    },
    /// Generate a plugin from a descriptor and export it to disk
    Generate {
        /// Descriptor path or inline JSON
        descriptor: String,
        /// Schema path or inline JSON (defaults to the bundled schema)
        #[arg(long)]
        schema: Option<String>,
        /// Export base directory (defaults to the configured export root)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Generate even when the descriptor fails validation
        #[arg(long)]
        permissive: bool,
    },
    /// Print the canonical identifier for a tool name
    Classify {
        /// Free-form tool name
        name: String,
    },
    /// Integrate every descriptor in the given (or configured) directories
    Bootstrap {
        /// Descriptor directories
        dirs: Vec<PathBuf>,
        /// Schema path or inline JSON (defaults to the bundled schema)
        #[arg(long)]
        schema: Option<String>,
        /// Register every tool through a version switcher
        #[arg(long)]
        multi_version: bool,
    },
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Commands::Validate { descriptor, schema } => cli::cmd_validate(descriptor, schema),
        Commands::Generate {
            descriptor,
            schema,
            out,
            permissive,
        } => cli::cmd_generate(descriptor, schema, out, permissive),
        Commands::Classify { name } => {
            cli::cmd_classify(&name);
            Ok(())
        }
        Commands::Bootstrap {
            dirs,
            schema,
            multi_version,
        } => cli::cmd_bootstrap(dirs, schema, multi_version),
    }
}

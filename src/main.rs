use std::path::PathBuf;

use clap::{Parser, Subcommand};

use thumbnailer::{cli, config, debug};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("GIT_HASH");

#[derive(Parser, Debug)]
#[command(name = "thumbnailer", about = "Thumbnails for files and directories", version = VERSION)]
struct Cli {
    /// Debug logging to stderr
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Settings file (default: preview.json in the config directory)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one thumbnail
    Get {
        /// Path, file:// or thumbnail: URL
        url: String,
        #[arg(long)]
        mime: Option<String>,
        #[arg(long, default_value_t = 128)]
        width: i32,
        #[arg(long, default_value_t = 128)]
        height: i32,
        #[arg(long, default_value = "")]
        plugin: String,
        #[arg(long, default_value_t = 0)]
        icon_size: i32,
        #[arg(long, default_value_t = 255)]
        icon_alpha: i32,
        /// Page of a directory preview
        #[arg(long, default_value_t = 0)]
        sequence: u32,
        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Answer JSON requests from stdin until EOF
    Serve,
    /// List thumbnail creators
    Plugins,
    /// Remove cache entries of deleted or changed files
    Prune,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    if args.debug {
        debug::enable();
    }
    debug::init();
    log::debug!("thumbnailer {} ({})", VERSION, GIT_HASH);

    let settings_path = args.config.unwrap_or_else(config::default_settings_path);
    let settings = config::PreviewSettings::load(&settings_path)?;

    match args.command {
        Commands::Get {
            url,
            mime,
            width,
            height,
            plugin,
            icon_size,
            icon_alpha,
            sequence,
            output,
        } => {
            let req = cli::GetArgs {
                url,
                mime,
                width,
                height,
                plugin,
                icon_size,
                icon_alpha,
                sequence,
            };
            cli::get(settings, req, output.as_deref())
        }
        Commands::Serve => cli::serve(settings),
        Commands::Plugins => {
            cli::plugins(&settings);
            Ok(())
        }
        Commands::Prune => cli::prune(&settings),
    }
}

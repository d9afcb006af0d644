use clap::{Args, Parser, Subcommand};
use dirmapper::config::{self, SettingsUpdate};
use dirmapper::{admin, logging, output};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dirmapper")]
#[command(about = "Mirror a directory tree into published listing pages")]
#[command(long_about = "\
Mirror a directory tree into published listing pages

Every subdirectory of root_directory becomes a page listing its contents.
Pages nest the way directories do:

  /srv/docs/                      # root_directory (no page of its own)
  ├── Policies/                   # page \"Policies\" → /policies/
  │   ├── HR/                     # page \"HR\" → /policies/hr/
  │   │   └── handbook.pdf        # listed with its PDF title and date
  │   └── travel.docx
  ├── private/                    # hidden with exclusions.directories
  └── .git/                       # hidden entries are always skipped

Run 'dirmapper gen-config' to generate a documented dirmapper.toml.")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync pages with the directory tree
    Regenerate,
    /// Delete every page mirroring the directory tree
    Delete,
    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Print the page hierarchy
    Pages,
    /// Print the listing page for one directory
    Show {
        /// Directory, relative to root_directory or absolute
        dir: PathBuf,
    },
    /// Print a stock dirmapper.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the effective settings
    Show,
    /// Save new values, then regenerate
    Set(SetArgs),
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    root_directory: Option<String>,
    #[arg(long)]
    store: Option<String>,
    #[arg(long)]
    skip_empty: Option<bool>,
    #[arg(long)]
    disable_breadcrumbs: Option<bool>,
    #[arg(long)]
    date_format: Option<String>,
    #[arg(long)]
    file_url_base: Option<String>,
    /// JSON object: directory name → icon class
    #[arg(long)]
    folder_icons: Option<String>,
    /// JSON object with directories, files and regex lists
    #[arg(long)]
    exclusions: Option<String>,
}

impl From<SetArgs> for SettingsUpdate {
    fn from(args: SetArgs) -> Self {
        Self {
            root_directory: args.root_directory,
            store: args.store,
            skip_empty: args.skip_empty,
            disable_breadcrumbs: args.disable_breadcrumbs,
            date_format: args.date_format,
            file_url_base: args.file_url_base,
            folder_icons: args.folder_icons,
            exclusions: args.exclusions,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(if cli.quiet { "warn" } else { "info" }) {
        eprintln!("logging disabled: {e}");
    }

    let config_dir = config::config_dir(&cli.config);

    match cli.command {
        Command::Regenerate => {
            let settings = config::load_settings(&cli.config)?;
            let outcome = admin::regenerate(&settings, &config_dir)?;
            output::print_sync_report(&outcome.report, &outcome.root);
        }
        Command::Delete => {
            let settings = config::load_settings(&cli.config)?;
            let outcome = admin::delete_all_pages(&settings, &config_dir)?;
            output::print_teardown_report(&outcome.report, &outcome.root);
        }
        Command::Settings(SettingsCommand::Show) => {
            let settings = config::load_settings(&cli.config)?;
            output::print_settings(&settings, &cli.config);
        }
        Command::Settings(SettingsCommand::Set(args)) => {
            let (settings, outcome) = admin::update_settings(&cli.config, args.into())?;
            output::print_settings(&settings, &cli.config);
            println!();
            output::print_sync_report(&outcome.report, &outcome.root);
        }
        Command::Pages => {
            let settings = config::load_settings(&cli.config)?;
            let root = settings.root_path(&config_dir).ok();
            let store = admin::open_store(&settings, &config_dir)?;
            output::print_page_tree(&store, root.as_deref());
        }
        Command::Show { dir } => {
            let settings = config::load_settings(&cli.config)?;
            match admin::find_directory_page(&settings, &config_dir, &dir)? {
                Some(page) => println!("{}", page.content),
                None => println!("No page for {}", dir.display()),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

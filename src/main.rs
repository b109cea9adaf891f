use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use taskman::{
    Config, Database, Profile,
    cli::{Cli, Commands},
    logging::{self, LogTarget},
};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();
    let profile = Profile::from_dev_flag(cli.dev);

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(&taskman::utils::expand_path(path), profile)?,
        None => Config::load_with_profile(profile)?,
    };

    let command = cli.command.unwrap_or(Commands::Tui);
    let level = logging::resolve_level(cli.quiet, cli.verbose, &config.log_level);

    if command == Commands::Tui {
        let data_dir = config.get_data_dir();
        std::fs::create_dir_all(&data_dir)
            .wrap_err_with(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let log_path = data_dir.join("taskman.log");
        logging::init(&level, LogTarget::File(&log_path))?;
    } else {
        logging::init(&level, LogTarget::Stderr)?;
    }
    tracing::debug!(?profile, "Starting taskman");

    let db_path = config.get_database_path();
    let db = Database::new(
        db_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?,
    )?;

    match command {
        Commands::Tui => {
            let app = taskman::tui::App::new(config, db)?;
            taskman::tui::run_event_loop(app)?;
        }
        other => {
            let mut stdout = std::io::stdout().lock();
            taskman::cli::run_command(other, &db, &mut stdout)?;
        }
    }

    Ok(())
}

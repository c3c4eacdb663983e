use clap::Parser;
use jackal::cli::{self, Cli, Commands};
use jackal::config::parse_config;
use jackal::errors::EngineError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.with_ansi(!cli.no_color).init();
    }
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            EngineError::Config(_) | EngineError::Parse { .. } | EngineError::Yaml(_) => 2,
            EngineError::AlreadyRunning(_) => 3,
            EngineError::Execution(_) => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: Cli) -> Result<(), EngineError> {
    let json = cli.json;
    let verbose = cli.verbose > 0;
    let engine_config = cli::job::load_engine_config(&cli).await?;

    let job = match cli.command {
        Commands::Alive(args) => cli::job::alive_config(args),
        Commands::Ports(args) => cli::job::ports_config(args),
        Commands::Dirs(args) => cli::job::dirs_config(args),
        Commands::Brute(args) => cli::job::brute_config(args),
        Commands::Jsfind(args) => cli::job::jsfind_config(args),
        Commands::Poc(args) => cli::job::poc_config(args.mode).await?,
        Commands::Serve(args) => return cli::serve::handle_serve(engine_config, args).await,
        Commands::Validate(args) => {
            parse_config(&args.config).await?;
            println!("Configuration is valid: {}", args.config.display());
            return Ok(());
        }
    };
    cli::job::handle_job(engine_config, job, json, verbose).await
}

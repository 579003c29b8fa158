use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tally_live::SyncConfig;
use tally_model::Module;
use tally_sim::{diff_modules, fast_sync_config, render_text, run_simulator, SimulatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("tally-sim")
        .version(tally_sim::VERSION)
        .about("Tally sync simulator and change-set inspector")
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run several testers against one checklist and verify convergence")
                .arg(
                    Arg::new("testers")
                        .long("testers")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Number of concurrent testers"),
                )
                .arg(
                    Arg::new("cases")
                        .long("cases")
                        .default_value("10")
                        .value_parser(value_parser!(usize))
                        .help("Number of test cases"),
                )
                .arg(
                    Arg::new("edits")
                        .long("edits")
                        .default_value("20")
                        .value_parser(value_parser!(usize))
                        .help("Edits per tester"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("fail-rate")
                        .long("fail-rate")
                        .default_value("0.0")
                        .value_parser(value_parser!(f64))
                        .help("Probability that a store mutation fails"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML file with sync timing"),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Show what saving an edited module list would send")
                .arg(
                    Arg::new("baseline")
                        .long("baseline")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of modules as last fetched"),
                )
                .arg(
                    Arg::new("draft")
                        .long("draft")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of modules as edited"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if json {
        tracing_subscriber::registry().with(filter).with(layer.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer.compact()).init();
    }
}

fn read_modules(path: &Path) -> Result<Vec<Module>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

async fn simulate(args: &ArgMatches, json: bool) -> Result<bool> {
    let sync = match args.get_one::<PathBuf>("config") {
        Some(path) => SyncConfig::load(path)?,
        None => fast_sync_config(),
    };
    let config = SimulatorConfig {
        seed: *args.get_one::<u64>("seed").context("missing --seed")?,
        testers: *args.get_one::<usize>("testers").context("missing --testers")?,
        cases: *args.get_one::<usize>("cases").context("missing --cases")?,
        edits_per_tester: *args.get_one::<usize>("edits").context("missing --edits")?,
        fail_rate: *args.get_one::<f64>("fail-rate").context("missing --fail-rate")?,
        sync,
        ..SimulatorConfig::default()
    };

    let report = run_simulator(config).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(report.passed())
}

fn show_diff(args: &ArgMatches, json: bool) -> Result<()> {
    let baseline = read_modules(args.get_one::<PathBuf>("baseline").context("missing --baseline")?)?;
    let draft = read_modules(args.get_one::<PathBuf>("draft").context("missing --draft")?)?;

    let changes = diff_modules(&baseline, draft);
    if json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else {
        print!("{}", render_text(&changes));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let json = matches.get_flag("json");
    init_tracing(json);

    match matches.subcommand() {
        Some(("simulate", args)) => {
            if !simulate(args, json).await? {
                std::process::exit(1);
            }
        }
        Some(("diff", args)) => show_diff(args, json)?,
        _ => {}
    }
    Ok(())
}

use clap::{arg, command, value_parser, ArgMatches, Command};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use wsalloc::solver::{self, SolveFailure, SolveOptions};
use wsalloc::{io, preview, Catalog, CohortPolicy, Config};

fn cli() -> Command {
    command!()
        .about("Assigns participants to workshops on multiple days, based on their ranked choices")
        .arg(
            arg!(<INPUT> "Input file (simple JSON format) with participants and their choices")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-o --output <FILE> "Write the assignment as JSON to this file instead of stdout")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-s --settings <FILE> "JSON settings file, overriding the settings from the input")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(--days <N> "Number of workshop days").value_parser(value_parser!(u32)))
        .arg(
            arg!(--"max-participants" <N> "Maximum number of participants per workshop and day")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--"cohort-policy" <POLICY> "Handling of cohorts")
                .value_parser(["require-together", "prefer-separate", "indifferent"]),
        )
        .arg(
            arg!(--"time-limit" <SECONDS> "Abort the optimization after this time")
                .value_parser(value_parser!(u64)),
        )
        .arg(arg!(--"preview-only" "Only estimate the feasibility, do not solve"))
}

fn main() {
    env_logger::init();
    let args = cli().get_matches();

    let input_path = args.get_one::<PathBuf>("INPUT").unwrap();
    let file = match std::fs::File::open(input_path) {
        Ok(f) => f,
        Err(e) => {
            error!("Could not open input file {}: {}", input_path.display(), e);
            std::process::exit(exitcode::NOINPUT);
        }
    };
    let (participants, file_config) = match io::simple::read(std::io::BufReader::new(file)) {
        Ok(data) => data,
        Err(e) => {
            error!("Could not read input file: {}", e);
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Read {} participants", participants.len());

    let config = match build_config(&args, file_config) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(exitcode::CONFIG);
        }
    };
    let catalog = Catalog::from_participants(&participants);
    info!(
        "Found {} workshops. Planning {} days.",
        catalog.len(),
        config.num_days
    );

    if args.get_flag("preview-only") {
        let result = preview::preview(&participants, &catalog, &config);
        print!("{}", io::format_preview(&result));
        std::process::exit(exitcode::OK);
    }

    let options = SolveOptions {
        time_limit: args
            .get_one::<u64>("time-limit")
            .map(|s| Duration::from_secs(*s)),
    };
    let solution = match solver::solve(&participants, &catalog, &config, &options) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(match e {
                SolveFailure::Invalid(_) => exitcode::DATAERR,
                _ => exitcode::SOFTWARE,
            });
        }
    };
    let quality = solution.statistics.quality();
    info!(
        "Satisfaction rate {:.1}% ({})",
        solution.statistics.satisfaction_rate(),
        quality.label()
    );

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            let file = match std::fs::File::create(path) {
                Ok(f) => f,
                Err(e) => {
                    error!("Could not create output file {}: {}", path.display(), e);
                    std::process::exit(exitcode::CANTCREAT);
                }
            };
            let writer = std::io::BufWriter::new(file);
            if let Err(e) = io::simple::write(writer, &solution, &participants) {
                error!("Could not write output file: {}", e);
                std::process::exit(exitcode::IOERR);
            }
            info!("Wrote assignment to {}", path.display());
        }
        None => {
            print!(
                "{}",
                io::format_assignment(
                    &solution.assignment,
                    &participants,
                    config.num_days as usize
                )
            );
            print!("\n{}", io::format_statistics(&solution.statistics));
        }
    }
}

/// Combine the configuration from the input file, the settings file and the command line (in
/// increasing priority).
fn build_config(args: &ArgMatches, file_config: Option<Config>) -> Result<Config, String> {
    let mut config = match args.get_one::<PathBuf>("settings") {
        Some(path) => {
            if file_config.is_some() {
                warn!("Ignoring configuration from input file in favour of settings file.");
            }
            Config::load(path)?
        }
        None => file_config.unwrap_or_default(),
    };
    if let Some(days) = args.get_one::<u32>("days") {
        config.num_days = *days;
    }
    if let Some(max) = args.get_one::<u32>("max-participants") {
        config.max_participants = Some(*max);
    }
    if let Some(policy) = args.get_one::<String>("cohort-policy") {
        config.cohort_policy = policy.parse::<CohortPolicy>()?;
    }
    Ok(config)
}

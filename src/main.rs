use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::process;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{error, info};

use cct_solver::config::Config;
use cct_solver::cost::SoftConstraint;
use cct_solver::finder::FeasibleSolutionFinder;
use cct_solver::instance;
use cct_solver::random::RandomSource;
use cct_solver::solution::Solution;
use cct_solver::solution_io;
use cct_solver::solver::{self, SolverConfig};

/// Solver for the curriculum-based course timetabling problem of the
/// International Timetabling Competition 2007 (track 3).
#[derive(Debug, clap::Parser)]
struct Args {
    /// Instance file (ITC-2007 .ctt format).
    input: PathBuf,

    /// Where to write the best solution found.
    output: Option<PathBuf>,

    /// Solve for at most N seconds (overrides the configured limit).
    #[arg(long, value_name = "N")]
    time: Option<u64>,

    /// Random seed; 0 or absent derives one from the clock.
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// TOML config file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Inline config option, e.g. -o solver.methods=ts,sa (repeatable).
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// Start the search from a solution file instead of the finder.
    #[arg(long, value_name = "FILE")]
    solution: Option<PathBuf>,

    /// Print a single "<seed> <feasible> <rc> <mwd> <cc> <rs> <cost>"
    /// line instead of the solution (appended to OUTPUT if given).
    #[arg(long)]
    benchmark: bool,

    /// Stop after the initial solution: evaluate and report it only.
    #[arg(long)]
    dont_solve: bool,

    /// Raise log verbosity (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn seed_from_clock() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}

fn report(args: &Args, seed: u64, solution: &Solution) -> Result<()> {
    let costs = solution.cost_breakdown();

    if args.benchmark {
        let line = format!(
            "{seed} {} {} {} {} {} {}",
            u8::from(solution.satisfies_hard()),
            costs.get(SoftConstraint::RoomCapacity),
            costs.get(SoftConstraint::MinWorkingDays),
            costs.get(SoftConstraint::CurriculumCompactness),
            costs.get(SoftConstraint::RoomStability),
            costs.total(),
        );
        println!("{line}");
        if let Some(output) = &args.output {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(output)
                .with_context(|| anyhow!("failed to open {}", output.display()))?;
            writeln!(file, "{line}")
                .with_context(|| anyhow!("failed to append to {}", output.display()))?;
        }
        return Ok(());
    }

    print!("{}", solution.quality_report(args.verbose > 0));
    if let Some(output) = &args.output {
        solution_io::write_to_path(solution, output)?;
        info!("solution written to {}", output.display());
    }
    Ok(())
}

fn main_impl(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::read_from_toml(path)?,
        None => Config::default(),
    };
    for option in &args.options {
        config.apply_option(option)?;
    }
    if let Some(time) = args.time {
        config.solver.max_time = time as i64;
    }
    config.validate()?;

    let seed = args.seed.filter(|&seed| seed != 0).unwrap_or_else(seed_from_clock);
    info!("seed: {seed}");
    let mut rng = RandomSource::with_seed(seed);

    let model = instance::read_from_path(&args.input)?;
    info!(
        "loaded instance '{}': {} courses, {} rooms, {}x{} periods, {} curricula, {} lectures",
        model.name(),
        model.n_courses(),
        model.n_rooms(),
        model.n_days(),
        model.n_slots(),
        model.n_curricula(),
        model.n_lectures(),
    );

    let starting_solution = match &args.solution {
        Some(path) => {
            let mut solution = Solution::new(&model);
            solution_io::read_from_path(path, &mut solution)?;
            info!(
                "loaded starting solution of cost {} from {}",
                solution.cost(),
                path.display()
            );
            Some(solution)
        }
        None => None,
    };

    if args.dont_solve {
        let solution = match starting_solution {
            Some(solution) => solution,
            None => {
                let deadline = (config.solver.max_time > 0).then(|| {
                    Instant::now() + std::time::Duration::from_secs(config.solver.max_time as u64)
                });
                let mut solution = Solution::new(&model);
                let mut finder = FeasibleSolutionFinder::new(&model, config.finder.clone());
                if !finder.find(&mut solution, &mut rng, deadline) {
                    bail!("no feasible solution found within the time limit");
                }
                solution
            }
        };
        return report(args, seed, &solution);
    }

    let solver_config = SolverConfig::from_config(&config);
    let outcome = solver::solve(
        &model,
        &solver_config,
        &config.finder,
        &mut rng,
        starting_solution.as_ref(),
        None,
    );

    let Some(best) = outcome.best else {
        bail!("no feasible solution found within the limits");
    };
    info!("best solution cost: {}", outcome.best_cost);
    report(args, seed, &best)
}

fn main() {
    let args = Args::parse();
    let default_filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(err) = main_impl(&args) {
        error!("{err:#}");
        process::exit(1);
    }
}

//! UIO search CLI - Run an evolutionary UIO search from JSON parameters.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use uio_search::{
    compute::{
        Fsm,
        evolution::{EvolutionEngine, GenomeRng, RunReport},
    },
    schema::{EvolutionConfig, FsmSpec, TargetSet},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let mut save_fsm: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;

    let mut rest = args[2..].iter();
    while let Some(flag) = rest.next() {
        let target = match flag.as_str() {
            "--save-fsm" => &mut save_fsm,
            "--output" => &mut output,
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        };
        let Some(path) = rest.next() else {
            eprintln!("{} needs a path", flag);
            std::process::exit(1);
        };
        *target = Some(PathBuf::from(path));
    }

    // Load configuration
    let config = EvolutionConfig::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading parameters: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = config.validate() {
        eprintln!("Invalid parameters: {}", e);
        std::process::exit(1);
    }

    // Load or generate the machine
    let fsm = match &config.fsm.file {
        Some(path) => FsmSpec::from_file(path)
            .and_then(|spec| Fsm::from_spec(&spec))
            .unwrap_or_else(|e| {
                eprintln!("Error loading FSM {}: {}", path.display(), e);
                std::process::exit(1);
            }),
        None => {
            let mut rng = match config.random_seed {
                Some(seed) => GenomeRng::new(seed),
                None => GenomeRng::random(),
            };
            Fsm::random(&config.fsm.fsm_default, rng.inner_mut()).unwrap_or_else(|e| {
                eprintln!("Error generating FSM: {}", e);
                std::process::exit(1);
            })
        }
    };

    if let Some(path) = &save_fsm {
        if let Err(e) = fsm.to_spec().save(path) {
            eprintln!("Error writing FSM to {}: {}", path.display(), e);
            std::process::exit(1);
        }
        println!("FSM written to {}", path.display());
    }

    // Load targets
    let targets: BTreeSet<usize> = match &config.fsm.uio_set {
        Some(path) => TargetSet::from_file(path)
            .and_then(|set| set.resolve(fsm.num_states()))
            .unwrap_or_else(|e| {
                eprintln!("Error loading targets: {}", e);
                std::process::exit(1);
            }),
        None => (0..fsm.num_states()).collect(),
    };

    println!("UIO Search");
    println!("==========");
    println!(
        "FSM: {} states, {} transitions, inputs {{{}}}, outputs {{{}}}",
        fsm.num_states(),
        fsm.num_transitions(),
        fsm.input_set().join(","),
        fsm.output_set().join(",")
    );
    println!("Targets: {}", targets.len());
    println!(
        "Population: {}, generations: {}, max UIO length: {}",
        config.population_size, config.generation, config.max_uio_length
    );
    println!();

    let fsm = Arc::new(fsm);
    let mut engine =
        EvolutionEngine::new(config.clone(), Arc::clone(&fsm), targets).unwrap_or_else(|e| {
            eprintln!("Error creating engine: {}", e);
            std::process::exit(1);
        });

    // Run search
    println!("Running search with {} workers...", engine.workers());
    let total = config.generation;
    let result = engine
        .run_with_callback(|progress| {
            // Print progress every 10%
            let generation = progress.generation + 1;
            if generation % (total / 10).max(1) == 0 || progress.record.open == 0 {
                println!(
                    "  Generation {}/{}: best={:.3}, mean={:.3}, discovered={}, open={}",
                    generation,
                    progress.total_generations,
                    progress.record.fitness_max,
                    progress.record.fitness_mean,
                    progress.record.discovered,
                    progress.record.open
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Discovered UIOs:");
    for uio in &result.discovered {
        println!(
            "  state {:>4}: {} (seen {} times)",
            uio.state,
            uio.sequence.join(" "),
            uio.count
        );
    }
    if !result.open_states.is_empty() {
        println!("Open states: {:?}", result.open_states);
    }
    println!();
    println!(
        "Stopped: {:?} after {} generations",
        result.stats.stop_reason, result.stats.generations
    );
    println!(
        "Time: {:.2}s ({:.1} evaluations/s)",
        result.stats.elapsed_seconds, result.stats.evaluations_per_second
    );

    if let Some(path) = &output {
        let report = RunReport::new(&fsm, &config, &result, engine.statistics());
        if let Err(e) = report.save(path) {
            eprintln!("Error writing report to {}: {}", path.display(), e);
            std::process::exit(1);
        }
        println!("Report written to {}", path.display());
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <parameters.json> [--save-fsm <path>] [--output <path>]", program);
    eprintln!();
    eprintln!("Search unique input/output sequences of a finite state machine.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  parameters.json    Path to run parameters");
    eprintln!("  --save-fsm <path>  Write the machine in FSM text format");
    eprintln!("  --output <path>    Write the run report as JSON");
    eprintln!();
    eprintln!("Example parameters are printed with the --example flag.");
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    println!("Example parameters (parameters.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error rendering example: {}", e),
    }
}

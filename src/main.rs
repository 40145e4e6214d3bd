mod config;
mod error;
mod kitchen;
mod logging;
mod orders;
mod personnel;
mod pipeline;
mod sim;
mod stage;
mod types;

use std::path::PathBuf;

use crate::sim::RunOptions;

/// `-` keeps the default for a positional argument.
fn parse_optional<T: std::str::FromStr>(arg: Option<String>) -> Result<Option<T>, String> {
    match arg.as_deref() {
        None | Some("-") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|_| value.to_string()),
    }
}

fn parse_path(arg: Option<String>) -> Option<PathBuf> {
    arg.filter(|value| value != "-").map(PathBuf::from)
}

fn print_usage(program: &str) {
    println!("Pizzeria kitchen simulator");
    println!("Usage:");
    println!("  {program} (run the bundled orders)");
    println!("  {program} run [orders.json] [time_scale] [config.json]");
    println!("  {program} bench [orders] [toppings_per_order] [time_scale] [validate]");
    println!("  {program} --help");
    println!();
    println!("Use \"-\" to keep the default for a positional argument.");
    println!("time_scale multiplies every stage duration (e.g. 0.01 runs 100x faster).");
    println!("Defaults:");
    println!("  run    bundled orders, time_scale=1, built-in kitchen config");
    println!("  bench  orders=6 toppings_per_order=2 time_scale=0.01");
    println!("Flags:");
    println!("  validate  report capacity violations and unfinished toppings on stderr");
    println!("Logging goes to stderr; set RUST_LOG to change the level.");
}

fn exit_with_usage(program: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(program);
    std::process::exit(2);
}

fn main() {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "pizzeria".to_string());
    let mut args = std::env::args().skip(1);

    let result = match args.next().as_deref() {
        Some("run") => {
            let orders_path = parse_path(args.next());
            let time_scale = parse_optional::<f64>(args.next()).unwrap_or_else(|value| {
                exit_with_usage(&program, &format!("run: invalid time_scale value: {value}"))
            });
            let config_path = parse_path(args.next());
            if let Some(extra) = args.next() {
                exit_with_usage(&program, &format!("run: unexpected argument: {extra}"));
            }
            logging::init();
            sim::run_orders(RunOptions {
                orders_path,
                time_scale,
                config_path,
            })
        }
        Some("bench") => {
            let mut positional: Vec<String> = Vec::new();
            let mut validate = false;
            for arg in args {
                match arg.as_str() {
                    "validate" => validate = true,
                    _ => positional.push(arg),
                }
            }
            if positional.len() > 3 {
                exit_with_usage(
                    &program,
                    &format!("bench: unexpected argument: {}", positional[3]),
                );
            }
            let mut positional = positional.into_iter();
            let orders = parse_optional::<usize>(positional.next()).unwrap_or_else(|value| {
                exit_with_usage(&program, &format!("bench: invalid orders value: {value}"))
            });
            let toppings = parse_optional::<usize>(positional.next()).unwrap_or_else(|value| {
                exit_with_usage(
                    &program,
                    &format!("bench: invalid toppings_per_order value: {value}"),
                )
            });
            let time_scale = parse_optional::<f64>(positional.next()).unwrap_or_else(|value| {
                exit_with_usage(&program, &format!("bench: invalid time_scale value: {value}"))
            });
            logging::init();
            sim::run_benchmark(orders, toppings, time_scale, validate)
        }
        Some("--help") | Some("-h") | Some("help") => {
            print_usage(&program);
            Ok(())
        }
        Some(other) => {
            exit_with_usage(&program, &format!("unknown command: {other}"));
        }
        None => {
            logging::init();
            sim::run_orders(RunOptions::default())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

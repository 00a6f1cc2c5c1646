use std::path::Path;

use crate::data::collect::write_unique_addresses;
use crate::data::config::{load_config, read_config, resolve_config_path};
use crate::data::delegate::{load_events, rewrite_tier_dir, DelegationMap};
use crate::parallel::WorkerPool;
use crate::pipeline::run_campaign;

const USAGE: &str = "usage: tiermint <generate|collect|delegate|validate>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Generate,
    Collect,
    Delegate,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("generate") => Some(Command::Generate),
        Some("collect") => Some(Command::Collect),
        Some("delegate") => Some(Command::Delegate),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Generate) => handle_generate(args),
        Some(Command::Collect) => handle_collect(args),
        Some(Command::Delegate) => handle_delegate(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

fn handle_generate(args: &[String]) -> i32 {
    let path = resolve_config_path(args.get(2).map(String::as_str));
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("generate failed: {err}");
            return 1;
        }
    };

    match run_campaign(&config) {
        Ok(outcome) => {
            for entry in &outcome.manifest.tiers {
                println!(
                    "day {:>2}\t{:>7}\t+{:<6}\t{}",
                    entry.day, entry.total_addresses, entry.new_addresses, entry.name
                );
            }
            println!(
                "generate complete: tiers={}, output='{}'",
                outcome.tiers.len(),
                outcome.output_dir.display()
            );
            0
        }
        Err(err) => {
            eprintln!("generate failed: {err}");
            1
        }
    }
}

fn handle_collect(args: &[String]) -> i32 {
    let (Some(dir), Some(output)) = (args.get(2), args.get(3)) else {
        eprintln!("usage: tiermint collect <project-dir> <output-file>");
        return 2;
    };

    match write_unique_addresses(Path::new(dir), Path::new(output), &WorkerPool::default()) {
        Ok(count) => {
            println!("collect complete: addresses={count}, output='{output}'");
            0
        }
        Err(err) => {
            eprintln!("collect failed: {err}");
            1
        }
    }
}

fn handle_delegate(args: &[String]) -> i32 {
    let (Some(events_path), Some(tiers_dir), Some(out_dir)) =
        (args.get(2), args.get(3), args.get(4))
    else {
        eprintln!("usage: tiermint delegate <events.json> <tiers-dir> <out-dir>");
        return 2;
    };

    let events = match load_events(Path::new(events_path)) {
        Ok(events) => events,
        Err(err) => {
            eprintln!("delegate failed: {err}");
            return 1;
        }
    };
    let delegates = DelegationMap::from_events(&events);

    match rewrite_tier_dir(Path::new(tiers_dir), Path::new(out_dir), &delegates) {
        Ok(outcomes) => {
            for outcome in &outcomes {
                println!("{}\treplaced={}", outcome.file, outcome.replaced);
            }
            println!(
                "delegate complete: delegates={}, files_rewritten={}",
                delegates.len(),
                outcomes.len()
            );
            0
        }
        Err(err) => {
            eprintln!("delegate failed: {err}");
            1
        }
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let path = resolve_config_path(args.get(2).map(String::as_str));
    let config = match read_config(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("validation failed: {err}");
            return 1;
        }
    };

    let report = config.validate();
    for diagnostic in &report.diagnostics {
        eprintln!("- {diagnostic}");
    }
    if report.has_errors() {
        eprintln!(
            "validation failed: {} issue(s)",
            report.errors().count()
        );
        1
    } else {
        println!("validation passed: {}", path.display());
        0
    }
}

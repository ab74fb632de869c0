use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf};

use posecoach::{Profile, ProfileStore};

use crate::runner::{self, RunOptions};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let input: Option<PathBuf> = pargs.opt_value_from_str("--input")?;
            let profile_path: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let json = pargs.contains("--json");
            let watch = pargs.contains("--watch");
            let exercise: Option<String> = pargs.opt_free_from_str()?;
            if exercise.is_some() && profile_path.is_some() {
                return Err(anyhow!("give either an exercise name or --profile, not both"));
            }
            runner::run(RunOptions {
                exercise,
                input,
                profile_path,
                json,
                watch,
            })
        }

        Some("list") => {
            let store = ProfileStore::open_or_install()?;
            let active = store.active_name().unwrap_or_default();
            for name in store.list() {
                let mark = if name == active { '*' } else { ' ' };
                match store.load(&name) {
                    Ok(p) => println!("{mark} {name:<14} {}", p.title()),
                    Err(e) => println!("{mark} {name:<14} (invalid: {e})"),
                }
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: posecoach use <exercise>"))?;
            let store = ProfileStore::open_or_install()?;
            store.set_active(&name)?;
            println!("ok: active exercise is {name}");
            Ok(())
        }

        Some("show") => {
            let store = ProfileStore::open_or_install()?;
            let name: String = match pargs.opt_free_from_str()? {
                Some(n) => n,
                None => store.active_name()?,
            };
            let profile = store.load(&name)?;
            print_response(&serde_json::to_value(&profile)?);
            Ok(())
        }

        Some("check") => {
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: posecoach check <profile.toml>"))?;
            let p = Profile::from_path(&path)?;
            println!(
                "ok: {} ({} phases, {} score components)",
                p.meta.name,
                p.phases.len(),
                p.scoring.components.len()
            );
            Ok(())
        }

        Some("doctor") => {
            let store = ProfileStore::open_or_install()?;
            print_response(&store.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"posecoach: exercise coaching from pose landmarks

USAGE:
  posecoach help [command]                Show general or command-specific help
  posecoach run [exercise] [options]      Coach one attempt over a frame stream
  posecoach list                          List exercises
  posecoach use <exercise>                Switch the active exercise
  posecoach show [exercise]               Print an exercise profile as JSON
  posecoach check <file>                  Validate a profile file
  posecoach doctor                        Report profile store health

RUN OPTIONS:
  --input <file>     Read frames from a file instead of stdin
  --profile <file>   Use a profile file instead of a stored exercise
  --json             Print every frame outcome as a JSON line
  --watch            Reload the profile when its file changes

TIPS:
  - Frames are newline-delimited JSON: {{"timestamp_ms": 0, "landmarks": [...]}}
  - Profiles: ~/.config/posecoach/exercises
  - Active exercise pointer: ~/.config/posecoach/active
  - Log level: POSECOACH_LOG=debug
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: posecoach run [exercise] [--input FILE] [--profile FILE] [--json] [--watch]\nCoaches one attempt and prints the final score. Ctrl-C stops; press twice to force."
        ),
        "list" => {
            println!("usage: posecoach list\nLists stored exercises; marks the active one with '*'.")
        }
        "use" => println!("usage: posecoach use <exercise>\nMakes <exercise> the default for run."),
        "show" => println!("usage: posecoach show [exercise]\nPrints the parsed profile."),
        "check" => println!(
            "usage: posecoach check <file>\nParses and validates a profile without running it."
        ),
        "doctor" => println!(
            "usage: posecoach doctor\nShows the profile store location and the status of every profile."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

use clap::Args;
use teaflow_core::{BrewParams, Config};

use super::{engine, print_json, CmdResult};

#[derive(Args)]
pub struct ScheduleArgs {
    /// Tea id (default: brew.default_tea)
    #[arg(long)]
    tea: Option<String>,
    /// Vessel volume in ml (default: saved prefs, then brew.default_vessel_ml)
    #[arg(long)]
    vessel: Option<f64>,
    /// Leaf mass in grams (default: brew.default_leaf_grams)
    #[arg(long)]
    leaf: Option<f64>,
    /// Water temperature in °C (default: saved prefs, then the tea's ideal)
    #[arg(long)]
    temp: Option<f64>,
    /// Print JSON
    #[arg(long)]
    json: bool,
    /// Show the multipliers and learned offsets
    #[arg(long)]
    explain: bool,
}

pub fn run(args: ScheduleArgs, config: Config) -> CmdResult {
    let engine = engine(config)?;
    let tea_id = args
        .tea
        .unwrap_or_else(|| engine.config().brew.default_tea.clone());
    let tea = engine.tea(&tea_id)?;

    let defaults = engine.default_params(&tea)?;
    let params = BrewParams::new(
        args.vessel.unwrap_or(defaults.vessel_ml),
        args.leaf.unwrap_or(defaults.leaf_grams),
        args.temp.unwrap_or(defaults.temp_c),
    );
    let breakdown = engine.scheduler().breakdown(&tea, params)?;

    if args.json {
        if args.explain {
            return print_json(&breakdown);
        }
        return print_json(&breakdown.steeps);
    }

    println!(
        "{} · {} ml · {} g · {} °C",
        tea.name, params.vessel_ml, params.leaf_grams, params.temp_c
    );
    for (i, secs) in breakdown.steeps.iter().enumerate() {
        if args.explain {
            println!(
                "  #{:<2} {:>4}s  (base {}s, learned {:+}s)",
                i + 1,
                secs,
                breakdown.prelim[i],
                breakdown.offsets[i]
            );
        } else {
            println!("  #{:<2} {:>4}s", i + 1, secs);
        }
    }
    if args.explain {
        println!(
            "ratio x{:.3} · temperature x{:.3}",
            breakdown.ratio_mult, breakdown.temp_mult
        );
    }
    Ok(())
}

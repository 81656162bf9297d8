use std::env;
use std::error::Error;
use std::path::Path;

use pmfg::{filter_edge_list, filter_matrix, EdgeList, PmfgConfig, WeightMatrix};

const USAGE: &str = "usage: pmfg <input.csv> [--edge-list] [--config cfg.json] [--out PREFIX] [--dot]";

struct Args {
    input: String,
    edge_list: bool,
    config: Option<String>,
    out: String,
    dot: bool,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut input = None;
    let mut edge_list = false;
    let mut config = None;
    let mut out = None;
    let mut dot = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--edge-list" => edge_list = true,
            "--dot" => dot = true,
            "--config" => config = Some(args.next().ok_or("--config needs a path")?),
            "--out" => out = Some(args.next().ok_or("--out needs a prefix")?),
            "-h" | "--help" => return Err(USAGE.into()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {}\n{}", flag, USAGE).into()),
            _ if input.is_none() => input = Some(arg.clone()),
            _ => return Err(format!("unexpected argument {}\n{}", arg, USAGE).into()),
        }
    }

    let input = input.ok_or(USAGE)?;
    let out = out.unwrap_or_else(|| {
        Path::new(&input)
            .file_stem()
            .map(|stem| format!("{}_pmfg", stem.to_string_lossy()))
            .unwrap_or_else(|| "pmfg".to_string())
    });

    Ok(Args {
        input,
        edge_list,
        config,
        out,
        dot,
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env).init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => PmfgConfig::from_json_file(path)?,
        None => PmfgConfig::default(),
    };

    let result = if args.edge_list {
        let list = EdgeList::from_csv(&args.input)?;
        filter_edge_list(&list, &config)?
    } else {
        let matrix = WeightMatrix::from_csv(&args.input, &config)?;
        filter_matrix(&matrix, &config)?
    };

    result.write_adjacency_matrix(format!("{}_adjacency.csv", args.out))?;
    result.write_edge_list(format!("{}_edges.csv", args.out))?;
    result.write_degrees(format!("{}_degrees.csv", args.out))?;
    result.write_summary(format!("{}_summary.json", args.out))?;
    result.write_graphml(format!("{}.graphml", args.out))?;
    if args.dot {
        result.export_to_graphviz(format!("{}.dot", args.out))?;
    }

    let stats = result.stats();
    log::info!(
        "PMFG: {} nodes, {} edges ({:.1}% of budget {}), density {:.4}, mean degree {:.2}, clustering {:.3}",
        stats.node_count,
        stats.edge_count,
        100.0 * stats.budget_utilization,
        stats.edge_budget,
        stats.density,
        stats.average_degree,
        stats.average_clustering
    );
    match (stats.average_path_length, stats.diameter) {
        (Some(average), Some(diameter)) => {
            log::info!("Average shortest path {:.4}, diameter {}", average, diameter)
        }
        _ => log::info!(
            "Not connected: {} components, largest has {} nodes",
            stats.components,
            stats.largest_component
        ),
    }
    log::info!("Degree standard deviation {:.2}", stats.degree_std);
    log::info!(
        "Wrote {}_*.csv, {}_summary.json and {}.graphml",
        args.out,
        args.out,
        args.out
    );

    Ok(())
}

use polars::prelude::*;
use std::env;
use std::fs::File;

use pmfg::WeightMatrix;

const USAGE: &str = "usage: preprocessing <raw_matrix.csv> <output.csv|output.parquet>";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env).init();

    let mut args = env::args().skip(1);
    let input = args.next().ok_or(USAGE)?;
    let output = args.next().ok_or(USAGE)?;

    let df = CsvReader::from_path(&input)?
        .infer_schema(None)
        .has_header(true)
        .finish()?;

    // First column holds the row labels, the rest one column per node
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let (label_name, columns) = names.split_first().ok_or("input has no columns")?;
    let label_series = df.column(label_name)?.cast(&DataType::Utf8)?;
    let labels: Vec<String> = label_series
        .utf8()?
        .into_iter()
        .map(|opt_val| opt_val.unwrap_or_default().trim().to_string())
        .collect();

    let n = labels.len();
    if columns.len() != n {
        return Err(format!("matrix is not square: {} rows, {} columns", n, columns.len()).into());
    }
    for (column, label) in columns.iter().zip(&labels) {
        if column.trim() != label {
            log::warn!("Column '{}' does not match row label '{}'", column, label);
        }
    }

    let mut rows = vec![vec![f64::NAN; n]; n];
    for (j, name) in columns.iter().enumerate() {
        let column = df.column(name)?.cast(&DataType::Float64)?;
        for (i, value) in column.f64()?.into_iter().enumerate() {
            rows[i][j] = value.unwrap_or(f64::NAN);
        }
    }

    // A missing entry takes its mirror; pairs missing on both sides become 0
    let mut filled = 0;
    for i in 0..n {
        rows[i][i] = 0.0;
        for j in (i + 1)..n {
            match (rows[i][j].is_finite(), rows[j][i].is_finite()) {
                (true, true) => {}
                (true, false) => rows[j][i] = rows[i][j],
                (false, true) => rows[i][j] = rows[j][i],
                (false, false) => {
                    rows[i][j] = 0.0;
                    rows[j][i] = 0.0;
                    filled += 1;
                }
            }
        }
    }
    if filled > 0 {
        log::warn!("{} node pairs had no finite proximity and were set to 0", filled);
    }

    let matrix = WeightMatrix::symmetrized(labels, rows, 0.0)?;

    let mut series = Vec::with_capacity(n + 1);
    series.push(Series::new(label_name, matrix.labels().to_vec()));
    for (j, name) in columns.iter().enumerate() {
        let values: Vec<f64> = (0..n)
            .map(|i| if i == j { 0.0 } else { matrix.weight(i, j) })
            .collect();
        series.push(Series::new(name, values));
    }
    let mut out = DataFrame::new(series)?;

    println!("{:?}", out.head(Some(5)));

    let file = File::create(&output)?;
    if output.ends_with(".parquet") {
        ParquetWriter::new(file).finish(&mut out)?;
    } else {
        CsvWriter::new(file).finish(&mut out)?;
    }
    log::info!("Wrote symmetric {}x{} matrix to {}", n, n, output);

    Ok(())
}

#![deny(missing_docs)]

//! CLI that splits a labeled tar archive into training and test archives.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use splitpack::logging;
use splitpack::splitter::{DatasetSplitter, SplitConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug)]
struct Args {
    input: PathBuf,
    train_out: PathBuf,
    test_out: PathBuf,
    train_fraction: Option<f64>,
    test_fraction: Option<f64>,
}

fn run() -> Result<(), String> {
    let Some(args) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let settings = splitpack::config::load_or_init().map_err(|err| err.to_string())?;
    let train_fraction = args.train_fraction.unwrap_or(settings.train_fraction);
    let test_fraction = args.test_fraction.unwrap_or(settings.test_fraction);
    let config =
        SplitConfig::new(train_fraction, test_fraction).map_err(|err| err.to_string())?;

    let input = File::open(&args.input)
        .map_err(|err| format!("Could not open {}: {err}", args.input.display()))?;
    let mut source = tar::Archive::new(BufReader::new(input));

    let train_file = File::create(&args.train_out)
        .map_err(|err| format!("Could not create {}: {err}", args.train_out.display()))?;
    let test_file = File::create(&args.test_out)
        .map_err(|err| format!("Could not create {}: {err}", args.test_out.display()))?;
    let mut train = tar::Builder::new(BufWriter::new(train_file));
    let mut test = tar::Builder::new(BufWriter::new(test_file));

    let splitter = DatasetSplitter::new(config);
    let summary = splitter
        .transform(&mut source, &mut train, &mut test)
        .map_err(|err| err.to_string())?;

    // The splitter leaves finalization to its caller.
    finalize(train, &args.train_out)?;
    finalize(test, &args.test_out)?;

    println!(
        "Split {} labels: {} entries to {}, {} entries to {}",
        summary.labels,
        summary.train_entries,
        args.train_out.display(),
        summary.test_entries,
        args.test_out.display()
    );
    Ok(())
}

fn finalize(builder: tar::Builder<BufWriter<File>>, path: &PathBuf) -> Result<(), String> {
    let mut writer = builder
        .into_inner()
        .map_err(|err| format!("Could not finalize {}: {err}", path.display()))?;
    writer
        .flush()
        .map_err(|err| format!("Could not flush {}: {err}", path.display()))
}

fn parse_args(args: Vec<String>) -> Result<Option<Args>, String> {
    let mut input = None;
    let mut train_out = None;
    let mut test_out = None;
    let mut train_fraction = None;
    let mut test_fraction = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--input" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--input requires a value".to_string())?;
                input = Some(PathBuf::from(value));
            }
            "--train-out" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--train-out requires a value".to_string())?;
                train_out = Some(PathBuf::from(value));
            }
            "--test-out" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--test-out requires a value".to_string())?;
                test_out = Some(PathBuf::from(value));
            }
            "--train-fraction" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--train-fraction requires a value".to_string())?;
                train_fraction = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --train-fraction value: {value}"))?,
                );
            }
            "--test-fraction" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--test-fraction requires a value".to_string())?;
                test_fraction = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --test-fraction value: {value}"))?,
                );
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }

    let input = input.ok_or_else(|| "--input is required".to_string())?;
    let train_out = train_out.ok_or_else(|| "--train-out is required".to_string())?;
    let test_out = test_out.ok_or_else(|| "--test-out is required".to_string())?;

    Ok(Some(Args {
        input,
        train_out,
        test_out,
        train_fraction,
        test_fraction,
    }))
}

fn help_text() -> String {
    [
        "splitpack",
        "",
        "Splits a labeled tar archive (one folder per label) into a training",
        "archive and a test archive, proportionally per label.",
        "",
        "Usage:",
        "  splitpack --input <tar> --train-out <tar> --test-out <tar> [options]",
        "",
        "Options:",
        "  --input <tar>           Source archive (required).",
        "  --train-out <tar>       Destination training archive (required).",
        "  --test-out <tar>        Destination test archive (required).",
        "  --train-fraction <f64>  Training fraction (default from config.toml, 0.8).",
        "  --test-fraction <f64>   Test fraction (default from config.toml, 0.2).",
    ]
    .join("\n")
}

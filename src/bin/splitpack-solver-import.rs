//! Developer utility to register a solver and store its specification locally.

use std::path::PathBuf;

use splitpack::blobs::BlobStore;
use splitpack::documents::DocumentStore;
use splitpack::documents::solver::Solver;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

struct Args {
    dataset_id: String,
    spec_url: String,
    db_path: Option<PathBuf>,
    blob_root: Option<PathBuf>,
}

fn run() -> Result<(), String> {
    let Some(args) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = splitpack::logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let settings = splitpack::config::load_or_init().map_err(|err| err.to_string())?;
    let db_path = match args.db_path {
        Some(path) => path,
        None => settings.resolved_documents_db().map_err(|err| err.to_string())?,
    };
    let blob_root = match args.blob_root {
        Some(path) => path,
        None => settings.resolved_blob_root().map_err(|err| err.to_string())?,
    };

    let store = DocumentStore::open(&db_path).map_err(|err| err.to_string())?;
    let blobs = BlobStore::open(&blob_root).map_err(|err| err.to_string())?;

    let solver = Solver::new(args.dataset_id, args.spec_url)
        .insert(&store)
        .map_err(|err| err.to_string())?;
    let solver = solver.save_spec(&store, &blobs).map_err(|err| err.to_string())?;

    println!(
        "Solver {} stored; specification at {}",
        solver.id.as_deref().unwrap_or("<unknown>"),
        solver.specification_url
    );
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Option<Args>, String> {
    let mut dataset_id = None;
    let mut spec_url = None;
    let mut db_path = None;
    let mut blob_root = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--dataset-id" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--dataset-id requires a value".to_string())?;
                dataset_id = Some(value.to_string());
            }
            "--spec-url" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--spec-url requires a value".to_string())?;
                spec_url = Some(value.to_string());
            }
            "--db" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--db requires a value".to_string())?;
                db_path = Some(PathBuf::from(value));
            }
            "--blobs" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--blobs requires a value".to_string())?;
                blob_root = Some(PathBuf::from(value));
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }

    let dataset_id = dataset_id.ok_or_else(|| "--dataset-id is required".to_string())?;
    let spec_url = spec_url.ok_or_else(|| "--spec-url is required".to_string())?;

    Ok(Some(Args {
        dataset_id,
        spec_url,
        db_path,
        blob_root,
    }))
}

fn help_text() -> String {
    [
        "splitpack-solver-import",
        "",
        "Registers a solver document, downloads its specification file, and",
        "stores it in the local blob store.",
        "",
        "Usage:",
        "  splitpack-solver-import --dataset-id <id> --spec-url <url> [options]",
        "",
        "Options:",
        "  --dataset-id <id>   Dataset the solver trains against (required).",
        "  --spec-url <url>    HTTP location of the solver specification (required).",
        "  --db <path>         Document database path (defaults to app data location).",
        "  --blobs <dir>       Blob store root (defaults to app data location).",
    ]
    .join("\n")
}

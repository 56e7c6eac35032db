use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use submitter::collection::CollectionSubmission;
use submitter::job::Phase;
use submitter::{
    load_config, logging, CollectionState, ContentType, Job, JobState, SubmitterService,
};

const USAGE: &str = "usage: submitter <config.json> [--type <CONTENT_TYPE>] <file>...
       submitter <config.json> --collection <collection.json>";
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

enum Submission {
    Files {
        forced_type: Option<ContentType>,
        files: Vec<PathBuf>,
    },
    Collection(CollectionSubmission),
}

struct Args {
    config: PathBuf,
    submission: Submission,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let config = args.next().map(PathBuf::from).ok_or(USAGE)?;

    let mut forced_type = None;
    let mut collection = None;
    let mut files = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--type" {
            let value = args.next().ok_or(USAGE)?;
            forced_type = Some(value.parse::<ContentType>()?);
        } else if arg == "--collection" {
            collection = Some(args.next().map(PathBuf::from).ok_or(USAGE)?);
        } else {
            files.push(PathBuf::from(arg));
        }
    }

    let submission = match collection {
        Some(path) if files.is_empty() && forced_type.is_none() => {
            Submission::Collection(read_collection(&path)?)
        }
        Some(_) => return Err(USAGE.to_string()),
        None if files.is_empty() => return Err(USAGE.to_string()),
        None => Submission::Files { forced_type, files },
    };

    Ok(Args { config, submission })
}

fn read_collection(path: &Path) -> Result<CollectionSubmission, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read collection '{}': {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse collection '{}': {}", path.display(), e))
}

/// Prints the job's log as it grows until the job finishes or `stop` is set.
fn follow<S: Phase>(job: &Job<S>, stop: &AtomicBool) -> S {
    // the live channel may drop entries, so print from the full log
    let mut printed = 0;
    loop {
        let done = job.is_done();
        let log = job.full_log();
        for entry in log.iter().skip(printed) {
            println!("{}", entry);
        }
        printed = log.len();

        if done || stop.load(Ordering::SeqCst) {
            break;
        }
        // only used to wait; entries are printed from the full log
        let _ = job.poll_log(POLL_TIMEOUT);
    }
    job.state()
}

fn exit_code<S: Phase>(id: &str, state: S, completed: S, stop: &AtomicBool) -> ExitCode {
    if stop.load(Ordering::SeqCst) && !state.is_terminal() {
        info!("Interrupted while job {} was {}", id, state);
        return ExitCode::from(130);
    }

    if state == completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    info!("Starting submitter v{}", env!("CARGO_PKG_VERSION"));

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    }) {
        error!("Failed to install Ctrl-C handler: {}", e);
    }

    let mut service = match SubmitterService::start(&config) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start submission service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match args.submission {
        Submission::Collection(collection) => match service.submit_collection(collection) {
            Ok(job) => {
                println!("Submitted collection job {}", job.id());
                let state = follow(&*job, &stop);
                exit_code(job.id(), state, CollectionState::Completed, &stop)
            }
            Err(e) => {
                error!("Collection rejected: {}", e);
                ExitCode::FAILURE
            }
        },
        Submission::Files { forced_type, files } => {
            let name = files
                .iter()
                .map(|f| submitter::sanitize::file_name(f))
                .collect::<Vec<_>>()
                .join(", ");

            match service.submit(&name, &files, forced_type) {
                Ok(job) => {
                    println!("Submitted job {}", job.id());
                    let state = follow(&*job, &stop);
                    exit_code(job.id(), state, JobState::Completed, &stop)
                }
                Err(e) => {
                    error!("Submission rejected: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    };

    service.shutdown();
    code
}

//! Taskweave CLI Entry Point
//!
//! Loads a corpus snapshot, rebuilds the task database and reports on it.
//!
//! # Usage
//!
//! ```bash
//! # Rebuild once and print everything
//! taskweave snapshot.yaml
//!
//! # Only one project's view, high-priority tasks
//! taskweave snapshot.yaml --project Work --include-tag '#tpm/tag/hi'
//!
//! # Machine-readable output
//! taskweave snapshot.yaml --json
//!
//! # Keep rebuilding whenever the snapshot file changes
//! taskweave snapshot.yaml --watch
//! ```

use std::collections::HashSet;
use std::env;
use std::fs;
use std::process::ExitCode;
use std::time::{Duration, SystemTime};

use colored::Colorize;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use taskweave::config::{load_settings, Settings};
use taskweave::database::{
    channel, DatabaseHandle, DatabaseService, ProjectFilter, RebuildOutcome, RebuildSummary,
    SnapshotFile, TaskDatabase,
};
use taskweave::project::Project;
use taskweave::workflow::{Correction, Location, Task, Workflow, WorkflowId};
use taskweave::{APP_NAME, VERSION};

/// Default snapshot file used when none is specified.
const DEFAULT_SNAPSHOT: &str = "snapshot.yaml";

/// How often `--watch` checks the snapshot file.
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    snapshot_path: String,
    settings_path: Option<String>,
    project: Option<String>,
    include_tags: Vec<String>,
    exclude_tags: Vec<String>,
    workflows: Vec<String>,
    json: bool,
    watch: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: DEFAULT_SNAPSHOT.to_string(),
            settings_path: None,
            project: None,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            workflows: Vec::new(),
            json: false,
            watch: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Tag-Driven Task and Workflow Database");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: taskweave [OPTIONS] <SNAPSHOT_FILE>");
    println!();
    println!("Arguments:");
    println!("  <SNAPSHOT_FILE>       Corpus snapshot (YAML or JSON)");
    println!();
    println!("Options:");
    println!("  --settings FILE       Load settings from a YAML file");
    println!("  --project NAME        Show only this project's view");
    println!("  --include-tag TAG     Keep tasks carrying TAG (repeatable)");
    println!("  --exclude-tag TAG     Drop tasks carrying TAG (repeatable)");
    println!("  --workflow NAME       Keep tasks of this workflow (repeatable)");
    println!("  --json                Print the report as JSON");
    println!("  --watch               Rebuild whenever the snapshot changes");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Examples:");
    println!("  taskweave snapshot.yaml");
    println!("  taskweave snapshot.yaml --project Work --exclude-tag '#tpm/tag/lo'");
    println!("  taskweave snapshot.yaml --settings taskweave.yaml --watch");
}

/// Returns the value following an option, advancing `i`.
fn option_value(args: &[String], i: &mut usize, option: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} requires an argument", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--json" => config.json = true,
            "--watch" => config.watch = true,
            "--verbose" | "-v" => config.verbose = true,
            "--settings" => {
                config.settings_path = Some(option_value(args, &mut i, "--settings")?);
            }
            "--project" => {
                config.project = Some(option_value(args, &mut i, "--project")?);
            }
            "--include-tag" => {
                config.include_tags.push(option_value(args, &mut i, "--include-tag")?);
            }
            "--exclude-tag" => {
                config.exclude_tags.push(option_value(args, &mut i, "--exclude-tag")?);
            }
            "--workflow" => {
                config.workflows.push(option_value(args, &mut i, "--workflow")?);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.snapshot_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// One entry of the JSON correction list.
#[derive(Serialize)]
struct PendingCorrection<'a> {
    location: &'a Location,
    correction: Correction,
}

/// Everything the report shows, in JSON form.
#[derive(Serialize)]
struct Report<'a> {
    projects: Vec<&'a Project>,
    workflows: Vec<&'a Workflow>,
    tasks: Vec<&'a Task>,
    orphans: Vec<&'a Location>,
    corrections: Vec<PendingCorrection<'a>>,
}

/// Applies the view and filter options to the database.
fn build_report<'a>(db: &'a TaskDatabase, config: &Config) -> Result<Report<'a>, String> {
    let filter = match &config.project {
        Some(name) => {
            if db.project(name).is_none() {
                return Err(format!("Unknown project: {}", name));
            }
            ProjectFilter::Project(name.clone())
        }
        None => ProjectFilter::All,
    };

    let workflows = db.workflows_in_view(&filter);
    let selected: Vec<WorkflowId> = if config.workflows.is_empty() {
        workflows.iter().map(|w| w.id).collect()
    } else {
        config
            .workflows
            .iter()
            .map(|name| {
                db.workflow_by_name(name)
                    .map(|w| w.id)
                    .ok_or_else(|| format!("Unknown workflow: {}", name))
            })
            .collect::<Result<_, _>>()?
    };

    let visible: HashSet<&Location> = db
        .tasks_in_view(&filter)
        .into_iter()
        .map(|t| &t.location)
        .collect();
    let tasks: Vec<&Task> = db
        .get_filtered_tasks(&selected, &config.include_tags, &config.exclude_tags)
        .into_iter()
        .filter(|t| visible.contains(&t.location))
        .collect();

    let projects = match &filter {
        ProjectFilter::All => db.projects().collect(),
        ProjectFilter::Project(name) => std::iter::once(name.clone())
            .chain(db.hierarchy().descendants(name))
            .filter_map(|n| db.project(&n))
            .collect::<Vec<_>>(),
    };

    let orphans = db.orphan_tasks().into_iter().map(|t| &t.location).collect();
    let corrections = db
        .pending_corrections()
        .into_iter()
        .map(|(task, correction)| PendingCorrection {
            location: &task.location,
            correction,
        })
        .collect();

    Ok(Report {
        projects,
        workflows,
        tasks,
        orphans,
        corrections,
    })
}

/// Prints the report as colored text.
fn print_report(db: &TaskDatabase, report: &Report<'_>) {
    println!("{}", "Projects".bold());
    for project in &report.projects {
        println!(
            "  {} ({} tasks, {} workflows)",
            project.name.cyan(),
            project.tasks.len(),
            project.workflows.len()
        );
    }
    println!();

    println!("{}", "Workflows".bold());
    for workflow in &report.workflows {
        let steps: Vec<&str> = workflow.steps.iter().map(|s| s.name.as_str()).collect();
        println!(
            "  {} [{}] {} @ {}",
            workflow.name.cyan(),
            workflow.kind,
            steps.join(" -> "),
            workflow.location
        );
    }
    println!();

    println!("{}", "Tasks".bold());
    for task in &report.tasks {
        let mark = if task.checked { "[x]".green() } else { "[ ]".normal() };
        let workflow = db
            .workflow(task.workflow)
            .map(|w| w.name.as_str())
            .unwrap_or("?");
        let steps: Vec<&str> = task.ticked_steps.iter().map(|s| s.name.as_str()).collect();
        let project = db
            .project_of_task(task)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        println!(
            "  {} {} ({}: {}) [{}] {}",
            mark,
            task.summary,
            workflow,
            steps.join(", "),
            project,
            task.location.to_string().dimmed()
        );
    }
    println!();

    if !report.orphans.is_empty() {
        println!("{}", "Orphan tasks".yellow().bold());
        for location in &report.orphans {
            println!("  {}", location);
        }
        println!();
    }

    if !report.corrections.is_empty() {
        println!("{}", "Pending corrections".yellow().bold());
        for pending in &report.corrections {
            let checkbox = if pending.correction.checked { "[x]" } else { "[ ]" };
            println!(
                "  {}: {} {}",
                pending.location,
                checkbox,
                pending.correction.text
            );
        }
        println!();
    }
}

fn emit_report(db: &TaskDatabase, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let report = build_report(db, config)?;
    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(db, &report);
    }
    Ok(())
}

fn modified(path: &str) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Polls the snapshot file and forwards changes until Ctrl-C.
async fn watch(path: String, handle: DatabaseHandle, mut events: broadcast::Receiver<RebuildSummary>) {
    let mut ticker = tokio::time::interval(WATCH_POLL_INTERVAL);
    let mut last_modified = modified(&path);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Watching {} (Ctrl-C to stop)", path);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Stopping watch");
                handle.shutdown();
                break;
            }
            summary = events.recv() => match summary {
                Ok(summary) => info!(
                    "{} #{} at {}: {} tasks, {} orphans",
                    "Rebuilt".green(),
                    summary.generation,
                    summary.completed_at.format("%H:%M:%S"),
                    summary.tasks,
                    summary.orphans
                ),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Missed {} rebuild events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                let current = modified(&path);
                if current != last_modified {
                    last_modified = current;
                    handle.notify_changed();
                }
            }
        }
    }
}

fn run_watch(db: TaskDatabase, config: &Config) -> Result<TaskDatabase, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let events = db.subscribe();
    let service = DatabaseService::new(db, SnapshotFile::new(&config.snapshot_path));
    let (handle, rx) = channel();

    let (db, _) = runtime.block_on(async {
        tokio::join!(
            service.run(rx),
            watch(config.snapshot_path.clone(), handle, events)
        )
    });
    Ok(db)
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    if !config.json {
        print_banner();
    }

    let settings = match &config.settings_path {
        Some(path) => load_settings(path).map_err(|e| {
            error!("Failed to load settings: {}", e);
            e
        })?,
        None => Settings::default(),
    };

    let mut db = TaskDatabase::new(settings);

    if config.watch {
        db = run_watch(db, &config)?;
        if !db.is_initialized() {
            return Err(format!("Snapshot never became available: {}", config.snapshot_path).into());
        }
    } else {
        info!("Loading snapshot: {}", config.snapshot_path);
        match db.force_rebuild(&SnapshotFile::new(&config.snapshot_path)) {
            RebuildOutcome::Completed(_) => {}
            RebuildOutcome::Throttled => return Err("Rebuild was throttled".into()),
            RebuildOutcome::Unavailable(e) => {
                return Err(format!(
                    "Could not read snapshot '{}': {}",
                    config.snapshot_path, e
                )
                .into())
            }
        }
    }

    emit_report(&db, &config)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("taskweave")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse_arguments(&args(&[])).unwrap();
        assert_eq!(config.snapshot_path, DEFAULT_SNAPSHOT);
        assert!(!config.json);
        assert!(!config.watch);
    }

    #[test]
    fn test_parse_repeatable_options() {
        let config = parse_arguments(&args(&[
            "corpus.yaml",
            "--include-tag",
            "#tpm/tag/hi",
            "--include-tag",
            "#tpm/tag/med",
            "--workflow",
            "Review",
            "--project",
            "Work",
            "--json",
        ]))
        .unwrap();

        assert_eq!(config.snapshot_path, "corpus.yaml");
        assert_eq!(config.include_tags, vec!["#tpm/tag/hi", "#tpm/tag/med"]);
        assert_eq!(config.workflows, vec!["Review"]);
        assert_eq!(config.project.as_deref(), Some("Work"));
        assert!(config.json);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&["--project"])).is_err());
        assert!(parse_arguments(&args(&["--bogus"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml"])).is_err());
    }
}

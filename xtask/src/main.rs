use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use stream_archive_lambda::adapters::local_store::LocalDirectoryStore;
use stream_archive_lambda::handlers::transform::{handle_stream_event, TransformConfig};
use stream_archive_lambda::logging::init_json_logging;
use stream_archive_lambda::runtime::contract::InvocationStatus;
use stream_archive_lambda::runtime::storage_keys::DEFAULT_FORMATTED_PREFIX;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "stream_archive_lambda";
const LAMBDA_BINARY: &str = "transform_and_save";
const DIST_DIR: &str = "dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the DynamoDB stream archive workspace",
    long_about = "A unified CLI for CI checks, Lambda packaging, and local replay\n\
                  of DynamoDB stream batches in the stream archive workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests, lambda packaging)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build and package the transform Lambda as a provided.al2023 zip
    ServerlessPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Replay a stream event JSON file into a local directory store
    Replay {
        /// Path to a DynamoDB stream event (`{"Records": [...]}`)
        #[arg(long)]
        event: PathBuf,
        /// Directory standing in for the destination bucket
        #[arg(long, default_value = "target/replay")]
        output: PathBuf,
        /// Key prefix for formatted objects
        #[arg(long, env = "FORMATTED_PREFIX", default_value = DEFAULT_FORMATTED_PREFIX)]
        prefix: String,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and zip the Lambda artifact
    Package,
    /// Run check + package
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_serverless_lambda(target: &str, profile: BuildProfile) {
    require_target(target);

    step("Build transform lambda binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        target,
        "--bin",
        LAMBDA_BINARY,
    ];
    cargo_args.extend(profile.as_cargo_flag());
    run_cargo(&cargo_args);

    step("Zip bootstrap");
    let binary = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(LAMBDA_BINARY);
    let zip_path = Path::new(DIST_DIR).join(format!("{LAMBDA_BINARY}.zip"));
    if let Err(error) = write_bootstrap_zip(&binary, &zip_path) {
        eprintln!("packaging failed: {error}");
        exit(1);
    }
    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

// Skipped when rustup is absent; cargo reports the missing target itself.
fn require_target(target: &str) {
    let Ok(output) = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    else {
        return;
    };
    let installed = String::from_utf8_lossy(&output.stdout);
    if output.status.success() && !installed.lines().any(|line| line.trim() == target) {
        eprintln!("target `{target}` is missing; run `rustup target add {target}`");
        exit(1);
    }
}

/// Lambda's `provided.al2023` runtime executes the archive entry named `bootstrap`.
fn write_bootstrap_zip(binary: &Path, zip_path: &Path) -> std::io::Result<()> {
    let bytes = fs::read(binary)?;
    if let Some(parent) = zip_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(fs::File::create(zip_path)?);
    zip.start_file(
        "bootstrap",
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o755),
    )?;
    zip.write_all(&bytes)?;
    zip.finish()?;
    Ok(())
}

// ── replay ─────────────────────────────────────────────────────────

fn replay_event(event_path: &Path, output: &Path, prefix: &str) {
    if let Err(error) = init_json_logging() {
        eprintln!("warning: {error}");
    }

    let raw = fs::read_to_string(event_path)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", event_path.display()));
    let event: serde_json::Value = serde_json::from_str(&raw)
        .unwrap_or_else(|error| panic!("{} is not valid JSON: {error}", event_path.display()));

    let config = TransformConfig {
        bucket: output.display().to_string(),
        prefix: prefix.trim_matches('/').to_string(),
    };
    let store = LocalDirectoryStore::new(output);
    let result = handle_stream_event(event, &config, &store);

    println!(
        "{}",
        serde_json::to_string_pretty(&result).expect("invocation result should serialize")
    );
    if result.status == InvocationStatus::Fail {
        exit(1);
    }
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test stream_archive_core");
    run_cargo(&["test", "-p", "stream_archive_core"]);

    step("Test stream_archive_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_package() {
    step("Build transform lambda (host target)");
    run_cargo(&["build", "-p", LAMBDA_PACKAGE, "--bin", LAMBDA_BINARY]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Package => ci_package(),
                CiJob::All => {
                    ci_check();
                    ci_package();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::ServerlessPackage { target, profile } => {
            package_serverless_lambda(&target, profile);
        }
        Commands::Replay {
            event,
            output,
            prefix,
        } => {
            replay_event(&event, &output, &prefix);
        }
    }
}

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use object_reporter_core::stack::{Architecture, StackSpec};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "object_reporter_lambda";
const DIST_DIR: &str = "infra/dist";

/// Lambda binary name paired with the artifact it is packaged into.
const LAMBDA_ARTIFACTS: &[(&str, &str)] = &[
    ("ingest_lambda", "ingest.zip"),
    ("report_lambda", "report.zip"),
];

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the object reporter workspace",
    long_about = "Packages the Lambda artifacts, renders the deployment template\n\
                  and runs the CI checks for the object reporter workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build both Lambda binaries and zip each one as `bootstrap`
    LambdaPackage {
        /// Lambda architecture to build for
        #[arg(value_enum, long, default_value_t = LambdaArch::Arm64)]
        arch: LambdaArch,
        /// Compilation target triple; overrides the one implied by --arch
        #[arg(long)]
        target: Option<String>,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Write the deployment template as JSON
    Synth {
        /// Output file path
        #[arg(long, default_value = "infra/object-reporter.template.json")]
        output: PathBuf,
        /// Default value for the upload bucket name parameter
        #[arg(long, env = "OBJECT_BUCKET_NAME")]
        bucket_name: Option<String>,
        /// Availability zones to spread the load balancer over
        #[arg(long, default_value_t = 2)]
        max_azs: usize,
        /// Lambda architecture the packaged binaries were built for
        #[arg(value_enum, long, default_value_t = LambdaArch::Arm64)]
        arch: LambdaArch,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Check plus a template synth smoke run
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum LambdaArch {
    Arm64,
    X86_64,
}

impl From<LambdaArch> for Architecture {
    fn from(arch: LambdaArch) -> Self {
        match arch {
            LambdaArch::Arm64 => Architecture::Arm64,
            LambdaArch::X86_64 => Architecture::X86_64,
        }
    }
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

fn package_lambdas(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);

    step("Build Lambda binaries");
    let mut cargo_args = vec!["build", "-p", LAMBDA_PACKAGE, "--target", target];
    for &(bin_name, _) in LAMBDA_ARTIFACTS {
        cargo_args.extend(["--bin", bin_name]);
    }
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package Lambda zip artifacts");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create lambda dist directory");

    let mut packaged = Vec::with_capacity(LAMBDA_ARTIFACTS.len());
    for &(bin_name, artifact) in LAMBDA_ARTIFACTS {
        let zip_path = dist_dir.join(artifact);
        package_lambda_zip(&target_dir.join(bin_name), &zip_path);
        packaged.push(zip_path);
    }

    eprintln!("\nPackaged artifacts:");
    for path in packaged {
        eprintln!("- {}", path.display());
    }
}

fn ensure_rust_target_installed(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => {
            eprintln!("warning: could not list installed rust targets; skipping target preflight");
            return;
        }
    };

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- lambda-package`"
        );
    }
}

fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry in lambda zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

fn synth_template(output: &Path, bucket_name: Option<String>, max_azs: usize, arch: LambdaArch) {
    let mut spec = StackSpec {
        max_azs,
        architecture: arch.into(),
        ..StackSpec::default()
    };
    if let Some(bucket_name) = bucket_name {
        spec.object_bucket_name = bucket_name;
    }

    let template = spec.template().unwrap_or_else(|error| {
        eprintln!("invalid stack settings: {error}");
        exit(2);
    });
    let rendered =
        serde_json::to_string_pretty(&template).expect("failed to serialize template");

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).expect("failed to create template directory");
    }
    fs::write(output, rendered + "\n").expect("failed to write template");
    eprintln!("Wrote {}", output.display());
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

    step("Test object_reporter_core");
    run_cargo(&["test", "-p", "object_reporter_core"]);

    step("Test object_reporter_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_synth() {
    step("Synthesize template");
    synth_template(
        &Path::new("target").join("object-reporter.template.json"),
        None,
        2,
        LambdaArch::Arm64,
    );
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::LambdaPackage {
            arch,
            target,
            profile,
        } => {
            let target =
                target.unwrap_or_else(|| Architecture::from(arch).rust_target().to_string());
            package_lambdas(&target, profile);
        }
        Commands::Synth {
            output,
            bucket_name,
            max_azs,
            arch,
        } => {
            synth_template(&output, bucket_name, max_azs, arch);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::All => {
                    ci_check();
                    ci_synth();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use osprims_core::operation::OpenError;
use osprims_core::{
    get_platform, resolve,
    schema::{CLASSIFY_RESULT_V1, DIRECT_IO_PROBE_V1, LOCK_RESULT_V1},
    DomainId, OsprimsError, Platform, PlatformCode,
};
use osprims_direct::{determine, IoMode, Policy, Reason};
use osprims_lock::{
    acquire_with, AcquireError, AcquireStrategy, LockKind, LockRange, LockRequest, LockState,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Diagnostics for osprims error classification, file locks, and direct I/O.
#[derive(Parser, Debug)]
#[command(name = "osprims", version, about, long_about = None)]
struct Cli {
    /// The format for log output.
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// The minimum log level to display.
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "OSPRIMS_LOG_LEVEL"
    )]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a raw platform error code.
    ///
    /// Tries each domain in order and prints the first that claims the code,
    /// or the unmapped fallback with the raw code.
    Classify(ClassifyArgs),

    /// Attempt an advisory lock on a file.
    ///
    /// Exits 0 when the lock was acquired, 75 when it was refused, and 124
    /// when a deadline passed first.
    Lock(LockArgs),

    /// Probe a file for direct (unbuffered) I/O requirements.
    DirectIo(DirectIoArgs),
}

#[derive(Parser, Debug)]
struct ClassifyArgs {
    /// Raw errno or Windows error value.
    #[arg(value_name = "CODE", allow_negative_numbers = true)]
    code: i64,

    /// Platform family the code came from (default: this host's).
    #[arg(long, value_name = "PLATFORM")]
    platform: Option<PlatformArg>,

    /// Comma-separated cascade order (default: every domain).
    #[arg(long, value_name = "DOMAINS", value_delimiter = ',')]
    domains: Vec<DomainId>,

    /// Output JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct LockArgs {
    /// File to lock. Must exist.
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Take a shared lock instead of an exclusive one.
    #[arg(long)]
    shared: bool,

    /// How hard to try for the lock.
    #[arg(long, value_name = "STRATEGY", default_value = "try")]
    strategy: StrategyArg,

    /// Deadline for --strategy deadline (e.g., "500ms", "5s").
    #[arg(long, value_name = "DURATION", default_value = "5s")]
    timeout: String,

    /// Keep the lock this long before releasing it.
    #[arg(long, value_name = "DURATION")]
    hold: Option<String>,

    /// First byte of a byte-range lock (requires --len).
    #[arg(long, value_name = "OFFSET", requires = "len")]
    start: Option<u64>,

    /// Length of a byte-range lock.
    #[arg(long, value_name = "BYTES")]
    len: Option<u64>,

    /// Output JSON result.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct DirectIoArgs {
    /// File to probe. Must exist.
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// What to do if direct I/O is unavailable.
    #[arg(long, value_name = "POLICY", default_value = "fallback")]
    policy: PolicyArg,

    /// Output JSON result.
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PlatformArg {
    Posix,
    Windows,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StrategyArg {
    /// One non-blocking attempt.
    Try,
    /// Block until granted.
    Wait,
    /// Retry with backoff until --timeout passes.
    Deadline,
}

impl StrategyArg {
    fn as_str(self) -> &'static str {
        match self {
            StrategyArg::Try => "try",
            StrategyArg::Wait => "wait",
            StrategyArg::Deadline => "deadline",
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyArg {
    /// Fall back to buffered I/O.
    Fallback,
    /// Fail when direct I/O is unavailable.
    Error,
}

impl From<PolicyArg> for Policy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Fallback => Policy::FallbackToBuffered,
            PolicyArg::Error => Policy::ErrorOnViolation,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable text format.
    Text,
    /// Machine-readable JSON format.
    Json,
}

fn main() {
    let cli = Cli::parse();

    // Initialize the tracing subscriber
    let filter = EnvFilter::from_default_env().add_directive(cli.log_level.into());

    match cli.log_format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    info!("Initialization complete. Starting main logic.");
    if let Some(command) = cli.command {
        match run_command(command) {
            Ok(exit_code) => {
                info!("Main logic finished.");
                std::process::exit(exit_code);
            }
            Err(err) => {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
        }
    } else {
        println!("Platform: {}", get_platform());
    }
    info!("Main logic finished.");
}

fn run_command(command: Command) -> Result<i32, OsprimsError> {
    match command {
        Command::Classify(args) => run_classify(args),
        Command::Lock(args) => run_lock(args),
        Command::DirectIo(args) => run_direct_io(args),
    }
}

/// Exit codes for the lock and direct-io commands.
///
/// - 69: Direct I/O unavailable under --policy error (EX_UNAVAILABLE)
/// - 75: Lock refused or lock table exhausted (EX_TEMPFAIL)
/// - 124: Deadline passed before the lock was granted
mod exit_codes {
    pub const UNAVAILABLE: i32 = 69;
    pub const LOCK_REFUSED: i32 = 75;
    pub const TIMEOUT: i32 = 124;
}

const EXIT_SUCCESS: i32 = osprims_core::exit_codes::EXIT_SUCCESS;

// ============================================================================
// Classify command
// ============================================================================

#[derive(Serialize)]
struct ClassifyResult {
    schema_id: &'static str,
    timestamp: String,
    platform: &'static str,
    code: i32,
    domains: Vec<&'static str>,
    domain: Option<&'static str>,
    unmapped: bool,
    message: String,
}

fn run_classify(args: ClassifyArgs) -> Result<i32, OsprimsError> {
    let platform = match args.platform {
        Some(PlatformArg::Posix) => Platform::Posix,
        Some(PlatformArg::Windows) => Platform::Windows,
        None => Platform::native(),
    };
    let code = platform_code(platform, args.code)?;
    let domains = if args.domains.is_empty() {
        DomainId::ALL.to_vec()
    } else {
        args.domains
    };

    let err = resolve(code, &domains);
    info!(%code, domain = ?err.domain(), "Classified platform code");

    if args.json {
        let out = ClassifyResult {
            schema_id: CLASSIFY_RESULT_V1,
            timestamp: current_timestamp(),
            platform: platform.as_str(),
            code: code.raw(),
            domains: domains.iter().map(|d| d.as_str()).collect(),
            domain: err.domain().map(DomainId::as_str),
            unmapped: err.is_unmapped(),
            message: err.to_string(),
        };
        print_json(&out)?;
    } else {
        match err.domain() {
            Some(domain) => println!("{domain}: {err}"),
            None => println!("{err}"),
        }
    }

    Ok(EXIT_SUCCESS)
}

fn platform_code(platform: Platform, raw: i64) -> Result<PlatformCode, OsprimsError> {
    let out_of_range =
        || OsprimsError::invalid_argument(format!("code {raw} is out of range for {platform}"));
    match platform {
        Platform::Posix => i32::try_from(raw)
            .map(PlatformCode::posix)
            .map_err(|_| out_of_range()),
        Platform::Windows => u32::try_from(raw)
            .map(PlatformCode::windows)
            .map_err(|_| out_of_range()),
    }
}

// ============================================================================
// Lock command
// ============================================================================

#[derive(Serialize)]
struct LockResult {
    schema_id: &'static str,
    timestamp: String,
    path: String,
    kind: LockKind,
    range: LockRange,
    strategy: &'static str,
    #[serde(flatten)]
    state: LockState,
    attempts: Option<u32>,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_lock(args: LockArgs) -> Result<i32, OsprimsError> {
    let kind = if args.shared {
        LockKind::Shared
    } else {
        LockKind::Exclusive
    };
    let range = match (args.start, args.len) {
        (start, Some(len)) => LockRange::bytes(start.unwrap_or(0), len)?,
        (None, None) => LockRange::Whole,
        (Some(_), None) => return Err(OsprimsError::invalid_argument("--start requires --len")),
    };
    let strategy = match args.strategy {
        StrategyArg::Try => AcquireStrategy::Try,
        StrategyArg::Wait => AcquireStrategy::Wait,
        StrategyArg::Deadline => AcquireStrategy::timeout(parse_duration(&args.timeout)?),
    };
    let hold = args.hold.as_deref().map(parse_duration).transpose()?;

    let file = open_for_lock(&args.path)?;
    let request = LockRequest {
        kind,
        range,
        strategy,
        ..Default::default()
    };

    info!(
        path = %args.path.display(),
        %kind,
        strategy = args.strategy.as_str(),
        "Attempting lock"
    );

    let started = Instant::now();
    let outcome = acquire_with(&file, &request);
    let elapsed = started.elapsed();

    let (state, attempts, error, exit_code) = match &outcome {
        Ok(guard) => (
            LockState::Acquired,
            Some(guard.attempts()),
            None,
            EXIT_SUCCESS,
        ),
        Err(err) => {
            let attempts = match err {
                AcquireError::TimedOut { attempts, .. } => Some(*attempts),
                _ => None,
            };
            let exit_code = match err {
                AcquireError::TimedOut { .. } => exit_codes::TIMEOUT,
                AcquireError::Denied(_) | AcquireError::Exhausted => exit_codes::LOCK_REFUSED,
                AcquireError::Os(source) => {
                    return Err(OsprimsError::os("lock", source.clone()));
                }
            };
            let state = err.state().unwrap_or(LockState::Idle);
            (state, attempts, Some(err.to_string()), exit_code)
        }
    };

    if args.json {
        let out = LockResult {
            schema_id: LOCK_RESULT_V1,
            timestamp: current_timestamp(),
            path: args.path.display().to_string(),
            kind,
            range,
            strategy: args.strategy.as_str(),
            state,
            attempts,
            elapsed_ms: elapsed.as_millis() as u64,
            error,
        };
        print_json(&out)?;
    } else {
        match &error {
            None => println!("acquired {kind} lock on {}", args.path.display()),
            Some(message) => println!("{message}"),
        }
    }

    if let (Ok(guard), Some(hold)) = (outcome, hold) {
        info!(hold_ms = hold.as_millis() as u64, "Holding lock");
        thread::sleep(hold);
        guard
            .unlock()
            .map_err(|source| OsprimsError::os("unlock", source))?;
    }

    Ok(exit_code)
}

fn open_for_lock(path: &Path) -> Result<File, OsprimsError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(open_error)
}

/// Classify a failed `open` from std.
fn open_error(err: io::Error) -> OsprimsError {
    match PlatformCode::from_io(&err) {
        Some(code) => OsprimsError::os("open", OpenError::resolve(code)),
        None => OsprimsError::invalid_argument(err.to_string()),
    }
}

// ============================================================================
// Direct I/O command
// ============================================================================

#[derive(Serialize)]
struct DirectIoProbe {
    schema_id: &'static str,
    timestamp: String,
    path: String,
    platform: &'static str,
    policy: Policy,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<IoMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Reason>,
}

fn run_direct_io(args: DirectIoArgs) -> Result<i32, OsprimsError> {
    let file = File::open(&args.path).map_err(open_error)?;
    let policy = Policy::from(args.policy);
    let decision = policy.decide(determine(&file));

    info!(path = %args.path.display(), ?decision, "Probed direct I/O");

    if args.json {
        let out = DirectIoProbe {
            schema_id: DIRECT_IO_PROBE_V1,
            timestamp: current_timestamp(),
            path: args.path.display().to_string(),
            platform: get_platform(),
            policy,
            result: decision.ok(),
            error: decision.err(),
        };
        print_json(&out)?;
    } else {
        match &decision {
            Ok(IoMode::Direct(req)) => println!(
                "direct: buffer_alignment={} length_multiple={}",
                req.buffer_alignment(),
                req.length_multiple()
            ),
            Ok(IoMode::Buffered { reason }) => println!("buffered: {reason}"),
            Err(reason) => println!("direct I/O unavailable: {reason}"),
        }
    }

    match decision {
        Ok(_) => Ok(EXIT_SUCCESS),
        Err(_) => Ok(exit_codes::UNAVAILABLE),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<(), OsprimsError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| OsprimsError::internal(format!("serialize json: {err}")))?;
    println!("{json}");
    Ok(())
}

/// Get current timestamp in ISO 8601 format.
fn current_timestamp() -> String {
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Parse a duration string like "5s", "100ms", "2m", "1h", or just "5" (seconds).
fn parse_duration(s: &str) -> Result<Duration, OsprimsError> {
    let s = s.trim();

    // Try to parse as plain number (seconds)
    if let Ok(secs) = s.parse::<f64>() {
        return checked_duration(secs);
    }

    // Try to parse with suffix
    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("ms") {
        (n, 0.001)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600.0)
    } else {
        return Err(OsprimsError::invalid_argument(format!(
            "invalid duration '{s}': expected number or number with suffix (ms, s, m, h)"
        )));
    };

    let num: f64 = num_str.trim().parse().map_err(|_| {
        OsprimsError::invalid_argument(format!("invalid duration '{s}': not a valid number"))
    })?;

    checked_duration(num * multiplier)
}

fn checked_duration(secs: f64) -> Result<Duration, OsprimsError> {
    if secs < 0.0 {
        return Err(OsprimsError::invalid_argument(
            "duration cannot be negative",
        ));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|err| OsprimsError::invalid_argument(format!("invalid duration: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_suffixes() {
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration(" 1h ").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("NaN").is_err());
    }

    #[test]
    fn platform_code_range_checks() {
        assert!(platform_code(Platform::Posix, i64::from(i32::MAX) + 1).is_err());
        assert!(platform_code(Platform::Windows, -1).is_err());
        assert_eq!(
            platform_code(Platform::Windows, 5).unwrap(),
            PlatformCode::windows(5)
        );
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use serde::Deserialize;
use sump_core::protocol::{Message, TokenPolicy, decode_messages, encode_settings};
use sump_core::transport::SerialTransport;
use sump_core::{
    CaptureFile, CaptureOrder, Device, FieldSpec, Metadata, Settings, TriggerMode, TriggerSet,
    TriggerStage, key_name,
};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("SUMP_BUILD_COMMIT"),
    ", ",
    env!("SUMP_BUILD_DATE"),
    ")"
);

/// Timeout used for ordinary replies when the port is opened.
const PORT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "sump")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Host tool for SUMP-compatible logic analyzers.",
    long_about = None,
    after_help = "Examples:\n  sump encode --divider 4 --trace\n  sump metadata --port /dev/ttyACM0\n  sump capture --port /dev/ttyACM0 -o capture.json\n  sump inspect capture.json --field clk=0 --field data=8:8"
)]
struct Cli {
    /// Log protocol traffic (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the bytes a configuration sends, without a device.
    Encode {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print one decoded message per line instead of hex
        #[arg(long)]
        trace: bool,
    },
    /// Print the device ID string.
    Id {
        #[command(flatten)]
        port: PortArgs,
    },
    /// Query and print device metadata.
    Metadata {
        #[command(flatten)]
        port: PortArgs,

        /// Print metadata as JSON
        #[arg(long)]
        json: bool,

        /// Reject tokens outside the typed key ranges
        #[arg(long)]
        strict: bool,
    },
    /// Run a capture and write a capture file.
    #[command(
        after_help = "Examples:\n  sump capture --port /dev/ttyACM0 -o capture.json\n  sump capture --port COM3 --settings ols.json --stdout --pretty"
    )]
    Capture {
        #[command(flatten)]
        port: PortArgs,

        #[command(flatten)]
        config: ConfigArgs,

        /// Output capture file (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        output: Option<PathBuf>,

        /// Write the capture file to stdout
        #[arg(long, conflicts_with = "output")]
        stdout: bool,

        /// Pretty-print JSON output (compact by default)
        #[arg(long)]
        pretty: bool,

        /// The device sends the oldest sample first
        #[arg(long)]
        arrival_order: bool,

        /// Do not query metadata before capturing
        #[arg(long)]
        skip_metadata: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,
    },
    /// Summarize a capture file.
    Inspect {
        /// Capture file (a glob pattern must match exactly one file)
        input: PathBuf,

        /// Per-sample column NAME=SPEC, where SPEC is BIT or START:LENGTH
        #[arg(long = "field", value_parser = parse_named_field)]
        fields: Vec<(String, FieldSpec)>,

        /// Print at most this many sample rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List serial ports.
    Ports,
}

#[derive(Args, Debug)]
struct PortArgs {
    /// Serial port path (e.g. /dev/ttyACM0 or COM3)
    #[arg(long)]
    port: String,

    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Read timeout while receiving samples, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// JSON file with "settings" and "triggers" objects
    #[arg(long = "settings")]
    settings_file: Option<PathBuf>,

    #[arg(long, value_parser = parse_u32)]
    divider: Option<u32>,

    #[arg(long, value_parser = parse_u32)]
    read_count: Option<u32>,

    #[arg(long, value_parser = parse_u32)]
    delay_count: Option<u32>,

    /// Lane mask; a set bit disables that byte lane (e.g. 0b1100)
    #[arg(long, value_parser = parse_u32)]
    channel_groups: Option<u32>,

    #[arg(long)]
    demux: bool,

    #[arg(long)]
    filter: bool,

    #[arg(long)]
    external: bool,

    #[arg(long)]
    inverted: bool,

    /// none, simple or complex
    #[arg(long)]
    trigger_mode: Option<String>,

    #[arg(long, value_parser = parse_u32)]
    trigger_mask: Option<u32>,

    #[arg(long, value_parser = parse_u32)]
    trigger_value: Option<u32>,

    /// Number of trigger stages the device implements
    #[arg(long)]
    stages: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    settings: Settings,
    triggers: TriggerSet,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encode { config, trace } => cmd_encode(&config, trace),
        Commands::Id { port } => cmd_id(&port),
        Commands::Metadata { port, json, strict } => cmd_metadata(&port, json, strict),
        Commands::Capture {
            port,
            config,
            output,
            stdout,
            pretty,
            arrival_order,
            skip_metadata,
            quiet,
        } => cmd_capture(
            &port,
            &config,
            CaptureOutput {
                path: output,
                stdout,
                pretty,
                quiet,
            },
            arrival_order,
            skip_metadata,
        ),
        Commands::Inspect {
            input,
            fields,
            limit,
        } => cmd_inspect(&input, &fields, limit),
        Commands::Ports => cmd_ports(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{:#}", err), None)
    }
}

fn cmd_encode(config: &ConfigArgs, trace: bool) -> Result<(), CliError> {
    let (settings, triggers) = build_config(config)?;
    let bytes = encode_settings(&settings, &triggers).map_err(|err| {
        CliError::new(
            format!("cannot encode configuration: {}", err),
            Some("check the settings flags against the device limits".to_string()),
        )
    })?;

    if trace {
        let messages: Vec<Message> =
            decode_messages(&bytes).context("failed to decode encoded bytes")?;
        for message in messages {
            println!("{}", message);
        }
    } else {
        for command in bytes.chunks(5) {
            println!("{}", hex(command));
        }
    }
    Ok(())
}

fn cmd_id(port: &PortArgs) -> Result<(), CliError> {
    let mut device = open_device(port)?;
    device.reset().context("failed to reset device")?;
    let id = device.id_string().context("failed to read device ID")?;
    println!("{}", id);
    Ok(())
}

fn cmd_metadata(port: &PortArgs, json: bool, strict: bool) -> Result<(), CliError> {
    let policy = if strict {
        TokenPolicy::Strict
    } else {
        TokenPolicy::Lenient
    };
    let mut device = open_device(port)?.with_token_policy(policy);
    let metadata = device
        .query_metadata()
        .context("failed to query device metadata")?;

    if json {
        let text = serde_json::to_string_pretty(&metadata).context("JSON serialization failed")?;
        println!("{}", text);
    } else {
        print_metadata(&metadata);
    }
    Ok(())
}

struct CaptureOutput {
    path: Option<PathBuf>,
    stdout: bool,
    pretty: bool,
    quiet: bool,
}

fn cmd_capture(
    port: &PortArgs,
    config: &ConfigArgs,
    output: CaptureOutput,
    arrival_order: bool,
    skip_metadata: bool,
) -> Result<(), CliError> {
    let target = if output.stdout {
        None
    } else {
        Some(output.path.ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--output or --stdout".to_string()),
            )
        })?)
    };

    let (settings, triggers) = build_config(config)?;
    // Fail on bad settings before touching the port.
    encode_settings(&settings, &triggers).map_err(|err| {
        CliError::new(
            format!("cannot encode configuration: {}", err),
            Some("check the settings flags against the device limits".to_string()),
        )
    })?;

    let mut device = open_device(port)?;
    let metadata = if skip_metadata {
        None
    } else {
        Some(
            device
                .query_metadata()
                .context("failed to query device metadata")?,
        )
    };

    let order = if arrival_order {
        CaptureOrder::Arrival
    } else {
        CaptureOrder::LatestFirst
    };
    let capture = device
        .capture(&settings, &triggers, order)
        .map_err(|err| {
            CliError::new(
                format!("capture failed: {}", err),
                Some("with --timeout-ms, check that the trigger fires in time".to_string()),
            )
        })?;
    let samples = capture.len();

    let file = CaptureFile::new(settings, triggers, metadata, capture);
    let Some(path) = target else {
        let json = file
            .to_json(output.pretty)
            .context("JSON serialization failed")?;
        print!("{}", json);
        return Ok(());
    };

    file.save(&path, output.pretty)
        .with_context(|| format!("Failed to write capture file: {}", path.display()))?;

    if !output.quiet {
        eprintln!("OK: {} samples written -> {}", samples, path.display());
    }
    Ok(())
}

fn cmd_inspect(
    input: &Path,
    fields: &[(String, FieldSpec)],
    limit: Option<usize>,
) -> Result<(), CliError> {
    let resolved = resolve_input_path(input)?;
    if !resolved.is_file() {
        return Err(CliError::new(
            format!("input file not found: {}", resolved.display()),
            Some("pass a capture file written by `sump capture`".to_string()),
        ));
    }
    let file = CaptureFile::load(&resolved).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("pass a capture file written by `sump capture`".to_string()),
        )
    })?;

    println!("file: {}", resolved.display());
    println!("format version: {}", file.format_version);
    println!("tool: {} {}", file.tool.name, file.tool.version);
    println!("captured at: {}", file.captured_at);
    match file.settings.sample_rate() {
        Ok(rate) => println!("sample rate: {} Hz (divider {})", rate, file.settings.divider),
        Err(_) => println!("sample rate: unknown (divider {})", file.settings.divider),
    }
    println!(
        "samples: {} ({} lanes, {})",
        file.capture.len(),
        file.capture.word_width,
        order_name(file.capture.order)
    );
    println!(
        "trigger: {} ({} stages)",
        file.triggers.mode(),
        file.triggers.n_stages()
    );
    if let Some(name) = file.metadata.as_ref().and_then(Metadata::device_name) {
        println!("device: {}", name);
    }

    if fields.is_empty() {
        return Ok(());
    }

    let columns: Vec<Vec<u32>> = fields
        .iter()
        .map(|(_, spec)| file.capture.extract(spec))
        .collect();
    let header: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
    println!();
    println!("index\t{}", header.join("\t"));
    let rows = limit.unwrap_or(file.capture.len()).min(file.capture.len());
    for index in 0..rows {
        let values: Vec<String> = columns
            .iter()
            .map(|column| column[index].to_string())
            .collect();
        println!("{}\t{}", index, values.join("\t"));
    }
    Ok(())
}

fn cmd_ports() -> Result<(), CliError> {
    let ports = SerialTransport::list_ports().context("failed to enumerate serial ports")?;
    if ports.is_empty() {
        eprintln!("no serial ports found");
    }
    for port in ports {
        println!("{}", port.port_name);
    }
    Ok(())
}

fn open_device(port: &PortArgs) -> Result<Device<SerialTransport>, CliError> {
    let transport = SerialTransport::open(&port.port, port.baud, PORT_TIMEOUT).map_err(|err| {
        CliError::new(
            format!("failed to open serial port {}: {}", port.port, err),
            Some("run `sump ports` to list available ports".to_string()),
        )
    })?;
    Ok(Device::new(transport).with_capture_timeout(port.timeout_ms.map(Duration::from_millis)))
}

/// Defaults, then the settings file, then individual flags.
fn build_config(args: &ConfigArgs) -> Result<(Settings, TriggerSet), CliError> {
    let SettingsFile {
        mut settings,
        mut triggers,
    } = match &args.settings_file {
        Some(path) => read_settings_file(path)?,
        None => SettingsFile::default(),
    };

    if let Some(divider) = args.divider {
        settings.divider = divider;
    }
    if let Some(read_count) = args.read_count {
        settings.read_count = read_count;
    }
    if let Some(delay_count) = args.delay_count {
        settings.delay_count = delay_count;
    }
    if let Some(groups) = args.channel_groups {
        settings.channel_groups = u8::try_from(groups).map_err(|_| {
            CliError::new(
                format!("channel group mask {:#x} is wider than 4 bits", groups),
                Some("use a value between 0b0000 and 0b1111".to_string()),
            )
        })?;
    }
    settings.demux |= args.demux;
    settings.filter |= args.filter;
    settings.external |= args.external;
    settings.inverted |= args.inverted;

    let n_stages = args.stages.unwrap_or(triggers.n_stages());
    if let Some(mode) = &args.trigger_mode {
        let mode: TriggerMode = mode.parse().map_err(|err| {
            CliError::new(
                format!("{}", err),
                Some("use --trigger-mode none, simple or complex".to_string()),
            )
        })?;
        let stage = TriggerStage {
            mask: args.trigger_mask.unwrap_or(0),
            value: args.trigger_value.unwrap_or(0),
            start: true,
            ..TriggerStage::default()
        };
        triggers = match mode {
            TriggerMode::Disabled => TriggerSet::disabled(n_stages),
            TriggerMode::Simple => TriggerSet::simple(stage, n_stages),
            TriggerMode::Complex => TriggerSet::complex(vec![stage], n_stages),
        }
        .map_err(invalid_triggers)?;
    } else if args.trigger_mask.is_some() || args.trigger_value.is_some() {
        return Err(CliError::new(
            "--trigger-mask and --trigger-value need a trigger mode",
            Some("add --trigger-mode simple".to_string()),
        ));
    } else if n_stages != triggers.n_stages() {
        triggers = triggers.with_stage_count(n_stages).map_err(invalid_triggers)?;
    }

    Ok((settings, triggers))
}

fn invalid_triggers(err: sump_core::ConfigError) -> CliError {
    CliError::new(
        format!("invalid trigger configuration: {}", err),
        Some("the reference hardware has 4 stages".to_string()),
    )
}

fn read_settings_file(path: &Path) -> Result<SettingsFile, CliError> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            format!("invalid settings file {}: {}", path.display(), err),
            Some("expected a JSON object with optional \"settings\" and \"triggers\"".to_string()),
        )
    })
}

fn print_metadata(metadata: &Metadata) {
    if metadata.is_empty() {
        eprintln!("device reported no metadata");
        return;
    }
    for entry in metadata.entries() {
        let name = key_name(entry.key).unwrap_or("unknown");
        println!("0x{:02x} {:<28} {}", entry.key, name, entry.value);
    }
}

fn order_name(order: CaptureOrder) -> &'static str {
    match order {
        CaptureOrder::Arrival => "arrival order",
        CaptureOrder::LatestFirst => "latest first",
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_u32(value: &str) -> Result<u32, String> {
    let value = value.trim().replace('_', "");
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"));
    let parsed = if let Some(digits) = hex {
        u32::from_str_radix(digits, 16)
    } else if let Some(digits) = value.strip_prefix("0b").or_else(|| value.strip_prefix("0B")) {
        u32::from_str_radix(digits, 2)
    } else {
        value.parse::<u32>()
    };
    parsed.map_err(|err| format!("invalid number '{}': {}", value, err))
}

fn parse_named_field(value: &str) -> Result<(String, FieldSpec), String> {
    let (name, spec) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=SPEC, got '{}'", value))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", value));
    }
    let spec = spec.parse::<FieldSpec>().map_err(|err| err.to_string())?;
    Ok((name.to_string(), spec))
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        ));
    }
    if matches.len() > 1 {
        let listed = matches
            .iter()
            .take(3)
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let more = if matches.len() > 3 { ", ..." } else { "" };
        return Err(CliError::new(
            format!(
                "multiple files match pattern '{}' ({} matches); matches: {}{}",
                pattern,
                matches.len(),
                listed,
                more
            ),
            Some("pass a single capture file, or run once per file".to_string()),
        ));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}

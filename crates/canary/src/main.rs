#![forbid(unsafe_code)]

use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use canary_core::schema::PayloadKind;
use canary_core::types::Timestamp;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "canary",
    version,
    about = "Build, check, and decode canary analytics payloads."
)]
struct Cli {
    /// Log debug events to stderr. RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a request from a built-in template.
    New {
        /// Template name: threshold, delta, minimal.
        template: String,

        /// Experiment name.
        #[arg(long)]
        name: Option<String>,

        /// Skip workspace defaults.
        #[arg(long)]
        no_defaults: bool,

        /// Write to file instead of stdout.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List available request templates.
    Templates,

    /// Write workspace defaults (.canary/defaults.json).
    Init,

    /// Validate payload files against the embedded JSON schema.
    Validate {
        /// Payload kind: request or response.
        #[arg(long, default_value = "request")]
        kind: PayloadKind,

        /// One or more .json file paths.
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Unified validation: schema + typed decode + lint.
    Check {
        /// Path to payload .json file.
        file: String,

        /// Payload kind; detected from the top-level keys when omitted.
        #[arg(long)]
        kind: Option<PayloadKind>,

        /// Output structured JSON report.
        #[arg(long)]
        json: bool,

        /// Fail on warnings (not just errors).
        #[arg(long)]
        strict: bool,
    },

    /// Decode a request and re-encode it as the wire body.
    Encode {
        /// Path to request .json (or "-" / omit for stdin).
        #[arg(default_value = "-")]
        file: String,

        /// Pretty-print.
        #[arg(long)]
        pretty: bool,
    },

    /// Decode a response and summarize the assessment.
    Decode {
        /// Path to response .json (or "-" / omit for stdin).
        #[arg(default_value = "-")]
        file: String,

        /// Output the normalized response JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Build the follow-up request carrying the response state.
    Next {
        /// Previous request .json.
        #[arg(long)]
        request: String,

        /// Response .json returned for that request.
        #[arg(long)]
        response: String,

        /// Close both windows at this ISO-8601 time.
        #[arg(long)]
        end_time: Option<String>,
    },

    /// Print the analytics endpoint path.
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Cmd::New {
            template,
            name,
            no_defaults,
            output,
        } => cmd_new(&template, name.as_deref(), no_defaults, output.as_deref()),

        Cmd::Templates => cmd_templates(),

        Cmd::Init => cmd_init(),

        Cmd::Validate { kind, files } => cmd_validate(kind, &files),

        Cmd::Check {
            file,
            kind,
            json,
            strict,
        } => cmd_check(&file, kind, json, strict),

        Cmd::Encode { file, pretty } => cmd_encode(&file, pretty),

        Cmd::Decode { file, json } => cmd_decode(&file, json),

        Cmd::Next {
            request,
            response,
            end_time,
        } => cmd_next(&request, &response, end_time),

        Cmd::Path => {
            println!("{}", canary_core::ANALYTICS_API_PATH);
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = if verbose == 0 { "warn" } else { "debug" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_input(file: &str) -> Result<Vec<u8>> {
    if file == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read(file).with_context(|| format!("cannot read {file}"))
    }
}

fn cmd_new(
    template: &str,
    name: Option<&str>,
    no_defaults: bool,
    output: Option<&str>,
) -> Result<()> {
    let mut request = canary_core::templates::generate(template, name, chrono::Utc::now())
        .ok_or_else(|| {
            let available: Vec<_> = canary_core::templates::list_templates()
                .iter()
                .map(|(n, _)| *n)
                .collect();
            anyhow::anyhow!(
                "unknown template \"{template}\". available: {}",
                available.join(", ")
            )
        })?;

    if !no_defaults {
        if let Some(defaults) = canary_core::config::load_workspace_defaults()? {
            canary_core::config::apply_defaults(&mut request, &defaults);
        }
    }

    let json = canary_core::codec::encode_request_pretty(&request)?;
    if let Some(path) = output {
        std::fs::write(path, &json).with_context(|| format!("cannot write {path}"))?;
        eprintln!("wrote {path}");
    } else {
        println!("{json}");
    }
    Ok(())
}

fn cmd_templates() -> Result<()> {
    for (name, desc) in canary_core::templates::list_templates() {
        println!("  {name:<12} {desc}");
    }
    Ok(())
}

fn cmd_init() -> Result<()> {
    let path = canary_core::config::defaults_path();
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let defaults = serde_json::json!({
        "traffic_control": {
            "max_traffic_percent": 50
        }
    });
    std::fs::write(&path, serde_json::to_string_pretty(&defaults)?)?;
    eprintln!("created {}", path.display());
    Ok(())
}

fn cmd_validate(kind: PayloadKind, files: &[String]) -> Result<()> {
    let (passed, failed) = canary_core::schema::validate_files(files, kind)?;
    eprintln!("\n{passed} passed, {failed} failed");
    if failed > 0 {
        bail!("{failed} file(s) failed validation");
    }
    Ok(())
}

fn cmd_check(file: &str, kind: Option<PayloadKind>, json_out: bool, strict: bool) -> Result<()> {
    let content = read_input(file)?;
    let data: serde_json::Value =
        serde_json::from_slice(&content).with_context(|| format!("{file}: invalid JSON"))?;

    let kind = match kind.or_else(|| canary_core::schema::detect_kind(&data)) {
        Some(k) => k,
        None => bail!("{file}: cannot tell request from response; pass --kind"),
    };

    let report = canary_core::schema::check(&data, file, kind, strict);

    if json_out {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if report.pass {
            eprintln!("  ok  {file} ({kind})");
        } else {
            eprintln!("  FAIL {file} ({kind})");
        }
        for e in &report.errors {
            eprintln!(
                "  error {}: {} {}",
                e.code,
                e.message,
                e.path.as_deref().unwrap_or("")
            );
        }
        for w in &report.warnings {
            eprintln!(
                "  warn  {}: {} {}",
                w.code,
                w.message,
                w.path.as_deref().unwrap_or("")
            );
        }
    }

    if !report.pass {
        bail!("check failed for {file}");
    }
    Ok(())
}

fn cmd_encode(file: &str, pretty: bool) -> Result<()> {
    let request = canary_core::decode_request(&read_input(file)?)
        .with_context(|| format!("{file}: not a valid request"))?;
    if pretty {
        println!("{}", canary_core::codec::encode_request_pretty(&request)?);
    } else {
        let bytes = canary_core::encode_request(&request)?;
        println!("{}", String::from_utf8_lossy(&bytes));
    }
    Ok(())
}

fn cmd_decode(file: &str, json_out: bool) -> Result<()> {
    let response = canary_core::decode_response(&read_input(file)?)
        .with_context(|| format!("{file}: not a valid response"))?;
    if json_out {
        println!("{}", canary_core::codec::encode_response_pretty(&response)?);
    } else {
        canary_core::report::print_assessment(&response);
    }
    Ok(())
}

fn cmd_next(request_file: &str, response_file: &str, end_time: Option<String>) -> Result<()> {
    let request = canary_core::decode_request(&read_input(request_file)?)
        .with_context(|| format!("{request_file}: not a valid request"))?;
    let response = canary_core::decode_response(&read_input(response_file)?)
        .with_context(|| format!("{response_file}: not a valid response"))?;

    let mut next = request.next_call(&response);
    if let Some(end) = end_time {
        let end = Timestamp::from(end);
        next.baseline.end_time = Some(end.clone());
        next.candidate.end_time = Some(end);
    }
    tracing::info!(
        experiment = %next.name,
        last_state = %next.last_state,
        "forwarding analytics state"
    );
    if response.should_abort() {
        eprintln!("  warn  analytics service requested abort for {}", next.name);
    }

    println!("{}", canary_core::codec::encode_request_pretty(&next)?);
    Ok(())
}

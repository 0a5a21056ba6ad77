use clap::{Parser, Subcommand};
use endpoint::{CodecError, EndpointResolver, checksum, encode_address, reference_checksum, validate};
use pollchat::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use pollchat::{
    ApiError, ChatApi, ChatError, ChatHost, ChatMessage, ClientConfig, ClientTimeouts, HttpChatApi, SessionEvent,
    StatusNotice, StatusReport,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot encode address: {0}")]
    Encode(#[from] CodecError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("stdin read failed: {0}")]
    Stdin(#[from] std::io::Error),
    #[error("status unavailable: {0}")]
    StatusUnavailable(String),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pollchat-cli", about = "Terminal client for the polling chat service")]
struct Cli {
    /// Service address; skips candidate resolution when set.
    #[arg(long, env = "POLLCHAT_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "POLLCHAT_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "POLLCHAT_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the endpoint the client would use and how it was chosen.
    Resolve {
        /// Also list every built-in candidate.
        #[arg(long, default_value_t = false)]
        candidates: bool,
    },
    /// Encode an address into a candidate bundle.
    Encode {
        address: String,
        #[arg(long, default_value_t = 4)]
        pieces: usize,
    },
    /// Fetch and print the service status, ignoring the shown-once gate.
    Status,
    /// Join the room and chat over stdin. `/quit` or EOF leaves.
    Chat {
        #[arg(long)]
        alias: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        base_url: cli.base_url.map(|url| url.trim().to_owned()).filter(|url| !url.is_empty()),
        timeouts: ClientTimeouts {
            request_secs: cli.request_timeout_secs.max(1),
            connect_secs: cli.connect_timeout_secs.max(1),
        },
    };

    match cli.command {
        Command::Resolve { candidates } => run_resolve(&config, candidates),
        Command::Encode { address, pieces } => run_encode(&address, pieces),
        Command::Status => run_status(&config).await,
        Command::Chat { alias } => run_chat(config, &alias).await,
    }
}

fn run_resolve(config: &ClientConfig, candidates: bool) -> Result<(), CliError> {
    let endpoint = config.resolve_endpoint();
    println!("{endpoint} ({})", endpoint.provenance());
    if candidates {
        for (index, bundle) in EndpointResolver::builtin().bundles().iter().enumerate() {
            match bundle.decode() {
                Ok(candidate) => {
                    let mark = if validate(&candidate) { "valid" } else { "decoy" };
                    println!("  [{index}] {mark:<5} {candidate}");
                }
                Err(error) => println!("  [{index}] error {error}"),
            }
        }
    }
    Ok(())
}

fn run_encode(address: &str, pieces: usize) -> Result<(), CliError> {
    let tokens = encode_address(address, pieces)?;
    if !validate(address) {
        eprintln!(
            "warning: address would not validate (checksum {}, expected {})",
            checksum(address),
            reference_checksum()
        );
    }
    print_json(&Value::from(tokens))
}

async fn run_status(config: &ClientConfig) -> Result<(), CliError> {
    let endpoint = config.resolve_endpoint();
    let api = HttpChatApi::new(&endpoint, config.timeouts)?;
    match StatusNotice::from_result(api.status().await) {
        StatusNotice::Report(report) => {
            println!("{}", render_report(&report));
            Ok(())
        }
        StatusNotice::Unavailable(reason) => Err(CliError::StatusUnavailable(reason)),
    }
}

async fn run_chat(config: ClientConfig, alias: &str) -> Result<(), CliError> {
    let (host, mut events) = ChatHost::new(config);
    let session = host.init()?;
    host.show();
    session.join(alias).await?;
    let alias = session.alias().unwrap_or_else(|| alias.trim().to_owned());
    eprintln!("joined as {alias}; type /quit to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sends = JoinSet::new();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = render_event(&event, &alias) {
                    println!("{line}");
                }
            }
            Some(_) = sends.join_next(), if !sends.is_empty() => {}
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = match classify_input(&line) {
                    ChatInput::Quit => break,
                    ChatInput::Blank => continue,
                    ChatInput::Text(text) => text.to_owned(),
                };
                let session = session.clone();
                sends.spawn(async move {
                    if let Err(error) = session.send(&text).await {
                        eprintln!("send failed: {error}");
                    }
                });
            }
        }
    }

    // Sends already typed still reach the room before leaving.
    while sends.join_next().await.is_some() {}
    host.disconnect();
    host.hide();
    while let Ok(event) = events.try_recv() {
        if let Some(line) = render_event(&event, &alias) {
            println!("{line}");
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Blank,
    Text(&'a str),
}

fn classify_input(line: &str) -> ChatInput<'_> {
    match line.trim() {
        "/quit" => ChatInput::Quit,
        "" => ChatInput::Blank,
        text => ChatInput::Text(text),
    }
}

// =============================================================================
// RENDERING
// =============================================================================

fn render_event(event: &SessionEvent, alias: &str) -> Option<String> {
    match event {
        SessionEvent::Message(message) => Some(render_message(message, alias)),
        SessionEvent::Presence(users) => Some(format!("-- {} online: {}", users.len(), users.join(", "))),
        SessionEvent::Connectivity(true) => Some("-- connected".to_owned()),
        SessionEvent::Connectivity(false) => Some("-- disconnected".to_owned()),
        SessionEvent::Status(StatusNotice::Report(report)) => Some(render_report(report)),
        SessionEvent::Status(StatusNotice::Unavailable(reason)) => Some(format!("-- status unavailable ({reason})")),
        SessionEvent::Visibility(_) => None,
    }
}

fn render_message(message: &ChatMessage, alias: &str) -> String {
    let clock = format_clock(message.timestamp);
    match message.author() {
        None => format!("[{clock}] * {}", message.body),
        Some(author) if message.is_from(alias) => format!("[{clock}] {author} (you): {}", message.body),
        Some(author) => format!("[{clock}] {author}: {}", message.body),
    }
}

fn render_report(report: &StatusReport) -> String {
    let mut out = String::from("== system status");
    match report.healthy {
        Some(true) => out.push_str(" [ok]"),
        Some(false) => out.push_str(" [issues]"),
        None => {}
    }
    for paragraph in &report.paragraphs {
        out.push('\n');
        out.push_str(paragraph);
    }
    if !report.details.is_empty() {
        out.push_str("\n--");
        for detail in &report.details {
            out.push('\n');
            out.push_str(detail);
        }
    }
    out.push_str("\nsource: ");
    out.push_str(&report.source);
    out
}

/// UTC wall-clock time of day for a Unix timestamp.
fn format_clock(secs: i64) -> String {
    let day = secs.rem_euclid(86_400);
    format!("{:02}:{:02}:{:02}", day / 3600, day % 3600 / 60, day % 60)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

use anyhow::Context;
use api_shared::{InvocationReq, SESSION_HEADER};
use clap::{ArgGroup, Parser, Subcommand};
use futures_util::StreamExt;
use kyc_core::report::ScreeningReport;
use kyc_core::writer::format_timestamp;
use kyc_core::{
    KeywordClassifier, ScreeningClassifier, ScreeningOutcome, ScreeningStatus, SseDecoder, SseEvent,
};
use serde_json::Value;
use tokio::io::AsyncReadExt;

const DEFAULT_URL: &str = "http://localhost:8080";

#[derive(Parser)]
#[command(name = "kyc")]
#[command(about = "KYC screening runtime CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a runtime is up
    Ping {
        /// Runtime base URL
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
    /// Send an invocation to a runtime and print the response
    #[command(group(ArgGroup::new("target").required(true).args(["case_id", "name", "prompt"])))]
    Invoke {
        /// Runtime base URL
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
        /// Case to screen
        #[arg(long)]
        case_id: Option<String>,
        /// Person name to screen without a case
        #[arg(long)]
        name: Option<String>,
        /// Free-text prompt
        #[arg(long)]
        prompt: Option<String>,
        /// Session id sent in the runtime session header
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Classify search text with the keyword classifier (reads stdin without FILE)
    Classify {
        /// File holding the search text
        file: Option<String>,
    },
    /// Render the markdown report for a screening outcome JSON file
    Report {
        /// Outcome JSON file, as returned in an invocation `result`
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ping { url }) => {
            let body: Value = reqwest::get(format!("{}/ping", url.trim_end_matches('/')))
                .await?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Some(Commands::Invoke {
            url,
            case_id,
            name,
            prompt,
            session_id,
        }) => {
            let req = match (case_id, name, prompt) {
                (Some(case_id), _, _) => InvocationReq::case(case_id),
                (None, Some(name), _) => InvocationReq::name(name),
                (None, None, Some(prompt)) => InvocationReq::prompt(prompt),
                (None, None, None) => anyhow::bail!("one of --case-id, --name or --prompt is required"),
            };
            invoke(&url, &req, session_id).await?;
        }
        Some(Commands::Classify { file }) => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path))?,
                None => {
                    let mut text = String::new();
                    tokio::io::stdin().read_to_string(&mut text).await?;
                    text
                }
            };
            let classification = KeywordClassifier::new().classify(&text).await;
            let outcome = ScreeningOutcome::from_classification(
                kyc_core::constants::UNKNOWN,
                kyc_core::constants::UNKNOWN,
                classification,
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Some(Commands::Report { file }) => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file))?;
            println!("{}", render_report(&text, &format_timestamp(chrono::Utc::now()))?);
        }
        None => {
            println!("Use 'kyc --help' for commands");
        }
    }

    Ok(())
}

/// Posts `req` to the runtime and prints the response as it arrives.
///
/// Event streams are printed one `data:` line at a time followed by the joined content;
/// JSON responses are pretty-printed.
async fn invoke(url: &str, req: &InvocationReq, session_id: Option<String>) -> anyhow::Result<()> {
    println!("Invoking KYC runtime at {}...", url);
    println!("Payload: {}", serde_json::to_string_pretty(req)?);

    let mut request = reqwest::Client::new()
        .post(format!("{}/invocations", url.trim_end_matches('/')))
        .json(req);
    if let Some(session_id) = session_id {
        request = request.header(SESSION_HEADER, session_id);
    }
    let response = request.send().await?;
    let status = response.status();

    let is_stream = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));

    if is_stream {
        let mut decoder = SseDecoder::default();
        let mut content = Vec::new();
        let mut body = response.bytes_stream();
        let mut done = false;
        while !done {
            let events = match body.next().await {
                Some(chunk) => decoder.push(&chunk?),
                None => {
                    done = true;
                    decoder.finish()
                }
            };
            done |= print_events(events, &mut content);
        }
        println!("\nFinal content:");
        println!("{}", content.join("\n"));
    } else {
        let body = response.text().await?;
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => {
                println!("Response:");
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            Err(e) => {
                println!("Error reading response: {}", e);
                println!("Raw response: {}", body);
            }
        }
    }

    if !status.is_success() {
        anyhow::bail!("runtime returned {}", status);
    }
    Ok(())
}

/// Prints each event's data and collects it into `content`. Returns true once `[DONE]` is seen.
fn print_events(events: Vec<SseEvent>, content: &mut Vec<String>) -> bool {
    for event in events {
        match event {
            SseEvent::Data(data) => {
                println!("{}", data);
                content.push(data);
            }
            SseEvent::Done => return true,
        }
    }
    false
}

/// Renders the report for an outcome document, normalising its status.
fn render_report(outcome_json: &str, generated_at: &str) -> anyhow::Result<String> {
    let outcome: ScreeningOutcome =
        serde_json::from_str(outcome_json).context("outcome is not a screening outcome document")?;
    let status = ScreeningStatus::normalize(&outcome.analysis_result);

    Ok(ScreeningReport {
        case_id: &outcome.case_id,
        name: &outcome.name,
        analysis_result: status.as_str(),
        analysis_summary: &outcome.analysis_summary,
        search_results_summary: &outcome.search_results_summary,
        updated_at: generated_at,
    }
    .render())
}

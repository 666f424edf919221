// crates/scavcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use scavcore::{generate_token, normalize_workflow_name, ApiKey, SchemaField, WorkflowDescriptor};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "scav")]
#[command(about = "Scavenger operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a workflow's live feed
    Connect {
        /// Workflow name
        workflow: String,

        /// Scavenger server base URL
        #[arg(short, long, env = "SCAVENGER_URL", default_value = "http://localhost:8080")]
        server: String,

        /// Client API key
        #[arg(short = 'k', long, env = "SCAVENGER_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a bootstrap file
    Validate {
        /// Path to the bootstrap JSON file
        file: PathBuf,
    },

    /// Create an example bootstrap file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflows.json")]
        output: PathBuf,
    },

    /// Generate an API key and the hash to store for it
    HashToken {
        /// Hash this token instead of generating one
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Connect {
            workflow,
            server,
            api_key,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            connect(&server, &workflow, &api_key).await?;
        }

        Commands::Validate { file } => {
            validate_bootstrap(file)?;
        }

        Commands::Init { output } => {
            create_example_bootstrap(output)?;
        }

        Commands::HashToken { token } => {
            hash_token(token)?;
        }
    }

    Ok(())
}

async fn connect(server: &str, workflow: &str, api_key: &str) -> Result<()> {
    let name = normalize_workflow_name(workflow.trim());
    let url = scavrelay::websocket_url(server, &format!("connect/{}", name))?;

    let mut request = url.as_str().into_client_request()?;
    request
        .headers_mut()
        .insert("X-API-Key", HeaderValue::from_str(api_key).context("API key is not a valid header value")?);

    println!("🔌 Connecting to {}", url);
    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("Failed to connect to workflow {}", name))?;
    println!("✅ Connected, waiting for documents (Ctrl-C to stop)");
    println!();

    let (mut sink, mut stream) = stream.split();
    let mut documents = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted, closing");
                sink.send(Message::Close(None)).await.ok();
                break;
            }
            message = stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        eprintln!("❌ Connection error: {}", e);
                        break;
                    }
                    None => break,
                };

                let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                match message {
                    Message::Text(text) => {
                        documents += 1;
                        println!("[{}] {}", now, pretty(&text));
                    }
                    Message::Binary(data) => {
                        documents += 1;
                        println!("[{}] <{} bytes>", now, data.len());
                    }
                    Message::Close(frame) => {
                        tracing::debug!(?frame, "Server closed the session");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    println!();
    println!("📊 Received {} documents", documents);
    Ok(())
}

/// Pretty-print JSON documents, pass anything else through
fn pretty(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| text.to_string())
}

fn validate_bootstrap(file: PathBuf) -> Result<()> {
    println!("🔍 Validating bootstrap file: {}", file.display());

    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let descriptors: Vec<WorkflowDescriptor> = serde_json::from_str(&raw)?;

    let mut seen = HashSet::new();
    let mut loadable = 0;
    for descriptor in descriptors {
        let name = normalize_workflow_name(&descriptor.name);
        if name.is_empty() {
            bail!("A workflow has no name");
        }
        if !seen.insert(name.clone()) {
            bail!("Workflow {} is declared more than once", name);
        }

        let fields = descriptor.schema.len();
        match descriptor.into_workflow() {
            Ok(workflow) => {
                loadable += 1;
                println!("   • {} ({} fields) → {}", workflow.name, fields, workflow.website());
            }
            Err(e) => println!("   ⚠️  {} will be skipped: {}", name, e),
        }
    }

    println!("✅ {} workflows will be created", loadable);
    Ok(())
}

fn create_example_bootstrap(output: PathBuf) -> Result<()> {
    let mut schema = BTreeMap::new();
    schema.insert(
        "debt".to_string(),
        SchemaField::new("debt", "number", "Current US national debt in dollars"),
    );
    schema.insert(
        "debt-per-citizen".to_string(),
        SchemaField::new("debt-per-citizen", "number", "National debt divided by population"),
    );

    let descriptors = vec![WorkflowDescriptor {
        name: "US Debt Clock".to_string(),
        prompt: "Extract the national debt figures from the page".to_string(),
        cron: "*/5 * * * *".to_string(),
        website: "https://www.usdebtclock.org".to_string(),
        schema,
    }];

    let json = serde_json::to_string_pretty(&descriptors)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example bootstrap file: {}", output.display());
    println!();
    println!("Use it with:");
    println!("  BOOTSTRAP_CONFIG={} scavserver", output.display());

    Ok(())
}

fn hash_token(token: Option<String>) -> Result<()> {
    let token = token.unwrap_or_else(generate_token);
    if token.trim().is_empty() {
        bail!("Token must not be empty");
    }
    let key = ApiKey::from_token(&token);

    println!("🔑 API key:    {}", token);
    println!("   Store hash: {}", serde_json::to_string(&key)?);
    Ok(())
}

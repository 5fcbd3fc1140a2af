use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use large_response::client::{HttpDereferencer, ReferenceResolver, ResolverOptions};
use large_response::protocol::HANDLE_LARGE_RESPONSE_HEADER;

#[derive(Parser)]
#[command(name = "large-response-cli")]
#[command(about = "Fetch JSON through the large-response resolver", long_about = None)]
struct Cli {
    /// Skip dereferencing, print the raw response.
    #[arg(long)]
    raw: bool,

    /// Media type advertised in Accept and matched on responses.
    #[arg(long)]
    header_flag: Option<String>,

    /// Body property carrying the payload reference.
    #[arg(long)]
    ref_property: Option<String>,

    /// JSON value used as the body when the payload cannot be fetched.
    #[arg(long)]
    error_payload: Option<String>,

    /// Log the reference before fetching it.
    #[arg(long)]
    debug: bool,

    /// Timeout for fetching the referenced payload.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a URL and print the resolved JSON body
    Get {
        url: String,

        /// Also send `handle-large-response: true`
        #[arg(long)]
        handle_413: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "large_response=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut options = ResolverOptions::new().enabled(!cli.raw);
    if cli.debug {
        options = options.debug(true);
    }
    if let Some(header_flag) = cli.header_flag {
        options = options.header_flag(header_flag);
    }
    if let Some(ref_property) = cli.ref_property {
        options = options.ref_property(ref_property);
    }
    if let Some(payload) = cli.error_payload {
        options = options.error_payload(serde_json::from_str(&payload)?);
    }
    if let Some(secs) = cli.timeout_secs {
        options = options.dereferencer(std::sync::Arc::new(
            HttpDereferencer::new(client.clone()).with_timeout(Duration::from_secs(secs)),
        ));
    }

    let resolver = ReferenceResolver::new(client.clone(), options);

    match cli.command {
        Commands::Get { url, handle_413 } => {
            let mut headers = HeaderMap::new();
            if handle_413 {
                headers.insert(
                    HeaderName::from_static(HANDLE_LARGE_RESPONSE_HEADER),
                    HeaderValue::from_static("true"),
                );
            }
            let res = resolver.send(client.get(&url).headers(headers), None).await?;
            print_response(res.status, &res.data)?;
        }
    }

    Ok(())
}

fn print_response(status: reqwest::StatusCode, data: &Value) -> Result<(), Box<dyn std::error::Error>> {
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

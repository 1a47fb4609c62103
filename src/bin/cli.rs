use clap::{Parser, Subcommand};
use reqwest::blocking::Client;
use std::time::Duration;

/// Operator CLI for the slicing controller's Control API (spec.md §4.8),
/// a Rust counterpart to `original_source/cli.py`.
#[derive(Parser, Debug)]
#[command(name = "slicectl")]
struct Args {
    #[command(subcommand)]
    action: Action,

    /// Address of the controller's REST API.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the controller's REST API.
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Activate a declared slice.
    Activate { slice: String },
    /// Deactivate an active slice.
    Deactivate { slice: String },
    /// Print the controller's current status snapshot.
    Status,
}

fn main() {
    let args = Args::parse();
    let client = Client::builder().timeout(Duration::from_secs(5)).build().expect("failed to build HTTP client");

    let result = match &args.action {
        Action::Activate { slice } => post(&client, &args, &format!("/slice/{}/activate", slice)),
        Action::Deactivate { slice } => post(&client, &args, &format!("/slice/{}/deactivate", slice)),
        Action::Status => get(&client, &args, "/slices/status"),
    };

    if let Err(e) = result {
        eprintln!("Connection error: {}", e);
        std::process::exit(1);
    }
}

fn post(client: &Client, args: &Args, path: &str) -> reqwest::Result<()> {
    let url = format!("http://{}:{}{}", args.host, args.port, path);
    let resp = client.post(&url).send()?;
    print_mutation_response(resp)
}

fn get(client: &Client, args: &Args, path: &str) -> reqwest::Result<()> {
    let url = format!("http://{}:{}{}", args.host, args.port, path);
    let resp = client.get(&url).send()?;
    print_status_response(resp)
}

fn print_mutation_response(resp: reqwest::blocking::Response) -> reqwest::Result<()> {
    let status = resp.status();
    match resp.json::<serde_json::Value>() {
        Ok(body) => {
            let message = body.get("message").and_then(|m| m.as_str()).unwrap_or("No message received.");
            if status.is_success() {
                println!("Success ({}): {}", status.as_u16(), message);
            } else {
                println!("Error ({}): {}", status.as_u16(), message);
            }
        }
        Err(_) => println!("Received non-JSON response ({})", status.as_u16()),
    }
    Ok(())
}

fn print_status_response(resp: reqwest::blocking::Response) -> reqwest::Result<()> {
    let status = resp.status();
    match resp.json::<serde_json::Value>() {
        Ok(body) => println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default()),
        Err(_) => println!("Received non-JSON response ({})", status.as_u16()),
    }
    Ok(())
}

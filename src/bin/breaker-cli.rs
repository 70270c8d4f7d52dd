use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Inspect and exercise a running circuit-breaker service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show breaker status, for one id or all registered breakers
    Status { id: Option<String> },
    /// Call the demo dependency through its breaker
    Call {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status { id } => {
            let url = match id {
                Some(id) => format!("{base}/api/status/{id}"),
                None => format!("{base}/api/status"),
            };
            let res = client.get(url).send().await?;
            print_json(res).await?;
        }
        Commands::Call { count } => {
            for i in 1..=count {
                let res = client.get(format!("{base}/api/external")).send().await?;
                let status = res.status();
                let body = res.text().await?;
                if status.is_success() {
                    println!("[{i}] {body}");
                } else {
                    eprintln!("[{i}] Error: service returned status {status}: {body}");
                }
            }
            let res = client.get(format!("{base}/api/status")).send().await?;
            print_json(res).await?;
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {status}");
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {text}");
            }
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

// webscout: run one computer-use browsing task from the command line and
// print its structured JSON result.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use webscout::Agent;

#[derive(Parser, Debug)]
#[command(name = "webscout", version, about = "Computer-use browsing agent")]
struct Cli {
    /// Natural-language task for the agent, e.g.
    /// "Find the partnership contact email and phone number as JSON"
    task: String,

    /// Page to open before the first model turn (defaults to the configured
    /// search engine)
    #[arg(long)]
    url: Option<String>,

    /// Override the configured turn budget
    #[arg(long)]
    max_turns: Option<usize>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = webscout::load_yaml_config()?;
    if cli.headed {
        config.browser.headless = false;
    }
    let max_turns = cli.max_turns.unwrap_or(config.max_turns);

    let agent = Agent::from_env(config)?;

    match agent.run_task(&cli.task, cli.url.as_deref(), max_turns).await {
        Some(result) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(result))?
            );
            Ok(())
        }
        None => {
            eprintln!("no result");
            std::process::exit(1);
        }
    }
}

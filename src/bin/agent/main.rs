use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use mcp_qa_agent::config::PLAYWRIGHT_SERVER;
use mcp_qa_agent::mcp::McpConnector;
use mcp_qa_agent::{Agent, AgentConfig, Brain, GeminiReasoner, Hands, RunResult};
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_GOAL: &str = "Go to saucedemo.com and login in with standard_user/secret_sauce";

#[derive(Debug, Parser)]
#[command(name = "agent")]
#[command(about = "LLM-driven browser QA agent over a Playwright MCP server", version)]
struct Cli {
    /// What the agent should achieve in the browser
    #[arg(env = "QA_GOAL", default_value = DEFAULT_GOAL)]
    goal: String,

    /// Enable debug logging (includes raw model output)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "mcp_qa_agent=debug,agent=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli.goal).await {
        Ok(RunResult::Pass) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Agent failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(goal: &str) -> Result<RunResult> {
    let config = AgentConfig::from_env()?;

    let brain = Brain::new(Box::new(GeminiReasoner::new(config.reasoner.clone())));
    let hands = Hands::new(
        Arc::new(McpConnector::new(config.mcp_servers.clone())),
        PLAYWRIGHT_SERVER,
    );
    let agent = Agent::new(brain, hands);

    let state = agent.run(goal).await;

    println!("Result: {}", state.result);
    println!("{}", serde_json::to_string_pretty(&state.step_history)?);

    Ok(state.result)
}

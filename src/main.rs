//! Tool Loop Agent - interactive demo entry point.
//!
//! Answers each query with a fresh run of the customer-service agent.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tool_loop_agent::{
    agent::Agent,
    config::Config,
    tools::{ToolRegistry, ToolSet},
    users::UserStore,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_QUERIES: [&str; 5] = [
    "Find all premium users with expired subscriptions",
    "Get details for john@co.com and send them a renewal reminder",
    "Cancel the subscription for jane@co.com",
    "Search for users with basic plans",
    "Find all premium users with active subscriptions and send them a thank you email",
];

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Queries to answer. Runs the demo queries when omitted.
    queries: Vec<String>,

    /// Model to use (overrides AGENT_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Iteration budget per query (overrides AGENT_MAX_ITERATIONS)
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Which tool catalogue to give the agent
    #[arg(long, value_enum, default_value = "specific")]
    tools: ToolSet,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tool_loop_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(model) = cli.model {
        config.agent.model = model;
    }
    if let Some(max_iterations) = cli.max_iterations {
        config.agent = config.agent.with_max_iterations(max_iterations);
    }

    let store = Arc::new(UserStore::new());
    let tools = ToolRegistry::for_tool_set(cli.tools, store)?;
    let agent = Agent::from_config(&config, tools)?;
    info!(
        "Loaded configuration: model={}, max_iterations={}, endpoint={}, tools={}",
        agent.config().model,
        agent.config().max_iterations,
        config.endpoint.base_url(),
        cli.tools.as_str()
    );
    for tool in agent.tools().list_tools() {
        info!("Tool available: {} - {}", tool.name, tool.description);
    }

    let queries: Vec<String> = if cli.queries.is_empty() {
        DEMO_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        cli.queries
    };

    println!("🤖 Customer Service Agent Demo");
    println!("================================\n");

    for query in &queries {
        println!("Query: {}", query);
        let response = agent.run(query).await?;
        println!("Response: {}", response);
        println!("---\n");
    }

    Ok(())
}

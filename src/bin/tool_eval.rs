//! Compare the purpose-built and generic tool sets on the evaluation cases.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tool_loop_agent::{
    agent::EVAL_SYSTEM_PROMPT,
    config::Config,
    eval::{run_experiment, test_cases, Experiment},
    llm::{LlmClient, OpenAiClient},
    tools::ToolSet,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model to use (overrides AGENT_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Cases run at the same time per experiment
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Print the full reports as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tool_loop_agent=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    let mut agent_config = config
        .agent
        .clone()
        .with_system_prompt(EVAL_SYSTEM_PROMPT);
    if let Some(model) = cli.model {
        agent_config.model = model;
    }

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        config.endpoint.api_key(),
        config.endpoint.base_url(),
    )?);
    let cases = test_cases();

    let mut experiments = Vec::new();
    for (name, tool_set) in [
        ("specific-tools", ToolSet::Specific),
        ("generic-tools", ToolSet::Generic),
    ] {
        let experiment = run_experiment(
            name,
            Arc::clone(&llm),
            &agent_config,
            tool_set,
            &cases,
            cli.concurrency,
        )
        .await?;
        experiments.push(experiment);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&experiments)?);
    } else {
        for experiment in &experiments {
            print_summary(experiment);
        }
    }

    println!("✅ Tool comparison evaluation complete!");
    Ok(())
}

fn print_summary(experiment: &Experiment) {
    println!("== {} ({}) ==", experiment.name, experiment.tool_set);
    for case in &experiment.cases {
        match &case.error {
            Some(error) => println!("  [error] {}: {}", case.input, error),
            None => println!(
                "  task={:.2} clarity={:.2} iterations={}{}  {}",
                case.task_success_value(),
                case.clarity_value(),
                case.total_iterations,
                if case.max_iterations_reached { " (max)" } else { "" },
                case.input
            ),
        }
    }
    println!(
        "  average task_success={:.2} clarity={:.2} errors={}\n",
        experiment.average_task_success(),
        experiment.average_clarity(),
        experiment.error_count()
    );
}

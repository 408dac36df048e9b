//! Tool comparison evaluation.
//!
//! Runs the same customer-service tasks against the purpose-built and the
//! generic tool sets and scores each answer for task success and clarity.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::llm::LlmClient;
use crate::tools::{RegistryError, ToolRegistry, ToolSet};
use crate::users::UserStore;

/// One evaluation task.
#[derive(Debug, Clone, Serialize)]
pub struct EvalCase {
    pub input: String,
    /// Phrases a good answer mentions (case-insensitive).
    pub success_criteria: Vec<String>,
    pub required_actions: Vec<String>,
    pub category: String,
    pub difficulty: String,
}

impl EvalCase {
    fn new(
        input: &str,
        success_criteria: &[&str],
        required_actions: &[&str],
        category: &str,
        difficulty: &str,
    ) -> Self {
        Self {
            input: input.to_string(),
            success_criteria: success_criteria.iter().map(|s| s.to_string()).collect(),
            required_actions: required_actions.iter().map(|s| s.to_string()).collect(),
            category: category.to_string(),
            difficulty: difficulty.to_string(),
        }
    }
}

/// The built-in evaluation set.
pub fn test_cases() -> Vec<EvalCase> {
    vec![
        EvalCase::new(
            "Find all premium users and notify them about a new feature launch",
            &["Found premium users", "Sent notifications to premium users", "john@co.com", "bob@co.com"],
            &["search", "notify"],
            "multi-step",
            "medium",
        ),
        EvalCase::new(
            "Check if jane@co.com is an active subscriber and what plan they have",
            &["Jane Doe", "jane@co.com", "active", "basic"],
            &["lookup"],
            "single-lookup",
            "easy",
        ),
        EvalCase::new(
            "Find users with expired subscriptions and send them renewal reminders with a special offer",
            &["expired", "Bob Wilson", "renewal", "reminder"],
            &["search", "notify"],
            "multi-step",
            "medium",
        ),
        EvalCase::new(
            "Upgrade jane@co.com to premium plan and send confirmation",
            &["upgrade", "premium", "jane@co.com", "confirmation"],
            &["update", "notify"],
            "multi-step",
            "medium",
        ),
        EvalCase::new(
            "List all active users sorted by subscription type",
            &["John Smith", "Jane Doe", "active", "premium", "basic"],
            &["search"],
            "single-lookup",
            "easy",
        ),
    ]
}

/// How many success criteria the output mentions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSuccess {
    pub score: f64,
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

/// Fraction of `criteria` found in `output`, ignoring case. `None` without criteria.
pub fn task_success_score(output: &str, criteria: &[String]) -> Option<TaskSuccess> {
    if criteria.is_empty() {
        return None;
    }

    let haystack = output.to_lowercase();
    let (found, missing): (Vec<String>, Vec<String>) = criteria
        .iter()
        .cloned()
        .partition(|c| haystack.contains(&c.to_lowercase()));

    Some(TaskSuccess {
        score: found.len() as f64 / criteria.len() as f64,
        found,
        missing,
    })
}

/// Heuristic readability signals for an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clarity {
    pub score: f64,
    pub has_structure: bool,
    pub has_confirmation: bool,
    pub is_verbose: bool,
    pub has_json: bool,
    pub has_raw_data: bool,
    pub has_error: bool,
    pub response_length: usize,
}

const RAW_DATA_MARKERS: [&str; 4] = ["query_id", "request_id", "transaction_id", "execution_time_ms"];

/// Score structure and confirmation up, raw data and errors down.
pub fn clarity_score(output: &str) -> Clarity {
    let lower = output.to_lowercase();
    let response_length = output.chars().count();

    let has_structure = output.contains('\n') || output.contains('•') || output.contains('-');
    let has_confirmation =
        output.contains('✓') || lower.contains("successfully") || lower.contains("completed");
    let is_verbose = response_length > 1000;
    let has_json = output.contains('{') && output.contains('}');
    let has_raw_data = RAW_DATA_MARKERS.iter().any(|m| output.contains(m));
    let has_error = output.contains("Error:") || lower.contains("error");

    let score = if has_structure
        && has_confirmation
        && !is_verbose
        && !has_json
        && !has_raw_data
        && !has_error
    {
        1.0
    } else if (has_structure || has_confirmation) && !has_error {
        0.7
    } else if has_json || is_verbose || has_raw_data || has_error {
        0.3
    } else {
        0.5
    };

    Clarity {
        score,
        has_structure,
        has_confirmation,
        is_verbose,
        has_json,
        has_raw_data,
        has_error,
        response_length,
    }
}

/// Result of one case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub input: String,
    pub output: Option<String>,
    /// Set when the model call failed.
    pub error: Option<String>,
    pub total_iterations: usize,
    pub max_iterations_reached: bool,
    pub task_success: Option<TaskSuccess>,
    pub clarity: Option<Clarity>,
}

impl CaseReport {
    pub fn task_success_value(&self) -> f64 {
        self.task_success.as_ref().map_or(0.0, |s| s.score)
    }

    pub fn clarity_value(&self) -> f64 {
        self.clarity.as_ref().map_or(0.0, |c| c.score)
    }
}

/// All case results for one tool set.
#[derive(Debug, Clone, Serialize)]
pub struct Experiment {
    pub name: String,
    pub tool_set: String,
    pub cases: Vec<CaseReport>,
}

impl Experiment {
    pub fn average_task_success(&self) -> f64 {
        average(self.cases.iter().map(CaseReport::task_success_value))
    }

    pub fn average_clarity(&self) -> f64 {
        average(self.cases.iter().map(CaseReport::clarity_value))
    }

    pub fn error_count(&self) -> usize {
        self.cases.iter().filter(|c| c.error.is_some()).count()
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Run every case with `tool_set`, `concurrency` cases at a time.
///
/// Each case gets its own store, so notifications and subscription changes do
/// not leak between cases. Reports keep the order of `cases`.
pub async fn run_experiment(
    name: &str,
    llm: Arc<dyn LlmClient>,
    config: &AgentConfig,
    tool_set: ToolSet,
    cases: &[EvalCase],
    concurrency: usize,
) -> Result<Experiment, RegistryError> {
    let mut agents = Vec::with_capacity(cases.len());
    for _ in cases {
        let tools = ToolRegistry::for_tool_set(tool_set, Arc::new(UserStore::new()))?;
        agents.push(Agent::new(config.clone(), Arc::clone(&llm), tools));
    }

    let reports = stream::iter(cases.iter().zip(agents.iter()))
        .map(|(case, agent)| run_case(agent, case))
        .buffered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    Ok(Experiment {
        name: name.to_string(),
        tool_set: tool_set.as_str().to_string(),
        cases: reports,
    })
}

async fn run_case(agent: &Agent, case: &EvalCase) -> CaseReport {
    match agent.run_with_metrics(&case.input).await {
        Ok(result) => CaseReport {
            input: case.input.clone(),
            task_success: task_success_score(&result.output, &case.success_criteria),
            clarity: Some(clarity_score(&result.output)),
            output: Some(result.output),
            error: None,
            total_iterations: result.total_iterations,
            max_iterations_reached: result.max_iterations_reached,
        },
        Err(e) => {
            tracing::warn!(input = %case.input, error = %e, "evaluation case failed");
            CaseReport {
                input: case.input.clone(),
                output: None,
                error: Some(e.to_string()),
                total_iterations: 0,
                max_iterations_reached: false,
                task_success: None,
                clarity: None,
            }
        }
    }
}

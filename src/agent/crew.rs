//! Sequential crew of role agents.
//!
//! One crew run is one attempt of the retry loop: every role's task runs
//! in order against the same backend, then a synthesis step combines the
//! results and the Finance Guardian turns that report into an optimization
//! plan. Any failed call fails the whole run.

use crate::agent::llm::{ChatMessage, Completion};
use crate::agent::roles::{self, OPTIMIZATION_TITLE, SYNTHESIS_SYSTEM_PROMPT};
use crate::models::{AgentRole, CrewOutput, TaskOutput};
use crate::resilience::{AttemptError, Backend, Job};
use futures::future::BoxFuture;
use futures::FutureExt;
use indicatif::ProgressBar;
use tracing::{debug, info};

/// Inputs shared by every task of a run.
#[derive(Debug, Clone)]
pub struct CrewBrief {
    /// Dataset path as shown to the agents.
    pub dataset_path: String,
    /// Dataset summary text.
    pub dataset_context: String,
    pub query: String,
}

/// The analytics crew.
pub struct AnalyticsCrew<C> {
    client: C,
    brief: CrewBrief,
    progress: Option<ProgressBar>,
}

impl<C: Completion> AnalyticsCrew<C> {
    pub fn new(client: C, brief: CrewBrief) -> Self {
        Self {
            client,
            brief,
            progress: None,
        }
    }

    /// Report each task on a progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run all tasks against `backend`.
    pub async fn kickoff(&self, backend: &Backend) -> Result<CrewOutput, AttemptError> {
        info!("Crew kickoff on {}", backend);
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(AgentRole::ALL.len());

        for role in AgentRole::ALL {
            let profile = roles::profile(role);
            self.set_progress(format!("{} {} working ({})", role.emoji(), role, backend));

            let messages = [
                ChatMessage::system(roles::system_prompt(&profile)),
                ChatMessage::user(roles::task_prompt(
                    &profile,
                    &self.brief.dataset_path,
                    &self.brief.dataset_context,
                    &self.brief.query,
                    &outputs,
                )),
            ];

            let content = self.client.complete(backend, &messages).await?;
            debug!("{} returned {} characters", role, content.len());

            outputs.push(TaskOutput {
                role,
                title: profile.task_title.to_string(),
                content,
            });
        }

        self.set_progress(format!("📝 Writing business report ({})", backend));
        let messages = [
            ChatMessage::system(SYNTHESIS_SYSTEM_PROMPT),
            ChatMessage::user(roles::synthesis_prompt(
                &self.brief.query,
                &self.brief.dataset_context,
                &outputs,
            )),
        ];
        let summary = self.client.complete(backend, &messages).await?;

        let planner = roles::profile(AgentRole::FinanceGuardian);
        self.set_progress(format!("🗺️ Drafting {} ({})", OPTIMIZATION_TITLE, backend));
        let messages = [
            ChatMessage::system(roles::system_prompt(&planner)),
            ChatMessage::user(roles::optimization_prompt(&self.brief.query, &summary)),
        ];
        let optimization = self.client.complete(backend, &messages).await?;

        info!("Crew finished {} tasks on {}", outputs.len() + 2, backend);
        Ok(CrewOutput {
            tasks: outputs,
            summary,
            optimization,
        })
    }

    fn set_progress(&self, message: String) {
        if let Some(ref progress) = self.progress {
            progress.set_message(message);
        }
    }
}

impl<C: Completion> Job for AnalyticsCrew<C> {
    type Output = CrewOutput;

    fn attempt(&mut self, backend: Backend) -> BoxFuture<'_, Result<CrewOutput, AttemptError>> {
        async move { self.kickoff(&backend).await }.boxed()
    }
}

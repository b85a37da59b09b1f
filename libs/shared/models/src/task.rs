use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The lifecycle state of a DPP discovery task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// The step a DPP workflow is currently executing or failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DppStep {
    Parsing,
    DiscoveringBpn,
    RetrievingTwin,
    LookingUpSubmodel,
    ConsumingData,
    Complete,
}

impl DppStep {
    /// The progress percentage this step reports on entry.
    pub fn progress(self) -> u8 {
        match self {
            DppStep::Parsing => 10,
            DppStep::DiscoveringBpn => 25,
            DppStep::RetrievingTwin => 50,
            DppStep::LookingUpSubmodel => 70,
            DppStep::ConsumingData => 85,
            DppStep::Complete => 100,
        }
    }
}

/// A snapshot of a DPP discovery task, as returned by a status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DppTask {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub step: DppStep,
    pub message: String,
    pub progress: u8,
    pub digital_twin: Option<Value>,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DppTask {
    pub fn new(task_id: Uuid) -> Self {
        let step = DppStep::Parsing;
        Self {
            task_id,
            status: TaskStatus::InProgress,
            step,
            message: "Parsing digital product identifier".to_string(),
            progress: step.progress(),
            digital_twin: None,
            data: None,
            error: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Advances the task to `step`, never decreasing `progress`.
    pub fn advance(&mut self, step: DppStep, message: impl Into<String>) {
        let next_progress = step.progress();
        self.step = step;
        self.message = message.into();
        self.progress = self.progress.max(next_progress);
    }

    pub fn complete(&mut self, digital_twin: Value, data: Value) {
        self.advance(DppStep::Complete, "Digital product passport retrieved");
        self.status = TaskStatus::Completed;
        self.digital_twin = Some(digital_twin);
        self.data = Some(data);
    }

    /// Marks the task failed, preserving the step at which failure occurred.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }
}

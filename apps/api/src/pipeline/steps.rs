use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Idle,
    Loading,
    Reviewing,
    Completed,
    Error,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    Research,
    Review,
    Synthesis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisStep {
    pub id: StepId,
    pub label: &'static str,
    pub status: StepStatus,
}

/// Progress of one run, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StepBoard {
    steps: Vec<AnalysisStep>,
}

impl Default for StepBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StepBoard {
    pub fn new() -> Self {
        let step = |id, label| AnalysisStep {
            id,
            label,
            status: StepStatus::Idle,
        };
        Self {
            steps: vec![
                step(StepId::Research, "Parallel Research"),
                step(StepId::Review, "Review & Format"),
                step(StepId::Synthesis, "Strategy Synthesis"),
            ],
        }
    }

    pub fn set(&mut self, id: StepId, status: StepStatus) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == id) {
            step.status = status;
        }
    }

    pub fn status(&self, id: StepId) -> StepStatus {
        self.steps
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.status)
            .unwrap_or(StepStatus::Idle)
    }

    /// LOADING → PAUSED; every other status is left alone.
    pub fn pause_loading(&mut self) {
        for step in &mut self.steps {
            if step.status == StepStatus::Loading {
                step.status = StepStatus::Paused;
            }
        }
    }

    pub fn steps(&self) -> &[AnalysisStep] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_only_touches_loading() {
        let mut board = StepBoard::new();
        board.set(StepId::Research, StepStatus::Completed);
        board.set(StepId::Review, StepStatus::Loading);

        board.pause_loading();

        assert_eq!(board.status(StepId::Research), StepStatus::Completed);
        assert_eq!(board.status(StepId::Review), StepStatus::Paused);
        assert_eq!(board.status(StepId::Synthesis), StepStatus::Idle);
        assert!(board.steps().iter().all(|s| s.status != StepStatus::Loading));
    }

    #[test]
    fn test_serializes_as_list() {
        let value = serde_json::to_value(StepBoard::new()).unwrap();
        assert_eq!(value[0]["id"], "research");
        assert_eq!(value[2]["status"], "IDLE");
    }
}

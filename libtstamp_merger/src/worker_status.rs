/// What a worker is doing with its current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerStage {
    #[default]
    Correlating,
    Draining,
    Finished,
    Failed,
}

impl WorkerStage {
    /// Color name for progress displays
    pub fn bar_color(&self) -> &'static str {
        match self {
            Self::Correlating => "cyan",
            Self::Draining => "magenta",
            Self::Finished => "green",
            Self::Failed => "red",
        }
    }
}

impl std::fmt::Display for WorkerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Correlating => write!(f, "Correlating"),
            Self::Draining => write!(f, "Draining"),
            Self::Finished => write!(f, "Finished"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress report sent from a worker to the front end
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub stage: WorkerStage,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, stage: WorkerStage) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            stage,
        }
    }
}

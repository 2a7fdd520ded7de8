#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreloadPriority {
    /// On screen now; fetched in parallel and awaited.
    Critical,
    /// Next spread; fetched one at a time.
    High,
    Low,
    Idle,
}

impl PreloadPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Low => "low",
            Self::Idle => "idle",
        }
    }

    pub(crate) fn is_queued(self) -> bool {
        matches!(self, Self::Low | Self::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreloadStatus {
    Pending,
    Loading,
    Loaded,
    Error,
}

impl PreloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Loaded | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTask {
    pub url: String,
    pub priority: PreloadPriority,
    pub status: PreloadStatus,
}

impl PreloadTask {
    pub fn new(url: impl Into<String>, priority: PreloadPriority) -> Self {
        Self {
            url: url.into(),
            priority,
            status: PreloadStatus::Pending,
        }
    }

    pub(crate) fn start(&mut self) -> bool {
        if self.status != PreloadStatus::Pending {
            return false;
        }
        self.status = PreloadStatus::Loading;
        true
    }

    pub(crate) fn finish(&mut self, loaded: bool) -> bool {
        if self.status != PreloadStatus::Loading {
            return false;
        }
        self.status = if loaded {
            PreloadStatus::Loaded
        } else {
            PreloadStatus::Error
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{PreloadPriority, PreloadStatus, PreloadTask};

    #[test]
    fn task_moves_forward_only() {
        let mut task = PreloadTask::new("a.png", PreloadPriority::High);
        assert!(!task.finish(true));
        assert!(task.start());
        assert!(!task.start());
        assert!(task.finish(false));
        assert_eq!(task.status, PreloadStatus::Error);
        assert!(task.status.is_terminal());
        assert!(!task.finish(true));
        assert_eq!(task.status, PreloadStatus::Error);
    }

    #[test]
    fn only_low_and_idle_go_through_the_queue() {
        assert!(!PreloadPriority::Critical.is_queued());
        assert!(!PreloadPriority::High.is_queued());
        assert!(PreloadPriority::Low.is_queued());
        assert!(PreloadPriority::Idle.is_queued());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::generation::GenerationReport;

/// Rolling history of generation reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Most recent reports, oldest first.
    pub reports: VecDeque<GenerationReport>,
    /// Report with the highest best fitness seen so far
    pub best_ever: Option<GenerationReport>,
    /// Maximum number of reports to keep
    pub max_history: usize,
}

impl Default for GenerationStats {
    fn default() -> Self {
        Self::new(100)
    }
}

impl GenerationStats {
    /// Creates an empty history keeping at most `max_history` reports.
    pub fn new(max_history: usize) -> Self {
        Self {
            reports: VecDeque::with_capacity(max_history),
            best_ever: None,
            max_history,
        }
    }

    /// Record a generation boundary
    pub fn record(&mut self, report: GenerationReport) {
        if self
            .best_ever
            .is_none_or(|best| report.best_fitness > best.best_fitness)
        {
            self.best_ever = Some(report);
        }

        self.reports.push_back(report);
        if self.reports.len() > self.max_history {
            self.reports.pop_front();
        }
    }

    /// Most recent report
    pub fn latest(&self) -> Option<&GenerationReport> {
        self.reports.back()
    }

    /// Average of the per-generation mean fitness over the kept history
    pub fn avg_fitness(&self) -> f64 {
        if self.reports.is_empty() {
            0.0
        } else {
            self.reports.iter().map(|r| r.avg_fitness).sum::<f64>() / self.reports.len() as f64
        }
    }

    /// Whether the latest mean fitness beats the oldest kept one
    pub fn is_improving(&self) -> bool {
        match (self.reports.front(), self.reports.back()) {
            (Some(first), Some(last)) if self.reports.len() > 1 => {
                last.avg_fitness > first.avg_fitness
            }
            _ => false,
        }
    }

    /// Number of reports kept
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether no generation has finished yet
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

//! Per-tick reports and accumulated run statistics

use log::info;

use super::world::SimWorld;

/// What happened during one committed tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Tick number after the commit
    pub tick: u64,
    pub requests: usize,
    /// Vehicles that switched lanes at commit
    pub lane_changes: usize,
    pub vetoes: usize,
    pub yields: usize,
    pub committed: usize,
}

/// Totals over a run of ticks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    pub ticks: u64,
    pub total_requests: usize,
    pub total_lane_changes: usize,
    pub total_vetoes: usize,
    pub total_yields: usize,
    /// Mean committed speed after the last recorded tick
    pub mean_speed: Option<f64>,
    /// Smallest same-lane gap seen after any recorded tick
    pub min_gap: Option<f64>,
}

impl SimStats {
    pub fn record(&mut self, report: &StepReport, world: &SimWorld) {
        self.ticks += 1;
        self.total_requests += report.requests;
        self.total_lane_changes += report.lane_changes;
        self.total_vetoes += report.vetoes;
        self.total_yields += report.yields;
        self.mean_speed = world.mean_speed();

        if let Some(gap) = world.min_same_lane_gap() {
            self.min_gap = Some(self.min_gap.map_or(gap, |min| min.min(gap)));
        }
    }

    pub fn log_summary(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Ticks: {}", self.ticks);
        info!("Total requests: {}", self.total_requests);
        info!("Total lane changes: {}", self.total_lane_changes);
        info!("Total vetoes: {}", self.total_vetoes);
        info!("Total yields: {}", self.total_yields);
        info!(
            "Mean speed: {}",
            self.mean_speed
                .map(|speed| format!("{:.2}", speed))
                .unwrap_or_else(|| "-".to_string())
        );
        info!(
            "Minimum gap: {}",
            self.min_gap
                .map(|gap| format!("{:.2}", gap))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

// Overview statistics models
use serde::{Deserialize, Serialize};

use super::Discipline;

/// Aggregates across all persisted batches, cached in the store and
/// recomputed on every mutating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_processed: u32,
    /// `ok / total` across all batches; 0 when nothing was processed.
    pub success_rate: f64,
    pub avg_duration_sec: u32,
    /// Fixed three-way tally, in `Discipline::ALL` order.
    pub by_discipline: Vec<DisciplineCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisciplineCount {
    pub name: Discipline,
    pub count: u32,
}

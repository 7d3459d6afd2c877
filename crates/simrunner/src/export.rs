//! Result export utilities: JSON for the full aggregate, CSV for the
//! per-slot capacity adjustment table. Mirrors the teacher's export module
//! shape (one function per format, writing directly to a path).

use std::fs::File;
use std::path::Path;

use campus_ride_core::monte_carlo::SimulationSummary;

/// Writes the full [`SimulationSummary`] as pretty-printed JSON.
pub fn export_summary_to_json(
    summary: &SimulationSummary,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

/// Writes the `suggestedCapacityAdjustments` table as CSV — one row per
/// slot whose late-rate across runs exceeded the threshold.
pub fn export_capacity_adjustments_to_csv(
    summary: &SimulationSummary,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(["slot_arrival_start_minute", "current_non_premium", "suggested_non_premium"])?;
    for adjustment in &summary.suggested_capacity_adjustments {
        wtr.write_record([
            adjustment.slot_id_arrival_start_minute.to_string(),
            adjustment.current_non_premium.to_string(),
            adjustment.suggested_non_premium.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_ride_core::monte_carlo::CapacityAdjustment;
    use tempfile::NamedTempFile;

    fn sample_summary() -> SimulationSummary {
        SimulationSummary {
            run_count: 100,
            premium_on_time_rate: 0.992,
            non_premium_on_time_rate: 0.91,
            premium_p95_rate: 0.98,
            non_premium_p95_rate: 0.85,
            premium_worst_run_rate: 0.95,
            non_premium_worst_run_rate: 0.8,
            max_lateness_minutes: 17.0,
            avg_max_lateness_minutes: 9.5,
            recommendations: vec!["reduce non-premium capacity in hot hours".to_string()],
            suggested_capacity_adjustments: vec![CapacityAdjustment {
                slot_id_arrival_start_minute: 16 * 60,
                current_non_premium: 4,
                suggested_non_premium: 2,
            }],
        }
    }

    #[test]
    fn json_export_round_trips_through_serde() {
        let summary = sample_summary();
        let file = NamedTempFile::new().unwrap();
        export_summary_to_json(&summary, file.path()).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.contains("non_premium_on_time_rate"));
    }

    #[test]
    fn csv_export_writes_one_row_per_adjustment() {
        let summary = sample_summary();
        let file = NamedTempFile::new().unwrap();
        export_capacity_adjustments_to_csv(&summary, file.path()).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}

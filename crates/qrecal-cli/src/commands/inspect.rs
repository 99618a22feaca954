//! `qrecal inspect`: summarize a recalibration report.

use std::path::Path;

use anyhow::Result;
use qrecal_core::{
    MAX_RECALIBRATED_Q_SCORE, QuantizationLevels, RecalibrationReport, TableFingerprint,
};

/// Run the inspect command.
pub fn run(report_path: &str, quantize: Option<i32>) -> Result<()> {
    let report = RecalibrationReport::from_path(Path::new(report_path))?;
    let levels = QuantizationLevels::from_arg(quantize);
    let table = report.quantization().resolve(levels);
    let counts = report.counts();
    let fingerprint = TableFingerprint::compute(report.tables(), &table, MAX_RECALIBRATED_Q_SCORE);

    println!("Report: {report_path}");
    println!("  Covariates:  {}", report.covariates().join(", "));
    println!("  Read groups: {}", report.read_groups().join(", "));
    println!("  Table set:   {fingerprint}");
    println!();
    println!("  {:<16} {:>10}", "Table", "Cells");
    println!("  {}", "-".repeat(27));
    println!("  {:<16} {:>10}", "read group", counts.read_group);
    println!("  {:<16} {:>10}", "quality score", counts.quality_score);
    println!("  {:<16} {:>10}", "covariate", counts.covariate);

    println!();
    println!(
        "Quantization: {levels} ({} output levels, report native {})",
        table.levels(),
        report.quantization().native_levels()
    );
    for (start, end, q) in buckets(table.as_slice()) {
        let observed: u64 = report.quantization().histogram()[start..=end].iter().sum();
        println!("  Q{start:>2}..=Q{end:<2} -> Q{q:<2}  {observed:>12} obs");
    }
    Ok(())
}

/// Collapse a map into `(first quality, last quality, output)` runs.
fn buckets(map: &[u8]) -> Vec<(usize, usize, u8)> {
    let mut out: Vec<(usize, usize, u8)> = Vec::new();
    for (q, &v) in map.iter().enumerate() {
        match out.last_mut() {
            Some(last) if last.2 == v => last.1 = q,
            _ => out.push((q, q, v)),
        }
    }
    out
}

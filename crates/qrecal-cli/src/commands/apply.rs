//! `qrecal apply`: recalibrate JSON-lines reads.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use qrecal_core::{BaseRecalibrator, Read};

use super::load_config;

pub struct ApplyCommandConfig<'a> {
    pub report_path: &'a str,
    pub input_path: &'a str,
    pub output_path: Option<&'a str>,
    pub quantize: Option<i32>,
    pub threads: Option<usize>,
    pub batch_size: usize,
    pub config_path: Option<&'a str>,
    pub max_read_length: Option<usize>,
}

/// Run the apply command.
pub fn run(cfg: ApplyCommandConfig<'_>) -> Result<()> {
    let config = load_config(cfg.config_path, cfg.quantize, cfg.max_read_length)?;
    let recal = BaseRecalibrator::from_report_path(Path::new(cfg.report_path), config)
        .with_context(|| format!("loading report {}", cfg.report_path))?;

    let threads = cfg.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    if threads == 0 || cfg.batch_size == 0 {
        bail!("--threads and --batch-size must be positive");
    }

    let input = File::open(cfg.input_path)
        .with_context(|| format!("opening {}", cfg.input_path))?;
    let mut lines = BufReader::new(input).lines();

    let mut out: Box<dyn Write> = match cfg.output_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {path}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    // Stop submitting batches on Ctrl+C; the batch in flight finishes.
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")?;

    let start = Instant::now();
    let mut total = 0usize;
    let mut line_no = 0usize;
    loop {
        if !running.load(Ordering::SeqCst) {
            log::warn!("interrupted after {total} reads");
            break;
        }

        let mut batch = Vec::with_capacity(cfg.batch_size);
        for line in lines.by_ref() {
            line_no += 1;
            let line = line.with_context(|| format!("reading {}", cfg.input_path))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut read: Read = serde_json::from_str(&line)
                .with_context(|| format!("{}:{line_no}: invalid read", cfg.input_path))?;
            read.fill_default_indel_qualities();
            batch.push(read);
            if batch.len() == cfg.batch_size {
                break;
            }
        }
        if batch.is_empty() {
            break;
        }

        recalibrate_batch(&recal, &mut batch, threads)?;
        for read in &batch {
            serde_json::to_writer(&mut out, read)?;
            out.write_all(b"\n")?;
        }
        total += batch.len();
        log::debug!("recalibrated {total} reads");
    }
    out.flush()?;

    let stats = recal.cache_stats();
    eprintln!(
        "Recalibrated {total} reads in {:.2}s ({threads} threads)",
        start.elapsed().as_secs_f64()
    );
    eprintln!(
        "  Cache: {} entries, {} hits, {} misses ({:.1}% hit rate)",
        stats.entries,
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
    Ok(())
}

/// Recalibrate a batch in place across scoped worker threads.
///
/// The first failing read aborts the batch.
fn recalibrate_batch(recal: &BaseRecalibrator, batch: &mut [Read], threads: usize) -> Result<()> {
    let chunk = batch.len().div_ceil(threads).max(1);
    std::thread::scope(|s| {
        let handles: Vec<_> = batch
            .chunks_mut(chunk)
            .map(|reads| {
                s.spawn(move || -> qrecal_core::Result<()> {
                    for read in reads {
                        recal.recalibrate_read(read)?;
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => bail!("recalibration worker panicked"),
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrecal_core::{
        CovariateExtractor, CovariateKey, EventModel, QuantizationTable, RecalibrationConfig,
        RecalibrationTables,
    };

    struct QualityOnly;

    impl CovariateExtractor for QualityOnly {
        fn covariate_count(&self) -> usize {
            2
        }

        fn extract(&self, read: &Read, event: EventModel) -> qrecal_core::Result<Vec<CovariateKey>> {
            Ok(read
                .qualities(event)
                .iter()
                .map(|&q| CovariateKey::from(vec![0, i32::from(q)]))
                .collect())
        }
    }

    fn recalibrator(max_read_length: usize) -> BaseRecalibrator {
        let mut b = RecalibrationTables::builder();
        b.insert_read_group(
            0,
            EventModel::Substitution,
            qrecal_core::EmpiricalDatum::new(25.0, 30.0, 100),
        );
        BaseRecalibrator::new(
            Arc::new(b.build()),
            QuantizationTable::identity(),
            Box::new(QualityOnly),
            RecalibrationConfig {
                max_read_length,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_batch_preserves_order_across_threads() {
        let recal = recalibrator(100);
        let mut batch: Vec<Read> = (0..37)
            .map(|i| Read::new(format!("r{i}"), "RG1", "ACGT", vec![10 + i as u8; 4]))
            .collect();
        recalibrate_batch(&recal, &mut batch, 4).unwrap();
        for (i, read) in batch.iter().enumerate() {
            assert_eq!(read.name, format!("r{i}"));
            assert_eq!(read.base_qualities, vec![5 + i as u8; 4]);
        }
    }

    #[test]
    fn test_batch_error_propagates() {
        let recal = recalibrator(3);
        let mut batch = vec![
            Read::new("ok", "RG1", "ACG", vec![30; 3]),
            Read::new("long", "RG1", "ACGT", vec![30; 4]),
        ];
        let err = recalibrate_batch(&recal, &mut batch, 2).unwrap_err();
        assert!(err.to_string().contains("long"));
    }
}

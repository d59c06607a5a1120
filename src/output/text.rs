//! Human-readable text output

use crate::stats::{Report, BAR_WIDTH};
use std::fmt::Write;

/// Bar glyph used by the response time histogram
pub const BAR_CHAR: char = '∎';

/// Print a finished report to stdout
pub fn print_report(report: &Report) {
    print!("{}", render_report(report));
}

/// Render a finished report
///
/// Sections, in order:
/// - Summary (or "no data" when nothing succeeded)
/// - Response time histogram
/// - Latency percentiles
/// - 10ms latency distribution
/// - Per-second time series
/// - Error distribution, most frequent first
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &Report) -> std::fmt::Result {
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out, "                    BENCHMARK RESULTS")?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out)?;

    let Some(summary) = report.summary() else {
        writeln!(out, "Summary:")?;
        writeln!(out, "  no data")?;
        writeln!(out, "  Total:\t{:.4} secs.", report.total().as_secs_f64())?;
        write_errors(out, report)?;
        return Ok(());
    };

    writeln!(out, "Summary:")?;
    writeln!(out, "  Total:\t{:.4} secs.", summary.total.as_secs_f64())?;
    writeln!(out, "  Requests:\t{}", summary.count)?;
    writeln!(out, "  Slowest:\t{:.4} secs.", summary.slowest)?;
    writeln!(out, "  Fastest:\t{:.4} secs.", summary.fastest)?;
    writeln!(out, "  Average:\t{:.4} secs.", summary.average)?;
    writeln!(out, "  Stddev:\t{:.4} secs.", summary.stddev)?;
    writeln!(out, "  Requests/sec:\t{:.4}", summary.requests_per_sec)?;
    writeln!(out)?;

    if let Some(histogram) = report.histogram() {
        writeln!(out, "Response time histogram:")?;
        for bucket in &histogram.buckets {
            let bar: String = std::iter::repeat(BAR_CHAR)
                .take(histogram.bar_len(bucket.count))
                .collect();
            writeln!(out, "  {:.3} [{}]\t|{}", bucket.mark, bucket.count, bar)?;
        }
        writeln!(out)?;
    }

    let percentiles = report.percentiles();
    if !percentiles.is_empty() {
        writeln!(out, "Latency distribution:")?;
        for p in &percentiles {
            writeln!(out, "  {}% in {:.4} secs.", p.target, p.latency)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "Latency (10ms buckets):")?;
    for bucket in report.distribution() {
        writeln!(out, "  {:>6} ms: {}", bucket.lower_ms, bucket.count)?;
    }
    writeln!(out)?;

    let series = report.time_series();
    if !series.is_empty() {
        writeln!(out, "Time series ({} seconds, max bar {} chars):", series.points().len(), BAR_WIDTH)?;
        let peak = series.points().iter().map(|p| p.throughput).max().unwrap_or(0);
        for p in series.points() {
            let len = if peak > 0 {
                (p.throughput as usize) * BAR_WIDTH / peak as usize
            } else {
                0
            };
            let bar: String = std::iter::repeat(BAR_CHAR).take(len).collect();
            writeln!(
                out,
                "  {} {:>8} req/s  avg {:>9.3} ms |{}",
                p.unix_second,
                p.throughput,
                p.avg_latency.as_secs_f64() * 1000.0,
                bar
            )?;
        }
        writeln!(out)?;
    }

    write_errors(out, report)
}

fn write_errors(out: &mut String, report: &Report) -> std::fmt::Result {
    let errors = report.errors_by_frequency();
    if errors.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Error distribution:")?;
    for (error, count) in errors {
        writeln!(out, "  [{}]\t{}", count, error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::aggregator::StatisticsAggregator;
    use crate::stats::Outcome;
    use chrono::Utc;
    use std::time::Duration;

    fn success(ms: u64) -> Outcome {
        Outcome::Success {
            latency: Duration::from_millis(ms),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_full_report() {
        let mut outcomes: Vec<Outcome> = (1..=50).map(success).collect();
        outcomes.push(Outcome::Failure {
            error: "etcdserver: request timed out".to_string(),
        });
        let report = StatisticsAggregator::aggregate(outcomes);

        let text = render_report(&report);
        assert!(text.contains("Summary:"));
        assert!(text.contains("Slowest:\t0.0500 secs."));
        assert!(text.contains("Fastest:\t0.0010 secs."));
        assert!(text.contains("Response time histogram:"));
        assert!(text.contains("Latency distribution:"));
        assert!(text.contains("50% in "));
        assert!(text.contains("Latency (10ms buckets):"));
        assert!(text.contains("[1]\tetcdserver: request timed out"));

        let full_bar: String = std::iter::repeat(BAR_CHAR).take(BAR_WIDTH).collect();
        assert!(text.contains(&full_bar));
    }

    #[test]
    fn test_render_no_data() {
        let report = StatisticsAggregator::aggregate(vec![
            Outcome::Failure {
                error: "connection refused".to_string(),
            },
            Outcome::Failure {
                error: "connection refused".to_string(),
            },
        ]);

        let text = render_report(&report);
        assert!(text.contains("no data"));
        assert!(!text.contains("Response time histogram:"));
        assert!(text.contains("[2]\tconnection refused"));
    }
}

//! Report output — README section, JSON and CSV.
//!
//! The README section lives between `<!-- SCREENER:START -->` and
//! `<!-- SCREENER:END -->`. Everything outside the markers is preserved, and
//! re-rendering the same report gives the same file. A README without markers
//! gets the section appended; a missing README is created.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use screenlab_core::domain::{ScreenResult, Stage};

use crate::screen::ScreenReport;

pub const START_MARKER: &str = "<!-- SCREENER:START -->";
pub const END_MARKER: &str = "<!-- SCREENER:END -->";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV output: {0}")]
    CsvFlush(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ─── README section ─────────────────────────────────────────────────

/// Markdown section for a report, without markers.
pub fn render_section(report: &ScreenReport) -> String {
    let mut out = String::from("## Screener Results\n\n");
    out.push_str(&format!(
        "Last run: {}\n\n",
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if report.results.is_empty() {
        out.push_str("No stocks passed the screen on this date.\n");
    } else {
        out.push_str("| Ticker | RS | Price | Off High | Sales Growth | EPS Growth | ROE | D/E |\n");
        out.push_str("|:------:|---:|------:|---------:|-------------:|-----------:|----:|----:|\n");
        for r in &report.results {
            out.push_str(&table_row(r));
        }
    }

    let funnel: Vec<String> = report
        .stage_summaries
        .iter()
        .map(|s| format!("{}: {}/{} passed", s.stage, s.passed, s.input))
        .collect();
    if !funnel.is_empty() {
        out.push_str(&format!("\nFunnel: {}\n", funnel.join(", ")));
    }
    if report.fundamentals_halted {
        out.push_str("\nFundamentals provider rate-limited the run; some survivors were not scored.\n");
    }
    if report.has_synthetic {
        out.push_str("\n**Synthetic price data was used. These results are not real.**\n");
    }
    out
}

fn table_row(r: &ScreenResult) -> String {
    let t = &r.technical;
    match &r.fundamental {
        Some(f) => format!(
            "| {} | {} | {:.2} | {:.2}% | {:.1}% | {:.1}% | {:.2}% | {:.2} |\n",
            r.ticker, t.rs_rating, t.price, t.pct_off_high, f.sales_growth_now, f.eps_growth_now, f.roe, f.debt_to_equity
        ),
        None => format!(
            "| {} | {} | {:.2} | {:.2}% | - | - | - | - |\n",
            r.ticker, t.rs_rating, t.price, t.pct_off_high
        ),
    }
}

/// Replace the marked section of `existing`, or append one.
pub fn splice_section(existing: &str, section: &str) -> String {
    let block = format!("{START_MARKER}\n{}\n{END_MARKER}", section.trim_end());
    match (existing.find(START_MARKER), existing.find(END_MARKER)) {
        (Some(start), Some(end)) if start < end => {
            let after = end + END_MARKER.len();
            format!("{}{block}{}", &existing[..start], &existing[after..])
        }
        _ if existing.is_empty() => format!("{block}\n"),
        _ => {
            let separator = if existing.ends_with('\n') { "\n" } else { "\n\n" };
            format!("{existing}{separator}{block}\n")
        }
    }
}

/// Write the report section into the README at `path`.
pub fn update_readme(path: &Path, report: &ScreenReport) -> Result<(), ReportError> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_error(path)(e)),
    };
    let updated = splice_section(&existing, &render_section(report));
    std::fs::write(path, updated).map_err(io_error(path))?;
    info!(path = %path.display(), qualifiers = report.results.len(), "README updated");
    Ok(())
}

// ─── JSON / CSV ─────────────────────────────────────────────────────

pub fn results_json(report: &ScreenReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One row per qualifier; fundamental columns are empty for technical-only records.
pub fn results_csv(results: &[ScreenResult]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "stage",
        "rs_rating",
        "price",
        "sma50",
        "sma150",
        "sma200",
        "high_52w",
        "low_52w",
        "pct_off_high",
        "roe",
        "debt_to_equity",
        "sales_growth_now",
        "sales_growth_prev",
        "eps_growth_now",
        "eps_growth_prev",
        "npm_now",
        "npm_prev",
    ])?;

    for r in results {
        let t = &r.technical;
        let stage = if r.fundamental_pass { Stage::Fundamental } else { Stage::Technical };
        let mut row = vec![
            r.ticker.clone(),
            stage.to_string(),
            t.rs_rating.to_string(),
            format!("{:.4}", t.price),
            format!("{:.4}", t.sma50),
            format!("{:.4}", t.sma150),
            format!("{:.4}", t.sma200),
            format!("{:.4}", t.high_52w),
            format!("{:.4}", t.low_52w),
            t.pct_off_high.to_string(),
        ];
        match &r.fundamental {
            Some(f) => row.extend(
                [
                    f.roe,
                    f.debt_to_equity,
                    f.sales_growth_now,
                    f.sales_growth_prev,
                    f.eps_growth_now,
                    f.eps_growth_prev,
                    f.npm_now,
                    f.npm_prev,
                ]
                .iter()
                .map(|v| v.to_string()),
            ),
            None => row.extend(std::iter::repeat(String::new()).take(8)),
        }
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().map_err(|e| ReportError::CsvFlush(e.to_string()))?;
    String::from_utf8(data).map_err(|e| ReportError::CsvFlush(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// Write `results.json` and `results.csv` into `output_dir`.
pub fn write_artifacts(output_dir: &Path, report: &ScreenReport) -> Result<ReportPaths, ReportError> {
    std::fs::create_dir_all(output_dir).map_err(io_error(output_dir))?;
    let paths = ReportPaths {
        json: output_dir.join("results.json"),
        csv: output_dir.join("results.csv"),
    };
    std::fs::write(&paths.json, results_json(report)?).map_err(io_error(&paths.json))?;
    std::fs::write(&paths.csv, results_csv(&report.results)?).map_err(io_error(&paths.csv))?;
    info!(dir = %output_dir.display(), "result artifacts written");
    Ok(paths)
}

//! Report rendering for verification and correction runs.

use anyhow::Result;
use conform_core::{
    offset_for, CorrectionReport, FileTree, Span, UnitStatus, VerificationResult, Violation,
    ViolationDiagnostic,
};
use miette::{GraphicalReportHandler, NamedSource};
use std::fmt::Write;

use crate::OutputFormat;

/// Prints a verification result in the requested format.
pub fn print_verification(
    result: &VerificationResult,
    tree: &dyn FileTree,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let handler = GraphicalReportHandler::new();
            print!("{}", render_text(result, tree, &handler));
            println!("{}", colored_summary(result));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Compact => print!("{}", render_compact(result)),
    }
    Ok(())
}

/// Prints a correction report in the requested format.
pub fn print_correction(
    report: &CorrectionReport,
    tree: &dyn FileTree,
    format: OutputFormat,
    dry_run: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Compact => print!("{}", render_correction_compact(report, dry_run)),
        OutputFormat::Text => {
            let handler = GraphicalReportHandler::new();
            print!("{}", render_correction_files(report, dry_run));
            for residual in &report.residual {
                print!("{}", render_violation(&residual.violation, tree, &handler));
                println!("  = not fixed: {}\n", residual.reason);
            }
            print!("{}", render_failures(&report.verification));
            println!("{}", correction_summary(report, dry_run));
        }
    }
    Ok(())
}

/// Renders every violation as a miette diagnostic, followed by unit
/// failures and unreadable files.
pub fn render_text(
    result: &VerificationResult,
    tree: &dyn FileTree,
    handler: &GraphicalReportHandler,
) -> String {
    let mut out = String::new();
    for violation in &result.violations {
        out.push_str(&render_violation(violation, tree, handler));
    }
    out.push_str(&render_failures(result));
    out
}

/// Renders one violation against the current content of its file.
///
/// Falls back to the plain multi-line format when the file is gone.
fn render_violation(
    violation: &Violation,
    tree: &dyn FileTree,
    handler: &GraphicalReportHandler,
) -> String {
    let Ok(content) = tree.read(&violation.path) else {
        return violation.format();
    };

    let mut located = violation.clone();
    if located.location.span.is_none() {
        let offset = offset_for(&content, located.location.line, located.location.column);
        located.location.span = Some(Span::new(offset, 0));
    }

    let report = miette::Report::new(ViolationDiagnostic::from(&located))
        .with_source_code(NamedSource::new(violation.path.display().to_string(), content));
    let mut out = String::new();
    if handler.render_report(&mut out, &*report).is_err() {
        return violation.format();
    }
    out
}

/// One line per violation, then one line per failed unit.
pub fn render_compact(result: &VerificationResult) -> String {
    let mut out = String::new();
    for violation in &result.violations {
        let _ = writeln!(out, "{violation}");
    }
    write_compact_failures(&mut out, result);
    out
}

fn write_compact_failures(out: &mut String, result: &VerificationResult) {
    for unit in result.failed_units() {
        let _ = match &unit.status {
            UnitStatus::TimedOut { after } => writeln!(
                out,
                "{}: timeout [{}] no result after {}ms",
                unit.path.display(),
                unit.rule,
                after.as_millis()
            ),
            UnitStatus::Fault { cause } => writeln!(
                out,
                "{}: fault [{}] {cause}",
                unit.path.display(),
                unit.rule
            ),
            UnitStatus::Completed { .. } | UnitStatus::CacheHit { .. } => Ok(()),
        };
    }
}

fn render_failures(result: &VerificationResult) -> String {
    let mut out = String::new();
    for unit in result.failed_units() {
        let _ = match &unit.status {
            UnitStatus::TimedOut { after } => writeln!(
                out,
                "rule '{}' timed out on {} after {}ms",
                unit.rule,
                unit.path.display(),
                after.as_millis()
            ),
            UnitStatus::Fault { cause } => writeln!(
                out,
                "rule '{}' failed on {}: {cause}",
                unit.rule,
                unit.path.display()
            ),
            UnitStatus::Completed { .. } | UnitStatus::CacheHit { .. } => Ok(()),
        };
    }
    for error in &result.metadata.file_errors {
        let _ = writeln!(
            out,
            "could not read {}: {}",
            error.path.display(),
            error.message
        );
    }
    if result.is_cancelled() {
        let _ = writeln!(
            out,
            "run cancelled: {} unit(s) not run",
            result.metadata.units_skipped
        );
    }
    out
}

/// The closing summary line.
pub fn summary(result: &VerificationResult) -> String {
    let (errors, warnings, infos) = result.count_by_severity();
    let mut line = format!(
        "Found {errors} error(s), {warnings} warning(s), {infos} info(s) in {} file(s)",
        result.files_checked
    );
    let failures = result.metadata.timed_out() + result.metadata.faults();
    if failures > 0 {
        let _ = write!(line, "; {failures} rule run(s) failed");
    }
    line
}

fn colored_summary(result: &VerificationResult) -> String {
    let (errors, warnings, _) = result.count_by_severity();
    let color = if errors > 0 {
        "\x1b[31m"
    } else if warnings > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };
    format!("{color}{}\x1b[0m", summary(result))
}

fn render_correction_files(report: &CorrectionReport, dry_run: bool) -> String {
    let verb = if dry_run { "would fix" } else { "fixed" };
    let mut out = String::new();
    for file in report.files.iter().filter(|f| f.changed) {
        let _ = writeln!(
            out,
            "{verb} {}: {} fix(es) in {} round(s)",
            file.path.display(),
            file.fixes_applied,
            file.rounds
        );
    }
    out
}

/// Changed files, residual violations with their reasons, and a summary.
pub fn render_correction_compact(report: &CorrectionReport, dry_run: bool) -> String {
    let mut out = render_correction_files(report, dry_run);
    for residual in &report.residual {
        let _ = writeln!(out, "{} ({})", residual.violation, residual.reason);
    }
    write_compact_failures(&mut out, &report.verification);
    let _ = writeln!(out, "{}", correction_summary(report, dry_run));
    out
}

/// The closing line of a correction report.
pub fn correction_summary(report: &CorrectionReport, dry_run: bool) -> String {
    let verb = if dry_run { "Would apply" } else { "Applied" };
    format!(
        "{verb} {} fix(es) in {} file(s); {} violation(s) remain",
        report.fixes_applied(),
        report.changed_files().count(),
        report.residual.len()
    )
}

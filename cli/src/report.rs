use std::fmt::Write;

use corpussync::{
    store::CommitKind,
    sync::{DedupeOutcome, RunReport, VerificationReport},
};

/// Plain-text summary of a run for stdout
pub fn render_run(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Loaded {} documents", report.loaded);

    if let Some(assignment) = &report.assignment {
        match assignment.skipped {
            Some(skip) => {
                let _ = writeln!(out, "Assignment: skipped ({skip:?})");
            }
            None => {
                let _ = writeln!(
                    out,
                    "Assignment: {} candidates, {} assigned, {} noise, {} left unassigned",
                    assignment.candidates,
                    assignment.assigned(),
                    assignment.noise(),
                    assignment.left_unassigned()
                );
            }
        }
    }

    if let Some(dedupe) = &report.dedupe {
        let _ = match dedupe.outcome {
            DedupeOutcome::NoDuplicates => writeln!(out, "Dedupe: no duplicates"),
            DedupeOutcome::Declined => writeln!(
                out,
                "Dedupe: {} deletions declined, nothing deleted",
                dedupe.plan.delete.len()
            ),
            DedupeOutcome::Staged => writeln!(
                out,
                "Dedupe: {} groups, deleting {}",
                dedupe.plan.group_count(),
                dedupe.plan.delete.len()
            ),
        };
    }

    if let Some(categories) = &report.categories {
        let _ = writeln!(
            out,
            "Categories: {} candidates, {} updated, {} without a cluster",
            categories.candidates, categories.updated, categories.unassigned
        );
    }

    if let Some(backup) = &report.backup {
        let _ = writeln!(out, "Backup: {}", backup.display());
    }
    let _ = match report.commit.kind {
        CommitKind::Noop => writeln!(out, "Store unchanged"),
        CommitKind::Delete => writeln!(out, "Deleted {} documents", report.commit.deleted),
        CommitKind::Replace => writeln!(
            out,
            "Rewrote {} documents ({} removed)",
            report.commit.written, report.commit.deleted
        ),
    };
    for path in &report.audit_files {
        let _ = writeln!(out, "Audit log: {}", path.display());
    }

    out.push_str(&render_verification(&report.verification));
    out
}

pub fn render_verification(report: &VerificationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Documents: {}", report.documents);
    let _ = writeln!(
        out,
        "  with cluster: {}, without: {}",
        report.with_cluster, report.without_cluster
    );
    let _ = writeln!(
        out,
        "  with category: {}, without: {}",
        report.with_category, report.without_category
    );
    for (category, count) in &report.categories {
        let _ = writeln!(out, "  {category}: {count}");
    }
    out
}

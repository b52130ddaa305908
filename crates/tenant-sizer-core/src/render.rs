use crate::error::Error;
use crate::model::{SizingReport, Workload, WorkloadSizing};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Turns a finished report into an artifact and returns where it was written.
pub trait Renderer {
    fn render(&self, report: &SizingReport) -> Result<PathBuf, Error>;
}

/// Human-readable size using binary multiples, e.g. `1.50 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = "body{font-family:Segoe UI,Helvetica,Arial,sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #ccc;padding:6px 12px;text-align:right}\
th:first-child,td:first-child{text-align:left}\
th{background:#f0f3f7}\
.warn{color:#a15c00}";

/// Writes a single self-contained HTML page.
pub struct HtmlRenderer {
    output_dir: PathBuf,
}

impl HtmlRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn to_html(&self, report: &SizingReport) -> String {
        let mut html = String::new();
        let scope = report
            .group
            .as_deref()
            .map(|g| format!("members of group <b>{}</b>", escape(g)))
            .unwrap_or_else(|| "all entities".to_string());

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Tenant storage sizing</title>\
             <style>{}</style></head><body>\n<h1>Tenant storage sizing</h1>\n\
             <p>Generated {} from {} days of usage history, covering {}.</p>\n",
            STYLE,
            report.generated_at.format("%Y-%m-%d %H:%M UTC"),
            report.period_days,
            scope
        );

        html.push_str(
            "<table>\n<tr><th>Workload</th><th>Count</th><th>Total size</th>\
             <th>Average size</th><th>Annual growth</th><th>One-year forecast</th></tr>\n",
        );
        for workload in Workload::ALL {
            push_workload_row(&mut html, workload, report.workload(workload));
        }
        let _ = write!(
            html,
            "<tr><th>Total</th><th></th><th>{}</th><th></th><th></th><th>{}</th></tr>\n</table>\n",
            format_bytes(report.total_bytes),
            format_bytes(report.projected_total_bytes)
        );

        if let Some(mailboxes) = &report.mail.mailboxes {
            let _ = write!(
                html,
                "<h2>Mailboxes</h2>\n<table>\n<tr><th>User mailboxes</th><td>{}</td></tr>\n\
                 <tr><th>Shared mailboxes</th><td>{}</td></tr>\n</table>\n",
                mailboxes.user_mailboxes, mailboxes.shared_mailboxes
            );
        }

        if let Some(archive) = &report.mail.archive {
            let _ = write!(
                html,
                "<h2>Archive mailboxes</h2>\n<table>\n\
                 <tr><th>Archives measured</th><td>{}</td></tr>\n\
                 <tr><th>Total size</th><td>{}</td></tr>\n\
                 <tr><th>Average size</th><td>{}</td></tr>\n\
                 <tr><th>Skipped</th><td>{}</td></tr>\n</table>\n",
                archive.mailbox_count,
                format_bytes(archive.total_bytes),
                format_bytes(archive.average_bytes),
                archive.skipped
            );
        }

        if !report.warnings.is_empty() {
            html.push_str("<h2>Warnings</h2>\n<ul class=\"warn\">\n");
            for warning in &report.warnings {
                let _ = writeln!(html, "<li>{}</li>", escape(warning));
            }
            html.push_str("</ul>\n");
        }

        html.push_str("</body></html>\n");
        html
    }
}

fn push_workload_row(html: &mut String, workload: Workload, sizing: &WorkloadSizing) {
    let count = if sizing.entity_label.is_empty() {
        sizing.entity_count.to_string()
    } else {
        format!("{} {}", sizing.entity_count, escape(&sizing.entity_label.to_lowercase()))
    };
    let _ = writeln!(
        html,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>",
        workload,
        count,
        format_bytes(sizing.total_bytes),
        format_bytes(sizing.average_bytes),
        sizing.growth_percent,
        format_bytes(sizing.one_year_projected_bytes)
    );
}

impl Renderer for HtmlRenderer {
    fn render(&self, report: &SizingReport) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.output_dir)?;
        let file_name = format!(
            "tenant-sizing-{}.html",
            report.generated_at.format("%Y%m%d-%H%M%S")
        );
        let path = self.output_dir.join(file_name);
        fs::write(&path, self.to_html(report))
            .map_err(|err| Error::Render(format!("{}: {}", path.display(), err)))?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}

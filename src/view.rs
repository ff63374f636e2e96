//! Rendering of ledger snapshots for the `view` command.
//!
//! Two interchangeable strategies behind one capability trait: an indented
//! per-project tree and an aligned-column table, selected by configuration.

use std::collections::BTreeMap;

use colored::Colorize;

use crate::config::RenderMode;
use crate::ledger::{today_key, TimeLedger};

/// Filters applied before rendering
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Show every project instead of just the current one
    pub all: bool,
    /// Project to show when `all` is false
    pub project: Option<String>,
    /// Only this date (`DD-MM-YYYY`)
    pub date: Option<String>,
    /// Shortcut for filtering to the current local date
    pub today: bool,
}

impl ViewOptions {
    fn date_filter(&self) -> Option<String> {
        if self.today {
            Some(today_key())
        } else {
            self.date.clone()
        }
    }
}

/// One rendering strategy over a filtered ledger snapshot
pub trait LedgerRenderer {
    fn render(&self, ledger: &TimeLedger, options: &ViewOptions) -> String;
}

/// Renderer for the configured mode
pub fn renderer_for(mode: RenderMode) -> Box<dyn LedgerRenderer> {
    match mode {
        RenderMode::Tree => Box::new(TreeRenderer),
        RenderMode::Table => Box::new(TableRenderer),
    }
}

type DateMap = BTreeMap<String, BTreeMap<String, f64>>;

fn filtered_projects(ledger: &TimeLedger, options: &ViewOptions) -> BTreeMap<String, DateMap> {
    let date_filter = options.date_filter();

    ledger
        .projects
        .iter()
        .filter(|(name, _)| {
            options.all || options.project.as_deref() == Some(name.as_str())
        })
        .map(|(name, dates)| {
            let dates: DateMap = dates
                .iter()
                .filter(|(date, _)| date_filter.as_deref().map_or(true, |d| d == date.as_str()))
                .map(|(date, branches)| (date.clone(), branches.clone()))
                .collect();
            (name.clone(), dates)
        })
        .filter(|(_, dates)| !dates.is_empty())
        .collect()
}

/// Humanized duration: `2h 5m`, `14m 3s`, `42s`
pub fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Indented per-project/date/branch text
pub struct TreeRenderer;

impl LedgerRenderer for TreeRenderer {
    fn render(&self, ledger: &TimeLedger, options: &ViewOptions) -> String {
        let projects = filtered_projects(ledger, options);
        if projects.is_empty() {
            return format!("{}", "No data for the selected filters.".yellow());
        }

        let mut out = String::new();
        for (project, dates) in &projects {
            out.push_str(&format!("{}\n", project.bold()));
            for (date, branches) in dates {
                out.push_str(&format!("  {}\n", date.cyan()));
                for (branch, seconds) in branches {
                    out.push_str(&format!("    {}  {}\n", branch, format_seconds(*seconds)));
                }
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// Aligned columns: Project / Date / Branch / Time
pub struct TableRenderer;

impl LedgerRenderer for TableRenderer {
    fn render(&self, ledger: &TimeLedger, options: &ViewOptions) -> String {
        let projects = filtered_projects(ledger, options);
        if projects.is_empty() {
            return format!("{}", "No data for the selected filters.".yellow());
        }

        let mut rows: Vec<[String; 4]> = Vec::new();
        for (project, dates) in &projects {
            for (date, branches) in dates {
                for (branch, seconds) in branches {
                    rows.push([
                        project.clone(),
                        date.clone(),
                        branch.clone(),
                        format_seconds(*seconds),
                    ]);
                }
            }
        }

        let header = ["Project", "Date", "Branch", "Time"];
        let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let mut out = String::new();
        let render_row = |cells: &[&str], widths: &[usize]| -> String {
            cells
                .iter()
                .zip(widths.iter().copied())
                .map(|(cell, w)| format!("{:<w$}", cell, w = w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        out.push_str(&format!("{}\n", render_row(&header, &widths).cyan()));
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            out.push_str(&format!("{}\n", render_row(&cells, &widths)));
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ledger() -> TimeLedger {
        let mut ledger = TimeLedger::default();
        ledger.add("alpha", "01-01-2030", "main", 3725.0);
        ledger.add("alpha", "02-01-2030", "dev", 61.0);
        ledger.add("beta", "01-01-2030", "main", 42.0);
        ledger
    }

    #[test]
    fn test_format_seconds_humanization() {
        assert_eq!(format_seconds(42.0), "42s");
        assert_eq!(format_seconds(61.0), "1m 1s");
        assert_eq!(format_seconds(3725.0), "1h 2m");
        assert_eq!(format_seconds(0.0), "0s");
        assert_eq!(format_seconds(-5.0), "0s");
    }

    #[test]
    fn test_tree_render_scopes_to_requested_project() {
        let options = ViewOptions {
            project: Some("alpha".to_string()),
            ..ViewOptions::default()
        };
        let out = TreeRenderer.render(&sample_ledger(), &options);
        assert!(out.contains("alpha"));
        assert!(out.contains("1h 2m"));
        assert!(!out.contains("beta"));
    }

    #[test]
    fn test_all_projects_included_when_requested() {
        let options = ViewOptions {
            all: true,
            ..ViewOptions::default()
        };
        let out = TreeRenderer.render(&sample_ledger(), &options);
        assert!(out.contains("alpha"));
        assert!(out.contains("beta"));
    }

    #[test]
    fn test_date_filter_drops_other_dates() {
        let options = ViewOptions {
            all: true,
            date: Some("02-01-2030".to_string()),
            ..ViewOptions::default()
        };
        let out = TreeRenderer.render(&sample_ledger(), &options);
        assert!(out.contains("02-01-2030"));
        assert!(!out.contains("01-01-2030"));
        // beta has no entry on that date and disappears entirely
        assert!(!out.contains("beta"));
    }

    #[test]
    fn test_no_matches_renders_placeholder() {
        let options = ViewOptions {
            project: Some("missing".to_string()),
            ..ViewOptions::default()
        };
        let out = TreeRenderer.render(&sample_ledger(), &options);
        assert!(out.contains("No data"));
    }

    #[test]
    fn test_table_render_emits_header_and_rows() {
        let options = ViewOptions {
            all: true,
            ..ViewOptions::default()
        };
        let out = TableRenderer.render(&sample_ledger(), &options);
        assert!(out.contains("Project"));
        assert!(out.contains("Branch"));
        assert!(out.contains("beta"));
        assert!(out.contains("42s"));
    }

    #[test]
    fn test_zero_second_seed_entries_stay_visible() {
        let mut ledger = TimeLedger::default();
        ledger.add("alpha", "01-01-2030", "fresh-branch", 0.0);

        let options = ViewOptions {
            all: true,
            ..ViewOptions::default()
        };
        let out = TreeRenderer.render(&ledger, &options);
        assert!(out.contains("fresh-branch"));
        assert!(out.contains("0s"));
    }
}

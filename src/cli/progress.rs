//! Terminal progress display for sync runs
//!
//! [`ProgressDisplay`] is a [`SyncObserver`]: an overall bar counts manifest
//! entries and a second bar follows the file currently being downloaded.
//! When stderr is not a terminal (or bars are disabled) it falls back to one
//! plain text line per milestone.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use launch_sync::cli::{ProgressConfig, ProgressDisplay};
//! use launch_sync::app::sync::SyncObserver;
//!
//! let display: Arc<dyn SyncObserver> = Arc::new(ProgressDisplay::new(ProgressConfig::default()));
//! ```

use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::debug;

use crate::app::sync::{SyncEvent, SyncObserver};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Suppress everything except errors and the terms text
    pub quiet: bool,
    /// Maximum width for file names in display
    pub max_filename_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            quiet: false,
            max_filename_width: 40,
        }
    }
}

#[derive(Default)]
struct DisplayState {
    multi: Option<MultiProgress>,
    overall: Option<ProgressBar>,
    file: Option<ProgressBar>,
    total_items: usize,
}

/// indicatif-backed observer
pub struct ProgressDisplay {
    config: ProgressConfig,
    is_terminal: bool,
    state: Mutex<DisplayState>,
}

impl ProgressDisplay {
    /// Create a new progress display with the given configuration
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        Self {
            config,
            is_terminal,
            state: Mutex::new(DisplayState::default()),
        }
    }

    fn bars_enabled(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal && !self.config.quiet
    }

    fn handle_bars(&self, state: &mut DisplayState, event: &SyncEvent) {
        match event {
            SyncEvent::SetTotalItems(total) => {
                let multi = MultiProgress::new();
                let overall = multi.add(ProgressBar::new(*total as u64));
                overall.set_style(overall_style());
                overall.set_message("Checking files");
                state.total_items = *total;
                state.overall = Some(overall);
                state.multi = Some(multi);
            }
            SyncEvent::SameHash { index, .. } => {
                if let Some(overall) = &state.overall {
                    overall.set_position(*index as u64);
                }
            }
            SyncEvent::StartDownload { name, .. } => {
                let bar = match &state.multi {
                    Some(multi) => multi.add(ProgressBar::new(0)),
                    None => ProgressBar::new(0),
                };
                bar.set_style(file_style());
                bar.set_message(truncate_name(name, self.config.max_filename_width));
                state.file = Some(bar);
            }
            SyncEvent::DownloadProgress {
                bytes, expected, ..
            } => {
                if let Some(bar) = &state.file {
                    // The declared size is advisory; never let the bar overflow
                    bar.set_length((*expected).max(*bytes));
                    bar.set_position(*bytes);
                }
            }
            SyncEvent::FileDownloaded { index, .. } => {
                if let Some(bar) = state.file.take() {
                    bar.finish_and_clear();
                }
                if let Some(overall) = &state.overall {
                    overall.set_position(*index as u64);
                }
            }
            SyncEvent::Completed => {
                if let Some(overall) = state.overall.take() {
                    overall.finish_with_message("Up to date");
                }
            }
            SyncEvent::Error { .. } => {
                if let Some(bar) = state.file.take() {
                    bar.abandon();
                }
                if let Some(overall) = state.overall.take() {
                    overall.abandon();
                }
            }
            _ => {}
        }
    }
}

impl SyncObserver for ProgressDisplay {
    fn notify(&self, event: SyncEvent) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if self.bars_enabled() {
            self.handle_bars(&mut state, &event);
        } else if let SyncEvent::SetTotalItems(total) = event {
            state.total_items = total;
        }

        match &event {
            SyncEvent::ShowEula(text) => println!("{}\n", text),
            SyncEvent::Error { .. } => {
                if let Some(line) = describe_event(&event, state.total_items) {
                    eprintln!("{}", line);
                }
            }
            SyncEvent::Exit => debug!("Exit requested"),
            _ if self.config.quiet => {}
            // Bars already show per-file activity
            SyncEvent::SameHash { .. }
            | SyncEvent::StartDownload { .. }
            | SyncEvent::FileDownloaded { .. }
            | SyncEvent::Completed
                if self.bars_enabled() => {}
            _ => {
                if let Some(line) = describe_event(&event, state.total_items) {
                    eprintln!("{}", line);
                }
            }
        }
    }
}

/// Plain text rendering of an event, `None` for events with no text form
pub fn describe_event(event: &SyncEvent, total_items: usize) -> Option<String> {
    match event {
        SyncEvent::SetTitle(title) => Some(title.clone()),
        SyncEvent::SetHeaderText(text) => Some(text.clone()),
        SyncEvent::SetTotalItems(total) => Some(format!("Checking {} files", total)),
        SyncEvent::SameHash { index, name, .. } => Some(format!(
            "[{}/{}] {} is up to date",
            index, total_items, name
        )),
        SyncEvent::StartDownload { index, name } => Some(format!(
            "[{}/{}] Downloading {}",
            index, total_items, name
        )),
        SyncEvent::FileDownloaded { index, name, bytes } => Some(format!(
            "[{}/{}] {} downloaded ({} bytes)",
            index, total_items, name, bytes
        )),
        SyncEvent::Completed => Some("Update complete".to_string()),
        SyncEvent::Error {
            message,
            previous_install,
            ..
        } => {
            let mut line = format!("Update failed: {}", message);
            if *previous_install {
                line.push_str("\nThe installed version can still be started with `launch_sync launch`.");
            }
            Some(line)
        }
        SyncEvent::ShowEula(_) | SyncEvent::DownloadProgress { .. } | SyncEvent::Exit => None,
    }
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn file_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {msg:40} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec}")
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Shorten `name` to `max_width` characters, keeping its tail
fn truncate_name(name: &str, max_width: usize) -> String {
    let count = name.chars().count();
    if count <= max_width || max_width < 4 {
        return name.to_string();
    }
    let tail: String = name.chars().skip(count - (max_width - 3)).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn text_display() -> ProgressDisplay {
        ProgressDisplay::new(ProgressConfig {
            enable_progress_bars: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_describe_file_events() {
        let same = SyncEvent::SameHash {
            index: 1,
            name: "a.txt".to_string(),
            hash: "00".repeat(20),
        };
        assert_eq!(
            describe_event(&same, 3).as_deref(),
            Some("[1/3] a.txt is up to date")
        );

        let done = SyncEvent::FileDownloaded {
            index: 2,
            name: "b.txt".to_string(),
            bytes: 20,
        };
        assert_eq!(
            describe_event(&done, 3).as_deref(),
            Some("[2/3] b.txt downloaded (20 bytes)")
        );

        let progress = SyncEvent::DownloadProgress {
            index: 2,
            bytes: 10,
            expected: 20,
        };
        assert!(describe_event(&progress, 3).is_none());
    }

    #[test]
    fn test_describe_error_mentions_fallback() {
        let error = |previous_install| SyncEvent::Error {
            message: "Server unreachable".to_string(),
            kind: ErrorKind::ManifestUnreachable,
            previous_install,
        };

        let with_install = describe_event(&error(true), 0).unwrap();
        assert!(with_install.starts_with("Update failed: Server unreachable"));
        assert!(with_install.contains("launch_sync launch"));

        let without = describe_event(&error(false), 0).unwrap();
        assert!(!without.contains("launch_sync launch"));
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short.txt", 40), "short.txt");
        assert_eq!(truncate_name("data/levels/level-0001.pak", 12), "...-0001.pak");
        assert_eq!(truncate_name("data/levels/level-0001.pak", 12).chars().count(), 12);
    }

    #[test]
    fn test_text_mode_tracks_total() {
        let display = text_display();
        display.notify(SyncEvent::SetTotalItems(4));
        display.notify(SyncEvent::StartDownload {
            index: 1,
            name: "a.txt".to_string(),
        });
        display.notify(SyncEvent::DownloadProgress {
            index: 1,
            bytes: 5,
            expected: 10,
        });

        let state = display.state.lock().unwrap();
        assert_eq!(state.total_items, 4);
        assert!(state.overall.is_none());
        assert!(state.file.is_none());
    }
}

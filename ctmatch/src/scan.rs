//! Scanning of conntrack dumps against a reference entry.
//!
//! Every non blank line of the input is parsed as a conntrack entry and
//! compared with the reference, the reference being the left hand side of
//! the comparison. Lines that do not parse are logged and skipped.

use std::io::BufRead;
use std::ops::AddAssign;

use anyhow::Context;
use ctmatch_common::ConnectionRecord;
use ctmatch_filter::{parse_record, TupleMatcher};
use log::{trace, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Non blank lines read.
    pub scanned: u64,
    /// Lines passed to the callback.
    pub selected: u64,
    /// Lines that could not be parsed.
    pub skipped: u64,
}

impl AddAssign for ScanStats {
    fn add_assign(&mut self, rhs: Self) {
        self.scanned += rhs.scanned;
        self.selected += rhs.selected;
        self.skipped += rhs.skipped;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    reference: ConnectionRecord,
    matcher: TupleMatcher,
    invert: bool,
}

impl Scanner {
    pub fn new(reference: ConnectionRecord, matcher: TupleMatcher) -> Self {
        Self {
            reference,
            matcher,
            invert: false,
        }
    }

    /// Selects the entries that do not match instead.
    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn selects(&self, record: &ConnectionRecord) -> bool {
        self.matcher.matches(&self.reference, record) != self.invert
    }

    /// Reads `reader` to the end and calls `f` with every selected line.
    ///
    /// `name` identifies the input in logs and errors.
    pub fn scan<R, F>(&self, name: &str, reader: R, mut f: F) -> Result<ScanStats, anyhow::Error>
    where
        R: BufRead,
        F: FnMut(&str) -> std::io::Result<()>,
    {
        let mut stats = ScanStats::default();

        for (n, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", name))?;
            if line.trim().is_empty() {
                continue;
            }
            stats.scanned += 1;

            let record = match parse_record(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!("{}:{}: skipping entry: {}", name, n + 1, e);
                    stats.skipped += 1;
                    continue;
                }
            };

            if self.selects(&record) {
                trace!("{}:{}: selected", name, n + 1);
                stats.selected += 1;
                f(&line).context("failed to write entry")?;
            }
        }

        Ok(stats)
    }
}

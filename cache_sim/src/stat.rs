//! Human readable statistics, framed to fit a terminal.

use std::fmt;

pub trait Stat: fmt::Display {
    /// header of stat
    fn header(&self) -> &'static str;
    /// body width
    fn width(&self) -> usize;
}

pub trait AddStats {
    /// add stat to `buf`.
    fn add_stats<'a>(&'a self, buf: &mut Stats<'a>);
}

#[derive(Default)]
pub struct Stats<'a> {
    stats: Vec<Box<dyn Stat + 'a>>,
}

impl<'a> Stats<'a> {
    pub fn push(&mut self, stat: Box<dyn Stat + 'a>) {
        self.stats.push(stat)
    }
    pub fn len(&self) -> usize {
        self.stats.len()
    }
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
    pub fn framed(&self, max_width: usize) -> FramedStats<'_, 'a> {
        FramedStats {
            stats: self,
            max_width,
        }
    }
}

pub struct FramedStats<'s, 'a> {
    stats: &'s Stats<'a>,
    max_width: usize,
}

impl fmt::Display for FramedStats<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .stats
            .stats
            .iter()
            .map(|s| s.header().len().max(s.width()))
            .max()
            .unwrap_or(0)
            .min(self.max_width);
        writeln!(f, "{:-^width$}", " statistics ")?;
        for s in &self.stats.stats {
            writeln!(f, "{}:", s.header())?;
            writeln!(f, "{s}")?;
        }
        write!(f, "{:-<width$}", "")
    }
}

/// `part` as a percentage of `total`, or `-` when nothing was counted.
pub struct Percent {
    part: u64,
    total: u64,
}

impl Percent {
    pub fn new(part: u64, total: u64) -> Self {
        Self { part, total }
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = if self.total == 0 {
            "-".to_owned()
        } else {
            format!("{:.6}%", 100. * self.part as f64 / self.total as f64)
        };
        f.pad(&s)
    }
}

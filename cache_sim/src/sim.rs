use std::fmt;

use serde::Serialize;

use crate::{
    cache::{Cache, Outcome},
    common::TraceRecord,
    config::{Geometry, GeometryError},
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// hit / miss / eviction tallies of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Counters {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Hit => self.hits += 1,
            Outcome::MissFill => self.misses += 1,
            Outcome::MissEvict => {
                self.misses += 1;
                self.evictions += 1;
            }
        }
    }
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// outcomes of the (at most two) accesses caused by one trace record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Accesses([Option<Outcome>; 2]);

impl Accesses {
    fn push(&mut self, outcome: Outcome) {
        let slot = self.0.iter_mut().find(|o| o.is_none());
        debug_assert!(slot.is_some(), "a record causes at most two accesses");
        if let Some(slot) = slot {
            *slot = Some(outcome);
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = Outcome> + '_ {
        self.0.iter().flatten().copied()
    }
    pub fn len(&self) -> usize {
        self.iter().count()
    }
    pub fn is_empty(&self) -> bool {
        self.0[0].is_none()
    }
}

impl fmt::Display for Accesses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for o in self.iter() {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{o}")?;
        }
        Ok(())
    }
}

/// Final result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub geometry: Geometry,
    #[serde(flatten)]
    pub counters: Counters,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Counters {
            hits,
            misses,
            evictions,
        } = self.counters;
        write!(f, "hits:{hits} misses:{misses} evictions:{evictions}")
    }
}

/// Replays decoded trace records against an owned cache.
pub struct Simulator {
    cache: Cache,
    counters: Counters,
    records: u64,
    #[cfg(feature = "stat")]
    stat_builder: stat::RunStatBuilder,
}

impl Simulator {
    pub fn new(geometry: Geometry) -> Result<Self, GeometryError> {
        Ok(Self {
            cache: Cache::new(geometry)?,
            counters: Counters::default(),
            records: 0,
            #[cfg(feature = "stat")]
            stat_builder: stat::RunStatBuilder::new(),
        })
    }
    pub fn cache(&self) -> &Cache {
        &self.cache
    }
    pub fn counters(&self) -> Counters {
        self.counters
    }
    /// number of records stepped, instruction fetches included.
    pub fn records(&self) -> u64 {
        self.records
    }
    /// a modify is a load followed by a store to the same address;
    /// instruction fetches do not touch the data cache.
    pub fn step(&mut self, record: &TraceRecord) -> Accesses {
        let mut accesses = Accesses::default();
        self.records += 1;
        #[cfg(feature = "stat")]
        self.stat_builder.on_record(record.kind);
        for _ in 0..record.kind.accesses() {
            let outcome = self.cache.access(record.addr);
            self.counters.record(outcome);
            accesses.push(outcome);
        }
        accesses
    }
    pub fn run<'r>(&mut self, records: impl IntoIterator<Item = &'r TraceRecord>) {
        for r in records {
            self.step(r);
        }
    }
    /// releases the cache.
    pub fn finish(self) -> Summary {
        let summary = Summary {
            geometry: self.cache.geometry(),
            counters: self.counters,
        };
        log::info!("simulation finished after {} records: {summary}", self.records);
        summary
    }
}

#[cfg(feature = "stat")]
impl Simulator {
    pub fn collect_stat(&self) -> Stats<'_> {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats<'a>(&'a self, buf: &mut Stats<'a>) {
        buf.push(Box::new(self.stat_builder.finish(self.records)));
        buf.push(Box::new(stat::GeometryStat(self.cache.geometry())));
        buf.push(Box::new(stat::CounterStatView::new(&self.counters)));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use crate::stat::*;

    use super::*;
    use crate::common::AccessKind;
    use std::time;

    pub struct RunStatBuilder {
        begin: time::Instant,
        ignored: u64,
    }

    impl RunStatBuilder {
        pub fn new() -> Self {
            Self {
                begin: time::Instant::now(),
                ignored: 0,
            }
        }
        pub fn on_record(&mut self, kind: AccessKind) {
            if kind == AccessKind::Instruction {
                self.ignored += 1;
            }
        }
        pub fn finish(&self, records: u64) -> RunStat {
            RunStat {
                records,
                ignored: self.ignored,
                elapsed: self.begin.elapsed(),
            }
        }
    }

    impl Default for RunStatBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    pub struct RunStat {
        records: u64,
        ignored: u64,
        elapsed: time::Duration,
    }

    impl Stat for RunStat {
        fn header(&self) -> &'static str {
            "simulator stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for RunStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let ms = format!("{} ms", self.elapsed.as_millis());
            writeln!(f, "  elapsed total: {ms:>12}")?;
            let records = format!("#{}", self.records);
            writeln!(f, "  records total: {records:>12}")?;
            let ignored = format!("#{}", self.ignored);
            write!(f, "  instr fetches: {ignored:>12}")
        }
    }

    pub struct GeometryStat(pub Geometry);

    impl Stat for GeometryStat {
        fn header(&self) -> &'static str {
            "cache geometry"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for GeometryStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let g = self.0;
            writeln!(f, "           sets: {:>12}", g.num_sets())?;
            writeln!(f, "  lines per set: {:>12}", g.e)?;
            writeln!(f, "     block size: {:>12}", 1u128 << g.b)?;
            match g.capacity_bytes() {
                Some(c) => write!(f, "       capacity: {c:>12}"),
                None => write!(f, "       capacity: {:>12}", "overflow"),
            }
        }
    }

    pub struct CounterStatView<'a> {
        stat: &'a Counters,
    }

    impl<'a> CounterStatView<'a> {
        pub fn new(stat: &'a Counters) -> Self {
            Self { stat }
        }
    }

    impl Stat for CounterStatView<'_> {
        fn header(&self) -> &'static str {
            "cache stat"
        }
        fn width(&self) -> usize {
            40
        }
    }

    impl fmt::Display for CounterStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let Counters {
                hits,
                misses,
                evictions,
            } = *self.stat;
            let total = self.stat.accesses();
            writeln!(f, "        hit: {hits:>10} ({:>11})", Percent::new(hits, total))?;
            writeln!(f, "       miss: {misses:>10} ({:>11})", Percent::new(misses, total))?;
            write!(
                f,
                "   eviction: {evictions:>10} ({:>11})",
                Percent::new(evictions, total)
            )
        }
    }
}

use std::fmt;

use crate::{
    bin::{extract, shr},
    common::Addr,
    config::{Geometry, GeometryError},
};

/// what a single access did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Hit,
    /// miss served by an invalid line
    MissFill,
    /// miss that replaced the least recently used line of a full set
    MissEvict,
}

impl Outcome {
    pub fn is_hit(self) -> bool {
        matches!(self, Outcome::Hit)
    }
    pub fn is_eviction(self) -> bool {
        matches!(self, Outcome::MissEvict)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Hit => write!(f, "hit"),
            Outcome::MissFill => write!(f, "miss"),
            Outcome::MissEvict => write!(f, "miss eviction"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheLine {
    pub valid: bool,
    pub tag: u64,
    /// clock value of the last access; larger is more recent
    pub recency: u64,
}

impl CacheLine {
    fn occupy(&mut self, tag: u64, now: u64) {
        self.valid = true;
        self.tag = tag;
        self.recency = now;
    }
}

#[derive(Debug, Clone)]
pub struct CacheSet {
    lines: Vec<CacheLine>,
}

impl CacheSet {
    fn with_lines(e: usize) -> Result<Self, GeometryError> {
        let mut lines = Vec::new();
        lines
            .try_reserve_exact(e)
            .map_err(|_| GeometryError::Allocation { lines: e as u128 })?;
        lines.resize(e, CacheLine::default());
        Ok(Self { lines })
    }
    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }
    pub fn valid_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.valid).count()
    }
    fn access(&mut self, tag: u64, now: u64) -> Outcome {
        if let Some(line) = self.lines.iter_mut().find(|l| l.valid && l.tag == tag) {
            line.recency = now;
            return Outcome::Hit;
        }
        let (index, outcome) = match self.lines.iter().position(|l| !l.valid) {
            Some(free) => (free, Outcome::MissFill),
            None => {
                // set is full here, and it holds at least one line
                let victim = self
                    .lines
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, l)| l.recency)
                    .map_or(0, |(i, _)| i);
                (victim, Outcome::MissEvict)
            }
        };
        self.lines[index].occupy(tag, now);
        outcome
    }
}

/// Set-associative cache with LRU replacement.
///
/// Dropping the cache releases every set; there is no way to access it
/// afterwards.
pub struct Cache {
    sets: Vec<CacheSet>,
    geometry: Geometry,
    clock: u64,
}

impl Cache {
    /// allocates `2^s` sets of `E` invalid lines each.
    pub fn new(geometry: Geometry) -> Result<Self, GeometryError> {
        geometry.validate()?;
        let num_sets = geometry.num_sets();
        let mut sets = Vec::new();
        sets.try_reserve_exact(num_sets)
            .map_err(|_| GeometryError::Allocation {
                lines: geometry.num_lines(),
            })?;
        for _ in 0..num_sets {
            sets.push(CacheSet::with_lines(geometry.e)?);
        }
        log::info!(
            "cache initialized: {geometry} ({num_sets} sets x {} lines)",
            geometry.e
        );
        Ok(Self {
            sets,
            geometry,
            clock: 0,
        })
    }
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }
    /// number of accesses performed so far.
    pub fn clock(&self) -> u64 {
        self.clock
    }
    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }
    pub fn tag_of(&self, addr: Addr) -> u64 {
        shr(addr.inner(), self.geometry.s + self.geometry.b)
    }
    pub fn set_index_of(&self, addr: Addr) -> usize {
        let Geometry { s, b, .. } = self.geometry;
        // s < usize::BITS, so the index fits
        extract(addr.inner(), b..b + s) as usize
    }
    pub fn access(&mut self, addr: Addr) -> Outcome {
        let tag = self.tag_of(addr);
        let set_index = self.set_index_of(addr);
        let now = self.clock;
        self.clock += 1;
        let outcome = self.sets[set_index].access(tag, now);
        log::trace!("{addr}: set {set_index}, tag {tag:#x} => {outcome}");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(s: u32, e: usize, b: u32) -> Cache {
        Cache::new(Geometry::new(s, e, b)).unwrap()
    }

    fn run(c: &mut Cache, addrs: &[u64]) -> Vec<Outcome> {
        addrs.iter().map(|&a| c.access(Addr::new(a))).collect()
    }

    #[test]
    fn test_init() {
        let c = cache(3, 2, 4);
        assert_eq!(8, c.sets().len());
        assert!(c.sets().iter().all(|s| s.lines().len() == 2));
        assert!(c
            .sets()
            .iter()
            .flat_map(|s| s.lines())
            .all(|l| *l == CacheLine::default()));
        assert_eq!(0, c.clock());
    }
    #[test]
    fn test_reject_geometry() {
        assert!(matches!(
            Cache::new(Geometry::new(2, 0, 2)),
            Err(GeometryError::ZeroAssociativity)
        ));
        assert!(matches!(
            Cache::new(Geometry::new(40, 1, 40)),
            Err(GeometryError::AddressWidthExceeded { .. })
        ));
    }
    #[test]
    fn test_allocation_failure() {
        // too many sets
        assert!(matches!(
            Cache::new(Geometry::new(62, 1, 0)),
            Err(GeometryError::Allocation { .. })
        ));
        // too many lines in one set
        assert!(matches!(
            Cache::new(Geometry::new(0, usize::MAX / 4, 0)),
            Err(GeometryError::Allocation { .. })
        ));
    }
    #[test]
    fn test_decompose() {
        let c = cache(2, 1, 2);
        assert_eq!(1, c.set_index_of(Addr::new(4)));
        assert_eq!(0, c.tag_of(Addr::new(4)));
        assert_eq!(3, c.set_index_of(Addr::new(0b1_11_01)));
        assert_eq!(1, c.tag_of(Addr::new(0b1_11_01)));
        let c = cache(0, 1, 64);
        assert_eq!(0, c.set_index_of(Addr::new(u64::MAX)));
        assert_eq!(0, c.tag_of(Addr::new(u64::MAX)));
    }
    #[test]
    fn test_lru_victim() {
        use Outcome::*;
        let mut c = cache(0, 2, 0);
        assert_eq!(
            vec![MissFill, MissFill, MissEvict, MissEvict],
            run(&mut c, &[0, 1, 2, 0])
        );
        // 0 evicted 1, so 2 and 0 are resident
        assert_eq!(vec![Hit, Hit, MissEvict], run(&mut c, &[2, 0, 1]));
    }
    #[test]
    fn test_hit_refreshes_recency() {
        use Outcome::*;
        let mut c = cache(0, 2, 0);
        // touching 0 again makes 1 the victim
        assert_eq!(
            vec![MissFill, MissFill, Hit, MissEvict, Hit],
            run(&mut c, &[0, 1, 0, 2, 0])
        );
    }
    #[test]
    fn test_repeat_same_address() {
        let mut c = cache(1, 1, 3);
        let outcomes = run(&mut c, &[0x10; 6]);
        assert_eq!(Outcome::MissFill, outcomes[0]);
        assert!(outcomes[1..].iter().all(|o| o.is_hit()));
        // same block, different offset
        assert_eq!(Outcome::Hit, c.access(Addr::new(0x17)));
    }
    #[test]
    fn test_clock_per_access() {
        let mut c = cache(1, 2, 1);
        run(&mut c, &[0, 0, 4, 8, 12, 0]);
        assert_eq!(6, c.clock());
        let max = c
            .sets()
            .iter()
            .flat_map(|s| s.lines())
            .map(|l| l.recency)
            .max();
        assert_eq!(Some(5), max);
    }
    #[test]
    fn test_fill_before_evict() {
        let mut c = cache(0, 4, 0);
        let outcomes = run(&mut c, &[1, 2, 3, 4]);
        assert!(outcomes.iter().all(|o| *o == Outcome::MissFill));
        assert_eq!(4, c.sets()[0].valid_lines());
        assert!(c.access(Addr::new(5)).is_eviction());
    }
    #[test]
    fn test_no_duplicate_tags() {
        let mut c = cache(1, 3, 0);
        run(&mut c, &[0, 2, 4, 0, 6, 2, 8, 0, 0, 10, 4]);
        for set in c.sets() {
            let mut tags: Vec<_> = set
                .lines()
                .iter()
                .filter(|l| l.valid)
                .map(|l| l.tag)
                .collect();
            let n = tags.len();
            tags.sort();
            tags.dedup();
            assert_eq!(n, tags.len());
        }
    }
    #[test]
    fn test_sets_are_independent() {
        use Outcome::*;
        let mut c = cache(1, 1, 0);
        // even addresses go to set 0, odd ones to set 1
        assert_eq!(
            vec![MissFill, MissFill, MissEvict, Hit],
            run(&mut c, &[0, 1, 2, 1])
        );
    }
}

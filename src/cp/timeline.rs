//! Reserved time intervals of one exclusive resource.
//!
//! [`Timeline`] tracks plain busy intervals (stations). [`HoistTrack`]
//! also remembers where each loaded trip ends, so a new trip only fits
//! where the hoist can travel empty from the previous drop-off to the new
//! pick-up and on to the next one.

/// Sorted, non-overlapping busy intervals `[start, end)`.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    busy: Vec<(i64, i64)>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[start, end)` is free.
    ///
    /// A zero-length request is a point: it conflicts with any busy
    /// interval containing `start`.
    pub fn is_free(&self, start: i64, end: i64) -> bool {
        let end = end.max(start);
        // first interval ending after `start`
        let idx = self.busy.partition_point(|&(_, e)| e <= start);
        match self.busy.get(idx) {
            Some(&(s, _)) => {
                if end == start {
                    s > start
                } else {
                    s >= end
                }
            }
            None => true,
        }
    }

    /// Reserves `[start, end)`. The caller guarantees it is free.
    pub fn reserve(&mut self, start: i64, end: i64) {
        let end = end.max(start);
        let idx = self.busy.partition_point(|&(s, _)| s <= start);
        self.busy.insert(idx, (start, end));
    }

    /// End points of all busy intervals.
    pub fn ends(&self) -> impl Iterator<Item = i64> + '_ {
        self.busy.iter().map(|&(_, e)| e)
    }

    /// End of the last busy interval.
    pub fn latest_end(&self) -> Option<i64> {
        self.busy.iter().map(|&(_, e)| e).max()
    }

    pub fn len(&self) -> usize {
        self.busy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.busy.is_empty()
    }
}

/// One loaded hoist trip: lift at `from` starting at `start`, sink at `to`
/// finished by `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trip {
    pub start: i64,
    pub end: i64,
    pub from: u32,
    pub to: u32,
}

/// Loaded trips of one hoist, sorted by start.
///
/// The hoist waits at `home` at time 0. Empty travel durations come from
/// a caller-supplied `travel(from, to)` function.
#[derive(Debug, Clone)]
pub struct HoistTrack {
    home: u32,
    trips: Vec<Trip>,
}

impl HoistTrack {
    pub fn new(home: u32) -> Self {
        Self {
            home,
            trips: Vec::new(),
        }
    }

    pub fn home(&self) -> u32 {
        self.home
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    /// Whether `trip` fits between the reserved trips.
    ///
    /// `pending` holds tentative trips that all end no later than
    /// `trip.start` (earlier transfers of the batch being placed).
    pub fn fits(&self, trip: Trip, pending: &[Trip], travel: impl Fn(u32, u32) -> i64) -> bool {
        let idx = self.trips.partition_point(|t| t.end <= trip.start);
        if let Some(next) = self.trips.get(idx) {
            if next.start < trip.end
                || trip.end.saturating_add(travel(trip.to, next.from)) > next.start
            {
                return false;
            }
        }
        let (ready, at) = self.ready_before(trip.start, pending, idx);
        ready.saturating_add(travel(at, trip.from)) <= trip.start
    }

    /// Earliest lift at or after `earliest` for a trip of `duration`.
    pub fn earliest(
        &self,
        earliest: i64,
        duration: i64,
        from: u32,
        to: u32,
        pending: &[Trip],
        travel: impl Fn(u32, u32) -> i64,
    ) -> i64 {
        let mut starts: Vec<i64> = std::iter::once(earliest)
            .chain(self.ready_times(from, &travel))
            .chain(pending.iter().map(|p| p.end.saturating_add(travel(p.to, from))))
            .filter(|&s| s >= earliest)
            .collect();
        starts.sort_unstable();
        starts.dedup();

        let trip = |start: i64| Trip {
            start,
            end: start.saturating_add(duration),
            from,
            to,
        };
        starts
            .into_iter()
            .find(|&s| self.fits(trip(s), pending, &travel))
            .unwrap_or_else(|| {
                // after every trip nothing follows, so only the approach matters
                let (ready, at) = self.ready_before(i64::MAX, pending, self.trips.len());
                earliest.max(ready.saturating_add(travel(at, from)))
            })
    }

    /// Times at which the hoist could be at `station` after each trip,
    /// and after leaving home.
    pub fn ready_times<'a>(
        &'a self,
        station: u32,
        travel: &'a impl Fn(u32, u32) -> i64,
    ) -> impl Iterator<Item = i64> + 'a {
        std::iter::once(travel(self.home, station))
            .chain(self.trips.iter().map(move |t| t.end.saturating_add(travel(t.to, station))))
    }

    /// Reserves a trip. The caller guarantees it fits.
    pub fn reserve(&mut self, trip: Trip) {
        let idx = self.trips.partition_point(|t| t.start <= trip.start);
        self.trips.insert(idx, trip);
    }

    pub fn latest_end(&self) -> Option<i64> {
        self.trips.iter().map(|t| t.end).max()
    }

    /// Where and since when the hoist is free before `start`: the latest
    /// of `trips[..idx]` and `pending`, or home at time 0.
    fn ready_before(&self, start: i64, pending: &[Trip], idx: usize) -> (i64, u32) {
        self.trips[..idx]
            .iter()
            .chain(pending.iter().filter(|p| p.end <= start))
            .max_by_key(|t| t.end)
            .map(|t| (t.end, t.to))
            .unwrap_or((0, self.home))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Timeline {
        let mut t = Timeline::new();
        t.reserve(100, 200);
        t.reserve(0, 50);
        t
    }

    #[test]
    fn test_free_gaps() {
        let t = sample();
        assert!(t.is_free(50, 100));
        assert!(t.is_free(200, 300));
        assert!(t.is_free(60, 70));
        assert!(!t.is_free(40, 60));
        assert!(!t.is_free(150, 160));
        assert!(!t.is_free(90, 210));
    }

    #[test]
    fn test_point_requests() {
        let t = sample();
        assert!(!t.is_free(0, 0));
        assert!(!t.is_free(150, 150));
        assert!(t.is_free(50, 50));
        assert!(t.is_free(200, 200));
    }

    #[test]
    fn test_reserve_keeps_order() {
        let mut t = sample();
        t.reserve(60, 80);
        assert_eq!(t.len(), 3);
        assert!(!t.is_free(70, 75));
        assert_eq!(t.latest_end(), Some(200));
        let ends: Vec<i64> = t.ends().collect();
        assert_eq!(ends, vec![50, 80, 200]);
    }

    #[test]
    fn test_empty() {
        let t = Timeline::new();
        assert!(t.is_empty());
        assert!(t.is_free(0, 1_000));
        assert_eq!(t.latest_end(), None);
    }

    fn travel(a: u32, b: u32) -> i64 {
        (a as i64 - b as i64).abs() * 10
    }

    fn track() -> HoistTrack {
        let mut t = HoistTrack::new(1);
        t.reserve(Trip { start: 100, end: 120, from: 1, to: 3 });
        t.reserve(Trip { start: 200, end: 220, from: 5, to: 6 });
        t
    }

    #[test]
    fn test_trip_needs_empty_move_from_previous_drop() {
        let t = track();
        // hoist is at 3 from 120, reaching 4 at 130
        assert!(!t.fits(Trip { start: 125, end: 140, from: 4, to: 5 }, &[], travel));
        assert!(t.fits(Trip { start: 130, end: 140, from: 4, to: 5 }, &[], travel));
    }

    #[test]
    fn test_trip_must_leave_time_to_reach_next_pickup() {
        let t = track();
        // 150..180 ends at 2, 30 s from station 5 where the 200 trip starts
        assert!(!t.fits(Trip { start: 150, end: 180, from: 3, to: 2 }, &[], travel));
        assert!(t.fits(Trip { start: 150, end: 170, from: 3, to: 2 }, &[], travel));
    }

    #[test]
    fn test_first_trip_starts_from_home() {
        let t = HoistTrack::new(1);
        assert!(!t.fits(Trip { start: 10, end: 20, from: 3, to: 4 }, &[], travel));
        assert!(t.fits(Trip { start: 20, end: 30, from: 3, to: 4 }, &[], travel));
    }

    #[test]
    fn test_pending_trip_counts_as_predecessor() {
        let t = HoistTrack::new(1);
        let pending = [Trip { start: 0, end: 50, from: 1, to: 6 }];
        assert!(!t.fits(Trip { start: 60, end: 70, from: 4, to: 5 }, &pending, travel));
        assert!(t.fits(Trip { start: 70, end: 80, from: 4, to: 5 }, &pending, travel));
    }

    #[test]
    fn test_earliest_skips_blocked_gap() {
        let t = track();
        // dropping at 2 by 180 leaves no time to reach 5 for the 200 trip
        assert_eq!(t.earliest(150, 30, 3, 2, &[], travel), 250);
        assert_eq!(t.earliest(150, 30, 3, 5, &[], travel), 150);
        assert_eq!(t.earliest(0, 10, 3, 3, &[], travel), 20);
        assert_eq!(t.latest_end(), Some(220));
    }
}


//! Rolling-window chart statistics for a single asset

use std::collections::VecDeque;

use ticker_core::ChartData;

/// Default number of prices kept in the window
pub const DEFAULT_WINDOW: usize = 10;

/// Bounded price history with all-time min/max.
///
/// The window holds at most `capacity` prices; min and max cover every price
/// recorded since creation, including ones already evicted.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    prices: VecDeque<f64>,
    min: Option<f64>,
    max: Option<f64>,
    recorded: u64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            prices: VecDeque::with_capacity(capacity),
            min: None,
            max: None,
            recorded: 0,
        }
    }

    /// Record a price, evicting the oldest one once the window is full.
    /// Negative and non-finite prices are ignored.
    pub fn record_price(&mut self, price: f64) {
        if !price.is_finite() || price < 0.0 {
            return;
        }

        self.min = Some(self.min.map_or(price, |min| min.min(price)));
        self.max = Some(self.max.map_or(price, |max| max.max(price)));

        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
        self.recorded += 1;
    }

    /// Chart statistics, or `None` until the first price arrives
    pub fn compute_stats(&self) -> Option<ChartData> {
        let (min, max) = (self.min?, self.max?);
        let delta = max - min;

        let dots = self
            .prices
            .iter()
            .map(|price| {
                if delta > 0.0 {
                    ((max - price) / delta).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect();

        Some(ChartData { min, max, dots })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Total prices recorded, evicted ones included
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.prices.iter().copied()
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_window_has_no_stats() {
        let window = RollingWindow::default();
        assert!(window.compute_stats().is_none());
        assert!(window.is_empty());
    }

    #[test]
    fn test_single_price_stats() {
        let mut window = RollingWindow::default();
        window.record_price(100.0);

        let stats = window.compute_stats().unwrap();
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.dots, vec![0.0]);
    }

    #[test]
    fn test_dots_are_inverted() {
        let mut window = RollingWindow::default();
        for price in [10.0, 20.0, 15.0] {
            window.record_price(price);
        }

        let stats = window.compute_stats().unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 20.0);
        assert_eq!(stats.dots, vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_window_capacity_is_exact() {
        let mut window = RollingWindow::new(10);
        for i in 0..15 {
            window.record_price(i as f64);
        }

        assert_eq!(window.len(), 10);
        assert_eq!(window.recorded(), 15);
        // Oldest evicted first
        assert_eq!(window.prices().next(), Some(5.0));
    }

    #[test]
    fn test_min_max_survive_eviction() {
        let mut window = RollingWindow::new(2);
        window.record_price(1.0);
        window.record_price(50.0);
        window.record_price(20.0);
        window.record_price(30.0);

        let stats = window.compute_stats().unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 50.0);
        assert_eq!(stats.dots.len(), 2);
    }

    #[test]
    fn test_invalid_prices_ignored() {
        let mut window = RollingWindow::default();
        window.record_price(f64::NAN);
        window.record_price(-1.0);
        window.record_price(f64::INFINITY);
        assert!(window.compute_stats().is_none());
        assert_eq!(window.recorded(), 0);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut window = RollingWindow::new(0);
        window.record_price(1.0);
        window.record_price(2.0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_min_max_bound_every_price(prices in prop::collection::vec(0.0f64..1e9, 1..100)) {
            let mut window = RollingWindow::new(DEFAULT_WINDOW);
            for &p in &prices {
                window.record_price(p);
            }
            let (min, max) = (window.min().unwrap(), window.max().unwrap());
            for &p in &prices {
                prop_assert!(min <= p && p <= max);
            }
        }

        #[test]
        fn prop_dots_in_unit_range(prices in prop::collection::vec(0.0f64..1e6, 1..50)) {
            let mut window = RollingWindow::new(DEFAULT_WINDOW);
            for &p in &prices {
                window.record_price(p);
            }
            let stats = window.compute_stats().unwrap();
            let retained: Vec<f64> = window.prices().collect();
            for (dot, price) in stats.dots.iter().zip(retained) {
                prop_assert!((0.0..=1.0).contains(dot));
                if price == stats.max {
                    prop_assert_eq!(*dot, 0.0);
                }
                if price == stats.min && stats.min != stats.max {
                    prop_assert_eq!(*dot, 1.0);
                }
            }
        }

        #[test]
        fn prop_window_bounded(capacity in 1usize..20, extra in 0usize..10) {
            let mut window = RollingWindow::new(capacity);
            for i in 0..capacity + 5 + extra {
                window.record_price(((i * 7919) % 101) as f64);
            }
            prop_assert_eq!(window.len(), capacity);
        }
    }
}

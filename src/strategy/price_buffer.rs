use std::collections::VecDeque;

/// Window size used when a capacity of zero is requested
pub const DEFAULT_CAPACITY: usize = 64;

/// Transitions inspected by [`PriceBuffer::trend`]
const TREND_LOOKBACK: usize = 6;

/// Samples-minus-one inspected by [`PriceBuffer::slope`] and [`PriceBuffer::volatility`]
const STATS_LOOKBACK: usize = 8;

/// Rolling window of recent closing prices
///
/// Exposes lightweight statistics (trend direction, slope, volatility) so
/// strategies can act before their indicator suite has warmed up. Oldest
/// samples are evicted once the window is full.
#[derive(Debug, Clone)]
pub struct PriceBuffer {
    capacity: usize,
    buf: VecDeque<f64>,
}

impl PriceBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a price, evicting the oldest one beyond capacity
    pub fn add(&mut self, price: f64) {
        self.buf.push_back(price);
        while self.buf.len() > self.capacity {
            self.buf.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent price, 0 when empty
    pub fn last(&self) -> f64 {
        self.buf.back().copied().unwrap_or_default()
    }

    /// Price before the most recent one, 0 with fewer than two samples
    pub fn prev(&self) -> f64 {
        if self.buf.len() < 2 {
            return 0.0;
        }
        self.buf[self.buf.len() - 2]
    }

    /// Copy of the window, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.buf.iter().copied().collect()
    }

    /// Direction of recent movement: -1, 0 or +1
    ///
    /// Scores +1 per up-tick and -1 per down-tick over the last
    /// `min(6, len-1)` transitions and only reports a direction when the net
    /// score reaches `max(2, lookback/3)`.
    pub fn trend(&self) -> i32 {
        if self.buf.len() < 2 {
            return 0;
        }
        let lookback = TREND_LOOKBACK.min(self.buf.len() - 1);
        let score: i32 = self
            .steps(lookback)
            .map(|d| match d.partial_cmp(&0.0) {
                Some(std::cmp::Ordering::Greater) => 1,
                Some(std::cmp::Ordering::Less) => -1,
                _ => 0,
            })
            .sum();

        let threshold = (lookback as i32 / 3).max(2);
        if score >= threshold {
            1
        } else if score <= -threshold {
            -1
        } else {
            0
        }
    }

    /// Least-squares slope of price against sample index
    ///
    /// Fits the last `min(8, len-1) + 1` samples; 0 with fewer than two
    /// samples or a degenerate fit.
    pub fn slope(&self) -> f64 {
        if self.buf.len() < 2 {
            return 0.0;
        }
        let lookback = STATS_LOOKBACK.min(self.buf.len() - 1);
        // Slope is shift-invariant; anchoring on the first sample keeps a
        // flat window at exactly zero.
        let points = self.window(lookback);
        let origin = points.clone().next().unwrap_or_default();

        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        let mut count = 0usize;
        for (i, p) in points.enumerate() {
            let x = i as f64;
            let y = p - origin;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
            count += 1;
        }
        let n = count as f64;
        let den = n * sum_xx - sum_x * sum_x;
        if den == 0.0 {
            return 0.0;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / den;
        if slope.is_finite() {
            slope
        } else {
            0.0
        }
    }

    /// Mean absolute change between consecutive samples
    ///
    /// Uses the same window as [`slope`](Self::slope); 0 with fewer than two samples.
    pub fn volatility(&self) -> f64 {
        if self.buf.len() < 2 {
            return 0.0;
        }
        let lookback = STATS_LOOKBACK.min(self.buf.len() - 1);
        let total: f64 = self.steps(lookback).map(f64::abs).sum();
        total / lookback as f64
    }

    /// The last `lookback + 1` samples, oldest first
    fn window(&self, lookback: usize) -> impl Iterator<Item = f64> + Clone + '_ {
        let start = self.buf.len().saturating_sub(lookback + 1);
        self.buf.range(start..).copied()
    }

    /// Changes between consecutive samples of [`window`](Self::window)
    fn steps(&self, lookback: usize) -> impl Iterator<Item = f64> + '_ {
        let window = self.window(lookback);
        window.clone().zip(window.skip(1)).map(|(a, b)| b - a)
    }
}

impl Default for PriceBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

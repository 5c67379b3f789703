//! Exponential moving average.
//!
//! Forward, incremental computation seeded with the first observation:
//!   bar 0  -> value = price
//!   bar 1+ -> value = alpha * price + (1 - alpha) * prev, alpha = 2 / (window + 1)

/// Incremental EMA.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
    window: usize,
    count: usize,
}

impl Ema {
    /// Create a new EMA over `window` periods.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            alpha: 2.0 / (window as f64 + 1.0),
            value: None,
            window,
            count: 0,
        }
    }

    /// Feed one price, return the current EMA value.
    pub fn update(&mut self, price: f64) -> f64 {
        let next = match self.value {
            None => price,
            Some(prev) => self.alpha * price + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        self.count += 1;
        next
    }

    /// Current value, if any price has been seen.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// True once `window` prices have been seen.
    pub fn is_warm(&self) -> bool {
        self.count >= self.window
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Clear all data.
    pub fn reset(&mut self) {
        self.value = None;
        self.count = 0;
    }
}

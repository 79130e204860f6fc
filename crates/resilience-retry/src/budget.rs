//! Retry budgets: an optional, process-wide cap on total retries shared
//! across every call through one [`crate::RetryStrategy`] instance, to
//! prevent a retry storm from amplifying load on an already-struggling
//! downstream. Off by default -- set via
//! [`crate::config::RetryConfigBuilder::retry_budget`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Controls how many retries are allowed across all calls sharing one
/// [`crate::RetryStrategy`].
pub trait RetryBudget: Send + Sync {
    /// Attempts to withdraw one retry token. Returns `false` once the
    /// budget is exhausted, in which case the caller should give up
    /// retrying rather than spend more of a struggling downstream's
    /// capacity.
    fn try_withdraw(&self) -> bool;

    /// Deposits a token back, typically called on a successful outcome.
    fn deposit(&self);

    /// The current balance, for observability.
    fn balance(&self) -> usize;
}

/// Builder entry point for the two budget kinds this crate ships.
#[derive(Clone, Default)]
pub struct RetryBudgetBuilder;

impl RetryBudgetBuilder {
    /// Creates a new budget builder.
    pub fn new() -> Self {
        Self
    }

    /// A token bucket budget: tokens refill continuously at
    /// `tokens_per_second` up to `max_tokens`, and a retry consumes one.
    pub fn token_bucket(self) -> TokenBucketBudgetBuilder {
        TokenBucketBudgetBuilder {
            tokens_per_second: 10.0,
            max_tokens: 100,
            initial_tokens: None,
        }
    }

    /// An AIMD budget: grows additively on success, shrinks
    /// multiplicatively once exhausted -- the same shape TCP congestion
    /// control uses to back off under sustained pressure.
    pub fn aimd(self) -> AimdBudgetBuilder {
        AimdBudgetBuilder {
            min_budget: 10,
            max_budget: 1000,
            deposit_amount: 1,
            withdraw_amount: 1,
            decrease_factor: 0.5,
        }
    }
}

/// Builder for [`TokenBucketBudget`].
pub struct TokenBucketBudgetBuilder {
    tokens_per_second: f64,
    max_tokens: usize,
    initial_tokens: Option<usize>,
}

impl TokenBucketBudgetBuilder {
    /// Sets the refill rate. Default: 10 tokens/second.
    pub fn tokens_per_second(mut self, rate: f64) -> Self {
        self.tokens_per_second = rate;
        self
    }

    /// Sets the bucket capacity. Default: 100.
    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Sets the starting balance. Defaults to `max_tokens`.
    pub fn initial_tokens(mut self, initial: usize) -> Self {
        self.initial_tokens = Some(initial);
        self
    }

    /// Builds the budget.
    pub fn build(self) -> Arc<dyn RetryBudget> {
        Arc::new(TokenBucketBudget::new(
            self.tokens_per_second,
            self.max_tokens,
            self.initial_tokens.unwrap_or(self.max_tokens),
        ))
    }
}

/// Builder for [`AimdBudget`].
pub struct AimdBudgetBuilder {
    min_budget: usize,
    max_budget: usize,
    deposit_amount: usize,
    withdraw_amount: usize,
    decrease_factor: f64,
}

impl AimdBudgetBuilder {
    /// Sets the budget floor -- it never decreases below this. Default: 10.
    pub fn min_budget(mut self, min: usize) -> Self {
        self.min_budget = min;
        self
    }

    /// Sets the absolute ceiling the budget can grow back towards.
    /// Default: 1000.
    pub fn max_budget(mut self, max: usize) -> Self {
        self.max_budget = max;
        self
    }

    /// Tokens added per successful deposit. Default: 1.
    pub fn deposit_amount(mut self, amount: usize) -> Self {
        self.deposit_amount = amount;
        self
    }

    /// Tokens consumed per withdrawal. Default: 1.
    pub fn withdraw_amount(mut self, amount: usize) -> Self {
        self.withdraw_amount = amount;
        self
    }

    /// Factor the current ceiling is multiplied by on exhaustion.
    /// Default: 0.5.
    pub fn decrease_factor(mut self, factor: f64) -> Self {
        self.decrease_factor = factor;
        self
    }

    /// Builds the budget.
    pub fn build(self) -> Arc<dyn RetryBudget> {
        Arc::new(AimdBudget::new(
            self.min_budget,
            self.max_budget,
            self.deposit_amount,
            self.withdraw_amount,
            self.decrease_factor,
        ))
    }
}

/// Token bucket retry budget. Tokens refill continuously based on elapsed
/// wall-clock time, up to `max_tokens`; each retry consumes one.
pub struct TokenBucketBudget {
    tokens: AtomicU64,
    max_tokens: u64,
    tokens_per_second: f64,
    last_refill: std::sync::Mutex<Instant>,
}

const SCALE: u64 = 1_000;

impl TokenBucketBudget {
    /// Creates a new token bucket with `initial_tokens` already banked.
    pub fn new(tokens_per_second: f64, max_tokens: usize, initial_tokens: usize) -> Self {
        Self {
            tokens: AtomicU64::new((initial_tokens as u64) * SCALE),
            max_tokens: (max_tokens as u64) * SCALE,
            tokens_per_second,
            last_refill: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn refill(&self) {
        if self.tokens_per_second <= 0.0 {
            return;
        }
        let mut last_refill = self.last_refill.lock().unwrap();
        let now = Instant::now();
        let elapsed = now.duration_since(*last_refill);
        if elapsed < Duration::from_millis(1) {
            return;
        }
        *last_refill = now;
        let earned = (elapsed.as_secs_f64() * self.tokens_per_second * SCALE as f64) as u64;
        if earned == 0 {
            return;
        }
        let mut current = self.tokens.load(Ordering::Relaxed);
        loop {
            let new_tokens = current.saturating_add(earned).min(self.max_tokens);
            match self.tokens.compare_exchange_weak(
                current,
                new_tokens,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

impl RetryBudget for TokenBucketBudget {
    fn try_withdraw(&self) -> bool {
        self.refill();

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current < SCALE {
                return false;
            }
            let new_tokens = current - SCALE;
            if self
                .tokens
                .compare_exchange_weak(current, new_tokens, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn deposit(&self) {
        let current = self.tokens.load(Ordering::Relaxed);
        let new_tokens = (current + SCALE).min(self.max_tokens);
        self.tokens.store(new_tokens, Ordering::Relaxed);
    }

    fn balance(&self) -> usize {
        (self.tokens.load(Ordering::Relaxed) / SCALE) as usize
    }
}

/// AIMD (additive increase, multiplicative decrease) retry budget.
pub struct AimdBudget {
    tokens: AtomicU64,
    min_budget: u64,
    current_max: AtomicU64,
    absolute_max: u64,
    deposit_amount: u64,
    withdraw_amount: u64,
    decrease_factor: f64,
}

impl AimdBudget {
    /// Creates a new AIMD budget starting at `max_budget` tokens.
    pub fn new(
        min_budget: usize,
        max_budget: usize,
        deposit_amount: usize,
        withdraw_amount: usize,
        decrease_factor: f64,
    ) -> Self {
        Self {
            tokens: AtomicU64::new(max_budget as u64),
            min_budget: min_budget as u64,
            current_max: AtomicU64::new(max_budget as u64),
            absolute_max: max_budget as u64,
            deposit_amount: deposit_amount as u64,
            withdraw_amount: withdraw_amount as u64,
            decrease_factor,
        }
    }
}

impl RetryBudget for AimdBudget {
    fn try_withdraw(&self) -> bool {
        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current < self.withdraw_amount {
                let current_max = self.current_max.load(Ordering::Relaxed);
                let new_max =
                    ((current_max as f64 * self.decrease_factor) as u64).max(self.min_budget);
                self.current_max.store(new_max, Ordering::Relaxed);
                return false;
            }
            let new_tokens = current - self.withdraw_amount;
            if self
                .tokens
                .compare_exchange_weak(current, new_tokens, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn deposit(&self) {
        let current_max = self.current_max.load(Ordering::Relaxed);
        let current = self.tokens.load(Ordering::Relaxed);

        let new_tokens = (current + self.deposit_amount).min(current_max);
        self.tokens.store(new_tokens, Ordering::Relaxed);

        if current_max < self.absolute_max {
            let new_max = (current_max + 1).min(self.absolute_max);
            self.current_max.store(new_max, Ordering::Relaxed);
        }
    }

    fn balance(&self) -> usize {
        self.tokens.load(Ordering::Relaxed) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_blocks_once_drained_and_deposit_unblocks_one_withdrawal() {
        let budget = TokenBucketBudget::new(0.0, 5, 5);

        for _ in 0..5 {
            assert!(budget.try_withdraw());
        }
        assert!(!budget.try_withdraw());

        budget.deposit();
        assert!(budget.try_withdraw());
        assert!(!budget.try_withdraw());
    }

    #[test]
    fn token_bucket_reports_balance() {
        let budget = TokenBucketBudget::new(0.0, 100, 50);
        assert_eq!(budget.balance(), 50);

        budget.try_withdraw();
        assert_eq!(budget.balance(), 49);

        budget.deposit();
        assert_eq!(budget.balance(), 50);
    }

    #[tokio::test]
    async fn token_bucket_refills_over_time() {
        let budget = TokenBucketBudget::new(1000.0, 5, 0);
        assert!(!budget.try_withdraw());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(budget.try_withdraw(), "should have refilled at least one token after 10ms at 1000/s");
    }

    #[test]
    fn aimd_shrinks_its_ceiling_once_exhausted() {
        let budget = AimdBudget::new(5, 10, 1, 1, 0.5);

        for _ in 0..10 {
            assert!(budget.try_withdraw());
        }
        assert!(!budget.try_withdraw());

        for _ in 0..5 {
            budget.deposit();
        }
        assert!(budget.try_withdraw());
    }

    #[test]
    fn aimd_never_shrinks_below_its_floor() {
        let budget = AimdBudget::new(5, 10, 1, 1, 0.1);

        for _ in 0..20 {
            budget.try_withdraw();
        }
        for _ in 0..5 {
            budget.deposit();
        }

        let mut count = 0;
        while budget.try_withdraw() {
            count += 1;
        }
        assert!(count >= 1, "should allow at least one withdrawal after depositing back to the floor");
    }

    #[test]
    fn builder_token_bucket_sets_initial_balance() {
        let budget = RetryBudgetBuilder::new()
            .token_bucket()
            .tokens_per_second(100.0)
            .max_tokens(50)
            .initial_tokens(25)
            .build();
        assert_eq!(budget.balance(), 25);
    }

    #[test]
    fn builder_aimd_sets_initial_balance() {
        let budget = RetryBudgetBuilder::new()
            .aimd()
            .min_budget(5)
            .max_budget(100)
            .deposit_amount(2)
            .withdraw_amount(1)
            .build();
        assert_eq!(budget.balance(), 100);
    }
}

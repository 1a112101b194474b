use super::cancel::CancellationToken;
use super::config::FinderConfig;
use super::error::EngineError;
use super::progress::ProgressReporter;

/// Everything a ratio search needs besides the two endpoint entries.
pub struct SearchContext<'a, O, B> {
    pub oracle: &'a O,
    pub balancer: &'a B,
    pub config: &'a FinderConfig,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: Option<&'a CancellationToken>,
}

impl<O, B> Clone for SearchContext<'_, O, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, B> Copy for SearchContext<'_, O, B> {}

impl<'a, O, B> SearchContext<'a, O, B> {
    pub fn new(
        oracle: &'a O,
        balancer: &'a B,
        config: &'a FinderConfig,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            oracle,
            balancer,
            config,
            reporter,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: Option<&'a CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Re-targets the context at another oracle, keeping every other setting.
    pub fn with_oracle<'b, P>(&self, oracle: &'b P) -> SearchContext<'b, P, B>
    where
        'a: 'b,
    {
        SearchContext {
            oracle,
            balancer: self.balancer,
            config: self.config,
            reporter: self.reporter,
            cancel: self.cancel,
        }
    }

    pub fn check_cancelled(&self) -> Result<(), EngineError> {
        self.cancel.map_or(Ok(()), CancellationToken::check)
    }
}

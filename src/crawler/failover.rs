//! Per-request retry and alternative-link failover
//!
//! Every logical request carries a [`RequestContext`]. When a fetch fails the
//! [`FailoverController`] decides what happens next:
//!
//! 1. Retry the same URL after a fixed delay, up to `max_retries` times
//! 2. Once retries are exhausted, advance to the next alternative link
//!    (the same URL under a sibling scheme) with a fresh retry budget
//! 3. Once alternatives are exhausted, fail terminally
//!
//! The controller only mutates the context; sleeping and re-dispatching are
//! left to the crawl driver so a retrying request never blocks others.

use crate::crawler::fetcher::FetchFailure;
use crate::state::RequestState;
use crate::url::SchemeSet;
use crate::{ScraperError, UrlResult};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Status class a failed URL is reported under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// HTTP 404, any unclassified status, or no response at all
    NotFound,
    /// HTTP 500
    ServerError,
}

impl FailureClass {
    /// Classifies a failure by its HTTP status
    ///
    /// Connection errors have no status and fold into `NotFound`.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(500) => Self::ServerError,
            _ => Self::NotFound,
        }
    }

    /// The status code reported for this class
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::ServerError => 500,
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

/// A URL whose retry budget ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhaustedUrl {
    pub url: String,
    pub class: FailureClass,
}

/// Failover state for one logical request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// URL currently being fetched
    pub url: String,
    /// URL the context was created for
    pub original_url: String,
    /// Sibling-scheme URLs still to try, in order
    pub alternative_links: VecDeque<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Fixed delay before each retry
    pub sleep_time: Duration,
    /// Source file in file-diff mode
    pub file_path: Option<String>,
    state: RequestState,
    dispatch_count: u32,
    last_status: Option<u16>,
    exhausted: Vec<ExhaustedUrl>,
}

impl RequestContext {
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Number of times this context has been handed to the fetcher
    pub fn dispatch_count(&self) -> u32 {
        self.dispatch_count
    }

    /// HTTP status of the most recent failure, if it had one
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// URLs whose retry budget ran out, in the order they were tried
    pub fn exhausted(&self) -> &[ExhaustedUrl] {
        &self.exhausted
    }

    /// Class of the final failure
    pub fn failure_class(&self) -> FailureClass {
        FailureClass::from_status(self.last_status)
    }

    fn transition(&mut self, next: RequestState) -> Result<(), ScraperError> {
        if !self.state.can_transition_to(next) {
            return Err(ScraperError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(url = %self.url, from = %self.state, to = %next, "Request transition");
        self.state = next;
        Ok(())
    }
}

/// What the driver must do after a failed fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverDecision {
    /// Sleep for `delay`, then dispatch the same URL again
    Retry { delay: Duration },
    /// Dispatch the context again; it now points at `url`
    Advance { url: String },
    /// Give up; report the context to the stats aggregator
    Terminal { class: FailureClass },
}

/// Drives [`RequestContext`]s through the failover state machine
#[derive(Debug, Clone)]
pub struct FailoverController {
    max_retries: u32,
    sleep_time: Duration,
    schemes: SchemeSet,
}

impl FailoverController {
    pub fn new(max_retries: u32, sleep_time: Duration) -> Self {
        Self {
            max_retries,
            sleep_time,
            schemes: SchemeSet::default(),
        }
    }

    pub fn with_schemes(mut self, schemes: SchemeSet) -> Self {
        self.schemes = schemes;
        self
    }

    /// Creates a fresh context with its alternative links
    ///
    /// # Errors
    ///
    /// Returns `UrlError::InvalidScheme` if `url` has no configured scheme; the
    /// request cannot be dispatched.
    pub fn context(&self, url: &str, file_path: Option<String>) -> UrlResult<RequestContext> {
        let alternatives = self.schemes.alternate_schemes(url)?;
        Ok(RequestContext {
            url: url.to_string(),
            original_url: url.to_string(),
            alternative_links: alternatives.into(),
            retry_count: 0,
            max_retries: self.max_retries,
            sleep_time: self.sleep_time,
            file_path,
            state: RequestState::Pending,
            dispatch_count: 0,
            last_status: None,
            exhausted: Vec::new(),
        })
    }

    /// Marks the context as handed to the fetcher
    pub fn dispatch(&self, ctx: &mut RequestContext) -> Result<(), ScraperError> {
        ctx.transition(RequestState::InFlight)?;
        ctx.dispatch_count += 1;
        Ok(())
    }

    /// Records a successful fetch
    pub fn succeed(&self, ctx: &mut RequestContext) -> Result<(), ScraperError> {
        ctx.transition(RequestState::Succeeded)
    }

    /// Records a failed fetch and decides the next step
    pub fn fail(
        &self,
        ctx: &mut RequestContext,
        failure: &FetchFailure,
    ) -> Result<FailoverDecision, ScraperError> {
        ctx.last_status = failure.status();

        if ctx.retry_count < ctx.max_retries {
            ctx.transition(RequestState::Retrying)?;
            ctx.retry_count += 1;
            debug!(
                url = %ctx.url,
                retry = ctx.retry_count,
                max_retries = ctx.max_retries,
                error = %failure,
                "Retrying request"
            );
            return Ok(FailoverDecision::Retry {
                delay: ctx.sleep_time,
            });
        }

        ctx.exhausted.push(ExhaustedUrl {
            url: ctx.url.clone(),
            class: FailureClass::from_status(ctx.last_status),
        });

        if let Some(next) = ctx.alternative_links.pop_front() {
            ctx.transition(RequestState::AdvancingAlternative)?;
            debug!(from = %ctx.url, to = %next, "Trying alternative link");
            ctx.url = next.clone();
            ctx.retry_count = 0;
            return Ok(FailoverDecision::Advance { url: next });
        }

        ctx.transition(RequestState::TerminallyFailed)?;
        Ok(FailoverDecision::Terminal {
            class: ctx.failure_class(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> FailoverController {
        FailoverController::new(3, Duration::from_millis(0))
    }

    fn three_scheme_controller() -> FailoverController {
        controller().with_schemes(SchemeSet::new(["https", "http", "ws"]))
    }

    /// Dispatches and fails the context until it terminates
    fn run_to_terminal(
        controller: &FailoverController,
        ctx: &mut RequestContext,
        failure: &FetchFailure,
    ) -> FailureClass {
        loop {
            controller.dispatch(ctx).unwrap();
            if let FailoverDecision::Terminal { class } = controller.fail(ctx, failure).unwrap() {
                return class;
            }
        }
    }

    #[test]
    fn test_context_has_alternatives() {
        let ctx = controller()
            .context("https://docs.example.com/a", None)
            .unwrap();

        assert_eq!(ctx.state(), RequestState::Pending);
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(
            ctx.alternative_links,
            VecDeque::from(vec!["http://docs.example.com/a".to_string()])
        );
    }

    #[test]
    fn test_context_rejects_unschemed_url() {
        assert!(controller().context("/relative", None).is_err());
    }

    #[test]
    fn test_success_path() {
        let controller = controller();
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();

        controller.dispatch(&mut ctx).unwrap();
        controller.succeed(&mut ctx).unwrap();

        assert_eq!(ctx.state(), RequestState::Succeeded);
        assert_eq!(ctx.dispatch_count(), 1);
    }

    #[test]
    fn test_cannot_succeed_without_dispatch() {
        let controller = controller();
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();

        assert!(matches!(
            controller.succeed(&mut ctx),
            Err(ScraperError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_retries_same_url_with_fixed_delay() {
        let controller = FailoverController::new(3, Duration::from_secs(1));
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();
        let failure = FetchFailure::HttpStatus { code: 503 };

        for expected in 1..=3 {
            controller.dispatch(&mut ctx).unwrap();
            let decision = controller.fail(&mut ctx, &failure).unwrap();
            assert_eq!(
                decision,
                FailoverDecision::Retry {
                    delay: Duration::from_secs(1)
                }
            );
            assert_eq!(ctx.retry_count, expected);
            assert_eq!(ctx.url, "https://docs.example.com/");
            assert_eq!(ctx.state(), RequestState::Retrying);
        }
    }

    #[test]
    fn test_advances_after_retries_and_resets_count() {
        let controller = controller();
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();
        let failure = FetchFailure::HttpStatus { code: 500 };

        for _ in 0..3 {
            controller.dispatch(&mut ctx).unwrap();
            controller.fail(&mut ctx, &failure).unwrap();
        }
        controller.dispatch(&mut ctx).unwrap();
        let decision = controller.fail(&mut ctx, &failure).unwrap();

        assert_eq!(
            decision,
            FailoverDecision::Advance {
                url: "http://docs.example.com/".to_string()
            }
        );
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(ctx.url, "http://docs.example.com/");
        assert_eq!(ctx.original_url, "https://docs.example.com/");
        assert_eq!(ctx.state(), RequestState::AdvancingAlternative);
        assert!(ctx.alternative_links.is_empty());
    }

    #[test]
    fn test_worst_case_dispatch_count() {
        let controller = three_scheme_controller();
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();
        assert_eq!(ctx.alternative_links.len(), 2);

        let class = run_to_terminal(&controller, &mut ctx, &FetchFailure::HttpStatus { code: 500 });

        assert_eq!(class, FailureClass::ServerError);
        assert_eq!(ctx.state(), RequestState::TerminallyFailed);
        // initial dispatch, 3 retries, then dispatch + 3 retries per alternative
        assert_eq!(ctx.dispatch_count(), 1 + 3 + 2 * (1 + 3));
        assert!(ctx.retry_count <= ctx.max_retries);
    }

    #[test]
    fn test_exhausted_urls_are_distinct() {
        let controller = three_scheme_controller();
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();

        run_to_terminal(&controller, &mut ctx, &FetchFailure::HttpStatus { code: 500 });

        let urls: Vec<_> = ctx.exhausted().iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://docs.example.com/",
                "http://docs.example.com/",
                "ws://docs.example.com/"
            ]
        );
        assert!(ctx
            .exhausted()
            .iter()
            .all(|e| e.class == FailureClass::ServerError));
    }

    #[test]
    fn test_no_alternatives_fails_after_retries() {
        let controller = controller().with_schemes(SchemeSet::new(["https"]));
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();
        assert!(ctx.alternative_links.is_empty());

        let class = run_to_terminal(&controller, &mut ctx, &FetchFailure::HttpStatus { code: 404 });

        assert_eq!(class, FailureClass::NotFound);
        assert_eq!(ctx.dispatch_count(), 4);
    }

    #[test]
    fn test_transport_errors_fold_into_not_found() {
        let controller = controller();
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();

        let class = run_to_terminal(
            &controller,
            &mut ctx,
            &FetchFailure::Transport("connection refused".to_string()),
        );

        assert_eq!(class, FailureClass::NotFound);
        assert_eq!(ctx.last_status(), None);
    }

    #[test]
    fn test_terminal_context_cannot_be_dispatched() {
        let controller = controller().with_schemes(SchemeSet::new(["https"]));
        let mut ctx = controller.context("https://docs.example.com/", None).unwrap();
        run_to_terminal(&controller, &mut ctx, &FetchFailure::HttpStatus { code: 404 });

        assert!(controller.dispatch(&mut ctx).is_err());
    }

    #[test]
    fn test_failure_class_mapping() {
        assert_eq!(FailureClass::from_status(Some(404)), FailureClass::NotFound);
        assert_eq!(FailureClass::from_status(Some(500)), FailureClass::ServerError);
        assert_eq!(FailureClass::from_status(Some(403)), FailureClass::NotFound);
        assert_eq!(FailureClass::from_status(None), FailureClass::NotFound);
        assert_eq!(FailureClass::ServerError.to_string(), "500");
    }
}

//! Smart-retry decision logic, kept free of I/O so it can be tested on its own.
//!
//! Attempt order: original model → same model after a fixed backoff →
//! fallback model → give up. Fatal errors give up immediately.

use std::time::Duration;

use super::ErrorCategory;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub fallback_model: String,
    pub backoff: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryAction {
    RetrySameModel { backoff: Duration },
    SwitchModel(String),
    GiveUp,
}

/// Where a smart-retry sequence currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// 0 = original call, 1 = same-model retry, 2 = fallback.
    pub attempt: u32,
    pub original_model: String,
    pub current_model: String,
    pub last_error: Option<ErrorCategory>,
}

impl RetryState {
    pub fn new(model: &str) -> Self {
        Self {
            attempt: 0,
            original_model: model.to_string(),
            current_model: model.to_string(),
            last_error: None,
        }
    }

    /// Moves to the next attempt. `GiveUp` leaves the state untouched.
    pub fn advance(&mut self, action: &RetryAction, category: ErrorCategory) {
        self.last_error = Some(category);
        match action {
            RetryAction::RetrySameModel { .. } => self.attempt += 1,
            RetryAction::SwitchModel(model) => {
                self.attempt += 1;
                self.current_model = model.clone();
            }
            RetryAction::GiveUp => {}
        }
    }
}

pub fn next_action(policy: &RetryPolicy, state: &RetryState, error: ErrorCategory) -> RetryAction {
    if error == ErrorCategory::Fatal {
        return RetryAction::GiveUp;
    }

    match state.attempt {
        0 => RetryAction::RetrySameModel {
            backoff: policy.backoff,
        },
        1 if policy.fallback_model != state.original_model => {
            RetryAction::SwitchModel(policy.fallback_model.clone())
        }
        _ => RetryAction::GiveUp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(fallback: &str) -> RetryPolicy {
        RetryPolicy {
            fallback_model: fallback.to_string(),
            backoff: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_recoverable_first_failure_retries_same_model() {
        let state = RetryState::new("flash");
        assert_eq!(
            next_action(&policy("pro"), &state, ErrorCategory::Recoverable),
            RetryAction::RetrySameModel {
                backoff: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn test_second_failure_switches_to_fallback() {
        let mut state = RetryState::new("flash");
        let p = policy("pro");
        let first = next_action(&p, &state, ErrorCategory::Recoverable);
        state.advance(&first, ErrorCategory::Recoverable);

        let second = next_action(&p, &state, ErrorCategory::Recoverable);
        assert_eq!(second, RetryAction::SwitchModel("pro".into()));

        state.advance(&second, ErrorCategory::Recoverable);
        assert_eq!(state.attempt, 2);
        assert_eq!(state.current_model, "pro");
        assert_eq!(state.original_model, "flash");
    }

    #[test]
    fn test_fallback_failure_gives_up() {
        let mut state = RetryState::new("flash");
        state.attempt = 2;
        state.current_model = "pro".into();
        assert_eq!(
            next_action(&policy("pro"), &state, ErrorCategory::Recoverable),
            RetryAction::GiveUp
        );
    }

    #[test]
    fn test_fallback_equal_to_original_is_skipped() {
        let mut state = RetryState::new("flash");
        state.attempt = 1;
        assert_eq!(
            next_action(&policy("flash"), &state, ErrorCategory::Recoverable),
            RetryAction::GiveUp
        );
    }

    #[test]
    fn test_fatal_error_gives_up_immediately() {
        let state = RetryState::new("flash");
        assert_eq!(
            next_action(&policy("pro"), &state, ErrorCategory::Fatal),
            RetryAction::GiveUp
        );
    }

    #[test]
    fn test_give_up_does_not_advance() {
        let mut state = RetryState::new("flash");
        state.advance(&RetryAction::GiveUp, ErrorCategory::Fatal);
        assert_eq!(state.attempt, 0);
        assert_eq!(state.last_error, Some(ErrorCategory::Fatal));
    }
}

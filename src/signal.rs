//! Ctrl-C / SIGTERM handling
//!
//! The first signal trips the run's [`CancelToken`] so in-flight work stops
//! at the next checkpoint. A second signal exits immediately.

use reconcile::CancelToken;
use std::sync::OnceLock;

/// Exit status for a run interrupted by a signal
pub const INTERRUPTED_EXIT: i32 = 130;

static TOKEN: OnceLock<CancelToken> = OnceLock::new();

/// Install the handler once and return the token it trips
pub fn install() -> CancelToken {
    TOKEN
        .get_or_init(|| {
            let token = CancelToken::new();
            let handler_token = token.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                if !on_signal(&handler_token) {
                    std::process::exit(INTERRUPTED_EXIT);
                }
            }) {
                log::warn!("Could not install signal handler: {e}");
            }
            token
        })
        .clone()
}

/// Trip `token`. Returns `false` if it was already tripped.
fn on_signal(token: &CancelToken) -> bool {
    if token.is_cancelled() {
        return false;
    }
    log::warn!("Interrupt received, stopping after the current call");
    token.cancel();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_returns_shared_token() {
        let first = install();
        let second = install();
        first.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_second_signal_requests_exit() {
        let token = CancelToken::new();
        assert!(on_signal(&token));
        assert!(token.is_cancelled());
        assert!(!on_signal(&token));
    }
}

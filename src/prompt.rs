//! Confirmation gate consulted before every mutating step.

use anyhow::Result;
use log::{debug, warn};

use crate::runtime::Runtime;

/// Outcome of one confirmation exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// No usable answer yet; ask again
    Pending,
    Confirmed,
    /// Confirmed, and every later question is answered yes
    ConfirmedAll,
    Declined,
    /// Stop the whole batch
    Aborted,
}

impl PromptState {
    /// Interpret one line of input; `None` is end of input.
    pub fn interpret(response: Option<&str>) -> Self {
        let Some(response) = response else {
            return PromptState::Aborted;
        };
        match response.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => PromptState::Confirmed,
            "" | "n" | "no" => PromptState::Declined,
            "a" | "all" => PromptState::ConfirmedAll,
            "q" | "quit" => PromptState::Aborted,
            _ => PromptState::Pending,
        }
    }

    /// Whether the guarded action goes ahead.
    pub fn proceeds(self) -> bool {
        matches!(self, PromptState::Confirmed | PromptState::ConfirmedAll)
    }
}

/// Asks the user before each mutation, remembering "all" and "quit".
pub struct ConfirmGate<'a, R: Runtime> {
    runtime: &'a R,
    confirm_all: bool,
    aborted: bool,
}

impl<'a, R: Runtime> ConfirmGate<'a, R> {
    /// With `assume_yes`, or when stdin is not a terminal, every question is confirmed.
    pub fn new(runtime: &'a R, assume_yes: bool) -> Self {
        let confirm_all = assume_yes || !runtime.is_interactive();
        if confirm_all && !assume_yes {
            debug!("stdin is not interactive; proceeding without confirmation");
        }
        Self {
            runtime,
            confirm_all,
            aborted: false,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Ask `question` until a decisive answer is given.
    pub fn ask(&mut self, question: &str) -> Result<PromptState> {
        if self.aborted {
            return Ok(PromptState::Aborted);
        }
        if self.confirm_all {
            return Ok(PromptState::ConfirmedAll);
        }

        let message = format!("{} [y/N/a/q]", question);
        loop {
            let response = self.runtime.prompt(&message)?;
            match PromptState::interpret(response.as_deref()) {
                PromptState::Pending => {
                    warn!("Please answer y(es), n(o), a(ll) or q(uit)");
                }
                PromptState::ConfirmedAll => {
                    self.confirm_all = true;
                    return Ok(PromptState::ConfirmedAll);
                }
                PromptState::Aborted => {
                    self.aborted = true;
                    return Ok(PromptState::Aborted);
                }
                state => return Ok(state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::Sequence;

    fn scripted(answers: Vec<Option<&'static str>>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_interactive().returning(|| true);
        let mut seq = Sequence::new();
        for answer in answers {
            runtime
                .expect_prompt()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| Ok(answer.map(str::to_string)));
        }
        runtime
    }

    #[test]
    fn test_interpret_transitions() {
        assert_eq!(PromptState::interpret(Some("y")), PromptState::Confirmed);
        assert_eq!(PromptState::interpret(Some("YES")), PromptState::Confirmed);
        assert_eq!(PromptState::interpret(Some("n")), PromptState::Declined);
        assert_eq!(PromptState::interpret(Some("")), PromptState::Declined);
        assert_eq!(PromptState::interpret(Some("a")), PromptState::ConfirmedAll);
        assert_eq!(PromptState::interpret(Some("q")), PromptState::Aborted);
        assert_eq!(PromptState::interpret(Some("maybe")), PromptState::Pending);
        assert_eq!(PromptState::interpret(None), PromptState::Aborted);
    }

    #[test]
    fn test_garbage_asks_again() {
        let runtime = scripted(vec![Some("what"), Some("y")]);
        let mut gate = ConfirmGate::new(&runtime, false);
        assert_eq!(gate.ask("Build foo?").unwrap(), PromptState::Confirmed);
    }

    #[test]
    fn test_all_answers_later_questions() {
        let runtime = scripted(vec![Some("a")]);
        let mut gate = ConfirmGate::new(&runtime, false);
        assert_eq!(gate.ask("Build foo?").unwrap(), PromptState::ConfirmedAll);
        assert!(gate.ask("Build bar?").unwrap().proceeds());
    }

    #[test]
    fn test_quit_and_eof_abort_the_batch() {
        let runtime = scripted(vec![Some("q")]);
        let mut gate = ConfirmGate::new(&runtime, false);
        assert_eq!(gate.ask("Build foo?").unwrap(), PromptState::Aborted);
        assert!(gate.is_aborted());
        assert_eq!(gate.ask("Build bar?").unwrap(), PromptState::Aborted);

        let runtime = scripted(vec![None]);
        let mut gate = ConfirmGate::new(&runtime, false);
        assert_eq!(gate.ask("Build foo?").unwrap(), PromptState::Aborted);
    }

    #[test]
    fn test_decline_is_per_question() {
        let runtime = scripted(vec![Some("n"), Some("y")]);
        let mut gate = ConfirmGate::new(&runtime, false);
        assert!(!gate.ask("Build foo?").unwrap().proceeds());
        assert!(gate.ask("Build bar?").unwrap().proceeds());
    }

    #[test]
    fn test_non_interactive_and_assume_yes_never_prompt() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_interactive().returning(|| false);
        runtime.expect_prompt().never();
        let mut gate = ConfirmGate::new(&runtime, false);
        assert_eq!(gate.ask("Build foo?").unwrap(), PromptState::ConfirmedAll);

        let mut runtime = MockRuntime::new();
        runtime.expect_is_interactive().returning(|| true);
        runtime.expect_prompt().never();
        let mut gate = ConfirmGate::new(&runtime, true);
        assert!(gate.ask("Build foo?").unwrap().proceeds());
    }
}

//! The decide → execute → check loop.

use tracing::{info, warn};

use crate::brain::Brain;
use crate::hands::Hands;
use crate::types::{AgentState, MAX_STEPS_PER_TASK, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Deciding,
    Executing,
    Checking,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Continue,
    Stop,
}

/// Routes on the `done` flag. Never touches the state.
pub fn check_done(state: &AgentState) -> Route {
    if state.done { Route::Stop } else { Route::Continue }
}

pub struct Agent {
    brain: Brain,
    hands: Hands,
}

impl Agent {
    pub fn new(brain: Brain, hands: Hands) -> Self {
        Self { brain, hands }
    }

    /// Runs one goal to completion and hands back the final state.
    pub async fn run(&self, goal: &str) -> AgentState {
        let mut state = AgentState::new(goal);
        let mut phase = Phase::Deciding;
        let mut step_count = 0usize;

        info!(goal, "Starting QA agent");

        while phase != Phase::Terminated {
            phase = match phase {
                Phase::Deciding if step_count >= MAX_STEPS_PER_TASK => {
                    warn!(max_steps = MAX_STEPS_PER_TASK, "Step limit reached");
                    state.done = true;
                    state.result = RunResult::Fail;
                    Phase::Terminated
                }
                Phase::Deciding => {
                    step_count += 1;
                    info!(step = step_count, "Asking LLM for next step");
                    self.brain.decide(&mut state).await;
                    Phase::Executing
                }
                Phase::Executing => {
                    self.hands.execute(&mut state).await;
                    Phase::Checking
                }
                Phase::Checking => match check_done(&state) {
                    Route::Continue => Phase::Deciding,
                    Route::Stop => {
                        let reason = match state.next_step.reason.as_str() {
                            "" => "No reason given",
                            r => r,
                        };
                        info!(
                            result = %state.result,
                            steps = state.step_history.len(),
                            reason,
                            "Task completed"
                        );
                        Phase::Terminated
                    }
                },
                Phase::Terminated => Phase::Terminated,
            };
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_done_routes_on_flag() {
        let mut state = AgentState::new("goal");
        assert_eq!(check_done(&state), Route::Continue);
        state.done = true;
        assert_eq!(check_done(&state), Route::Stop);
    }
}

//! ActionRouter - per-step decision on what to do next

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Action, ActionKind, AnswerParams, CodingParams, QuestionType, ReflectParams, SearchParams, VisitParams};

/// Masks which actions the orchestrator currently permits; e.g. `coding` is
/// masked off unless the run config enables it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionFlags {
    pub allow_search: bool,
    pub allow_visit: bool,
    pub allow_reflect: bool,
    pub allow_answer: bool,
    pub allow_coding: bool,
}

impl Default for ActionFlags {
    fn default() -> Self {
        Self { allow_search: true, allow_visit: true, allow_reflect: true, allow_answer: true, allow_coding: false }
    }
}

/// The signals the router needs to decide the next action, gathered by the
/// orchestrator from the frontier, knowledge store, ledger, and convergence
/// detector before each step.
#[derive(Debug, Clone)]
pub struct RouterInputs {
    pub frontier_thin: bool,
    pub coverage_gap: bool,
    pub unvisited_above_threshold: usize,
    pub low_novelty_streak: u32,
    pub converged: bool,
    pub coverage_adequate: bool,
    pub reserve_exceeded: bool,
    pub budget_critical: bool,
    pub remaining_steps: u32,
    pub question_type: QuestionType,
    pub gaps: Vec<String>,
}

pub struct ActionRouter;

impl ActionRouter {
    /// Picks the next action given `inputs`, masked by `flags`. Tie-break
    /// order when more than one rule fires: `answer > visit > search >
    /// reflect > coding`.
    pub fn route(inputs: &RouterInputs, flags: &ActionFlags) -> Action {
        let beast_mode = inputs.reserve_exceeded || inputs.budget_critical || inputs.remaining_steps <= 1;
        let wants_answer = flags.allow_answer && (inputs.coverage_adequate || beast_mode);
        let wants_visit = flags.allow_visit && inputs.unvisited_above_threshold > 0;
        let wants_search = flags.allow_search && (inputs.frontier_thin || inputs.coverage_gap);
        let wants_reflect = flags.allow_reflect && inputs.low_novelty_streak >= 2 && !inputs.converged;
        let wants_coding = flags.allow_coding && inputs.question_type.is_computational();

        let action = if wants_answer {
            Action::Answer(AnswerParams { draft: String::new(), beast_mode })
        } else if wants_visit {
            Action::Visit(VisitParams::default())
        } else if wants_search {
            Action::Search(SearchParams::default())
        } else if wants_reflect {
            Action::Reflect(ReflectParams { gaps: inputs.gaps.clone() })
        } else if wants_coding {
            Action::Coding(CodingParams::default())
        } else {
            // Nothing else applies; answer is the only action guaranteed not
            // to stall the run.
            Action::Answer(AnswerParams { draft: String::new(), beast_mode })
        };

        debug!(kind = ?action.kind(), beast_mode, "Action decided");
        action
    }
}

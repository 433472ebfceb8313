//! Per-entity lifecycle stages.

use core::fmt;

/// Lifecycle stage of a model entity.
///
/// Stages are totally ordered and an entity's stage never decreases:
///
/// ```text
/// Registered < Discovered < Created < Realized < Finalized
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    /// The entity exists and carries its initial components only.
    #[default]
    Registered,
    /// Discovery rules have run and may have attached further structure.
    Discovered,
    /// Backing object factories may now run.
    Created,
    /// The primary projection is forced and "on realize" rules have run.
    Realized,
    /// No further mutation is permitted.
    Finalized,
}

impl Stage {
    /// Every stage, in lifecycle order.
    pub const ALL: [Stage; 5] = [
        Stage::Registered,
        Stage::Discovered,
        Stage::Created,
        Stage::Realized,
        Stage::Finalized,
    ];

    /// Returns the stage after this one, or `None` for [`Stage::Finalized`].
    #[must_use]
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Registered => Some(Stage::Discovered),
            Stage::Discovered => Some(Stage::Created),
            Stage::Created => Some(Stage::Realized),
            Stage::Realized => Some(Stage::Finalized),
            Stage::Finalized => None,
        }
    }

    /// Returns the stage before this one, or `None` for [`Stage::Registered`].
    #[must_use]
    pub fn previous(self) -> Option<Stage> {
        match self {
            Stage::Registered => None,
            Stage::Discovered => Some(Stage::Registered),
            Stage::Created => Some(Stage::Discovered),
            Stage::Realized => Some(Stage::Created),
            Stage::Finalized => Some(Stage::Realized),
        }
    }

    /// Iterates over the stages strictly after `self` up to and including `target`.
    pub fn steps_to(self, target: Stage) -> impl Iterator<Item = Stage> {
        Self::ALL
            .into_iter()
            .filter(move |stage| *stage > self && *stage <= target)
    }

    /// Returns the lowercase stage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Registered => "registered",
            Stage::Discovered => "discovered",
            Stage::Created => "created",
            Stage::Realized => "realized",
            Stage::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle bookkeeping for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    stage: Stage,
    transitioning: Option<Stage>,
    failed: Option<Stage>,
}

impl Lifecycle {
    /// Returns the last stage whose rules all completed.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the stage being entered while an advance is in progress.
    #[must_use]
    pub fn transitioning(&self) -> Option<Stage> {
        self.transitioning
    }

    /// Returns the stage whose rules failed, if any.
    #[must_use]
    pub fn failed(&self) -> Option<Stage> {
        self.failed
    }

    /// Returns `true` once the entity reached [`Stage::Finalized`].
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.stage == Stage::Finalized
    }

    pub(crate) fn begin(&mut self, target: Stage) {
        self.transitioning = Some(target);
    }

    pub(crate) fn end(&mut self) {
        self.transitioning = None;
    }

    /// Moves to `stage`. Backward moves are ignored.
    pub(crate) fn enter(&mut self, stage: Stage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    /// Marks `stage` failed and rolls back to the stage before it.
    pub(crate) fn fail(&mut self, stage: Stage) {
        self.failed = Some(stage);
        if self.stage >= stage {
            self.stage = stage.previous().unwrap_or_default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Registered < Stage::Discovered);
        assert!(Stage::Discovered < Stage::Created);
        assert!(Stage::Created < Stage::Realized);
        assert!(Stage::Realized < Stage::Finalized);
        assert_eq!(Stage::default(), Stage::Registered);
    }

    #[test]
    fn next_walks_the_chain() {
        let mut chain = vec![Stage::Registered];
        while let Some(next) = chain.last().copied().and_then(Stage::next) {
            chain.push(next);
        }
        assert_eq!(chain, Stage::ALL.to_vec());
    }

    #[test]
    fn steps_exclude_current_and_include_target() {
        let steps: Vec<_> = Stage::Registered.steps_to(Stage::Realized).collect();
        assert_eq!(
            steps,
            vec![Stage::Discovered, Stage::Created, Stage::Realized]
        );
        assert_eq!(Stage::Realized.steps_to(Stage::Created).count(), 0);
    }

    #[test]
    fn lifecycle_never_moves_backward() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.enter(Stage::Created);
        lifecycle.enter(Stage::Discovered);
        assert_eq!(lifecycle.stage(), Stage::Created);
    }

    #[test]
    fn failure_keeps_last_completed_stage() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.enter(Stage::Discovered);
        lifecycle.enter(Stage::Created);
        lifecycle.fail(Stage::Created);

        assert_eq!(lifecycle.stage(), Stage::Discovered);
        assert_eq!(lifecycle.failed(), Some(Stage::Created));
    }

    #[test]
    fn failure_before_entering_keeps_stage() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.enter(Stage::Created);
        lifecycle.fail(Stage::Realized);

        assert_eq!(lifecycle.stage(), Stage::Created);
        assert_eq!(lifecycle.failed(), Some(Stage::Realized));
    }
}

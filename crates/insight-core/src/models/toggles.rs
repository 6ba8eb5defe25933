use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::repositories::{KeyValueRepository, RepositoryResult};

/// Store key for the user's global insight-mode preference.
const PREFERENCE_KEY: &str = "prefs.insight_modes";

/// One retrieval strategy attached to a chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightMode {
    Company,
    Browse,
    General,
}

/// The three-member insight-mode selection.
///
/// Invariant: at least one member is always true. Every constructor and
/// [`ToggleState::toggled`] uphold this; the fields are private so callers
/// cannot build an all-false state by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleState {
    company: bool,
    browse: bool,
    general: bool,
}

impl ToggleState {
    /// The designated fallback state: company insight only.
    pub fn company_only() -> Self {
        Self {
            company: true,
            browse: false,
            general: false,
        }
    }

    /// Build a state from raw flags, correcting an all-false combination to
    /// company-only.
    pub fn from_flags(company: bool, browse: bool, general: bool) -> Self {
        if !company && !browse && !general {
            return Self::company_only();
        }
        Self {
            company,
            browse,
            general,
        }
    }

    pub fn company(&self) -> bool {
        self.company
    }

    pub fn browse(&self) -> bool {
        self.browse
    }

    pub fn general(&self) -> bool {
        self.general
    }

    pub fn is_active(&self, mode: InsightMode) -> bool {
        match mode {
            InsightMode::Company => self.company,
            InsightMode::Browse => self.browse,
            InsightMode::General => self.general,
        }
    }

    /// Flip one member, preserving the invariant.
    ///
    /// Turning a member on always succeeds. Turning a member off applies the
    /// change, then forces `company` back on if all three would otherwise be
    /// false — Company is the designated fallback mode.
    #[must_use]
    pub fn toggled(self, mode: InsightMode) -> Self {
        let mut next = self;
        match mode {
            InsightMode::Company => next.company = !next.company,
            InsightMode::Browse => next.browse = !next.browse,
            InsightMode::General => next.general = !next.general,
        }

        if !next.company && !next.browse && !next.general {
            next.company = true;
        }

        next
    }
}

impl Default for ToggleState {
    fn default() -> Self {
        Self::company_only()
    }
}

// Deserialization goes through `from_flags` so a persisted all-false record
// (possible in stores written before the invariant existed) is corrected on
// load instead of leaking into the pipeline.
impl<'de> Deserialize<'de> for ToggleState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawToggles {
            #[serde(default)]
            company: bool,
            #[serde(default)]
            browse: bool,
            #[serde(default)]
            general: bool,
        }

        let raw = RawToggles::deserialize(deserializer)?;
        Ok(Self::from_flags(raw.company, raw.browse, raw.general))
    }
}

/// Which conversation context a controller is scoped to.
///
/// Only a new-conversation controller writes toggle choices back to the
/// global preference store; an existing conversation's choice stays local to
/// that conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleScope {
    NewConversation,
    ExistingConversation,
}

/// The single mutation entry point for insight-mode selection.
pub struct ToggleController {
    repository: Arc<dyn KeyValueRepository>,
    scope: ToggleScope,
    state: ToggleState,
}

impl ToggleController {
    /// Controller for a fresh conversation: defaults come from the persisted
    /// user preference, falling back to company-only when none exists.
    pub async fn for_new_conversation(
        repository: Arc<dyn KeyValueRepository>,
    ) -> RepositoryResult<Self> {
        let state = match repository.get(PREFERENCE_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => ToggleState::company_only(),
        };

        debug!(?state, "Loaded insight-mode defaults for new conversation");

        Ok(Self {
            repository,
            scope: ToggleScope::NewConversation,
            state,
        })
    }

    /// Controller for an existing conversation: defaults come from that
    /// conversation's recorded state, corrected to company-only when absent.
    pub fn for_existing_conversation(
        repository: Arc<dyn KeyValueRepository>,
        recorded: Option<ToggleState>,
    ) -> Self {
        Self {
            repository,
            scope: ToggleScope::ExistingConversation,
            state: recorded.unwrap_or_else(ToggleState::company_only),
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    pub fn scope(&self) -> ToggleScope {
        self.scope
    }

    /// Flip one member and, in a new-conversation scope, persist the result
    /// as the user's global preference.
    pub async fn toggle(&mut self, mode: InsightMode) -> RepositoryResult<ToggleState> {
        self.state = self.state.toggled(mode);

        if self.scope == ToggleScope::NewConversation {
            let value = serde_json::to_value(self.state)?;
            self.repository.set(PREFERENCE_KEY, value).await?;
            debug!(state = ?self.state, "Persisted insight-mode preference");
        }

        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryKeyValueRepository;
    use serde_json::json;

    #[test]
    fn test_default_is_company_only() {
        let state = ToggleState::default();
        assert!(state.company());
        assert!(!state.browse());
        assert!(!state.general());
    }

    #[test]
    fn test_toggle_on_always_succeeds() {
        let state = ToggleState::company_only().toggled(InsightMode::Browse);
        assert!(state.company());
        assert!(state.browse());
        assert!(!state.general());
    }

    #[test]
    fn test_toggle_off_sole_member_falls_back_to_company() {
        // Browse is the only active member; turning it off must not leave an
        // all-false state.
        let state = ToggleState::from_flags(false, true, false).toggled(InsightMode::Browse);
        assert_eq!(state, ToggleState::company_only());
    }

    #[test]
    fn test_toggle_off_sole_company_keeps_company() {
        let state = ToggleState::company_only().toggled(InsightMode::Company);
        assert_eq!(state, ToggleState::company_only());
    }

    #[test]
    fn test_fallback_only_engages_when_result_would_be_all_false() {
        // Start company-only, turn on browse, then turn off company: browse
        // remains active, so no fallback triggers.
        let state = ToggleState::company_only()
            .toggled(InsightMode::Browse)
            .toggled(InsightMode::Company);

        assert!(!state.company());
        assert!(state.browse());
        assert!(!state.general());
    }

    #[test]
    fn test_invariant_holds_for_all_states_and_toggles() {
        // Exhaustive: every reachable state crossed with every toggle.
        let modes = [InsightMode::Company, InsightMode::Browse, InsightMode::General];
        for company in [false, true] {
            for browse in [false, true] {
                for general in [false, true] {
                    let state = ToggleState::from_flags(company, browse, general);
                    for mode in modes {
                        let next = state.toggled(mode);
                        assert!(
                            next.company() || next.browse() || next.general(),
                            "all-false state reached from {state:?} via {mode:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_invariant_holds_for_long_toggle_sequences() {
        let modes = [InsightMode::Company, InsightMode::Browse, InsightMode::General];
        let mut state = ToggleState::company_only();

        for i in 0..200 {
            state = state.toggled(modes[i % 3]);
            assert!(state.company() || state.browse() || state.general());
        }
    }

    #[test]
    fn test_from_flags_corrects_all_false() {
        assert_eq!(
            ToggleState::from_flags(false, false, false),
            ToggleState::company_only()
        );
    }

    #[test]
    fn test_deserialize_corrects_all_false_record() {
        let state: ToggleState =
            serde_json::from_value(json!({"company": false, "browse": false, "general": false}))
                .unwrap();
        assert_eq!(state, ToggleState::company_only());
    }

    #[test]
    fn test_deserialize_missing_fields_default_to_false() {
        let state: ToggleState = serde_json::from_value(json!({"general": true})).unwrap();
        assert!(!state.company());
        assert!(!state.browse());
        assert!(state.general());
    }

    #[tokio::test]
    async fn test_new_conversation_defaults_from_persisted_preference() {
        let repo = Arc::new(InMemoryKeyValueRepository::new());
        repo.set(
            PREFERENCE_KEY,
            json!({"company": false, "browse": true, "general": true}),
        )
        .await
        .unwrap();

        let controller = ToggleController::for_new_conversation(repo).await.unwrap();
        assert_eq!(
            controller.state(),
            ToggleState::from_flags(false, true, true)
        );
    }

    #[tokio::test]
    async fn test_new_conversation_defaults_to_company_only_without_preference() {
        let repo = Arc::new(InMemoryKeyValueRepository::new());
        let controller = ToggleController::for_new_conversation(repo).await.unwrap();
        assert_eq!(controller.state(), ToggleState::company_only());
    }

    #[tokio::test]
    async fn test_new_conversation_toggle_persists_preference() {
        let repo = Arc::new(InMemoryKeyValueRepository::new());
        let mut controller = ToggleController::for_new_conversation(repo.clone())
            .await
            .unwrap();

        controller.toggle(InsightMode::Browse).await.unwrap();

        let saved = repo.get(PREFERENCE_KEY).await.unwrap().unwrap();
        let saved: ToggleState = serde_json::from_value(saved).unwrap();
        assert_eq!(saved, ToggleState::from_flags(true, true, false));
    }

    #[tokio::test]
    async fn test_existing_conversation_toggle_does_not_persist() {
        let repo = Arc::new(InMemoryKeyValueRepository::new());
        let mut controller = ToggleController::for_existing_conversation(
            repo.clone(),
            Some(ToggleState::from_flags(true, true, false)),
        );

        controller.toggle(InsightMode::General).await.unwrap();

        assert!(repo.get(PREFERENCE_KEY).await.unwrap().is_none());
        assert!(controller.state().general());
    }

    #[test]
    fn test_existing_conversation_without_recorded_state_is_company_only() {
        let repo = Arc::new(InMemoryKeyValueRepository::new());
        let controller = ToggleController::for_existing_conversation(repo, None);
        assert_eq!(controller.state(), ToggleState::company_only());
    }
}

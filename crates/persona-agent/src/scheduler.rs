// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proactive messaging.
//!
//! Two sources of unprompted messages:
//!
//! - **Periodic tick**: every `scheduler.tick_secs`, at most one eligible
//!   character is picked at random and speaks first.
//! - **Random first contact**: one-shot timers that invent a brand-new
//!   character, let it introduce itself in a detached conversation, and then
//!   insert it (with its messages, all unread) at the top of the list.
//!
//! Both go through the shared response gate; a failure aborts only the
//! affected cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use persona_core::{
    Character, CharacterId, ConversationKey, GeneratedProfile, Message, PersonaError,
    ProfileOutcome,
};

use crate::applier::ApplyReport;
use crate::context::{CycleOptions, assemble_profile_request};
use crate::cycle::CycleRunner;
use crate::store::{Action, AppState, Store};

/// Each reactivity point lowers the chance of being picked by this much.
pub const PROBABILITY_STEP: f64 = 0.095;

/// A character must have been quiet for `reactivity` times this long.
pub const QUIET_MILLIS_PER_REACTIVITY: i64 = 60_000;

/// Result of one scheduler tick.
#[derive(Debug)]
pub enum TickOutcome {
    Disabled,
    NoApiKey,
    /// Another cycle holds the gate.
    Busy,
    NoCandidate,
    Ran {
        key: ConversationKey,
        report: ApplyReport,
    },
    Failed(PersonaError),
}

/// Whether `character` may speak first right now.
///
/// Consumes one random draw for every proactive-enabled character.
pub fn is_eligible<R: Rng + ?Sized>(
    character: &Character,
    history: &[Message],
    now: DateTime<Utc>,
    rng: &mut R,
) -> bool {
    if !character.proactive_enabled {
        return false;
    }

    let reactivity = f64::from(character.reactivity);
    let keep_probability = 1.0 - reactivity * PROBABILITY_STEP;
    if rng.r#gen::<f64>() >= keep_probability {
        return false;
    }

    match history.last() {
        None => true,
        Some(last) => {
            let quiet_for = (now - last.created_at).num_milliseconds();
            quiet_for > i64::from(character.reactivity) * QUIET_MILLIS_PER_REACTIVITY
        }
    }
}

/// Picks one eligible character uniformly at random.
pub fn pick_candidate<R: Rng + ?Sized>(
    state: &AppState,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<ConversationKey> {
    let eligible: Vec<&Character> = state
        .characters
        .iter()
        .filter(|c| is_eligible(c, state.history(&c.conversation_key()), now, rng))
        .collect();
    eligible.choose(rng).map(|c| c.conversation_key())
}

/// A freshly invented character with randomized sliders.
pub fn random_character<R: Rng + ?Sized>(profile: GeneratedProfile, rng: &mut R) -> Character {
    let mut character = Character::new(profile.name.trim(), profile.prompt.trim());
    character.response_time = rng.gen_range(3..=8);
    character.thinking_time = rng.gen_range(3..=8);
    character.reactivity = rng.gen_range(4..=9);
    character.tone = rng.gen_range(3..=8);
    character.is_random = true;
    character.proactive_enabled = true;
    character
}

/// Drives proactive ticks and random first-contact timers.
pub struct ProactiveScheduler {
    runner: Arc<CycleRunner>,
    tick: Duration,
    timers: TaskTracker,
}

impl ProactiveScheduler {
    pub fn new(runner: Arc<CycleRunner>, tick: Duration) -> Self {
        Self {
            runner,
            tick,
            timers: TaskTracker::new(),
        }
    }

    fn store(&self) -> &Store {
        self.runner.store()
    }

    /// Runs ticks until the shutdown token fires.
    pub async fn run(self: Arc<Self>) {
        self.run_with_rng(StdRng::from_entropy()).await;
    }

    /// Like [`run`](Self::run) with a caller-provided random source.
    pub async fn run_with_rng(self: Arc<Self>, mut rng: StdRng) {
        let cancel = self.runner.cancel_token().clone();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the first check is one period in.
        interval.tick().await;

        info!(tick_secs = self.tick.as_secs(), "proactive scheduler started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.tick_once(&mut rng).await {
                        TickOutcome::Ran { key, report } => {
                            debug!(conversation = %key, delivered = report.delivered, "proactive message sent");
                        }
                        TickOutcome::Failed(e) => warn!(error = %e, "proactive cycle failed"),
                        other => debug!(outcome = ?other, "proactive tick skipped"),
                    }
                }
            }
        }
        info!("proactive scheduler stopped");
    }

    /// Performs one tick: at most one proactive cycle.
    pub async fn tick_once<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> TickOutcome {
        let state = self.store().state();
        if !state.settings.proactive_chat_enabled {
            return TickOutcome::Disabled;
        }
        if !state.settings.has_api_key() {
            return TickOutcome::NoApiKey;
        }
        let Some(_guard) = self.runner.gate().try_acquire() else {
            return TickOutcome::Busy;
        };
        let Some(key) = pick_candidate(&state, Utc::now(), rng) else {
            return TickOutcome::NoCandidate;
        };

        match self.runner.run(&key, CycleOptions::proactive()).await {
            Ok(report) => TickOutcome::Ran { key, report },
            Err(e) => TickOutcome::Failed(e),
        }
    }

    /// Starts the random first-contact timers if the feature is on.
    ///
    /// Returns the number of timers started.
    pub fn schedule_random_characters(self: &Arc<Self>) -> usize {
        let settings = self.store().state().settings.clone();
        if !settings.random_first_message_enabled {
            return 0;
        }

        let (min, max) = settings.random_delay_window();
        let mut rng = rand::thread_rng();
        let delays: Vec<Duration> = (0..settings.random_character_count)
            .map(|_| {
                let millis = rng.gen_range(u64::from(min) * 60_000..=u64::from(max) * 60_000);
                Duration::from_millis(millis)
            })
            .collect();

        for delay in &delays {
            let this = Arc::clone(self);
            let delay = *delay;
            self.timers.spawn(async move {
                let cancel = this.runner.cancel_token().clone();
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                let mut rng = StdRng::from_entropy();
                match this.introduce_random_character(&mut rng).await {
                    Ok(Some(id)) => info!(character = %id, "random character introduced itself"),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "random character cycle failed"),
                }
            });
        }

        info!(
            count = delays.len(),
            min_minutes = min,
            max_minutes = max,
            "random first contacts scheduled"
        );
        delays.len()
    }

    /// Invents a character and lets it open a conversation.
    ///
    /// Returns `Ok(None)` when the attempt was skipped or the provider failed.
    pub async fn introduce_random_character<R: Rng + Send + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<CharacterId>, PersonaError> {
        let settings = self.store().state().settings.clone();
        if !settings.random_first_message_enabled {
            debug!("random first contact disabled since scheduling");
            return Ok(None);
        }
        if !settings.has_api_key() || !settings.has_user_profile() {
            info!("random first contact skipped: API key or user profile missing");
            return Ok(None);
        }

        let Some(_guard) = self.runner.gate().acquire(self.runner.cancel_token()).await else {
            return Ok(None);
        };

        let request = assemble_profile_request(&settings);
        let profile = match self.runner.provider().generate_profile(&request).await {
            ProfileOutcome::Profile(profile) => profile,
            ProfileOutcome::Error(e) => {
                warn!(error = %e, "profile generation failed");
                return Ok(None);
            }
        };

        let character = random_character(profile, rng);
        let id = character.id.clone();
        let key = character.conversation_key();
        let scratch = Store::new(AppState::detached(settings, character));

        let report = self
            .runner
            .run_on(&scratch, &key, CycleOptions::proactive())
            .await?;
        if !report.is_success() {
            warn!(
                error = report.error.as_deref().unwrap_or("interrupted"),
                "random character produced no first message"
            );
            return Ok(None);
        }

        let detached = scratch.state();
        let Some(character) = detached.character(&id).cloned() else {
            return Ok(None);
        };
        let messages = detached.history(&key).to_vec();
        let count = u32::try_from(messages.len()).unwrap_or(u32::MAX);

        let store = self.store();
        store.dispatch(Action::InsertCharacterFront(character));
        store.dispatch(Action::SeedConversation {
            key: key.clone(),
            messages,
        });
        store.dispatch(Action::SetUnread { key, count });
        Ok(Some(id))
    }

    /// Waits for pending first-contact timers to finish after shutdown.
    pub async fn wait_for_timers(&self) {
        self.timers.close();
        self.timers.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::GenerationOutcome;
    use persona_test_utils::{MockProvider, fixtures};
    use tokio_util::sync::CancellationToken;

    fn scheduler_with(state: AppState, provider: MockProvider) -> Arc<ProactiveScheduler> {
        let runner = Arc::new(CycleRunner::new(
            Store::new(state),
            Arc::new(provider),
            CancellationToken::new(),
        ));
        Arc::new(ProactiveScheduler::new(runner, Duration::from_secs(60)))
    }

    fn enabled_state(characters: Vec<Character>) -> AppState {
        let mut settings = fixtures::settings();
        settings.proactive_chat_enabled = true;
        AppState::from_persisted(fixtures::persisted(settings, characters))
    }

    #[test]
    fn disabled_character_is_never_eligible() {
        let mut c = fixtures::character_with_reactivity("Mina", 1);
        c.proactive_enabled = false;
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(!is_eligible(&c, &[], Utc::now(), &mut rng));
        }
    }

    #[test]
    fn recent_message_blocks_eligibility() {
        let c = fixtures::character_with_reactivity("Mina", 5);
        let now = Utc::now();
        // Quiet for 4 minutes; 5 are required.
        let history = fixtures::exchange(&c, 4, now);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(!is_eligible(&c, &history, now, &mut rng));
        }
    }

    #[test]
    fn keep_probability_follows_reactivity() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 20_000;
        for reactivity in [1u8, 5, 10] {
            let c = fixtures::character_with_reactivity("Mina", reactivity);
            let kept = (0..trials)
                .filter(|_| is_eligible(&c, &[], now, &mut rng))
                .count();
            let expected = 1.0 - f64::from(reactivity) * PROBABILITY_STEP;
            let observed = kept as f64 / trials as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "reactivity {reactivity}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn random_character_sliders_in_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let c = random_character(
                GeneratedProfile {
                    name: " Rin ".into(),
                    prompt: "a librarian".into(),
                },
                &mut rng,
            );
            assert_eq!(c.name, "Rin");
            assert!((3..=8).contains(&c.response_time));
            assert!((3..=8).contains(&c.thinking_time));
            assert!((4..=9).contains(&c.reactivity));
            assert!((3..=8).contains(&c.tone));
            assert!(c.is_random && c.proactive_enabled);
        }
    }

    #[tokio::test]
    async fn tick_is_noop_when_disabled_or_keyless() {
        let provider = MockProvider::new();
        let mut state = enabled_state(vec![fixtures::character("Mina")]);
        state.settings.proactive_chat_enabled = false;
        let scheduler = scheduler_with(state.clone(), provider.clone());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            scheduler.tick_once(&mut rng).await,
            TickOutcome::Disabled
        ));

        state.settings.proactive_chat_enabled = true;
        state.settings.api_key.clear();
        let scheduler = scheduler_with(state, provider.clone());
        assert!(matches!(
            scheduler.tick_once(&mut rng).await,
            TickOutcome::NoApiKey
        ));
        assert_eq!(provider.call_count().await, 0);
    }

    #[tokio::test]
    async fn tick_is_noop_while_gate_held() {
        let provider = MockProvider::new();
        let scheduler =
            scheduler_with(enabled_state(vec![fixtures::character("Mina")]), provider.clone());
        let _guard = scheduler.runner.gate().try_acquire().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(scheduler.tick_once(&mut rng).await, TickOutcome::Busy));
        assert_eq!(provider.call_count().await, 0);
    }

    #[tokio::test]
    async fn tick_runs_at_most_one_cycle() {
        let provider = MockProvider::new();
        let characters: Vec<Character> = (0..5)
            .map(|i| fixtures::character_with_reactivity(&format!("C{i}"), 1))
            .collect();
        let scheduler = scheduler_with(enabled_state(characters), provider.clone());

        let mut rng = StdRng::seed_from_u64(11);
        let outcome = scheduler.tick_once(&mut rng).await;
        let TickOutcome::Ran { key, report } = outcome else {
            panic!("expected a proactive cycle, got {outcome:?}");
        };
        assert!(report.is_success());
        assert_eq!(provider.content_requests().await.len(), 1);

        let state = scheduler.store().state();
        let with_messages: Vec<_> = state
            .conversations
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        assert_eq!(with_messages, vec![key.clone()]);
        assert_eq!(state.unread_count(&key), 1);
    }

    #[tokio::test]
    async fn random_character_is_inserted_first_with_unread_messages() {
        let provider = MockProvider::new();
        provider
            .push_profile(ProfileOutcome::Profile(GeneratedProfile {
                name: "Rin".into(),
                prompt: "a quiet librarian".into(),
            }))
            .await;
        provider.push_reply(&["hi!", "I'm Rin"]).await;

        let mut state = enabled_state(vec![fixtures::character("Mina")]);
        state.settings.random_first_message_enabled = true;
        let scheduler = scheduler_with(state, provider.clone());

        let mut rng = StdRng::seed_from_u64(5);
        let id = scheduler
            .introduce_random_character(&mut rng)
            .await
            .unwrap()
            .expect("character created");

        let state = scheduler.store().state();
        assert_eq!(state.characters[0].id, id);
        assert!(state.characters[0].is_random);
        let key = state.characters[0].conversation_key();
        assert_eq!(state.history(&key).len(), 2);
        assert_eq!(state.unread_count(&key), 2);

        let requests = provider.content_requests().await;
        assert!(requests[0].contents.len() == 1, "only the opening nudge is sent");
    }

    #[tokio::test]
    async fn random_character_needs_user_profile() {
        let provider = MockProvider::new();
        let mut state = enabled_state(vec![]);
        state.settings.random_first_message_enabled = true;
        state.settings.user_description.clear();
        let scheduler = scheduler_with(state, provider.clone());

        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            scheduler.introduce_random_character(&mut rng).await.unwrap(),
            None
        );
        assert_eq!(provider.call_count().await, 0);
    }

    #[tokio::test]
    async fn failed_first_message_drops_character() {
        let provider = MockProvider::with_outcomes(vec![GenerationOutcome::Error(
            "blocked".into(),
        )]);
        let mut state = enabled_state(vec![]);
        state.settings.random_first_message_enabled = true;
        let scheduler = scheduler_with(state, provider);

        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            scheduler.introduce_random_character(&mut rng).await.unwrap(),
            None
        );
        assert!(scheduler.store().state().characters.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_timers_fire_within_window() {
        let provider = MockProvider::new();
        let mut state = enabled_state(vec![]);
        state.settings.random_first_message_enabled = true;
        state.settings.random_character_count = 2;
        state.settings.random_message_frequency_min = 1;
        state.settings.random_message_frequency_max = 2;
        let scheduler = scheduler_with(state, provider.clone());

        assert_eq!(scheduler.schedule_random_characters(), 2);
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(provider.call_count().await, 0);

        tokio::time::sleep(Duration::from_secs(62)).await;
        scheduler.wait_for_timers().await;
        assert_eq!(scheduler.store().state().characters.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_stops_on_cancel() {
        let provider = MockProvider::new();
        let scheduler = scheduler_with(
            enabled_state(vec![fixtures::character_with_reactivity("Mina", 1)]),
            provider.clone(),
        );
        let handle = tokio::spawn(
            Arc::clone(&scheduler).run_with_rng(StdRng::seed_from_u64(9)),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(provider.call_count().await, 0, "no tick before one period");

        tokio::time::sleep(Duration::from_secs(60 * 10)).await;
        assert!(provider.call_count().await >= 1);

        scheduler.runner.cancel_token().cancel();
        handle.await.unwrap();
    }
}

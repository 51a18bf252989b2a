//! Narrative progression: where the learner is, what they have earned, and
//! which price context applies right now.
//!
//! `ProgressionState` transitions are pure: each returns the next state (plus
//! a level-up event when one fires). `Session` owns the content, applies the
//! transitions and writes the progress record through to the store after
//! every mutation.

use chrono::Utc;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::{self, ContentStore};
use crate::engine::{self, PayoffPoint, PnlBreakdown, PriceChange};
use crate::levels::{calculate_progress, Progress, LEVELS};
use crate::store::{self, KeyValueStore, ProgressRecord};
use crate::types::{ContentVariant, Level, Module, OptionType, Side, Step, StepSetup};
use crate::utils::{claim_key, parse_claim_key, sanitize_symbol};

pub const DEFAULT_SIM_PRICE: f64 = 200.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("no step {step} in module {module}")]
    OutOfRange { module: usize, step: usize },
    #[error("module {module} is locked until earlier modules are finished")]
    Locked { module: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationPolicy {
    /// Let direct jumps land in modules past the current one.
    pub allow_jump_ahead: bool,
}

/// Simulator inputs other than price. Rebuilt from step setups.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorInputs {
    pub symbol: String,
    pub option_type: OptionType,
    pub side: Side,
    pub strike: f64,
    pub premium: f64,
    pub days_left: u32,
}

impl Default for SimulatorInputs {
    fn default() -> Self {
        Self {
            symbol: "TSLA".to_string(),
            option_type: OptionType::Call,
            side: Side::Buy,
            strike: 210.0,
            premium: 10.0,
            days_left: 30,
        }
    }
}

impl SimulatorInputs {
    /// Overwrite whatever the setup specifies; keep the rest.
    pub fn patch(&mut self, setup: &StepSetup) {
        if let Some(sym) = &setup.stock_symbol {
            self.symbol = sanitize_symbol(sym);
        }
        if let Some(t) = setup.option_type {
            self.option_type = t;
        }
        if let Some(s) = setup.side {
            self.side = s;
        }
        if let Some(k) = setup.strike {
            self.strike = k;
        }
        if let Some(p) = setup.premium {
            self.premium = p;
        }
        if let Some(d) = setup.days_left {
            self.days_left = d;
        }
    }

    pub fn volatility(&self) -> f64 {
        content::volatility_for(&self.symbol)
    }
}

/// Fold every setup from the start of the course up to and including (m, s).
fn replay_inputs(modules: &[Module], module_idx: usize, step_idx: usize) -> SimulatorInputs {
    let mut inputs = SimulatorInputs::default();
    for (mi, module) in modules.iter().enumerate().take(module_idx + 1) {
        let last = if mi == module_idx { step_idx } else { usize::MAX };
        for step in module.steps.iter().take(last.saturating_add(1)) {
            if let Some(setup) = &step.setup {
                inputs.patch(setup);
            }
        }
    }
    inputs
}

/// Pull a cursor back inside the course. `modules` must be non-empty.
pub fn clamp_cursor(modules: &[Module], module_idx: usize, step_idx: usize) -> (usize, usize) {
    let m = module_idx.min(modules.len().saturating_sub(1));
    let steps = modules.get(m).map_or(1, |md| md.steps.len());
    (m, step_idx.min(steps.saturating_sub(1)))
}

pub fn total_steps(modules: &[Module]) -> usize {
    modules.iter().map(|m| m.steps.len()).sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelUp {
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ProgressionState,
    pub level_up: Option<LevelUp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Completed,
    Current,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry<'a> {
    pub index: usize,
    pub title: &'a str,
    pub status: ModuleStatus,
    /// Filled only for the current module.
    pub steps: Vec<StepStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionState {
    pub module_idx: usize,
    pub step_idx: usize,
    pub total_profit: f64,
    pub claimed_steps: BTreeSet<(usize, usize)>,
    pub sim_price: f64,
    pub last_initial_price: f64,
    pub sim: SimulatorInputs,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            module_idx: 0,
            step_idx: 0,
            total_profit: 0.0,
            claimed_steps: BTreeSet::new(),
            sim_price: DEFAULT_SIM_PRICE,
            last_initial_price: DEFAULT_SIM_PRICE,
            sim: SimulatorInputs::default(),
        }
    }
}

impl ProgressionState {
    /// Rebuild from a persisted record. The cursor is clamped into `modules`
    /// and setup is applied as if entering the step fresh.
    pub fn from_record(record: &ProgressRecord, modules: &[Module]) -> Self {
        let mut claimed_steps = BTreeSet::new();
        for key in &record.claimed_steps {
            match parse_claim_key(key) {
                Some(k) => {
                    claimed_steps.insert(k);
                }
                None => warn!("Dropping malformed claim key {:?}", key),
            }
        }
        let (m, s) = clamp_cursor(modules, record.current_module_idx, record.current_step_idx);
        if (m, s) != (record.current_module_idx, record.current_step_idx) {
            warn!(
                "Saved position {}-{} is outside the course; clamped to {}-{}",
                record.current_module_idx, record.current_step_idx, m, s
            );
        }
        let mut state = Self {
            module_idx: m,
            step_idx: s,
            total_profit: record.total_profit,
            claimed_steps,
            ..Self::default()
        };
        state.apply_setup(modules, m, s, DEFAULT_SIM_PRICE);
        state
    }

    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord {
            current_module_idx: self.module_idx,
            current_step_idx: self.step_idx,
            total_profit: self.total_profit,
            claimed_steps: self.claimed_steps.iter().map(|&(m, s)| claim_key(m, s)).collect(),
            saved_at: None,
        }
    }

    /// Fresh state positioned on the first step of `modules`.
    pub fn start(modules: &[Module]) -> Self {
        let mut state = Self::default();
        state.apply_setup(modules, 0, 0, DEFAULT_SIM_PRICE);
        state
    }

    /// Price reveal rule. Entering a module resets the baseline to its
    /// opening price; within a module a new price becomes "now" and the
    /// previous one becomes "then". No price in the setup leaves both alone.
    pub fn apply_setup(&mut self, modules: &[Module], module_idx: usize, step_idx: usize, old_price: f64) {
        let setup_price = modules
            .get(module_idx)
            .and_then(|m| m.steps.get(step_idx))
            .and_then(|st| st.setup.as_ref())
            .and_then(|su| su.sim_price);

        if let Some(price) = setup_price {
            if step_idx == 0 {
                self.sim_price = price;
                self.last_initial_price = price;
            } else if price != old_price {
                self.sim_price = price;
                self.last_initial_price = old_price;
            }
        }
        self.sim = replay_inputs(modules, module_idx, step_idx);
    }

    /// Credit a step's profit once. Returns the new rank if it went up.
    pub fn claim_step_profit(
        &mut self,
        modules: &[Module],
        levels: &[Level],
        module_idx: usize,
        step_idx: usize,
    ) -> Option<LevelUp> {
        let profit = modules.get(module_idx)?.steps.get(step_idx)?.profit?;
        if !self.claimed_steps.insert((module_idx, step_idx)) {
            return None;
        }

        let before = calculate_progress(levels, self.total_profit).current_level.id;
        self.total_profit += profit;
        let after = calculate_progress(levels, self.total_profit).current_level;
        debug!(
            "Claimed {} for step {}; total {}",
            profit,
            claim_key(module_idx, step_idx),
            self.total_profit
        );

        (after.id > before).then(|| LevelUp { level: after.clone() })
    }

    /// Claim the current step, then move forward. On the last step only the
    /// claim happens; the cursor stays put.
    pub fn advance(&self, modules: &[Module], levels: &[Level]) -> Transition {
        let mut next = self.clone();
        let level_up = next.claim_step_profit(modules, levels, self.module_idx, self.step_idx);
        if self.is_last_step(modules) {
            return Transition { state: next, level_up };
        }

        let steps_here = modules.get(self.module_idx).map_or(0, |m| m.steps.len());
        if self.step_idx + 1 < steps_here {
            next.step_idx += 1;
        } else {
            next.module_idx += 1;
            next.step_idx = 0;
        }
        next.apply_setup(modules, next.module_idx, next.step_idx, self.sim_price);

        Transition { state: next, level_up }
    }

    /// Move back one step without touching profit. No-op on the first step.
    pub fn retreat(&self, modules: &[Module]) -> ProgressionState {
        let mut prev = self.clone();
        if self.step_idx > 0 {
            prev.step_idx -= 1;
        } else if self.module_idx > 0 {
            prev.module_idx -= 1;
            prev.step_idx = modules
                .get(prev.module_idx)
                .map_or(0, |m| m.steps.len().saturating_sub(1));
        } else {
            return prev;
        }
        prev.apply_setup(modules, prev.module_idx, prev.step_idx, self.sim_price);
        prev
    }

    /// Direct jump. Never claims profit.
    pub fn navigate_to(
        &self,
        modules: &[Module],
        policy: NavigationPolicy,
        module_idx: usize,
        step_idx: usize,
    ) -> Result<ProgressionState, NavError> {
        let exists = modules
            .get(module_idx)
            .is_some_and(|m| step_idx < m.steps.len());
        if !exists {
            return Err(NavError::OutOfRange {
                module: module_idx,
                step: step_idx,
            });
        }
        if !policy.allow_jump_ahead && module_idx > self.module_idx {
            return Err(NavError::Locked { module: module_idx });
        }
        let mut next = self.clone();
        next.module_idx = module_idx;
        next.step_idx = step_idx;
        next.apply_setup(modules, module_idx, step_idx, self.sim_price);
        Ok(next)
    }

    /// Same learner, different content: keep claims and profit, clamp the cursor.
    pub fn rebase(&self, modules: &[Module]) -> ProgressionState {
        let mut next = self.clone();
        let (m, s) = clamp_cursor(modules, self.module_idx, self.step_idx);
        next.module_idx = m;
        next.step_idx = s;
        next.apply_setup(modules, m, s, self.sim_price);
        next
    }

    pub fn is_first_step(&self) -> bool {
        self.module_idx == 0 && self.step_idx == 0
    }

    pub fn is_last_step(&self, modules: &[Module]) -> bool {
        let last_module = modules.len().saturating_sub(1);
        self.module_idx == last_module
            && modules
                .get(last_module)
                .is_some_and(|m| self.step_idx + 1 == m.steps.len())
    }

    /// Steps strictly before the cursor, across modules.
    pub fn steps_before(&self, modules: &[Module]) -> usize {
        total_steps(&modules[..self.module_idx.min(modules.len())]) + self.step_idx
    }

    /// 1-based position across the whole course.
    pub fn current_step_number(&self, modules: &[Module]) -> usize {
        self.steps_before(modules) + 1
    }

    pub fn overall_percent(&self, modules: &[Module]) -> u32 {
        let total = total_steps(modules);
        if total == 0 {
            return 0;
        }
        (self.steps_before(modules) as f64 / total as f64 * 100.0).round() as u32
    }

    pub fn progress<'a>(&self, levels: &'a [Level]) -> Progress<'a> {
        calculate_progress(levels, self.total_profit)
    }

    pub fn price_change(&self) -> PriceChange {
        engine::price_change(self.last_initial_price, self.sim_price)
    }

    pub fn is_claimed(&self, module_idx: usize, step_idx: usize) -> bool {
        self.claimed_steps.contains(&(module_idx, step_idx))
    }

    pub fn outline<'a>(&self, modules: &'a [Module]) -> Vec<OutlineEntry<'a>> {
        modules
            .iter()
            .enumerate()
            .map(|(index, m)| {
                let status = match index.cmp(&self.module_idx) {
                    std::cmp::Ordering::Less => ModuleStatus::Completed,
                    std::cmp::Ordering::Equal => ModuleStatus::Current,
                    std::cmp::Ordering::Greater => ModuleStatus::Locked,
                };
                let steps = if status == ModuleStatus::Current {
                    (0..m.steps.len())
                        .map(|s| match s.cmp(&self.step_idx) {
                            std::cmp::Ordering::Less => StepStatus::Completed,
                            std::cmp::Ordering::Equal => StepStatus::Current,
                            std::cmp::Ordering::Greater => StepStatus::Upcoming,
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                OutlineEntry {
                    index,
                    title: &m.title,
                    status,
                    steps,
                }
            })
            .collect()
    }
}

/// Engine facade the presentation layer talks to. Every mutating call is
/// written through to the store before it returns.
pub struct Session<S: KeyValueStore> {
    content: ContentStore,
    levels: &'static [Level],
    variant: ContentVariant,
    state: ProgressionState,
    policy: NavigationPolicy,
    store: S,
}

impl<S: KeyValueStore> Session<S> {
    /// Restore from the store, falling back to a fresh start on any problem.
    pub fn initialize(content: ContentStore, store: S, policy: NavigationPolicy) -> Self {
        let variant = store::load_variant(&store);
        let modules = content.modules(variant);
        let state = match store::load_progress(&store) {
            Some(rec) => {
                info!(
                    "Restored progress at {}-{} with profit {} (saved {:?})",
                    rec.current_module_idx, rec.current_step_idx, rec.total_profit, rec.saved_at
                );
                ProgressionState::from_record(&rec, modules)
            }
            None => ProgressionState::start(modules),
        };
        Self {
            content,
            levels: LEVELS,
            variant,
            state,
            policy,
            store,
        }
    }

    pub fn advance(&mut self) -> Option<LevelUp> {
        let Transition { state, level_up } = self.state.advance(self.content.modules(self.variant), self.levels);
        self.state = state;
        if let Some(up) = &level_up {
            info!("Rank up: level {} {}", up.level.id, up.level.title);
        }
        self.persist();
        level_up
    }

    pub fn retreat(&mut self) {
        if self.state.is_first_step() {
            return;
        }
        self.state = self.state.retreat(self.content.modules(self.variant));
        self.persist();
    }

    pub fn navigate_to(&mut self, module_idx: usize, step_idx: usize) -> Result<(), NavError> {
        let next = self
            .state
            .navigate_to(self.content.modules(self.variant), self.policy, module_idx, step_idx)?;
        self.state = next;
        self.persist();
        Ok(())
    }

    /// Back to the start. Variant and onboarding flag are kept.
    pub fn reset(&mut self) {
        if let Err(e) = store::clear_progress(&mut self.store) {
            warn!("Could not clear saved progress: {:#}", e);
        }
        self.state = ProgressionState::start(self.content.modules(self.variant));
        info!("Progress reset");
    }

    pub fn set_content_variant(&mut self, variant: ContentVariant) {
        if let Err(e) = store::save_variant(&mut self.store, variant) {
            warn!("Could not save content variant: {:#}", e);
        }
        if variant == self.variant {
            return;
        }
        self.variant = variant;
        self.state = self.state.rebase(self.content.modules(variant));
        info!("Switched content to {}", variant);
        self.persist();
    }

    pub fn needs_onboarding(&self) -> bool {
        !store::onboarding_complete(&self.store)
    }

    pub fn complete_onboarding(&mut self, variant: ContentVariant) {
        self.set_content_variant(variant);
        if let Err(e) = store::mark_onboarding_complete(&mut self.store) {
            warn!("Could not save onboarding flag: {:#}", e);
        }
    }

    fn persist(&mut self) {
        let mut record = self.state.to_record();
        record.saved_at = Some(Utc::now());
        if let Err(e) = store::save_progress(&mut self.store, &record) {
            warn!("Could not save progress: {:#}", e);
        }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn variant(&self) -> ContentVariant {
        self.variant
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn modules(&self) -> &[Module] {
        self.content.modules(self.variant)
    }

    pub fn current_module(&self) -> Option<&Module> {
        self.modules().get(self.state.module_idx)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.content.step(self.variant, self.state.module_idx, self.state.step_idx)
    }

    pub fn current_step_number(&self) -> usize {
        self.state.current_step_number(self.modules())
    }

    pub fn total_steps(&self) -> usize {
        total_steps(self.modules())
    }

    pub fn is_first_step(&self) -> bool {
        self.state.is_first_step()
    }

    pub fn is_last_step(&self) -> bool {
        self.state.is_last_step(self.modules())
    }

    pub fn progress(&self) -> Progress<'static> {
        self.state.progress(self.levels)
    }

    pub fn outline(&self) -> Vec<OutlineEntry<'_>> {
        self.state.outline(self.modules())
    }

    /// P/L of the current simulator inputs at the current price.
    pub fn quote(&self) -> PnlBreakdown {
        let sim = &self.state.sim;
        engine::calculate_pnl(
            sim.option_type,
            sim.side,
            sim.strike,
            self.state.sim_price,
            sim.premium,
            sim.days_left,
            sim.volatility(),
        )
    }

    /// Payoff curve over `strike * (1 ± range_pct)`.
    pub fn payoff_curve(&self, range_pct: f64, step: f64) -> Vec<PayoffPoint> {
        let sim = &self.state.sim;
        let start = (sim.strike * (1.0 - range_pct)).floor().max(0.0);
        let end = (sim.strike * (1.0 + range_pct)).ceil();
        engine::generate_payoff_data(
            sim.option_type,
            sim.side,
            sim.strike,
            sim.premium,
            sim.volatility(),
            sim.days_left,
            start,
            end,
            step,
        )
    }

    /// Point the simulator at a named preset.
    pub fn apply_scenario(&mut self, option_type: OptionType, side: Side) {
        self.state.sim.option_type = option_type;
        self.state.sim.side = side;
    }
}

use crate::debounce::{DebounceAccumulator, Observation};
use crate::rules::{rule_key, Compare, Rule, RuleError, RuleStore};
use anyhow::Result;
use chrono::Utc;
use homemon_common::format::type_value;
use homemon_common::types::{ChangeKind, ChatId, Reading, Topic};
use homemon_notify::ChatSink;
use homemon_storage::{LastValueCache, TimePartitionedLog};
use std::sync::Arc;

/// Orchestrates rule evaluation for incoming readings.
///
/// On each fresh reading the engine compares the previous cached value with
/// the new one against every rule that references the topic, either as its
/// subject or as its comparison target, feeds detected edges into the
/// debounce accumulator, and delivers confirmed alerts through the chat
/// sink. It is the only component that emits outward notifications.
pub struct NotifyEngine {
    cache: Arc<LastValueCache>,
    history: Arc<TimePartitionedLog>,
    rules: Arc<RuleStore>,
    debounce: DebounceAccumulator,
    sink: Arc<dyn ChatSink>,
}

impl NotifyEngine {
    pub fn new(
        cache: Arc<LastValueCache>,
        history: Arc<TimePartitionedLog>,
        rules: Arc<RuleStore>,
        sink: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            cache,
            history,
            rules,
            debounce: DebounceAccumulator::new(),
            sink,
        }
    }

    /// Routes one inbound reading from the transport collaborator.
    ///
    /// Retained snapshots only refresh the cache. Fresh readings are
    /// evaluated against the rules first (while the cache still holds the
    /// previous value), then appended to the history log, then cached.
    pub fn ingest(&self, reading: &Reading) -> Result<()> {
        if !reading.fresh {
            self.cache.set(&reading.topic, None, reading.value);
            return Ok(());
        }
        let now = Utc::now();
        self.check(&reading.topic, reading.value);
        self.history.append(&reading.topic, now, reading.value)?;
        self.cache.set(&reading.topic, Some(now), reading.value);
        Ok(())
    }

    /// Evaluates all rules affected by a new value for `topic`.
    ///
    /// A fault in one rule never blocks the others; rules whose comparison
    /// side cannot be resolved yet are skipped for this round.
    pub fn check(&self, topic: &Topic, value: f64) {
        let Some(previous) = self.cache.get(topic) else {
            // Nothing to compare against yet; expected right after start.
            return;
        };

        for rule in self.rules.by_topic(topic) {
            self.check_direct(rule, value, previous.value);
        }

        for rule in self.rules.by_compare_to(topic) {
            self.check_reflected(rule, value, previous.value);
        }
    }

    /// The changed topic is the rule's subject; resolve the comparison side.
    fn check_direct(&self, rule: Rule, current: f64, previous: f64) {
        let compare_to = match &rule.compare {
            Compare::Value(value) => *value,
            Compare::Topic(target) => {
                if *target == rule.topic {
                    // Legacy persisted state may violate the self-comparison
                    // invariant; skip rather than evaluate nonsense.
                    tracing::warn!(rule = %rule.describe(false), "skipping self-comparing rule");
                    return;
                }
                match self.cache.get(target) {
                    Some(datapoint) => datapoint.value,
                    None => return,
                }
            }
        };

        for &change in &rule.change {
            let was_active = change.is_active(previous, compare_to);
            let is_active = change.is_active(current, compare_to);
            if was_active != is_active {
                self.schedule(
                    &rule,
                    change,
                    Observation {
                        current_value: current,
                        compare_to,
                    },
                );
            }
        }
    }

    /// The changed topic is the rule's comparison target; the rule's own
    /// subject keeps its cached value while the comparison side moves from
    /// `previous` to `current`.
    fn check_reflected(&self, rule: Rule, current: f64, previous: f64) {
        if rule.compare_topic() == Some(&rule.topic) {
            return;
        }
        let Some(subject) = self.cache.get(&rule.topic) else {
            return;
        };

        for &change in &rule.change {
            let was_active = change.is_active(subject.value, previous);
            let is_active = change.is_active(subject.value, current);
            if was_active != is_active {
                self.schedule(
                    &rule,
                    change,
                    Observation {
                        current_value: subject.value,
                        compare_to: current,
                    },
                );
            }
        }
    }

    fn schedule(&self, rule: &Rule, change: ChangeKind, observation: Observation) {
        let key = rule_key(rule);
        let sink = Arc::clone(&self.sink);
        let rule = rule.clone();
        self.debounce.observe(
            key,
            change,
            rule.stable_seconds,
            observation,
            move |confirmed| async move {
                let text = compose_alert_text(&rule, change, confirmed);
                if let Err(e) = sink.send(rule.chat, &text).await {
                    tracing::warn!(chat = rule.chat, error = %e, "failed to deliver alert");
                }
            },
        );
    }

    // Rule management, consumed by the UI collaborator.

    pub fn add_rule(&self, rule: Rule) -> Result<(), RuleError> {
        self.rules.add(rule)
    }

    /// Removes a rule and cancels any debounce window still pending for it.
    pub fn remove_rule(&self, rule: &Rule) -> Result<(), RuleError> {
        self.rules.remove(rule)?;
        self.debounce.cancel_rule(&rule_key(rule));
        Ok(())
    }

    pub fn rules_for_topic(&self, topic: &Topic) -> Vec<Rule> {
        self.rules.by_topic(topic)
    }

    pub fn rules_for_chat(&self, chat: ChatId) -> Vec<Rule> {
        self.rules.by_chat(chat)
    }
}

/// Chat text for a confirmed alert: comparison target (for topic
/// comparisons), the subject topic, and both sides of the crossing with
/// their measurement unit.
fn compose_alert_text(rule: &Rule, change: ChangeKind, observation: Observation) -> String {
    let symbol = change.symbol();
    let mut text = String::new();
    if let Compare::Topic(target) = &rule.compare {
        text.push_str(&format!("{target} {symbol} "));
    }
    text.push_str(&format!("*{}*\n", rule.topic));
    text.push_str(&format!(
        "{} {symbol} {}",
        type_value(&rule.topic.measurement, observation.compare_to),
        type_value(&rule.topic.measurement, observation.current_value),
    ));
    text
}

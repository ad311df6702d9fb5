use homemon_common::format::type_value;
use homemon_common::types::{ChangeKind, ChatId, Topic};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// What a rule's subject is compared against.
///
/// The discriminant lives in the serialized form as `"compare"` with the
/// target under `"compareTo"`, so a rule file entry reads
/// `{"compare": "value", "compareTo": 42, ...}` or
/// `{"compare": "topic", "compareTo": "bedroom/temp", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "compare", content = "compareTo", rename_all = "lowercase")]
pub enum Compare {
    Value(f64),
    Topic(Topic),
}

/// One alert rule. Immutable once stored, removable by structural equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// The subject being watched.
    pub topic: Topic,
    /// Non-empty set of change kinds this rule alerts on.
    pub change: BTreeSet<ChangeKind>,
    #[serde(flatten)]
    pub compare: Compare,
    /// Quiet period an edge must survive before an alert goes out.
    pub stable_seconds: u64,
    pub chat: ChatId,
}

impl Rule {
    /// The comparison topic, when this rule compares against another topic.
    pub fn compare_topic(&self) -> Option<&Topic> {
        match &self.compare {
            Compare::Topic(topic) => Some(topic),
            Compare::Value(_) => None,
        }
    }

    /// One-line human rendering, e.g. `temp *livingroom* 📈📉 42°C >1 min`.
    pub fn describe(&self, markdown: bool) -> String {
        let mut text = format!("{} ", self.topic.measurement);
        if markdown {
            text.push_str(&format!("*{}*", self.topic.position));
        } else {
            text.push_str(&self.topic.position);
        }
        text.push(' ');
        for change in &self.change {
            text.push_str(change.symbol());
        }
        text.push(' ');
        match &self.compare {
            Compare::Value(value) => {
                text.push_str(&type_value(&self.topic.measurement, *value));
            }
            Compare::Topic(topic) => text.push_str(&topic.to_string()),
        }
        let stable_minutes = (self.stable_seconds as f64 / 6.0).round() / 10.0;
        text.push_str(&format!(" >{stable_minutes} min"));
        text
    }
}

/// Canonical identity string of a rule, used to key debounce state.
/// Stable because field order is fixed and the change set is ordered.
pub fn rule_key(rule: &Rule) -> String {
    serde_json::to_string(rule).unwrap_or_else(|_| format!("{rule:?}"))
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule must watch at least one change kind")]
    EmptyChangeSet,

    #[error("rule on {topic} cannot compare against itself")]
    SelfComparison { topic: Topic },

    #[error("rules: I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rules: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted collection of alert rules, keyed by subject topic.
///
/// Every add/remove synchronously rewrites the whole rule file in a
/// canonical form (sorted topic keys, fixed field order, 2-space indent) so
/// repeated writes stay diff-friendly. The rewrite goes through a temp file
/// plus rename.
pub struct RuleStore {
    path: PathBuf,
    rules: Mutex<BTreeMap<String, Vec<Rule>>>,
}

impl RuleStore {
    /// Opens the store at `path`. An absent or unreadable rule file loads as
    /// "no rules"; it may predate this process or a schema change.
    pub fn load(path: &Path) -> Self {
        let rules = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(rules) => rules,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "rule file unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "rule file unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            rules: Mutex::new(rules),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Rule>>> {
        self.rules
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, rule: Rule) -> Result<(), RuleError> {
        if rule.change.is_empty() {
            return Err(RuleError::EmptyChangeSet);
        }
        if rule.compare_topic() == Some(&rule.topic) {
            return Err(RuleError::SelfComparison { topic: rule.topic });
        }
        let mut rules = self.lock();
        rules.entry(rule.topic.to_string()).or_default().push(rule);
        self.save(&rules)
    }

    /// Removes the rule matching `rule` structurally. Removing a rule that
    /// is not stored is a no-op.
    pub fn remove(&self, rule: &Rule) -> Result<(), RuleError> {
        let mut rules = self.lock();
        let key = rule.topic.to_string();
        if let Some(entry) = rules.get_mut(&key) {
            entry.retain(|stored| stored != rule);
            if entry.is_empty() {
                rules.remove(&key);
            }
        }
        self.save(&rules)
    }

    /// Rules whose subject is `topic`.
    pub fn by_topic(&self, topic: &Topic) -> Vec<Rule> {
        self.lock()
            .get(&topic.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Rules watching some other subject against `topic` as their
    /// comparison target.
    pub fn by_compare_to(&self, topic: &Topic) -> Vec<Rule> {
        self.lock()
            .values()
            .flatten()
            .filter(|rule| rule.compare_topic() == Some(topic))
            .cloned()
            .collect()
    }

    /// All rules addressed to `chat`.
    pub fn by_chat(&self, chat: ChatId) -> Vec<Rule> {
        self.lock()
            .values()
            .flatten()
            .filter(|rule| rule.chat == chat)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn save(&self, rules: &BTreeMap<String, Vec<Rule>>) -> Result<(), RuleError> {
        let content = serde_json::to_string_pretty(rules)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|source| RuleError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| RuleError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

use crate::{parser::RuleSink, types::IndexMap};
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

/// A named build target with its ordered dependencies and commands.
///
/// Rules are immutable once the parse pass that produced them has finished.
/// Scheduling state lives in the ready queue and the completion registry,
/// never on the rule itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    target: String,
    dependencies: Vec<String>,
    commands: Vec<String>,
}

impl Rule {
    /// Creates a rule from its parts.
    pub fn new<D, C>(target: impl Into<String>, dependencies: D, commands: C) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            target: target.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Target name, unique within a build.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Dependency names in declaration order. Each names another rule, a
    /// plain file, or neither.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Shell commands in execution order.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

/// Every rule of a build, keyed by target name, in declaration order.
///
/// Populated once through [`RuleRepositoryBuilder`] and read-only afterwards,
/// so workers share it without locking.
#[derive(Debug, Default)]
pub struct RuleRepository {
    rules: IndexMap<String, Arc<Rule>>,
}

impl RuleRepository {
    /// Starts an empty repository that collects parser callbacks.
    pub fn builder() -> RuleRepositoryBuilder {
        RuleRepositoryBuilder::default()
    }

    /// Whether `name` is a declared rule rather than a plain file.
    #[must_use]
    pub fn is_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.get(name)
    }

    /// Rules in declaration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<Rule> for RuleRepository {
    /// Collects rules, keeping the first rule for a repeated target.
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut rules = IndexMap::with_hasher(FxBuildHasher);
        for rule in iter {
            rules
                .entry(rule.target.clone())
                .or_insert_with(|| Arc::new(rule));
        }
        Self { rules }
    }
}

/// Mutable phase of a [`RuleRepository`]; receives the parser's callbacks.
#[derive(Debug, Default)]
pub struct RuleRepositoryBuilder {
    rules: IndexMap<String, Rule>,
}

impl RuleRepositoryBuilder {
    /// Freezes the collected rules.
    #[must_use]
    pub fn finish(self) -> RuleRepository {
        RuleRepository {
            rules: self
                .rules
                .into_iter()
                .map(|(target, rule)| (target, Arc::new(rule)))
                .collect(),
        }
    }
}

impl RuleSink for RuleRepositoryBuilder {
    fn on_new_target(&mut self, target: &str) {
        if self.rules.contains_key(target) {
            return;
        }
        self.rules.insert(
            target.to_owned(),
            Rule::new(target, Vec::<String>::new(), Vec::<String>::new()),
        );
    }

    fn on_new_dependency(&mut self, target: &str, dependency: &str) {
        if let Some(rule) = self.rules.get_mut(target) {
            rule.dependencies.push(dependency.to_owned());
        }
    }

    fn on_new_command(&mut self, target: &str, command: &str) {
        if let Some(rule) = self.rules.get_mut(target) {
            rule.commands.push(command.to_owned());
        }
    }
}

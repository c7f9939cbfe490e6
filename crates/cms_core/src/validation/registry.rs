//! Rule registry and payload validation pipeline.
//!
//! Rules are attached to `(kind, field)` pairs at startup and evaluated in
//! registration order. The first failing rule stops the pipeline.

use crate::model::kind::EntityKind;
use crate::model::record::{FieldMap, FieldValue};
use crate::repo::error::{FieldViolation, RepoError, RepoResult};
use crate::validation::condition::ValidationCondition;
use crate::validation::engine::{PasswordLevel, RuleOutcome, ValidationEngine};
use log::debug;
use std::collections::BTreeMap;

/// Write being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Write modes a rule runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Always,
    OnCreate,
    OnUpdate,
}

impl Applies {
    pub fn covers(self, mode: WriteMode) -> bool {
        matches!(
            (self, mode),
            (Self::Always, _) | (Self::OnCreate, WriteMode::Create) | (Self::OnUpdate, WriteMode::Update)
        )
    }
}

/// One check bound to its condition or parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    Unique(ValidationCondition),
    UniqueOnUpdate(ValidationCondition),
    TreeUnique(ValidationCondition),
    TreeUniqueOnUpdate(ValidationCondition),
    Exists(ValidationCondition),
    /// Must equal (or, negated, differ from) another payload field.
    Matches { other: String, negate: bool },
    PasswordStrength(PasswordLevel),
}

impl FieldRule {
    pub fn evaluate(
        &self,
        engine: &ValidationEngine<'_>,
        value: &FieldValue,
        payload: &FieldMap,
    ) -> RuleOutcome {
        match self {
            Self::Unique(condition) => engine.check_unique(condition, value),
            Self::UniqueOnUpdate(condition) => {
                engine.check_unique_on_update(condition, value, payload)
            }
            Self::TreeUnique(condition) => engine.check_tree_unique(condition, value, payload),
            Self::TreeUniqueOnUpdate(condition) => {
                engine.check_tree_unique_on_update(condition, value, payload)
            }
            Self::Exists(condition) => engine.check_exists(condition, value),
            Self::Matches { other, negate } => {
                ValidationEngine::check_match(Some(value), payload.get(other), *negate)
            }
            Self::PasswordStrength(level) => match value.as_text() {
                Some(text) => ValidationEngine::check_password_strength(text, *level),
                None => RuleOutcome::fail("password must be text"),
            },
        }
    }

    /// Secret-bearing rules keep the value out of the reported violation.
    fn reports_value(&self) -> bool {
        !matches!(self, Self::Matches { .. } | Self::PasswordStrength(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRule {
    pub rule: FieldRule,
    pub applies: Applies,
}

/// `(kind, field)` to ordered rules.
#[derive(Debug, Clone, Default)]
pub struct ValidationRegistry {
    rules: BTreeMap<(EntityKind, String), Vec<RegisteredRule>>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kind: EntityKind,
        field: impl Into<String>,
        rule: FieldRule,
        applies: Applies,
    ) -> &mut Self {
        self.rules
            .entry((kind, field.into()))
            .or_default()
            .push(RegisteredRule { rule, applies });
        self
    }

    pub fn rules_for(&self, kind: EntityKind, field: &str) -> &[RegisteredRule] {
        self.rules
            .get(&(kind, field.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Fields of `kind` that carry at least one rule, in name order.
    pub fn fields_for(&self, kind: EntityKind) -> impl Iterator<Item = (&str, &[RegisteredRule])> {
        self.rules
            .iter()
            .filter(move |((rule_kind, _), _)| *rule_kind == kind)
            .map(|((_, field), rules)| (field.as_str(), rules.as_slice()))
    }

    /// Rules for the five built-in kinds: uniqueness mirrors the store's
    /// unique indexes, references must point at active records.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let sibling_name = ValidationCondition::for_kind(EntityKind::Category, "name")
            .within_siblings("parent_id");
        registry
            .register(
                EntityKind::Category,
                "name",
                FieldRule::TreeUnique(sibling_name.clone()),
                Applies::OnCreate,
            )
            .register(
                EntityKind::Category,
                "name",
                FieldRule::TreeUniqueOnUpdate(sibling_name),
                Applies::OnUpdate,
            )
            .register(
                EntityKind::Category,
                "parent_id",
                FieldRule::Exists(ValidationCondition::for_kind(EntityKind::Category, "id")),
                Applies::Always,
            )
            .register(
                EntityKind::Comment,
                "parent_id",
                FieldRule::Exists(ValidationCondition::for_kind(EntityKind::Comment, "id")),
                Applies::Always,
            )
            .register(
                EntityKind::Comment,
                "post_id",
                FieldRule::Exists(ValidationCondition::for_kind(EntityKind::Post, "id")),
                Applies::Always,
            );

        for (kind, field) in [
            (EntityKind::Tag, "name"),
            (EntityKind::Post, "slug"),
            (EntityKind::Permission, "name"),
        ] {
            let condition = ValidationCondition::for_kind(kind, field);
            registry
                .register(kind, field, FieldRule::Unique(condition.clone()), Applies::OnCreate)
                .register(
                    kind,
                    field,
                    FieldRule::UniqueOnUpdate(condition),
                    Applies::OnUpdate,
                );
        }
        registry
    }
}

/// Runs every rule registered for `kind` against `payload`.
///
/// Absent and null fields are skipped. The first failure is returned as
/// `ValidationFailed`.
pub fn validate_payload(
    engine: &ValidationEngine<'_>,
    registry: &ValidationRegistry,
    kind: EntityKind,
    mode: WriteMode,
    payload: &FieldMap,
) -> RepoResult<()> {
    for (field, rules) in registry.fields_for(kind) {
        let Some(value) = payload.get(field).filter(|value| !value.is_null()) else {
            continue;
        };
        for registered in rules.iter().filter(|rule| rule.applies.covers(mode)) {
            let outcome = registered.rule.evaluate(engine, value, payload);
            if outcome.passed {
                continue;
            }
            debug!(
                "event=payload_validate module=validation status=rejected kind={} field={} mode={:?}",
                kind, field, mode
            );
            let reported = registered.rule.reports_value().then(|| value.to_string());
            return Err(RepoError::ValidationFailed(FieldViolation::new(
                kind,
                field,
                reported,
                outcome
                    .message
                    .unwrap_or_else(|| format!("{field} is invalid")),
            )));
        }
    }
    Ok(())
}

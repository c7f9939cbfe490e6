//! Store-backed and pure field checks.
//!
//! # Responsibility
//! - Answer "may this value be written?" before a service write runs.
//! - Read the store through `SqliteRepository`, independently of the write.
//!
//! # Invariants
//! - A check never returns an error: store failures, unknown kinds and
//!   unknown columns all produce a failed `RuleOutcome`.
//! - Update checks that cannot resolve the record being updated fail closed.
//! - Trashed records never count against uniqueness.

use crate::model::kind::EntityKind;
use crate::model::record::{FieldMap, FieldValue, RecordId};
use crate::repo::base_repo::{BaseRepository, SqliteRepository};
use crate::repo::query::{ParentScope, RecordFilter};
use crate::validation::condition::ValidationCondition;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;

static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").expect("digit pattern"));
static LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").expect("letter pattern"));
static LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]").expect("lowercase pattern"));
static UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").expect("uppercase pattern"));
static SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[!@#$%^&]").expect("symbol pattern"));

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub passed: bool,
    pub message: Option<String>,
}

impl RuleOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Character classes a password must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PasswordLevel {
    /// Digit and letter.
    DigitLetter = 1,
    /// Digit and lowercase letter.
    DigitLower = 2,
    /// Digit and uppercase letter.
    DigitUpper = 3,
    /// Digit, lowercase and uppercase letter.
    DigitMixedCase = 4,
    /// Mixed case, digit and one of `!@#$%^&`.
    DigitMixedCaseSymbol = 5,
}

impl PasswordLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::DigitLetter),
            2 => Some(Self::DigitLower),
            3 => Some(Self::DigitUpper),
            4 => Some(Self::DigitMixedCase),
            5 => Some(Self::DigitMixedCaseSymbol),
            _ => None,
        }
    }

    fn classes(self) -> Vec<(&'static Regex, &'static str)> {
        let digit = (&*DIGIT, "a digit");
        let lower = (&*LOWER, "a lowercase letter");
        let upper = (&*UPPER, "an uppercase letter");
        match self {
            Self::DigitLetter => vec![digit, (&*LETTER, "a letter")],
            Self::DigitLower => vec![digit, lower],
            Self::DigitUpper => vec![digit, upper],
            Self::DigitMixedCase => vec![digit, lower, upper],
            Self::DigitMixedCaseSymbol => vec![digit, lower, upper, (&*SYMBOL, "one of !@#$%^&")],
        }
    }
}

/// Evaluates conditions against one connection.
pub struct ValidationEngine<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ValidationEngine<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Passes when no active record of the target kind holds `value`.
    pub fn check_unique(&self, condition: &ValidationCondition, value: &FieldValue) -> RuleOutcome {
        let filter = RecordFilter::new().eq(condition.field.as_str(), value.clone());
        self.expect_none(condition, filter, value)
    }

    /// Like `check_unique`, ignoring the record named by the payload.
    pub fn check_unique_on_update(
        &self,
        condition: &ValidationCondition,
        value: &FieldValue,
        payload: &FieldMap,
    ) -> RuleOutcome {
        let filter = RecordFilter::new().eq(condition.field.as_str(), value.clone());
        match ignore_self(condition, payload, filter) {
            Ok(filter) => self.expect_none(condition, filter, value),
            Err(outcome) => outcome,
        }
    }

    /// Unique among siblings when the condition is tree-scoped, globally
    /// otherwise.
    pub fn check_tree_unique(
        &self,
        condition: &ValidationCondition,
        value: &FieldValue,
        payload: &FieldMap,
    ) -> RuleOutcome {
        let filter = RecordFilter::new().eq(condition.field.as_str(), value.clone());
        match scope_to_siblings(condition, payload, filter) {
            Ok(filter) => self.expect_none(condition, filter, value),
            Err(outcome) => outcome,
        }
    }

    /// Sibling uniqueness ignoring the record named by the payload.
    pub fn check_tree_unique_on_update(
        &self,
        condition: &ValidationCondition,
        value: &FieldValue,
        payload: &FieldMap,
    ) -> RuleOutcome {
        let payload = match self.with_stored_parent(condition, payload) {
            Ok(payload) => payload,
            Err(outcome) => return outcome,
        };
        let filter = RecordFilter::new().eq(condition.field.as_str(), value.clone());
        let scoped = scope_to_siblings(condition, &payload, filter)
            .and_then(|filter| ignore_self(condition, &payload, filter));
        match scoped {
            Ok(filter) => self.expect_none(condition, filter, value),
            Err(outcome) => outcome,
        }
    }

    /// Passes when an active record of the target kind holds `value`.
    pub fn check_exists(&self, condition: &ValidationCondition, value: &FieldValue) -> RuleOutcome {
        let filter = RecordFilter::new().eq(condition.field.as_str(), value.clone());
        match self.count(condition, &filter) {
            Ok(0) => RuleOutcome::fail(format!(
                "no {} with {} `{value}`",
                condition.entity, condition.field
            )),
            Ok(_) => RuleOutcome::pass(),
            Err(outcome) => outcome,
        }
    }

    /// Passes when `value` equals `other`, or differs from it when `negate`.
    pub fn check_match(value: Option<&FieldValue>, other: Option<&FieldValue>, negate: bool) -> RuleOutcome {
        let equal = value == other;
        match (equal, negate) {
            (true, false) | (false, true) => RuleOutcome::pass(),
            (false, false) => RuleOutcome::fail("values do not match"),
            (true, true) => RuleOutcome::fail("values must differ"),
        }
    }

    pub fn check_password_strength(value: &str, level: PasswordLevel) -> RuleOutcome {
        let missing: Vec<&str> = level
            .classes()
            .into_iter()
            .filter(|(pattern, _)| !pattern.is_match(value))
            .map(|(_, label)| label)
            .collect();
        if missing.is_empty() {
            return RuleOutcome::pass();
        }
        RuleOutcome::fail(format!("password must contain {}", missing.join(" and ")))
    }

    /// Fills in the sibling scope from the stored record when an update
    /// payload leaves the parent out.
    fn with_stored_parent<'p>(
        &self,
        condition: &ValidationCondition,
        payload: &'p FieldMap,
    ) -> Result<Cow<'p, FieldMap>, RuleOutcome> {
        let Some(scope) = condition.tree_scope.as_ref() else {
            return Ok(Cow::Borrowed(payload));
        };
        if payload.contains_key(&scope.parent_field) {
            return Ok(Cow::Borrowed(payload));
        }
        let kind = resolve_kind(condition)?;
        let ignore = &condition.ignore;
        let current = match payload.get(&ignore.value_field) {
            Some(value) if !value.is_null() => value.clone(),
            _ => return Err(missing_self(condition)),
        };
        let filter = RecordFilter::new().eq(ignore.column.as_str(), current.clone());
        let stored = SqliteRepository::try_new(self.conn, kind)
            .and_then(|repo| repo.find_one(&filter, true));
        match stored {
            Ok(record) => {
                let mut scoped = payload.clone();
                scoped.insert(
                    scope.parent_field.clone(),
                    record.parent_id().map_or(FieldValue::Null, FieldValue::from),
                );
                Ok(Cow::Owned(scoped))
            }
            Err(err) if err.is_not_found() => Err(RuleOutcome::fail(format!(
                "{kind} with {} `{current}` does not exist",
                ignore.column
            ))),
            Err(err) => {
                warn!(
                    "event=validation_check module=validation status=error kind={} field={} error={}",
                    kind, condition.field, err
                );
                Err(RuleOutcome::fail(format!("{} could not be checked", condition.field)))
            }
        }
    }

    fn expect_none(
        &self,
        condition: &ValidationCondition,
        filter: RecordFilter,
        value: &FieldValue,
    ) -> RuleOutcome {
        match self.count(condition, &filter) {
            Ok(0) => RuleOutcome::pass(),
            Ok(_) => RuleOutcome::fail(format!("{} `{value}` is already taken", condition.field)),
            Err(outcome) => outcome,
        }
    }

    fn count(&self, condition: &ValidationCondition, filter: &RecordFilter) -> Result<u64, RuleOutcome> {
        let kind = resolve_kind(condition)?;
        if !kind.descriptor().is_filterable(&condition.field) {
            return Err(RuleOutcome::fail(format!(
                "{kind} has no field `{}`",
                condition.field
            )));
        }
        let outcome = SqliteRepository::try_new(self.conn, kind)
            .and_then(|repo| repo.count_matching(filter, false));
        outcome.map_err(|err| {
            warn!(
                "event=validation_check module=validation status=error kind={} field={} error={}",
                kind, condition.field, err
            );
            RuleOutcome::fail(format!("{} could not be checked", condition.field))
        })
    }
}

fn resolve_kind(condition: &ValidationCondition) -> Result<EntityKind, RuleOutcome> {
    condition
        .kind()
        .ok_or_else(|| RuleOutcome::fail(format!("unknown entity `{}`", condition.entity)))
}

fn ignore_self(
    condition: &ValidationCondition,
    payload: &FieldMap,
    filter: RecordFilter,
) -> Result<RecordFilter, RuleOutcome> {
    let ignore = &condition.ignore;
    match payload.get(&ignore.value_field) {
        Some(value) if !value.is_null() => Ok(filter.ne(ignore.column.as_str(), value.clone())),
        _ => Err(missing_self(condition)),
    }
}

fn missing_self(condition: &ValidationCondition) -> RuleOutcome {
    RuleOutcome::fail(format!(
        "`{}` is required to check {} on update",
        condition.ignore.value_field, condition.field
    ))
}

fn scope_to_siblings(
    condition: &ValidationCondition,
    payload: &FieldMap,
    filter: RecordFilter,
) -> Result<RecordFilter, RuleOutcome> {
    let Some(scope) = condition.tree_scope.as_ref() else {
        return Ok(filter);
    };
    let kind = resolve_kind(condition)?;
    if !kind.descriptor().is_tree {
        return Err(RuleOutcome::fail(format!("{kind} is not a tree kind")));
    }
    let parent = match payload.get(&scope.parent_field) {
        None | Some(FieldValue::Null) => ParentScope::Root,
        Some(value) => ParentScope::Under(parse_record_id(value).ok_or_else(|| {
            RuleOutcome::fail(format!("`{}` is not a valid id", scope.parent_field))
        })?),
    };
    Ok(filter.within_parent(parent))
}

fn parse_record_id(value: &FieldValue) -> Option<RecordId> {
    value.as_text().and_then(|text| Uuid::parse_str(text.trim()).ok())
}

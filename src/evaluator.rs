//! Attribute-based policy evaluation.

use std::net::IpAddr;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use regex::Regex;
use serde_json::Value;

use crate::check::{CheckRequest, CheckResult, Decision, MatchInfo};
use crate::error::{Error, Result};
use crate::matcher::match_glob;
use crate::policy::{Condition, Effect, Operator, Policy};

/// Evaluates ABAC policies against a check request.
///
/// Policies arrive pre-sorted by ascending priority. `Ok(None)` means the
/// evaluator has no opinion (no active policy matched).
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluates the policies and returns an explicit verdict, if any.
    async fn evaluate(
        &self,
        policies: &[Policy],
        req: &CheckRequest,
    ) -> Result<Option<CheckResult>>;
}

/// The built-in condition evaluator.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConditionEvaluator;

#[async_trait]
impl PolicyEvaluator for ConditionEvaluator {
    async fn evaluate(
        &self,
        policies: &[Policy],
        req: &CheckRequest,
    ) -> Result<Option<CheckResult>> {
        let mut first_deny: Option<CheckResult> = None;
        let mut first_allow: Option<CheckResult> = None;

        for policy in policies {
            if !policy.is_active {
                continue;
            }
            if !matches_subject(policy, req)
                || !matches_action(policy, req)
                || !matches_resource(policy, req)
            {
                continue;
            }
            if !evaluate_conditions(&policy.conditions, req).map_err(|source| {
                Error::PolicyCondition {
                    policy: policy.name.clone(),
                    source: Box::new(source),
                }
            })? {
                continue;
            }

            let info = MatchInfo {
                source: "abac".to_string(),
                rule_id: policy.id.to_string(),
                detail: format!("policy {:?} ({})", policy.name, policy.effect),
            };

            match policy.effect {
                Effect::Deny => {
                    if first_deny.is_none() {
                        first_deny = Some(CheckResult {
                            allowed: false,
                            decision: Decision::DenyExplicit,
                            reason: format!("denied by policy {:?}", policy.name),
                            matched_by: vec![info],
                            ..CheckResult::default()
                        });
                    }
                }
                Effect::Allow => {
                    if first_allow.is_none() {
                        first_allow = Some(CheckResult::allow(info));
                    }
                }
            }
        }

        // Explicit deny always wins over allow.
        Ok(first_deny.or(first_allow))
    }
}

fn matches_subject(policy: &Policy, req: &CheckRequest) -> bool {
    if policy.subjects.is_empty() {
        return true;
    }
    policy.subjects.iter().any(|matcher| {
        if !matcher.kind.is_empty() && matcher.kind != req.subject.kind.as_str() {
            return false;
        }
        if !matcher.id.is_empty() && matcher.id != req.subject.id {
            return false;
        }
        true
    })
}

fn matches_action(policy: &Policy, req: &CheckRequest) -> bool {
    if policy.actions.is_empty() {
        return true;
    }
    policy
        .actions
        .iter()
        .any(|pattern| pattern == "*" || match_glob(pattern, &req.action.name))
}

fn matches_resource(policy: &Policy, req: &CheckRequest) -> bool {
    if policy.resources.is_empty() {
        return true;
    }
    let target = format!("{}:{}", req.resource.kind, req.resource.id);
    let target_type = format!("{}:*", req.resource.kind);
    policy.resources.iter().any(|pattern| {
        pattern == "*"
            || *pattern == target
            || *pattern == target_type
            || match_glob(pattern, &target)
            || match_glob(pattern, &req.resource.kind)
    })
}

fn evaluate_conditions(conditions: &[Condition], req: &CheckRequest) -> Result<bool> {
    for condition in conditions {
        let actual = resolve_field(&condition.field, req);
        if !evaluate_condition(condition.operator, actual.as_ref(), &condition.value)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolves a dotted field path against the request. The head selects the
/// namespace; the tail is a known attribute name or a key in the free-form
/// attribute map. Missing segments resolve to `None`.
fn resolve_field(field: &str, req: &CheckRequest) -> Option<Value> {
    let (head, tail) = field.split_once('.')?;
    match head {
        "subject" => match tail {
            "kind" => Some(Value::String(req.subject.kind.as_str().to_string())),
            "id" => Some(Value::String(req.subject.id.clone())),
            _ => req.subject.attributes.get(tail).cloned(),
        },
        "resource" => match tail {
            "type" => Some(Value::String(req.resource.kind.clone())),
            "id" => Some(Value::String(req.resource.id.clone())),
            _ => req.resource.attributes.get(tail).cloned(),
        },
        "action" => (tail == "name").then(|| Value::String(req.action.name.clone())),
        "context" => req.context.get(tail).cloned(),
        _ => None,
    }
}

fn evaluate_condition(op: Operator, actual: Option<&Value>, expected: &Value) -> Result<bool> {
    match op {
        Operator::Eq => Ok(text(actual) == value_text(expected)),
        Operator::Neq => Ok(text(actual) != value_text(expected)),
        Operator::In => Ok(in_list(actual, expected)),
        Operator::NotIn => Ok(!in_list(actual, expected)),
        Operator::Contains => Ok(text(actual).contains(&value_text(expected))),
        Operator::StartsWith => Ok(text(actual).starts_with(&value_text(expected))),
        Operator::EndsWith => Ok(text(actual).ends_with(&value_text(expected))),
        Operator::Gt => Ok(to_f64(actual) > value_f64(expected)),
        Operator::Lt => Ok(to_f64(actual) < value_f64(expected)),
        Operator::Gte => Ok(to_f64(actual) >= value_f64(expected)),
        Operator::Lte => Ok(to_f64(actual) <= value_f64(expected)),
        Operator::Exists => Ok(!is_absent(actual)),
        Operator::NotExists => Ok(is_absent(actual)),
        Operator::IpInCidr => Ok(ip_in_cidr(&text(actual), expected)),
        Operator::TimeAfter => Ok(time_compare(actual, expected, true)),
        Operator::TimeBefore => Ok(time_compare(actual, expected, false)),
        Operator::Regex => {
            let pattern = value_text(expected);
            let re = Regex::new(&pattern).map_err(|err| {
                Error::InvalidCondition(format!("invalid regex {pattern:?}: {err}"))
            })?;
            Ok(re.is_match(&text(actual)))
        }
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn text(value: Option<&Value>) -> String {
    value.map(value_text).unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn in_list(actual: Option<&Value>, expected: &Value) -> bool {
    let Value::Array(items) = expected else {
        return false;
    };
    let needle = text(actual);
    items.iter().any(|item| value_text(item) == needle)
}

fn to_f64(value: Option<&Value>) -> f64 {
    value.map(value_f64).unwrap_or_default()
}

fn value_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn ip_in_cidr(ip: &str, cidrs: &Value) -> bool {
    let Ok(ip) = IpAddr::from_str(ip) else {
        return false;
    };
    let candidates: Vec<String> = match cidrs {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().map(value_text).collect(),
        _ => return false,
    };
    candidates
        .iter()
        .filter_map(|cidr| IpNet::from_str(cidr).ok())
        .any(|net| net.contains(&ip))
}

fn time_compare(actual: Option<&Value>, expected: &Value, after: bool) -> bool {
    let (Some(actual), Some(expected)) = (actual.and_then(parse_time), parse_time(expected))
    else {
        return false;
    };
    if after {
        actual > expected
    } else {
        actual < expected
    }
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                DateTime::from_timestamp(secs, 0)
            } else {
                n.as_f64()
                    .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
            }
        }
        _ => None,
    }
}

//! Query validation, the first of the two passes every query goes through.
//!
//! The validator walks a raw JSON query depth-first (WHERE, then
//! TRANSFORMATIONS, then OPTIONS) and builds the typed [`Query`] as it goes.
//! Any rule violation rejects the whole query with
//! [`InsightError::InvalidQuery`]; nothing is ever partially accepted.
//!
//! The first dataset id found in a qualified key fixes the dataset of the
//! query. Every later key must name that same dataset.

use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::{split_qualified_key, DatasetCatalog, DatasetKind, FieldType};
use crate::error::{InsightError, Result};
use crate::query::{
    ApplyRule, ApplyToken, Comparison, Direction, Filter, Matcher, Options, Order, Pattern, Query,
    Transformations, ValidatedQuery,
};

const WHERE: &str = "WHERE";
const OPTIONS: &str = "OPTIONS";
const TRANSFORMATIONS: &str = "TRANSFORMATIONS";
const COLUMNS: &str = "COLUMNS";
const ORDER: &str = "ORDER";
const GROUP: &str = "GROUP";
const APPLY: &str = "APPLY";

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(InsightError::invalid_query(message))
}

fn as_object<'v>(node: &'v Value, what: &str) -> Result<&'v Map<String, Value>> {
    match node {
        Value::Object(map) => Ok(map),
        _ => invalid(format!("{} must be an object", what)),
    }
}

/// Returns the only entry of an object holding exactly one key.
fn single_entry<'v>(node: &'v Value, what: &str) -> Result<(&'v String, &'v Value)> {
    let map = as_object(node, what)?;
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => invalid(format!("{} must have exactly one key, found {}", what, map.len())),
    }
}

fn non_empty_array<'v>(node: &'v Value, what: &str) -> Result<&'v Vec<Value>> {
    match node {
        Value::Array(items) if !items.is_empty() => Ok(items),
        Value::Array(_) => invalid(format!("{} must not be empty", what)),
        _ => invalid(format!("{} must be an array", what)),
    }
}

fn string_item<'v>(node: &'v Value, what: &str) -> Result<&'v str> {
    node.as_str()
        .ok_or_else(|| InsightError::invalid_query(format!("{} must contain strings only", what)))
}

/// What validation has resolved so far for one query.
#[derive(Debug, Default)]
struct Scope {
    dataset: Option<(String, DatasetKind)>,
    // GROUP keys and apply names, legal as columns once TRANSFORMATIONS exist
    legal_keys: Vec<String>,
    projection_keys: Vec<String>,
}

/// Validates raw queries against the datasets of a catalog.
///
/// The validator itself is stateless between calls, so validating the same
/// query twice gives the same verdict and the same dataset.
pub struct QueryValidator<'c> {
    catalog: &'c DatasetCatalog,
}

impl<'c> QueryValidator<'c> {
    pub fn new(catalog: &'c DatasetCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate(&self, query: &Value) -> Result<ValidatedQuery> {
        let root = as_object(query, "query")?;
        if let Some(key) = root
            .keys()
            .find(|key| !matches!(key.as_str(), WHERE | OPTIONS | TRANSFORMATIONS))
        {
            return invalid(format!("unexpected top-level key '{}'", key));
        }
        let where_node = root
            .get(WHERE)
            .ok_or_else(|| InsightError::invalid_query("missing WHERE"))?;
        let options_node = root
            .get(OPTIONS)
            .ok_or_else(|| InsightError::invalid_query("missing OPTIONS"))?;

        let mut scope = Scope::default();
        let filter = self.validate_where(&mut scope, where_node)?;
        let transformations = match root.get(TRANSFORMATIONS) {
            Some(node) => Some(self.validate_transformations(&mut scope, node)?),
            None => None,
        };
        let options = self.validate_options(&mut scope, options_node, transformations.is_some())?;

        let (dataset, kind) = scope
            .dataset
            .ok_or_else(|| InsightError::invalid_query("query does not reference any dataset"))?;
        debug!(%dataset, %kind, columns = options.columns.len(), "query validated");
        Ok(ValidatedQuery {
            query: Query {
                filter,
                transformations,
                options,
            },
            dataset,
            kind,
            projection_keys: scope.projection_keys,
        })
    }

    /// Splits a qualified key and applies the dataset resolution rule.
    /// Returns the field part together with the kind of the query's dataset.
    fn resolve_key<'k>(&self, scope: &mut Scope, key: &'k str) -> Result<(&'k str, DatasetKind)> {
        let (id, field) = split_qualified_key(key).ok_or_else(|| {
            InsightError::invalid_query(format!("'{}' is not of the form <dataset>_<field>", key))
        })?;
        match &scope.dataset {
            Some((resolved, kind)) if resolved == id => Ok((field, *kind)),
            Some((resolved, _)) => invalid(format!(
                "'{}' references dataset '{}' but the query uses '{}'",
                key, id, resolved
            )),
            None => {
                let kind = self.catalog.resolve_kind(id).ok_or_else(|| {
                    InsightError::invalid_query(format!("dataset '{}' is not loaded", id))
                })?;
                debug!(dataset = id, %kind, "dataset resolved");
                scope.dataset = Some((id.to_owned(), kind));
                Ok((field, kind))
            }
        }
    }

    fn resolve_typed_key(&self, scope: &mut Scope, key: &str) -> Result<FieldType> {
        let (field, kind) = self.resolve_key(scope, key)?;
        kind.field_type(field).ok_or_else(|| {
            InsightError::invalid_query(format!("'{}' is not a field of a {} dataset", field, kind))
        })
    }

    // ------------- WHERE -------------
    fn validate_where(&self, scope: &mut Scope, node: &Value) -> Result<Option<Filter>> {
        if as_object(node, WHERE)?.is_empty() {
            return Ok(None);
        }
        self.validate_filter(scope, node).map(Some)
    }

    fn validate_filter(&self, scope: &mut Scope, node: &Value) -> Result<Filter> {
        let (op, body) = single_entry(node, "filter")?;
        match op.as_str() {
            "AND" => Ok(Filter::And(self.validate_children(scope, op, body)?)),
            "OR" => Ok(Filter::Or(self.validate_children(scope, op, body)?)),
            "NOT" => {
                as_object(body, "NOT")?;
                Ok(Filter::Not(Box::new(self.validate_filter(scope, body)?)))
            }
            "GT" => Ok(Filter::Gt(self.validate_comparison(scope, op, body)?)),
            "LT" => Ok(Filter::Lt(self.validate_comparison(scope, op, body)?)),
            "EQ" => Ok(Filter::Eq(self.validate_comparison(scope, op, body)?)),
            "IS" => Ok(Filter::Is(self.validate_matcher(scope, body)?)),
            other => invalid(format!("unknown filter '{}'", other)),
        }
    }

    fn validate_children(&self, scope: &mut Scope, op: &str, body: &Value) -> Result<Vec<Filter>> {
        non_empty_array(body, op)?
            .iter()
            .map(|child| self.validate_filter(scope, child))
            .collect()
    }

    fn validate_comparison(&self, scope: &mut Scope, op: &str, body: &Value) -> Result<Comparison> {
        let (key, literal) = single_entry(body, op)?;
        if self.resolve_typed_key(scope, key)? != FieldType::Measure {
            return invalid(format!("{} needs a measure field, got '{}'", op, key));
        }
        let value = literal
            .as_f64()
            .ok_or_else(|| InsightError::invalid_query(format!("{} value for '{}' must be a number", op, key)))?;
        Ok(Comparison::new(key.as_str(), value))
    }

    fn validate_matcher(&self, scope: &mut Scope, body: &Value) -> Result<Matcher> {
        let (key, literal) = single_entry(body, "IS")?;
        if self.resolve_typed_key(scope, key)? != FieldType::Text {
            return invalid(format!("IS needs a string field, got '{}'", key));
        }
        let raw = literal
            .as_str()
            .ok_or_else(|| InsightError::invalid_query(format!("IS value for '{}' must be a string", key)))?;
        let pattern = Pattern::parse(raw).ok_or_else(|| {
            InsightError::invalid_query(format!("'{}' has a wildcard in the middle", raw))
        })?;
        Ok(Matcher {
            key: key.clone(),
            pattern,
        })
    }

    // ------------- TRANSFORMATIONS -------------
    fn validate_transformations(&self, scope: &mut Scope, node: &Value) -> Result<Transformations> {
        let map = as_object(node, TRANSFORMATIONS)?;
        let (Some(group_node), Some(apply_node), 2) = (map.get(GROUP), map.get(APPLY), map.len()) else {
            return invalid("TRANSFORMATIONS must have exactly GROUP and APPLY");
        };

        let mut group = Vec::new();
        for item in non_empty_array(group_node, GROUP)? {
            let key = string_item(item, GROUP)?;
            self.resolve_typed_key(scope, key)?;
            scope.legal_keys.push(key.to_owned());
            group.push(key.to_owned());
        }

        let rules = apply_node
            .as_array()
            .ok_or_else(|| InsightError::invalid_query("APPLY must be an array"))?;
        let mut apply = Vec::with_capacity(rules.len());
        for rule in rules {
            let rule = self.validate_apply_rule(scope, rule)?;
            scope.legal_keys.push(rule.name.clone());
            apply.push(rule);
        }
        Ok(Transformations { group, apply })
    }

    fn validate_apply_rule(&self, scope: &mut Scope, node: &Value) -> Result<ApplyRule> {
        let (name, body) = single_entry(node, "apply rule")?;
        if name.is_empty() || name.contains('_') {
            return invalid(format!("apply key '{}' must be non-empty without underscores", name));
        }
        if scope.legal_keys.iter().any(|key| key == name) {
            return invalid(format!("apply key '{}' is not unique", name));
        }
        let (token, target) = single_entry(body, name)?;
        let token = ApplyToken::parse(token)
            .ok_or_else(|| InsightError::invalid_query(format!("unknown apply token '{}'", token)))?;
        let key = string_item(target, token.as_str())?;
        let field_type = self.resolve_typed_key(scope, key)?;
        if token.needs_measure() && field_type != FieldType::Measure {
            return invalid(format!("{} needs a measure field, got '{}'", token, key));
        }
        Ok(ApplyRule {
            name: name.clone(),
            token,
            key: key.to_owned(),
        })
    }

    // ------------- OPTIONS -------------
    fn validate_options(&self, scope: &mut Scope, node: &Value, transformed: bool) -> Result<Options> {
        let map = as_object(node, OPTIONS)?;
        if let Some(key) = map.keys().find(|key| !matches!(key.as_str(), COLUMNS | ORDER)) {
            return invalid(format!("unexpected OPTIONS key '{}'", key));
        }
        let columns_node = map
            .get(COLUMNS)
            .ok_or_else(|| InsightError::invalid_query("missing COLUMNS"))?;

        let mut columns = Vec::new();
        for item in non_empty_array(columns_node, COLUMNS)? {
            let key = string_item(item, COLUMNS)?;
            // a repeated column names the same output field, keep the first
            if columns.iter().any(|column| column == key) {
                continue;
            }
            if transformed {
                if !scope.legal_keys.iter().any(|legal| legal == key) {
                    return invalid(format!("column '{}' is neither grouped nor applied", key));
                }
            } else {
                self.resolve_typed_key(scope, key)?;
            }
            scope.projection_keys.push(key.to_owned());
            columns.push(key.to_owned());
        }

        let order = match map.get(ORDER) {
            Some(order) => Some(self.validate_order(scope, order)?),
            None => None,
        };
        Ok(Options { columns, order })
    }

    fn validate_order(&self, scope: &Scope, node: &Value) -> Result<Order> {
        let projected = |key: &str| -> Result<String> {
            if scope.projection_keys.iter().any(|column| column == key) {
                Ok(key.to_owned())
            } else {
                invalid(format!("ORDER key '{}' is not in COLUMNS", key))
            }
        };
        match node {
            Value::String(key) => Ok(Order::Key(projected(key)?)),
            Value::Object(map) => {
                let (Some(dir), Some(keys), 2) = (map.get("dir"), map.get("keys"), map.len()) else {
                    return invalid("ORDER must have exactly dir and keys");
                };
                let direction = dir
                    .as_str()
                    .and_then(Direction::parse)
                    .ok_or_else(|| InsightError::invalid_query("ORDER dir must be UP or DOWN"))?;
                let keys = non_empty_array(keys, "ORDER keys")?
                    .iter()
                    .map(|item| string_item(item, "ORDER keys").and_then(|key| projected(key)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Order::Keys { direction, keys })
            }
            _ => invalid("ORDER must be a key or an object"),
        }
    }
}

/// Validates `query` against `catalog` in one call.
pub fn validate(query: &Value, catalog: &DatasetCatalog) -> Result<ValidatedQuery> {
    QueryValidator::new(catalog).validate(query)
}

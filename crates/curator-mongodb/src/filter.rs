//! Query-filter and update evaluation for the in-memory store
//!
//! Covers the subset of the query language the scripts and index partial
//! filters use: equality, `$eq`/`$ne`, the ordering operators, `$in`,
//! `$nin`, `$exists`, `$type`, and the `$and`/`$or`/`$nor` combinators.
//! Updates support `$set` and `$unset`.

use std::cmp::Ordering;

use bson::{Bson, Document as BsonDocument};
use curator_common::CuratorError;

use crate::Result;

/// True when `doc` satisfies `filter`. An empty filter matches everything.
pub fn matches(doc: &BsonDocument, filter: &BsonDocument) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => clauses(condition).all(|clause| matches(doc, clause)),
        "$or" => clauses(condition).any(|clause| matches(doc, clause)),
        "$nor" => !clauses(condition).any(|clause| matches(doc, clause)),
        path => field_matches(get_path(doc, path), condition),
    })
}

fn clauses(condition: &Bson) -> impl Iterator<Item = &BsonDocument> {
    condition
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Bson::as_document)
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> bool {
    match condition {
        Bson::Document(ops) if is_operator_document(ops) => ops
            .iter()
            .all(|(op, operand)| operator_matches(value, op, operand)),
        literal => value.is_some_and(|v| values_equal(v, literal)),
    }
}

fn is_operator_document(doc: &BsonDocument) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn operator_matches(value: Option<&Bson>, op: &str, operand: &Bson) -> bool {
    match op {
        "$eq" => value.is_some_and(|v| values_equal(v, operand)),
        "$ne" => !value.is_some_and(|v| values_equal(v, operand)),
        "$exists" => value.is_some() == truthy(operand),
        "$type" => value.is_some_and(|v| type_matches(v, operand)),
        "$in" => value.is_some_and(|v| {
            operand
                .as_array()
                .is_some_and(|candidates| candidates.iter().any(|c| values_equal(v, c)))
        }),
        "$nin" => !value.is_some_and(|v| {
            operand
                .as_array()
                .is_some_and(|candidates| candidates.iter().any(|c| values_equal(v, c)))
        }),
        "$gt" => compare(value, operand).is_some_and(|o| o == Ordering::Greater),
        "$gte" => compare(value, operand).is_some_and(|o| o != Ordering::Less),
        "$lt" => compare(value, operand).is_some_and(|o| o == Ordering::Less),
        "$lte" => compare(value, operand).is_some_and(|o| o != Ordering::Greater),
        _ => false,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn type_matches(value: &Bson, operand: &Bson) -> bool {
    let alias = match operand {
        Bson::String(alias) => alias.as_str(),
        Bson::Array(aliases) => {
            return aliases.iter().any(|alias| type_matches(value, alias));
        }
        _ => return false,
    };
    match alias {
        "number" => as_f64(value).is_some(),
        "string" => matches!(value, Bson::String(_)),
        "object" => matches!(value, Bson::Document(_)),
        "array" => matches!(value, Bson::Array(_)),
        "bool" => matches!(value, Bson::Boolean(_)),
        "date" => matches!(value, Bson::DateTime(_)),
        "null" => matches!(value, Bson::Null),
        "objectId" => matches!(value, Bson::ObjectId(_)),
        "int" => matches!(value, Bson::Int32(_)),
        "long" => matches!(value, Bson::Int64(_)),
        "double" => matches!(value, Bson::Double(_)),
        _ => false,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Equality with numeric types unified
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering between values of the same type bracket; `None` across brackets
fn compare(value: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
    let value = value?;
    if let (Some(x), Some(y)) = (as_f64(value), as_f64(operand)) {
        return x.partial_cmp(&y);
    }
    match (value, operand) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        _ => None,
    }
}

/// Resolve a dotted path such as `rating.voteCount`
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }
    Some(current)
}

fn set_path(doc: &mut BsonDocument, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, BsonDocument::new());
            }
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

fn unset_path(doc: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

/// Apply an operator update in place. Returns whether the document changed.
///
/// Replacement-style updates are rejected the same way the driver rejects
/// them for update-many.
pub fn apply_update(doc: &mut BsonDocument, update: &BsonDocument) -> Result<bool> {
    if update.is_empty() || !update.keys().all(|k| k.starts_with('$')) {
        return Err(CuratorError::Validation(
            "update document must contain only atomic operators".to_string(),
        ));
    }

    let before = doc.clone();
    for (op, fields) in update {
        let fields = fields.as_document().ok_or_else(|| {
            CuratorError::Validation(format!("operand of {} must be a document", op))
        })?;
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if path == "_id" {
                        return Err(CuratorError::MongoDB(
                            "Performing an update on the path '_id' would modify \
                             the immutable field '_id'"
                                .to_string(),
                        ));
                    }
                    set_path(doc, path, value.clone());
                }
            }
            "$unset" => {
                for path in fields.keys() {
                    unset_path(doc, path);
                }
            }
            other => {
                return Err(CuratorError::Validation(format!(
                    "unsupported update operator: {}",
                    other
                )));
            }
        }
    }

    Ok(*doc != before)
}

//! Per-function usage records

use crate::ast::DeclId;
use crate::traverse::PathId;
use serde::Serialize;

use super::ScopeId;

/// How one write site changes a state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteKind {
    /// Only adds to the prior value (`x += e`, `x = x + e`, `x++`).
    Increment,
    /// Only subtracts from the prior value (`x -= e`, `x = x - e`, `x--`).
    Decrement,
    /// Anything else: the new value depends on more than a delta.
    Overwrite,
}

/// How one entry of a secret mapping is used inside one function.
///
/// Entries are committed separately, so whether an entry is read or spent is
/// decided per key: `balances[to] += x` never spends the recipient's
/// commitment, even when `balances[msg.sender]` is spent in the same function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyIndicator {
    /// The key as written at the access, `msg.sender` for the sender.
    pub key: String,
    #[serde(skip)]
    pub referencing_paths: Vec<PathId>,
    #[serde(skip)]
    pub writes: Vec<(PathId, WriteKind)>,
    pub is_modified: bool,
    pub is_incremented: bool,
    pub is_decremented: bool,
    pub is_accessed: bool,
    pub is_nullified: bool,
}

impl KeyIndicator {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            referencing_paths: Vec::new(),
            writes: Vec::new(),
            is_modified: false,
            is_incremented: false,
            is_decremented: false,
            is_accessed: false,
            is_nullified: false,
        }
    }

    pub fn record_write(&mut self, path: PathId, kind: WriteKind) {
        if self.writes.iter().any(|(p, _)| *p == path) {
            return;
        }
        self.writes.push((path, kind));
        self.is_modified = true;
        (self.is_incremented, self.is_decremented) = partial_flags(&self.writes);
    }

    /// Spent when the whole entry is replaced, or when a partitioned entry
    /// is decremented.
    pub fn resolve_nullified(&mut self, whole: bool) {
        self.is_nullified = if whole { self.is_modified } else { self.is_decremented };
    }

    pub fn references(&self, path: PathId) -> bool {
        self.referencing_paths.contains(&path) || self.writes.iter().any(|(p, _)| *p == path)
    }
}

/// `(is_incremented, is_decremented)` for a set of writes. Any overwrite
/// makes the writes general.
fn partial_flags(writes: &[(PathId, WriteKind)]) -> (bool, bool) {
    if writes.iter().any(|(_, k)| *k == WriteKind::Overwrite) {
        return (false, false);
    }
    (
        writes.iter().any(|(_, k)| *k == WriteKind::Increment),
        writes.iter().any(|(_, k)| *k == WriteKind::Decrement),
    )
}

/// How one state variable is used inside one function.
///
/// Kept on the variable's [`super::Binding`], keyed by the function's scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateVarIndicator {
    pub id: DeclId,
    pub name: String,
    #[serde(skip)]
    pub function_scope: ScopeId,
    pub is_secret: bool,
    pub is_mapping: bool,
    /// An identifier in this function carried the `known` decorator.
    pub is_known: bool,
    /// An identifier in this function carried the `unknown` decorator.
    pub is_unknown: bool,
    #[serde(skip)]
    pub referencing_paths: Vec<PathId>,
    #[serde(skip)]
    pub modifying_paths: Vec<PathId>,
    pub is_referenced: bool,
    pub is_modified: bool,
    #[serde(skip)]
    pub writes: Vec<(PathId, WriteKind)>,
    pub is_incremented: bool,
    pub is_decremented: bool,
    pub is_accessed: bool,
    pub is_nullified: bool,
    pub is_whole: bool,
    pub is_partitioned: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub whole_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mapping_keys: Vec<KeyIndicator>,
    pub encryption_required: bool,
}

impl StateVarIndicator {
    pub fn new(id: DeclId, name: &str, function_scope: ScopeId, is_secret: bool, is_mapping: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            function_scope,
            is_secret,
            is_mapping,
            is_known: false,
            is_unknown: false,
            referencing_paths: Vec::new(),
            modifying_paths: Vec::new(),
            is_referenced: false,
            is_modified: false,
            writes: Vec::new(),
            is_incremented: false,
            is_decremented: false,
            is_accessed: false,
            is_nullified: false,
            is_whole: false,
            is_partitioned: false,
            whole_reasons: Vec::new(),
            mapping_keys: Vec::new(),
            encryption_required: false,
        }
    }

    pub fn add_reference(&mut self, path: PathId, modifying: bool) {
        self.referencing_paths.push(path);
        self.is_referenced = true;
        if modifying {
            self.modifying_paths.push(path);
            self.is_modified = true;
        }
    }

    /// Records a reference through `mapping[key]`, in first-reference order.
    pub fn add_mapping_key(&mut self, key: &str, path: PathId, modifying: bool) {
        let entry = match self.mapping_keys.iter().position(|k| k.key == key) {
            Some(index) => &mut self.mapping_keys[index],
            None => {
                self.mapping_keys.push(KeyIndicator::new(key));
                let last = self.mapping_keys.len() - 1;
                &mut self.mapping_keys[last]
            }
        };
        entry.referencing_paths.push(path);
        entry.is_modified |= modifying;
    }

    pub fn mapping_key(&self, key: &str) -> Option<&KeyIndicator> {
        self.mapping_keys.iter().find(|k| k.key == key)
    }

    pub fn mapping_key_mut(&mut self, key: &str) -> Option<&mut KeyIndicator> {
        self.mapping_keys.iter_mut().find(|k| k.key == key)
    }

    /// The entry a referencing or writing path goes through.
    pub fn mapping_key_at(&self, path: PathId) -> Option<&KeyIndicator> {
        self.mapping_keys.iter().find(|k| k.references(path))
    }

    /// Records how the write at `path` changes the variable. A site already
    /// recorded keeps its first classification.
    pub fn record_write(&mut self, path: PathId, kind: WriteKind) {
        if self.writes.iter().any(|(p, _)| *p == path) {
            return;
        }
        self.writes.push((path, kind));
        (self.is_incremented, self.is_decremented) = partial_flags(&self.writes);
    }

    pub fn write_kind(&self, path: PathId) -> Option<WriteKind> {
        self.writes.iter().find(|(p, _)| *p == path).map(|(_, k)| *k)
    }

    pub fn has_overwrite(&self) -> bool {
        self.writes.iter().any(|(_, k)| *k == WriteKind::Overwrite)
    }

    /// Whether this function needs the exact prior value, which rules out a
    /// partitioned representation.
    pub fn requires_whole(&self) -> bool {
        self.has_overwrite() || self.is_accessed || self.is_known
    }

    /// Human-readable reasons behind [`StateVarIndicator::requires_whole`].
    pub fn whole_requirements(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.has_overwrite() {
            reasons.push("overwritten".to_string());
        }
        if self.is_accessed {
            reasons.push("accessed".to_string());
        }
        if self.is_known {
            reasons.push("decorated known".to_string());
        }
        reasons
    }
}

/// Summary of one function's interaction with state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionIndicator {
    pub name: String,
    pub interacts_with_secret: bool,
    pub interacts_with_public: bool,
    /// State variables referenced in the function, in first-reference order.
    pub state_variables: Vec<DeclId>,
}

impl FunctionIndicator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interacts_with_secret: false,
            interacts_with_public: false,
            state_variables: Vec::new(),
        }
    }

    pub fn record_state_variable(&mut self, id: DeclId, is_secret: bool) {
        if is_secret {
            self.interacts_with_secret = true;
        } else {
            self.interacts_with_public = true;
        }
        if !self.state_variables.contains(&id) {
            self.state_variables.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_then_overwrite_is_general() {
        let mut indicator = StateVarIndicator::new(1, "a", ScopeId(2), true, false);
        indicator.record_write(PathId(10), WriteKind::Increment);
        assert!(indicator.is_incremented);
        assert!(!indicator.requires_whole());

        indicator.record_write(PathId(11), WriteKind::Overwrite);
        assert!(!indicator.is_incremented);
        assert!(indicator.requires_whole());
        assert_eq!(indicator.whole_requirements(), vec!["overwritten"]);
    }

    #[test]
    fn test_write_site_classified_once() {
        let mut indicator = StateVarIndicator::new(1, "a", ScopeId(2), true, false);
        indicator.record_write(PathId(10), WriteKind::Decrement);
        indicator.record_write(PathId(10), WriteKind::Overwrite);
        assert_eq!(indicator.write_kind(PathId(10)), Some(WriteKind::Decrement));
        assert!(indicator.is_decremented);
    }

    #[test]
    fn test_mapping_keys_are_tracked_separately() {
        let mut indicator = StateVarIndicator::new(1, "balances", ScopeId(2), true, true);
        indicator.add_mapping_key("msg.sender", PathId(20), true);
        indicator.add_mapping_key("to", PathId(30), true);
        indicator.add_mapping_key("msg.sender", PathId(21), false);
        indicator.mapping_key_mut("msg.sender").unwrap().record_write(PathId(40), WriteKind::Decrement);
        indicator.mapping_key_mut("to").unwrap().record_write(PathId(41), WriteKind::Increment);

        let keys: Vec<&str> = indicator.mapping_keys.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(keys, vec!["msg.sender", "to"]);
        assert_eq!(indicator.mapping_key_at(PathId(21)).map(|k| k.key.as_str()), Some("msg.sender"));
        assert_eq!(indicator.mapping_key_at(PathId(41)).map(|k| k.key.as_str()), Some("to"));

        for key in indicator.mapping_keys.iter_mut() {
            key.resolve_nullified(false);
        }
        assert!(indicator.mapping_key("msg.sender").unwrap().is_nullified);
        assert!(!indicator.mapping_key("to").unwrap().is_nullified);

        for key in indicator.mapping_keys.iter_mut() {
            key.resolve_nullified(true);
        }
        assert!(indicator.mapping_key("to").unwrap().is_nullified);
    }

    #[test]
    fn test_function_indicator_tracks_secrecy() {
        let mut function = FunctionIndicator::new("deposit");
        function.record_state_variable(4, false);
        function.record_state_variable(3, true);
        function.record_state_variable(4, false);
        assert!(function.interacts_with_secret);
        assert!(function.interacts_with_public);
        assert_eq!(function.state_variables, vec![4, 3]);
    }
}

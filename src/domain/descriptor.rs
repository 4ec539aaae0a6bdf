//! Pattern descriptors: the closed set of check shapes and their validator.
//!
//! A descriptor file is JSON of the form
//!
//! ```json
//! { "name": "Ownership",
//!   "checks": [ { "check_type": "inheritance", "parent_names": ["Ownable"] } ] }
//! ```
//!
//! Validation is hand-written and keyed on `check_type`, so every violation can
//! name the exact field it concerns.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::ast::BinaryOperator;
use super::errors::{DescriptorInvalid, Violation};

/// Every check kind, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Comparison,
    Inheritance,
    Modifier,
    Rejector,
    TightVariablePacking,
    FnReturnParameters,
    MemoryArrayBuilding,
    FnCall,
    FnDefinition,
    VarDefinition,
    EventEmit,
    EnumDefinition,
    CheckEffectsInteraction,
    StateToggle,
    Relay,
    EternalStorage,
}

impl CheckKind {
    pub const ALL: [CheckKind; 16] = [
        CheckKind::Comparison,
        CheckKind::Inheritance,
        CheckKind::Modifier,
        CheckKind::Rejector,
        CheckKind::TightVariablePacking,
        CheckKind::FnReturnParameters,
        CheckKind::MemoryArrayBuilding,
        CheckKind::FnCall,
        CheckKind::FnDefinition,
        CheckKind::VarDefinition,
        CheckKind::EventEmit,
        CheckKind::EnumDefinition,
        CheckKind::CheckEffectsInteraction,
        CheckKind::StateToggle,
        CheckKind::Relay,
        CheckKind::EternalStorage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Comparison => "comparison",
            CheckKind::Inheritance => "inheritance",
            CheckKind::Modifier => "modifier",
            CheckKind::Rejector => "rejector",
            CheckKind::TightVariablePacking => "tight_variable_packing",
            CheckKind::FnReturnParameters => "fn_return_parameters",
            CheckKind::MemoryArrayBuilding => "memory_array_building",
            CheckKind::FnCall => "fn_call",
            CheckKind::FnDefinition => "fn_definition",
            CheckKind::VarDefinition => "var_definition",
            CheckKind::EventEmit => "event_emit",
            CheckKind::EnumDefinition => "enum_definition",
            CheckKind::CheckEffectsInteraction => "check_effects_interaction",
            CheckKind::StateToggle => "state_toggle",
            CheckKind::Relay => "relay",
            CheckKind::EternalStorage => "eternal_storage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// The array field a parameterised kind requires; `None` for the
    /// parameterless kinds.
    pub fn required_field(&self) -> Option<&'static str> {
        match self {
            CheckKind::Comparison => Some("binary_operations"),
            CheckKind::Inheritance => Some("parent_names"),
            CheckKind::Modifier => Some("modifiers"),
            CheckKind::FnReturnParameters => Some("parameters_list"),
            CheckKind::FnCall => Some("callable_function"),
            CheckKind::FnDefinition => Some("fn_names"),
            CheckKind::VarDefinition => Some("var_names"),
            CheckKind::EventEmit => Some("event_names"),
            CheckKind::EnumDefinition => Some("enum_names"),
            CheckKind::StateToggle => Some("state_names"),
            CheckKind::Rejector
            | CheckKind::TightVariablePacking
            | CheckKind::MemoryArrayBuilding
            | CheckKind::CheckEffectsInteraction
            | CheckKind::Relay
            | CheckKind::EternalStorage => None,
        }
    }

    pub fn is_parameterless(&self) -> bool {
        self.required_field().is_none()
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn serialize_operator<S: Serializer>(op: &BinaryOperator, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(op.as_str())
}

/// One `{operator, operand_1, operand_2}` triple of a `comparison` check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryOperationSpec {
    #[serde(serialize_with = "serialize_operator")]
    pub operator: BinaryOperator,
    pub operand_1: String,
    pub operand_2: String,
}

impl fmt::Display for BinaryOperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.operand_1, self.operator.as_str(), self.operand_2)
    }
}

/// One `{storage_location, type}` entry of a `fn_return_parameters` check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnParameterSpec {
    pub storage_location: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl fmt::Display for ReturnParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.storage_location.is_empty() {
            f.write_str(&self.type_name)
        } else {
            write!(f, "{} {}", self.type_name, self.storage_location)
        }
    }
}

/// A validated check. Each variant carries exactly the fields of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check_type", rename_all = "snake_case")]
pub enum Check {
    Comparison { binary_operations: Vec<BinaryOperationSpec> },
    Inheritance { parent_names: Vec<String> },
    Modifier { modifiers: Vec<String> },
    Rejector,
    TightVariablePacking,
    FnReturnParameters { parameters_list: Vec<ReturnParameterSpec> },
    MemoryArrayBuilding,
    FnCall { callable_function: Vec<String> },
    FnDefinition { fn_names: Vec<String> },
    VarDefinition { var_names: Vec<String> },
    EventEmit { event_names: Vec<String> },
    EnumDefinition { enum_names: Vec<String> },
    CheckEffectsInteraction,
    StateToggle { state_names: Vec<String> },
    Relay,
    EternalStorage,
}

impl Check {
    pub fn kind(&self) -> CheckKind {
        match self {
            Check::Comparison { .. } => CheckKind::Comparison,
            Check::Inheritance { .. } => CheckKind::Inheritance,
            Check::Modifier { .. } => CheckKind::Modifier,
            Check::Rejector => CheckKind::Rejector,
            Check::TightVariablePacking => CheckKind::TightVariablePacking,
            Check::FnReturnParameters { .. } => CheckKind::FnReturnParameters,
            Check::MemoryArrayBuilding => CheckKind::MemoryArrayBuilding,
            Check::FnCall { .. } => CheckKind::FnCall,
            Check::FnDefinition { .. } => CheckKind::FnDefinition,
            Check::VarDefinition { .. } => CheckKind::VarDefinition,
            Check::EventEmit { .. } => CheckKind::EventEmit,
            Check::EnumDefinition { .. } => CheckKind::EnumDefinition,
            Check::CheckEffectsInteraction => CheckKind::CheckEffectsInteraction,
            Check::StateToggle { .. } => CheckKind::StateToggle,
            Check::Relay => CheckKind::Relay,
            Check::EternalStorage => CheckKind::EternalStorage,
        }
    }

    /// Number of listed parameters; zero for the parameterless kinds.
    pub fn parameter_count(&self) -> usize {
        match self {
            Check::Comparison { binary_operations } => binary_operations.len(),
            Check::FnReturnParameters { parameters_list } => parameters_list.len(),
            Check::Inheritance { parent_names: names }
            | Check::Modifier { modifiers: names }
            | Check::FnCall { callable_function: names }
            | Check::FnDefinition { fn_names: names }
            | Check::VarDefinition { var_names: names }
            | Check::EventEmit { event_names: names }
            | Check::EnumDefinition { enum_names: names }
            | Check::StateToggle { state_names: names } => names.len(),
            Check::Rejector
            | Check::TightVariablePacking
            | Check::MemoryArrayBuilding
            | Check::CheckEffectsInteraction
            | Check::Relay
            | Check::EternalStorage => 0,
        }
    }

    /// Parameterless check of the given kind, `None` for parameterised kinds.
    pub fn parameterless(kind: CheckKind) -> Option<Self> {
        let check = match kind {
            CheckKind::Rejector => Check::Rejector,
            CheckKind::TightVariablePacking => Check::TightVariablePacking,
            CheckKind::MemoryArrayBuilding => Check::MemoryArrayBuilding,
            CheckKind::CheckEffectsInteraction => Check::CheckEffectsInteraction,
            CheckKind::Relay => Check::Relay,
            CheckKind::EternalStorage => Check::EternalStorage,
            _ => return None,
        };
        Some(check)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub checks: Vec<Check>,
}

impl Descriptor {
    /// Validates a parsed JSON document.
    pub fn from_value(value: &Value) -> Result<Self, Violation> {
        let object = as_object(value, "$")?;
        for key in object.keys() {
            if !matches!(key.as_str(), "name" | "description" | "checks" | "$schema") {
                return Err(Violation::UnknownField { at: "$".to_string(), field: key.clone() });
            }
        }

        let name = required_string(object, "$", "name")?;
        let description = match object.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(_) => {
                return Err(Violation::WrongType {
                    at: "$.description".to_string(),
                    expected: "a string",
                })
            }
        };

        let items = required_array(object, "$", "checks")?;
        let mut checks = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            checks.push(check_from_value(item, &format!("checks[{index}]"))?);
        }

        Ok(Self { name, description, checks })
    }

    pub fn from_json(text: &str) -> Result<Self, Violation> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Violation::MalformedJson(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn check_from_value(value: &Value, at: &str) -> Result<Check, Violation> {
    let object = as_object(value, at)?;
    let tag = match object.get("check_type") {
        None => return Err(Violation::MissingField { at: at.to_string(), field: "check_type" }),
        Some(Value::String(tag)) => tag,
        Some(_) => {
            return Err(Violation::WrongType {
                at: format!("{at}.check_type"),
                expected: "a string",
            })
        }
    };
    let kind = CheckKind::from_name(tag).ok_or_else(|| Violation::UnknownCheckType {
        at: at.to_string(),
        found: tag.clone(),
    })?;

    let allowed = kind.required_field();
    for key in object.keys() {
        if key != "check_type" && Some(key.as_str()) != allowed {
            return Err(Violation::UnknownField { at: at.to_string(), field: key.clone() });
        }
    }

    let names = |field: &'static str| string_list(object, at, field);
    let check = match kind {
        CheckKind::Comparison => Check::Comparison {
            binary_operations: required_array(object, at, "binary_operations")?
                .iter()
                .enumerate()
                .map(|(i, item)| binary_operation(item, &format!("{at}.binary_operations[{i}]")))
                .collect::<Result<_, _>>()?,
        },
        CheckKind::FnReturnParameters => Check::FnReturnParameters {
            parameters_list: required_array(object, at, "parameters_list")?
                .iter()
                .enumerate()
                .map(|(i, item)| return_parameter(item, &format!("{at}.parameters_list[{i}]")))
                .collect::<Result<_, _>>()?,
        },
        CheckKind::Inheritance => Check::Inheritance { parent_names: names("parent_names")? },
        CheckKind::Modifier => Check::Modifier { modifiers: names("modifiers")? },
        CheckKind::FnCall => Check::FnCall { callable_function: names("callable_function")? },
        CheckKind::FnDefinition => Check::FnDefinition { fn_names: names("fn_names")? },
        CheckKind::VarDefinition => Check::VarDefinition { var_names: names("var_names")? },
        CheckKind::EventEmit => Check::EventEmit { event_names: names("event_names")? },
        CheckKind::EnumDefinition => Check::EnumDefinition { enum_names: names("enum_names")? },
        CheckKind::StateToggle => Check::StateToggle { state_names: names("state_names")? },
        CheckKind::Rejector => Check::Rejector,
        CheckKind::TightVariablePacking => Check::TightVariablePacking,
        CheckKind::MemoryArrayBuilding => Check::MemoryArrayBuilding,
        CheckKind::CheckEffectsInteraction => Check::CheckEffectsInteraction,
        CheckKind::Relay => Check::Relay,
        CheckKind::EternalStorage => Check::EternalStorage,
    };
    Ok(check)
}

fn binary_operation(value: &Value, at: &str) -> Result<BinaryOperationSpec, Violation> {
    let object = as_object(value, at)?;
    reject_unknown(object, at, &["operator", "operand_1", "operand_2"])?;
    let symbol = required_string(object, at, "operator")?;
    let operator = BinaryOperator::from_symbol(&symbol)
        .filter(BinaryOperator::is_comparison)
        .ok_or_else(|| Violation::InvalidOperator { at: format!("{at}.operator"), found: symbol })?;
    Ok(BinaryOperationSpec {
        operator,
        operand_1: required_string(object, at, "operand_1")?,
        operand_2: required_string(object, at, "operand_2")?,
    })
}

fn return_parameter(value: &Value, at: &str) -> Result<ReturnParameterSpec, Violation> {
    let object = as_object(value, at)?;
    reject_unknown(object, at, &["storage_location", "type"])?;
    let storage_location = match object.get("storage_location") {
        None => {
            return Err(Violation::MissingField { at: at.to_string(), field: "storage_location" })
        }
        Some(Value::String(text)) => text.trim().to_string(),
        Some(_) => {
            return Err(Violation::WrongType {
                at: format!("{at}.storage_location"),
                expected: "a string",
            })
        }
    };
    Ok(ReturnParameterSpec { storage_location, type_name: required_string(object, at, "type")? })
}

fn as_object<'a>(value: &'a Value, at: &str) -> Result<&'a Map<String, Value>, Violation> {
    value
        .as_object()
        .ok_or_else(|| Violation::WrongType { at: at.to_string(), expected: "an object" })
}

fn reject_unknown(
    object: &Map<String, Value>,
    at: &str,
    allowed: &[&str],
) -> Result<(), Violation> {
    match object.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(field) => Err(Violation::UnknownField { at: at.to_string(), field: field.clone() }),
        None => Ok(()),
    }
}

/// A present, non-empty string field.
fn required_string(
    object: &Map<String, Value>,
    at: &str,
    field: &'static str,
) -> Result<String, Violation> {
    match object.get(field) {
        None => Err(Violation::MissingField { at: at.to_string(), field }),
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(Violation::EmptyString { at: format!("{at}.{field}") })
        }
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(Violation::WrongType { at: format!("{at}.{field}"), expected: "a string" }),
    }
}

/// A present array with at least one item and no repeated items.
fn required_array<'a>(
    object: &'a Map<String, Value>,
    at: &str,
    field: &'static str,
) -> Result<&'a Vec<Value>, Violation> {
    let path = format!("{at}.{field}");
    let items = match object.get(field) {
        None => return Err(Violation::MissingField { at: at.to_string(), field }),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(Violation::WrongType { at: path, expected: "an array" }),
    };
    if items.is_empty() {
        return Err(Violation::TooFewItems { at: path });
    }
    for (index, item) in items.iter().enumerate() {
        if items[..index].contains(item) {
            return Err(Violation::DuplicateItem { at: path, index });
        }
    }
    Ok(items)
}

fn string_list(
    object: &Map<String, Value>,
    at: &str,
    field: &'static str,
) -> Result<Vec<String>, Violation> {
    required_array(object, at, field)?
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(text) if text.trim().is_empty() => {
                Err(Violation::EmptyString { at: format!("{at}.{field}[{index}]") })
            }
            Value::String(text) => Ok(text.clone()),
            _ => Err(Violation::WrongType {
                at: format!("{at}.{field}[{index}]"),
                expected: "a string",
            }),
        })
        .collect()
}

/// The loaded descriptor library, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSet {
    descriptors: Vec<Descriptor>,
}

impl DescriptorSet {
    /// Builds the set from `(origin, descriptor)` pairs. The result does not
    /// depend on the order of `loaded`; a repeated name is an error naming
    /// both files.
    pub fn from_loaded(mut loaded: Vec<(PathBuf, Descriptor)>) -> Result<Self, DescriptorInvalid> {
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        let mut by_name: BTreeMap<String, (PathBuf, Descriptor)> = BTreeMap::new();
        for (path, descriptor) in loaded {
            if let Some((first, _)) = by_name.get(&descriptor.name) {
                return Err(DescriptorInvalid::new(
                    path,
                    Violation::DuplicateName {
                        name: descriptor.name.clone(),
                        first: first.clone(),
                    },
                ));
            }
            by_name.insert(descriptor.name.clone(), (path, descriptor));
        }
        Ok(Self { descriptors: by_name.into_values().map(|(_, d)| d).collect() })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl<'a> IntoIterator for &'a DescriptorSet {
    type Item = &'a Descriptor;
    type IntoIter = std::slice::Iter<'a, Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn violation(value: Value) -> Violation {
        Descriptor::from_value(&value).unwrap_err()
    }

    #[test]
    fn test_valid_descriptor_keeps_check_order() {
        let descriptor = Descriptor::from_value(&json!({
            "name": "Ownership",
            "checks": [
                {"check_type": "inheritance", "parent_names": ["Ownable"]},
                {"check_type": "rejector"},
                {"check_type": "comparison", "binary_operations": [
                    {"operator": "==", "operand_1": "msg.sender", "operand_2": "owner"}
                ]}
            ]
        }))
        .unwrap();

        let kinds: Vec<CheckKind> = descriptor.checks.iter().map(Check::kind).collect();
        assert_eq!(kinds, vec![CheckKind::Inheritance, CheckKind::Rejector, CheckKind::Comparison]);
    }

    #[test]
    fn test_missing_required_field_is_reported_at_check() {
        let err = violation(json!({"name": "X", "checks": [{"check_type": "modifier"}]}));
        let expected = Violation::MissingField { at: "checks[0]".to_string(), field: "modifiers" };
        assert_eq!(err, expected);
    }

    #[test]
    fn test_unknown_check_type_is_rejected() {
        let err = violation(json!({"name": "X", "checks": [{"check_type": "telepathy"}]}));
        assert!(matches!(err, Violation::UnknownCheckType { found, .. } if found == "telepathy"));
    }

    #[test]
    fn test_empty_and_repeated_lists_are_rejected() {
        let empty = violation(json!({"name": "X", "checks": [
            {"check_type": "fn_call", "callable_function": []}
        ]}));
        assert!(matches!(empty, Violation::TooFewItems { .. }));

        let repeated = violation(json!({"name": "X", "checks": [
            {"check_type": "fn_definition", "fn_names": ["a", "a"]}
        ]}));
        assert!(matches!(repeated, Violation::DuplicateItem { index: 1, .. }));

        let no_checks = violation(json!({"name": "X", "checks": []}));
        assert!(matches!(no_checks, Violation::TooFewItems { .. }));
    }

    #[test]
    fn test_duplicate_checks_are_rejected() {
        let err = violation(json!({"name": "X", "checks": [
            {"check_type": "relay"},
            {"check_type": "relay"}
        ]}));
        assert!(matches!(err, Violation::DuplicateItem { index: 1, .. }));
    }

    #[test]
    fn test_foreign_field_on_parameterless_check_is_rejected() {
        let err = violation(json!({"name": "X", "checks": [
            {"check_type": "relay", "fn_names": ["a"]}
        ]}));
        assert!(matches!(err, Violation::UnknownField { field, .. } if field == "fn_names"));
    }

    #[test]
    fn test_arithmetic_operator_is_not_a_comparison() {
        let err = violation(json!({"name": "X", "checks": [{
            "check_type": "comparison",
            "binary_operations": [{"operator": "+", "operand_1": "a", "operand_2": "b"}]
        }]}));
        assert!(matches!(err, Violation::InvalidOperator { found, .. } if found == "+"));
    }

    #[test]
    fn test_serialized_descriptor_validates_again() {
        let descriptor = Descriptor {
            name: "Generated".to_string(),
            description: None,
            checks: vec![
                Check::FnReturnParameters {
                    parameters_list: vec![ReturnParameterSpec {
                        storage_location: "memory".to_string(),
                        type_name: "uint256[]".to_string(),
                    }],
                },
                Check::TightVariablePacking,
            ],
        };
        let text = descriptor.to_json_pretty().unwrap();
        assert!(text.contains("\"check_type\": \"tight_variable_packing\""));
        assert_eq!(Descriptor::from_json(&text).unwrap(), descriptor);
    }

    #[test]
    fn test_set_rejects_duplicate_names_regardless_of_order() {
        let make = |name: &str| Descriptor {
            name: name.to_string(),
            description: None,
            checks: vec![Check::Relay],
        };
        let entry = |path: &str| (PathBuf::from(path), make("P"));
        let forward = vec![entry("a.json"), entry("b.json")];
        let backward = vec![entry("b.json"), entry("a.json")];
        assert_eq!(
            DescriptorSet::from_loaded(forward).unwrap_err(),
            DescriptorSet::from_loaded(backward).unwrap_err()
        );
    }

    #[test]
    fn test_set_is_ordered_by_name() {
        let make = |name: &str| Descriptor {
            name: name.to_string(),
            description: None,
            checks: vec![Check::Relay],
        };
        let set = DescriptorSet::from_loaded(vec![
            (PathBuf::from("z.json"), make("Alpha")),
            (PathBuf::from("a.json"), make("Beta")),
        ])
        .unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Alpha", "Beta"]);
    }
}

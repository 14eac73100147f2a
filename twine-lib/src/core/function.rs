use itertools::Itertools;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;

/// Index of a script function in the [`FunctionTable`] it was registered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

/// A function defined by the script itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFunction {
    pub name: String,
    pub parameters: Vec<String>,
    /// address of the first instruction of the body
    pub start: usize,
    /// address of the last instruction of the body, which is always a return
    pub end: usize,
}

impl ScriptFunction {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

impl fmt::Display for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.iter().join(", "))
    }
}

/// Every function the script defines, in definition order. Registration happens while
/// parsing, the addresses are filled in by the code generator.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: Vec<ScriptFunction>,
}

impl FunctionTable {
    pub fn register(&mut self, name: &str, parameters: Vec<String>) -> FunctionId {
        self.functions.push(ScriptFunction {
            name: name.to_string(),
            parameters,
            start: 0,
            end: 0,
        });
        FunctionId(self.functions.len() - 1)
    }

    pub fn find(&self, name: &str, argc: usize) -> Option<&ScriptFunction> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.arity() == argc)
    }

    pub fn get_mut(&mut self, id: FunctionId) -> Option<&mut ScriptFunction> {
        self.functions.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// groups the functions by name, overloads sorted by arity
    pub fn into_table(self) -> BTreeMap<String, Vec<ScriptFunction>> {
        let mut table: BTreeMap<String, Vec<ScriptFunction>> = BTreeMap::new();
        for function in self.functions {
            table.entry(function.name.clone()).or_default().push(function);
        }
        for overloads in table.values_mut() {
            overloads.sort_by_key(ScriptFunction::arity);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloads_sorted_by_arity() {
        let mut table = FunctionTable::default();
        table.register("f", vec!["a".into(), "b".into()]);
        table.register("g", vec![]);
        table.register("f", vec![]);
        assert_eq!(table.find("f", 0).map(|f| f.arity()), Some(0));
        assert!(table.find("f", 1).is_none());
        let table = table.into_table();
        let arities: Vec<_> = table["f"].iter().map(ScriptFunction::arity).collect();
        assert_eq!(arities, vec![0, 2]);
        assert_eq!(table["f"][1].to_string(), "f(a, b)");
    }
}

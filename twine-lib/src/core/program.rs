use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::BTreeMap;
use std::fmt;

use crate::core::*;
use crate::utils;

/// A compiled script, ready to be handed to the VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// version of the crate that compiled this program
    pub version: [u16; 3],
    pub instructions: Vec<Instruction>,
    /// has one entry for each instruction
    pub locations: Vec<CodeLocation>,
    /// the names that `CodeLocation::source` indexes into
    pub code_sources: Vec<String>,
    /// script functions by name, the overloads sorted by arity
    pub functions: BTreeMap<String, Vec<ScriptFunction>>,
    pub labels: BTreeMap<String, usize>,
}

#[derive(Error, Debug)]
pub enum ProgramLoadError {
    #[error("Could not decode program: {0}")]
    Decode(#[from] postcard::Error),
    #[error("Program was compiled by version {found:?}, but this is version {expected:?}")]
    VersionMismatch {
        found: [u16; 3],
        expected: [u16; 3],
    },
}

impl Program {
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramLoadError> {
        let program: Program = postcard::from_bytes(bytes)?;
        let expected = utils::get_version();
        if program.version != expected {
            return Err(ProgramLoadError::VersionMismatch {
                found: program.version,
                expected,
            });
        }
        Ok(program)
    }

    /// looks up the overload of a script function with the given number of arguments
    pub fn function(&self, name: &str, argc: usize) -> Option<&ScriptFunction> {
        self.functions
            .get(name)?
            .iter()
            .find(|f| f.arity() == argc)
    }

    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// the script position the instruction at `address` was compiled from
    pub fn location_of(&self, address: usize) -> Option<Location> {
        let code_location = self.locations.get(address)?;
        let source = self
            .code_sources
            .get(code_location.source)
            .filter(|name| name.as_str() != UNNAMED_SOURCE)
            .map(|name| name.as_str().into());
        Some(Location::new(
            source,
            code_location.line,
            code_location.column,
        ))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (address, (instruction, location)) in
            self.instructions.iter().zip(&self.locations).enumerate()
        {
            writeln!(f, "{:04}  {:<40} ; {}", address, instruction.to_string(), location)?;
        }
        if !self.functions.is_empty() {
            writeln!(f, "\nfunctions:")?;
            for function in self.functions.values().flatten() {
                writeln!(f, "  {:<30} {:04}..={:04}", function.to_string(), function.start, function.end)?;
            }
        }
        if !self.labels.is_empty() {
            writeln!(f, "\nlabels:")?;
            for (name, address) in &self.labels {
                writeln!(f, "  {:<30} {:04}", name, address)?;
            }
        }
        Ok(())
    }
}

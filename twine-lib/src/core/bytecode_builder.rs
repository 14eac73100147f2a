use im::Vector;

use crate::core::*;

/// The instructions of a program that is still being generated, with a location per instruction
///
/// Instructions are appended in program order. Jump targets that aren't known yet are
/// written as placeholders and patched by index once the target is emitted.
#[derive(Debug, Clone, Default)]
pub struct ByteCodeBuilder {
    /// the instructions in program order, jumps may still have placeholder targets
    pub text: Vector<Instruction>,
    /// where in the script the corresponding instruction was generated from
    pub locations: Vector<CodeLocation>,
}

impl ByteCodeBuilder {
    /// the address the next instruction will get
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// appends an instruction and returns its address
    pub fn emit(&mut self, instruction: Instruction, location: CodeLocation) -> usize {
        self.text.push_back(instruction);
        self.locations.push_back(location);
        self.text.len() - 1
    }

    pub fn last(&self) -> Option<&Instruction> {
        self.text.back()
    }

    /// Sets the jump target of the instruction at `address`.
    /// Returns false if there is no jump instruction at that address.
    pub fn set_target(&mut self, address: usize, target: JumpTarget) -> bool {
        match self
            .text
            .get_mut(address)
            .and_then(Instruction::jump_target_mut)
        {
            Some(slot) => {
                *slot = target;
                true
            }
            None => false,
        }
    }

    /// Points the break and continue jumps in `start..end` to the given addresses.
    /// `None` leaves the corresponding jumps untouched, so an enclosing loop can claim them.
    pub fn patch_special_jumps(
        &mut self,
        start: usize,
        end: usize,
        break_to: Option<usize>,
        continue_to: Option<usize>,
    ) {
        for address in start..end.min(self.text.len()) {
            if let Some(target) = self.text.get_mut(address).and_then(Instruction::jump_target_mut) {
                let resolved = match target {
                    JumpTarget::Break => break_to,
                    JumpTarget::Continue => continue_to,
                    _ => None,
                };
                if let Some(addr) = resolved {
                    *target = JumpTarget::Address(addr);
                }
            }
        }
    }

    /// Whether the code from `start` on can run past its end. That is the case if it doesn't
    /// end in a return, or if something jumps to the address right after it.
    pub fn falls_off_end(&self, start: usize) -> bool {
        let end = self.text.len();
        if end <= start || !self.text[end - 1].is_return() {
            return true;
        }
        self.text
            .iter()
            .skip(start)
            .filter_map(Instruction::jump_target)
            .any(|target| *target == JumpTarget::Address(end))
    }

    pub fn build(self) -> (Vec<Instruction>, Vec<CodeLocation>) {
        (
            self.text.into_iter().collect(),
            self.locations.into_iter().collect(),
        )
    }
}

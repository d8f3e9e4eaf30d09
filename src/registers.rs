use crate::isa::Register;
use crate::microcode::StackAdjust;

/// General purpose registers plus the stack and heap pointers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterFile {
    general: [i32; 8],
    /// Grows downward, points at the last pushed cell
    pub stack_pointer: i32,
    /// Grows upward, first free cell behind the data segment
    pub heap_pointer: i32,
}

impl RegisterFile {
    pub fn new(stack_pointer: i32) -> Self {
        Self {
            stack_pointer,
            ..Self::default()
        }
    }

    pub fn get(&self, register: Register) -> i32 {
        self.general[register.index()]
    }

    pub fn set(&mut self, register: Register, value: i32) {
        self.general[register.index()] = value;
    }

    /// Moves the stack pointer by one cell
    pub fn adjust_stack_pointer(&mut self, adjust: StackAdjust) {
        match adjust {
            StackAdjust::Increment => self.stack_pointer += 1,
            StackAdjust::Decrement => self.stack_pointer -= 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Register::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_get_set() -> Result<()> {
        let mut registers = RegisterFile::default();
        registers.set(R3, -12);
        registers.set(R7, 99);

        assert_eq!(registers.get(R3), -12);
        assert_eq!(registers.get(R7), 99);
        assert_eq!(registers.get(R0), 0);

        Ok(())
    }

    #[test]
    fn test_stack_pointer() -> Result<()> {
        let mut registers = RegisterFile::new(1024);
        registers.adjust_stack_pointer(StackAdjust::Decrement);
        registers.adjust_stack_pointer(StackAdjust::Decrement);
        assert_eq!(registers.stack_pointer, 1022);

        registers.adjust_stack_pointer(StackAdjust::Increment);
        assert_eq!(registers.stack_pointer, 1023);
        // general registers are independent of the stack pointer
        assert!(Register::ALL.iter().all(|r| registers.get(*r) == 0));

        Ok(())
    }
}

use std::fmt;

use crate::error::MachineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluOperation {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Mul,
    /// Truncates toward zero
    Div,
    /// Takes the sign of the dividend
    Rem,
}

/// Flags a conditional jump can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Zero,
    Carry,
    Negative,
    Overflow,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags {
    pub zero: bool,
    /// result exceeded `i32::MAX` before wrapping
    pub carry: bool,
    pub negative: bool,
    /// result left the `i32` range before wrapping
    pub overflow: bool,
}

impl Flags {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Zero => self.zero,
            Flag::Carry => self.carry,
            Flag::Negative => self.negative,
            Flag::Overflow => self.overflow,
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            bit(self.zero, 'Z'),
            bit(self.carry, 'C'),
            bit(self.negative, 'N'),
            bit(self.overflow, 'V')
        )
    }
}

/// Two operand latches, a result and the flags of the last operation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alu {
    pub left: i32,
    pub right: i32,
    pub result: i32,
    pub flags: Flags,
}

impl Alu {
    pub fn latch_left(&mut self, value: i32) {
        self.left = value;
    }

    pub fn latch_right(&mut self, value: i32) {
        self.right = value;
    }

    /// Computes `left op right`, stores the wrapped result and recomputes the flags.
    ///
    /// # Errors
    ///
    /// Division or remainder by zero. Result and flags are left untouched.
    pub fn perform(&mut self, operation: AluOperation) -> Result<(), MachineError> {
        let (left, right) = (i64::from(self.left), i64::from(self.right));

        let wide = match operation {
            AluOperation::Add => left + right,
            AluOperation::Sub => left - right,
            AluOperation::And => left & right,
            AluOperation::Or => left | right,
            AluOperation::Xor => left ^ right,
            AluOperation::Mul => left * right,
            AluOperation::Div | AluOperation::Rem if right == 0 => {
                return Err(MachineError::DivisionByZero)
            }
            AluOperation::Div => left / right,
            AluOperation::Rem => left % right,
        };

        self.result = wide as i32;
        self.flags = Flags {
            zero: self.result == 0,
            carry: wide > i64::from(i32::MAX),
            negative: self.result < 0,
            overflow: i32::try_from(wide).is_err(),
        };

        log::trace!(
            "ALU {:?} {} {}: {} [{}]",
            operation,
            self.left,
            self.right,
            self.result,
            self.flags
        );

        Ok(())
    }
}

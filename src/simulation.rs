//! Runs a program image from start to halt and renders what it printed.

use std::collections::VecDeque;

use log::*;

use crate::control_unit::HaltReason;
use crate::error::MachineError;
use crate::machine::Machine;
use crate::memory::{Address, Cell, Ports, DATA_BASE};
use crate::microcode;

/// Default maximum number of ticks
pub const TICK_BUDGET: u64 = 1_000_000;

/// How port values map to text
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoMode {
    /// one code point per word, input ends with a `0` sentinel
    Character,
    /// newline separated integers in, space separated integers out
    #[default]
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    pub ports: Ports,
    pub data_base: Address,
    pub tick_budget: u64,
    pub io_mode: IoMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ports: Ports::default(),
            data_base: DATA_BASE,
            tick_budget: TICK_BUDGET,
            io_mode: IoMode::default(),
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub output: String,
    pub halt: HaltReason,
    pub ticks: u64,
    pub instructions: u64,
}

/// Turns input text into port values
pub fn parse_input(mode: IoMode, text: &str) -> Result<VecDeque<i32>, MachineError> {
    match mode {
        IoMode::Character => Ok(text
            .chars()
            .map(|c| c as i32)
            .chain(std::iter::once(0))
            .collect()),
        IoMode::Numeric => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.parse::<i32>().map_err(|_| MachineError::InvalidInput {
                    token: line.to_owned(),
                })
            })
            .collect(),
    }
}

/// Turns port values into output text
pub fn render_output(mode: IoMode, values: &[i32]) -> String {
    match mode {
        IoMode::Character => values
            .iter()
            .map(|value| {
                u32::try_from(*value)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or_else(|| {
                        warn!("Output value {} is not a character", value);
                        char::REPLACEMENT_CHARACTER
                    })
            })
            .collect(),
        IoMode::Numeric => values
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Loads `code` at address 0 and `data` at the configured base, feeds `input`
/// to the input port and runs until halt.
///
/// # Errors
///
/// Any fatal machine error, or [`MachineError::TickBudgetExhausted`] when the
/// program does not halt within the budget.
pub fn simulate<const S: usize>(
    code: &[Cell],
    data: &[i32],
    input: VecDeque<i32>,
    config: &SimulationConfig,
) -> Result<(Report, Machine<S>), MachineError> {
    microcode::self_check()?;

    let mut machine = Machine::<S>::new(config.ports)?;
    machine.load_code(code)?;
    machine.load_data(config.data_base, data)?;
    machine.datapath.memory.extend_input(input);

    debug!(
        "Loaded {} code cells, {} data cells at {}",
        code.len(),
        data.len(),
        config.data_base
    );

    let halt = machine.run(config.tick_budget)?;
    let report = Report {
        output: render_output(config.io_mode, machine.datapath.memory.output()),
        halt,
        ticks: machine.ticks(),
        instructions: machine.instructions(),
    };

    Ok((report, machine))
}

/// [`simulate`] with textual input
pub fn simulate_text<const S: usize>(
    code: &[Cell],
    data: &[i32],
    input: &str,
    config: &SimulationConfig,
) -> Result<(Report, Machine<S>), MachineError> {
    let input = parse_input(config.io_mode, input)?;
    simulate(code, data, input, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_character_input() -> Result<()> {
        assert_eq!(
            parse_input(IoMode::Character, "hi")?,
            VecDeque::from(vec![104, 105, 0])
        );
        assert_eq!(parse_input(IoMode::Character, "")?, VecDeque::from(vec![0]));

        Ok(())
    }

    #[test]
    fn test_numeric_input() -> Result<()> {
        assert_eq!(
            parse_input(IoMode::Numeric, "41\n-3\n\n 7 \n")?,
            VecDeque::from(vec![41, -3, 7])
        );
        assert_eq!(
            parse_input(IoMode::Numeric, "4 2"),
            Err(MachineError::InvalidInput {
                token: "4 2".to_owned()
            })
        );

        Ok(())
    }

    #[test]
    fn test_render() -> Result<()> {
        assert_eq!(render_output(IoMode::Numeric, &[42, -1, 0]), "42 -1 0");
        assert_eq!(render_output(IoMode::Numeric, &[]), "");
        assert_eq!(render_output(IoMode::Character, &[111, 107]), "ok");
        assert_eq!(render_output(IoMode::Character, &[-1]), "\u{FFFD}");

        Ok(())
    }
}

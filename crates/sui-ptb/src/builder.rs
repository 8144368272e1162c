//! Batch builder
//!
//! Appends inputs and commands and hands back [`Argument`] handles so later
//! commands can consume earlier outputs. Object inputs are deduplicated by
//! normalized id: a batch may reference the same shared object from several
//! commands but must list it only once.

use std::collections::HashMap;

use yume_core::normalize_hex_id;

use crate::bcs::{self, BcsError};
use crate::transaction::{Argument, CallArg, Command, MoveCall, ProgrammableTransaction};

/// Maximum commands in one batch (protocol limit)
pub const MAX_COMMANDS: usize = 1_024;

/// Maximum inputs in one batch (protocol limit)
pub const MAX_INPUTS: usize = 2_048;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PtbError {
    #[error("Invalid pure argument: {0}")]
    Encoding(#[from] BcsError),

    #[error("Invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("Too many commands: {count} (max {max})")]
    TooManyCommands { count: usize, max: usize },

    #[error("Too many inputs: {count} (max {max})")]
    TooManyInputs { count: usize, max: usize },
}

#[derive(Debug, Default)]
pub struct PtbBuilder {
    inputs: Vec<CallArg>,
    commands: Vec<Command>,
    object_index: HashMap<String, u16>,
}

impl PtbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference an object input. The same object always yields the same handle.
    pub fn object(&mut self, object_id: &str) -> Result<Argument, PtbError> {
        let key =
            normalize_hex_id(object_id).ok_or_else(|| PtbError::InvalidObjectId(object_id.to_string()))?;
        if let Some(&index) = self.object_index.get(&key) {
            return Ok(Argument::Input(index));
        }
        let index = self.push_input(CallArg::Object {
            object_id: object_id.to_string(),
        });
        self.object_index.insert(key, index);
        Ok(Argument::Input(index))
    }

    pub fn pure_bytes(&mut self, bytes: Vec<u8>) -> Argument {
        Argument::Input(self.push_input(CallArg::Pure(bytes)))
    }

    pub fn pure_u64(&mut self, value: u64) -> Argument {
        self.pure_bytes(bcs::encode_u64(value))
    }

    pub fn pure_u8(&mut self, value: u8) -> Argument {
        self.pure_bytes(bcs::encode_u8(value))
    }

    /// Pure `ID` / `address` argument
    pub fn pure_id(&mut self, id: &str) -> Result<Argument, PtbError> {
        let bytes = bcs::encode_address(id)?;
        Ok(self.pure_bytes(bytes))
    }

    /// Split `amounts` off `coin`; one result handle per amount.
    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> Vec<Argument> {
        let count = amounts.len();
        let index = self.push_command(Command::SplitCoins { coin, amounts });
        (0..count)
            .map(|j| Argument::NestedResult(index, j as u16))
            .collect()
    }

    /// Split a single `amount` off `coin`
    pub fn split_coin(&mut self, coin: Argument, amount: u64) -> Argument {
        let amount = self.pure_u64(amount);
        let index = self.push_command(Command::SplitCoins {
            coin,
            amounts: vec![amount],
        });
        Argument::NestedResult(index, 0)
    }

    /// Append a Move call and return a handle to its result.
    pub fn move_call(
        &mut self,
        package: &str,
        module: &str,
        function: &str,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    ) -> Argument {
        let index = self.push_command(Command::MoveCall(Box::new(MoveCall {
            package: package.to_string(),
            module: module.to_string(),
            function: function.to_string(),
            type_arguments,
            arguments,
        })));
        Argument::Result(index)
    }

    /// Finish the batch, checking protocol size limits.
    pub fn finish(self) -> Result<ProgrammableTransaction, PtbError> {
        if self.commands.len() > MAX_COMMANDS {
            return Err(PtbError::TooManyCommands {
                count: self.commands.len(),
                max: MAX_COMMANDS,
            });
        }
        if self.inputs.len() > MAX_INPUTS {
            return Err(PtbError::TooManyInputs {
                count: self.inputs.len(),
                max: MAX_INPUTS,
            });
        }
        Ok(ProgrammableTransaction {
            inputs: self.inputs,
            commands: self.commands,
        })
    }

    // Indices past u16::MAX are caught by the limit checks in finish()
    fn push_input(&mut self, arg: CallArg) -> u16 {
        self.inputs.push(arg);
        (self.inputs.len() - 1) as u16
    }

    fn push_command(&mut self, command: Command) -> u16 {
        self.commands.push(command);
        (self.commands.len() - 1) as u16
    }
}

//! Programmable transaction structures
//!
//! Serializes to the JSON transaction shape (version 2) that Sui wallets
//! accept for signing. Object inputs are left unresolved: the wallet fills
//! in versions, digests and gas before signing.

use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::bcs;

/// Handle to a value inside the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Argument {
    /// The transaction's gas coin
    GasCoin,
    /// Input at this index
    Input(u16),
    /// Entire result of the command at this index
    Result(u16),
    /// One element of a command's tuple result
    NestedResult(u16, u16),
}

impl Serialize for Argument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::GasCoin => map.serialize_entry("GasCoin", &true)?,
            Self::Input(i) => map.serialize_entry("Input", i)?,
            Self::Result(i) => map.serialize_entry("Result", i)?,
            Self::NestedResult(cmd, idx) => map.serialize_entry("NestedResult", &(cmd, idx))?,
        }
        map.end()
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    /// Object reference, resolved by the wallet
    Object { object_id: String },
    /// BCS-encoded literal
    Pure(Vec<u8>),
}

impl CallArg {
    pub fn as_pure(&self) -> Option<&[u8]> {
        match self {
            Self::Pure(bytes) => Some(bytes),
            Self::Object { .. } => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&str> {
        match self {
            Self::Object { object_id } => Some(object_id),
            Self::Pure(_) => None,
        }
    }
}

impl Serialize for CallArg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        enum Wire<'a> {
            Pure {
                bytes: String,
            },
            UnresolvedObject {
                #[serde(rename = "objectId")]
                object_id: &'a str,
            },
        }

        match self {
            Self::Pure(bytes) => Wire::Pure {
                bytes: base64::engine::general_purpose::STANDARD.encode(bytes),
            }
            .serialize(serializer),
            Self::Object { object_id } => Wire::UnresolvedObject { object_id }.serialize(serializer),
        }
    }
}

/// Invocation of a published Move function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCall {
    pub package: String,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Argument>,
}

impl MoveCall {
    /// `package::module::function`
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }

    pub fn is(&self, module: &str, function: &str) -> bool {
        self.module == module && self.function == function
    }
}

/// One step of the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    MoveCall(Box<MoveCall>),
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
}

impl Command {
    pub fn as_move_call(&self) -> Option<&MoveCall> {
        match self {
            Self::MoveCall(call) => Some(call),
            Self::SplitCoins { .. } => None,
        }
    }
}

/// An atomic batch of commands over a shared input list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

/// Gas data left for the wallet to fill
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GasData {
    budget: Option<String>,
    price: Option<String>,
    owner: Option<String>,
    payment: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WalletTransaction<'a> {
    version: u8,
    sender: Option<&'a str>,
    expiration: Option<()>,
    gas_data: GasData,
    inputs: &'a [CallArg],
    commands: &'a [Command],
}

impl Serialize for ProgrammableTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WalletTransaction {
            version: 2,
            sender: None,
            expiration: None,
            gas_data: GasData::default(),
            inputs: &self.inputs,
            commands: &self.commands,
        }
        .serialize(serializer)
    }
}

impl ProgrammableTransaction {
    /// Wallet JSON form
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn move_calls(&self) -> impl Iterator<Item = &MoveCall> {
        self.commands.iter().filter_map(Command::as_move_call)
    }

    /// Index and body of the first call to `module::function`
    pub fn find_call(&self, module: &str, function: &str) -> Option<(usize, &MoveCall)> {
        self.commands
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.as_move_call().filter(|m| m.is(module, function)).map(|m| (i, m)))
    }

    pub fn input(&self, arg: Argument) -> Option<&CallArg> {
        match arg {
            Argument::Input(i) => self.inputs.get(i as usize),
            _ => None,
        }
    }

    /// Decode a pure u64 input referenced by `arg`
    pub fn pure_u64(&self, arg: Argument) -> Option<u64> {
        self.input(arg)
            .and_then(CallArg::as_pure)
            .and_then(|b| bcs::decode_u64(b).ok())
    }

    pub fn pure_u8(&self, arg: Argument) -> Option<u8> {
        self.input(arg)
            .and_then(CallArg::as_pure)
            .and_then(|b| bcs::decode_u8(b).ok())
    }

    pub fn object_id(&self, arg: Argument) -> Option<&str> {
        self.input(arg).and_then(CallArg::as_object_id)
    }
}

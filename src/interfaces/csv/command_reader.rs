use crate::domain::command::Command;
use crate::domain::money::Amount;
use crate::domain::party::Address;
use crate::domain::transaction::{Operation, TransactionId};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOp {
    Open,
    Deliver,
    Confirm,
    Claim,
    Dispute,
    Resolve,
    AutoWithdraw,
    Withdraw,
}

/// One raw line of a command script.
///
/// Columns an operation does not use may be left empty or omitted.
#[derive(Debug, Deserialize)]
pub struct ScriptRow {
    pub op: ScriptOp,
    pub caller: Address,
    #[serde(default)]
    pub tx: Option<TransactionId>,
    #[serde(default)]
    pub seller: Option<Address>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub flag: Option<bool>,
    #[serde(default)]
    pub at: Option<i64>,
}

/// A validated script line: who submits what, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEntry {
    pub caller: Address,
    pub command: Command,
    pub at: Option<DateTime<Utc>>,
}

fn required<T>(field: Option<T>, name: &str, op: ScriptOp) -> Result<T> {
    field.ok_or_else(|| EscrowError::ValidationError(format!("{op:?} requires `{name}`")))
}

impl TryFrom<ScriptRow> for ScriptEntry {
    type Error = EscrowError;

    fn try_from(row: ScriptRow) -> Result<Self> {
        let transition = |operation: Operation| -> Result<Command> {
            Ok(Command::Transition {
                operation,
                transaction_id: required(row.tx, "tx", row.op)?,
            })
        };

        let command = match row.op {
            ScriptOp::Open => {
                let price = Amount::new(required(row.amount, "amount", row.op)?)?;
                Command::Open {
                    seller: required(row.seller, "seller", row.op)?,
                    price,
                    // No explicit value means the buyer pays the exact price.
                    paid: row.value.unwrap_or(price.value()),
                }
            }
            ScriptOp::Deliver => transition(Operation::Deliver)?,
            ScriptOp::Confirm => transition(Operation::Confirm)?,
            ScriptOp::Claim => transition(Operation::Claim)?,
            ScriptOp::Dispute => transition(Operation::Dispute)?,
            ScriptOp::Resolve => transition(Operation::ResolveDispute)?,
            ScriptOp::AutoWithdraw => Command::SetAutoWithdraw(required(row.flag, "flag", row.op)?),
            ScriptOp::Withdraw => {
                Command::Withdraw(Amount::new(required(row.amount, "amount", row.op)?)?)
            }
        };

        let at = row
            .at
            .map(|secs| {
                DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                    EscrowError::ValidationError(format!("timestamp {secs} is out of range"))
                })
            })
            .transpose()?;

        Ok(Self {
            caller: row.caller,
            command,
            at,
        })
    }
}

/// Reads a command script from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// and yields one `Result<ScriptEntry>` per line so a bad line can be skipped
/// without aborting the replay.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes and validates each line.
    pub fn commands(self) -> impl Iterator<Item = Result<ScriptEntry>> {
        self.reader
            .into_deserialize::<ScriptRow>()
            .map(|result| result.map_err(EscrowError::from).and_then(ScriptEntry::try_from))
    }
}

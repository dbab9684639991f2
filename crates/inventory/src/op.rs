//! Operation resolution for the inventory command set.

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::item::InventoryItem;

/// The five quantity operations.
///
/// Wire form: `add | sub | lock | unlock | sub_locked`. Anything else is
/// `OperationUnknown`, a permanent failure that must not be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Sub,
    Lock,
    Unlock,
    SubLocked,
}

impl Operation {
    /// Resolves the wire form of an operation.
    pub fn parse(s: &str) -> Result<Self, InventoryError> {
        match s {
            "add" => Ok(Operation::Add),
            "sub" => Ok(Operation::Sub),
            "lock" => Ok(Operation::Lock),
            "unlock" => Ok(Operation::Unlock),
            "sub_locked" => Ok(Operation::SubLocked),
            other => Err(InventoryError::OperationUnknown(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Lock => "lock",
            Operation::Unlock => "unlock",
            Operation::SubLocked => "sub_locked",
        }
    }

    /// Applies this operation to a row.
    pub fn apply(&self, item: &mut InventoryItem, quantity: u64) -> Result<(), InventoryError> {
        match self {
            Operation::Add => {
                item.add(quantity);
                Ok(())
            }
            Operation::Sub => item.sub(quantity),
            Operation::Lock => item.lock(quantity),
            Operation::Unlock => item.unlock(quantity),
            Operation::SubLocked => item.sub_locked(quantity),
        }
    }

    /// Returns true if the operation may create a missing row.
    pub fn creates_row(&self) -> bool {
        matches!(self, Operation::Add)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;

    #[test]
    fn parse_recognizes_the_command_set() {
        assert_eq!(Operation::parse("add").unwrap(), Operation::Add);
        assert_eq!(Operation::parse("sub").unwrap(), Operation::Sub);
        assert_eq!(Operation::parse("lock").unwrap(), Operation::Lock);
        assert_eq!(Operation::parse("unlock").unwrap(), Operation::Unlock);
        assert_eq!(Operation::parse("sub_locked").unwrap(), Operation::SubLocked);
    }

    #[test]
    fn parse_rejects_anything_else() {
        let err = Operation::parse("reserve").unwrap_err();
        assert!(matches!(err, InventoryError::OperationUnknown(ref s) if s == "reserve"));
        assert!(Operation::parse("ADD").is_err());
        assert!(Operation::parse("").is_err());
    }

    #[test]
    fn apply_dispatches_to_the_item() {
        let mut item = InventoryItem::new(ProductId::new());
        Operation::Add.apply(&mut item, 5).unwrap();
        Operation::Lock.apply(&mut item, 2).unwrap();
        assert_eq!((item.available, item.reserved), (3, 2));
        Operation::SubLocked.apply(&mut item, 2).unwrap();
        assert_eq!((item.available, item.reserved), (3, 0));
    }

    #[test]
    fn wire_form_round_trips() {
        for op in [
            Operation::Add,
            Operation::Sub,
            Operation::Lock,
            Operation::Unlock,
            Operation::SubLocked,
        ] {
            assert_eq!(Operation::parse(op.as_str()).unwrap(), op);
        }
    }
}

//! One-at-a-time borrow tracking for connections and transactions.
//!
//! While a connection is borrowed by a transaction, every operation issued
//! through the connection itself must be rejected: the transaction owns the
//! session. The same holds for a transaction borrowed by a subtransaction.

use std::fmt;

use crate::error::{Error, Result};

/// Why a connection or transaction is borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorrowReason {
    /// Borrowed by a transaction.
    Transaction,
    /// Borrowed by a subtransaction.
    Subtransaction,
}

impl BorrowReason {
    /// The message reported to callers that hit this borrow.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Transaction => {
                "The connection is borrowed for a transaction. \
                 Use the methods on the transaction object instead."
            }
            Self::Subtransaction => {
                "The transaction is borrowed for a subtransaction. \
                 Use the methods on the subtransaction object instead."
            }
        }
    }
}

impl fmt::Display for BorrowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction => f.write_str("transaction"),
            Self::Subtransaction => f.write_str("subtransaction"),
        }
    }
}

/// Current borrow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorrowState {
    /// Free for use.
    #[default]
    Unborrowed,
    /// Exclusively held for the given reason.
    Borrowed(BorrowReason),
}

/// Tracks whether the owner is currently lent out.
#[derive(Debug, Default)]
pub struct BorrowGuard {
    state: BorrowState,
}

impl BorrowGuard {
    /// Create an unborrowed guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the owner as borrowed for `reason`.
    ///
    /// Fails with an interface error naming the existing borrow if the owner
    /// is already borrowed; the state is left unchanged in that case.
    pub fn borrow(&mut self, reason: BorrowReason) -> Result<()> {
        self.assert_unborrowed()?;
        tracing::trace!(%reason, "borrowed");
        self.state = BorrowState::Borrowed(reason);
        Ok(())
    }

    /// Release the current borrow.
    ///
    /// Unborrowing an owner that is not borrowed is a driver bug and yields
    /// [`Error::Logic`].
    pub fn unborrow(&mut self) -> Result<()> {
        match self.state {
            BorrowState::Unborrowed => Err(Error::Logic(
                "not currently borrowed, can not unborrow".into(),
            )),
            BorrowState::Borrowed(reason) => {
                tracing::trace!(%reason, "unborrowed");
                self.state = BorrowState::Unborrowed;
                Ok(())
            }
        }
    }

    /// Fail with the borrow's interface error if the owner is borrowed.
    pub fn assert_unborrowed(&self) -> Result<()> {
        match self.state {
            BorrowState::Unborrowed => Ok(()),
            BorrowState::Borrowed(reason) => Err(Error::interface(reason.message())),
        }
    }

    /// Check if the owner is borrowed.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.state, BorrowState::Borrowed(_))
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> BorrowState {
        self.state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::category::ErrorCategory;

    #[test]
    fn test_borrow_and_unborrow() {
        let mut guard = BorrowGuard::new();
        assert!(guard.assert_unborrowed().is_ok());

        guard.borrow(BorrowReason::Transaction).unwrap();
        assert!(guard.is_borrowed());
        assert_eq!(
            guard.state(),
            BorrowState::Borrowed(BorrowReason::Transaction)
        );

        guard.unborrow().unwrap();
        assert_eq!(guard.state(), BorrowState::Unborrowed);
        assert!(guard.assert_unborrowed().is_ok());
    }

    #[test]
    fn test_double_borrow_names_existing_borrow() {
        let mut guard = BorrowGuard::new();
        guard.borrow(BorrowReason::Transaction).unwrap();

        let err = guard.borrow(BorrowReason::Subtransaction).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The connection is borrowed for a transaction. \
             Use the methods on the transaction object instead."
        );
        assert!(err.category(ErrorCategory::InterfaceError));
        assert_eq!(
            guard.state(),
            BorrowState::Borrowed(BorrowReason::Transaction)
        );
    }

    #[test]
    fn test_assert_unborrowed_subtransaction() {
        let mut guard = BorrowGuard::new();
        guard.borrow(BorrowReason::Subtransaction).unwrap();

        let err = guard.assert_unborrowed().unwrap_err();
        assert_eq!(
            err.to_string(),
            "The transaction is borrowed for a subtransaction. \
             Use the methods on the subtransaction object instead."
        );
        assert!(guard.is_borrowed());
    }

    #[test]
    fn test_unborrow_when_unborrowed_is_logic_error() {
        let mut guard = BorrowGuard::new();
        let err = guard.unborrow().unwrap_err();
        assert!(err.is_logic_error());
        assert!(err.to_string().contains("not currently borrowed, can not unborrow"));
        assert_eq!(guard.state(), BorrowState::Unborrowed);
    }

    #[test]
    fn test_double_transaction_borrow_is_rejected() {
        let mut guard = BorrowGuard::new();
        guard.borrow(BorrowReason::Transaction).unwrap();

        let err = guard.borrow(BorrowReason::Transaction).unwrap_err();
        assert!(err.category(ErrorCategory::InterfaceError));
        assert!(err.to_string().starts_with("The connection is borrowed for a transaction."));
        assert_eq!(
            guard.state(),
            BorrowState::Borrowed(BorrowReason::Transaction)
        );

        guard.unborrow().unwrap();
        assert!(!guard.is_borrowed());
    }

    #[test]
    fn test_reborrow_after_unborrow() {
        let mut guard = BorrowGuard::new();
        for reason in [
            BorrowReason::Transaction,
            BorrowReason::Subtransaction,
            BorrowReason::Transaction,
        ] {
            guard.borrow(reason).unwrap();
            assert_eq!(guard.state(), BorrowState::Borrowed(reason));
            assert!(guard.assert_unborrowed().is_err());

            guard.unborrow().unwrap();
            assert_eq!(guard.state(), BorrowState::Unborrowed);
            assert!(guard.assert_unborrowed().is_ok());
        }
    }
}

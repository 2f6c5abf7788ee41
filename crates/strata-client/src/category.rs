//! Error categories and tags.
//!
//! Error codes are four bytes wide and hierarchical: zeroing the lowest
//! non-zero byte of a code yields the code of its parent category. For
//! example `TransactionSerializationError` (`0x05_03_01_01`) is a
//! `TransactionConflictError` (`0x05_03_01_00`), which is a
//! `TransactionError` (`0x05_03_00_00`), which is an `ExecutionError`
//! (`0x05_00_00_00`).
//!
//! Tags are attached to categories and inherited by every descendant.

/// Labels that cut across the category hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorTag {
    /// The operation may succeed if attempted again.
    ShouldRetry,
    /// The connection should be re-established before retrying.
    ShouldReconnect,
}

macro_rules! error_categories {
    ($(
        $(#[$doc:meta])*
        $name:ident = $code:literal $(, tags: [$($tag:ident),+])?;
    )+) => {
        /// Known error categories, keyed by their code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum ErrorCategory {
            $(
                $(#[$doc])*
                $name,
            )+
        }

        impl ErrorCategory {
            /// Every known category, in code order.
            pub const ALL: &'static [ErrorCategory] = &[$(ErrorCategory::$name),+];

            /// The category's code.
            #[must_use]
            pub const fn code(self) -> u32 {
                match self {
                    $(Self::$name => $code,)+
                }
            }

            /// The category's name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)+
                }
            }

            const fn own_tags(self) -> &'static [ErrorTag] {
                match self {
                    $(Self::$name => &[$($(ErrorTag::$tag),+)?],)+
                }
            }

            const fn from_exact_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)+
                    _ => None,
                }
            }
        }
    };
}

error_categories! {
    /// Unexpected failure inside the server.
    InternalServerError = 0x01_00_00_00;
    /// The server does not support the requested feature.
    UnsupportedFeatureError = 0x02_00_00_00;
    /// Protocol-level failure.
    ProtocolError = 0x03_00_00_00;
    /// Malformed or unexpected binary protocol traffic.
    BinaryProtocolError = 0x03_01_00_00;
    /// The server does not speak the requested protocol version.
    UnsupportedProtocolVersionError = 0x03_01_00_01;
    /// A type descriptor referenced an unknown type.
    TypeSpecNotFoundError = 0x03_01_00_02;
    /// A message arrived that the receiving state machine did not expect.
    UnexpectedMessageError = 0x03_01_00_03;
    /// Query input could not be decoded.
    InputDataError = 0x03_02_00_00;
    /// Arguments did not match the query's parameters.
    ParameterTypeMismatchError = 0x03_02_01_00;
    /// Client and server session state descriptors diverged.
    StateMismatchError = 0x03_02_02_00, tags: [ShouldRetry];
    /// The result had a different cardinality than requested.
    ResultCardinalityMismatchError = 0x03_03_00_00;
    /// The command needs a capability that was not granted.
    CapabilityError = 0x03_04_00_00;
    /// The command needs a capability the server does not support.
    UnsupportedCapabilityError = 0x03_04_01_00;
    /// The command needs a capability the client disallowed.
    DisabledCapabilityError = 0x03_04_02_00;
    /// The query is invalid.
    QueryError = 0x04_00_00_00;
    /// The query text does not parse.
    InvalidSyntaxError = 0x04_01_00_00;
    /// Query-language syntax error.
    QuerySyntaxError = 0x04_01_01_00;
    /// Schema-definition syntax error.
    SchemaSyntaxError = 0x04_01_02_00;
    /// The query is ill-typed.
    InvalidTypeError = 0x04_02_00_00;
    /// The query references something that does not exist.
    InvalidReferenceError = 0x04_03_00_00;
    /// Unknown module.
    UnknownModuleError = 0x04_03_00_01;
    /// Unknown link.
    UnknownLinkError = 0x04_03_00_02;
    /// Unknown property.
    UnknownPropertyError = 0x04_03_00_03;
    /// Unknown user.
    UnknownUserError = 0x04_03_00_04;
    /// Unknown database.
    UnknownDatabaseError = 0x04_03_00_05;
    /// Unknown query parameter.
    UnknownParameterError = 0x04_03_00_06;
    /// Schema-level failure.
    SchemaError = 0x04_04_00_00;
    /// Invalid schema definition.
    SchemaDefinitionError = 0x04_05_00_00;
    /// The query exceeded its time budget.
    QueryTimeoutError = 0x04_06_00_00;
    /// The query failed while running.
    ExecutionError = 0x05_00_00_00;
    /// A value was invalid.
    InvalidValueError = 0x05_01_00_00;
    /// Division by zero.
    DivisionByZeroError = 0x05_01_00_01;
    /// A numeric value was out of range.
    NumericOutOfRangeError = 0x05_01_00_02;
    /// An access policy rejected the operation.
    AccessPolicyError = 0x05_01_00_03;
    /// Integrity constraint failure.
    IntegrityError = 0x05_02_00_00;
    /// A constraint was violated.
    ConstraintViolationError = 0x05_02_00_01;
    /// A cardinality constraint was violated.
    CardinalityViolationError = 0x05_02_00_02;
    /// A required value was missing.
    MissingRequiredError = 0x05_02_00_03;
    /// Transaction-level failure.
    TransactionError = 0x05_03_00_00;
    /// The transaction conflicted with a concurrent one.
    TransactionConflictError = 0x05_03_01_00, tags: [ShouldRetry];
    /// The transaction could not be serialized.
    TransactionSerializationError = 0x05_03_01_01;
    /// The transaction deadlocked.
    TransactionDeadlockError = 0x05_03_01_02;
    /// Configuration failure.
    ConfigurationError = 0x06_00_00_00;
    /// Access was denied.
    AccessError = 0x07_00_00_00;
    /// Authentication failed.
    AuthenticationError = 0x07_01_00_00;
    /// The server is not available.
    AvailabilityError = 0x08_00_00_00;
    /// The server's backend is temporarily unavailable.
    BackendUnavailableError = 0x08_00_00_01, tags: [ShouldRetry];
    /// Failure in the server's backend.
    BackendError = 0x09_00_00_00;
    /// The backend does not support the requested feature.
    UnsupportedBackendFeatureError = 0x09_00_01_00;
    /// Errors raised by the client itself.
    ClientError = 0xff_00_00_00;
    /// Failure of the client's connection.
    ClientConnectionError = 0xff_01_00_00;
    /// The connection could not be established.
    ClientConnectionFailedError = 0xff_01_01_00;
    /// The connection could not be established, but may succeed later.
    ClientConnectionFailedTemporarilyError = 0xff_01_01_01, tags: [ShouldReconnect, ShouldRetry];
    /// A network operation timed out.
    ClientConnectionTimeoutError = 0xff_01_02_00, tags: [ShouldReconnect, ShouldRetry];
    /// The connection was closed.
    ClientConnectionClosedError = 0xff_01_03_00, tags: [ShouldReconnect, ShouldRetry];
    /// The driver was used incorrectly.
    InterfaceError = 0xff_02_00_00;
    /// Query arguments were rejected by the client.
    QueryArgumentError = 0xff_02_01_00;
    /// The query ran but produced no data where some was required.
    NoDataError = 0xff_03_00_00;
    /// Internal failure of the client.
    InternalClientError = 0xff_04_00_00;
}

impl ErrorCategory {
    /// Resolve the category of an error code.
    ///
    /// Codes without an exact entry resolve to their closest known ancestor.
    /// Returns `None` when no ancestor is known either.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        let mut current = code;
        loop {
            if let Some(category) = Self::from_exact_code(current) {
                return Some(category);
            }
            current = parent_code(current)?;
        }
    }

    /// The enclosing category.
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        Self::from_code(parent_code(self.code())?)
    }

    /// This category followed by each of its ancestors.
    pub fn ancestors(self) -> impl Iterator<Item = ErrorCategory> {
        std::iter::successors(Some(self), |category| category.parent())
    }

    /// Whether this category is `other` or one of its descendants.
    #[must_use]
    pub fn is_a(self, other: ErrorCategory) -> bool {
        self.ancestors().any(|category| category == other)
    }

    /// Whether this category carries `tag`, directly or by inheritance.
    #[must_use]
    pub fn has_tag(self, tag: ErrorTag) -> bool {
        self.ancestors()
            .any(|category| category.own_tags().contains(&tag))
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Zero the lowest non-zero byte of `code`.
fn parent_code(code: u32) -> Option<u32> {
    if code.trailing_zeros() >= 24 {
        return None;
    }
    let shift = (code.trailing_zeros() / 8) * 8;
    Some(code & !(0xff << shift))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_code() {
        assert_eq!(parent_code(0x05_03_01_01), Some(0x05_03_01_00));
        assert_eq!(parent_code(0x05_03_01_00), Some(0x05_03_00_00));
        assert_eq!(parent_code(0x05_03_00_00), Some(0x05_00_00_00));
        assert_eq!(parent_code(0x05_00_00_00), None);
        assert_eq!(parent_code(0), None);
    }

    #[test]
    fn test_from_exact_code() {
        assert_eq!(
            ErrorCategory::from_code(0x03_01_00_03),
            Some(ErrorCategory::UnexpectedMessageError)
        );
        assert_eq!(
            ErrorCategory::from_code(0xff_03_00_00),
            Some(ErrorCategory::NoDataError)
        );
    }

    #[test]
    fn test_unknown_code_resolves_to_ancestor() {
        assert_eq!(
            ErrorCategory::from_code(0x05_03_01_7f),
            Some(ErrorCategory::TransactionConflictError)
        );
        assert_eq!(
            ErrorCategory::from_code(0x04_7f_00_00),
            Some(ErrorCategory::QueryError)
        );
        assert_eq!(ErrorCategory::from_code(0x42_00_00_00), None);
        assert_eq!(ErrorCategory::from_code(0x01), None);
    }

    #[test]
    fn test_hierarchy() {
        let serialization = ErrorCategory::TransactionSerializationError;
        assert!(serialization.is_a(ErrorCategory::TransactionConflictError));
        assert!(serialization.is_a(ErrorCategory::TransactionError));
        assert!(serialization.is_a(ErrorCategory::ExecutionError));
        assert!(!serialization.is_a(ErrorCategory::QueryError));

        let ancestors: Vec<_> = ErrorCategory::UnexpectedMessageError.ancestors().collect();
        assert_eq!(
            ancestors,
            vec![
                ErrorCategory::UnexpectedMessageError,
                ErrorCategory::BinaryProtocolError,
                ErrorCategory::ProtocolError,
            ]
        );
    }

    #[test]
    fn test_tags_are_inherited() {
        assert!(ErrorCategory::TransactionConflictError.has_tag(ErrorTag::ShouldRetry));
        assert!(ErrorCategory::TransactionDeadlockError.has_tag(ErrorTag::ShouldRetry));
        assert!(!ErrorCategory::TransactionError.has_tag(ErrorTag::ShouldRetry));
        assert!(!ErrorCategory::TransactionDeadlockError.has_tag(ErrorTag::ShouldReconnect));
        assert!(ErrorCategory::ClientConnectionClosedError.has_tag(ErrorTag::ShouldReconnect));
    }

    #[test]
    fn test_table_is_consistent() {
        for category in ErrorCategory::ALL {
            assert_eq!(ErrorCategory::from_code(category.code()), Some(*category));
        }
    }
}

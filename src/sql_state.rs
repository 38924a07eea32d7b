//! Typed view of SQLSTATE codes reported by the database.

use std::fmt;

/// Well-known SQLSTATE codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlState {
    SuccessfulCompletion,
    Warning,
    NoData,
    ConnectionException,
    ConnectionDoesNotExist,
    ConnectionFailure,
    SqlClientUnableToEstablishSqlConnection,
    SqlServerRejectedEstablishmentOfSqlConnection,
    FeatureNotSupported,
    DataException,
    StringDataRightTruncation,
    NumericValueOutOfRange,
    InvalidDatetimeFormat,
    DivisionByZero,
    InvalidTextRepresentation,
    IntegrityConstraintViolation,
    RestrictViolation,
    NotNullViolation,
    ForeignKeyViolation,
    UniqueViolation,
    CheckViolation,
    ExclusionViolation,
    InvalidTransactionState,
    ActiveSqlTransaction,
    ReadOnlySqlTransaction,
    InFailedSqlTransaction,
    InvalidAuthorizationSpecification,
    InvalidPassword,
    TransactionRollback,
    SerializationFailure,
    StatementCompletionUnknown,
    DeadlockDetected,
    SyntaxErrorOrAccessRuleViolation,
    SyntaxError,
    InsufficientPrivilege,
    UndefinedColumn,
    UndefinedFunction,
    UndefinedTable,
    DuplicateColumn,
    DuplicateTable,
    InsufficientResources,
    DiskFull,
    OutOfMemory,
    TooManyConnections,
    OperatorIntervention,
    QueryCanceled,
    AdminShutdown,
    LockNotAvailable,
    InternalError,
}

const CODES: &[(SqlState, &str)] = &[
    (SqlState::SuccessfulCompletion, "00000"),
    (SqlState::Warning, "01000"),
    (SqlState::NoData, "02000"),
    (SqlState::ConnectionException, "08000"),
    (SqlState::ConnectionDoesNotExist, "08003"),
    (SqlState::ConnectionFailure, "08006"),
    (SqlState::SqlClientUnableToEstablishSqlConnection, "08001"),
    (SqlState::SqlServerRejectedEstablishmentOfSqlConnection, "08004"),
    (SqlState::FeatureNotSupported, "0A000"),
    (SqlState::DataException, "22000"),
    (SqlState::StringDataRightTruncation, "22001"),
    (SqlState::NumericValueOutOfRange, "22003"),
    (SqlState::InvalidDatetimeFormat, "22007"),
    (SqlState::DivisionByZero, "22012"),
    (SqlState::InvalidTextRepresentation, "22P02"),
    (SqlState::IntegrityConstraintViolation, "23000"),
    (SqlState::RestrictViolation, "23001"),
    (SqlState::NotNullViolation, "23502"),
    (SqlState::ForeignKeyViolation, "23503"),
    (SqlState::UniqueViolation, "23505"),
    (SqlState::CheckViolation, "23514"),
    (SqlState::ExclusionViolation, "23P01"),
    (SqlState::InvalidTransactionState, "25000"),
    (SqlState::ActiveSqlTransaction, "25001"),
    (SqlState::ReadOnlySqlTransaction, "25006"),
    (SqlState::InFailedSqlTransaction, "25P02"),
    (SqlState::InvalidAuthorizationSpecification, "28000"),
    (SqlState::InvalidPassword, "28P01"),
    (SqlState::TransactionRollback, "40000"),
    (SqlState::SerializationFailure, "40001"),
    (SqlState::StatementCompletionUnknown, "40003"),
    (SqlState::DeadlockDetected, "40P01"),
    (SqlState::SyntaxErrorOrAccessRuleViolation, "42000"),
    (SqlState::SyntaxError, "42601"),
    (SqlState::InsufficientPrivilege, "42501"),
    (SqlState::UndefinedColumn, "42703"),
    (SqlState::UndefinedFunction, "42883"),
    (SqlState::UndefinedTable, "42P01"),
    (SqlState::DuplicateColumn, "42701"),
    (SqlState::DuplicateTable, "42P07"),
    (SqlState::InsufficientResources, "53000"),
    (SqlState::DiskFull, "53100"),
    (SqlState::OutOfMemory, "53200"),
    (SqlState::TooManyConnections, "53300"),
    (SqlState::OperatorIntervention, "57000"),
    (SqlState::QueryCanceled, "57014"),
    (SqlState::AdminShutdown, "57P01"),
    (SqlState::LockNotAvailable, "55P03"),
    (SqlState::InternalError, "XX000"),
];

impl SqlState {
    /// Looks up a five-character SQLSTATE code. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        CODES
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(code))
            .map(|(state, _)| *state)
    }

    /// The five-character SQLSTATE code.
    pub fn code(&self) -> &'static str {
        match self {
            SqlState::SuccessfulCompletion => "00000",
            SqlState::Warning => "01000",
            SqlState::NoData => "02000",
            SqlState::ConnectionException => "08000",
            SqlState::ConnectionDoesNotExist => "08003",
            SqlState::ConnectionFailure => "08006",
            SqlState::SqlClientUnableToEstablishSqlConnection => "08001",
            SqlState::SqlServerRejectedEstablishmentOfSqlConnection => "08004",
            SqlState::FeatureNotSupported => "0A000",
            SqlState::DataException => "22000",
            SqlState::StringDataRightTruncation => "22001",
            SqlState::NumericValueOutOfRange => "22003",
            SqlState::InvalidDatetimeFormat => "22007",
            SqlState::DivisionByZero => "22012",
            SqlState::InvalidTextRepresentation => "22P02",
            SqlState::IntegrityConstraintViolation => "23000",
            SqlState::RestrictViolation => "23001",
            SqlState::NotNullViolation => "23502",
            SqlState::ForeignKeyViolation => "23503",
            SqlState::UniqueViolation => "23505",
            SqlState::CheckViolation => "23514",
            SqlState::ExclusionViolation => "23P01",
            SqlState::InvalidTransactionState => "25000",
            SqlState::ActiveSqlTransaction => "25001",
            SqlState::ReadOnlySqlTransaction => "25006",
            SqlState::InFailedSqlTransaction => "25P02",
            SqlState::InvalidAuthorizationSpecification => "28000",
            SqlState::InvalidPassword => "28P01",
            SqlState::TransactionRollback => "40000",
            SqlState::SerializationFailure => "40001",
            SqlState::StatementCompletionUnknown => "40003",
            SqlState::DeadlockDetected => "40P01",
            SqlState::SyntaxErrorOrAccessRuleViolation => "42000",
            SqlState::SyntaxError => "42601",
            SqlState::InsufficientPrivilege => "42501",
            SqlState::UndefinedColumn => "42703",
            SqlState::UndefinedFunction => "42883",
            SqlState::UndefinedTable => "42P01",
            SqlState::DuplicateColumn => "42701",
            SqlState::DuplicateTable => "42P07",
            SqlState::InsufficientResources => "53000",
            SqlState::DiskFull => "53100",
            SqlState::OutOfMemory => "53200",
            SqlState::TooManyConnections => "53300",
            SqlState::OperatorIntervention => "57000",
            SqlState::QueryCanceled => "57014",
            SqlState::AdminShutdown => "57P01",
            SqlState::LockNotAvailable => "55P03",
            SqlState::InternalError => "XX000",
        }
    }

    /// The two-character class prefix of the code.
    pub fn class(&self) -> &'static str {
        &self.code()[..2]
    }

    pub fn is_integrity_constraint_violation(&self) -> bool {
        self.class() == "23"
    }

    /// Whether the database aborted the transaction and the work may be retried.
    pub fn is_transaction_rollback(&self) -> bool {
        self.class() == "40"
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

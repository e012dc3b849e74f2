//! Binding and resolution errors.

use thiserror::Error;

/// Errors raised while resolving statements or binding SQL.
#[derive(Debug, Error)]
pub enum BindingError {
    /// No statement is registered under the given id.
    #[error("statement not found: {id}")]
    StatementNotFound {
        /// The id that failed to resolve.
        id: String,
    },

    /// A statement with this id is already registered.
    #[error("statement already registered: {id}")]
    DuplicateStatement {
        /// The clashing id.
        id: String,
    },

    /// The statement id is not a namespace-qualified identifier.
    #[error("invalid statement id: {id}")]
    InvalidIdentifier {
        /// The rejected id.
        id: String,
    },

    /// A test or bind expression could not be parsed or evaluated.
    #[error("expression error in {expression:?}: {message}")]
    Expression {
        /// The offending expression text.
        expression: String,
        /// What went wrong.
        message: String,
    },

    /// A `${}` substitution referenced a property with no bound value.
    #[error("no value bound for property {property:?}")]
    UnknownProperty {
        /// The missing property path.
        property: String,
    },

    /// A `#{}` placeholder is empty or carries an unknown attribute.
    #[error("malformed parameter placeholder: #{{{placeholder}}}")]
    MalformedPlaceholder {
        /// The placeholder body as written.
        placeholder: String,
    },
}

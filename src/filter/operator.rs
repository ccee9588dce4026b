use std::fmt;

use log::Level;

/// Comparison operator of a single predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Ne,
    Gte,
    Lte,
}

impl Operator {
    /// Parses an operator token. Unknown tokens degrade to `Eq`.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "=" | "==" => Self::Eq,
            ">" => Self::Gt,
            "<" => Self::Lt,
            "!=" => Self::Ne,
            ">=" => Self::Gte,
            "<=" => Self::Lte,
            other => {
                crate::diag!(Level::Debug, "unrecognized operator `{other}`, using equality");
                Self::Eq
            }
        }
    }

    /// Store operator key; `None` for equality, which is written as the bare value.
    #[must_use]
    pub fn store_key(self) -> Option<&'static str> {
        match self {
            Self::Eq => None,
            Self::Gt => Some("$gt"),
            Self::Lt => Some("$lt"),
            Self::Ne => Some("$ne"),
            Self::Gte => Some("$gte"),
            Self::Lte => Some("$lte"),
        }
    }
}

impl From<&str> for Operator {
    fn from(token: &str) -> Self {
        Self::parse(token)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ne => "!=",
            Self::Gte => ">=",
            Self::Lte => "<=",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens() {
        assert_eq!(Operator::parse("="), Operator::Eq);
        assert_eq!(Operator::parse(">"), Operator::Gt);
        assert_eq!(Operator::parse("<"), Operator::Lt);
        assert_eq!(Operator::parse("!="), Operator::Ne);
        assert_eq!(Operator::parse(" >= "), Operator::Gte);
        assert_eq!(Operator::parse("<="), Operator::Lte);
    }

    #[test]
    fn unknown_token_degrades_to_equality() {
        let _g = crate::logger::sink::enable_thread_sink();
        assert_eq!(Operator::parse("LIKE"), Operator::Eq);
        assert!(crate::logger::sink::drain().iter().any(|m| m.contains("`LIKE`")));
    }

    #[test]
    fn display_round_trips_tokens() {
        for op in [Operator::Eq, Operator::Gt, Operator::Lt, Operator::Ne, Operator::Gte, Operator::Lte] {
            assert_eq!(Operator::parse(&op.to_string()), op);
        }
    }
}

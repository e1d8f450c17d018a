//! Troubleshooting hints keyed off backend error messages.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Hint {
    RowLevelSecurity,
    TableName,
    ApiKey,
    InvalidCredentials,
    EmailNotConfirmed,
}

impl Hint {
    /// First matching hint for `message`, checked in declaration order.
    pub fn for_message(message: &str) -> Option<Self> {
        if message.contains("Row Level Security") || message.contains("row-level security") {
            Some(Hint::RowLevelSecurity)
        } else if message.contains("relation") || message.contains("does not exist") {
            Some(Hint::TableName)
        } else if message.contains("JWT") {
            Some(Hint::ApiKey)
        } else if message.contains("Invalid login credentials") {
            Some(Hint::InvalidCredentials)
        } else if message.contains("Email not confirmed") {
            Some(Hint::EmailNotConfirmed)
        } else {
            None
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Hint::RowLevelSecurity => {
                "Row Level Security (RLS) is enabled on this table. You may need to disable RLS or create a policy that allows access for your role."
            }
            Hint::TableName => {
                "The table name might be case-sensitive. Check your Supabase dashboard to confirm the exact table name."
            }
            Hint::ApiKey => {
                "There may be an issue with your API key. Verify anon_key in config.toml (or ORES_SUPABASE_ANON_KEY) is correct."
            }
            Hint::InvalidCredentials => {
                "Double-check your email and password, or sign up if you don't have an account yet."
            }
            Hint::EmailNotConfirmed => {
                "Please confirm your email address using the link we sent you, then sign in again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_matching() {
        let cases = [
            (
                "new row violates row-level security policy for table \"Ores\"",
                Some(Hint::RowLevelSecurity),
            ),
            (
                "relation \"public.Ores\" does not exist",
                Some(Hint::TableName),
            ),
            ("JWT expired", Some(Hint::ApiKey)),
            ("Invalid login credentials", Some(Hint::InvalidCredentials)),
            ("Email not confirmed", Some(Hint::EmailNotConfirmed)),
            ("HTTP 503", None),
        ];
        for (message, expected) in cases {
            assert_eq!(Hint::for_message(message), expected, "{message}");
        }
    }

    #[test]
    fn test_first_match_wins() {
        let message = "Row Level Security: relation does not exist";
        assert_eq!(Hint::for_message(message), Some(Hint::RowLevelSecurity));
    }
}

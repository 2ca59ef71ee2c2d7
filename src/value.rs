use std::fmt;

/// Payload of a finished task or test.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Int(i64),
    String(String),
    None,
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Int(i) => write!(f, "{}", i),
            Val::String(s) => f.write_str(s),
            Val::None => Ok(()),
        }
    }
}

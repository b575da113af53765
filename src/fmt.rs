//! Formatting of applications.

use std::fmt::{self, Display};

/// Format a head applied to a list of arguments,
/// parenthesising only when arguments are present.
pub fn application<H: Display, T: Display>(
    head: &H,
    tail: &[T],
    f: &mut fmt::Formatter,
) -> fmt::Result {
    let parens = !tail.is_empty();
    if parens {
        write!(f, "(")?;
    }
    write!(f, "{}", head)?;
    for t in tail {
        write!(f, " {}", t)?;
    }
    if parens {
        write!(f, ")")?;
    }
    Ok(())
}

// Commercial conversation suggestion engine: retrieves comparable concluded
// conversations, asks the reasoning provider for a reply, validates what it
// returns and falls back to a fixed suggestion when any step fails.

pub mod analyzer;
pub mod cases;
pub mod error;
pub mod gate;
pub mod parser;
pub mod prompt;

#[cfg(test)]
pub(crate) mod testing;

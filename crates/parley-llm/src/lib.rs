// Reasoning provider seam: the text-in/text-out contract the suggestion
// engine depends on, and the Claude-backed implementation of it.

pub mod client;
pub mod provider;

//! Visitor traits through which class file producers and consumers (a binary
//! reader/writer, printers, transformers) drive and are driven by the tree
//! model.
//!
//! Every method has a default no-op implementation, so implementations only
//! spell out what they care about. `()` implements both traits doing nothing,
//! which is useful as the method visitor of a class visitor that skips method
//! bodies.

pub mod class;
pub mod method;

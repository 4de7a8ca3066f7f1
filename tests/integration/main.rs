//! Integration tests for the fgslice binary.
//!
//! These tests build small indexed BAM files and run the compiled `fgslice` binary on them.

mod helpers;
mod test_slice_command;

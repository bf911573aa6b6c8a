#![doc = include_str!("../../../README.md")]

mod analyze;
mod ast;
mod blocks;
mod error;
mod fn_info;
mod functions;
mod hoist;
mod instrument;
mod internal_vars;
mod state;
mod tracking;
mod trail;
mod transform;

pub use crate::{
    error::{CodeLoc, InstrumentError},
    instrument::{CodeContext, FileInfo, Instrumented, Options, instrument},
    internal_vars::{INTERNAL_VAR_PREFIX, TRACKER_COMMENT_PREFIX},
};

//! Integration tests for the foresight prediction library
#![allow(unused_must_use)]

pub mod stepper;

#[cfg(test)]
mod scenarios;

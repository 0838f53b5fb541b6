#![cfg(test)]
#![allow(dead_code)]

pub mod harness;

#![no_std]

// Shared logic for the transmit-latency sweep.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware (radio, tick source, sampler, console) is
// reached only through the traits exposed here.

pub mod analog;
pub mod averager;
pub mod config;
pub mod measurement;
pub mod modem;
pub mod report;
pub mod sweep;
pub mod telemetry;

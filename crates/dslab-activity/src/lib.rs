#![doc = include_str!("../README.md")]

pub mod config;
pub mod controller;
pub mod dag;
pub mod error;
pub mod experiment;
pub mod file;
pub mod link;
pub mod platform;
pub mod policy;
pub mod readiness;
pub mod resource;
pub mod run_stats;
pub mod runner;
pub mod simulation;
pub mod task;
pub mod topology;
pub mod trace_log;
pub mod workload;

//! Testing utilities for the compile pipeline.
//!
//! This module provides:
//! - Recording fakes for every collaborator
//! - Sample tasks and a fully wired test harness
//! - Assertions for outcomes and published events

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_accepted, assert_event_pair, assert_failed_with, assert_outcome_failed};
pub use fixtures::{complete_documents, sample_spec, sample_task, TestHarness};
pub use mocks::{
    FakeMinter, FakeSourceControl, PublishedMessage, RecordingSender, RecordingTransport, ScriptedModel,
    ScriptedModelProvider, ScriptedReply,
};

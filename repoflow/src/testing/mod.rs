//! Testing utilities: scripted reasoners and temporary repositories.

#[cfg(test)]
mod fixtures;
mod mocks;

#[cfg(test)]
pub use fixtures::RepoFixture;
pub use mocks::{FailingReasoner, ScriptedReasoner};

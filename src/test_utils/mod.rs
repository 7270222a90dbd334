//! Test utilities and mock implementations.
//!
//! This module provides reusable in-memory implementations of the
//! persistence traits for unit and integration tests, plus a bundle that
//! wires them into an `AppState`.

pub mod mocks;

use std::sync::Arc;

use crate::app::{AppState, Repositories};

pub use mocks::{
    sample_attachment, sample_bug, sample_comment, sample_member, sample_project, sample_user,
    stamp, summary_for, MockAttachmentRepository, MockBugRepository, MockCommentRepository,
    MockConfig, MockFileStore, MockHistoryRepository, MockMemberRepository,
    MockProjectRepository, MockUserRepository,
};

/// A full set of fresh in-memory repositories. Keep the struct around to
/// seed rows or assert on recorded calls after building a state from it.
pub struct MockRepos {
    pub users: Arc<MockUserRepository>,
    pub projects: Arc<MockProjectRepository>,
    pub members: Arc<MockMemberRepository>,
    pub bugs: Arc<MockBugRepository>,
    pub comments: Arc<MockCommentRepository>,
    pub history: Arc<MockHistoryRepository>,
    pub attachments: Arc<MockAttachmentRepository>,
    pub files: Arc<MockFileStore>,
}

impl MockRepos {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Arc::new(MockUserRepository::new()),
            projects: Arc::new(MockProjectRepository::new()),
            members: Arc::new(MockMemberRepository::new()),
            bugs: Arc::new(MockBugRepository::new()),
            comments: Arc::new(MockCommentRepository::new()),
            history: Arc::new(MockHistoryRepository::new()),
            attachments: Arc::new(MockAttachmentRepository::new()),
            files: Arc::new(MockFileStore::new()),
        }
    }

    /// Wires an application state over these repositories.
    #[must_use]
    pub fn state(&self) -> AppState {
        let repos = Repositories {
            users: Arc::clone(&self.users) as _,
            projects: Arc::clone(&self.projects) as _,
            members: Arc::clone(&self.members) as _,
            bugs: Arc::clone(&self.bugs) as _,
            comments: Arc::clone(&self.comments) as _,
            history: Arc::clone(&self.history) as _,
            attachments: Arc::clone(&self.attachments) as _,
        };
        AppState::new(repos, Arc::clone(&self.files) as _)
    }
}

impl Default for MockRepos {
    fn default() -> Self {
        Self::new()
    }
}

//! Slice snapshot loaders for the realtime aggregator
//!
//! The aggregator treats the store as an external collaborator: it only
//! needs the four whole-slice reads. The trait is the seam that lets the
//! aggregator tests substitute a scripted store.

use std::future::Future;
use uuid::Uuid;

use lc_common::models::{Curriculum, Notification, TeamProfile, UserProfile};
use lc_common::Result;

use super::Store;

/// Whole-slice snapshot reads consumed by the realtime aggregator
pub trait SnapshotSource: Send + Sync + 'static {
    /// Curricula owned by one user
    fn curricula_snapshot(
        &self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Curriculum>>> + Send;

    /// All notifications for one user
    fn notifications_snapshot(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Notification>>> + Send;

    /// One user's profile, if it still exists
    fn profile_snapshot(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<UserProfile>>> + Send;

    /// One-shot team read, triggered by profile deliveries
    fn team_snapshot(
        &self,
        team_id: Uuid,
    ) -> impl Future<Output = Result<Option<TeamProfile>>> + Send;
}

impl SnapshotSource for Store {
    fn curricula_snapshot(
        &self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Curriculum>>> + Send {
        async move { self.curricula_by_owner(owner_id).await }
    }

    fn notifications_snapshot(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Notification>>> + Send {
        async move { self.notifications_for(user_id).await }
    }

    fn profile_snapshot(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<UserProfile>>> + Send {
        async move { self.profile(user_id).await }
    }

    fn team_snapshot(
        &self,
        team_id: Uuid,
    ) -> impl Future<Output = Result<Option<TeamProfile>>> + Send {
        async move { self.team(team_id).await }
    }
}

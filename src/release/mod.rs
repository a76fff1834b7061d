//! # Release — Review Lifecycle Rules
//!
//! Pure decision functions for the release review workflow, plus the request
//! flows built on top of them.
//!
//! ## Module Structure
//!
//! - [`types`] — states, flags, access levels, categories
//! - [`lifecycle`] — delete and state-transition flows
//! - [`notify`] — announcement formatting and the post-commit delivery queue
//!
//! ## Obsolete Flag
//!
//! Within a project, the highest-id release with state ≥ `Voted` is the head.
//! The head has `OBSOLETE` cleared; every other release at or above `Voted`
//! has it set. Releases below the threshold are never touched.

pub mod lifecycle;
pub mod notify;
mod types;


pub use types::{
    AccessLevel, Category, FlagUpdate, ObsoletePlan, ReleaseFlags, ReleaseState, SiblingRelease,
};

/// Lowest state at which a release is publicly listed.
pub const MIN_PUBLIC_STATE: ReleaseState = ReleaseState::Voted;

/// Lowest state that can become a project's head release.
pub const OBSOLETE_HEAD_STATE: ReleaseState = ReleaseState::Voted;

/// Response value reported after a release is deleted.
pub const DELETED_STATE: i64 = -1;

fn is_public(state: i16) -> bool {
    state >= MIN_PUBLIC_STATE.as_i16()
}

/// `update_time` is stamped unless both states sit on the same side of the
/// public threshold.
pub fn stamps_update_time(old_state: i16, new_state: ReleaseState) -> bool {
    is_public(old_state) != is_public(new_state.as_i16())
}

/// True when a transition makes a previously hidden release public.
pub fn crosses_into_public(old_state: i16, new_state: ReleaseState) -> bool {
    !is_public(old_state) && is_public(new_state.as_i16())
}

/// Admins skip the repository check for anything not yet past submission;
/// everyone else needs push access, and only draft/submitted releases qualify.
pub fn requires_push_check(state: i16, level: AccessLevel) -> bool {
    let admin_override = level == AccessLevel::Admin && state <= ReleaseState::Submitted.as_i16();
    !admin_override && is_owner_deletable(state)
}

fn is_owner_deletable(state: i16) -> bool {
    state == ReleaseState::Draft.as_i16() || state == ReleaseState::Submitted.as_i16()
}

pub fn may_delete(state: i16, has_push: bool, level: AccessLevel) -> bool {
    (has_push && is_owner_deletable(state))
        || (level == AccessLevel::Admin && state <= ReleaseState::Submitted.as_i16())
}

/// Recompute the obsolete flag for every release of one project.
///
/// `releases` must contain all releases of the project, already reflecting
/// the new state of the release being transitioned.
pub fn recompute_obsolete(releases: &[SiblingRelease]) -> ObsoletePlan {
    let threshold = OBSOLETE_HEAD_STATE.as_i16();
    let head = releases
        .iter()
        .filter(|r| r.state >= threshold)
        .map(|r| r.release_id)
        .max();

    let Some(head) = head else {
        return ObsoletePlan::default();
    };

    let updates = releases
        .iter()
        .filter(|r| r.state >= threshold)
        .filter_map(|r| {
            let flags = if r.release_id == head {
                r.flags & !ReleaseFlags::OBSOLETE
            } else {
                r.flags | ReleaseFlags::OBSOLETE
            };
            (flags != r.flags).then_some(FlagUpdate {
                release_id: r.release_id,
                flags,
            })
        })
        .collect();

    ObsoletePlan {
        head: Some(head),
        updates,
    }
}

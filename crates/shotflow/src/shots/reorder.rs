//! Two-phase renumbering of project shots.
//!
//! `(project_id, shot_no)` is unique among active rows and rows are updated one
//! at a time, so assigning final numbers directly can hit a value still held
//! by a row that has not been visited yet. Every row is first moved into a
//! range above anything in use (phase 1) and only then given its final
//! `1..=M` number (phase 2).

use std::collections::HashSet;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::debug;

use super::ShotError;
use crate::db::shot_repo::{self, ShotRow};

/// Distance between the highest used number and the temporary range.
pub const TEMP_OFFSET: i32 = 1000;

/// Row updates for one renumbering pass, as `(shot id, shot_no)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenumberPlan {
    pub phase1: Vec<(i32, i32)>,
    pub phase2: Vec<(i32, i32)>,
}

impl RenumberPlan {
    /// Plans the numbering of `ordered_ids` as `1..=len`.
    ///
    /// `current_max` must be at least the highest `shot_no` any row of the
    /// project may hold while the plan is applied. Fails when the temporary
    /// range would not fit in `i32`.
    pub fn new(ordered_ids: &[i32], current_max: i32) -> Result<Self, ShotError> {
        let out_of_range = || {
            ShotError::InvalidReorder(format!(
                "no room above shot number {} to renumber {} shots",
                current_max,
                ordered_ids.len()
            ))
        };
        let base = current_max
            .max(0)
            .checked_add(TEMP_OFFSET)
            .ok_or_else(out_of_range)?;

        let mut phase1 = Vec::with_capacity(ordered_ids.len());
        let mut phase2 = Vec::with_capacity(ordered_ids.len());
        for (index, id) in ordered_ids.iter().enumerate() {
            let index = i32::try_from(index).map_err(|_| out_of_range())?;
            phase1.push((*id, base.checked_add(index).ok_or_else(out_of_range)?));
            phase2.push((*id, index + 1));
        }
        Ok(Self { phase1, phase2 })
    }

    pub fn is_empty(&self) -> bool {
        self.phase2.is_empty()
    }
}

/// Applies create/delete/reorder operations while keeping active shot
/// numbers exactly `1..=M` for every project.
///
/// Each operation runs in one transaction. Concurrent reorders of the same
/// project must still be serialized by the caller on backends that allow
/// parallel writers.
#[derive(Clone)]
pub struct ShotSequencer {
    db: DatabaseConnection,
}

impl ShotSequencer {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_shots(&self, project_id: i64) -> Result<Vec<ShotRow>, ShotError> {
        Ok(shot_repo::list_active(&self.db, project_id).await?)
    }

    /// Adds a shot, by default at the end. `position` is 1-based; values past
    /// the end append.
    pub async fn create_shot(
        &self,
        project_id: i64,
        script_text: &str,
        position: Option<usize>,
    ) -> Result<ShotRow, ShotError> {
        if position == Some(0) {
            return Err(ShotError::InvalidReorder(
                "position is 1-based".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let provisional = shot_repo::max_shot_no(&txn, project_id)
            .await?
            .checked_add(1)
            .ok_or_else(|| {
                ShotError::InvalidReorder(format!("project {} has no free shot number", project_id))
            })?;
        let created = shot_repo::insert(&txn, project_id, provisional, script_text).await?;

        purge_deleted(&txn, project_id).await?;
        let mut order: Vec<i32> = shot_repo::list_active(&txn, project_id)
            .await?
            .iter()
            .map(|s| s.id)
            .filter(|id| *id != created.id)
            .collect();
        let index = position.map_or(order.len(), |p| (p - 1).min(order.len()));
        order.insert(index, created.id);

        apply(&txn, project_id, &order).await?;

        let created = shot_repo::find_by_id(&txn, created.id)
            .await?
            .ok_or(ShotError::NotFound {
                project_id,
                id: created.id,
            })?;
        txn.commit().await?;

        Ok(created)
    }

    /// Soft-deletes a shot and closes the gap it leaves.
    pub async fn delete_shot(&self, project_id: i64, id: i32) -> Result<(), ShotError> {
        let txn = self.db.begin().await?;

        if !shot_repo::soft_delete(&txn, project_id, id).await? {
            return Err(ShotError::NotFound { project_id, id });
        }
        renumber_in(&txn, project_id).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Renumbers the project's shots to follow `ordered_ids`.
    ///
    /// The list must name every active shot of the project exactly once.
    pub async fn reorder_shots(&self, project_id: i64, ordered_ids: &[i32]) -> Result<(), ShotError> {
        let txn = self.db.begin().await?;

        purge_deleted(&txn, project_id).await?;
        let active = shot_repo::list_active(&txn, project_id).await?;
        validate_permutation(&active, ordered_ids)?;

        apply(&txn, project_id, ordered_ids).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Compacts numbering in current `shot_no` order.
    pub async fn renumber(&self, project_id: i64) -> Result<(), ShotError> {
        let txn = self.db.begin().await?;
        renumber_in(&txn, project_id).await?;
        txn.commit().await?;
        Ok(())
    }
}

async fn renumber_in(txn: &DatabaseTransaction, project_id: i64) -> Result<(), ShotError> {
    purge_deleted(txn, project_id).await?;
    let order: Vec<i32> = shot_repo::list_active(txn, project_id)
        .await?
        .iter()
        .map(|s| s.id)
        .collect();
    apply(txn, project_id, &order).await
}

async fn purge_deleted(txn: &DatabaseTransaction, project_id: i64) -> Result<(), ShotError> {
    let purged = shot_repo::purge_deleted(txn, project_id).await?;
    if purged > 0 {
        debug!(project_id, purged, "Purged deleted shots");
    }
    Ok(())
}

async fn apply(
    txn: &DatabaseTransaction,
    project_id: i64,
    ordered_ids: &[i32],
) -> Result<(), ShotError> {
    let current_max = shot_repo::max_shot_no(txn, project_id).await?;
    let plan = RenumberPlan::new(ordered_ids, current_max)?;

    // Phase 1 must finish for every row before any row gets its final number.
    for (id, shot_no) in &plan.phase1 {
        shot_repo::set_shot_no(txn, *id, *shot_no).await?;
    }
    for (id, shot_no) in &plan.phase2 {
        shot_repo::set_shot_no(txn, *id, *shot_no).await?;
    }

    debug!(project_id, shots = ordered_ids.len(), "Renumbered shots");
    Ok(())
}

fn validate_permutation(active: &[ShotRow], ordered_ids: &[i32]) -> Result<(), ShotError> {
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    if let Some(dup) = ordered_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ShotError::InvalidReorder(format!("shot {} listed twice", dup)));
    }

    let active_ids: HashSet<i32> = active.iter().map(|s| s.id).collect();
    if let Some(unknown) = ordered_ids.iter().find(|id| !active_ids.contains(id)) {
        return Err(ShotError::InvalidReorder(format!(
            "shot {} is not an active shot of this project",
            unknown
        )));
    }
    if ordered_ids.len() != active_ids.len() {
        return Err(ShotError::InvalidReorder(format!(
            "expected {} shots, got {}",
            active_ids.len(),
            ordered_ids.len()
        )));
    }
    Ok(())
}
